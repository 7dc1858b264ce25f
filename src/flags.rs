// This module encapsulates the bitflags API
// so that we don't leak details that may
// affect semver later on.

use bitflags::bitflags;

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    struct NodeBitFlags: u32 {
        const EMPTY = 0;
        const IS_SAMPLE = 1 << 0;
        const IS_ALIVE = 1 << 1;
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
    struct SimplificationBitFlags: u32 {
        const EMPTY = 0;
        const SKIP_INPUT_VALIDATION = 1 << 0;
        const CLEAR_SAMPLE_FLAGS = 1 << 1;
    }
}

bitflags! {
    #[repr(transparent)]
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
    struct TreeVisitorBitFlags: u32 {
        const EMPTY = 0;
        const LEAF_COUNTS = 1 << 0;
        const SAMPLE_LISTS = 1 << 1;
    }
}

/// Per-node flags stored in the node table.
#[repr(transparent)]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeFlags(NodeBitFlags);

impl NodeFlags {
    pub fn sample() -> Self {
        Self(NodeBitFlags::IS_SAMPLE)
    }

    pub fn alive() -> Self {
        Self(NodeBitFlags::IS_ALIVE)
    }

    pub fn with_sample(self) -> Self {
        Self(self.0 | NodeBitFlags::IS_SAMPLE)
    }

    pub fn with_alive(self) -> Self {
        Self(self.0 | NodeBitFlags::IS_ALIVE)
    }

    pub fn without_sample(self) -> Self {
        Self(self.0 - NodeBitFlags::IS_SAMPLE)
    }

    pub fn is_sample(&self) -> bool {
        self.0.contains(NodeBitFlags::IS_SAMPLE)
    }

    pub fn is_alive(&self) -> bool {
        self.0.contains(NodeBitFlags::IS_ALIVE)
    }

    pub fn bits(&self) -> u32 {
        self.0.bits()
    }
}

/// Options affecting [`crate::simplify_tables`] and
/// [`crate::simplify_from_edge_buffer`].
#[repr(transparent)]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct SimplificationOptions(SimplificationBitFlags);

impl SimplificationOptions {
    /// Do not check that the input is sorted.
    ///
    /// Only use this when the tables are known to be
    /// sorted, e.g. just after a call to
    /// [`crate::TableCollection::sort_tables_for_simplification`].
    /// Unsorted input then gives garbage output.
    pub fn with_skip_input_validation(self) -> Self {
        Self(self.0 | SimplificationBitFlags::SKIP_INPUT_VALIDATION)
    }

    /// Remove the sample bit from all output nodes.
    pub fn with_clear_sample_flags(self) -> Self {
        Self(self.0 | SimplificationBitFlags::CLEAR_SAMPLE_FLAGS)
    }

    pub fn skip_input_validation(&self) -> bool {
        self.0.contains(SimplificationBitFlags::SKIP_INPUT_VALIDATION)
    }

    pub fn clear_sample_flags(&self) -> bool {
        self.0.contains(SimplificationBitFlags::CLEAR_SAMPLE_FLAGS)
    }
}

/// What a [`crate::TreeVisitor`] keeps up to date
/// while moving along the genome.
#[repr(transparent)]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct TreeVisitorOptions(TreeVisitorBitFlags);

impl TreeVisitorOptions {
    /// Track the number of sample (and preserved) nodes
    /// descending from each node.
    pub fn with_leaf_counts(self) -> Self {
        Self(self.0 | TreeVisitorBitFlags::LEAF_COUNTS)
    }

    /// Track the linked list of samples below each node.
    /// This is relatively expensive.
    pub fn with_sample_lists(self) -> Self {
        Self(self.0 | TreeVisitorBitFlags::SAMPLE_LISTS)
    }

    pub fn leaf_counts(&self) -> bool {
        self.0.contains(TreeVisitorBitFlags::LEAF_COUNTS)
    }

    pub fn sample_lists(&self) -> bool {
        self.0.contains(TreeVisitorBitFlags::SAMPLE_LISTS)
    }
}



#[cfg(test)]
mod test_tree_visitor_flags {
    use super::TreeVisitorOptions;

    #[test]
    fn test_combined() {
        let flags = TreeVisitorOptions::default()
            .with_leaf_counts()
            .with_sample_lists();
        assert!(flags.leaf_counts());
        assert!(flags.sample_lists());
        assert!(!TreeVisitorOptions::default().leaf_counts());
    }
}
