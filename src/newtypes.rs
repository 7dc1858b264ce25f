//! Integer identifiers for rows of the tables.
//!
//! Each id space gets its own type so that a [`NodeId`]
//! can never be used where a [`SiteId`] is expected.
//! All ids are signed so that `-1` can serve as the
//! "null" value used throughout the tables.

macro_rules! impl_table_id {
    ($idtype: ident) => {
        impl $idtype {
            /// The null value of this id.
            pub const NULL: $idtype = $idtype(-1);

            pub const fn new(value: i32) -> Self {
                Self(value)
            }

            #[inline(always)]
            pub fn is_null(&self) -> bool {
                self.0 == -1
            }

            /// Row index of this id.
            ///
            /// # Panics
            ///
            /// In debug builds, if `self` is null.
            #[inline(always)]
            pub fn as_index(&self) -> usize {
                debug_assert!(self.0 >= 0, "null id used as an index");
                self.0 as usize
            }

            #[inline(always)]
            pub fn into_option(self) -> Option<Self> {
                if self.is_null() {
                    None
                } else {
                    Some(self)
                }
            }

            #[inline(always)]
            pub fn raw(&self) -> i32 {
                self.0
            }
        }

        impl Default for $idtype {
            fn default() -> Self {
                Self::NULL
            }
        }

        impl From<i32> for $idtype {
            fn from(value: i32) -> Self {
                Self(value)
            }
        }

        impl From<$idtype> for i32 {
            fn from(value: $idtype) -> Self {
                value.0
            }
        }

        impl PartialEq<i32> for $idtype {
            fn eq(&self, other: &i32) -> bool {
                self.0 == *other
            }
        }

        impl std::fmt::Display for $idtype {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                if self.is_null() {
                    write!(f, "NULL")
                } else {
                    write!(f, "{}", self.0)
                }
            }
        }
    };
}

// Ids of rows that the tables append themselves.
macro_rules! impl_row_id {
    ($idtype: ident) => {
        impl_table_id!($idtype);

        impl $idtype {
            #[inline(always)]
            pub(crate) fn from_index(index: usize) -> Self {
                debug_assert!(index < i32::MAX as usize);
                Self(index as i32)
            }
        }
    };
}

#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(i32);

#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeId(i32);

#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SiteId(i32);

#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MutationId(i32);

/// Identifier of a deme (sub-population).
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DemeId(i32);

impl_row_id!(NodeId);
impl_row_id!(EdgeId);
impl_row_id!(SiteId);
impl_row_id!(MutationId);
impl_table_id!(DemeId);

/// Set of node row indexes.
pub(crate) type NodeHash = std::collections::HashSet<usize, nohash::BuildNoHashHasher<usize>>;
