//! Many singly-linked lists sharing one arena.
//!
//! Each list is identified by a key in `0..num_keys`.
//! Values live in one contiguous vector, and the
//! links are plain indexes into it.

#[repr(transparent)]
#[derive(Clone, Copy, Debug, Hash, PartialEq, PartialOrd, Ord, Eq)]
pub struct Index(usize);

impl Index {
    pub const NULL: Index = Index(usize::MAX);

    #[inline(always)]
    pub fn is_null(&self) -> bool {
        self.0 == usize::MAX
    }

    #[inline(always)]
    pub fn into_option(self) -> Option<Self> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }
}

#[derive(Debug, Clone)]
pub struct NestedForwardList<T> {
    head: Vec<Index>,
    tail: Vec<Index>,
    next: Vec<Index>,
    data: Vec<T>,
}

impl<T> Default for NestedForwardList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NestedForwardList<T> {
    pub fn new() -> Self {
        Self {
            head: vec![],
            tail: vec![],
            next: vec![],
            data: vec![],
        }
    }

    /// Create an empty instance with `num_keys` lists.
    pub fn with_num_keys(num_keys: usize) -> Self {
        let mut rv = Self::new();
        rv.reset(num_keys);
        rv
    }

    /// Append `value` to the list for `key`.
    ///
    /// The number of keys grows as needed.
    pub fn extend(&mut self, key: usize, value: T) {
        if key >= self.head.len() {
            self.head.resize(key + 1, Index::NULL);
            self.tail.resize(key + 1, Index::NULL);
        }
        let new = Index(self.data.len());
        self.data.push(value);
        self.next.push(Index::NULL);
        let tail = self.tail[key];
        if tail.is_null() {
            debug_assert!(self.head[key].is_null());
            self.head[key] = new;
        } else {
            self.next[tail.0] = new;
        }
        self.tail[key] = new;
    }

    /// First entry of the list for `key`, or [`Index::NULL`].
    #[inline]
    pub fn head(&self, key: usize) -> Index {
        self.head.get(key).copied().unwrap_or(Index::NULL)
    }

    /// Last entry of the list for `key`, or [`Index::NULL`].
    #[inline]
    pub fn tail(&self, key: usize) -> Index {
        self.tail.get(key).copied().unwrap_or(Index::NULL)
    }

    /// # Panics
    ///
    /// If `at` is not a valid index.
    #[inline]
    pub fn next(&self, at: Index) -> Index {
        self.next[at.0]
    }

    /// # Panics
    ///
    /// If `at` is not a valid index.
    #[inline]
    pub fn fetch(&self, at: Index) -> &T {
        &self.data[at.0]
    }

    /// # Panics
    ///
    /// If `at` is not a valid index.
    #[inline]
    pub fn fetch_mut(&mut self, at: Index) -> &mut T {
        &mut self.data[at.0]
    }

    /// Make the list for `key` empty.
    ///
    /// The values remain in the arena until the next
    /// call to [`NestedForwardList::reset`] or
    /// [`NestedForwardList::clear`].
    pub fn nullify_list(&mut self, key: usize) {
        if key < self.head.len() {
            self.head[key] = Index::NULL;
            self.tail[key] = Index::NULL;
        }
    }

    /// Empty the lists for `keys` and drop all values,
    /// keeping the number of keys.
    ///
    /// `keys` must include every key with a non-empty list.
    pub fn clear_lists<I: IntoIterator<Item = usize>>(&mut self, keys: I) {
        for key in keys {
            self.nullify_list(key);
        }
        debug_assert!(self.head.iter().all(|h| h.is_null()));
        self.next.clear();
        self.data.clear();
    }

    /// Remove all values and make room for `num_keys` empty lists.
    ///
    /// Allocated memory is kept.
    pub fn reset(&mut self, num_keys: usize) {
        self.clear();
        self.head.resize(num_keys, Index::NULL);
        self.tail.resize(num_keys, Index::NULL);
    }

    /// Remove all values and all keys.
    pub fn clear(&mut self) {
        self.head.clear();
        self.tail.clear();
        self.next.clear();
        self.data.clear();
    }

    pub fn num_keys(&self) -> usize {
        self.head.len()
    }

    /// Number of values stored over all lists.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter_list(&self, key: usize) -> ListIterator<'_, T> {
        ListIterator {
            list: self,
            current: self.head(key),
        }
    }

    /// Keys with non-empty lists, from the largest key to the smallest.
    pub fn keys_rev(&self) -> impl Iterator<Item = usize> + '_ {
        self.head
            .iter()
            .enumerate()
            .rev()
            .filter_map(|(key, head)| head.into_option().map(|_| key))
    }
}

pub struct ListIterator<'list, T> {
    list: &'list NestedForwardList<T>,
    current: Index,
}

impl<'list, T> Iterator for ListIterator<'list, T> {
    type Item = &'list T;

    fn next(&mut self) -> Option<Self::Item> {
        let at = self.current.into_option()?;
        self.current = self.list.next(at);
        Some(self.list.fetch(at))
    }
}
