//! Per-entity-type state slice: value, loading flag, error

/// Read-side view of one entity type's state.
///
/// Exactly one of the three conditions is current at any time: still
/// loading, errored, or value-present. A stale value may coexist with an
/// error so the caller can keep rendering it, but the error tells them
/// which is authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceView<T> {
    pub value: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Mutable state for one entity type.
///
/// `seeded` flips once the initial snapshot load settles (value or error)
/// and never flips back. Push updates arriving before that are buffered by
/// the store rather than applied.
#[derive(Debug, Clone)]
pub struct EntitySlice<T> {
    value: Option<T>,
    loading: bool,
    error: Option<String>,
    seeded: bool,
}

impl<T: Clone> EntitySlice<T> {
    /// New slice in the initial-loading state
    pub fn new() -> Self {
        Self {
            value: None,
            loading: true,
            error: None,
            seeded: false,
        }
    }

    pub fn get(&self) -> SliceView<T> {
        SliceView {
            value: self.value.clone(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }

    pub fn set_loading(&mut self) {
        self.loading = true;
    }

    /// Record a failure. Implies not-loading; the previous value (if any)
    /// stays visible as stale.
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.loading = false;
        self.seeded = true;
    }

    /// Wholesale replace. Clears any error and the loading flag.
    pub fn set_value(&mut self, value: T) {
        self.value = Some(value);
        self.error = None;
        self.loading = false;
        self.seeded = true;
    }

    /// Mutate the current value in place, treating an absent value as
    /// `default`. Used for keyed upserts and appends; clears error and
    /// loading like `set_value`.
    pub fn update_with(&mut self, default: T, f: impl FnOnce(&mut T)) {
        let mut value = self.value.take().unwrap_or(default);
        f(&mut value);
        self.set_value(value);
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }
}

impl<T: Clone> Default for EntitySlice<T> {
    fn default() -> Self {
        Self::new()
    }
}
