/// A value removed by a concurrent pop.
///
/// `emptied` reports whether this removal left the deque empty. Callers that
/// keep a wake-up primitive alive while elements are queued use it to decide
/// when that primitive can be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Popped<T> {
    pub value: T,
    pub emptied: bool,
}

impl<T> Popped<T> {
    pub(crate) fn new(value: T, emptied: bool) -> Self {
        Popped { value, emptied }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// The concurrent surface shared by every deque configuration.
///
/// All methods take `&self` and are lock-free. Inserts report whether the
/// deque was empty beforehand (unconditional variants) or whether the insert
/// happened at all (conditional variants).
///
pub trait ConcurrentDeque<T>: Send + Sync {
    fn push_front(&self, value: T) -> bool;

    fn push_back(&self, value: T) -> bool;

    /// Insert only if the deque is observed empty. Returns whether it was
    /// inserted; a rejected value is dropped.
    fn push_front_if_empty(&self, value: T) -> bool;

    fn push_back_if_empty(&self, value: T) -> bool;

    /// Insert only if the deque is observed non-empty. Returns whether it was
    /// inserted; a rejected value is dropped.
    fn push_front_if_not_empty(&self, value: T) -> bool;

    fn push_back_if_not_empty(&self, value: T) -> bool;

    fn pop_front(&self) -> Option<Popped<T>>;

    fn pop_back(&self) -> Option<Popped<T>>;

    fn is_empty(&self) -> bool;

    /// Exactly one logical element is present.
    fn contains_one(&self) -> bool;

    /// Neither end carries an in-progress insert mark.
    fn is_stable(&self) -> bool;

    fn clear(&self);
}
