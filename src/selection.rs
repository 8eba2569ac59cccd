//! Mutually exclusive "active" marks within a list of page items.

/// An item that can carry the `active` mark.
pub trait Mark {
    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);
}

/// Index of the currently active item, if any.
pub fn active_index<T: Mark>(items: &[T]) -> Option<usize> {
    items.iter().position(|item| item.is_active())
}

/// Clear every mark, then mark `items[index]` active.
///
/// Returns the previously active index. Out-of-range indices clear nothing and
/// mark nothing.
pub fn mark_exclusive<T: Mark>(items: &mut [T], index: usize) -> Option<usize> {
    if index >= items.len() {
        return None;
    }
    let previous = active_index(items);
    for item in items.iter_mut() {
        item.set_active(false);
    }
    items[index].set_active(true);
    previous
}
