//! Small helpers shared across modules.

/// Position of `value` in `items`, compared with `PartialEq`.
pub fn in_array_index<T: PartialEq>(value: &T, items: &[T]) -> Option<usize> {
    items.iter().position(|item| item == value)
}
