//! Percentage conversion helpers
//!
//! Conversions between host percentages and device-native scales: a
//! contiguous integer speed range, or an ordered list of named levels.

/// Number of discrete states in an inclusive low/high range
pub fn int_states_in_range(range: (i64, i64)) -> i64 {
    range.1 - range.0 + 1
}

/// Convert a value inside a low/high range to a 0-100 percentage
pub fn ranged_value_to_percentage(range: (i64, i64), value: i64) -> i64 {
    let offset = range.0 - 1;
    (value - offset) * 100 / int_states_in_range(range)
}

/// Convert a 0-100 percentage to a (fractional) value inside a low/high
/// range; callers round as their device requires
pub fn percentage_to_ranged_value(range: (i64, i64), percentage: i64) -> f64 {
    let offset = range.0 - 1;
    int_states_in_range(range) as f64 * percentage as f64 / 100.0 + offset as f64
}

/// Percentage represented by one item of an ordered list
///
/// The first item maps to `100 / len`, the last to 100. `None` when the
/// item is not in the list.
pub fn ordered_list_item_to_percentage<T: PartialEq>(list: &[T], item: &T) -> Option<i64> {
    let position = list.iter().position(|candidate| candidate == item)? as i64 + 1;
    Some(position * 100 / list.len() as i64)
}

/// The list item matching a 0-100 percentage
///
/// Each item covers an equal share of the scale; `None` only for an empty
/// list.
pub fn percentage_to_ordered_list_item<T>(list: &[T], percentage: i64) -> Option<&T> {
    let len = list.len() as f64;
    for (offset, item) in list.iter().enumerate() {
        if percentage as f64 <= ((offset as f64 + 1.0) * 100.0) / len {
            return Some(item);
        }
    }
    list.last()
}
