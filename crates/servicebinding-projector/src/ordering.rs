//! Stable ordering of injected entries
//!
//! Volumes, volume mounts and env vars share one rule: entries this projector
//! owns form a trailing block sorted by name, while every other entry keeps
//! its original relative order ahead of that block.

use std::cmp::Ordering;

/// Move owned items behind non-owned ones and sort the owned block by name.
///
/// The sort is stable, so non-owned items never change relative order.
pub fn sort_owned_last<T, P, K>(items: &mut [T], is_owned: P, name: K)
where
    P: Fn(&T) -> bool,
    K: Fn(&T) -> &str,
{
    items.sort_by(|a, b| match (is_owned(a), is_owned(b)) {
        (true, true) => name(a).cmp(name(b)),
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(items: &[&str]) -> Vec<String> {
        let mut items: Vec<String> = items.iter().map(|s| s.to_string()).collect();
        sort_owned_last(&mut items, |s| s.starts_with("sb-"), |s| s.as_str());
        items
    }

    #[test]
    fn non_owned_keep_order_and_owned_trail_sorted() {
        assert_eq!(
            sorted(&["z", "sb-b", "a", "sb-a", "m"]),
            vec!["z", "a", "m", "sb-a", "sb-b"]
        );
    }

    #[test]
    fn already_ordered_is_unchanged() {
        assert_eq!(sorted(&["b", "a", "sb-x"]), vec!["b", "a", "sb-x"]);
    }

    #[test]
    fn empty_and_all_owned() {
        assert!(sorted(&[]).is_empty());
        assert_eq!(sorted(&["sb-c", "sb-a"]), vec!["sb-a", "sb-c"]);
    }
}
