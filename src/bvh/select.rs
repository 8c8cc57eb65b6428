//! In-place slice reordering used by the builder.
//!
//! Both algorithms are unstable and their exact output order is part of
//! the build's determinism: the same input always yields the same tree.

/// Partition `slice` so every element satisfying `pred` precedes the rest.
///
/// Two cursors walk inward and swap misplaced pairs. Returns the index of
/// the first element for which `pred` is false (`slice.len()` if none).
pub fn partition<T, F>(slice: &mut [T], mut pred: F) -> usize
where
    F: FnMut(&T) -> bool,
{
    let mut left = 0;
    let mut right = slice.len();

    while left != right {
        while pred(&slice[left]) {
            left += 1;
            if left == right {
                return left;
            }
        }
        loop {
            right -= 1;
            if left == right {
                return left;
            }
            if pred(&slice[right]) {
                break;
            }
        }
        slice.swap(left, right);
        left += 1;
    }

    left
}

/// Partial selection: afterwards `slice[k]` holds the element that would be
/// there if the slice were sorted by `less`, and nothing before `k` compares
/// greater than it.
///
/// Selection-sort over the prefix `0..=k`, quadratic in the slice length;
/// the builder only calls it on ranges of at most four elements.
pub fn nth_element<T, F>(slice: &mut [T], k: usize, mut less: F)
where
    F: FnMut(&T, &T) -> bool,
{
    if slice.is_empty() {
        return;
    }
    let last = k.min(slice.len() - 1);

    for i in 0..=last {
        for j in i + 1..slice.len() {
            // Ties swap too, so equal keys move toward the front.
            if !less(&slice[i], &slice[j]) {
                slice.swap(i, j);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_basic() {
        let mut v = vec![5, 1, 8, 2, 9, 3];
        let mid = partition(&mut v, |&x| x < 5);
        assert_eq!(mid, 3);
        assert!(v[..mid].iter().all(|&x| x < 5));
        assert!(v[mid..].iter().all(|&x| x >= 5));
    }

    #[test]
    fn test_partition_exact_order() {
        // Left cursor stops at 5, right cursor stops at 3: swap. Then 8 <-> 2.
        let mut v = vec![5, 1, 8, 2, 9, 3];
        partition(&mut v, |&x| x < 5);
        assert_eq!(v, vec![3, 1, 2, 8, 9, 5]);
    }

    #[test]
    fn test_partition_all_or_nothing() {
        let mut v = vec![1, 2, 3];
        assert_eq!(partition(&mut v, |_| true), 3);
        assert_eq!(partition(&mut v, |_| false), 0);
        assert_eq!(v, vec![1, 2, 3]);

        let mut empty: Vec<i32> = Vec::new();
        assert_eq!(partition(&mut empty, |_| true), 0);
    }

    #[test]
    fn test_nth_element_places_median() {
        let mut v = vec![4.0f32, 1.0, 3.0, 2.0];
        nth_element(&mut v, 2, |a, b| a < b);
        assert_eq!(v[2], 3.0);
        assert!(v[..2].iter().all(|&x| x <= 3.0));
        assert!(v[3..].iter().all(|&x| x >= 3.0));
    }

    #[test]
    fn test_nth_element_small() {
        let mut v = vec![2, 1];
        nth_element(&mut v, 1, |a, b| a < b);
        assert_eq!(v, vec![1, 2]);

        let mut one = vec![7];
        nth_element(&mut one, 0, |a, b| a < b);
        assert_eq!(one, vec![7]);
    }

    #[test]
    fn test_nth_element_ties_swap() {
        // Equal keys swap, so the tag order flips.
        let mut v = vec![(1, 'a'), (1, 'b')];
        nth_element(&mut v, 0, |a, b| a.0 < b.0);
        assert_eq!(v, vec![(1, 'b'), (1, 'a')]);
    }
}
