//! Buffer pagination utilities

/// Resolve an offset into a buffer of `total` chunks
///
/// # Pagination Modes
/// - offset >= 0: start at position N, take up to `length` chunks
/// - offset < 0: tail mode, take the newest min(|offset|, `length`) chunks
///
/// Returns `(start, len)`.
pub(crate) fn resolve_window(offset: i64, length: usize, total: usize) -> (usize, usize) {
    if offset >= 0 {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(total);
        (start, length.min(total - start))
    } else {
        let len = usize::try_from(offset.unsigned_abs())
            .unwrap_or(usize::MAX)
            .min(total)
            .min(length);
        (total - len, len)
    }
}

/// Whether chunks exist beyond `start + returned`
pub(crate) const fn calculate_has_more(start: usize, returned: usize, total: usize) -> bool {
    start + returned < total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_window() {
        assert_eq!(resolve_window(0, 10, 25), (0, 10));
        assert_eq!(resolve_window(20, 10, 25), (20, 5));
        assert_eq!(resolve_window(40, 10, 25), (25, 0));
        assert!(calculate_has_more(0, 10, 25));
        assert!(!calculate_has_more(20, 5, 25));
    }

    #[test]
    fn tail_window() {
        assert_eq!(resolve_window(-5, 10, 25), (20, 5));
        assert_eq!(resolve_window(-50, 10, 25), (15, 10));
        assert_eq!(resolve_window(-8, 3, 25), (22, 3));
        assert!(!calculate_has_more(22, 3, 25));
        assert_eq!(resolve_window(-3, 10, 0), (0, 0));
    }
}
