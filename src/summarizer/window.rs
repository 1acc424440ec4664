//! Overlapping token windows

use std::ops::Range;

/// Split `len` tokens into windows of at most `max_tokens`, each starting
/// `max_tokens - overlap` after the previous one.
///
/// The window whose right edge reaches `len` is the last; a trailing window
/// that the previous one already covers entirely is never produced. For
/// `len > max_tokens` this yields `ceil((len - max_tokens) / stride) + 1`
/// windows.
pub fn plan_windows(len: usize, max_tokens: usize, overlap: usize) -> Vec<Range<usize>> {
    debug_assert!(overlap < max_tokens);
    let stride = max_tokens - overlap;

    let mut windows = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + max_tokens).min(len);
        windows.push(start..end);
        if end == len {
            break;
        }
        start += stride;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected_count(len: usize, max: usize, stride: usize) -> usize {
        (len - max + stride - 1) / stride + 1
    }

    #[test]
    fn test_short_sequence_is_one_window() {
        assert_eq!(plan_windows(450, 450, 50), vec![0..450]);
        assert_eq!(plan_windows(12, 450, 50), vec![0..12]);
    }

    #[test]
    fn test_empty_sequence_has_no_windows() {
        assert!(plan_windows(0, 450, 50).is_empty());
    }

    #[test]
    fn test_one_past_the_limit() {
        assert_eq!(plan_windows(451, 450, 50), vec![0..450, 400..451]);
    }

    #[test]
    fn test_no_redundant_tail_window() {
        // A third window starting at 800 would sit inside 400..850
        assert_eq!(plan_windows(850, 450, 50), vec![0..450, 400..850]);
    }

    #[test]
    fn test_window_count_formula() {
        for len in 451..3000 {
            let windows = plan_windows(len, 450, 50);
            assert_eq!(windows.len(), expected_count(len, 450, 400), "len = {}", len);
            assert_eq!(windows.last().map(|w| w.end), Some(len));
        }
    }

    #[test]
    fn test_windows_respect_limit_and_overlap() {
        for len in [451, 999, 1234, 5000] {
            let windows = plan_windows(len, 450, 50);
            assert!(windows.iter().all(|w| w.len() <= 450));
            for pair in windows.windows(2) {
                assert_eq!(pair[0].end - pair[1].start, 50);
                assert_eq!(pair[1].start - pair[0].start, 400);
            }
        }
    }

    #[test]
    fn test_windows_cover_sequence() {
        let windows = plan_windows(2048, 300, 30);
        assert_eq!(windows.first().map(|w| w.start), Some(0));
        for pair in windows.windows(2) {
            assert!(pair[1].start < pair[0].end);
        }
        assert_eq!(windows.last().map(|w| w.end), Some(2048));
    }
}
