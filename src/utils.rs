//! Diagnostic helpers
//!
//! Reference-name lookup and elapsed-time formatting for log lines.

use std::time::Duration;

use bstr::{BStr, ByteSlice};
use noodles::sam;

/// Name of reference sequence `id` in the header, for log messages only
#[inline]
pub fn reference_name(header: &sam::Header, id: usize) -> Option<&BStr> {
    header
        .reference_sequences()
        .get_index(id)
        .map(|(name, _)| name.as_bstr())
}

/// Reference name or `*` for unplaced records
pub fn describe_reference(header: &sam::Header, id: Option<usize>) -> String {
    id.and_then(|id| reference_name(header, id))
        .map_or_else(|| "*".to_string(), |name| name.to_string())
}

/// Format duration as a human-readable string
#[inline]
pub fn format_duration(dur: Duration) -> String {
    let secs = dur.as_secs();
    if secs >= 60 {
        format!("{} min {} sec", secs / 60, secs % 60)
    } else {
        format!("{:.1} sec", dur.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> sam::Header {
        "@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:chr1\tLN:1000\n@SQ\tSN:chr2\tLN:500\n"
            .parse()
            .unwrap()
    }

    #[test]
    fn test_reference_name_lookup() {
        let header = header();
        assert_eq!(reference_name(&header, 1).unwrap(), "chr2");
        assert!(reference_name(&header, 2).is_none());
    }

    #[test]
    fn test_describe_unplaced() {
        let header = header();
        assert_eq!(describe_reference(&header, Some(0)), "chr1");
        assert_eq!(describe_reference(&header, None), "*");
        assert_eq!(describe_reference(&header, Some(9)), "*");
    }

    #[test]
    fn test_format_duration_seconds() {
        let result = format_duration(Duration::from_millis(500));
        assert_eq!(result, "0.5 sec");
    }

    #[test]
    fn test_format_duration_minutes() {
        let result = format_duration(Duration::from_secs(125));
        assert_eq!(result, "2 min 5 sec");
    }
}
