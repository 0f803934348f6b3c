//! Parsing of user-typed page ranges and trim times.
//!
//! Both parsers are forgiving: they never fail. A page range that selects
//! nothing yields an empty list, and a time that cannot be read yields
//! `None`, which callers treat the same as "not specified". Deciding whether
//! an empty or missing value is an error is left to the caller
//! (see [`TrimWindow::resolve`] and the PDF-to-images pipeline).

use crate::error::ValidationError;
use crate::format::format_time;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static RE_LEADING_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+").unwrap());

static RE_LEADING_FLOAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").unwrap());

/// Parse a page-range string such as `"1-5, 8, 10-12"`.
///
/// Each comma-separated token is either a page number or a `start-end` span.
/// Spans are clamped to `[1, max_pages]`; a span whose start exceeds its end
/// after clamping contributes nothing. Out-of-range single pages and tokens
/// that are not numbers are dropped. The result is deduplicated and sorted
/// ascending (1-indexed).
pub fn parse_page_range(text: &str, max_pages: usize) -> Vec<usize> {
    let max = max_pages as i64;
    let mut pages = BTreeSet::new();

    for part in text.split(',').map(str::trim) {
        if let Some((start, end)) = part.split_once('-') {
            let (Some(start), Some(end)) = (leading_int(start.trim()), leading_int(end.trim()))
            else {
                continue;
            };
            let first = start.max(1);
            let last = end.min(max);
            for page in first..=last {
                pages.insert(page as usize);
            }
        } else if let Some(page) = leading_int(part) {
            if page >= 1 && page <= max {
                pages.insert(page as usize);
            }
        }
    }

    pages.into_iter().collect()
}

/// Parse `S`, `M:S` or `H:M:S` into seconds. Components may be fractional.
///
/// Returns `None` for blank input, for any component that is not a number,
/// and for more than three components. Negative values are returned as-is.
pub fn parse_time_to_seconds(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let parts = text
        .split(':')
        .map(|p| leading_float(p.trim()))
        .collect::<Option<Vec<f64>>>()?;

    match parts.as_slice() {
        [s] => Some(*s),
        [m, s] => Some(m * 60.0 + s),
        [h, m, s] => Some(h * 3600.0 + m * 60.0 + s),
        _ => None,
    }
}

/// Integer prefix of `s`, ignoring trailing junk (`"5abc"` → 5, `"1.9"` → 1).
fn leading_int(s: &str) -> Option<i64> {
    RE_LEADING_INT.find(s).and_then(|m| m.as_str().parse().ok())
}

/// Float prefix of `s`, ignoring trailing junk (`"1.5s"` → 1.5).
fn leading_float(s: &str) -> Option<f64> {
    RE_LEADING_FLOAT.find(s).and_then(|m| m.as_str().parse().ok())
}

/// A validated trim interval within a media file of known duration.
///
/// Either endpoint may be absent (trim from the beginning / to the end), but
/// not both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimWindow {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub duration: f64,
}

impl TrimWindow {
    /// Parse and validate the two free-text trim fields against `duration`.
    ///
    /// Checks run in a fixed order and the first failure is reported:
    /// missing both, negative start, negative end, start past the end of the
    /// file, end past the end of the file, start not before end.
    pub fn resolve(start: &str, end: &str, duration: f64) -> Result<Self, ValidationError> {
        Self::validate(parse_time_to_seconds(start), parse_time_to_seconds(end), duration)
    }

    /// Validate already-parsed endpoints.
    pub fn validate(
        start: Option<f64>,
        end: Option<f64>,
        duration: f64,
    ) -> Result<Self, ValidationError> {
        Self::check_points(start, end)?;
        if let Some(s) = start {
            if s >= duration {
                return Err(ValidationError::StartBeyondDuration {
                    start: format_time(s),
                    duration: format_time(duration),
                });
            }
        }
        if let Some(e) = end {
            if e > duration {
                return Err(ValidationError::EndBeyondDuration {
                    end: format_time(e),
                    duration: format_time(duration),
                });
            }
        }
        if let (Some(s), Some(e)) = (start, end) {
            if s >= e {
                return Err(ValidationError::StartNotBeforeEnd);
            }
        }
        Ok(Self {
            start,
            end,
            duration,
        })
    }

    /// The checks that need no duration: at least one endpoint, neither
    /// negative.
    pub fn check_points(start: Option<f64>, end: Option<f64>) -> Result<(), ValidationError> {
        if start.is_none() && end.is_none() {
            return Err(ValidationError::MissingTrimPoints);
        }
        if start.is_some_and(|s| s < 0.0) {
            return Err(ValidationError::NegativeStart);
        }
        if end.is_some_and(|e| e < 0.0) {
            return Err(ValidationError::NegativeEnd);
        }
        Ok(())
    }

    /// Start of the kept segment, defaulting to the beginning of the file.
    pub fn effective_start(&self) -> f64 {
        self.start.unwrap_or(0.0)
    }

    /// End of the kept segment, defaulting to the end of the file.
    pub fn effective_end(&self) -> f64 {
        self.end.unwrap_or(self.duration)
    }

    /// Length of the kept segment in seconds.
    pub fn length(&self) -> f64 {
        self.effective_end() - self.effective_start()
    }

    /// Engine arguments that cut `input` to this window into `output`.
    ///
    /// The seek goes before `-i` for fast input seeking and is omitted when
    /// the start is zero. With a seek the end is expressed as a duration
    /// (`-t`), without one as an absolute position (`-to`). Streams are
    /// copied, not re-encoded.
    pub fn to_args(&self, input: &str, output: &str) -> Vec<String> {
        let mut args = Vec::new();
        let seek = self.start.filter(|s| *s > 0.0);

        if let Some(s) = seek {
            args.push("-ss".to_string());
            args.push(s.to_string());
        }

        args.push("-i".to_string());
        args.push(input.to_string());

        if let Some(e) = self.end {
            match seek {
                Some(s) => {
                    let len = e - s;
                    if len > 0.0 {
                        args.push("-t".to_string());
                        args.push(len.to_string());
                    }
                }
                None => {
                    args.push("-to".to_string());
                    args.push(e.to_string());
                }
            }
        }

        args.extend(["-c", "copy", "-y"].map(String::from));
        args.push(output.to_string());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_range_mixed() {
        assert_eq!(
            parse_page_range("1-5,8,10-12", 20),
            vec![1, 2, 3, 4, 5, 8, 10, 11, 12]
        );
    }

    #[test]
    fn page_range_reversed_span_is_empty() {
        assert_eq!(parse_page_range("3-1", 10), Vec::<usize>::new());
    }

    #[test]
    fn page_range_dedup() {
        assert_eq!(parse_page_range("1, 1, 2", 10), vec![1, 2]);
        assert_eq!(parse_page_range("4-6, 5, 1-4", 10), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn page_range_out_of_bounds() {
        assert_eq!(parse_page_range("99", 10), Vec::<usize>::new());
        assert_eq!(parse_page_range("0", 10), Vec::<usize>::new());
        assert_eq!(parse_page_range("8-15", 10), vec![8, 9, 10]);
        assert_eq!(parse_page_range("0-2", 10), vec![1, 2]);
    }

    #[test]
    fn page_range_ignores_junk() {
        assert_eq!(parse_page_range("abc, 2, -", 10), vec![2]);
        assert_eq!(parse_page_range("", 10), Vec::<usize>::new());
        assert_eq!(parse_page_range("3x, 5-6pages", 10), vec![3, 5, 6]);
    }

    #[test]
    fn time_formats() {
        assert_eq!(parse_time_to_seconds("45"), Some(45.0));
        assert_eq!(parse_time_to_seconds("1:30"), Some(90.0));
        assert_eq!(parse_time_to_seconds("1:02:03"), Some(3723.0));
        assert_eq!(parse_time_to_seconds(" 0:01.5 "), Some(1.5));
    }

    #[test]
    fn time_absent() {
        assert_eq!(parse_time_to_seconds(""), None);
        assert_eq!(parse_time_to_seconds("   "), None);
        assert_eq!(parse_time_to_seconds("abc"), None);
        assert_eq!(parse_time_to_seconds("1:xx"), None);
        assert_eq!(parse_time_to_seconds("1:2:3:4"), None);
    }

    #[test]
    fn time_negative_is_returned() {
        assert_eq!(parse_time_to_seconds("-1"), Some(-1.0));
    }

    #[test]
    fn trim_rejects_start_after_end() {
        assert_eq!(
            TrimWindow::resolve("90", "50", 100.0),
            Err(ValidationError::StartNotBeforeEnd)
        );
    }

    #[test]
    fn trim_rejects_negative() {
        assert_eq!(
            TrimWindow::resolve("-1", "", 100.0),
            Err(ValidationError::NegativeStart)
        );
        assert_eq!(
            TrimWindow::resolve("", "-3", 100.0),
            Err(ValidationError::NegativeEnd)
        );
    }

    #[test]
    fn trim_requires_an_endpoint() {
        assert_eq!(
            TrimWindow::resolve("", "  ", 100.0),
            Err(ValidationError::MissingTrimPoints)
        );
        // Unreadable input counts as not provided.
        assert_eq!(
            TrimWindow::resolve("abc", "", 100.0),
            Err(ValidationError::MissingTrimPoints)
        );
    }

    #[test]
    fn trim_rejects_beyond_duration() {
        assert!(matches!(
            TrimWindow::resolve("100", "", 100.0),
            Err(ValidationError::StartBeyondDuration { .. })
        ));
        assert!(matches!(
            TrimWindow::resolve("", "1:41", 100.0),
            Err(ValidationError::EndBeyondDuration { .. })
        ));
        // End exactly at the duration is allowed.
        assert!(TrimWindow::resolve("", "1:40", 100.0).is_ok());
    }

    #[test]
    fn trim_args_with_seek_uses_duration() {
        let w = TrimWindow::resolve("10", "1:00", 100.0).unwrap();
        assert_eq!(w.length(), 50.0);
        assert_eq!(
            w.to_args("input.mp4", "output.mp4"),
            vec!["-ss", "10", "-i", "input.mp4", "-t", "50", "-c", "copy", "-y", "output.mp4"]
        );
    }

    #[test]
    fn trim_args_without_seek_uses_to() {
        let w = TrimWindow::resolve("0", "30.5", 100.0).unwrap();
        assert_eq!(
            w.to_args("input.mp3", "output.mp3"),
            vec!["-i", "input.mp3", "-to", "30.5", "-c", "copy", "-y", "output.mp3"]
        );
    }

    #[test]
    fn trim_args_start_only() {
        let w = TrimWindow::resolve("1:30", "", 100.0).unwrap();
        assert_eq!(w.effective_end(), 100.0);
        assert_eq!(
            w.to_args("input.wav", "output.wav"),
            vec!["-ss", "90", "-i", "input.wav", "-c", "copy", "-y", "output.wav"]
        );
    }
}
