//! Codepoint sets used to drive subsetting.

use crate::MergeError;
use std::fmt;
use std::str::FromStr;

/// An ordered set of disjoint, closed codepoint intervals.
///
/// Construction sorts the intervals and coalesces overlapping or adjacent ones, so the
/// stored intervals are always strictly increasing and separated by at least one
/// codepoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicodeRange {
    intervals: Vec<(u32, u32)>,
}

impl UnicodeRange {
    pub fn new(intervals: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut sorted: Vec<(u32, u32)> = intervals
            .into_iter()
            .map(|(a, b)| (a.min(b), a.max(b)))
            .collect();
        sorted.sort_unstable();
        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(sorted.len());
        for (start, end) in sorted {
            if let Some(last) = merged.last_mut() {
                if start <= last.1.saturating_add(1) {
                    last.1 = last.1.max(end);
                    continue;
                }
            }
            merged.push((start, end));
        }
        UnicodeRange { intervals: merged }
    }

    /// Printable 7-bit ASCII, space through tilde
    pub fn latin() -> Self {
        UnicodeRange::new([(0x20, 0x7E)])
    }

    /// Arabic, Arabic Supplement, Arabic Extended-A, Presentation Forms A and B
    /// and the Arabic-Indic digits
    pub fn arabic() -> Self {
        UnicodeRange::new([
            (0x0600, 0x06FF),
            (0x0750, 0x077F),
            (0x08A0, 0x08FF),
            (0xFB50, 0xFDFF),
            (0xFE70, 0xFEFF),
            (0x0660, 0x0669),
        ])
    }

    pub fn contains(&self, codepoint: u32) -> bool {
        self.intervals
            .binary_search_by(|&(start, end)| {
                if end < codepoint {
                    std::cmp::Ordering::Less
                } else if start > codepoint {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn intervals(&self) -> &[(u32, u32)] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

impl fmt::Display for UnicodeRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parts: Vec<String> = self
            .intervals
            .iter()
            .map(|&(start, end)| {
                if start == end {
                    format!("U+{:04X}", start)
                } else {
                    format!("U+{:04X}-{:04X}", start, end)
                }
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Parses `U+0600-06FF,U+FB50-FDFF` style lists
impl FromStr for UnicodeRange {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |part: &str| MergeError::Config {
            message: format!("Invalid unicode range '{}'", part),
            suggestion: "Use the form U+0600-06FF, separated by commas".to_string(),
        };
        let parse_hex = |text: &str, part: &str| {
            let text = text.trim();
            let text = text
                .strip_prefix("U+")
                .or_else(|| text.strip_prefix("u+"))
                .unwrap_or(text);
            u32::from_str_radix(text, 16).map_err(|_| invalid(part))
        };
        let mut intervals = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let interval = match part.split_once('-') {
                Some((a, b)) => (parse_hex(a, part)?, parse_hex(b, part)?),
                None => {
                    let cp = parse_hex(part, part)?;
                    (cp, cp)
                }
            };
            intervals.push(interval);
        }
        Ok(UnicodeRange::new(intervals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_intervals_coalesce() {
        let range = UnicodeRange::new([(10, 20), (15, 30), (31, 40), (50, 50)]);
        assert_eq!(range.intervals(), &[(10, 40), (50, 50)]);
    }

    #[test]
    fn test_arabic_digits_are_inside_arabic_block() {
        let arabic = UnicodeRange::arabic();
        assert_eq!(arabic.intervals().len(), 5);
        assert!(arabic.contains(0x0665));
        assert!(arabic.contains(0xFEFC));
        assert!(!arabic.contains(0x0041));
        assert!(!arabic.contains(0x0700));
    }

    #[test]
    fn test_latin_bounds_are_inclusive() {
        let latin = UnicodeRange::latin();
        assert!(latin.contains(0x20));
        assert!(latin.contains(0x7E));
        assert!(!latin.contains(0x7F));
        assert!(!latin.contains(0x1F));
    }

    #[test]
    fn test_parse_and_display() {
        let range: UnicodeRange = "U+0600-06FF, u+0020, 7E".parse().unwrap();
        assert_eq!(range.to_string(), "U+0020,U+007E,U+0600-06FF");
        assert!("U+XYZ".parse::<UnicodeRange>().is_err());
    }
}
