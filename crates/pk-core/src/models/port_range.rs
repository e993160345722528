use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Closed port range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u16, u16)", into = "(u16, u16)")]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    /// Range scanned when a caller supplies neither a preferred port nor a range.
    pub const DEFAULT: PortRange = PortRange {
        start: 1024,
        end: 65535,
    };

    /// Build a range, swapping the bounds when they are given in reverse.
    pub fn new(start: u16, end: u16) -> Self {
        if start > end {
            Self {
                start: end,
                end: start,
            }
        } else {
            Self { start, end }
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && port <= self.end
    }

    pub fn ports(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<(u16, u16)> for PortRange {
    fn from((start, end): (u16, u16)) -> Self {
        Self::new(start, end)
    }
}

impl From<PortRange> for (u16, u16) {
    fn from(range: PortRange) -> Self {
        (range.start, range.end)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_bounds_are_swapped() {
        let range = PortRange::new(9000, 8000);
        assert_eq!(range.start, 8000);
        assert_eq!(range.end, 9000);
    }

    #[test]
    fn contains_is_inclusive() {
        let range = PortRange::new(8000, 8002);
        assert!(range.contains(8000));
        assert!(range.contains(8002));
        assert!(!range.contains(7999));
        assert!(!range.contains(8003));
        assert_eq!(range.ports().count(), 3);
    }

    #[test]
    fn single_port_range() {
        let range = PortRange::new(8080, 8080);
        assert_eq!(range.ports().collect::<Vec<_>>(), vec![8080]);
    }

    #[test]
    fn deserializes_from_pair() {
        let range: PortRange = serde_json::from_str("[5100, 5000]").unwrap();
        assert_eq!(range, PortRange::new(5000, 5100));
        assert_eq!(range.to_string(), "5000-5100");
    }
}
