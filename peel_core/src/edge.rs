//! Rising-edge detection for the two limit switches.

/// The actionable edge of a tick. At most one; a simultaneous double edge
/// resolves to `Lower` (documented tie-break) and the upper edge is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    None,
    Lower,
    Upper,
}

/// Result of one switch scan.
#[derive(Debug, Clone, Copy)]
pub struct SwitchScan {
    pub lower: bool,
    pub upper: bool,
    pub edge: Edge,
    /// Both switches LOW this tick after at least one was HIGH last tick.
    pub released: bool,
}

/// Tracks previous vs. current debounced reads of both switches. No extra
/// debounce filtering; transitions are taken as-is each tick.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    lower_prev: bool,
    upper_prev: bool,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one tick's reads. Previous values are updated unconditionally
    /// regardless of which branch consumes the edge.
    pub fn scan(&mut self, lower: bool, upper: bool) -> SwitchScan {
        let edge = if lower && !self.lower_prev {
            Edge::Lower
        } else if upper && !self.upper_prev {
            Edge::Upper
        } else {
            Edge::None
        };
        let released = !lower && !upper && (self.lower_prev || self.upper_prev);
        self.lower_prev = lower;
        self.upper_prev = upper;
        SwitchScan {
            lower,
            upper,
            edge,
            released,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_switch_fires_once_per_high_period() {
        let mut d = EdgeDetector::new();
        assert_eq!(d.scan(true, false).edge, Edge::Lower);
        for _ in 0..10 {
            assert_eq!(d.scan(true, false).edge, Edge::None);
        }
        assert_eq!(d.scan(false, false).edge, Edge::None);
        assert_eq!(d.scan(true, false).edge, Edge::Lower);
    }

    #[test]
    fn simultaneous_edges_resolve_to_lower_and_consume_upper() {
        let mut d = EdgeDetector::new();
        assert_eq!(d.scan(true, true).edge, Edge::Lower);
        // Upper stayed HIGH; its edge must not re-fire next tick.
        assert_eq!(d.scan(true, true).edge, Edge::None);
    }

    #[test]
    fn release_reported_when_both_drop_low() {
        let mut d = EdgeDetector::new();
        let _ = d.scan(false, true);
        let s = d.scan(false, false);
        assert!(s.released);
        assert!(!d.scan(false, false).released);
    }
}
