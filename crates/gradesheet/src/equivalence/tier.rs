use std::fmt;

use serde::{Deserialize, Serialize};

/// How much of a criterion's points a candidate answer earns.
///
/// Variants are declared from worst to best so the derived ordering makes
/// `Full` the maximum; picking the best of several tiers is `max()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditTier {
    None,
    LowPartial,
    HighPartial,
    Full,
}

impl CreditTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditTier::None => "none",
            CreditTier::LowPartial => "low_partial",
            CreditTier::HighPartial => "high_partial",
            CreditTier::Full => "full",
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, CreditTier::Full)
    }

    /// Any credit at all, but not full credit.
    pub fn is_partial(&self) -> bool {
        matches!(self, CreditTier::LowPartial | CreditTier::HighPartial)
    }
}

impl fmt::Display for CreditTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fraction of a criterion's maximum awarded at each tier. `Full` is always
/// 1.0 and `None` always 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditScale {
    pub high_partial: f64,
    pub low_partial: f64,
}

impl Default for CreditScale {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl CreditScale {
    pub const STANDARD: CreditScale = CreditScale {
        high_partial: 0.75,
        low_partial: 0.5,
    };

    pub const fn new(high_partial: f64, low_partial: f64) -> Self {
        Self {
            high_partial,
            low_partial,
        }
    }

    pub fn fraction(&self, tier: CreditTier) -> f64 {
        match tier {
            CreditTier::Full => 1.0,
            CreditTier::HighPartial => self.high_partial,
            CreditTier::LowPartial => self.low_partial,
            CreditTier::None => 0.0,
        }
    }

    pub fn points(&self, tier: CreditTier, max_points: f64) -> f64 {
        self.fraction(tier) * max_points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_are_totally_ordered() {
        assert!(CreditTier::Full > CreditTier::HighPartial);
        assert!(CreditTier::HighPartial > CreditTier::LowPartial);
        assert!(CreditTier::LowPartial > CreditTier::None);
        let best = [CreditTier::LowPartial, CreditTier::Full, CreditTier::None]
            .into_iter()
            .max();
        assert_eq!(best, Some(CreditTier::Full));
    }

    #[test]
    fn test_standard_scale() {
        let scale = CreditScale::default();
        assert_eq!(scale.points(CreditTier::Full, 2.0), 2.0);
        assert_eq!(scale.points(CreditTier::HighPartial, 2.0), 1.5);
        assert_eq!(scale.points(CreditTier::LowPartial, 2.0), 1.0);
        assert_eq!(scale.points(CreditTier::None, 2.0), 0.0);
    }

    #[test]
    fn test_tier_serializes_snake_case() {
        let json = serde_json::to_string(&CreditTier::HighPartial).unwrap();
        assert_eq!(json, "\"high_partial\"");
        assert!(CreditTier::LowPartial.is_partial());
        assert!(!CreditTier::Full.is_partial());
    }
}
