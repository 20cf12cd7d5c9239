//! Source trust tiers.
//!
//! Maps a collector-reported source name to a trust tier by case-insensitive
//! substring match against configured tier lists. Unknown sources land in
//! tier 3. The tier→weight mapping lives in `ScoringConfig`.

use serde::{Deserialize, Serialize};

use crate::text::normalize_lower;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceTiers {
    /// Official agencies (tier 1).
    pub tier1: Vec<String>,
    /// Reputable outlets (tier 2).
    pub tier2: Vec<String>,
}

impl Default for SourceTiers {
    fn default() -> Self {
        let list = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            tier1: list(&["AA", "Anadolu Ajansı", "TRT", "DHA", "IHA", "ANKA"]),
            tier2: list(&[
                "Sözcü",
                "Hürriyet",
                "Habertürk",
                "Cumhuriyet",
                "Milliyet",
                "T24",
            ]),
        }
    }
}

impl SourceTiers {
    /// Resolve the trust tier for a source name. Matching is by normalized
    /// substring so channel handles like "AA Canlı" still resolve to tier 1.
    pub fn tier_for(&self, source_name: &str) -> u8 {
        let name = normalize_lower(source_name.trim());
        if name.is_empty() {
            return 3;
        }
        if self.tier1.iter().any(|s| name.contains(&normalize_lower(s))) {
            return 1;
        }
        if self.tier2.iter().any(|s| name.contains(&normalize_lower(s))) {
            return 2;
        }
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn official_agencies_are_tier_one() {
        let tiers = SourceTiers::default();
        assert_eq!(tiers.tier_for("TRT Haber"), 1);
        assert_eq!(tiers.tier_for("anadolu ajansı"), 1);
    }

    #[test]
    fn reputable_outlets_are_tier_two() {
        let tiers = SourceTiers::default();
        assert_eq!(tiers.tier_for("Hürriyet"), 2);
        assert_eq!(tiers.tier_for("sözcü gazetesi"), 2);
    }

    #[test]
    fn unknown_or_empty_sources_fall_to_tier_three() {
        let tiers = SourceTiers::default();
        assert_eq!(tiers.tier_for("Rastgele Kanal"), 3);
        assert_eq!(tiers.tier_for("  "), 3);
    }
}
