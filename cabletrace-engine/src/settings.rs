use serde::{Deserialize, Serialize};

/// Réglages de synthèse (section `synthesis` du kernel.yaml)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SynthesisSettings {
    /// Part des liens d'un bucket qui reçoivent switch + équipement
    pub full_ratio_percent: u8,
    /// Tentatives d'insertion d'une ligne complète face aux conflits d'index
    pub max_insert_attempts: u32,
    /// Seed fixe pour rejouer une synthèse (None = entropie)
    pub rng_seed: Option<u64>,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            full_ratio_percent: 80,
            max_insert_attempts: 5,
            rng_seed: None,
        }
    }
}

impl SynthesisSettings {
    /// floor(ratio × taille), en arithmétique entière
    pub fn full_count(&self, bucket_len: usize) -> usize {
        let pct = usize::from(self.full_ratio_percent.min(100));
        bucket_len * pct / 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_count_floors() {
        let s = SynthesisSettings::default();
        assert_eq!(s.full_count(10), 8);
        assert_eq!(s.full_count(1), 0);
        assert_eq!(s.full_count(0), 0);
        assert_eq!(s.full_count(5), 4);
        assert_eq!(s.full_count(9), 7);
    }

    #[test]
    fn test_ratio_is_capped() {
        let s = SynthesisSettings { full_ratio_percent: 250, ..Default::default() };
        assert_eq!(s.full_count(7), 7);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let s: SynthesisSettings = serde_json::from_str(r#"{"rng_seed": 9}"#).unwrap();
        assert_eq!(s.full_ratio_percent, 80);
        assert_eq!(s.max_insert_attempts, 5);
        assert_eq!(s.rng_seed, Some(9));
    }
}
