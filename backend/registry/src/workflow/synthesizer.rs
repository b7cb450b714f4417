//! Result synthesizer — fabricates plausible analysis metrics and
//! transaction identifiers.
//!
//! Values are `base + r * spread` with `r` drawn uniformly from `[0, 1)`,
//! then clamped to the documented range of the field. Swapping the
//! [`MetricsProvider`] is the seam for a real computation engine.

use std::sync::Mutex;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::workflow::analysis::{AnalysisInput, AnalysisReport};

/// A fabricated metric: `base + r * spread`, clamped to `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub base: f64,
    pub spread: f64,
    pub min: f64,
    pub max: f64,
}

impl Spread {
    pub fn sample(&self, r: f64) -> f64 {
        (self.base + r * self.spread).clamp(self.min, self.max)
    }
}

pub const NDVI: Spread = Spread {
    base: 0.78,
    spread: 0.10,
    min: 0.0,
    max: 1.0,
};

pub const BIODIVERSITY_INDEX: Spread = Spread {
    base: 8.2,
    spread: 0.8,
    min: 0.0,
    max: 10.0,
};

pub const AREA_HEALTHY: Spread = Spread {
    base: 85.0,
    spread: 10.0,
    min: 0.0,
    max: 100.0,
};

pub const CONFIDENCE: Spread = Spread {
    base: 92.0,
    spread: 6.0,
    min: 0.0,
    max: 100.0,
};

/// Draws above this threshold flag an anomaly.
pub const ANOMALY_THRESHOLD: f64 = 0.7;
pub const ANOMALY_ALGAE_BLOOM: &str = "Unusual algae bloom in sector B-2";

pub trait MetricsProvider: Send + Sync {
    /// Produce the analysis report for a finished image analysis run.
    fn analyse(&self, input: &AnalysisInput) -> AnalysisReport;

    /// A fresh `0x`-prefixed, 64 hex digit transaction identifier.
    fn transaction_hash(&self) -> String;
}

/// Default provider backed by a seedable RNG.
pub struct RandomMetrics {
    rng: Mutex<StdRng>,
}

impl RandomMetrics {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic provider, for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut *rng)
    }
}

impl MetricsProvider for RandomMetrics {
    fn analyse(&self, input: &AnalysisInput) -> AnalysisReport {
        self.with_rng(|rng| {
            let anomalies = if rng.gen::<f64>() > ANOMALY_THRESHOLD {
                vec![ANOMALY_ALGAE_BLOOM.to_string()]
            } else {
                Vec::new()
            };
            AnalysisReport {
                project_id: input.project.id.clone(),
                images_analysed: input.attachments.len(),
                ndvi: NDVI.sample(rng.gen()),
                biodiversity_index: BIODIVERSITY_INDEX.sample(rng.gen()),
                area_healthy: AREA_HEALTHY.sample(rng.gen()),
                anomalies,
                confidence: CONFIDENCE.sample(rng.gen()),
                generated_at: Utc::now(),
            }
        })
    }

    fn transaction_hash(&self) -> String {
        let mut bytes = [0u8; 32];
        self.with_rng(|rng| rng.fill_bytes(&mut bytes));
        format!("0x{}", hex::encode(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::workflow::analysis::Attachment;

    fn input(images: usize) -> AnalysisInput {
        let project = Dataset::builtin()
            .unwrap()
            .find_project("proj-003")
            .unwrap()
            .clone();
        AnalysisInput {
            project,
            attachments: (0..images)
                .map(|i| Attachment::new(format!("survey-{i}.jpg"), 2_048_000, "image/jpeg"))
                .collect(),
        }
    }

    #[test]
    fn spread_sample_covers_range_and_clamps() {
        assert_eq!(NDVI.sample(0.0), 0.78);
        assert!((NDVI.sample(1.0) - 0.88).abs() < 1e-12);
        let wide = Spread {
            base: 0.9,
            spread: 0.5,
            min: 0.0,
            max: 1.0,
        };
        assert_eq!(wide.sample(1.0), 1.0);
    }

    #[test]
    fn analysis_reports_stay_within_bounds() {
        let metrics = RandomMetrics::seeded(42);
        let input = input(3);
        for _ in 0..500 {
            let report = metrics.analyse(&input);
            assert!((0.78..=0.88).contains(&report.ndvi));
            assert!((0.0..=1.0).contains(&report.ndvi));
            assert!((8.2..=9.0).contains(&report.biodiversity_index));
            assert!((85.0..=95.0).contains(&report.area_healthy));
            assert!((92.0..=98.0).contains(&report.confidence));
            assert!(report.anomalies.len() <= 1);
            assert_eq!(report.images_analysed, 3);
            assert_eq!(report.project_id, "proj-003");
        }
    }

    #[test]
    fn anomalies_appear_for_some_draws() {
        let metrics = RandomMetrics::seeded(7);
        let input = input(1);
        let flagged = (0..200)
            .filter(|_| !metrics.analyse(&input).anomalies.is_empty())
            .count();
        assert!(flagged > 0 && flagged < 200);
    }

    #[test]
    fn transaction_hash_shape() {
        let metrics = RandomMetrics::seeded(1);
        let hash = metrics.transaction_hash();
        assert_eq!(hash.len(), 66);
        assert!(hash.starts_with("0x"));
        assert!(hash[2..]
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(hash, metrics.transaction_hash());
    }

    #[test]
    fn seeded_providers_are_reproducible() {
        let a = RandomMetrics::seeded(99);
        let b = RandomMetrics::seeded(99);
        assert_eq!(a.transaction_hash(), b.transaction_hash());
    }
}
