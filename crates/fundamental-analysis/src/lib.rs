pub mod consistency;
pub mod metrics;
pub mod normalizer;
pub mod ratios;
pub mod scoring;

use analysis_core::{
    AdvancedMetrics, BenchmarkTable, ConsistencyIssue, FundamentalsSnapshot, RawBundle, RatioResult, ScoreSet,
};
use serde::{Deserialize, Serialize};

pub use consistency::consistency_checks;
pub use metrics::compute_advanced_metrics;
pub use normalizer::{apply_overrides, fill_gaps, normalize, NormalizedSnapshot};
pub use ratios::{compute_ratios, enterprise_value, find_ratio};
pub use scoring::aggregate_scores;

/// Everything derived from a snapshot without a discount rate: multiples,
/// scores, sanity checks and quality metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundamentalAnalysis {
    pub ratios: Vec<RatioResult>,
    pub scores: ScoreSet,
    pub consistency: Vec<ConsistencyIssue>,
    pub advanced: AdvancedMetrics,
}

pub struct FundamentalAnalysisEngine {
    benchmarks: BenchmarkTable,
}

impl FundamentalAnalysisEngine {
    pub fn new(benchmarks: BenchmarkTable) -> Self {
        Self { benchmarks }
    }

    pub fn normalize(&self, raw: &RawBundle, sector_override: Option<&str>) -> NormalizedSnapshot {
        normalize(raw, sector_override, &self.benchmarks)
    }

    pub fn analyze(&self, snapshot: &FundamentalsSnapshot) -> FundamentalAnalysis {
        let ratios = compute_ratios(snapshot);
        let scores = aggregate_scores(snapshot, &ratios);
        tracing::debug!(
            "{}: composite score {:.1} from {} ratios",
            snapshot.ticker,
            scores.composite,
            ratios.iter().filter(|r| r.verdict.is_definite()).count()
        );

        FundamentalAnalysis {
            consistency: consistency_checks(snapshot),
            advanced: compute_advanced_metrics(snapshot),
            ratios,
            scores,
        }
    }
}

impl Default for FundamentalAnalysisEngine {
    fn default() -> Self {
        Self::new(BenchmarkTable::default())
    }
}
