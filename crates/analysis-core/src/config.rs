use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_WACC: f64 = 0.08;
pub const DEFAULT_TERMINAL_GROWTH: f64 = 0.025;
/// Growth assumed by the DCF when the snapshot carries none.
pub const DEFAULT_GROWTH: f64 = 0.05;
pub const DEFAULT_MONTE_CARLO_ITERATIONS: u32 = 150;
pub const DEFAULT_SECTOR_PROFILE: &str = "Default";

/// Reference multiples for one sector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorBenchmarks {
    pub pe: f64,
    pub pb: f64,
    pub ps: f64,
    pub ev_ebitda: f64,
}

impl SectorBenchmarks {
    pub const fn new(pe: f64, pb: f64, ps: f64, ev_ebitda: f64) -> Self {
        Self { pe, pb, ps, ev_ebitda }
    }
}

/// Sector name → benchmark multiples, with a fallback profile for unknown sectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkTable {
    profiles: BTreeMap<String, SectorBenchmarks>,
    fallback: SectorBenchmarks,
}

impl BenchmarkTable {
    pub fn new(profiles: BTreeMap<String, SectorBenchmarks>, fallback: SectorBenchmarks) -> Self {
        Self { profiles, fallback }
    }

    /// Benchmarks for `sector`, or the fallback profile when the sector is
    /// missing or not in the table.
    pub fn lookup(&self, sector: Option<&str>) -> SectorBenchmarks {
        sector
            .and_then(|s| self.profiles.get(s))
            .copied()
            .unwrap_or(self.fallback)
    }

    pub fn contains(&self, sector: &str) -> bool {
        self.profiles.contains_key(sector)
    }
}

impl Default for BenchmarkTable {
    fn default() -> Self {
        let profiles = [
            ("Technology", SectorBenchmarks::new(27.0, 8.0, 6.0, 20.0)),
            ("Communication Services", SectorBenchmarks::new(18.0, 4.0, 4.0, 12.0)),
            ("Consumer Cyclical", SectorBenchmarks::new(22.0, 5.0, 2.0, 13.0)),
            ("Consumer Defensive", SectorBenchmarks::new(21.0, 4.0, 2.5, 14.0)),
            ("Financial Services", SectorBenchmarks::new(12.0, 1.5, 2.0, 10.0)),
            ("Healthcare", SectorBenchmarks::new(20.0, 4.0, 5.0, 13.0)),
            ("Industrials", SectorBenchmarks::new(18.0, 3.0, 1.5, 11.0)),
            ("Energy", SectorBenchmarks::new(9.0, 1.5, 1.0, 5.0)),
            ("Basic Materials", SectorBenchmarks::new(17.0, 2.0, 1.5, 8.0)),
            ("Utilities", SectorBenchmarks::new(16.0, 1.7, 2.0, 9.0)),
            ("Real Estate", SectorBenchmarks::new(25.0, 2.2, 6.0, 18.0)),
        ]
        .into_iter()
        .map(|(name, b)| (name.to_string(), b))
        .collect();

        Self::new(profiles, SectorBenchmarks::new(18.0, 2.5, 2.0, 10.0))
    }
}

/// One macro scenario applied on top of the base DCF inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    pub weight: f64,
    pub growth_multiplier: f64,
    pub wacc_delta: f64,
    pub terminal_delta: f64,
}

impl ScenarioSpec {
    pub fn new(name: &str, weight: f64, growth_multiplier: f64, wacc_delta: f64, terminal_delta: f64) -> Self {
        Self {
            name: name.to_string(),
            weight,
            growth_multiplier,
            wacc_delta,
            terminal_delta,
        }
    }
}

/// Bear / Base / Bull, weighted 25 / 50 / 25.
pub fn default_scenarios() -> Vec<ScenarioSpec> {
    vec![
        ScenarioSpec::new("Bear", 0.25, 0.5, 0.02, -0.01),
        ScenarioSpec::new("Base", 0.50, 1.0, 0.0, 0.0),
        ScenarioSpec::new("Bull", 0.25, 1.2, -0.02, 0.005),
    ]
}

/// Immutable engine configuration, passed explicitly to every component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub benchmarks: BenchmarkTable,
    pub scenarios: Vec<ScenarioSpec>,
    pub monte_carlo_iterations: u32,
    pub default_growth: f64,
}

impl EngineConfig {
    pub fn with_monte_carlo_iterations(mut self, iterations: u32) -> Self {
        self.monte_carlo_iterations = iterations;
        self
    }

    pub fn with_benchmarks(mut self, benchmarks: BenchmarkTable) -> Self {
        self.benchmarks = benchmarks;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            benchmarks: BenchmarkTable::default(),
            scenarios: default_scenarios(),
            monte_carlo_iterations: DEFAULT_MONTE_CARLO_ITERATIONS,
            default_growth: DEFAULT_GROWTH,
        }
    }
}
