use analysis_core::DEFAULT_MONTE_CARLO_ITERATIONS;
use analysis_orchestrator::DEFAULT_CACHE_TTL_SECS;
use anyhow::{Context, Result};
use std::env;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Process settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Seconds an analysis stays cached; zero or less disables the cache.
    pub cache_ttl_secs: i64,
    /// Empty means any origin.
    pub allow_origins: Vec<String>,
    pub monte_carlo_iterations: u32,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = lookup("ANALYZER_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let cache_ttl_secs = lookup("ANALYZER_CACHE_TTL")
            .unwrap_or_else(|| DEFAULT_CACHE_TTL_SECS.to_string())
            .trim()
            .parse()
            .context("ANALYZER_CACHE_TTL must be an integer number of seconds")?;

        let allow_origins = lookup("ANALYZER_ALLOW_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let monte_carlo_iterations = lookup("ANALYZER_MC_ITERATIONS")
            .unwrap_or_else(|| DEFAULT_MONTE_CARLO_ITERATIONS.to_string())
            .trim()
            .parse()
            .context("ANALYZER_MC_ITERATIONS must be a non-negative integer")?;

        Ok(Self {
            bind_addr,
            cache_ttl_secs,
            allow_origins,
            monte_carlo_iterations,
        })
    }
}
