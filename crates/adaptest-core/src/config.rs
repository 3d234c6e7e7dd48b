//! Test configuration: estimation method, selection criterion, stopping
//! thresholds, and the numerical tuning knobs the algorithms expose.
//!
//! Invalid combinations are rejected by [`CatConfig::validate`] at
//! construction time, never mid-session.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How ability is estimated from the response history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimationMethod {
    /// Expected a posteriori: posterior mean over a quadrature grid.
    /// Stable from the very first response; the default.
    Eap,
    /// Maximum likelihood with Fisher scoring; falls back to EAP whenever
    /// the likelihood has no interior maximum.
    Mle,
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimationMethod::Eap => write!(f, "eap"),
            EstimationMethod::Mle => write!(f, "mle"),
        }
    }
}

impl FromStr for EstimationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eap" => Ok(EstimationMethod::Eap),
            "mle" => Ok(EstimationMethod::Mle),
            other => Err(format!("unknown estimation method: {other}")),
        }
    }
}

/// How the next item is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionCriterion {
    /// Maximum Fisher information at the current θ estimate.
    Mi,
    /// Information averaged over a small window around θ, robust to
    /// point-estimate noise.
    Mfi,
    /// Expected Kullback-Leibler divergence between response distributions
    /// at θ ± δ.
    Kl,
}

impl fmt::Display for SelectionCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionCriterion::Mi => write!(f, "mi"),
            SelectionCriterion::Mfi => write!(f, "mfi"),
            SelectionCriterion::Kl => write!(f, "kl"),
        }
    }
}

impl FromStr for SelectionCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mi" => Ok(SelectionCriterion::Mi),
            "mfi" => Ok(SelectionCriterion::Mfi),
            "kl" => Ok(SelectionCriterion::Kl),
            other => Err(format!("unknown selection criterion: {other}")),
        }
    }
}

/// Full configuration for a CAT run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatConfig {
    /// Ability estimation method.
    #[serde(default = "default_estimation")]
    pub estimation: EstimationMethod,
    /// Item selection criterion.
    #[serde(default = "default_selection")]
    pub selection: SelectionCriterion,
    /// Minimum items before the SEM rule may stop the test.
    #[serde(default = "default_min_items")]
    pub min_items: usize,
    /// Hard cap on administered items.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// SEM threshold: stop once `se <= min_sem` (after `min_items`).
    #[serde(default = "default_min_sem")]
    pub min_sem: f64,
    /// Prior mean for θ.
    #[serde(default)]
    pub prior_mean: f64,
    /// Prior standard deviation for θ.
    #[serde(default = "default_prior_sd")]
    pub prior_sd: f64,
    /// Items administered first, in order, regardless of the criterion.
    #[serde(default)]
    pub fixed_items: Vec<String>,
    /// Worker count for the batch executor.
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: usize,
    /// Sessions processed per batch chunk (back-pressure bound).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Number of equally spaced EAP quadrature points.
    #[serde(default = "default_quad_points")]
    pub quad_points: usize,
    /// Quadrature grid spans `prior_mean ± theta_span · prior_sd`.
    #[serde(default = "default_theta_span")]
    pub theta_span: f64,
    /// Half-width of the MFI information window.
    #[serde(default = "default_mfi_window")]
    pub mfi_window: f64,
    /// Offset δ for the KL criterion.
    #[serde(default = "default_kl_delta")]
    pub kl_delta: f64,
    /// Maximum entries in the computation cache.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,
    /// Cache entry time-to-live in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// θ bucket width for cache keys.
    #[serde(default = "default_cache_resolution")]
    pub cache_resolution: f64,
    /// Maximum age of an acceptable recovery record, in seconds.
    #[serde(default = "default_recovery_max_age_secs")]
    pub recovery_max_age_secs: u64,
}

fn default_estimation() -> EstimationMethod {
    EstimationMethod::Eap
}
fn default_selection() -> SelectionCriterion {
    SelectionCriterion::Mi
}
fn default_min_items() -> usize {
    5
}
fn default_max_items() -> usize {
    20
}
fn default_min_sem() -> f64 {
    0.3
}
fn default_prior_sd() -> f64 {
    1.0
}
fn default_parallel_workers() -> usize {
    4
}
fn default_batch_size() -> usize {
    256
}
fn default_quad_points() -> usize {
    61
}
fn default_theta_span() -> f64 {
    4.0
}
fn default_mfi_window() -> f64 {
    0.3
}
fn default_kl_delta() -> f64 {
    0.5
}
fn default_cache_max_entries() -> usize {
    65_536
}
fn default_cache_ttl_secs() -> u64 {
    3600
}
fn default_cache_resolution() -> f64 {
    0.1
}
fn default_recovery_max_age_secs() -> u64 {
    86_400
}

impl Default for CatConfig {
    fn default() -> Self {
        Self {
            estimation: default_estimation(),
            selection: default_selection(),
            min_items: default_min_items(),
            max_items: default_max_items(),
            min_sem: default_min_sem(),
            prior_mean: 0.0,
            prior_sd: default_prior_sd(),
            fixed_items: Vec::new(),
            parallel_workers: default_parallel_workers(),
            batch_size: default_batch_size(),
            quad_points: default_quad_points(),
            theta_span: default_theta_span(),
            mfi_window: default_mfi_window(),
            kl_delta: default_kl_delta(),
            cache_max_entries: default_cache_max_entries(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_resolution: default_cache_resolution(),
            recovery_max_age_secs: default_recovery_max_age_secs(),
        }
    }
}

impl CatConfig {
    /// Reject invalid parameter combinations up front.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_items == 0 {
            return Err(ConfigError::ZeroMaxItems);
        }
        if self.min_items > self.max_items {
            return Err(ConfigError::ItemBoundsInverted {
                min_items: self.min_items,
                max_items: self.max_items,
            });
        }
        if self.min_sem <= 0.0 {
            return Err(ConfigError::NonPositiveSem(self.min_sem));
        }
        if self.prior_sd <= 0.0 {
            return Err(ConfigError::NonPositivePriorSd(self.prior_sd));
        }
        if self.parallel_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.quad_points < 3 {
            return Err(ConfigError::TooFewQuadPoints(self.quad_points));
        }

        let positive = [
            ("theta_span", self.theta_span),
            ("mfi_window", self.mfi_window),
            ("kl_delta", self.kl_delta),
            ("cache_resolution", self.cache_resolution),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::NonPositiveTuning { name, value });
            }
        }

        let mut seen = std::collections::HashSet::new();
        for id in &self.fixed_items {
            if !seen.insert(id) {
                return Err(ConfigError::DuplicateFixedItem(id.clone()));
            }
        }

        Ok(())
    }

    /// Lower edge of the EAP quadrature grid.
    pub fn theta_min(&self) -> f64 {
        self.prior_mean - self.theta_span * self.prior_sd
    }

    /// Upper edge of the EAP quadrature grid.
    pub fn theta_max(&self) -> f64 {
        self.prior_mean + self.theta_span * self.prior_sd
    }
}

/// Load and validate a config from a TOML file.
pub fn load_config(path: &Path) -> Result<CatConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let config: CatConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(config)
}
