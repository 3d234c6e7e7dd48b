//! Ability estimation from an ordered response history.
//!
//! EAP integrates the posterior over an equally spaced quadrature grid and
//! is stable from the very first response. MLE runs Fisher-scoring Newton
//! iterations on the score function, and silently falls back to EAP
//! whenever the likelihood has no interior maximum or the iteration fails
//! to converge; estimation never errors mid-session.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{CatConfig, EstimationMethod};
use crate::irt;
use crate::model::{ItemBank, Model, ResponseRecord};

const MLE_MAX_ITERATIONS: usize = 50;
const MLE_STEP_TOLERANCE: f64 = 1e-5;
const MLE_MAX_STEP: f64 = 1.0;
const MIN_INFORMATION: f64 = 1e-10;

/// Which estimator actually produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// No usable responses; the prior was returned as-is.
    Prior,
    Eap,
    Mle,
    /// MLE was requested but undefined or non-convergent; EAP was used.
    EapFallback,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Prior => write!(f, "prior"),
            Method::Eap => write!(f, "EAP"),
            Method::Mle => write!(f, "MLE"),
            Method::EapFallback => write!(f, "EAP-fallback"),
        }
    }
}

/// An ability estimate with its standard error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub theta: f64,
    pub se: f64,
    pub method: Method,
}

/// Estimate θ and its standard error from the response history.
///
/// Responses whose item is unknown or whose value is out of range for the
/// item are excluded from the likelihood; if nothing usable remains the
/// prior is returned unchanged.
pub fn estimate(responses: &[ResponseRecord], bank: &ItemBank, config: &CatConfig) -> Estimate {
    let scored = scored_responses(responses, bank);
    if scored.is_empty() {
        return Estimate {
            theta: config.prior_mean,
            se: config.prior_sd,
            method: Method::Prior,
        };
    }

    match config.estimation {
        EstimationMethod::Eap => eap(&scored, config, Method::Eap),
        EstimationMethod::Mle => {
            if !mle_defined(&scored) {
                tracing::debug!(
                    responses = scored.len(),
                    "likelihood monotone, falling back to EAP"
                );
                return eap(&scored, config, Method::EapFallback);
            }
            match mle(&scored, config) {
                Some(estimate) => estimate,
                None => {
                    tracing::debug!("MLE failed to converge, falling back to EAP");
                    eap(&scored, config, Method::EapFallback)
                }
            }
        }
    }
}

/// Response history reduced to (model, value) pairs the likelihood can use.
fn scored_responses<'a>(
    responses: &[ResponseRecord],
    bank: &'a ItemBank,
) -> Vec<(&'a Model, u32)> {
    responses
        .iter()
        .filter_map(|r| {
            let item = bank.get(&r.item_id)?;
            irt::category_index(&item.model, r.value)?;
            Some((&item.model, r.value))
        })
        .collect()
}

fn eap(scored: &[(&Model, u32)], config: &CatConfig, method: Method) -> Estimate {
    let n = config.quad_points;
    let lo = config.theta_min();
    let step = (config.theta_max() - lo) / (n - 1) as f64;

    let mut log_posterior = Vec::with_capacity(n);
    let mut nodes = Vec::with_capacity(n);
    for q in 0..n {
        let theta = lo + q as f64 * step;
        let z = (theta - config.prior_mean) / config.prior_sd;
        let mut lp = -0.5 * z * z;
        for &(model, value) in scored {
            if let Some(ll) = irt::log_likelihood(model, theta, value) {
                lp += ll;
            }
        }
        nodes.push(theta);
        log_posterior.push(lp);
    }

    let log_norm = irt::logsumexp(&log_posterior);
    let posterior: Vec<f64> = log_posterior.iter().map(|&lp| (lp - log_norm).exp()).collect();

    let mean: f64 = posterior.iter().zip(&nodes).map(|(&p, &t)| p * t).sum();
    let variance: f64 = posterior
        .iter()
        .zip(&nodes)
        .map(|(&p, &t)| p * (t - mean) * (t - mean))
        .sum();

    Estimate {
        theta: mean,
        se: variance.max(0.0).sqrt(),
        method,
    }
}

/// MLE has an interior maximum only when the history is mixed: at least
/// two usable responses, not all at their item's lowest category and not
/// all at the highest.
fn mle_defined(scored: &[(&Model, u32)]) -> bool {
    if scored.len() < 2 {
        return false;
    }
    let mut any_above_min = false;
    let mut any_below_max = false;
    for &(model, value) in scored {
        // Values were validated by `scored_responses`.
        let Some(cat) = irt::category_index(model, value) else {
            continue;
        };
        if cat > 0 {
            any_above_min = true;
        }
        if cat + 1 < model.category_count() {
            any_below_max = true;
        }
    }
    any_above_min && any_below_max
}

fn mle(scored: &[(&Model, u32)], config: &CatConfig) -> Option<Estimate> {
    let mut theta = config.prior_mean;

    for _ in 0..MLE_MAX_ITERATIONS {
        let mut score_sum = 0.0;
        let mut info_sum = 0.0;
        for &(model, value) in scored {
            score_sum += irt::score(model, theta, value)?;
            info_sum += irt::information(model, theta);
        }
        if info_sum < MIN_INFORMATION {
            return None;
        }

        let step = (score_sum / info_sum).clamp(-MLE_MAX_STEP, MLE_MAX_STEP);
        theta = (theta + step).clamp(config.theta_min(), config.theta_max());

        if step.abs() < MLE_STEP_TOLERANCE {
            let info: f64 = scored
                .iter()
                .map(|&(model, _)| irt::information(model, theta))
                .sum();
            return Some(Estimate {
                theta,
                se: 1.0 / info.sqrt(),
                method: Method::Mle,
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Item;

    fn two_pl_bank() -> ItemBank {
        ItemBank::new(vec![
            Item {
                id: "i1".into(),
                model: Model::TwoPl { a: 1.2, b: 0.0 },
            },
            Item {
                id: "i2".into(),
                model: Model::TwoPl { a: 0.8, b: -0.5 },
            },
            Item {
                id: "i3".into(),
                model: Model::TwoPl { a: 1.0, b: 0.5 },
            },
        ])
        .unwrap()
    }

    fn graded_bank() -> ItemBank {
        ItemBank::new(vec![
            Item {
                id: "g1".into(),
                model: Model::Graded {
                    a: 1.3,
                    thresholds: vec![-2.0, -0.5, 0.5, 2.0],
                },
            },
            Item {
                id: "g2".into(),
                model: Model::Graded {
                    a: 1.0,
                    thresholds: vec![-1.0, 0.0, 1.0],
                },
            },
        ])
        .unwrap()
    }

    fn response(item_id: &str, value: u32) -> ResponseRecord {
        ResponseRecord {
            item_id: item_id.into(),
            value,
        }
    }

    #[test]
    fn empty_history_returns_prior_exactly() {
        let bank = two_pl_bank();
        let config = CatConfig::default();
        let est = estimate(&[], &bank, &config);
        assert_eq!(est.theta, config.prior_mean);
        assert_eq!(est.se, config.prior_sd);
        assert_eq!(est.method, Method::Prior);
    }

    #[test]
    fn all_invalid_behaves_as_empty() {
        let bank = two_pl_bank();
        let config = CatConfig::default();
        let responses = vec![response("i1", 7), response("ghost", 1)];
        let est = estimate(&responses, &bank, &config);
        assert_eq!(est.method, Method::Prior);
        assert_eq!(est.theta, config.prior_mean);
    }

    #[test]
    fn single_correct_response_pulls_theta_up() {
        // First call returns the prior; one correct answer on a b=0 item
        // must move the estimate above zero.
        let bank = two_pl_bank();
        let config = CatConfig::default();
        let est = estimate(&[response("i1", 1)], &bank, &config);
        assert_eq!(est.method, Method::Eap);
        assert!(est.theta > 0.0, "theta {} should be positive", est.theta);
        assert!(est.se < config.prior_sd);
    }

    #[test]
    fn single_incorrect_response_pulls_theta_down() {
        let bank = two_pl_bank();
        let config = CatConfig::default();
        let est = estimate(&[response("i1", 0)], &bank, &config);
        assert!(est.theta < 0.0);
    }

    #[test]
    fn invalid_values_are_excluded_not_fatal() {
        let bank = two_pl_bank();
        let config = CatConfig::default();
        let with_junk = vec![response("i1", 1), response("i2", 9)];
        let clean = vec![response("i1", 1)];
        let a = estimate(&with_junk, &bank, &config);
        let b = estimate(&clean, &bank, &config);
        assert!((a.theta - b.theta).abs() < 1e-12);
    }

    #[test]
    fn se_shrinks_with_more_responses() {
        let bank = two_pl_bank();
        let config = CatConfig::default();
        let one = estimate(&[response("i1", 1)], &bank, &config);
        let three = estimate(
            &[response("i1", 1), response("i2", 0), response("i3", 1)],
            &bank,
            &config,
        );
        assert!(three.se < one.se);
    }

    #[test]
    fn monotonicity_upgrading_a_response_never_lowers_theta() {
        let bank = two_pl_bank();
        let config = CatConfig::default();
        let low = vec![response("i1", 0), response("i2", 1), response("i3", 0)];
        let high = vec![response("i1", 1), response("i2", 1), response("i3", 0)];
        let est_low = estimate(&low, &bank, &config);
        let est_high = estimate(&high, &bank, &config);
        assert!(est_high.theta >= est_low.theta);
    }

    #[test]
    fn monotonicity_higher_graded_category() {
        let bank = graded_bank();
        let config = CatConfig::default();
        let low = vec![response("g1", 2), response("g2", 3)];
        let high = vec![response("g1", 4), response("g2", 3)];
        let est_low = estimate(&low, &bank, &config);
        let est_high = estimate(&high, &bank, &config);
        assert!(est_high.theta >= est_low.theta);
    }

    #[test]
    fn mle_undefined_for_all_correct_falls_back() {
        let bank = two_pl_bank();
        let config = CatConfig {
            estimation: EstimationMethod::Mle,
            ..CatConfig::default()
        };
        let responses = vec![response("i1", 1), response("i2", 1)];
        let est = estimate(&responses, &bank, &config);
        assert_eq!(est.method, Method::EapFallback);

        // The fallback must agree with a plain EAP run.
        let eap_config = CatConfig::default();
        let eap = estimate(&responses, &bank, &eap_config);
        assert!((est.theta - eap.theta).abs() < 1e-12);
        assert!((est.se - eap.se).abs() < 1e-12);
    }

    #[test]
    fn mle_single_response_falls_back() {
        let bank = two_pl_bank();
        let config = CatConfig {
            estimation: EstimationMethod::Mle,
            ..CatConfig::default()
        };
        let est = estimate(&[response("i1", 1)], &bank, &config);
        assert_eq!(est.method, Method::EapFallback);
    }

    #[test]
    fn mle_converges_on_mixed_history() {
        let bank = two_pl_bank();
        let config = CatConfig {
            estimation: EstimationMethod::Mle,
            ..CatConfig::default()
        };
        let responses = vec![response("i1", 1), response("i2", 0), response("i3", 1)];
        let est = estimate(&responses, &bank, &config);
        assert_eq!(est.method, Method::Mle);
        assert!(est.se.is_finite() && est.se > 0.0);

        // At the MLE the score function is (numerically) zero.
        let score: f64 = responses
            .iter()
            .map(|r| irt::score(&bank.get(&r.item_id).unwrap().model, est.theta, r.value).unwrap())
            .sum();
        assert!(score.abs() < 1e-3, "score at MLE was {score}");
    }

    #[test]
    fn mle_defined_for_mixed_graded_categories() {
        let bank = graded_bank();
        let config = CatConfig {
            estimation: EstimationMethod::Mle,
            ..CatConfig::default()
        };
        // Neither all-minimum nor all-maximum categories.
        let responses = vec![response("g1", 3), response("g2", 2)];
        let est = estimate(&responses, &bank, &config);
        assert_eq!(est.method, Method::Mle);

        // All lowest categories: monotone likelihood, must fall back.
        let floor = vec![response("g1", 1), response("g2", 1)];
        let est = estimate(&floor, &bank, &config);
        assert_eq!(est.method, Method::EapFallback);
    }

    #[test]
    fn eap_with_extreme_history_stays_finite() {
        let bank = two_pl_bank();
        let config = CatConfig::default();
        let responses: Vec<_> = (0..3).map(|_| response("i1", 1)).collect();
        let est = estimate(&responses, &bank, &config);
        assert!(est.theta.is_finite());
        assert!(est.se.is_finite());
        assert!(est.theta <= config.theta_max());
    }
}
