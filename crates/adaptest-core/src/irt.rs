//! IRT response functions: category probabilities, derivatives, Fisher
//! information, and log-likelihood contributions.
//!
//! All logistic evaluations go through the numerically stable [`sigmoid`]
//! and [`log_sigmoid`] forms so large `|θ - b|` never overflows the
//! exponential. Probabilities are floored at [`PROB_FLOOR`] before logs.

use crate::model::Model;

/// Floor applied to category probabilities before taking logs or ratios.
pub const PROB_FLOOR: f64 = 1e-10;

/// Numerically stable logistic function.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let exp_x = x.exp();
        exp_x / (1.0 + exp_x)
    }
}

/// Numerically stable `ln(sigmoid(x))`.
#[inline]
pub fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

/// `ln(Σ exp(xᵢ))` with the usual max shift.
#[inline]
pub fn logsumexp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max.is_infinite() {
        return max;
    }
    let sum: f64 = values.iter().map(|x| (x - max).exp()).sum();
    max + sum.ln()
}

/// Probability of each response category at `theta`.
///
/// Dichotomous models return `[P(0), P(1)]`; graded items return one entry
/// per category, computed as differences of cumulative logistic curves.
/// Every entry is floored at [`PROB_FLOOR`].
pub fn category_probabilities(model: &Model, theta: f64) -> Vec<f64> {
    match model {
        Model::OnePl { b } => dichotomous_probs(1.0, *b, 0.0, theta),
        Model::TwoPl { a, b } => dichotomous_probs(*a, *b, 0.0, theta),
        Model::ThreePl { a, b, c } => dichotomous_probs(*a, *b, *c, theta),
        Model::Graded { a, thresholds } => {
            let cumulative = graded_cumulative(*a, thresholds, theta);
            let n_cat = thresholds.len() + 1;
            (0..n_cat)
                .map(|k| {
                    let upper = if k == 0 { 1.0 } else { cumulative[k - 1] };
                    let lower = if k == n_cat - 1 { 0.0 } else { cumulative[k] };
                    (upper - lower).max(PROB_FLOOR)
                })
                .collect()
        }
    }
}

/// ∂/∂θ of each category probability at `theta`, same layout as
/// [`category_probabilities`].
pub fn category_derivatives(model: &Model, theta: f64) -> Vec<f64> {
    match model {
        Model::OnePl { b } => dichotomous_derivs(1.0, *b, 0.0, theta),
        Model::TwoPl { a, b } => dichotomous_derivs(*a, *b, 0.0, theta),
        Model::ThreePl { a, b, c } => dichotomous_derivs(*a, *b, *c, theta),
        Model::Graded { a, thresholds } => {
            let cumulative = graded_cumulative(*a, thresholds, theta);
            // d/dθ of σ(a(θ - bₖ)) is a·σ·(1-σ); boundary curves are
            // constant 1 and 0 with zero derivative.
            let slope = |k: usize| a * cumulative[k] * (1.0 - cumulative[k]);
            let n_cat = thresholds.len() + 1;
            (0..n_cat)
                .map(|k| {
                    let upper = if k == 0 { 0.0 } else { slope(k - 1) };
                    let lower = if k == n_cat - 1 { 0.0 } else { slope(k) };
                    upper - lower
                })
                .collect()
        }
    }
}

/// Fisher information of an item at `theta`: `Σₖ (P'ₖ)² / Pₖ`.
///
/// For 2PL this reduces to the familiar `a²pq`; for 3PL to
/// `a²(q/p)((p-c)/(1-c))²`.
pub fn information(model: &Model, theta: f64) -> f64 {
    let probs = category_probabilities(model, theta);
    let derivs = category_derivatives(model, theta);
    probs
        .iter()
        .zip(derivs.iter())
        .map(|(&p, &d)| d * d / p)
        .sum()
}

/// Log-likelihood contribution of a single response value, or `None` when
/// the value is out of range for the item (treated as missing upstream).
pub fn log_likelihood(model: &Model, theta: f64, value: u32) -> Option<f64> {
    let cat = category_index(model, value)?;
    match model {
        // Stable log-sigmoid path for models without a guessing floor.
        Model::OnePl { b } => Some(log_sigmoid(if cat == 1 {
            theta - b
        } else {
            b - theta
        })),
        Model::TwoPl { a, b } => {
            let z = a * (theta - b);
            Some(log_sigmoid(if cat == 1 { z } else { -z }))
        }
        _ => {
            let probs = category_probabilities(model, theta);
            Some(probs[cat].ln())
        }
    }
}

/// Score-function contribution of a single response: `P'ᵥ / Pᵥ`.
pub fn score(model: &Model, theta: f64, value: u32) -> Option<f64> {
    let cat = category_index(model, value)?;
    let probs = category_probabilities(model, theta);
    let derivs = category_derivatives(model, theta);
    Some(derivs[cat] / probs[cat])
}

/// Map a raw response value to a 0-based category index, or `None` if out
/// of range. Dichotomous values are 0/1; graded values are 1-based.
pub fn category_index(model: &Model, value: u32) -> Option<usize> {
    match model {
        Model::OnePl { .. } | Model::TwoPl { .. } | Model::ThreePl { .. } => match value {
            0 | 1 => Some(value as usize),
            _ => None,
        },
        Model::Graded { thresholds, .. } => {
            let n_cat = thresholds.len() + 1;
            if (1..=n_cat as u32).contains(&value) {
                Some((value - 1) as usize)
            } else {
                None
            }
        }
    }
}

fn dichotomous_probs(a: f64, b: f64, c: f64, theta: f64) -> Vec<f64> {
    let p_star = sigmoid(a * (theta - b));
    let p = (c + (1.0 - c) * p_star).clamp(PROB_FLOOR, 1.0 - PROB_FLOOR);
    vec![1.0 - p, p]
}

fn dichotomous_derivs(a: f64, b: f64, c: f64, theta: f64) -> Vec<f64> {
    let p_star = sigmoid(a * (theta - b));
    let d = (1.0 - c) * a * p_star * (1.0 - p_star);
    vec![-d, d]
}

fn graded_cumulative(a: f64, thresholds: &[f64], theta: f64) -> Vec<f64> {
    thresholds.iter().map(|&b| sigmoid(a * (theta - b))).collect()
}
