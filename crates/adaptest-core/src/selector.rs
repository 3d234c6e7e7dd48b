//! Next-item selection.
//!
//! Scores every unadministered item at the current θ estimate under the
//! configured criterion and picks the maximum, breaking ties toward the
//! lowest item id so runs are reproducible. Scores are evaluated at the
//! cache grid's bucket centers and served from the shared computation
//! cache when possible.

use std::collections::HashSet;

use crate::cache::InfoCache;
use crate::config::{CatConfig, SelectionCriterion};
use crate::model::{Item, ItemBank};

/// Outcome of a selection pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Administer this item next.
    Item(String),
    /// Every item in the bank has been administered. A normal terminal
    /// signal, not an error.
    Exhausted,
}

/// Choose the next item for a session at ability estimate `theta`.
///
/// Pending `fixed_items` are returned first, in configured order,
/// bypassing the criterion entirely.
pub fn select_next(
    administered: &[String],
    theta: f64,
    bank: &ItemBank,
    config: &CatConfig,
    cache: &InfoCache,
) -> Selection {
    let given: HashSet<&str> = administered.iter().map(String::as_str).collect();

    for id in &config.fixed_items {
        if !given.contains(id.as_str()) && bank.contains(id) {
            return Selection::Item(id.clone());
        }
    }

    let theta_q = cache.bucket_center(cache.bucket(theta));

    let mut best: Option<(f64, &str)> = None;
    for item in bank.iter() {
        if given.contains(item.id.as_str()) {
            continue;
        }
        let score = criterion_score(item, theta_q, config, cache);
        let replace = match best {
            None => true,
            Some((best_score, best_id)) => {
                score > best_score || (score == best_score && item.id.as_str() < best_id)
            }
        };
        if replace {
            best = Some((score, item.id.as_str()));
        }
    }

    match best {
        Some((_, id)) => Selection::Item(id.to_string()),
        None => Selection::Exhausted,
    }
}

fn criterion_score(item: &Item, theta: f64, config: &CatConfig, cache: &InfoCache) -> f64 {
    match config.selection {
        SelectionCriterion::Mi => cache.lookup_or_compute(item, theta).information,
        SelectionCriterion::Mfi => {
            let w = config.mfi_window;
            let window = [theta - w, theta, theta + w];
            window
                .iter()
                .map(|&t| cache.lookup_or_compute(item, t).information)
                .sum::<f64>()
                / window.len() as f64
        }
        SelectionCriterion::Kl => {
            let d = config.kl_delta;
            let hi = cache.lookup_or_compute(item, theta + d).category_probs;
            let lo = cache.lookup_or_compute(item, theta - d).category_probs;
            hi.iter()
                .zip(lo.iter())
                .map(|(&p, &q)| p * (p / q).ln())
                .sum()
        }
    }
}
