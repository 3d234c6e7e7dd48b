//! Stopping-rule evaluation.
//!
//! Two states, CONTINUE and STOP; STOP is terminal. The `max_items` cap
//! always wins, the precision rule only applies once `min_items` have been
//! administered. The inverted `min_items > max_items` case is rejected at
//! config construction and never reaches this module.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::CatConfig;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The hard cap on administered items was reached.
    MaxItems,
    /// The SEM dropped to the configured threshold after `min_items`.
    PrecisionReached,
    /// The selector ran out of unadministered items.
    ItemPoolExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::MaxItems => write!(f, "max items reached"),
            StopReason::PrecisionReached => write!(f, "precision reached"),
            StopReason::ItemPoolExhausted => write!(f, "item pool exhausted"),
        }
    }
}

/// One evaluation of the stopping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Stop(StopReason),
}

/// Decide whether testing continues given the session's progress.
pub fn evaluate(administered: usize, se: f64, config: &CatConfig) -> Verdict {
    if administered >= config.max_items {
        return Verdict::Stop(StopReason::MaxItems);
    }
    if administered >= config.min_items && se <= config.min_sem {
        return Verdict::Stop(StopReason::PrecisionReached);
    }
    Verdict::Continue
}
