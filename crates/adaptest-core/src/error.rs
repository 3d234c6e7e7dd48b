//! Error types for the CAT core.
//!
//! Construction-time errors (`ConfigError`, `BankError`) are fatal and
//! surfaced immediately: the engine must not start with invalid parameters.
//! Runtime numerical degeneracies are recovered internally and never reach
//! these types.

use thiserror::Error;

/// Errors raised when validating a [`CatConfig`](crate::config::CatConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `min_items` exceeds `max_items`.
    #[error("min_items ({min_items}) exceeds max_items ({max_items})")]
    ItemBoundsInverted { min_items: usize, max_items: usize },

    /// `max_items` is zero; the test could never administer anything.
    #[error("max_items must be at least 1")]
    ZeroMaxItems,

    /// The SEM stopping threshold must be positive.
    #[error("min_sem must be positive, got {0}")]
    NonPositiveSem(f64),

    /// The prior standard deviation must be positive.
    #[error("prior_sd must be positive, got {0}")]
    NonPositivePriorSd(f64),

    /// The worker pool needs at least one worker.
    #[error("parallel_workers must be at least 1")]
    ZeroWorkers,

    /// The batch executor needs a positive chunk size.
    #[error("batch_size must be at least 1")]
    ZeroBatchSize,

    /// The EAP quadrature grid needs at least a few points.
    #[error("quad_points must be at least 3, got {0}")]
    TooFewQuadPoints(usize),

    /// A numeric tuning constant that must be positive was not.
    #[error("{name} must be positive, got {value}")]
    NonPositiveTuning { name: &'static str, value: f64 },

    /// The same item id appears twice in `fixed_items`.
    #[error("duplicate fixed item: {0}")]
    DuplicateFixedItem(String),

    /// A fixed item id does not exist in the bank.
    #[error("fixed item not in bank: {0}")]
    UnknownFixedItem(String),
}

/// Errors raised when constructing an [`ItemBank`](crate::model::ItemBank).
#[derive(Debug, Error)]
pub enum BankError {
    /// The bank contains no items.
    #[error("item bank is empty")]
    Empty,

    /// Two items share an id.
    #[error("duplicate item id: {0}")]
    DuplicateId(String),

    /// Discrimination must be strictly positive.
    #[error("item {id}: discrimination must be positive, got {a}")]
    NonPositiveDiscrimination { id: String, a: f64 },

    /// The 3PL guessing parameter must lie in `[0, 1)`.
    #[error("item {id}: guessing must be in [0, 1), got {c}")]
    GuessingOutOfRange { id: String, c: f64 },

    /// A graded item needs at least one threshold (two categories).
    #[error("item {id}: graded item needs at least one threshold")]
    MissingThresholds { id: String },

    /// Graded thresholds must be strictly increasing.
    #[error("item {id}: thresholds must be strictly increasing")]
    UnsortedThresholds { id: String },

    /// A parameter is not a finite number.
    #[error("item {id}: parameter {name} is not finite")]
    NonFiniteParameter { id: String, name: &'static str },
}

/// Contract violations by the turn-loop driver.
///
/// These indicate a bug in the calling code, not an examinee-visible
/// condition; no estimation path ever raises them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The item id is not in the bank.
    #[error("unknown item: {0}")]
    UnknownItem(String),

    /// The item was already administered in this session.
    #[error("item already administered: {0}")]
    DuplicateItem(String),

    /// The session has already stopped; no further responses are accepted.
    #[error("session has stopped")]
    SessionStopped,
}
