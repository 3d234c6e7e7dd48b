//! Core data model: IRT item parameters, the item bank, and responses.
//!
//! The bank is validated once at construction and immutable afterwards;
//! sessions share it by reference and never mutate it.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BankError;

/// Calibrated parameters of a single item, tagged by response model.
///
/// Dichotomous models use the logistic response function
/// `P(correct | θ) = c + (1 - c) · σ(a(θ - b))` with `c = 0` below 3PL
/// and `a = 1` for 1PL. Graded items use ordered cumulative logistic
/// thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum Model {
    #[serde(rename = "1PL")]
    OnePl { b: f64 },
    #[serde(rename = "2PL")]
    TwoPl { a: f64, b: f64 },
    #[serde(rename = "3PL")]
    ThreePl { a: f64, b: f64, c: f64 },
    #[serde(rename = "GRM")]
    Graded { a: f64, thresholds: Vec<f64> },
}

impl Model {
    /// Number of response categories: 2 for dichotomous models,
    /// `thresholds.len() + 1` for graded items.
    pub fn category_count(&self) -> usize {
        match self {
            Model::OnePl { .. } | Model::TwoPl { .. } | Model::ThreePl { .. } => 2,
            Model::Graded { thresholds, .. } => thresholds.len() + 1,
        }
    }

    /// The discrimination parameter (fixed at 1 for 1PL).
    pub fn discrimination(&self) -> f64 {
        match self {
            Model::OnePl { .. } => 1.0,
            Model::TwoPl { a, .. } | Model::ThreePl { a, .. } | Model::Graded { a, .. } => *a,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::OnePl { .. } => write!(f, "1PL"),
            Model::TwoPl { .. } => write!(f, "2PL"),
            Model::ThreePl { .. } => write!(f, "3PL"),
            Model::Graded { .. } => write!(f, "GRM"),
        }
    }
}

/// A calibrated item in the bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier within the bank.
    pub id: String,
    /// Response model and its parameters.
    #[serde(flatten)]
    pub model: Model,
}

impl Item {
    fn validate(&self) -> Result<(), BankError> {
        let id = &self.id;
        let check_finite = |value: f64, name: &'static str| {
            if value.is_finite() {
                Ok(())
            } else {
                Err(BankError::NonFiniteParameter {
                    id: id.clone(),
                    name,
                })
            }
        };

        match &self.model {
            Model::OnePl { b } => check_finite(*b, "b")?,
            Model::TwoPl { a, b } => {
                check_finite(*a, "a")?;
                check_finite(*b, "b")?;
                if *a <= 0.0 {
                    return Err(BankError::NonPositiveDiscrimination {
                        id: id.clone(),
                        a: *a,
                    });
                }
            }
            Model::ThreePl { a, b, c } => {
                check_finite(*a, "a")?;
                check_finite(*b, "b")?;
                check_finite(*c, "c")?;
                if *a <= 0.0 {
                    return Err(BankError::NonPositiveDiscrimination {
                        id: id.clone(),
                        a: *a,
                    });
                }
                if !(0.0..1.0).contains(c) {
                    return Err(BankError::GuessingOutOfRange {
                        id: id.clone(),
                        c: *c,
                    });
                }
            }
            Model::Graded { a, thresholds } => {
                check_finite(*a, "a")?;
                if *a <= 0.0 {
                    return Err(BankError::NonPositiveDiscrimination {
                        id: id.clone(),
                        a: *a,
                    });
                }
                if thresholds.is_empty() {
                    return Err(BankError::MissingThresholds { id: id.clone() });
                }
                for t in thresholds {
                    check_finite(*t, "threshold")?;
                }
                if thresholds.windows(2).any(|w| w[1] <= w[0]) {
                    return Err(BankError::UnsortedThresholds { id: id.clone() });
                }
            }
        }
        Ok(())
    }
}

/// An ordered, immutable set of calibrated items with unique ids.
///
/// Validated once at construction; shared read-only across all sessions.
#[derive(Debug, Clone)]
pub struct ItemBank {
    items: Vec<Item>,
    by_id: HashMap<String, usize>,
}

impl ItemBank {
    /// Build a bank, validating every item's parameters up front.
    pub fn new(items: Vec<Item>) -> Result<Self, BankError> {
        if items.is_empty() {
            return Err(BankError::Empty);
        }

        let mut by_id = HashMap::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            item.validate()?;
            if by_id.insert(item.id.clone(), idx).is_some() {
                return Err(BankError::DuplicateId(item.id.clone()));
            }
        }

        Ok(Self { items, by_id })
    }

    /// Number of items in the bank.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up an item by id.
    pub fn get(&self, id: &str) -> Option<&Item> {
        self.by_id.get(id).map(|&idx| &self.items[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Items in construction order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }
}

/// One recorded response within a session.
///
/// `value` is 0/1 for dichotomous items and a 1-based category index for
/// graded items. Values out of range for the item are treated as missing
/// by the estimator rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub item_id: String,
    pub value: u32,
}
