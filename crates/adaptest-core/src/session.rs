//! Session state and the per-turn engine API.
//!
//! A [`Session`] is the mutable unit of state for one examinee, owned by
//! the driver's turn loop and passed by mutable borrow into every engine
//! call. The [`CatEngine`] holds the immutable bank, the validated config,
//! and the shared computation cache; it exposes one entry point per turn
//! ([`CatEngine::next_turn`]) plus response recording, finalization, and
//! crash recovery.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::InfoCache;
use crate::config::CatConfig;
use crate::error::{ConfigError, SessionError};
use crate::estimator::{self, Method};
use crate::model::{ItemBank, ResponseRecord};
use crate::selector::{self, Selection};
use crate::stopping::{self, StopReason, Verdict};

/// Mutable per-examinee state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// Ids of administered items, in order, never containing duplicates.
    pub administered: Vec<String>,
    /// Responses, same length and order as `administered`.
    pub responses: Vec<ResponseRecord>,
    /// Current ability estimate.
    pub theta: f64,
    /// Standard error of the current estimate.
    pub se: f64,
    /// Estimator that produced the current values.
    pub method: Method,
    /// Set once the stopping rule fires; terminal.
    pub stop: Option<StopReason>,
    pub started_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

/// What the driver should do this turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// Deliver this item to the examinee and collect a response.
    Administer(String),
    /// The test is over; report the final result.
    Complete(FinalResult),
}

/// Best-effort final result, available at any point in a session's life.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResult {
    pub session_id: Uuid,
    pub theta: f64,
    pub se: f64,
    pub method: Method,
    pub administered: Vec<String>,
    pub responses: Vec<ResponseRecord>,
    /// `None` when finalized before the stopping rule fired (e.g. the
    /// examinee abandoned the session).
    pub stop_reason: Option<StopReason>,
}

/// Serialized session snapshot for crash resilience. Durable storage is
/// the collaborator's concern; this is only the logical shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub session_id: Uuid,
    pub administered: Vec<String>,
    pub responses: Vec<ResponseRecord>,
    pub theta: f64,
    pub se: f64,
    pub timestamp: DateTime<Utc>,
}

/// The CAT decision core: estimator, selector, and stopping rule behind a
/// per-turn API. Cheap to share; sessions are driven independently.
#[derive(Debug)]
pub struct CatEngine {
    bank: Arc<ItemBank>,
    config: CatConfig,
    cache: Arc<InfoCache>,
}

impl CatEngine {
    /// Build an engine, validating the config against itself and the bank.
    pub fn new(bank: Arc<ItemBank>, config: CatConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        for id in &config.fixed_items {
            if !bank.contains(id) {
                return Err(ConfigError::UnknownFixedItem(id.clone()));
            }
        }
        let cache = Arc::new(InfoCache::from_config(&config));
        Ok(Self {
            bank,
            config,
            cache,
        })
    }

    pub fn bank(&self) -> &Arc<ItemBank> {
        &self.bank
    }

    pub fn config(&self) -> &CatConfig {
        &self.config
    }

    /// Start a fresh session at the prior.
    pub fn start_session(&self) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            administered: Vec::new(),
            responses: Vec::new(),
            theta: self.config.prior_mean,
            se: self.config.prior_sd,
            method: Method::Prior,
            stop: None,
            started_at: now,
            last_update: now,
        }
    }

    /// The single per-turn entry point: evaluate the stopping rule, then
    /// select the next item or complete the session.
    pub fn next_turn(&self, session: &mut Session) -> Turn {
        if session.stop.is_some() {
            return Turn::Complete(self.finalize(session));
        }

        match stopping::evaluate(session.administered.len(), session.se, &self.config) {
            Verdict::Stop(reason) => {
                session.stop = Some(reason);
                tracing::debug!(session = %session.id, %reason, "session stopped");
                Turn::Complete(self.finalize(session))
            }
            Verdict::Continue => match selector::select_next(
                &session.administered,
                session.theta,
                &self.bank,
                &self.config,
                &self.cache,
            ) {
                Selection::Item(id) => Turn::Administer(id),
                Selection::Exhausted => {
                    session.stop = Some(StopReason::ItemPoolExhausted);
                    tracing::debug!(session = %session.id, "item pool exhausted");
                    Turn::Complete(self.finalize(session))
                }
            },
        }
    }

    /// Append a response and refresh the ability estimate.
    ///
    /// Rejects responses for unknown items, repeated items, and stopped
    /// sessions. These are driver-contract violations, never
    /// examinee-visible conditions.
    pub fn record_response(
        &self,
        session: &mut Session,
        item_id: &str,
        value: u32,
    ) -> Result<(), SessionError> {
        if session.stop.is_some() {
            return Err(SessionError::SessionStopped);
        }
        if !self.bank.contains(item_id) {
            return Err(SessionError::UnknownItem(item_id.to_string()));
        }
        if session.administered.iter().any(|id| id == item_id) {
            return Err(SessionError::DuplicateItem(item_id.to_string()));
        }

        session.administered.push(item_id.to_string());
        session.responses.push(ResponseRecord {
            item_id: item_id.to_string(),
            value,
        });

        let estimate = estimator::estimate(&session.responses, &self.bank, &self.config);
        session.theta = estimate.theta;
        session.se = estimate.se;
        session.method = estimate.method;
        session.last_update = Utc::now();
        Ok(())
    }

    /// Best-effort final result from whatever has been collected so far.
    /// Valid at any time, including after mid-turn cancellation.
    pub fn finalize(&self, session: &Session) -> FinalResult {
        FinalResult {
            session_id: session.id,
            theta: session.theta,
            se: session.se,
            method: session.method,
            administered: session.administered.clone(),
            responses: session.responses.clone(),
            stop_reason: session.stop,
        }
    }

    /// Snapshot a session for the external recovery store.
    pub fn recovery_record(&self, session: &Session) -> RecoveryRecord {
        RecoveryRecord {
            session_id: session.id,
            administered: session.administered.clone(),
            responses: session.responses.clone(),
            theta: session.theta,
            se: session.se,
            timestamp: session.last_update,
        }
    }

    /// Rebuild a session from a recovery record.
    ///
    /// Returns `None` for stale or inconsistent records; the caller
    /// starts a fresh session instead. θ and SE are re-derived from the
    /// recovered history; the stored point estimate is only checked for
    /// completeness.
    pub fn resume(&self, record: RecoveryRecord) -> Option<Session> {
        let age = Utc::now().signed_duration_since(record.timestamp);
        if age.num_seconds() > self.config.recovery_max_age_secs as i64 {
            tracing::debug!(session = %record.session_id, "recovery record expired");
            return None;
        }
        if !record.theta.is_finite() || !record.se.is_finite() {
            tracing::debug!(session = %record.session_id, "recovery record incomplete");
            return None;
        }
        if record.administered.len() != record.responses.len() {
            tracing::debug!(session = %record.session_id, "recovery record inconsistent");
            return None;
        }

        let mut seen = std::collections::HashSet::new();
        for (id, response) in record.administered.iter().zip(&record.responses) {
            if response.item_id != *id || !self.bank.contains(id) || !seen.insert(id) {
                tracing::debug!(session = %record.session_id, item = %id, "recovery record invalid");
                return None;
            }
        }

        let estimate = estimator::estimate(&record.responses, &self.bank, &self.config);
        Some(Session {
            id: record.session_id,
            administered: record.administered,
            responses: record.responses,
            theta: estimate.theta,
            se: estimate.se,
            method: estimate.method,
            stop: None,
            started_at: record.timestamp,
            last_update: record.timestamp,
        })
    }
}
