//! adaptest-sim — worker-pool batch execution for adaptest.
//!
//! Runs many independent CAT sessions concurrently for simulation studies
//! and load testing, reusing the decision core unchanged: sessions never
//! share mutable state, only the immutable bank and the computation cache.

pub mod batch;
pub mod respondent;
pub mod stats;

pub use batch::{drive_session, BatchExecutor};
pub use respondent::{DelayedRespondent, Respondent, SimulatedRespondent};
pub use stats::{SimOutcome, SimReport, SimSummary};
