//! Worker-pool batch executor.
//!
//! Drives many independent sessions concurrently: each session is handled
//! end-to-end (estimate → select → stop) by exactly one task, concurrency
//! is bounded by a semaphore sized to `parallel_workers`, and sessions are
//! processed in `batch_size` chunks so peak memory stays bounded no matter
//! how large the queue is. Only the item bank and the computation cache
//! are shared across sessions.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use adaptest_core::session::{CatEngine, FinalResult, Session, Turn};

use crate::respondent::{Respondent, SimulatedRespondent};
use crate::stats::{SimOutcome, SimReport};

/// Runs batches of sessions against one engine.
pub struct BatchExecutor {
    engine: Arc<CatEngine>,
}

impl BatchExecutor {
    pub fn new(engine: Arc<CatEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<CatEngine> {
        &self.engine
    }

    /// Drive every session to completion, one worker per session.
    ///
    /// `respondent_for` builds the response source for the session at a
    /// given queue index. Results come back in queue order regardless of
    /// completion order; a panicked session task is logged and dropped.
    pub async fn run_batch<R, F>(
        &self,
        sessions: Vec<Session>,
        respondent_for: F,
    ) -> Result<Vec<FinalResult>>
    where
        R: Respondent + 'static,
        F: Fn(usize) -> R,
    {
        let total = sessions.len();
        let batch_size = self.engine.config().batch_size;
        let semaphore = Arc::new(Semaphore::new(self.engine.config().parallel_workers));

        let mut results: Vec<Option<FinalResult>> = (0..total).map(|_| None).collect();

        let mut queue = sessions.into_iter().enumerate().peekable();
        while queue.peek().is_some() {
            let chunk: Vec<_> = queue.by_ref().take(batch_size).collect();
            let mut futures = FuturesUnordered::new();

            for (index, session) in chunk {
                let engine = Arc::clone(&self.engine);
                let semaphore = Arc::clone(&semaphore);
                let mut respondent = respondent_for(index);

                futures.push(tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
                    let result = drive_session(&engine, session, &mut respondent).await;
                    Ok::<_, anyhow::Error>((index, result))
                }));
            }

            while let Some(joined) = futures.next().await {
                match joined {
                    Ok(Ok((index, result))) => results[index] = Some(result),
                    Ok(Err(e)) => return Err(e),
                    Err(e) => tracing::error!("session task panicked: {e}"),
                }
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    /// Simulate one fresh session per entry of `true_thetas`.
    ///
    /// Session `i` answers from its item response distributions at
    /// `true_thetas[i]` using a PCG64 seeded with `seed + i`, so the
    /// per-session outcome is a pure function of the inputs; worker
    /// count and scheduling never change it.
    pub async fn run_simulation(&self, true_thetas: &[f64], seed: u64) -> Result<SimReport> {
        let start = Instant::now();
        let sessions: Vec<Session> = true_thetas
            .iter()
            .map(|_| self.engine.start_session())
            .collect();

        tracing::info!(
            sessions = sessions.len(),
            workers = self.engine.config().parallel_workers,
            "starting simulation batch"
        );

        let thetas = true_thetas.to_vec();
        let results = self
            .run_batch(sessions, |index| {
                SimulatedRespondent::new(thetas[index], seed.wrapping_add(index as u64))
            })
            .await?;

        let outcomes: Vec<SimOutcome> = results
            .into_iter()
            .enumerate()
            .map(|(index, result)| SimOutcome::new(index, true_thetas[index], result))
            .collect();

        Ok(SimReport::from_outcomes(outcomes, start.elapsed()))
    }
}

/// Drive one session end-to-end: the interactive turn loop with the
/// respondent standing in for the transport layer.
pub async fn drive_session<R>(
    engine: &CatEngine,
    mut session: Session,
    respondent: &mut R,
) -> FinalResult
where
    R: Respondent + ?Sized,
{
    loop {
        match engine.next_turn(&mut session) {
            Turn::Administer(item_id) => {
                let Some(item) = engine.bank().get(&item_id) else {
                    tracing::error!(item = %item_id, "selected item missing from bank");
                    break engine.finalize(&session);
                };
                let value = respondent.respond(item).await;
                if let Err(e) = engine.record_response(&mut session, &item_id, value) {
                    tracing::error!(session = %session.id, "response rejected: {e}");
                    break engine.finalize(&session);
                }
            }
            Turn::Complete(result) => break result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptest_core::config::CatConfig;
    use adaptest_core::model::{Item, ItemBank, Model};
    use adaptest_core::stopping::StopReason;

    fn sim_bank(n_items: usize) -> Arc<ItemBank> {
        let items = (0..n_items)
            .map(|i| Item {
                id: format!("item-{i:03}"),
                model: Model::TwoPl {
                    a: 0.8 + (i % 5) as f64 * 0.2,
                    b: -2.0 + (i % 20) as f64 * 0.2,
                },
            })
            .collect();
        Arc::new(ItemBank::new(items).unwrap())
    }

    fn engine(parallel_workers: usize) -> Arc<CatEngine> {
        let config = CatConfig {
            min_items: 3,
            max_items: 8,
            min_sem: 0.35,
            parallel_workers,
            ..CatConfig::default()
        };
        Arc::new(CatEngine::new(sim_bank(30), config).unwrap())
    }

    #[tokio::test]
    async fn sessions_run_to_completion() {
        let executor = BatchExecutor::new(engine(4));
        let report = executor
            .run_simulation(&[-1.0, 0.0, 1.0], 99)
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 3);
        for outcome in &report.outcomes {
            assert!(outcome.stop_reason.is_some());
            assert!(outcome.items_used >= 3);
            assert!(outcome.items_used <= 8);
            assert!(outcome.theta.is_finite());
        }
    }

    #[tokio::test]
    async fn parallel_matches_sequential() {
        // 100 sessions through 4 workers must produce exactly the θ/SE a
        // sequential run produces; scheduling must not leak into results.
        let true_thetas: Vec<f64> = (0..100).map(|i| -2.0 + (i as f64) * 0.04).collect();
        let seed = 4242;

        let parallel = BatchExecutor::new(engine(4))
            .run_simulation(&true_thetas, seed)
            .await
            .unwrap();
        let sequential = BatchExecutor::new(engine(1))
            .run_simulation(&true_thetas, seed)
            .await
            .unwrap();

        assert_eq!(parallel.outcomes.len(), 100);
        for (p, s) in parallel.outcomes.iter().zip(&sequential.outcomes) {
            assert_eq!(p.index, s.index);
            assert_eq!(p.theta.to_bits(), s.theta.to_bits(), "index {}", p.index);
            assert_eq!(p.se.to_bits(), s.se.to_bits(), "index {}", p.index);
            assert_eq!(p.items_used, s.items_used);
        }
    }

    #[tokio::test]
    async fn chunking_bounds_in_flight_sessions() {
        let config = CatConfig {
            min_items: 1,
            max_items: 3,
            batch_size: 4,
            parallel_workers: 2,
            ..CatConfig::default()
        };
        let engine = Arc::new(CatEngine::new(sim_bank(10), config).unwrap());
        let executor = BatchExecutor::new(engine);

        let true_thetas = vec![0.0; 10];
        let report = executor.run_simulation(&true_thetas, 1).await.unwrap();
        assert_eq!(report.outcomes.len(), 10);
        // Indexes stay in queue order across chunk boundaries.
        for (i, outcome) in report.outcomes.iter().enumerate() {
            assert_eq!(outcome.index, i);
        }
    }

    #[tokio::test]
    async fn small_bank_exhausts_pool() {
        let config = CatConfig {
            min_items: 1,
            max_items: 50,
            min_sem: 0.0001,
            ..CatConfig::default()
        };
        let engine = Arc::new(CatEngine::new(sim_bank(4), config).unwrap());
        let report = BatchExecutor::new(engine)
            .run_simulation(&[0.0], 5)
            .await
            .unwrap();
        assert_eq!(
            report.outcomes[0].stop_reason,
            Some(StopReason::ItemPoolExhausted)
        );
        assert_eq!(report.outcomes[0].items_used, 4);
    }

    #[tokio::test]
    async fn estimates_track_true_theta() {
        let config = CatConfig {
            min_items: 10,
            max_items: 20,
            min_sem: 0.05,
            ..CatConfig::default()
        };
        let engine = Arc::new(CatEngine::new(sim_bank(40), config).unwrap());
        let report = BatchExecutor::new(engine)
            .run_simulation(&[-1.5, 1.5], 31)
            .await
            .unwrap();

        // 20 informative items should order the two examinees correctly.
        assert!(report.outcomes[0].theta < report.outcomes[1].theta);
    }
}
