//! Response sources for driven sessions.
//!
//! The interactive transport is an external collaborator; in simulation
//! and load testing the [`Respondent`] trait stands in for it.

use std::time::Duration;

use async_trait::async_trait;
use rand::prelude::*;
use rand_pcg::Pcg64;

use adaptest_core::irt;
use adaptest_core::model::{Item, Model};

/// Produces one response value per administered item.
#[async_trait]
pub trait Respondent: Send {
    async fn respond(&mut self, item: &Item) -> u32;
}

/// An examinee with a known true θ, answering from the item's response
/// distribution with a private deterministic RNG.
///
/// Seeding one PCG64 per session keeps batch results independent of
/// worker scheduling.
pub struct SimulatedRespondent {
    true_theta: f64,
    rng: Pcg64,
}

impl SimulatedRespondent {
    pub fn new(true_theta: f64, seed: u64) -> Self {
        Self {
            true_theta,
            rng: Pcg64::seed_from_u64(seed),
        }
    }
}

#[async_trait]
impl Respondent for SimulatedRespondent {
    async fn respond(&mut self, item: &Item) -> u32 {
        let probs = irt::category_probabilities(&item.model, self.true_theta);
        let u: f64 = self.rng.random();

        let mut cumulative = 0.0;
        let mut category = probs.len() - 1;
        for (k, &p) in probs.iter().enumerate() {
            cumulative += p;
            if u < cumulative {
                category = k;
                break;
            }
        }

        match item.model {
            Model::Graded { .. } => (category + 1) as u32,
            _ => category as u32,
        }
    }
}

/// Wraps another respondent with a fixed latency, for load testing the
/// batch path.
pub struct DelayedRespondent<R> {
    inner: R,
    delay: Duration,
}

impl<R> DelayedRespondent<R> {
    pub fn new(inner: R, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<R: Respondent> Respondent for DelayedRespondent<R> {
    async fn respond(&mut self, item: &Item) -> u32 {
        tokio::time::sleep(self.delay).await;
        self.inner.respond(item).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(model: Model) -> Item {
        Item {
            id: "i1".into(),
            model,
        }
    }

    #[tokio::test]
    async fn same_seed_same_responses() {
        let item = item(Model::TwoPl { a: 1.0, b: 0.0 });
        let mut a = SimulatedRespondent::new(0.5, 42);
        let mut b = SimulatedRespondent::new(0.5, 42);
        for _ in 0..20 {
            assert_eq!(a.respond(&item).await, b.respond(&item).await);
        }
    }

    #[tokio::test]
    async fn dichotomous_values_in_range() {
        let item = item(Model::ThreePl {
            a: 1.0,
            b: 0.0,
            c: 0.2,
        });
        let mut r = SimulatedRespondent::new(0.0, 7);
        for _ in 0..50 {
            assert!(r.respond(&item).await <= 1);
        }
    }

    #[tokio::test]
    async fn graded_values_are_one_based() {
        let item = item(Model::Graded {
            a: 1.3,
            thresholds: vec![-1.0, 0.0, 1.0],
        });
        let mut r = SimulatedRespondent::new(0.0, 7);
        for _ in 0..50 {
            let value = r.respond(&item).await;
            assert!((1..=4).contains(&value), "value {value} out of range");
        }
    }

    #[tokio::test]
    async fn high_ability_mostly_correct() {
        let item = item(Model::TwoPl { a: 1.5, b: 0.0 });
        let mut r = SimulatedRespondent::new(3.0, 11);
        let mut correct = 0;
        for _ in 0..100 {
            correct += r.respond(&item).await;
        }
        assert!(correct > 80, "only {correct}/100 correct at theta = 3");
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_respondent_preserves_value() {
        let item = item(Model::TwoPl { a: 1.0, b: 0.0 });
        let plain = SimulatedRespondent::new(0.5, 42).respond(&item).await;
        let delayed = DelayedRespondent::new(
            SimulatedRespondent::new(0.5, 42),
            Duration::from_millis(250),
        )
        .respond(&item)
        .await;
        assert_eq!(plain, delayed);
    }
}
