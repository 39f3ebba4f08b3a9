use std::fmt;
use std::future::Future;

use tracing::debug;

use crate::error::AppResult;

/// An ordered list of named strategies tried one after another.
///
/// Each attempt either yields a value (`Ok(Some(_))`), declines
/// (`Ok(None)`, e.g. an empty result) or fails. The first value wins and
/// nothing after it is attempted.
#[derive(Debug, Clone)]
pub struct FallbackChain<K> {
    strategies: Vec<K>,
}

#[derive(Debug)]
pub enum FallbackOutcome<K, T> {
    Found { strategy: K, value: T },
    /// No strategy produced a value. `answered` counts the strategies that
    /// declined without error.
    Exhausted {
        answered: usize,
        failures: Vec<(K, String)>,
    },
}

impl<K> FallbackChain<K>
where
    K: Copy + fmt::Display,
{
    pub fn new(strategies: Vec<K>) -> Self {
        Self { strategies }
    }

    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> FallbackOutcome<K, T>
    where
        F: FnMut(K) -> Fut,
        Fut: Future<Output = AppResult<Option<T>>>,
    {
        let mut answered = 0;
        let mut failures = Vec::new();

        for &strategy in &self.strategies {
            match attempt(strategy).await {
                Ok(Some(value)) => return FallbackOutcome::Found { strategy, value },
                Ok(None) => {
                    debug!("Strategy {} returned nothing, trying next", strategy);
                    answered += 1;
                }
                Err(e) => {
                    debug!("Strategy {} failed: {}", strategy, e);
                    failures.push((strategy, e.to_string()));
                }
            }
        }

        FallbackOutcome::Exhausted { answered, failures }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let chain = FallbackChain::new(vec!["a", "b", "c"]);
        let mut tried = Vec::new();

        let outcome = chain
            .run(|name| {
                tried.push(name);
                async move {
                    match name {
                        "a" => Err(AppError::Internal("missing rpc".into())),
                        "b" => Ok(Some(2)),
                        _ => Ok(Some(3)),
                    }
                }
            })
            .await;

        assert!(matches!(outcome, FallbackOutcome::Found { strategy: "b", value: 2 }));
        assert_eq!(tried, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_exhausted_counts_declines_and_failures() {
        let chain = FallbackChain::new(vec!["a", "b"]);
        let outcome = chain
            .run(|name| async move {
                if name == "a" {
                    Ok(None::<u32>)
                } else {
                    Err(AppError::Internal("down".into()))
                }
            })
            .await;

        match &outcome {
            FallbackOutcome::Exhausted { answered, failures } => {
                assert_eq!(*answered, 1);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "b");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_failed() {
        let chain = FallbackChain::new(vec!["a", "b"]);
        let outcome = chain
            .run(|_| async { Err::<Option<()>, _>(AppError::Internal("down".into())) })
            .await;
        assert!(matches!(
            outcome,
            FallbackOutcome::Exhausted { answered: 0, ref failures } if failures.len() == 2
        ));
    }
}
