//! Fan-out of one operation across every target.

use std::collections::BTreeSet;
use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::CliError;
use crate::target::Target;
use crate::transport::{dial, Session};

/// The result of an operation on one target.
#[derive(Debug)]
pub struct TargetOutcome<T> {
    /// Target name.
    pub target: String,
    /// Value or error.
    pub result: Result<T, CliError>,
}

/// Runs `op` against every target concurrently.
///
/// Each target gets a child of `cancel`, its own dial bounded by its
/// timeout, and exactly one outcome. One target failing never affects the
/// others. Outcomes are returned sorted by target name.
pub async fn run<T, F, Fut>(
    targets: &[Target],
    cancel: &CancellationToken,
    op: F,
) -> Vec<TargetOutcome<T>>
where
    T: Send + 'static,
    F: Fn(Session) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<T, CliError>> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel(targets.len().max(1));
    let mut tasks = JoinSet::new();

    for target in targets {
        let tx = tx.clone();
        let op = op.clone();
        let target = target.clone();
        let token = cancel.child_token();
        tasks.spawn(async move {
            let result = match dial(&target, &token).await {
                Ok(session) => op(session).await,
                Err(e) => Err(e),
            };
            debug!(target = %target.name, ok = result.is_ok(), "target finished");
            // The receiver outlives every task.
            let _ = tx
                .send(TargetOutcome {
                    target: target.name,
                    result,
                })
                .await;
        });
    }
    drop(tx);

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("target task failed: {e}");
        }
    }

    let mut outcomes = Vec::with_capacity(targets.len());
    while let Some(outcome) = rx.recv().await {
        outcomes.push(outcome);
    }

    let seen: BTreeSet<String> = outcomes.iter().map(|o| o.target.clone()).collect();
    for target in targets {
        if !seen.contains(&target.name) {
            outcomes.push(TargetOutcome {
                target: target.name.clone(),
                result: Err(CliError::protocol("task ended without a result")),
            });
        }
    }

    outcomes.sort_by(|a, b| a.target.cmp(&b.target));
    outcomes
}

/// Splits outcomes into successes and failures, logging each failure as
/// `"<target>: <error>"`.
pub fn partition<T>(outcomes: Vec<TargetOutcome<T>>) -> (Vec<(String, T)>, usize) {
    let mut ok = Vec::with_capacity(outcomes.len());
    let mut failed = 0;
    for outcome in outcomes {
        match outcome.result {
            Ok(value) => ok.push((outcome.target, value)),
            Err(e) => {
                error!("{}: {e}", outcome.target);
                failed += 1;
            }
        }
    }
    (ok, failed)
}

/// Returns [`CliError::Failed`] when any target failed.
///
/// # Errors
///
/// Returns `Failed(n)` for `n > 0`.
pub fn summary(failed: usize) -> Result<(), CliError> {
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::Failed(failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn dead_address() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr.to_string()
    }

    fn target(address: &str, name: &str) -> Target {
        Target::builder(address)
            .with_name(name)
            .insecure(true)
            .with_timeout(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn one_outcome_per_target() {
        let dead = dead_address().await;
        let targets = vec![target(&dead, "c"), target(&dead, "a"), target(&dead, "b")];
        let outcomes = run(&targets, &CancellationToken::new(), |_session| async {
            Ok::<_, CliError>(())
        })
        .await;
        let names: Vec<_> = outcomes.iter().map(|o| o.target.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o.result, Err(CliError::Connection(_)))));
    }

    #[tokio::test]
    async fn cancelled_targets_report_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let targets = vec![target("192.0.2.10:57400", "r1")];
        let outcomes = run(&targets, &cancel, |_session| async { Ok::<_, CliError>(()) }).await;
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].result, Err(CliError::Cancelled)));
    }

    #[test]
    fn partition_counts_failures() {
        let outcomes = vec![
            TargetOutcome {
                target: "a".into(),
                result: Ok(1),
            },
            TargetOutcome {
                target: "b".into(),
                result: Err(CliError::Cancelled),
            },
        ];
        let (ok, failed) = partition(outcomes);
        assert_eq!(ok, vec![("a".to_string(), 1)]);
        assert_eq!(failed, 1);
        assert_eq!(
            summary(failed).unwrap_err().to_string(),
            "there was 1 error(s)"
        );
        assert!(summary(0).is_ok());
    }
}
