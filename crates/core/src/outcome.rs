//! Explicit outcome of an external call.
//!
//! The pipeline never lets an external failure escape. Every call to the
//! generation service or the knowledge index is reduced to one of these
//! variants and the orchestrator branches on it.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Completed(T),
    Failed(String),
    TimedOut,
}

impl<T> CallOutcome<T> {
    /// Await `fut` under `limit`, folding errors and elapsed time into an outcome.
    pub async fn within<E, F>(limit: Duration, fut: F) -> Self
    where
        E: std::fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(limit, fut).await {
            Ok(Ok(value)) => CallOutcome::Completed(value),
            Ok(Err(e)) => CallOutcome::Failed(e.to_string()),
            Err(_) => CallOutcome::TimedOut,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, CallOutcome::Completed(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            CallOutcome::Completed(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallOutcome<U> {
        match self {
            CallOutcome::Completed(v) => CallOutcome::Completed(f(v)),
            CallOutcome::Failed(e) => CallOutcome::Failed(e),
            CallOutcome::TimedOut => CallOutcome::TimedOut,
        }
    }

    /// Short label for logs and events.
    pub fn label(&self) -> &'static str {
        match self {
            CallOutcome::Completed(_) => "completed",
            CallOutcome::Failed(_) => "failed",
            CallOutcome::TimedOut => "timed_out",
        }
    }
}

impl<T: Default> CallOutcome<T> {
    /// The value on success, the default (empty) value otherwise.
    pub fn unwrap_or_empty(self) -> T {
        self.completed().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn within_maps_ok_and_err() {
        let ok: CallOutcome<u32> = CallOutcome::within(Duration::from_secs(1), async {
            Ok::<_, String>(7)
        })
        .await;
        assert_eq!(ok, CallOutcome::Completed(7));

        let err: CallOutcome<u32> = CallOutcome::within(Duration::from_secs(1), async {
            Err::<u32, _>("boom".to_string())
        })
        .await;
        assert_eq!(err, CallOutcome::Failed("boom".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn within_times_out() {
        let slow: CallOutcome<u32> = CallOutcome::within(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, String>(1)
        })
        .await;
        assert_eq!(slow, CallOutcome::TimedOut);
        assert_eq!(slow.label(), "timed_out");
    }

    #[test]
    fn empty_on_failure() {
        let failed: CallOutcome<String> = CallOutcome::Failed("x".into());
        assert_eq!(failed.unwrap_or_empty(), "");
        assert_eq!(CallOutcome::Completed(vec![1]).unwrap_or_empty(), vec![1]);
    }
}
