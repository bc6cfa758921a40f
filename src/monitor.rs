//! Execution monitor
//!
//! Generic polling driver over a status probe. Yields each distinct status
//! (by status key) in order of observation, enforces the legal transition
//! DAG and terminates on any terminal status, a probe error, or timeout.
//!
//! Legal transitions, besides self-loops and `-> Failed`/`-> Expired` from
//! any non-terminal status:
//!
//! ```text
//! Unknown           -> Initiated
//! Initiated         -> FinalizedOnSource | Executable
//! FinalizedOnSource -> Proven | Executable
//! Proven            -> Executable
//! Executable        -> Executing | Executed
//! Executing         -> Executed
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{BridgeError, ErrorStage};
use crate::types::ExecutionStatus;

/// Monitor timing options.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl MonitorOptions {
    pub fn from_millis(timeout_ms: u64, poll_interval_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusKind {
    Unknown,
    Initiated,
    FinalizedOnSource,
    Proven,
    Executable,
    Executing,
    Executed,
    Failed,
    Expired,
}

fn kind_of(status: &ExecutionStatus) -> StatusKind {
    match status {
        ExecutionStatus::Unknown { .. } => StatusKind::Unknown,
        ExecutionStatus::Initiated { .. } => StatusKind::Initiated,
        ExecutionStatus::FinalizedOnSource { .. } => StatusKind::FinalizedOnSource,
        ExecutionStatus::Proven { .. } => StatusKind::Proven,
        ExecutionStatus::Executable { .. } => StatusKind::Executable,
        ExecutionStatus::Executing { .. } => StatusKind::Executing,
        ExecutionStatus::Executed { .. } => StatusKind::Executed,
        ExecutionStatus::Failed { .. } => StatusKind::Failed,
        ExecutionStatus::Expired { .. } => StatusKind::Expired,
    }
}

/// Whether `previous -> next` is a legal transition.
pub fn transition_allowed(previous: &ExecutionStatus, next: &ExecutionStatus) -> bool {
    use StatusKind::*;
    let from = kind_of(previous);
    let to = kind_of(next);

    if from == to {
        return true;
    }
    if previous.is_terminal() {
        return false;
    }
    if matches!(to, Failed | Expired) {
        return true;
    }
    matches!(
        (from, to),
        (Unknown, Initiated)
            | (Initiated, FinalizedOnSource)
            | (Initiated, Executable)
            | (FinalizedOnSource, Proven)
            | (FinalizedOnSource, Executable)
            | (Proven, Executable)
            | (Executable, Executing)
            | (Executable, Executed)
            | (Executing, Executed)
    )
}

/// Lazily polled stream of distinct execution statuses.
///
/// A new stream over the same message starts a fresh probe loop; nothing is
/// shared between streams.
pub struct StatusStream<P> {
    probe: P,
    options: MonitorOptions,
    deadline: Option<Instant>,
    previous: Option<ExecutionStatus>,
    finished: bool,
}

impl<P, Fut> StatusStream<P>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<ExecutionStatus, BridgeError>>,
{
    pub fn new(probe: P, options: MonitorOptions) -> Self {
        Self {
            probe,
            options,
            deadline: None,
            previous: None,
            finished: false,
        }
    }

    /// Next distinct status, or `None` after the stream finished.
    ///
    /// Finishes after yielding a terminal status, after any error (probe
    /// failures are propagated, never swallowed), or on timeout.
    pub async fn next(&mut self) -> Option<Result<ExecutionStatus, BridgeError>> {
        if self.finished {
            return None;
        }
        let deadline = *self
            .deadline
            .get_or_insert_with(|| Instant::now() + self.options.timeout);

        loop {
            if Instant::now() >= deadline {
                self.finished = true;
                return Some(Err(BridgeError::Timeout {
                    stage: ErrorStage::Monitor,
                    waited_ms: self.options.timeout.as_millis() as u64,
                }));
            }

            let status = match (self.probe)().await {
                Ok(status) => status,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            };

            if let Some(previous) = &self.previous {
                if previous.status_key() == status.status_key() {
                    sleep(self.options.poll_interval).await;
                    continue;
                }
                if !transition_allowed(previous, &status) {
                    self.finished = true;
                    return Some(Err(BridgeError::invariant(format!(
                        "illegal status transition {} -> {}",
                        previous.status_key(),
                        status.status_key()
                    ))));
                }
            }

            debug!(status = %status.status_key(), "monitor observed status");
            if status.is_terminal() {
                self.finished = true;
            }
            self.previous = Some(status.clone());
            return Some(Ok(status));
        }
    }

    /// Drains the stream, returning every yielded status. Errors abort the
    /// drain and carry the statuses seen so far in their place.
    pub async fn collect(mut self) -> Result<Vec<ExecutionStatus>, BridgeError> {
        let mut statuses = Vec::new();
        while let Some(result) = self.next().await {
            statuses.push(result?);
        }
        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn scripted(
        statuses: Vec<ExecutionStatus>,
    ) -> impl FnMut() -> std::future::Ready<Result<ExecutionStatus, BridgeError>> {
        let queue = Arc::new(Mutex::new(statuses));
        move || {
            let mut queue = queue.lock().unwrap();
            let status = if queue.len() > 1 {
                queue.remove(0)
            } else {
                queue[0].clone()
            };
            std::future::ready(Ok(status))
        }
    }

    /// Test that the monitor yields one status per distinct key in order
    #[tokio::test(start_paused = true)]
    async fn test_distinct_statuses_in_order() {
        let probe = scripted(vec![
            ExecutionStatus::initiated(Some("sig".into())),
            ExecutionStatus::initiated(Some("sig".into())),
            ExecutionStatus::executable(),
            ExecutionStatus::executed(Some("0xaa".into())),
        ]);
        let stream = StatusStream::new(probe, MonitorOptions::default());
        let statuses = stream.collect().await.unwrap();
        let keys: Vec<String> = statuses.iter().map(|s| s.status_key()).collect();
        assert_eq!(
            keys,
            vec!["initiated:sig", "executable", "executed:0xaa"]
        );
    }

    /// Test that an illegal transition raises an invariant violation
    /// Why: Unknown -> Executed skips the whole lifecycle
    #[tokio::test(start_paused = true)]
    async fn test_illegal_transition_rejected() {
        let probe = scripted(vec![
            ExecutionStatus::unknown(),
            ExecutionStatus::executed(None),
        ]);
        let mut stream = StatusStream::new(probe, MonitorOptions::default());
        assert!(stream.next().await.unwrap().is_ok());
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), "INVARIANT_VIOLATION");
        assert!(stream.next().await.is_none());
    }

    /// Test that any non-terminal status may fail or expire
    #[tokio::test(start_paused = true)]
    async fn test_failure_from_any_nonterminal() {
        let probe = scripted(vec![
            ExecutionStatus::initiated(None),
            ExecutionStatus::failed("reverted", None),
        ]);
        let stream = StatusStream::new(probe, MonitorOptions::default());
        let statuses = stream.collect().await.unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses[1].is_terminal());
    }

    /// Test that a stuck status times out
    #[tokio::test(start_paused = true)]
    async fn test_timeout_on_stuck_status() {
        let probe = scripted(vec![ExecutionStatus::executable()]);
        let mut stream = StatusStream::new(
            probe,
            MonitorOptions::from_millis(200, 50),
        );
        assert!(stream.next().await.unwrap().is_ok());
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), "TIMEOUT");
        assert!(stream.next().await.is_none());
    }

    /// Test that probe errors propagate and finish the stream
    #[tokio::test(start_paused = true)]
    async fn test_probe_error_propagates() {
        let mut first = true;
        let probe = move || {
            let result = if first {
                first = false;
                Ok(ExecutionStatus::initiated(None))
            } else {
                Err(BridgeError::rpc("eip155:8453", "boom"))
            };
            std::future::ready(result)
        };
        let mut stream = StatusStream::new(probe, MonitorOptions::default());
        assert!(stream.next().await.unwrap().is_ok());
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.code(), "RPC_ERROR");
        assert!(stream.next().await.is_none());
    }

    /// Test the transition table directly
    #[test]
    fn test_transition_table() {
        let unknown = ExecutionStatus::unknown();
        let initiated = ExecutionStatus::initiated(None);
        let executable = ExecutionStatus::executable();
        let proven = ExecutionStatus::proven(None);
        let executed = ExecutionStatus::executed(None);
        let failed = ExecutionStatus::failed("x", None);

        assert!(transition_allowed(&unknown, &initiated));
        assert!(transition_allowed(&initiated, &executable));
        assert!(transition_allowed(&proven, &executable));
        assert!(transition_allowed(&executable, &executed));
        assert!(transition_allowed(&initiated, &failed));

        assert!(!transition_allowed(&unknown, &executed));
        assert!(!transition_allowed(&executed, &initiated));
        assert!(!transition_allowed(&executable, &proven));
        assert!(!transition_allowed(&failed, &executed));

        // Self-loops are always legal.
        assert!(transition_allowed(&executable, &ExecutionStatus::executable()));
    }
}
