//! Poll an export task until it leaves the active states.

use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::{CloudError, Result};
use crate::export::task::{ExportTask, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorOptions {
    pub poll_interval: Duration,
    /// Give up after this long; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: None,
        }
    }
}

/// Poll `task` every `poll_interval` while it is active, calling
/// `on_poll` with each active status, and return the final status.
///
/// A failed or cancelled task is returned as `Ok`; only the timeout is an
/// error.
pub fn monitor<T, F>(task: &T, options: &MonitorOptions, mut on_poll: F) -> Result<TaskStatus>
where
    T: ExportTask + ?Sized,
    F: FnMut(&TaskStatus),
{
    let started = Instant::now();
    loop {
        let status = task.status();
        if !status.state.is_active() {
            info!(id = %status.id, state = %status.state, "Final status: {}", status.state);
            return Ok(status);
        }

        info!(id = %status.id, "Task status: {}", status.state);
        on_poll(&status);

        let mut wait = options.poll_interval;
        if let Some(limit) = options.timeout {
            let elapsed = started.elapsed();
            if elapsed >= limit {
                return Err(CloudError::Timeout {
                    id: status.id,
                    secs: limit.as_secs(),
                });
            }
            wait = wait.min(limit - elapsed);
        }
        thread::sleep(wait);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::task::TaskState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Task that becomes `final_state` after `after` status calls
    struct ScriptedTask {
        polls: AtomicUsize,
        after: usize,
        final_state: TaskState,
    }

    impl ExportTask for ScriptedTask {
        fn id(&self) -> &str {
            "scripted"
        }

        fn start(&mut self) -> Result<()> {
            Ok(())
        }

        fn status(&self) -> TaskStatus {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            let state = if n >= self.after {
                self.final_state
            } else if n == 0 {
                TaskState::Ready
            } else {
                TaskState::Running
            };
            TaskStatus {
                id: "scripted".into(),
                state,
                destination: None,
                error_message: (state == TaskState::Failed).then(|| "boom".to_string()),
            }
        }

        fn cancel(&self) {}
    }

    fn fast() -> MonitorOptions {
        MonitorOptions {
            poll_interval: Duration::from_millis(1),
            timeout: Some(Duration::from_secs(5)),
        }
    }

    #[test]
    fn polls_until_terminal() {
        let task = ScriptedTask {
            polls: AtomicUsize::new(0),
            after: 3,
            final_state: TaskState::Completed,
        };
        let mut seen = Vec::new();
        let status = monitor(&task, &fast(), |s| seen.push(s.state)).unwrap();
        assert_eq!(status.state, TaskState::Completed);
        assert_eq!(seen, vec![TaskState::Ready, TaskState::Running, TaskState::Running]);
    }

    #[test]
    fn failure_is_reported_not_raised() {
        let task = ScriptedTask {
            polls: AtomicUsize::new(0),
            after: 1,
            final_state: TaskState::Failed,
        };
        let status = monitor(&task, &fast(), |_| {}).unwrap();
        assert_eq!(status.state, TaskState::Failed);
        assert_eq!(status.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn times_out() {
        let task = ScriptedTask {
            polls: AtomicUsize::new(0),
            after: usize::MAX,
            final_state: TaskState::Completed,
        };
        let options = MonitorOptions {
            poll_interval: Duration::from_millis(5),
            timeout: Some(Duration::from_millis(20)),
        };
        assert!(matches!(
            monitor(&task, &options, |_| {}),
            Err(CloudError::Timeout { .. })
        ));
    }

    #[test]
    fn default_poll_is_five_seconds() {
        assert_eq!(MonitorOptions::default().poll_interval, Duration::from_secs(5));
    }
}
