// SPDX-License-Identifier: Apache-2.0
//! Local job objects and their registration handles.

use crate::core::{run_on_owner, Task};
use crate::error::ClientError;
use crate::orb::Servant;
use alitheia_proto::WireValue;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

/// Scheduler-visible lifecycle of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobState {
    /// Built locally, not yet seen by the scheduler.
    #[default]
    Created,
    /// Enqueued; waiting for dependencies.
    Queued,
    /// Executing.
    Running,
    /// Terminal: completed.
    Finished,
    /// Terminal: failed.
    Error,
}

impl JobState {
    /// Wire encoding of the state.
    pub fn as_int(self) -> i64 {
        match self {
            Self::Created => 0,
            Self::Queued => 1,
            Self::Running => 2,
            Self::Finished => 3,
            Self::Error => 4,
        }
    }

    /// Decode the wire encoding of the state.
    pub fn from_int(n: i64) -> Option<Self> {
        match n {
            0 => Some(Self::Created),
            1 => Some(Self::Queued),
            2 => Some(Self::Running),
            3 => Some(Self::Finished),
            4 => Some(Self::Error),
            _ => None,
        }
    }
}

/// A unit of work executed on the remote scheduler's command.
///
/// `run` executes on the thread driving `Core::run`, never on a transport
/// dispatch thread.
pub trait Job: Send + Sync {
    /// Execute the job.
    fn run(&self);

    /// Scheduling priority hint. Pure; answered on the dispatch thread.
    fn priority(&self) -> i64 {
        0
    }

    /// Observe a state transition.
    fn state_changed(&self, _state: JobState) {}
}

/// A cloneable handle pairing a job with its lazily-assigned registration
/// name. The name is created on first use and is `None` until the job has
/// been registered.
#[derive(Clone)]
pub struct JobHandle {
    shared: Arc<JobShared>,
}

struct JobShared {
    job: Arc<dyn Job>,
    name: Mutex<Option<String>>,
    state: Mutex<JobState>,
}

impl JobHandle {
    /// Wrap a job for registration.
    pub fn new(job: Arc<dyn Job>) -> Self {
        Self {
            shared: Arc::new(JobShared {
                job,
                name: Mutex::new(None),
                state: Mutex::new(JobState::Created),
            }),
        }
    }

    /// The name the job is registered under, if registered.
    pub fn registration_name(&self) -> Option<String> {
        self.shared.name.lock().ok().and_then(|n| n.clone())
    }

    /// The job's last observed state.
    pub fn state(&self) -> JobState {
        self.shared
            .state
            .lock()
            .map(|s| *s)
            .unwrap_or(JobState::Error)
    }

    pub(crate) fn job(&self) -> Arc<dyn Job> {
        Arc::clone(&self.shared.job)
    }

    pub(crate) fn set_name(&self, name: String) {
        if let Ok(mut slot) = self.shared.name.lock() {
            *slot = Some(name);
        }
    }

    pub(crate) fn set_state(&self, state: JobState) {
        let changed = match self.shared.state.lock() {
            Ok(mut slot) => {
                let changed = *slot != state;
                *slot = state;
                changed
            }
            Err(_) => false,
        };
        if changed {
            self.shared.job.state_changed(state);
        }
    }
}

/// Transport-facing adapter for a registered job.
///
/// `run` and `stateChanged` execute user code, so they are handed to the
/// owner's task queue and the dispatch thread blocks until the queued work
/// completes, which keeps the remote call's completion semantics intact.
pub(crate) struct JobServant {
    handle: JobHandle,
    tasks: Sender<Task>,
}

impl JobServant {
    pub(crate) fn new(handle: JobHandle, tasks: Sender<Task>) -> Self {
        Self { handle, tasks }
    }
}

impl Servant for JobServant {
    fn dispatch(&self, method: &str, args: &[WireValue]) -> Result<WireValue, ClientError> {
        match method {
            "run" => {
                let handle = self.handle.clone();
                run_on_owner(&self.tasks, method, move || {
                    handle.set_state(JobState::Running);
                    handle.job().run();
                    handle.set_state(JobState::Finished);
                })?;
                Ok(WireValue::Absent)
            }
            "stateChanged" => {
                let state = args
                    .first()
                    .and_then(WireValue::as_int)
                    .and_then(JobState::from_int)
                    .ok_or_else(|| ClientError::remote(method, "bad state argument"))?;
                let handle = self.handle.clone();
                run_on_owner(&self.tasks, method, move || handle.set_state(state))?;
                Ok(WireValue::Absent)
            }
            "priority" => Ok(WireValue::Int(self.handle.job().priority())),
            other => Err(ClientError::remote(other, "unknown job method")),
        }
    }
}
