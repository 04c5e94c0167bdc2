// SPDX-License-Identifier: Apache-2.0
//! The registry client: the connection that registers local metrics and
//! jobs as named remote services and drives the remote scheduler.
//!
//! One `Core` is an explicit context object; collaborators receive it by
//! injection instead of ambient lookup so tests can substitute a fake
//! scheduler. Generated registration names stay unique process-wide, so
//! two contexts on one transport cannot collide.

use crate::error::{expect_int, ClientError};
use crate::job::{JobHandle, JobServant};
use crate::metric::{MetricHandle, MetricServant};
use crate::orb::{Orb, RemoteObject};
use alitheia_proto::WireValue;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Name of the scheduler object on the remote side.
const CORE_OBJECT: &str = "Core";

static METRIC_SEQ: AtomicU64 = AtomicU64::new(0);
static JOB_SEQ: AtomicU64 = AtomicU64::new(0);

/// Work handed from transport dispatch threads to the owning thread.
pub(crate) enum Task {
    /// User code to execute on the owner.
    Invoke(Box<dyn FnOnce() + Send>),
    /// Stop the dispatch loop.
    Stop,
}

/// Run `f` on the thread driving [`Core::run`] and block for its result.
pub(crate) fn run_on_owner<R: Send + 'static>(
    tasks: &Sender<Task>,
    method: &str,
    f: impl FnOnce() -> R + Send + 'static,
) -> Result<R, ClientError> {
    let (reply_tx, reply_rx) = mpsc::channel();
    tasks
        .send(Task::Invoke(Box::new(move || {
            let _ = reply_tx.send(f());
        })))
        .map_err(|_| ClientError::remote(method, "dispatch queue is closed"))?;
    reply_rx
        .recv()
        .map_err(|_| ClientError::remote(method, "dispatch loop stopped before the call completed"))
}

/// The process's connection to the remote job/metric registry.
///
/// Every operation crosses the transport synchronously: callers must
/// expect latency and remote-failure propagation on each of them.
///
/// Clones share one connection; the last clone dropped tears it down.
#[derive(Clone)]
pub struct Core {
    inner: Arc<CoreInner>,
}

struct CoreInner {
    orb: Arc<dyn Orb>,
    remote: Arc<dyn RemoteObject>,
    /// Service-assigned id to generated registration name. Append-only
    /// bookkeeping except for unregistration; the mutex serializes
    /// registration calls racing transport-thread invocations.
    registered: Mutex<BTreeMap<i64, String>>,
    tasks: Sender<Task>,
    queue: Mutex<Option<Receiver<Task>>>,
}

impl Core {
    /// Connect to the remote registry.
    ///
    /// # Errors
    ///
    /// Fails fast with [`ClientError::Connection`] if the remote `Core`
    /// object cannot be resolved.
    pub fn connect(orb: Arc<dyn Orb>) -> Result<Self, ClientError> {
        let remote = orb.resolve(CORE_OBJECT)?;
        let (tasks, queue) = mpsc::channel();
        Ok(Self {
            inner: Arc::new(CoreInner {
                orb,
                remote,
                registered: Mutex::new(BTreeMap::new()),
                tasks,
                queue: Mutex::new(Some(queue)),
            }),
        })
    }

    /// Register `metric` as a named remote service and return the
    /// service-assigned id.
    ///
    /// Registration is not idempotent: registering the same handle twice
    /// produces two distinct remote registrations. That is inherited,
    /// observable behavior; it is flagged here but not deduplicated.
    pub fn register_metric(&self, metric: &MetricHandle) -> Result<i64, ClientError> {
        if let Some(previous) = metric.id() {
            warn!(previous, "metric handle re-registered; a new registration is created");
        }
        let name = format!("Metric_{}", METRIC_SEQ.fetch_add(1, Ordering::Relaxed) + 1);
        let servant = Arc::new(MetricServant::new(metric.metric(), self.inner.tasks.clone()));
        self.inner.orb.export(&name, servant)?;
        let reply = self
            .inner
            .remote
            .call("registerMetric", &[WireValue::from(name.as_str())])?;
        let id = expect_int("registerMetric", reply)?;
        self.track(id, name.clone());
        metric.set_registration(name.clone(), id);
        info!(id, %name, "metric registered");
        Ok(id)
    }

    /// Unregister a metric by its service-assigned id.
    ///
    /// An id that is not currently registered is forwarded to the remote
    /// call as-is; the client does not guard against double
    /// unregistration.
    pub fn unregister_metric(&self, id: i64) -> Result<(), ClientError> {
        self.inner
            .remote
            .call("unregisterMetric", &[WireValue::Int(id)])?;
        if let Ok(mut map) = self.inner.registered.lock() {
            map.remove(&id);
        }
        info!(id, "metric unregistered");
        Ok(())
    }

    /// Register `job` as a named remote service and return the
    /// service-assigned id. Usually implied: the job-facing operations
    /// below register on demand.
    pub fn register_job(&self, job: &JobHandle) -> Result<i64, ClientError> {
        let name = format!("Job_{}", JOB_SEQ.fetch_add(1, Ordering::Relaxed) + 1);
        let servant = Arc::new(JobServant::new(job.clone(), self.inner.tasks.clone()));
        self.inner.orb.export(&name, servant)?;
        let reply = self
            .inner
            .remote
            .call("registerJob", &[WireValue::from(name.as_str())])?;
        let id = expect_int("registerJob", reply)?;
        self.track(id, name.clone());
        job.set_name(name.clone());
        info!(id, %name, "job registered");
        Ok(id)
    }

    /// Hand `job` to the remote scheduler; it runs as soon as all its
    /// dependencies are met. Registers the job first if needed.
    pub fn enqueue_job(&self, job: &JobHandle) -> Result<(), ClientError> {
        let name = self.ensure_registered(job)?;
        self.inner
            .remote
            .call("enqueueJob", &[WireValue::Str(name)])?;
        Ok(())
    }

    /// Submit the edge "`job` may not run until `dependency` completes".
    ///
    /// Both endpoints are registered on demand. Cycle rejection, if any,
    /// is the remote scheduler's responsibility.
    pub fn add_job_dependency(&self, job: &JobHandle, dependency: &JobHandle) -> Result<(), ClientError> {
        let job_name = self.ensure_registered(job)?;
        let dep_name = self.ensure_registered(dependency)?;
        self.inner.remote.call(
            "addJobDependency",
            &[WireValue::Str(job_name), WireValue::Str(dep_name)],
        )?;
        Ok(())
    }

    /// Block until `job` reaches a terminal state on the remote scheduler.
    ///
    /// No client-side timeout; cancellation is only possible by process
    /// termination.
    pub fn wait_for_job_finished(&self, job: &JobHandle) -> Result<(), ClientError> {
        let name = self.ensure_registered(job)?;
        self.inner
            .remote
            .call("waitForJobFinished", &[WireValue::Str(name)])?;
        Ok(())
    }

    /// Drive inbound invocations of registered objects on this thread.
    ///
    /// Blocks until [`Core::shutdown`] (or drop) stops the loop. Must be
    /// running for job `run` and metric measurement calls to make
    /// progress; call it after registering. A second call returns
    /// immediately.
    pub fn run(&self) {
        let queue = self.inner.queue.lock().ok().and_then(|mut q| q.take());
        let Some(queue) = queue else {
            warn!("dispatch loop already started once; ignoring");
            return;
        };
        info!("dispatch loop started");
        while let Ok(task) = queue.recv() {
            match task {
                Task::Invoke(f) => f(),
                Task::Stop => break,
            }
        }
        info!("dispatch loop stopped");
    }

    /// Unregister every currently-registered id and stop the dispatch
    /// loop. Runs at most once over each id; dropping the `Core` calls
    /// this as a backstop.
    pub fn shutdown(&self) {
        self.inner.teardown();
    }

    fn track(&self, id: i64, name: String) {
        if let Ok(mut map) = self.inner.registered.lock() {
            map.insert(id, name);
        }
    }

    fn ensure_registered(&self, job: &JobHandle) -> Result<String, ClientError> {
        if let Some(name) = job.registration_name() {
            return Ok(name);
        }
        self.register_job(job)?;
        job.registration_name()
            .ok_or_else(|| ClientError::remote("registerJob", "registration left no name"))
    }
}

impl CoreInner {
    fn teardown(&self) {
        let drained = match self.registered.lock() {
            Ok(mut map) => std::mem::take(&mut *map),
            Err(_) => BTreeMap::new(),
        };
        for (id, name) in drained {
            match self.remote.call("unregisterMetric", &[WireValue::Int(id)]) {
                Ok(_) => info!(id, %name, "unregistered at shutdown"),
                Err(error) => warn!(id, %name, %error, "unregister failed at shutdown"),
            }
        }
        let _ = self.tasks.send(Task::Stop);
    }
}

impl Drop for CoreInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::job::{Job, JobHandle, JobState};
    use crate::metric::{Metric, MetricHandle};
    use crate::testing::{InMemoryScheduler, LoopbackOrb};
    use std::thread;
    use std::time::Duration;

    struct NamedMetric(&'static str);

    impl Metric for NamedMetric {
        fn author(&self) -> String {
            "tester".to_owned()
        }

        fn description(&self) -> String {
            "test metric".to_owned()
        }

        fn name(&self) -> String {
            self.0.to_owned()
        }

        fn version(&self) -> String {
            "1.0.0".to_owned()
        }
    }

    struct RecordingJob {
        label: &'static str,
        delay: Duration,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Job for RecordingJob {
        fn run(&self) {
            thread::sleep(self.delay);
            self.log.lock().unwrap().push(self.label);
        }
    }

    fn connected() -> (Core, Arc<InMemoryScheduler>) {
        let orb = LoopbackOrb::new();
        let scheduler = InMemoryScheduler::install(&orb);
        let core = Core::connect(Arc::new(orb)).unwrap();
        (core, scheduler)
    }

    #[test]
    fn connect_fails_without_a_core_object() {
        let orb = LoopbackOrb::new();
        assert!(matches!(
            Core::connect(Arc::new(orb)),
            Err(ClientError::Connection { .. })
        ));
    }

    #[test]
    fn registrations_are_unique_and_never_deduplicated() {
        let (core, scheduler) = connected();
        let first = MetricHandle::new(Arc::new(NamedMetric("first")));
        let second = MetricHandle::new(Arc::new(NamedMetric("second")));

        let id1 = core.register_metric(&first).unwrap();
        let id2 = core.register_metric(&second).unwrap();
        assert_ne!(id1, id2);
        let name1 = first.registration_name().unwrap();
        let name2 = second.registration_name().unwrap();
        assert_ne!(name1, name2);
        assert!(name1.starts_with("Metric_"));
        assert!(name2.starts_with("Metric_"));

        // Registering the same handle again is a new registration, not an
        // error and not a no-op.
        let id3 = core.register_metric(&first).unwrap();
        assert_ne!(id3, id1);
        assert_eq!(scheduler.registrations().len(), 3);
    }

    #[test]
    fn dependency_completes_before_dependent_runs() {
        let (core, scheduler) = connected();
        let runner = {
            let core = core.clone();
            thread::spawn(move || core.run())
        };

        let log = Arc::new(Mutex::new(Vec::new()));
        let first = JobHandle::new(Arc::new(RecordingJob {
            label: "dependent",
            delay: Duration::ZERO,
            log: Arc::clone(&log),
        }));
        let second = JobHandle::new(Arc::new(RecordingJob {
            label: "dependency",
            delay: Duration::from_millis(50),
            log: Arc::clone(&log),
        }));

        core.add_job_dependency(&first, &second).unwrap();
        core.enqueue_job(&first).unwrap();
        core.enqueue_job(&second).unwrap();
        core.wait_for_job_finished(&first).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["dependency", "dependent"]);
        assert_eq!(first.state(), JobState::Finished);
        assert_eq!(second.state(), JobState::Finished);
        assert!(scheduler.is_finished(&first.registration_name().unwrap()));

        core.shutdown();
        runner.join().unwrap();
    }

    #[test]
    fn shutdown_unregisters_every_id_exactly_once() {
        let (core, scheduler) = connected();
        let first = MetricHandle::new(Arc::new(NamedMetric("first")));
        let second = MetricHandle::new(Arc::new(NamedMetric("second")));
        let id1 = core.register_metric(&first).unwrap();
        let id2 = core.register_metric(&second).unwrap();

        core.shutdown();
        let mut unregistered = scheduler.unregistered();
        unregistered.sort_unstable();
        let mut expected = vec![id1, id2];
        expected.sort_unstable();
        assert_eq!(unregistered, expected);

        // A second shutdown and the drop backstop find nothing left.
        core.shutdown();
        drop(core);
        assert_eq!(scheduler.unregistered().len(), 2);
    }

    #[test]
    fn explicit_unregister_removes_the_id_from_shutdown() {
        let (core, scheduler) = connected();
        let metric = MetricHandle::new(Arc::new(NamedMetric("solo")));
        let id = core.register_metric(&metric).unwrap();
        core.unregister_metric(id).unwrap();
        core.shutdown();
        assert_eq!(scheduler.unregistered(), vec![id]);
    }
}
