// SPDX-License-Identifier: Apache-2.0
//! Local metric objects and their registration handles.

use crate::core::{run_on_owner, Task};
use crate::error::ClientError;
use crate::orb::Servant;
use alitheia_proto::{DomainRecord, ProjectFile, ProjectVersion, WireValue};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

/// A locally-implemented metric, remotely invokable once registered.
///
/// The metadata accessors must be effectively immutable after registration:
/// they are answered directly on the transport's dispatch thread. The
/// measurement hooks run on the thread driving `Core::run`; a metric
/// implements the hooks for the record kinds it supports and leaves the
/// rest as the default no-ops.
pub trait Metric: Send + Sync {
    /// Author of the metric.
    fn author(&self) -> String;
    /// Human-readable description.
    fn description(&self) -> String;
    /// Display name (unrelated to the generated registration name).
    fn name(&self) -> String;
    /// Metric implementation version.
    fn version(&self) -> String;

    /// Metric-level result summary.
    fn result(&self) -> String {
        String::new()
    }

    /// Installation date as reported to the service.
    fn date_installed(&self) -> String {
        String::new()
    }

    /// Measure a single project file.
    fn run_project_file(&self, _file: ProjectFile) {}

    /// Result for a single project file.
    fn result_for_file(&self, _file: &ProjectFile) -> String {
        String::new()
    }

    /// Measure a project version.
    fn run_project_version(&self, _version: ProjectVersion) {}

    /// Result for a project version.
    fn result_for_version(&self, _version: &ProjectVersion) -> String {
        String::new()
    }
}

/// A cloneable handle pairing a metric with its registration state: the
/// generated registration name and the service-assigned id, both `None`
/// until the metric has been registered.
#[derive(Clone)]
pub struct MetricHandle {
    shared: Arc<MetricShared>,
}

struct MetricShared {
    metric: Arc<dyn Metric>,
    name: Mutex<Option<String>>,
    id: Mutex<Option<i64>>,
}

impl MetricHandle {
    /// Wrap a metric for registration.
    pub fn new(metric: Arc<dyn Metric>) -> Self {
        Self {
            shared: Arc::new(MetricShared {
                metric,
                name: Mutex::new(None),
                id: Mutex::new(None),
            }),
        }
    }

    /// The service-assigned id, if registered.
    pub fn id(&self) -> Option<i64> {
        self.shared.id.lock().ok().and_then(|id| *id)
    }

    /// The name the metric is registered under, if registered.
    pub fn registration_name(&self) -> Option<String> {
        self.shared.name.lock().ok().and_then(|n| n.clone())
    }

    pub(crate) fn metric(&self) -> Arc<dyn Metric> {
        Arc::clone(&self.shared.metric)
    }

    pub(crate) fn set_registration(&self, name: String, id: i64) {
        if let Ok(mut slot) = self.shared.name.lock() {
            *slot = Some(name);
        }
        if let Ok(mut slot) = self.shared.id.lock() {
            *slot = Some(id);
        }
    }
}

/// Transport-facing adapter for a registered metric.
///
/// Metadata getters answer inline; `run` and record-scoped `getResult`
/// calls are handed to the owner's task queue, with the dispatch thread
/// blocked on the reply.
pub(crate) struct MetricServant {
    metric: Arc<dyn Metric>,
    tasks: Sender<Task>,
}

impl MetricServant {
    pub(crate) fn new(metric: Arc<dyn Metric>, tasks: Sender<Task>) -> Self {
        Self { metric, tasks }
    }
}

impl Servant for MetricServant {
    fn dispatch(&self, method: &str, args: &[WireValue]) -> Result<WireValue, ClientError> {
        match method {
            "getAuthor" => Ok(WireValue::Str(self.metric.author())),
            "getDescription" => Ok(WireValue::Str(self.metric.description())),
            "getName" => Ok(WireValue::Str(self.metric.name())),
            "getVersion" => Ok(WireValue::Str(self.metric.version())),
            "getDateInstalled" => Ok(WireValue::Str(self.metric.date_installed())),
            // Plain `getResult` is metadata; with a record argument it is a
            // measurement lookup for that record.
            "getResult" => match args.first() {
                None | Some(WireValue::Absent) => Ok(WireValue::Str(self.metric.result())),
                Some(value) => {
                    if let Some(file) = ProjectFile::from_wire(value) {
                        let metric = Arc::clone(&self.metric);
                        let result = run_on_owner(&self.tasks, method, move || {
                            metric.result_for_file(&file)
                        })?;
                        Ok(WireValue::Str(result))
                    } else if let Some(version) = ProjectVersion::from_wire(value) {
                        let metric = Arc::clone(&self.metric);
                        let result = run_on_owner(&self.tasks, method, move || {
                            metric.result_for_version(&version)
                        })?;
                        Ok(WireValue::Str(result))
                    } else {
                        Err(ClientError::remote(method, "unsupported record argument"))
                    }
                }
            },
            "run" => {
                let value = args
                    .first()
                    .ok_or_else(|| ClientError::remote(method, "missing record argument"))?;
                if let Some(file) = ProjectFile::from_wire(value) {
                    let metric = Arc::clone(&self.metric);
                    run_on_owner(&self.tasks, method, move || metric.run_project_file(file))?;
                    Ok(WireValue::Absent)
                } else if let Some(version) = ProjectVersion::from_wire(value) {
                    let metric = Arc::clone(&self.metric);
                    run_on_owner(&self.tasks, method, move || {
                        metric.run_project_version(version);
                    })?;
                    Ok(WireValue::Absent)
                } else {
                    Err(ClientError::remote(method, "unsupported record argument"))
                }
            }
            other => Err(ClientError::remote(other, "unknown metric method")),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::Core;
    use crate::orb::Orb;
    use crate::testing::{InMemoryScheduler, LoopbackOrb};
    use std::thread;

    struct Loc {
        measured: Mutex<Vec<String>>,
    }

    impl Metric for Loc {
        fn author(&self) -> String {
            "tester".to_owned()
        }

        fn description(&self) -> String {
            "lines of code".to_owned()
        }

        fn name(&self) -> String {
            "LOC".to_owned()
        }

        fn version(&self) -> String {
            "1.0.0".to_owned()
        }

        fn run_project_file(&self, file: ProjectFile) {
            if let Ok(mut measured) = self.measured.lock() {
                measured.push(file.name);
            }
        }

        fn result_for_file(&self, _file: &ProjectFile) -> String {
            "42".to_owned()
        }
    }

    #[test]
    fn inbound_calls_reach_the_registered_metric() {
        let orb = LoopbackOrb::new();
        let _scheduler = InMemoryScheduler::install(&orb);
        let core = Core::connect(Arc::new(orb.clone())).unwrap();
        let runner = {
            let core = core.clone();
            thread::spawn(move || core.run())
        };

        let metric = Arc::new(Loc {
            measured: Mutex::new(Vec::new()),
        });
        let handle = MetricHandle::new(Arc::clone(&metric) as Arc<dyn Metric>);
        core.register_metric(&handle).unwrap();

        // The service side reaches the metric through its registration name.
        let stub = orb.resolve(&handle.registration_name().unwrap()).unwrap();
        assert_eq!(
            stub.call("getName", &[]).unwrap(),
            WireValue::Str("LOC".to_owned())
        );

        let file = ProjectFile {
            name: "src/main.c".to_owned(),
            ..ProjectFile::default()
        };
        stub.call("run", &[file.to_wire()]).unwrap();
        assert_eq!(*metric.measured.lock().unwrap(), vec!["src/main.c"]);

        assert_eq!(
            stub.call("getResult", &[file.to_wire()]).unwrap(),
            WireValue::Str("42".to_owned())
        );
        // Metric-level result without a record argument.
        assert_eq!(
            stub.call("getResult", &[]).unwrap(),
            WireValue::Str(String::new())
        );

        core.shutdown();
        runner.join().unwrap();
    }
}
