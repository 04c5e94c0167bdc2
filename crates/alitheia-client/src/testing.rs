// SPDX-License-Identifier: Apache-2.0
//! In-process fakes for exercising the client without a live service.
//!
//! [`LoopbackOrb`] is a name-to-servant table posing as the transport;
//! the fake services ([`InMemoryScheduler`], [`StaticDatabase`],
//! [`StaticFds`], [`RecordingLogger`]) are servants installed into it
//! under the well-known service names. None of this is a transport
//! implementation; it exists so the client contract is exercisable in
//! tests and examples.

use crate::error::ClientError;
use crate::orb::{Orb, RemoteObject, Servant};
use alitheia_proto::{
    DomainRecord, ProjectFile, ProjectVersion, StoredProject, WireRecord, WireValue,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread;

fn relock<'a, T>(
    result: Result<MutexGuard<'a, T>, std::sync::PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// An in-process object broker: names map straight to servants.
#[derive(Clone, Default)]
pub struct LoopbackOrb {
    inner: Arc<OrbInner>,
}

#[derive(Default)]
struct OrbInner {
    objects: Mutex<BTreeMap<String, Arc<dyn Servant>>>,
}

impl LoopbackOrb {
    /// An empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a servant under a well-known service name.
    pub fn install(&self, name: &str, servant: Arc<dyn Servant>) {
        relock(self.inner.objects.lock()).insert(name.to_owned(), servant);
    }

    fn servant(&self, name: &str) -> Option<Arc<dyn Servant>> {
        relock(self.inner.objects.lock()).get(name).cloned()
    }
}

impl Orb for LoopbackOrb {
    fn resolve(&self, name: &str) -> Result<Arc<dyn RemoteObject>, ClientError> {
        if self.servant(name).is_none() {
            return Err(ClientError::Connection {
                name: name.to_owned(),
                reason: "no such loopback object".to_owned(),
            });
        }
        Ok(Arc::new(LoopbackStub {
            orb: Arc::clone(&self.inner),
            name: name.to_owned(),
        }))
    }

    fn export(&self, name: &str, servant: Arc<dyn Servant>) -> Result<(), ClientError> {
        self.install(name, servant);
        Ok(())
    }
}

// A resolved stub keeps the broker alive: facades routinely outlive the
// orb handle that produced them. Servants never hold stubs, so this
// cannot cycle.
struct LoopbackStub {
    orb: Arc<OrbInner>,
    name: String,
}

impl RemoteObject for LoopbackStub {
    fn call(&self, method: &str, args: &[WireValue]) -> Result<WireValue, ClientError> {
        let servant = relock(self.orb.objects.lock()).get(&self.name).cloned();
        match servant {
            Some(servant) => servant.dispatch(method, args),
            None => Err(ClientError::remote(method, "loopback object withdrawn")),
        }
    }
}

/// A fake scheduler honoring dependency edges.
///
/// `enqueueJob` runs the named job on a worker thread once every recorded
/// dependency has finished; `waitForJobFinished` blocks until the job's
/// completion is observable. Registration ids count up from 1.
pub struct InMemoryScheduler {
    orb: Weak<OrbInner>,
    this: Weak<InMemoryScheduler>,
    state: Mutex<SchedulerState>,
    done: Condvar,
}

#[derive(Default)]
struct SchedulerState {
    next_id: i64,
    registered: Vec<(i64, String)>,
    unregistered: Vec<i64>,
    deps: BTreeMap<String, Vec<String>>,
    finished: BTreeSet<String>,
}

impl InMemoryScheduler {
    /// Build a scheduler and install it into `orb` under `"Core"`.
    pub fn install(orb: &LoopbackOrb) -> Arc<Self> {
        let scheduler = Arc::new_cyclic(|this| Self {
            orb: Arc::downgrade(&orb.inner),
            this: this.clone(),
            state: Mutex::new(SchedulerState::default()),
            done: Condvar::new(),
        });
        orb.install("Core", Arc::clone(&scheduler) as Arc<dyn Servant>);
        scheduler
    }

    /// Every `(id, name)` registration in order.
    pub fn registrations(&self) -> Vec<(i64, String)> {
        relock(self.state.lock()).registered.clone()
    }

    /// Ids passed to `unregisterMetric`, duplicates included.
    pub fn unregistered(&self) -> Vec<i64> {
        relock(self.state.lock()).unregistered.clone()
    }

    /// Whether the named job has completed.
    pub fn is_finished(&self, name: &str) -> bool {
        relock(self.state.lock()).finished.contains(name)
    }

    fn run_when_ready(self: Arc<Self>, name: String) {
        thread::spawn(move || {
            {
                let mut state = relock(self.state.lock());
                let deps = state.deps.get(&name).cloned().unwrap_or_default();
                while !deps.iter().all(|dep| state.finished.contains(dep)) {
                    state = relock(self.done.wait(state));
                }
            }
            if let Some(orb) = self.orb.upgrade() {
                let servant = relock(orb.objects.lock()).get(&name).cloned();
                if let Some(servant) = servant {
                    let _ = servant.dispatch("run", &[]);
                }
            }
            let mut state = relock(self.state.lock());
            state.finished.insert(name);
            self.done.notify_all();
        });
    }

    fn expect_name(method: &str, args: &[WireValue], index: usize) -> Result<String, ClientError> {
        args.get(index)
            .and_then(WireValue::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ClientError::remote(method, "missing name argument"))
    }
}

impl Servant for InMemoryScheduler {
    fn dispatch(&self, method: &str, args: &[WireValue]) -> Result<WireValue, ClientError> {
        match method {
            "registerMetric" | "registerJob" => {
                let name = Self::expect_name(method, args, 0)?;
                let mut state = relock(self.state.lock());
                state.next_id += 1;
                let id = state.next_id;
                state.registered.push((id, name));
                Ok(WireValue::Int(id))
            }
            "unregisterMetric" => {
                let id = args
                    .first()
                    .and_then(WireValue::as_int)
                    .ok_or_else(|| ClientError::remote(method, "missing id argument"))?;
                let mut state = relock(self.state.lock());
                state.unregistered.push(id);
                state.registered.retain(|(known, _)| *known != id);
                Ok(WireValue::Absent)
            }
            "addJobDependency" => {
                let job = Self::expect_name(method, args, 0)?;
                let dep = Self::expect_name(method, args, 1)?;
                relock(self.state.lock()).deps.entry(job).or_default().push(dep);
                Ok(WireValue::Absent)
            }
            "enqueueJob" => {
                let name = Self::expect_name(method, args, 0)?;
                let scheduler = self
                    .this
                    .upgrade()
                    .ok_or_else(|| ClientError::remote(method, "scheduler is gone"))?;
                scheduler.run_when_ready(name);
                Ok(WireValue::Absent)
            }
            "waitForJobFinished" => {
                let name = Self::expect_name(method, args, 0)?;
                let mut state = relock(self.state.lock());
                while !state.finished.contains(&name) {
                    state = relock(self.done.wait(state));
                }
                Ok(WireValue::Absent)
            }
            other => Err(ClientError::remote(other, "unknown scheduler method")),
        }
    }
}

/// A fake object database with canned seed data and naive persistence.
///
/// `addRecord` assigns ids counting up from the highest seeded id;
/// property filters understand the `name` and `id` keys (enough for the
/// record kinds whose `name` is their second wire field).
#[derive(Default)]
pub struct StaticDatabase {
    state: Mutex<DbState>,
}

#[derive(Default)]
struct DbState {
    next_id: i64,
    records: Vec<WireRecord>,
}

impl StaticDatabase {
    /// An empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// A database seeded with one stored project named `name` (id 1).
    pub fn with_project(name: &str) -> Self {
        let db = Self::new();
        {
            let mut state = relock(db.state.lock());
            let project = StoredProject {
                id: 1,
                name: name.to_owned(),
                ..StoredProject::default()
            };
            if let WireValue::Record(record) = project.to_wire() {
                state.records.push(record);
            }
            state.next_id = 1;
        }
        db
    }

    fn record_id(record: &WireRecord) -> Option<i64> {
        record.fields().first().and_then(WireValue::as_int)
    }

    fn matches_filter(record: &WireRecord, entries: &[alitheia_proto::MapEntry]) -> bool {
        entries.iter().all(|entry| match entry.key.as_str() {
            "id" => record.fields().first() == Some(&entry.value),
            "name" => record.fields().get(1) == Some(&entry.value),
            _ => true,
        })
    }
}

impl Servant for StaticDatabase {
    fn dispatch(&self, method: &str, args: &[WireValue]) -> Result<WireValue, ClientError> {
        match method {
            "addRecord" => {
                let record = args
                    .first()
                    .and_then(WireValue::as_record)
                    .ok_or_else(|| ClientError::remote(method, "missing record argument"))?;
                let mut state = relock(self.state.lock());
                state.next_id += 1;
                let mut fields = record.fields().to_vec();
                if !fields.is_empty() {
                    fields[0] = WireValue::Int(state.next_id);
                }
                let persisted = WireRecord::new(record.tag(), fields);
                state.records.push(persisted.clone());
                Ok(WireValue::Record(persisted))
            }
            "updateRecord" => {
                let record = args
                    .first()
                    .and_then(WireValue::as_record)
                    .ok_or_else(|| ClientError::remote(method, "missing record argument"))?;
                let id = Self::record_id(record);
                let mut state = relock(self.state.lock());
                for stored in &mut state.records {
                    if stored.tag() == record.tag() && Self::record_id(stored) == id {
                        *stored = record.clone();
                        return Ok(WireValue::Record(record.clone()));
                    }
                }
                Ok(WireValue::Absent)
            }
            "deleteRecord" => {
                let record = args
                    .first()
                    .and_then(WireValue::as_record)
                    .ok_or_else(|| ClientError::remote(method, "missing record argument"))?;
                let id = Self::record_id(record);
                let mut state = relock(self.state.lock());
                let before = state.records.len();
                state
                    .records
                    .retain(|stored| !(stored.tag() == record.tag() && Self::record_id(stored) == id));
                Ok(WireValue::Bool(state.records.len() < before))
            }
            "findObjectById" => {
                let kind = args.first().and_then(WireValue::as_str).map(str::to_owned);
                let id = args.get(1).and_then(WireValue::as_int);
                let state = relock(self.state.lock());
                let found = state.records.iter().find(|record| {
                    kind.as_deref() == Some(record.tag().as_str()) && Self::record_id(record) == id
                });
                Ok(found
                    .map(|record| WireValue::Record(record.clone()))
                    .unwrap_or(WireValue::Absent))
            }
            "findObjectsByProperties" => {
                let kind = args.first().and_then(WireValue::as_str).map(str::to_owned);
                let entries = match args.get(1) {
                    Some(WireValue::Map(entries)) => entries.as_slice(),
                    _ => &[],
                };
                let state = relock(self.state.lock());
                let found = state
                    .records
                    .iter()
                    .filter(|record| {
                        kind.as_deref() == Some(record.tag().as_str())
                            && Self::matches_filter(record, entries)
                    })
                    .cloned()
                    .map(WireValue::Record)
                    .collect();
                Ok(WireValue::List(found))
            }
            "doHQL" | "doSQL" => Ok(WireValue::List(Vec::new())),
            other => Err(ClientError::remote(other, "unknown database method")),
        }
    }
}

/// A fake file-data service over an in-memory file table, counting
/// content fetches per file name.
#[derive(Default)]
pub struct StaticFds {
    state: Mutex<FdsState>,
}

#[derive(Default)]
struct FdsState {
    version: ProjectVersion,
    files: Vec<(ProjectFile, String)>,
    fetches: BTreeMap<String, usize>,
}

impl StaticFds {
    /// An empty file table under a default version.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `content` under a file named `name` at the table's version.
    pub fn add_file(&self, name: &str, content: &str) {
        let mut state = relock(self.state.lock());
        let file = ProjectFile {
            id: state.files.len() as i64 + 1,
            name: name.to_owned(),
            ..ProjectFile::default()
        };
        state.files.push((file, content.to_owned()));
    }

    /// How many times `name`'s content has been fetched.
    pub fn fetch_count(&self, name: &str) -> usize {
        relock(self.state.lock()).fetches.get(name).copied().unwrap_or(0)
    }
}

impl Servant for StaticFds {
    fn dispatch(&self, method: &str, args: &[WireValue]) -> Result<WireValue, ClientError> {
        match method {
            "getFileContents" => {
                let file = args
                    .first()
                    .and_then(ProjectFile::from_wire)
                    .ok_or_else(|| ClientError::remote(method, "missing file argument"))?;
                let mut state = relock(self.state.lock());
                *state.fetches.entry(file.name.clone()).or_insert(0) += 1;
                let content = state
                    .files
                    .iter()
                    .find(|(known, _)| known.name == file.name)
                    .map(|(_, content)| content.clone())
                    .ok_or_else(|| ClientError::remote(method, "no such file"))?;
                Ok(WireValue::Str(content))
            }
            "getCheckout" => {
                let state = relock(self.state.lock());
                let files = state
                    .files
                    .iter()
                    .map(|(file, _)| file.to_wire())
                    .collect();
                Ok(WireValue::List(vec![
                    state.version.to_wire(),
                    WireValue::List(files),
                ]))
            }
            other => Err(ClientError::remote(other, "unknown file-data method")),
        }
    }
}

/// A fake logging service capturing `(severity, channel, message)` rows.
#[derive(Default)]
pub struct RecordingLogger {
    messages: Mutex<Vec<(String, String, String)>>,
}

impl RecordingLogger {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every captured `(severity, channel, message)` row, in order.
    pub fn messages(&self) -> Vec<(String, String, String)> {
        relock(self.messages.lock()).clone()
    }
}

impl Servant for RecordingLogger {
    fn dispatch(&self, method: &str, args: &[WireValue]) -> Result<WireValue, ClientError> {
        match method {
            "debug" | "info" | "warn" | "error" => {
                let channel = args
                    .first()
                    .and_then(WireValue::as_str)
                    .unwrap_or_default()
                    .to_owned();
                let message = args
                    .get(1)
                    .and_then(WireValue::as_str)
                    .unwrap_or_default()
                    .to_owned();
                relock(self.messages.lock()).push((method.to_owned(), channel, message));
                Ok(WireValue::Absent)
            }
            other => Err(ClientError::remote(other, "unknown logger method")),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::db::Database;
    use alitheia_proto::PropertyMap;

    #[test]
    fn resolved_stub_outlives_the_orb_handle() {
        let orb = LoopbackOrb::new();
        orb.install("Database", Arc::new(StaticDatabase::with_project("svn")));
        let db = Database::connect(&orb).unwrap();
        drop(orb);

        // The facade must keep the connection alive on its own.
        let found: Vec<StoredProject> = db
            .find_objects_by_properties(&PropertyMap::new())
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn resolving_an_uninstalled_name_is_a_connection_error() {
        let orb = LoopbackOrb::new();
        assert!(matches!(
            orb.resolve("Database"),
            Err(ClientError::Connection { .. })
        ));
    }
}
