// SPDX-License-Identifier: Apache-2.0
//! Facade over the remote object database.
//!
//! Record CRUD plus two parameterized query dialects sharing one
//! parameter-encoding contract. Lookups return typed records; query rows
//! come back positional and untyped, decoded element by element.

use crate::error::{expect_bool, expect_list, ClientError};
use crate::orb::{Orb, RemoteObject};
use alitheia_proto::{propmap, DomainRecord, PropertyMap, Variant, WireValue};
use std::sync::Arc;
use tracing::warn;

const DATABASE_OBJECT: &str = "Database";

/// Client for the remote object database.
#[derive(Clone)]
pub struct Database {
    remote: Arc<dyn RemoteObject>,
}

impl Database {
    /// Connect to the remote database service.
    pub fn connect(orb: &dyn Orb) -> Result<Self, ClientError> {
        Ok(Self {
            remote: orb.resolve(DATABASE_OBJECT)?,
        })
    }

    /// Persist a new record. On success the service's view of the record
    /// (identity assigned) replaces `record` and `true` is returned; a
    /// rejected insert returns `false` and leaves `record` untouched.
    pub fn add_record<R: DomainRecord>(&self, record: &mut R) -> Result<bool, ClientError> {
        self.send_record("addRecord", record)
    }

    /// Update an existing record, refreshing `record` with the service's
    /// view on success.
    pub fn update_record<R: DomainRecord>(&self, record: &mut R) -> Result<bool, ClientError> {
        self.send_record("updateRecord", record)
    }

    /// Delete a record. Returns whether the service removed it.
    pub fn delete_record<R: DomainRecord>(&self, record: &R) -> Result<bool, ClientError> {
        const METHOD: &str = "deleteRecord";
        let reply = self.remote.call(METHOD, &[record.to_wire()])?;
        expect_bool(METHOD, reply)
    }

    /// Look up one record by identity. `None` when the service has no
    /// record of that type under `id`.
    pub fn find_object_by_id<R: DomainRecord>(&self, id: i64) -> Result<Option<R>, ClientError> {
        let reply = self.remote.call(
            "findObjectById",
            &[WireValue::from(R::TYPE.as_str()), WireValue::Int(id)],
        )?;
        Ok(R::from_wire(&reply))
    }

    /// Look up records matching every property in `filter` (the service
    /// ANDs them). Encoding order is deterministic for reproducible
    /// service-side logging, not for lookup semantics.
    pub fn find_objects_by_properties<R: DomainRecord>(
        &self,
        filter: &PropertyMap,
    ) -> Result<Vec<R>, ClientError> {
        const METHOD: &str = "findObjectsByProperties";
        let reply = self.remote.call(
            METHOD,
            &[WireValue::from(R::TYPE.as_str()), filter.to_wire()],
        )?;
        let items = expect_list(METHOD, reply)?;
        Ok(items
            .iter()
            .filter_map(|value| {
                let record = R::from_wire(value);
                if record.is_none() {
                    warn!(kind = R::TYPE.as_str(), "lookup result row skipped: not a record of the requested type");
                }
                record
            })
            .collect())
    }

    /// Run a parameterized HQL query. Parameters bind by name; result rows
    /// are positional.
    pub fn do_hql(&self, query: &str, params: &PropertyMap) -> Result<Vec<Vec<Variant>>, ClientError> {
        self.do_query("doHQL", query, params)
    }

    /// Run a parameterized SQL query. Same contract as [`Database::do_hql`].
    pub fn do_sql(&self, query: &str, params: &PropertyMap) -> Result<Vec<Vec<Variant>>, ClientError> {
        self.do_query("doSQL", query, params)
    }

    fn do_query(
        &self,
        method: &str,
        query: &str,
        params: &PropertyMap,
    ) -> Result<Vec<Vec<Variant>>, ClientError> {
        let reply = self
            .remote
            .call(method, &[WireValue::from(query), params.to_wire()])?;
        let rows = expect_list(method, reply)?;
        Ok(rows
            .into_iter()
            .map(|row| match row {
                // Multi-column rows arrive as lists; single-column rows as
                // bare values.
                WireValue::List(columns) => propmap::decode_row(&columns),
                value => propmap::decode_row(std::slice::from_ref(&value)),
            })
            .collect())
    }

    fn send_record<R: DomainRecord>(
        &self,
        method: &str,
        record: &mut R,
    ) -> Result<bool, ClientError> {
        let reply = self.remote.call(method, &[record.to_wire()])?;
        match R::from_wire(&reply) {
            Some(persisted) => {
                *record = persisted;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::Core;
    use crate::metric::{Metric, MetricHandle};
    use crate::testing::{InMemoryScheduler, LoopbackOrb, StaticDatabase};
    use alitheia_proto::StoredProject;

    fn database() -> Database {
        let orb = LoopbackOrb::new();
        orb.install("Database", Arc::new(StaticDatabase::with_project("svn")));
        Database::connect(&orb).unwrap()
    }

    #[test]
    fn property_filter_finds_project_by_name() {
        let db = database();
        let filter: PropertyMap = [("name".to_owned(), Variant::from("svn"))]
            .into_iter()
            .collect();
        let found: Vec<StoredProject> = db.find_objects_by_properties(&filter).unwrap();
        assert!(!found.is_empty());
        assert_eq!(found[0].name, "svn");
    }

    #[test]
    fn mismatched_filter_finds_nothing() {
        let db = database();
        let filter: PropertyMap = [("name".to_owned(), Variant::from("cvs"))]
            .into_iter()
            .collect();
        let found: Vec<StoredProject> = db.find_objects_by_properties(&filter).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn add_record_assigns_identity_in_place() {
        let db = database();
        let mut project = StoredProject {
            name: "fresh".to_owned(),
            ..StoredProject::default()
        };
        assert_eq!(project.id, 0);
        assert!(db.add_record(&mut project).unwrap());
        assert_ne!(project.id, 0);
        assert_eq!(project.name, "fresh");
    }

    #[test]
    fn find_by_id_round_trips_through_the_service() {
        let db = database();
        let mut project = StoredProject {
            name: "tracked".to_owned(),
            ..StoredProject::default()
        };
        db.add_record(&mut project).unwrap();
        let found: Option<StoredProject> = db.find_object_by_id(project.id).unwrap();
        assert_eq!(found, Some(project));
    }

    #[test]
    fn queries_return_positional_rows() {
        let db = database();
        let rows = db.do_hql("from StoredProject", &PropertyMap::new()).unwrap();
        assert!(rows.is_empty());
    }

    struct Example;

    impl Metric for Example {
        fn author(&self) -> String {
            "example@alitheia".to_owned()
        }

        fn description(&self) -> String {
            "example metric".to_owned()
        }

        fn name(&self) -> String {
            "Example".to_owned()
        }

        fn version(&self) -> String {
            "1.0.0".to_owned()
        }
    }

    #[test]
    fn example_metric_registration_and_project_lookup() {
        let orb = LoopbackOrb::new();
        let _scheduler = InMemoryScheduler::install(&orb);
        orb.install("Database", Arc::new(StaticDatabase::with_project("svn")));

        let core = Core::connect(Arc::new(orb.clone())).unwrap();
        let handle = MetricHandle::new(Arc::new(Example));
        core.register_metric(&handle).unwrap();
        assert!(handle.id().is_some());

        let db = Database::connect(&orb).unwrap();
        let filter: PropertyMap = [("name", Variant::from("svn"))].into_iter().collect();
        let found: Vec<StoredProject> = db.find_objects_by_properties(&filter).unwrap();
        assert!(!found.is_empty());
        assert_eq!(found[0].name, "svn");

        core.shutdown();
    }
}
