//! In-process reference backend.
//!
//! Records live in per-entity tables keyed by a configurable key field.
//! Queries run through the condition evaluator in [`eval`]; literal text
//! goes through the small query language in [`literal`].

mod eval;
mod literal;

use crate::{
    db::{
        query::{DeleteQuery, ParamBindings, StructuredQuery},
        record::Record,
        template::{AsyncTemplate, Callback, PreparedStatement, Template, TemplateError},
    },
    value::Value,
    DEFAULT_ID_STORAGE_NAME,
};
use literal::Statement;
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

///
/// Entry
///

#[derive(Clone, Debug)]
struct Entry {
    record: Record,
    expires: Option<Instant>,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        self.expires.is_none_or(|at| at > now)
    }
}

type Tables = BTreeMap<String, Vec<Entry>>;

///
/// MemoryTemplate
///
/// Thread-safe in-memory [`Template`]. Writes upsert on the entity's key
/// field; records without a key value are appended. Insertion order is
/// the natural result order.
///

#[derive(Debug)]
pub struct MemoryTemplate {
    tables: Mutex<Tables>,
    key_field: String,
    entity_keys: BTreeMap<String, String>,
}

impl MemoryTemplate {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(BTreeMap::new()),
            key_field: DEFAULT_ID_STORAGE_NAME.to_string(),
            entity_keys: BTreeMap::new(),
        }
    }

    /// Key field used for every entity without its own override.
    #[must_use]
    pub fn with_key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }

    #[must_use]
    pub fn with_entity_key(mut self, entity: impl Into<String>, field: impl Into<String>) -> Self {
        self.entity_keys.insert(entity.into(), field.into());
        self
    }

    #[must_use]
    pub fn key_field(&self, entity: &str) -> &str {
        self.entity_keys.get(entity).unwrap_or(&self.key_field)
    }

    /// Live records of one entity, in insertion order.
    pub fn records(&self, entity: &str) -> Result<Vec<Record>, TemplateError> {
        let now = Instant::now();
        let tables = self.lock()?;

        Ok(tables
            .get(entity)
            .map(|table| {
                table
                    .iter()
                    .filter(|entry| entry.live(now))
                    .map(|entry| entry.record.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn clear(&self) -> Result<(), TemplateError> {
        self.lock()?.clear();

        Ok(())
    }

    // ------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, TemplateError> {
        self.tables
            .lock()
            .map_err(|_| TemplateError::backend("memory store lock poisoned"))
    }

    fn write(&self, record: Record, expires: Option<Instant>) -> Result<Record, TemplateError> {
        let key_field = self.key_field(&record.name).to_string();
        let key = record.get(&key_field).filter(|v| !v.is_null()).cloned();

        let mut tables = self.lock()?;
        let table = tables.entry(record.name.clone()).or_default();
        purge(table);

        let entry = Entry {
            record: record.clone(),
            expires,
        };
        let slot = key.as_ref().and_then(|key| {
            table
                .iter()
                .position(|e| e.record.get(&key_field) == Some(key))
        });
        match slot {
            Some(pos) => table[pos] = entry,
            None => table.push(entry),
        }

        Ok(record)
    }

    fn query(&self, query: &StructuredQuery) -> Result<Vec<Record>, TemplateError> {
        let mut hits = Vec::new();
        for record in self.records(&query.source_entity)? {
            let keep = match &query.condition {
                Some(condition) => eval::matches(&record, condition)?,
                None => true,
            };
            if keep {
                hits.push(record);
            }
        }

        eval::sort(&mut hits, &query.sorts);

        Ok(eval::window(hits, query.skip, query.limit))
    }

    fn remove(&self, query: &DeleteQuery) -> Result<Vec<Record>, TemplateError> {
        let mut tables = self.lock()?;
        let Some(table) = tables.get_mut(&query.source_entity) else {
            return Ok(Vec::new());
        };
        purge(table);

        // evaluate everything first so a failing condition removes nothing
        let mut doomed = Vec::with_capacity(table.len());
        for entry in table.iter() {
            doomed.push(match &query.condition {
                Some(condition) => eval::matches(&entry.record, condition)?,
                None => true,
            });
        }

        let mut removed = Vec::new();
        let mut flags = doomed.into_iter();
        table.retain(|entry| {
            let drop = flags.next().unwrap_or(false);
            if drop {
                removed.push(entry.record.clone());
            }
            !drop
        });

        Ok(removed)
    }

    fn run(&self, statement: Statement) -> Result<Vec<Record>, TemplateError> {
        if let Some(name) = statement.params().first() {
            return Err(TemplateError::UnboundParameter((*name).to_string()));
        }

        match statement {
            Statement::Select(query) => self.query(&query),
            Statement::Delete(query) => self.remove(&query),
        }
    }
}

impl Default for MemoryTemplate {
    fn default() -> Self {
        Self::new()
    }
}

fn purge(table: &mut Vec<Entry>) {
    let now = Instant::now();
    table.retain(|entry| entry.live(now));
}

impl Template for MemoryTemplate {
    fn insert(&self, record: Record) -> Result<Record, TemplateError> {
        self.write(record, None)
    }

    fn insert_with_ttl(&self, record: Record, ttl: Duration) -> Result<Record, TemplateError> {
        self.write(record, Some(Instant::now() + ttl))
    }

    fn update(&self, record: Record) -> Result<Record, TemplateError> {
        self.write(record, None)
    }

    fn delete(&self, query: &DeleteQuery) -> Result<u64, TemplateError> {
        let removed = self.remove(query)?;

        Ok(removed.len() as u64)
    }

    fn select(&self, query: &StructuredQuery) -> Result<Vec<Record>, TemplateError> {
        self.query(query)
    }

    fn execute_literal(&self, query: &str) -> Result<Vec<Record>, TemplateError> {
        self.run(literal::parse(query)?)
    }

    fn prepare(&self, query: &str) -> Result<Box<dyn PreparedStatement + '_>, TemplateError> {
        Ok(Box::new(MemoryStatement {
            template: self,
            statement: literal::parse(query)?,
            bindings: ParamBindings::new(),
        }))
    }

    fn count(&self, entity: &str) -> Result<u64, TemplateError> {
        Ok(self.records(entity)?.len() as u64)
    }
}

///
/// MemoryStatement
///

struct MemoryStatement<'a> {
    template: &'a MemoryTemplate,
    statement: Statement,
    bindings: ParamBindings,
}

impl PreparedStatement for MemoryStatement<'_> {
    fn bind(&mut self, name: &str, value: Value) {
        self.bindings.insert(name, value);
    }

    fn execute(&mut self) -> Result<Vec<Record>, TemplateError> {
        let bound = self.statement.clone().bind(&self.bindings);

        self.template.run(bound)
    }
}

// Completes every call on the calling thread.
impl AsyncTemplate for MemoryTemplate {
    fn insert_async(&self, record: Record, callback: Callback<Record>) {
        callback(self.insert(record));
    }

    fn insert_with_ttl_async(&self, record: Record, ttl: Duration, callback: Callback<Record>) {
        callback(self.insert_with_ttl(record, ttl));
    }

    fn update_async(&self, record: Record, callback: Callback<Record>) {
        callback(self.update(record));
    }

    fn delete_async(&self, query: DeleteQuery, callback: Callback<u64>) {
        callback(self.delete(&query));
    }

    fn select_async(&self, query: StructuredQuery, callback: Callback<Vec<Record>>) {
        callback(self.select(&query));
    }

    fn execute_literal_async(&self, query: String, callback: Callback<Vec<Record>>) {
        callback(self.execute_literal(&query));
    }

    fn execute_prepared_async(
        &self,
        query: String,
        params: ParamBindings,
        callback: Callback<Vec<Record>>,
    ) {
        let result = literal::parse(&query).and_then(|statement| self.run(statement.bind(&params)));

        callback(result);
    }

    fn count_async(&self, entity: String, callback: Callback<u64>) {
        callback(self.count(&entity));
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::builder::*;
    use std::sync::mpsc;

    fn person(id: u64, name: &str, age: u32) -> Record {
        Record::new("Person")
            .with("_id", id)
            .with("name", name)
            .with("age", age)
    }

    fn seeded() -> MemoryTemplate {
        let store = MemoryTemplate::new();
        for (id, name, age) in [(1, "Ada", 36), (2, "Bob", 17), (3, "Cy", 52), (4, "Di", 17)] {
            store.insert(person(id, name, age)).expect("insert");
        }
        store
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records
            .iter()
            .filter_map(|r| r.get("name").and_then(Value::as_text))
            .collect()
    }

    #[test]
    fn writes_upsert_on_the_key_field() {
        let store = seeded();
        store.update(person(2, "Bobby", 18)).expect("update");
        store
            .insert(Record::new("Person").with("name", "Anon"))
            .expect("keyless insert");

        let all = store.records("Person").expect("records");
        assert_eq!(names(&all), vec!["Ada", "Bobby", "Cy", "Di", "Anon"]);
    }

    #[test]
    fn entity_key_overrides_apply_per_entity() {
        let store = MemoryTemplate::new().with_entity_key("Order", "order_id");
        assert_eq!(store.key_field("Order"), "order_id");
        assert_eq!(store.key_field("Person"), "_id");

        let order = |status: &str| Record::new("Order").with("order_id", 7).with("status", status);
        store.insert(order("open")).expect("insert");
        store.insert(order("closed")).expect("insert");

        assert_eq!(store.count("Order").expect("count"), 1);
    }

    #[test]
    fn ttl_entries_expire() {
        let store = MemoryTemplate::new();
        store
            .insert_with_ttl(person(1, "Ada", 36), Duration::ZERO)
            .expect("insert");
        store
            .insert_with_ttl(person(2, "Bob", 17), Duration::from_secs(3600))
            .expect("insert");

        assert_eq!(store.count("Person").expect("count"), 1);
    }

    #[test]
    fn select_filters_sorts_and_windows() {
        let store = seeded();
        let query = select("Person")
            .filter(lt("age", 60))
            .order_by("age")
            .order_by_desc("name")
            .skip(1)
            .limit(2)
            .build();

        let hits = store.select(&query).expect("select");
        assert_eq!(names(&hits), vec!["Bob", "Ada"]);
    }

    #[test]
    fn delete_removes_matches_and_counts_them() {
        let store = seeded();
        let removed = store
            .delete(&delete("Person").filter(eq("age", 17)).build())
            .expect("delete");

        assert_eq!(removed, 2);
        assert_eq!(store.count("Person").expect("count"), 2);
        assert_eq!(store.delete(&DeleteQuery::all("Nobody")).expect("delete"), 0);
    }

    #[test]
    fn literal_queries_run_and_deletes_return_records() {
        let store = seeded();

        let hits = store
            .execute_literal("select * from Person where age >= 30 order by name desc")
            .expect("select");
        assert_eq!(names(&hits), vec!["Cy", "Ada"]);

        let gone = store
            .execute_literal("delete from Person where name like 'D%'")
            .expect("delete");
        assert_eq!(names(&gone), vec!["Di"]);

        let err = store
            .execute_literal("select * from Person where name = @name")
            .expect_err("unbound");
        assert_eq!(err, TemplateError::UnboundParameter("name".to_string()));
    }

    #[test]
    fn prepared_statements_bind_by_name() {
        let store = seeded();
        let mut statement = store
            .prepare("select * from Person where age between @low and @high order by _id")
            .expect("prepare");

        statement.bind("low", Value::from(17));
        assert!(matches!(
            statement.execute(),
            Err(TemplateError::UnboundParameter(name)) if name == "high"
        ));

        statement.bind("high", Value::from(40));
        let hits = statement.execute().expect("execute");
        assert_eq!(names(&hits), vec!["Ada", "Bob", "Di"]);
    }

    #[test]
    fn async_calls_complete_through_the_callback() {
        let store = seeded();
        let (tx, rx) = mpsc::channel();

        let params: ParamBindings = [("who".to_string(), Value::from("Cy"))].into_iter().collect();
        store.execute_prepared_async(
            "select * from Person where name = @who".to_string(),
            params,
            Box::new(move |result| {
                let _ = tx.send(result.map(|records| records.len()));
            }),
        );

        assert_eq!(rx.recv().expect("callback"), Ok(1));
    }
}
