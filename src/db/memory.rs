//! `InMemoryDao` - HashMap-backed DAO for tests, demos and development.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use super::criteria::{self, CriteriaComponent, CriteriaGroupLogic, Operator};
use super::query::{Query, QuerySpec};
use super::{Dao, Model};
use crate::error::{Error, Result};

/// When a row was written. Stamps order by `seq` alone; `at` is only reported.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
struct Stamp {
    seq: u64,
    at: DateTime<Utc>,
}

struct Stored {
    doc: Value,
    created: Stamp,
    modified: Stamp,
}

struct Collection<Id> {
    rows: HashMap<Id, Stored>,
    seq: u64,
}

impl<Id> Collection<Id> {
    fn stamp(&mut self) -> Stamp {
        self.seq += 1;
        Stamp { at: Utc::now(), seq: self.seq }
    }
}

type Shared<Id> = Arc<RwLock<Collection<Id>>>;

fn read<Id>(shared: &Shared<Id>) -> Result<RwLockReadGuard<'_, Collection<Id>>> {
    shared.read().map_err(|_| Error::Storage("lock poisoned".into()))
}

fn write<Id>(shared: &Shared<Id>) -> Result<RwLockWriteGuard<'_, Collection<Id>>> {
    shared.write().map_err(|_| Error::Storage("lock poisoned".into()))
}

fn to_doc<M: Model>(entity: &M) -> Result<Value> {
    match serde_json::to_value(entity)? {
        doc @ Value::Object(_) => Ok(doc),
        _ => Err(Error::Storage(format!(
            "{} entities must serialize to a JSON object",
            M::COLLECTION
        ))),
    }
}

fn from_doc<M: Model>(doc: &Value) -> Result<M> {
    Ok(M::deserialize(doc)?)
}

/// Writes `value` at a dotted path, creating intermediate objects.
fn set_path(doc: &mut Value, path: &str, value: Value) -> Result<()> {
    let mut parts = path.split('.').peekable();
    let mut node = doc;
    while let Some(part) = parts.next() {
        let Value::Object(map) = node else {
            return Err(Error::Expression(format!("`{path}` does not address an object field")));
        };
        if parts.peek().is_none() {
            map.insert(part.to_owned(), value);
            return Ok(());
        }
        node = map.entry(part.to_owned()).or_insert_with(|| Value::Object(Map::new()));
    }
    Ok(())
}

// ── InMemoryDao ───────────────────────────────────────────────────────────────

/// In-memory DAO backed by a `HashMap` keyed by model id.
///
/// Entities are kept as JSON documents alongside creation and modification
/// stamps. Clone-friendly via `Arc`: clones share the same storage.
pub struct InMemoryDao<M: Model> {
    shared: Shared<M::Id>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for InMemoryDao<M> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared), _model: PhantomData }
    }
}

impl<M: Model> Default for InMemoryDao<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> InMemoryDao<M> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(RwLock::new(Collection { rows: HashMap::new(), seq: 0 })),
            _model: PhantomData,
        }
    }

    /// Creation time of the entity with this id.
    pub fn created_at(&self, id: &M::Id) -> Result<Option<DateTime<Utc>>> {
        Ok(read(&self.shared)?.rows.get(id).map(|s| s.created.at))
    }

    /// Last modification time of the entity with this id.
    pub fn modified_at(&self, id: &M::Id) -> Result<Option<DateTime<Utc>>> {
        Ok(read(&self.shared)?.rows.get(id).map(|s| s.modified.at))
    }

    fn newest_by(&self, key: impl Fn(&Stored) -> Stamp) -> Result<Option<M>> {
        let guard = read(&self.shared)?;
        guard.rows.values().max_by_key(|s| key(s)).map(|s| from_doc(&s.doc)).transpose()
    }
}

impl<M: Model> Dao for InMemoryDao<M> {
    type Id = M::Id;
    type Model = M;
    type Query = MemoryQuery<M>;

    fn find_by_id(&self, id: &M::Id) -> Result<Option<M>> {
        let guard = read(&self.shared)?;
        guard.rows.get(id).map(|s| from_doc(&s.doc)).transpose()
    }

    fn find_latest(&self) -> Result<Option<M>> {
        self.newest_by(|s| s.created)
    }

    fn find_last_modified(&self) -> Result<Option<M>> {
        self.newest_by(|s| s.modified)
    }

    /// Results follow the order of `ids`, first occurrence wins.
    fn find_by_id_list(&self, ids: &[M::Id]) -> Result<Vec<M>> {
        let guard = read(&self.shared)?;
        let mut seen = HashSet::with_capacity(ids.len());
        ids.iter()
            .filter(|id| seen.insert(*id))
            .filter_map(|id| guard.rows.get(id))
            .map(|s| from_doc(&s.doc))
            .collect()
    }

    fn get_id(&self, entity: &M) -> M::Id {
        entity.id()
    }

    fn count(&self) -> Result<u64> {
        Ok(read(&self.shared)?.rows.len() as u64)
    }

    fn save(&self, entity: &M) -> Result<M> {
        let id = entity.id();
        let doc = to_doc(entity)?;

        let mut guard = write(&self.shared)?;
        let stamp = guard.stamp();
        let created = guard.rows.get(&id).map_or(stamp, |s| s.created);
        guard.rows.insert(id.clone(), Stored { doc, created, modified: stamp });

        debug!(collection = M::COLLECTION, id = %id, "saved");
        Ok(entity.clone())
    }

    fn save_fields(&self, entity: &M, fields: &str, values: &[Value]) -> Result<()> {
        let specs = criteria::fields(fields)?;
        if specs.len() != values.len() {
            return Err(Error::Arity { expected: specs.len(), actual: values.len() });
        }
        if let Some((field, op)) = specs.iter().find(|(_, op)| *op != Operator::Eq) {
            return Err(Error::Expression(format!(
                "operator `{op}` on `{field}` is not allowed in an update field list"
            )));
        }

        let id = entity.id();
        let mut guard = write(&self.shared)?;
        let Some(stored) = guard.rows.get(&id) else {
            return Err(Error::NotFound { collection: M::COLLECTION.to_owned(), id: id.to_string() });
        };

        let mut doc = stored.doc.clone();
        for ((field, _), value) in specs.iter().zip(values) {
            set_path(&mut doc, field, value.clone())?;
        }

        // The patched document must still be a valid model for the same id.
        let patched: M = from_doc(&doc)?;
        if patched.id() != id {
            return Err(Error::Expression("a partial update may not change the id".into()));
        }
        let doc = to_doc(&patched)?;
        let unknown = specs
            .iter()
            .zip(values)
            .find(|((field, _), value)| !value.is_null() && criteria::lookup(&doc, field).is_none());
        if let Some(((field, _), _)) = unknown {
            return Err(Error::Expression(format!("`{field}` is not a field of {}", M::COLLECTION)));
        }

        let stamp = guard.stamp();
        if let Some(stored) = guard.rows.get_mut(&id) {
            stored.doc = doc;
            stored.modified = stamp;
        }

        debug!(collection = M::COLLECTION, id = %id, fields, "saved fields");
        Ok(())
    }

    fn delete_query(&self, query: &MemoryQuery<M>) -> Result<u64> {
        let mut guard = write(&self.shared)?;
        let before = guard.rows.len();
        if query.spec.offset == 0 && query.spec.limit.is_none() {
            let matcher = query.spec.matcher()?;
            guard.rows.retain(|_, s| !matcher.matches(&s.doc));
        } else {
            let doomed: Vec<M::Id> = query.spec.window(matching(&guard, &query.spec)?);
            for id in &doomed {
                guard.rows.remove(id);
            }
        }
        let removed = (before - guard.rows.len()) as u64;

        debug!(collection = M::COLLECTION, removed, criteria = %query.spec.root, "deleted by query");
        Ok(removed)
    }

    fn delete_by_id(&self, id: &M::Id) -> Result<bool> {
        let removed = write(&self.shared)?.rows.remove(id).is_some();
        debug!(collection = M::COLLECTION, id = %id, removed, "deleted");
        Ok(removed)
    }

    fn drop_collection(&self) -> Result<()> {
        let mut guard = write(&self.shared)?;
        guard.rows.clear();
        guard.seq = 0;
        debug!(collection = M::COLLECTION, "dropped");
        Ok(())
    }

    fn q(&self) -> MemoryQuery<M> {
        MemoryQuery { shared: Arc::clone(&self.shared), spec: QuerySpec::default(), _model: PhantomData }
    }

    fn destroy(&self) {
        if let Ok(mut guard) = self.shared.write() {
            guard.rows = HashMap::new();
        }
    }
}

/// Matching rows as `(document, id)` in creation order.
fn matching<Id: Clone>(collection: &Collection<Id>, spec: &QuerySpec) -> Result<Vec<(Value, Id)>> {
    let matcher = spec.matcher()?;
    let mut hits: Vec<(&Id, &Stored)> = collection
        .rows
        .iter()
        .filter(|(_, s)| matcher.matches(&s.doc))
        .collect();
    hits.sort_by_key(|(_, s)| s.created);
    Ok(hits.into_iter().map(|(id, s)| (s.doc.clone(), id.clone())).collect())
}

// ── MemoryQuery ───────────────────────────────────────────────────────────────

/// Query bound to an [`InMemoryDao`]'s storage. Executes by scanning.
///
/// Unsorted results come back in creation order.
pub struct MemoryQuery<M: Model> {
    shared: Shared<M::Id>,
    spec: QuerySpec,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for MemoryQuery<M> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared), spec: self.spec.clone(), _model: PhantomData }
    }
}

impl<M: Model> MemoryQuery<M> {
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    fn docs(&self) -> Result<Vec<Value>> {
        let guard = read(&self.shared)?;
        let rows = matching(&guard, &self.spec)?
            .into_iter()
            .map(|(doc, _)| (doc.clone(), doc))
            .collect();
        Ok(self.spec.window(rows))
    }
}

impl<M: Model> Query for MemoryQuery<M> {
    type Model = M;

    fn criteria(&self) -> &CriteriaComponent {
        &self.spec.root
    }

    fn and(mut self, component: CriteriaComponent) -> Self {
        self.spec.push(CriteriaGroupLogic::And, component);
        self
    }

    fn or(mut self, component: CriteriaComponent) -> Self {
        self.spec.push(CriteriaGroupLogic::Or, component);
        self
    }

    fn order_by(mut self, spec: &str) -> Self {
        self.spec.set_order(spec);
        self
    }

    fn offset(mut self, n: usize) -> Self {
        self.spec.offset = n;
        self
    }

    fn limit(mut self, n: usize) -> Self {
        self.spec.limit = Some(n);
        self
    }

    fn fetch(&self) -> Result<Vec<M>> {
        self.docs()?.iter().map(from_doc).collect()
    }

    fn first(&self) -> Result<Option<M>> {
        self.clone().limit(1).docs()?.first().map(from_doc).transpose()
    }

    fn count(&self) -> Result<u64> {
        Ok(self.docs()?.len() as u64)
    }
}
