//! The Data Access Object contract.

use serde_json::Value;

use crate::db::criteria::{self, CriteriaComponent};
use crate::db::query::Query;
use crate::error::Result;

/// Uniform CRUD and query surface over one model type, independent of the
/// storage engine behind it.
///
/// Backends implement the required methods; everything expressed in terms of
/// queries has a default implementation.
///
/// Criteria expressions (`find_by`, `count_by`, `delete_by`, `q_by`, ...) name
/// fields separated by `,`, whitespace, `;` or `:` and take one positional
/// value per field. A mismatch fails with
/// [`Error::Arity`](crate::Error::Arity) before storage is touched. See
/// [`criteria`](crate::db::criteria) for the operator syntax.
pub trait Dao: Send + Sync {
    type Id;
    type Model;
    type Query: Query<Model = Self::Model>;

    /// Name of the identifier type.
    fn id_type(&self) -> &'static str {
        std::any::type_name::<Self::Id>()
    }

    /// Name of the model type this DAO operates on.
    fn model_type(&self) -> &'static str {
        std::any::type_name::<Self::Model>()
    }

    /// Name of the bound query type.
    fn query_type(&self) -> &'static str {
        std::any::type_name::<Self::Query>()
    }

    // ── Lookups ───────────────────────────────────────────────────────────────

    /// `Ok(None)` when no entity has this id.
    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Model>>;

    /// The most recently created entity.
    fn find_latest(&self) -> Result<Option<Self::Model>>;

    /// The most recently modified entity.
    fn find_last_modified(&self) -> Result<Option<Self::Model>>;

    fn find_by(&self, expression: &str, values: &[Value]) -> Result<Vec<Self::Model>> {
        self.q_by(expression, values)?.fetch()
    }

    fn find_one_by(&self, expression: &str, values: &[Value]) -> Result<Option<Self::Model>> {
        self.q_by(expression, values)?.first()
    }

    /// Entities for the ids that exist. Unknown ids are skipped, duplicates
    /// collapse, and the order is up to the backend.
    fn find_by_id_list(&self, ids: &[Self::Id]) -> Result<Vec<Self::Model>>;

    fn find_all(&self) -> Result<impl Iterator<Item = Self::Model>> {
        Ok(self.find_all_as_list()?.into_iter())
    }

    fn find_all_as_list(&self) -> Result<Vec<Self::Model>> {
        self.q().fetch()
    }

    /// Fresh copy of `entity` from storage, located by its id.
    fn reload(&self, entity: &Self::Model) -> Result<Option<Self::Model>> {
        self.find_by_id(&self.get_id(entity))
    }

    fn get_id(&self, entity: &Self::Model) -> Self::Id;

    fn count(&self) -> Result<u64>;

    fn count_by(&self, fields: &str, values: &[Value]) -> Result<u64> {
        self.q_by(fields, values)?.count()
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Inserts `entity`, or replaces every field of the stored one.
    fn save(&self, entity: &Self::Model) -> Result<Self::Model>;

    /// Updates only the named fields of the stored entity with the same id.
    ///
    /// The other field values carried by `entity` play no part; the id is all
    /// that is read from it.
    fn save_fields(&self, entity: &Self::Model, fields: &str, values: &[Value]) -> Result<()>;

    fn save_all(&self, entities: impl IntoIterator<Item = Self::Model>) -> Result<Vec<Self::Model>> {
        entities.into_iter().map(|e| self.save(&e)).collect()
    }

    fn delete(&self, entity: &Self::Model) -> Result<bool> {
        self.delete_by_id(&self.get_id(entity))
    }

    /// Removes every entity matched by `query`. Returns how many went.
    fn delete_query(&self, query: &Self::Query) -> Result<u64>;

    fn delete_by_id(&self, id: &Self::Id) -> Result<bool>;

    fn delete_by(&self, fields: &str, values: &[Value]) -> Result<u64> {
        let query = self.q_by(fields, values)?;
        self.delete_query(&query)
    }

    fn delete_all(&self) -> Result<u64> {
        self.delete_query(&self.q())
    }

    /// Removes all entities along with any indexes or sequence state.
    fn drop_collection(&self) -> Result<()>;

    // ── Query factories ───────────────────────────────────────────────────────

    fn q(&self) -> Self::Query;

    fn create_query(&self) -> Self::Query {
        self.q()
    }

    /// Query pre-seeded with `criteria`, combined with AND.
    fn q_where(&self, criteria: impl IntoIterator<Item = CriteriaComponent>) -> Self::Query {
        criteria.into_iter().fold(self.q(), |q, c| q.and(c))
    }

    fn create_query_where(&self, criteria: impl IntoIterator<Item = CriteriaComponent>) -> Self::Query {
        self.q_where(criteria)
    }

    /// Query from a criteria expression, fields combined with AND.
    fn q_by(&self, expression: &str, values: &[Value]) -> Result<Self::Query> {
        self.q().filter(expression, values)
    }

    fn create_query_by(&self, expression: &str, values: &[Value]) -> Result<Self::Query> {
        self.q_by(expression, values)
    }

    /// Query pre-seeded with `criteria`, combined with OR.
    fn or_where(&self, criteria: impl IntoIterator<Item = CriteriaComponent>) -> Self::Query {
        criteria.into_iter().fold(self.q(), |q, c| q.or(c))
    }

    fn create_or_query_where(&self, criteria: impl IntoIterator<Item = CriteriaComponent>) -> Self::Query {
        self.or_where(criteria)
    }

    /// Query from a criteria expression, fields combined with OR.
    fn or_by(&self, expression: &str, values: &[Value]) -> Result<Self::Query> {
        Ok(self.or_where(criteria::parse(expression, values)?))
    }

    fn create_or_query_by(&self, expression: &str, values: &[Value]) -> Result<Self::Query> {
        self.or_by(expression, values)
    }

    /// Turns a raw search string into the value this backend matches with
    /// [`Operator::Like`](crate::db::Operator::Like).
    ///
    /// The default suits SQL-style backends: `v` is wrapped in `%` unless it
    /// already carries a wildcard.
    fn process_like_value(&self, v: &str) -> Value {
        if v.contains('%') {
            Value::String(v.to_owned())
        } else {
            Value::String(format!("%{v}%"))
        }
    }

    /// Releases backend resources. The DAO must not be used afterwards.
    fn destroy(&self) {}
}
