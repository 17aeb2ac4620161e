//! Persistence layer: the [`Dao`] contract, the criteria model it is defined
//! over, and an in-memory backend.
//!
//! ```rust
//! use actio::db::{Dao, InMemoryDao, Model, Query};
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct User { id: u32, name: String, age: u32 }
//!
//! impl Model for User {
//!     type Id = u32;
//!     const COLLECTION: &'static str = "users";
//!     fn id(&self) -> u32 { self.id }
//! }
//!
//! let dao = InMemoryDao::<User>::new();
//! dao.save(&User { id: 1, name: "alice".into(), age: 30 }).unwrap();
//!
//! let adults = dao.find_by("age >=", &[json!(18)]).unwrap();
//! assert_eq!(adults.len(), 1);
//! assert!(dao.find_by_id(&2).unwrap().is_none());
//! ```

pub mod criteria;
mod dao;
mod memory;
mod query;

use std::fmt;
use std::hash::Hash;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use criteria::{CriteriaComponent, CriteriaGroupLogic, Matcher, Operator};
pub use dao::Dao;
pub use memory::{InMemoryDao, MemoryQuery};
pub use query::{Query, QuerySpec, SortKey};

/// A persisted entity.
///
/// Models serialize to a JSON object; criteria address its fields by name.
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Id: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static;

    /// Collection (table, document collection, key prefix) name.
    const COLLECTION: &'static str;

    fn id(&self) -> Self::Id;
}
