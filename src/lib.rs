//! # actio
//!
//! A small web-application framework in two halves.
//!
//! - **[`db`]**: a storage-agnostic [`Dao`](db::Dao) contract over a
//!   criteria mini-language (`"name, age >"`), with an in-memory backend.
//! - **The action pipeline**: before interceptors, one action, after
//!   interceptors, and a [`Response`] adapter over hyper that can buffer or
//!   stream, run by a [`Server`] with graceful shutdown.
//!
//! Routing, sessions, templating and the concrete database drivers are out of
//! scope. An [`App`] is one action; put a router in front of it or dispatch
//! inside it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use actio::db::{Dao, InMemoryDao, Model};
//! use actio::{ActionResult, App, AppContext, Config, Server};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Note { id: u64, text: String }
//!
//! impl Model for Note {
//!     type Id = u64;
//!     const COLLECTION: &'static str = "notes";
//!     fn id(&self) -> u64 { self.id }
//! }
//!
//! #[tokio::main]
//! async fn main() -> actio::Result<()> {
//!     let notes = InMemoryDao::<Note>::new();
//!     notes.save(&Note { id: 1, text: "hello".into() })?;
//!
//!     let app = App::new(move |ctx: AppContext| {
//!         let notes = notes.clone();
//!         async move {
//!             match ctx.request().query("id").and_then(|v| v.parse::<u64>().ok()) {
//!                 Some(id) => notes.find_by_id(&id).map(|n| n.map(|n| ActionResult::render_json(&n))),
//!                 None => notes.find_all_as_list().map(|all| Some(ActionResult::render_json(&all))),
//!             }
//!         }
//!     });
//!
//!     let config = Config::default().from_env();
//!     Server::with_config(&config).serve(app.with_config(config)).await
//! }
//! ```

mod app;
mod body;
mod config;
mod context;
mod cookie;
mod error;
mod exchange;
mod format;
mod handler;
mod locale;
mod request;
mod response;
mod result;
mod server;

pub mod db;

pub use app::App;
pub use body::Body;
pub use config::{ADDR_ENV, Config};
pub use context::AppContext;
pub use cookie::{Cookie, SameSite};
pub use error::{Error, Result};
pub use exchange::{Exchange, ExchangeState, HeadReceiver};
pub use format::Format;
pub use handler::{AfterInterceptor, BeforeInterceptor, Handler};
pub use http::{Method, StatusCode};
pub use locale::Locale;
pub use request::Request;
pub use response::{HyperResponse, OutputStream, Response, Writer};
pub use result::{ActionResult, IntoResult, ResultBuilder};
pub use server::Server;
