//! A tiny bookmark service: one action over an in-memory DAO.
//!
//! ```text
//! cargo run --example crud
//! curl -d '{"id":1,"url":"https://www.rust-lang.org","folder":"rust"}' localhost:3000
//! curl 'localhost:3000/?folder=rust&q=lang'
//! curl -X DELETE 'localhost:3000/?id=1'
//! ```

use actio::db::{Dao, InMemoryDao, Model, Query};
use actio::{ActionResult, App, AppContext, Config, Method, Server, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Bookmark {
    id: u64,
    url: String,
    #[serde(default)]
    folder: String,
}

impl Model for Bookmark {
    type Id = u64;
    const COLLECTION: &'static str = "bookmarks";
    fn id(&self) -> u64 {
        self.id
    }
}

async fn bookmarks(dao: InMemoryDao<Bookmark>, ctx: AppContext) -> actio::Result<ActionResult> {
    let req = ctx.request();
    let id = req.query("id").and_then(|v| v.parse::<u64>().ok());

    match (req.method().clone(), id) {
        (Method::GET, Some(id)) => Ok(dao
            .find_by_id(&id)?
            .map_or_else(ActionResult::not_found, |b| ActionResult::render_json(&b))),
        (Method::GET, None) => {
            let mut query = dao.q().order_by("url");
            if let Some(folder) = req.query("folder") {
                query = query.filter("folder", &[json!(folder)])?;
            }
            if let Some(text) = req.query("q") {
                query = query.filter("url like", &[dao.process_like_value(text)])?;
            }
            Ok(ActionResult::render_json(&query.fetch()?))
        }
        (Method::POST, _) => {
            let saved = dao.save(&req.json::<Bookmark>()?)?;
            info!(id = saved.id, "bookmark saved");
            Ok(ActionResult::builder()
                .status(StatusCode::CREATED)
                .header("location", &format!("/?id={}", saved.id))
                .json(serde_json::to_vec(&saved)?))
        }
        (Method::DELETE, Some(id)) => Ok(if dao.delete_by_id(&id)? {
            ActionResult::status(StatusCode::NO_CONTENT)
        } else {
            ActionResult::not_found()
        }),
        _ => Ok(ActionResult::status(StatusCode::METHOD_NOT_ALLOWED)),
    }
}

async fn log_request(ctx: AppContext) -> Option<ActionResult> {
    info!(method = %ctx.request().method(), uri = %ctx.request().uri(), "request");
    None
}

async fn no_store(_ctx: AppContext, result: ActionResult) -> ActionResult {
    result.with_header("cache-control", "no-store")
}

#[tokio::main]
async fn main() -> actio::Result<()> {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    }
    .from_env();

    let dao = InMemoryDao::<Bookmark>::new();
    let app = App::new(move |ctx: AppContext| bookmarks(dao.clone(), ctx))
        .before(0, log_request)
        .after(0, no_store)
        .with_config(config.clone());

    Server::with_config(&config).serve(app).await
}
