//! The action pipeline.
//!
//! ```text
//! request ─► before interceptors ─► action ─► after interceptors ─► response
//!                 │ Some(result)                    ▲
//!                 └─────────────────────────────────┘
//! ```

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::BodyExt;
use tracing::{debug, error};

use crate::body::Body;
use crate::config::Config;
use crate::context::AppContext;
use crate::exchange::Exchange;
use crate::handler::{
    AfterInterceptor, BeforeInterceptor, BoxedAfter, BoxedBefore, BoxedHandler, Handler,
};
use crate::request::Request;
use crate::response::Response;
use crate::result::ActionResult;

/// An application: one action wrapped in prioritized interceptors.
///
/// Interceptors run in ascending priority; equal priorities keep the order
/// they were registered in.
///
/// ```rust
/// use actio::{ActionResult, App, AppContext};
///
/// async fn hello(ctx: AppContext) -> String {
///     format!("hello from {}", ctx.request().path())
/// }
///
/// async fn require_token(ctx: AppContext) -> Option<ActionResult> {
///     match ctx.request().header("x-token") {
///         Some(_) => None,
///         None => Some(ActionResult::status(actio::StatusCode::UNAUTHORIZED)),
///     }
/// }
///
/// async fn tag(_ctx: AppContext, result: ActionResult) -> ActionResult {
///     result.with_header("x-served-by", "actio")
/// }
///
/// let app = App::new(hello).before(0, require_token).after(0, tag);
/// ```
pub struct App {
    handler: BoxedHandler,
    before: Vec<(i32, BoxedBefore)>,
    after: Vec<(i32, BoxedAfter)>,
    config: Arc<Config>,
}

impl App {
    pub fn new(handler: impl Handler) -> Self {
        Self {
            handler: handler.into_boxed_handler(),
            before: Vec::new(),
            after: Vec::new(),
            config: Arc::new(Config::default()),
        }
    }

    /// Registers a before interceptor. Lower priorities run first.
    pub fn before(mut self, priority: i32, interceptor: impl BeforeInterceptor) -> Self {
        self.before.push((priority, interceptor.into_boxed_before()));
        self.before.sort_by_key(|(p, _)| *p);
        self
    }

    /// Registers an after interceptor. Lower priorities run first.
    pub fn after(mut self, priority: i32, interceptor: impl AfterInterceptor) -> Self {
        self.after.push((priority, interceptor.into_boxed_after()));
        self.after.sort_by_key(|(p, _)| *p);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn handle(&self, ctx: AppContext) -> ActionResult {
        let mut short_circuit = None;
        for (priority, before) in &self.before {
            if let Some(result) = before.call(ctx.clone()).await {
                debug!(priority, status = %result.status_code(), "before interceptor answered");
                short_circuit = Some(result);
                break;
            }
        }
        let mut result = match short_circuit {
            Some(result) => result,
            None => self.handler.call(ctx.clone()).await,
        };
        for (_, after) in &self.after {
            result = after.call(ctx.clone(), result).await;
        }
        result
    }

    /// Applies the pipeline's result. If that fails before anything is sent,
    /// a bare 500 replaces the headers and cookies the result had set.
    async fn respond(&self, ctx: AppContext) {
        let result = self.handle(ctx.clone()).await;
        let mut resp = ctx.response().await;
        if let Err(e) = result.apply(&mut *resp).await {
            error!("failed to write response: {e}");
            let fallback = if resp.is_started() {
                resp.commit()
            } else {
                resp.send_error_status(StatusCode::INTERNAL_SERVER_ERROR).await
            };
            if let Err(e) = fallback {
                debug!("response abandoned: {e}");
            }
        }
    }

    /// Runs one request through the pipeline.
    ///
    /// Resolves as soon as the response head is ready; a streaming action
    /// keeps writing the body after this returns. Failures are answered with
    /// `400` (unreadable request body) or `500` (the action panicked or
    /// dropped the response), never surfaced to the caller.
    pub async fn dispatch<B>(self: Arc<Self>, req: http::Request<B>) -> http::Response<Body>
    where
        B: http_body::Body<Data = Bytes> + Send,
        B::Error: Display,
    {
        let (parts, body) = req.into_parts();
        debug!(method = %parts.method, path = parts.uri.path(), "dispatching");

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!("failed to read request body: {e}");
                return bare(StatusCode::BAD_REQUEST);
            }
        };

        let (exchange, head) = Exchange::new();
        let ctx = AppContext::new(Request::new(parts, body), Arc::clone(&self.config), exchange);
        let task = tokio::spawn(async move { self.respond(ctx).await });

        match head.await {
            Ok(resp) => resp,
            Err(_) => {
                if let Err(e) = task.await {
                    error!("action failed: {e}");
                }
                bare(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

fn bare(status: StatusCode) -> http::Response<Body> {
    let mut resp = http::Response::new(Body::empty());
    *resp.status_mut() = status;
    resp
}
