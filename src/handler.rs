//! Action and interceptor traits, and their type erasure.
//!
//! # How async handlers are stored
//!
//! An [`App`](crate::App) holds one action and any number of interceptors,
//! each a different closure or `async fn` type. They are hidden behind trait
//! objects so the pipeline can keep them in plain `Vec`s:
//!
//! ```text
//! async fn show(ctx: AppContext) -> ActionResult { … }   ← user writes this
//!        ↓ App::new(show)
//! show.into_boxed_handler()                             ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(show))                             ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(ctx)  at request time                    ← one vtable dispatch
//!        ↓
//! Box::pin(async { show(ctx).await.into_result() })     ← BoxFuture
//! ```
//!
//! Interceptors go through the same steps with their own signatures.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::AppContext;
use crate::result::{ActionResult, IntoResult};

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Send + 'static` let the pipeline run on any tokio worker.
pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: AppContext) -> BoxFuture<ActionResult>;
}

#[doc(hidden)]
pub trait ErasedBefore {
    fn call(&self, ctx: AppContext) -> BoxFuture<Option<ActionResult>>;
}

#[doc(hidden)]
pub trait ErasedAfter {
    fn call(&self, ctx: AppContext, result: ActionResult) -> BoxFuture<ActionResult>;
}

#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;
#[doc(hidden)]
pub type BoxedBefore = Arc<dyn ErasedBefore + Send + Sync + 'static>;
#[doc(hidden)]
pub type BoxedAfter = Arc<dyn ErasedAfter + Send + Sync + 'static>;

// ── Public traits ─────────────────────────────────────────────────────────────

/// Implemented for every valid action.
///
/// You never implement this yourself. It is satisfied by any `async fn` (or
/// closure returning a future) of the shape:
///
/// ```text
/// async fn name(ctx: AppContext) -> impl IntoResult
/// ```
///
/// Like the interceptor traits below it is **sealed**: only the blanket impl
/// can satisfy it.
pub trait Handler: private::SealedHandler + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// Runs before the action.
///
/// ```text
/// async fn name(ctx: AppContext) -> Option<ActionResult>
/// ```
///
/// Returning `Some(result)` skips the action and every later before
/// interceptor; after interceptors still run on that result.
pub trait BeforeInterceptor: private::SealedBefore + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_before(self) -> BoxedBefore;
}

/// Runs after the action and may replace its result.
///
/// ```text
/// async fn name(ctx: AppContext, result: ActionResult) -> ActionResult
/// ```
pub trait AfterInterceptor: private::SealedAfter + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_after(self) -> BoxedAfter;
}

mod private {
    pub trait SealedHandler {}
    pub trait SealedBefore {}
    pub trait SealedAfter {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::SealedHandler for F
where
    F: Fn(AppContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResult + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(AppContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResult + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

impl<F, Fut> private::SealedBefore for F
where
    F: Fn(AppContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<ActionResult>> + Send + 'static,
{
}

impl<F, Fut> BeforeInterceptor for F
where
    F: Fn(AppContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<ActionResult>> + Send + 'static,
{
    fn into_boxed_before(self) -> BoxedBefore {
        Arc::new(FnBefore(self))
    }
}

impl<F, Fut> private::SealedAfter for F
where
    F: Fn(AppContext, ActionResult) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionResult> + Send + 'static,
{
}

impl<F, Fut> AfterInterceptor for F
where
    F: Fn(AppContext, ActionResult) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionResult> + Send + 'static,
{
    fn into_boxed_after(self) -> BoxedAfter {
        Arc::new(FnAfter(self))
    }
}

// ── Concrete wrappers ─────────────────────────────────────────────────────────

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(AppContext) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResult + Send + 'static,
{
    fn call(&self, ctx: AppContext) -> BoxFuture<ActionResult> {
        let fut = (self.0)(ctx);
        Box::pin(async move { fut.await.into_result() })
    }
}

struct FnBefore<F>(F);

impl<F, Fut> ErasedBefore for FnBefore<F>
where
    F: Fn(AppContext) -> Fut + Send + Sync,
    Fut: Future<Output = Option<ActionResult>> + Send + 'static,
{
    fn call(&self, ctx: AppContext) -> BoxFuture<Option<ActionResult>> {
        Box::pin((self.0)(ctx))
    }
}

struct FnAfter<F>(F);

impl<F, Fut> ErasedAfter for FnAfter<F>
where
    F: Fn(AppContext, ActionResult) -> Fut + Send + Sync,
    Fut: Future<Output = ActionResult> + Send + 'static,
{
    fn call(&self, ctx: AppContext, result: ActionResult) -> BoxFuture<ActionResult> {
        Box::pin((self.0)(ctx, result))
    }
}
