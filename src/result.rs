//! Action results and the [`IntoResult`] conversion trait.
//!
//! Handlers describe what to send back; the pipeline applies the result to
//! the live [`Response`] once every after-interceptor has had its say.

use bytes::Bytes;
use http::StatusCode;
use serde::Serialize;
use tracing::error;

use crate::cookie::Cookie;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::response::Response;

// ── ActionResult ──────────────────────────────────────────────────────────────

/// What an action produced.
///
/// # Shortcuts (200 OK, no custom headers needed)
///
/// ```rust
/// use actio::{ActionResult, StatusCode};
///
/// ActionResult::json(br#"{"id":1}"#.to_vec());
/// ActionResult::text("hello");
/// ActionResult::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder (custom status, headers or cookies)
///
/// ```rust
/// use actio::{ActionResult, Format, StatusCode};
///
/// ActionResult::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
///
/// ActionResult::builder().bytes(Format::Xml, b"<ok/>".to_vec());
/// ```
#[derive(Clone, Debug)]
pub struct ActionResult {
    status: StatusCode,
    headers: Vec<(String, String)>,
    cookies: Vec<Cookie>,
    content_type: Option<String>,
    body: Bytes,
    handled: bool,
}

impl ActionResult {
    /// `200 OK` with no body.
    pub fn ok() -> Self {
        Self::status(StatusCode::OK)
    }

    /// `200 OK`, `application/json`. Pass bytes straight from the serializer.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// Serializes `value` as the JSON body. A serializer failure becomes a
    /// `500`.
    pub fn render_json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => Self::json(bytes),
            Err(e) => {
                error!("failed to render json: {e}");
                Self::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    /// `200 OK`, `text/plain`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// `200 OK`, `text/html`.
    pub fn html(body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::builder().bytes(Format::Html, body)
    }

    /// Result with no body.
    pub fn status(code: StatusCode) -> Self {
        Self {
            status: code,
            headers: Vec::new(),
            cookies: Vec::new(),
            content_type: None,
            body: Bytes::new(),
            handled: false,
        }
    }

    /// `302 Found` to `location`.
    pub fn redirect(location: &str) -> Self {
        Self::builder().status(StatusCode::FOUND).header("location", location).no_body()
    }

    pub fn not_found() -> Self {
        Self::status(StatusCode::NOT_FOUND)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::builder().status(StatusCode::BAD_REQUEST).text(message)
    }

    /// The action already wrote its response through the context; nothing
    /// else is sent.
    pub fn handled() -> Self {
        Self { handled: true, ..Self::ok() }
    }

    pub fn builder() -> ResultBuilder {
        ResultBuilder { status: StatusCode::OK, headers: Vec::new(), cookies: Vec::new() }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_handled(&self) -> bool {
        self.handled
    }

    /// Adds a header to an existing result, e.g. from an after-interceptor.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Writes the result to `resp` and commits it.
    ///
    /// A handled result only commits. If the response has already started,
    /// the body is appended to what was written and status and headers are
    /// dropped by the response.
    pub async fn apply<R: Response>(self, resp: &mut R) -> Result<()> {
        if self.handled {
            return resp.commit();
        }
        resp.status(self.status);
        for cookie in &self.cookies {
            resp.add_cookie(cookie);
        }
        for (name, value) in &self.headers {
            resp.add_header(name, value)?;
        }
        if let Some(ct) = &self.content_type {
            resp.content_type(ct);
        }
        if resp.is_committed() {
            return Ok(());
        }
        if !resp.is_started() {
            resp.content_length(self.body.len() as u64);
        }
        resp.send(self.body).await
    }
}

// ── ResultBuilder ─────────────────────────────────────────────────────────────

/// Fluent builder for [`ActionResult`].
///
/// Obtain via [`ActionResult::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
#[derive(Debug)]
pub struct ResultBuilder {
    status: StatusCode,
    headers: Vec<(String, String)>,
    cookies: Vec<Cookie>,
}

impl ResultBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn json(self, body: impl Into<Bytes>) -> ActionResult {
        self.finish(Some(Format::Json.mime()), body.into())
    }

    pub fn text(self, body: impl Into<String>) -> ActionResult {
        self.finish(Some(Format::Text.mime()), Bytes::from(body.into()))
    }

    /// Terminate with a typed body. Use this for XML, HTML, binary, SSE, etc.
    pub fn bytes(self, format: Format, body: impl Into<Bytes>) -> ActionResult {
        self.finish(Some(format.mime()), body.into())
    }

    /// Terminate with no body (e.g. `204 No Content`, redirects).
    pub fn no_body(self) -> ActionResult {
        self.finish(None, Bytes::new())
    }

    fn finish(self, content_type: Option<&str>, body: Bytes) -> ActionResult {
        ActionResult {
            status: self.status,
            headers: self.headers,
            cookies: self.cookies,
            content_type: content_type.map(str::to_owned),
            body,
            handled: false,
        }
    }
}

// ── IntoResult ────────────────────────────────────────────────────────────────

/// Conversion into an [`ActionResult`].
///
/// Implement on your own types to return them directly from actions.
///
/// ```rust
/// use actio::{ActionResult, IntoResult};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Json<T: Serialize>(T);
///
/// impl<T: Serialize> IntoResult for Json<T> {
///     fn into_result(self) -> ActionResult {
///         ActionResult::render_json(&self.0)
///     }
/// }
/// ```
pub trait IntoResult {
    fn into_result(self) -> ActionResult;
}

impl IntoResult for ActionResult {
    fn into_result(self) -> ActionResult { self }
}

impl IntoResult for &'static str {
    fn into_result(self) -> ActionResult { ActionResult::text(self) }
}

impl IntoResult for String {
    fn into_result(self) -> ActionResult { ActionResult::text(self) }
}

/// Return a status directly: `return StatusCode::NOT_FOUND`.
impl IntoResult for StatusCode {
    fn into_result(self) -> ActionResult { ActionResult::status(self) }
}

impl IntoResult for () {
    fn into_result(self) -> ActionResult { ActionResult::ok() }
}

/// `None` is a `404`.
impl<T: IntoResult> IntoResult for Option<T> {
    fn into_result(self) -> ActionResult {
        self.map_or_else(ActionResult::not_found, IntoResult::into_result)
    }
}

impl<T: IntoResult, E: IntoResult> IntoResult for std::result::Result<T, E> {
    fn into_result(self) -> ActionResult {
        match self {
            Ok(v) => v.into_result(),
            Err(e) => e.into_result(),
        }
    }
}

impl IntoResult for Error {
    fn into_result(self) -> ActionResult {
        match self {
            Error::NotFound { .. } => ActionResult::not_found(),
            Error::Arity { .. } | Error::Expression(_) | Error::Serde(_) => {
                ActionResult::bad_request(self.to_string())
            }
            e => {
                error!("action failed: {e}");
                ActionResult::status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
