//! The framework's response model and its hyper-backed implementation.
//!
//! Handlers usually return an [`ActionResult`](crate::ActionResult) and never
//! touch this module. It matters when a handler streams, sets cookies by hand,
//! or an interceptor needs to inspect what has been sent so far.
//!
//! A response is *not started* until the first body byte is written or it is
//! committed. Status, headers, cookies, content type, locale and character
//! encoding only take effect before that point; afterwards they are ignored.

use std::future::Future;

use bytes::Bytes;
use http::header::{CONTENT_LANGUAGE, CONTENT_TYPE, LOCATION, SET_COOKIE};
use http::{HeaderName, HeaderValue, StatusCode};
use tracing::{debug, warn};

use crate::cookie::Cookie;
use crate::error::{Error, Result};
use crate::exchange::{Exchange, ExchangeState};
use crate::format::Format;
use crate::locale::Locale;

// ── Response ──────────────────────────────────────────────────────────────────

/// Operations every response implementation offers to handlers and
/// interceptors.
pub trait Response: Send {
    fn add_cookie(&mut self, cookie: &Cookie) -> &mut Self;

    fn contains_header(&self, name: &str) -> bool;

    /// Sets the charset announced on text content types. Ignored once the
    /// response has started.
    fn character_encoding(&mut self, encoding: &str) -> &mut Self;

    fn character_encoding_value(&self) -> Option<&str>;

    fn content_length(&mut self, len: u64) -> &mut Self;

    fn content_type(&mut self, content_type: &str) -> &mut Self;

    fn content_format(&mut self, format: Format) -> &mut Self {
        self.content_type(format.mime())
    }

    /// Sets `Content-Language`. Ignored once the response has started.
    fn locale(&mut self, locale: &Locale) -> &mut Self;

    fn current_locale(&self) -> Option<&Locale>;

    fn status(&mut self, status: StatusCode) -> &mut Self;

    /// Sets a header, replacing existing values.
    fn header(&mut self, name: &str, value: &str) -> Result<&mut Self>;

    /// Appends a header value.
    fn add_header(&mut self, name: &str, value: &str) -> Result<&mut Self>;

    fn is_started(&self) -> bool;

    fn is_committed(&self) -> bool;

    /// Raw body sink. The first write starts the response.
    fn output_stream(&mut self) -> Result<OutputStream<'_>>;

    /// Text body sink in the configured character encoding.
    fn writer(&mut self) -> Result<Writer<'_>>;

    /// Sends `body` as the rest of the response and commits.
    fn send(&mut self, body: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// Replaces the response with an error status and a plain-text message.
    ///
    /// Headers and cookies set so far are dropped, `Content-Language` excepted,
    /// and `Content-Length` is set to the message length. Fails with
    /// [`Error::ResponseStarted`] if anything was already sent.
    fn send_error(&mut self, status: StatusCode, message: &str) -> impl Future<Output = Result<()>> + Send;

    /// [`send_error`](Response::send_error) with the status' reason phrase as
    /// the message.
    fn send_error_status(&mut self, status: StatusCode) -> impl Future<Output = Result<()>> + Send {
        async move { self.send_error(status, status.canonical_reason().unwrap_or_default()).await }
    }

    /// `302 Found` to `location`, then commits.
    fn send_redirect(&mut self, location: &str) -> impl Future<Output = Result<()>> + Send;

    /// Ends the exchange. Committing twice is a no-op.
    fn commit(&mut self) -> Result<()>;
}

// ── HyperResponse ─────────────────────────────────────────────────────────────

/// [`Response`] over a hyper [`Exchange`].
#[derive(Debug)]
pub struct HyperResponse {
    exchange: Exchange,
    locale: Option<Locale>,
    charset: Option<String>,
    content_type: Option<String>,
}

impl HyperResponse {
    pub fn new(exchange: Exchange) -> Self {
        Self { exchange, locale: None, charset: None, content_type: None }
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    pub fn status_code(&self) -> StatusCode {
        self.exchange.status()
    }

    fn started(&self) -> bool {
        self.exchange.is_response_started()
    }

    /// Rewrites `Content-Type` from the recorded type and charset.
    fn sync_content_type(&mut self) {
        let Some(base) = &self.content_type else { return };
        let value = match &self.charset {
            Some(cs) if wants_charset(base) => format!("{base}; charset={cs}"),
            _ => base.clone(),
        };
        match HeaderValue::try_from(value) {
            Ok(v) => {
                self.exchange.response_headers_mut().insert(CONTENT_TYPE, v);
            }
            Err(_) => warn!(content_type = %base, "ignoring invalid content type"),
        }
    }

    fn set_header(&mut self, name: &str, value: &str, append: bool) -> Result<&mut Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::InvalidHeader(format!("bad header name `{name}`")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::InvalidHeader(format!("bad value for `{name}`")))?;
        if self.started() {
            warn!(header = %name, "response already started, header ignored");
            return Ok(self);
        }
        let headers = self.exchange.response_headers_mut();
        if append {
            headers.append(name, value);
        } else {
            headers.insert(name, value);
        }
        Ok(self)
    }

    fn check_not_started(&self) -> Result<()> {
        match self.exchange.state() {
            ExchangeState::NotStarted => Ok(()),
            ExchangeState::Started => Err(Error::ResponseStarted),
            ExchangeState::Committed => Err(Error::ResponseCommitted),
        }
    }
}

fn wants_charset(content_type: &str) -> bool {
    if content_type.to_ascii_lowercase().contains("charset=") {
        return false;
    }
    Format::from_mime(content_type).map_or_else(
        || content_type.trim_start().to_ascii_lowercase().starts_with("text/"),
        Format::is_text,
    )
}

fn is_utf8(charset: &str) -> bool {
    charset.eq_ignore_ascii_case("utf-8") || charset.eq_ignore_ascii_case("utf8")
}

impl Response for HyperResponse {
    fn add_cookie(&mut self, cookie: &Cookie) -> &mut Self {
        if self.started() {
            warn!(cookie = cookie.name(), "response already started, cookie ignored");
            return self;
        }
        match HeaderValue::try_from(cookie.to_header_value()) {
            Ok(v) => {
                self.exchange.response_headers_mut().append(SET_COOKIE, v);
            }
            Err(_) => warn!(cookie = cookie.name(), "cookie does not form a valid header"),
        }
        self
    }

    fn contains_header(&self, name: &str) -> bool {
        self.exchange.response_headers().contains_key(name)
    }

    fn character_encoding(&mut self, encoding: &str) -> &mut Self {
        if self.started() {
            debug!(encoding, "response already started, character encoding unchanged");
            return self;
        }
        self.charset = Some(encoding.to_owned());
        self.sync_content_type();
        self
    }

    fn character_encoding_value(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    fn content_length(&mut self, len: u64) -> &mut Self {
        if self.started() {
            warn!(len, "response already started, content length ignored");
            return self;
        }
        self.exchange.set_response_content_length(len);
        self
    }

    fn content_type(&mut self, content_type: &str) -> &mut Self {
        if self.started() {
            warn!(content_type, "response already started, content type ignored");
            return self;
        }
        self.content_type = Some(content_type.to_owned());
        self.sync_content_type();
        self
    }

    fn locale(&mut self, locale: &Locale) -> &mut Self {
        if self.started() {
            debug!(%locale, "response already started, locale unchanged");
            return self;
        }
        if let Ok(v) = HeaderValue::try_from(locale.to_string()) {
            self.exchange.response_headers_mut().insert(CONTENT_LANGUAGE, v);
        }
        self.locale = Some(locale.clone());
        self
    }

    fn current_locale(&self) -> Option<&Locale> {
        self.locale.as_ref()
    }

    fn status(&mut self, status: StatusCode) -> &mut Self {
        if self.started() {
            warn!(%status, "response already started, status ignored");
            return self;
        }
        self.exchange.set_status(status);
        self
    }

    fn header(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        self.set_header(name, value, false)
    }

    fn add_header(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        self.set_header(name, value, true)
    }

    fn is_started(&self) -> bool {
        self.started()
    }

    fn is_committed(&self) -> bool {
        self.exchange.state() == ExchangeState::Committed
    }

    fn output_stream(&mut self) -> Result<OutputStream<'_>> {
        if self.is_committed() {
            return Err(Error::ResponseCommitted);
        }
        Ok(OutputStream { exchange: &mut self.exchange })
    }

    fn writer(&mut self) -> Result<Writer<'_>> {
        if let Some(cs) = self.charset.as_deref().filter(|cs| !is_utf8(cs)) {
            return Err(Error::UnsupportedCharset(cs.to_owned()));
        }
        Ok(Writer { out: self.output_stream()? })
    }

    async fn send(&mut self, body: Bytes) -> Result<()> {
        self.exchange.end_with(body).await
    }

    async fn send_error(&mut self, status: StatusCode, message: &str) -> Result<()> {
        self.check_not_started()?;
        let headers = self.exchange.response_headers_mut();
        let language = headers.remove(CONTENT_LANGUAGE);
        headers.clear();
        if let Some(language) = language {
            headers.insert(CONTENT_LANGUAGE, language);
        }
        self.status(status)
            .content_format(Format::Text)
            .content_length(message.len() as u64);
        self.send(Bytes::copy_from_slice(message.as_bytes())).await
    }

    async fn send_redirect(&mut self, location: &str) -> Result<()> {
        self.check_not_started()?;
        let value = HeaderValue::from_str(location)
            .map_err(|_| Error::InvalidHeader(format!("bad redirect location `{location}`")))?;
        self.exchange.response_headers_mut().insert(LOCATION, value);
        self.status(StatusCode::FOUND);
        self.commit()
    }

    fn commit(&mut self) -> Result<()> {
        self.exchange.end()
    }
}

// ── Body sinks ────────────────────────────────────────────────────────────────

/// Raw byte sink over the exchange.
pub struct OutputStream<'a> {
    exchange: &'a mut Exchange,
}

impl OutputStream<'_> {
    pub async fn write(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.exchange.write(data.into()).await
    }

    /// Ends the exchange.
    pub fn close(self) -> Result<()> {
        self.exchange.end()
    }
}

/// UTF-8 text sink over the exchange.
pub struct Writer<'a> {
    out: OutputStream<'a>,
}

impl Writer<'_> {
    pub async fn write_str(&mut self, s: &str) -> Result<()> {
        self.out.write(Bytes::copy_from_slice(s.as_bytes())).await
    }

    pub async fn write_line(&mut self, s: &str) -> Result<()> {
        self.write_str(s).await?;
        self.write_str("\n").await
    }

    pub fn close(self) -> Result<()> {
        self.out.close()
    }
}
