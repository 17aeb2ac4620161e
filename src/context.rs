//! Per-request application context.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

use crate::config::Config;
use crate::exchange::Exchange;
use crate::locale::Locale;
use crate::request::Request;
use crate::response::{HyperResponse, Response};

/// Everything an action or interceptor can see about the current request.
///
/// Cheap to clone; every clone refers to the same request. Attributes let
/// interceptors hand values to the action (an authenticated user id, a
/// request id, ...). The response sits behind an async mutex so a handler may
/// stream from spawned tasks.
#[derive(Clone, Debug)]
pub struct AppContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    request: Request,
    config: Arc<Config>,
    locale: Locale,
    attributes: Mutex<HashMap<String, String>>,
    response: AsyncMutex<HyperResponse>,
}

impl AppContext {
    /// The response starts out with the configured encoding and the locale
    /// negotiated from `Accept-Language`, or the configured default.
    pub(crate) fn new(request: Request, config: Arc<Config>, exchange: Exchange) -> Self {
        let locale = request.accept_locale().unwrap_or_else(|| config.default_locale.clone());
        let mut response = HyperResponse::new(exchange);
        response.character_encoding(&config.encoding).locale(&locale);
        let inner = Inner {
            request,
            config,
            locale,
            attributes: Mutex::new(HashMap::new()),
            response: AsyncMutex::new(response),
        };
        Self { inner: Arc::new(inner) }
    }

    pub fn request(&self) -> &Request {
        &self.inner.request
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The locale this request is served in.
    pub fn locale(&self) -> &Locale {
        &self.inner.locale
    }

    pub fn attribute(&self, key: &str) -> Option<String> {
        self.attributes().get(key).cloned()
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes().insert(key.into(), value.into());
    }

    pub fn remove_attribute(&self, key: &str) -> Option<String> {
        self.attributes().remove(key)
    }

    /// Exclusive access to the live response.
    pub async fn response(&self) -> tokio::sync::MutexGuard<'_, HyperResponse> {
        self.inner.response.lock().await
    }

    // Attributes are plain strings, a panic mid-insert cannot leave them torn.
    fn attributes(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.inner.attributes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::header::{CONTENT_LANGUAGE, CONTENT_TYPE};

    fn context(accept_language: Option<&str>) -> AppContext {
        let mut builder = http::Request::builder().uri("/");
        if let Some(al) = accept_language {
            builder = builder.header("accept-language", al);
        }
        let request: Request = builder.body(Bytes::new()).unwrap().into();
        let (exchange, _rx) = Exchange::new();
        AppContext::new(request, Arc::new(Config::default()), exchange)
    }

    #[tokio::test]
    async fn locale_comes_from_request_then_config() {
        let ctx = context(Some("de-AT, de;q=0.8"));
        assert_eq!(ctx.locale().to_string(), "de-AT");
        let resp = ctx.response().await;
        assert_eq!(resp.exchange().response_headers()[CONTENT_LANGUAGE], "de-AT");

        let ctx = context(None);
        assert_eq!(ctx.locale(), &Locale::default());
    }

    #[tokio::test]
    async fn configured_encoding_applies_to_text() {
        let ctx = context(None);
        let mut resp = ctx.response().await;
        resp.content_type("text/html");
        assert_eq!(resp.exchange().response_headers()[CONTENT_TYPE], "text/html; charset=utf-8");
    }

    #[test]
    fn attributes_are_shared_between_clones() {
        let ctx = context(None);
        let other = ctx.clone();
        ctx.set_attribute("user", "42");
        assert_eq!(other.attribute("user").as_deref(), Some("42"));
        assert_eq!(other.remove_attribute("user").as_deref(), Some("42"));
        assert_eq!(ctx.attribute("user"), None);
    }
}
