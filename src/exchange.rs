//! The per-request exchange with hyper.
//!
//! hyper wants a complete `http::Response` up front, while the framework
//! lets a handler set headers, then write the body piece by piece. The
//! exchange bridges the two: it collects status and headers until the first
//! byte is written (or the exchange ends), then hands hyper the response head
//! through a oneshot channel. Later writes flow through the body channel.
//!
//! ```text
//! NotStarted ──write──► Started ──end──► Committed
//!     └──────────────end/end_with─────────┘
//! ```

use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, HeaderValue, StatusCode};
use tokio::sync::{mpsc, oneshot};

use crate::body::Body;
use crate::error::{Error, Result};

/// Chunks buffered between a writing handler and the connection.
const STREAM_BUFFER: usize = 16;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExchangeState {
    NotStarted,
    Started,
    Committed,
}

/// Receives the response head once the exchange starts.
pub type HeadReceiver = oneshot::Receiver<http::Response<Body>>;

#[derive(Debug)]
pub struct Exchange {
    status: StatusCode,
    headers: HeaderMap,
    state: ExchangeState,
    head_tx: Option<oneshot::Sender<http::Response<Body>>>,
    body_tx: Option<mpsc::Sender<Bytes>>,
}

impl Exchange {
    pub fn new() -> (Self, HeadReceiver) {
        let (head_tx, head_rx) = oneshot::channel();
        let exchange = Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            state: ExchangeState::NotStarted,
            head_tx: Some(head_tx),
            body_tx: None,
        };
        (exchange, head_rx)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_response_content_length(&mut self, len: u64) {
        self.headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn is_response_started(&self) -> bool {
        self.state != ExchangeState::NotStarted
    }

    fn send_head(&mut self, body: Body) -> Result<()> {
        let mut head = http::Response::new(body);
        *head.status_mut() = self.status;
        *head.headers_mut() = self.headers.clone();
        let tx = self.head_tx.take().ok_or(Error::ExchangeClosed)?;
        tx.send(head).map_err(|_| Error::ExchangeClosed)
    }

    /// Writes a body chunk, starting the response on first use.
    pub async fn write(&mut self, chunk: Bytes) -> Result<()> {
        match self.state {
            ExchangeState::Committed => return Err(Error::ResponseCommitted),
            ExchangeState::NotStarted => {
                let (tx, body) = Body::channel(STREAM_BUFFER);
                self.state = ExchangeState::Started;
                self.body_tx = Some(tx);
                self.send_head(body)?;
            }
            ExchangeState::Started => {}
        }
        if chunk.is_empty() {
            return Ok(());
        }
        let tx = self.body_tx.as_ref().ok_or(Error::ExchangeClosed)?;
        tx.send(chunk).await.map_err(|_| Error::ExchangeClosed)
    }

    /// Sends `body` as the whole remaining response and ends the exchange.
    pub async fn end_with(&mut self, body: Bytes) -> Result<()> {
        match self.state {
            ExchangeState::Committed => Err(Error::ResponseCommitted),
            ExchangeState::NotStarted => {
                self.state = ExchangeState::Committed;
                self.send_head(Body::full(body))
            }
            ExchangeState::Started => {
                self.write(body).await?;
                self.end()
            }
        }
    }

    /// Ends the exchange. An exchange that never started goes out with an
    /// empty body. Ending twice is a no-op.
    pub fn end(&mut self) -> Result<()> {
        match self.state {
            ExchangeState::Committed => Ok(()),
            ExchangeState::NotStarted => {
                self.state = ExchangeState::Committed;
                self.send_head(Body::empty())
            }
            ExchangeState::Started => {
                self.state = ExchangeState::Committed;
                self.body_tx = None;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn head_is_sent_on_first_write() {
        let (mut ex, mut rx) = Exchange::new();
        ex.set_status(StatusCode::ACCEPTED);
        assert!(rx.try_recv().is_err());

        let writer = tokio::spawn(async move {
            ex.write(Bytes::from_static(b"one ")).await.unwrap();
            assert_eq!(ex.state(), ExchangeState::Started);
            ex.write(Bytes::from_static(b"two")).await.unwrap();
            ex.end().unwrap();
            ex
        });

        let resp = rx.await.unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(resp.into_body().collect().await.unwrap().to_bytes(), "one two");

        let mut ex = writer.await.unwrap();
        assert!(matches!(ex.write(Bytes::from_static(b"x")).await, Err(Error::ResponseCommitted)));
        assert!(ex.end().is_ok());
    }

    #[tokio::test]
    async fn end_without_writes_sends_empty_body() {
        let (mut ex, rx) = Exchange::new();
        ex.set_status(StatusCode::NO_CONTENT);
        ex.end().unwrap();
        let resp = rx.await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(resp.into_body().collect().await.unwrap().to_bytes().is_empty());
    }

    #[tokio::test]
    async fn end_with_buffers_the_whole_body() {
        let (mut ex, rx) = Exchange::new();
        ex.set_response_content_length(5);
        ex.end_with(Bytes::from_static(b"hello")).await.unwrap();
        let resp = rx.await.unwrap();
        assert_eq!(resp.headers()[CONTENT_LENGTH], "5");
        assert_eq!(resp.into_body().collect().await.unwrap().to_bytes(), "hello");
    }

    #[tokio::test]
    async fn dropped_receiver_closes_the_exchange() {
        let (mut ex, rx) = Exchange::new();
        drop(rx);
        assert!(matches!(ex.write(Bytes::from_static(b"x")).await, Err(Error::ExchangeClosed)));
    }
}
