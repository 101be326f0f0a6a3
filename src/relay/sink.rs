use std::fmt;
use std::future::Future;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::frame::RelayFrame;

#[derive(Debug)]
pub enum SinkError {
    Serialize(serde_json::Error),
    Transport(String),
    Closed,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Serialize(e) => write!(f, "frame serialization failed: {e}"),
            SinkError::Transport(e) => write!(f, "write to viewer failed: {e}"),
            SinkError::Closed => write!(f, "viewer connection closed"),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError::Serialize(e)
    }
}

/// Outbound connection to one viewer.
///
/// `send` takes `&mut self`, so whoever owns the sink is its only writer.
pub trait StreamSink: Send + 'static {
    /// Any error is terminal for the connection.
    fn send(&mut self, frame: RelayFrame) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Resolves once the viewer has gone away. Cancel safe.
    fn closed(&self) -> impl Future<Output = ()> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// [`StreamSink`] over an upgraded axum WebSocket, one text message per frame.
pub struct WebSocketSink {
    tx: SplitSink<WebSocket, Message>,
    gone: watch::Receiver<bool>,
    reader: JoinHandle<()>,
}

impl WebSocketSink {
    pub fn new(socket: WebSocket) -> Self {
        let (tx, mut rx) = socket.split();
        let (gone_tx, gone) = watch::channel(false);

        // Viewers send nothing we act on; the read half only tells us when
        // they leave.
        let reader = tokio::spawn(async move {
            while let Some(Ok(msg)) = rx.next().await {
                if matches!(msg, Message::Close(_)) {
                    break;
                }
            }
            let _ = gone_tx.send(true);
        });

        Self { tx, gone, reader }
    }
}

impl StreamSink for WebSocketSink {
    async fn send(&mut self, frame: RelayFrame) -> Result<(), SinkError> {
        let text = frame.to_json()?;
        self.tx
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }

    fn closed(&self) -> impl Future<Output = ()> + Send {
        let mut gone = self.gone.clone();
        async move {
            let _ = gone.wait_for(|gone| *gone).await;
        }
    }

    async fn close(&mut self) {
        if let Err(e) = SinkExt::close(&mut self.tx).await {
            tracing::debug!("closing viewer socket: {e}");
        }
    }
}

impl Drop for WebSocketSink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
