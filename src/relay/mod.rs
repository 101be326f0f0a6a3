pub mod frame;
pub mod sink;

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::chat::{ChatError, ChatEventSource};
use frame::RelayFrame;
use sink::{SinkError, StreamSink};

/// Events buffered between the chat source and the viewer. A full queue
/// makes the source wait rather than drop events.
pub const RELAY_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Joined,
    Streaming,
    Terminated,
}

#[derive(Debug)]
pub enum RelayError {
    Sink(SinkError),
    Source(ChatError),
    /// The source task panicked or was cancelled.
    Aborted(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Sink(e) => write!(f, "relay sink failed: {e}"),
            RelayError::Source(e) => write!(f, "relay source failed: {e}"),
            RelayError::Aborted(e) => write!(f, "relay source aborted: {e}"),
        }
    }
}

impl std::error::Error for RelayError {}

enum Next {
    Event(Option<crate::chat::ChatEvent>),
    ViewerGone,
}

/// Binds one chat source to one viewer for the lifetime of a viewing
/// session. Not reusable: a new viewer needs a new relay.
pub struct EventRelay<S, K> {
    source: Arc<S>,
    sink: K,
    channel: String,
    state: watch::Sender<RelayState>,
}

impl<S, K> EventRelay<S, K>
where
    S: ChatEventSource,
    K: StreamSink,
{
    pub fn new(source: S, sink: K, channel: impl Into<String>) -> Self {
        Self {
            source: Arc::new(source),
            sink,
            channel: channel.into(),
            state: watch::channel(RelayState::Idle).0,
        }
    }

    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    /// Follows the relay through its states; keeps the last one after `run`
    /// has consumed the relay.
    pub fn subscribe_state(&self) -> watch::Receiver<RelayState> {
        self.state.subscribe()
    }

    fn transition(&self, next: RelayState) {
        let prev = self.state.send_replace(next);
        tracing::debug!(channel = %self.channel, from = ?prev, to = ?next, "relay state");
    }

    /// Joins the channel and forwards events until either side ends.
    ///
    /// The source runs on its own task and feeds a single queue; this loop is
    /// the only caller of `send`. A failed send disconnects the source and
    /// discards whatever is still queued. The viewer leaving disconnects the
    /// source; the source ending closes the viewer.
    pub async fn run(mut self) -> Result<(), RelayError> {
        self.source.join(&self.channel);
        self.transition(RelayState::Joined);

        let (tx, mut rx) = mpsc::channel(RELAY_QUEUE_CAPACITY);
        let runner = {
            let source = Arc::clone(&self.source);
            tokio::spawn(async move { source.run(tx).await })
        };
        self.transition(RelayState::Streaming);

        let mut forwarded: u64 = 0;
        let mut sink_error = None;
        loop {
            let next = tokio::select! {
                event = rx.recv() => Next::Event(event),
                _ = self.sink.closed() => Next::ViewerGone,
            };

            let event = match next {
                Next::Event(Some(event)) => event,
                Next::Event(None) => {
                    tracing::debug!(channel = %self.channel, "chat source finished");
                    break;
                }
                Next::ViewerGone => {
                    tracing::debug!(channel = %self.channel, "viewer went away");
                    self.source.disconnect();
                    break;
                }
            };

            if let Err(e) = self.sink.send(RelayFrame::from(&event)).await {
                self.source.disconnect();
                sink_error = Some(e);
                break;
            }
            forwarded += 1;
        }

        drop(rx);
        self.sink.close().await;

        let source_result = runner
            .await
            .map_err(|e| RelayError::Aborted(e.to_string()));
        self.transition(RelayState::Terminated);
        tracing::info!(channel = %self.channel, forwarded, "relay finished");

        if let Some(e) = sink_error {
            return Err(RelayError::Sink(e));
        }
        source_result?.map_err(RelayError::Source)
    }
}
