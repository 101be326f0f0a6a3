pub mod irc;

use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;

/// A line of chat text attributed to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub display_name: String,
    pub text: String,
}

impl ChatLine {
    pub fn new(display_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            text: text.into(),
        }
    }
}

/// Every event a chat source can deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Message(ChatLine),
    Whisper(ChatLine),
    RoomState(ChatLine),
    ClearChat(ChatLine),
    UserNotice(ChatLine),
    Notice(ChatLine),
    UserState(ChatLine),
    Join { username: String },
    Part { username: String },
}

#[derive(Debug)]
pub enum ChatError {
    Connect(String),
    Transport(String),
    /// The server asked us to go away.
    Reconnect,
    Closed,
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Connect(e) => write!(f, "chat connect failed: {e}"),
            ChatError::Transport(e) => write!(f, "chat transport error: {e}"),
            ChatError::Reconnect => write!(f, "chat server requested reconnect"),
            ChatError::Closed => write!(f, "chat connection closed by server"),
        }
    }
}

impl std::error::Error for ChatError {}

/// A connection to a remote chat network.
///
/// Implementations are constructed already bound to an identity and
/// credential. `run` delivers every decoded event into `events` and only
/// returns once the connection is over: `Ok(())` after [`disconnect`], the
/// terminal error otherwise. There is no reconnect; a finished source stays
/// finished.
///
/// [`disconnect`]: ChatEventSource::disconnect
pub trait ChatEventSource: Send + Sync + 'static {
    /// Queue a channel to join. Must be called before `run`.
    fn join(&self, channel: &str);

    fn run(
        &self,
        events: mpsc::Sender<ChatEvent>,
    ) -> impl Future<Output = Result<(), ChatError>> + Send;

    /// Idempotent; callable from any task, including while `run` is active.
    fn disconnect(&self);
}
