use serde::{Deserialize, Serialize};

use crate::chat::{ChatEvent, ChatLine};

/// Wire tag of a relayed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameType {
    #[serde(rename = "message")]
    Message,
    #[serde(rename = "whisper")]
    Whisper,
    #[serde(rename = "room state message")]
    RoomState,
    #[serde(rename = "clear chat message")]
    ClearChat,
    #[serde(rename = "user notice message")]
    UserNotice,
    #[serde(rename = "notice message")]
    Notice,
    #[serde(rename = "user state message")]
    UserState,
    #[serde(rename = "user join")]
    UserJoin,
    #[serde(rename = "user part")]
    UserPart,
}

/// One JSON message sent to the viewer: `{"type": .., "content": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayFrame {
    #[serde(rename = "type")]
    pub kind: FrameType,
    pub content: String,
}

impl RelayFrame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn said(line: &ChatLine) -> String {
    format!("{}: {}", line.display_name, line.text)
}

impl From<&ChatEvent> for RelayFrame {
    fn from(event: &ChatEvent) -> Self {
        let (kind, content) = match event {
            ChatEvent::Message(line) => (FrameType::Message, said(line)),
            ChatEvent::Whisper(line) => (FrameType::Whisper, said(line)),
            ChatEvent::RoomState(line) => (FrameType::RoomState, said(line)),
            ChatEvent::ClearChat(line) => (FrameType::ClearChat, said(line)),
            ChatEvent::UserNotice(line) => (FrameType::UserNotice, said(line)),
            ChatEvent::Notice(line) => (FrameType::Notice, said(line)),
            ChatEvent::UserState(line) => (FrameType::UserState, said(line)),
            ChatEvent::Join { username } => (FrameType::UserJoin, username.clone()),
            ChatEvent::Part { username } => (FrameType::UserPart, username.clone()),
        };
        Self { kind, content }
    }
}
