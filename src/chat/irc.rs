//! Chat source speaking Twitch IRC over a WebSocket.

use std::sync::Mutex;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_tungstenite::tungstenite::Message;

use super::{ChatError, ChatEvent, ChatEventSource, ChatLine};
use crate::auth::AccessCredential;

type ChatSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CAPABILITIES: &str = "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership";

pub struct TwitchIrcSource {
    url: String,
    nick: String,
    token: String,
    channels: Mutex<Vec<String>>,
    shutdown: watch::Sender<bool>,
}

impl TwitchIrcSource {
    /// `nick` is the login name of the owner of `credential`.
    pub fn new(url: impl Into<String>, nick: &str, credential: &AccessCredential) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            url: url.into(),
            nick: nick.to_lowercase(),
            token: credential.access_token.clone(),
            channels: Mutex::new(Vec::new()),
            shutdown,
        }
    }

    fn handshake(&self) -> Vec<String> {
        let mut lines = vec![
            CAPABILITIES.to_string(),
            format!("PASS oauth:{}", self.token),
            format!("NICK {}", self.nick),
        ];
        if let Ok(channels) = self.channels.lock() {
            lines.extend(channels.iter().map(|c| format!("JOIN #{c}")));
        }
        lines
    }

    /// Opens the socket and sends the login and join lines.
    async fn connect(&self) -> Result<ChatSocket, ChatError> {
        let (mut ws, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ChatError::Connect(e.to_string()))?;
        for line in self.handshake() {
            ws.send(Message::Text(line.into()))
                .await
                .map_err(|e| ChatError::Connect(e.to_string()))?;
        }
        Ok(ws)
    }
}

impl ChatEventSource for TwitchIrcSource {
    fn join(&self, channel: &str) {
        let channel = channel.trim_start_matches('#').to_lowercase();
        if let Ok(mut channels) = self.channels.lock() {
            if !channels.contains(&channel) {
                channels.push(channel);
            }
        }
    }

    async fn run(&self, events: mpsc::Sender<ChatEvent>) -> Result<(), ChatError> {
        let mut shutdown = self.shutdown.subscribe();

        let ws = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => return Ok(()),
            ws = self.connect() => ws?,
        };
        tracing::debug!(nick = %self.nick, "chat connected");
        let (mut tx, mut rx) = ws.split();

        loop {
            let next = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => None,
                msg = rx.next() => Some(msg),
            };
            let Some(msg) = next else {
                let _ = tx.send(Message::Close(None)).await;
                return Ok(());
            };

            let text = match msg {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | None => return Err(ChatError::Closed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ChatError::Transport(e.to_string())),
            };

            for line in text.as_str().lines() {
                let Some(msg) = IrcMessage::parse(line) else {
                    continue;
                };
                match msg.command {
                    "PING" => {
                        let pong = format!(
                            "PONG :{}",
                            msg.params.first().copied().unwrap_or("tmi.twitch.tv")
                        );
                        tx.send(Message::Text(pong.into()))
                            .await
                            .map_err(|e| ChatError::Transport(e.to_string()))?;
                    }
                    "RECONNECT" => return Err(ChatError::Reconnect),
                    _ => {
                        let Some(event) = msg.into_event() else {
                            continue;
                        };
                        // A full queue must not outlive a disconnect; a
                        // dropped receiver means nobody is listening.
                        let delivered = tokio::select! {
                            biased;
                            _ = wait_for_shutdown(&mut shutdown) => false,
                            sent = events.send(event) => sent.is_ok(),
                        };
                        if !delivered {
                            let _ = tx.send(Message::Close(None)).await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn disconnect(&self) {
        let first = self.shutdown.send_if_modified(|done| !std::mem::replace(done, true));
        if first {
            tracing::debug!(nick = %self.nick, "chat disconnect requested");
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|done| *done).await;
}

/// One parsed IRC line: `[@tags] [:prefix] COMMAND params... [:trailing]`.
#[derive(Debug, PartialEq)]
struct IrcMessage<'a> {
    tags: Vec<(&'a str, &'a str)>,
    prefix: Option<&'a str>,
    command: &'a str,
    params: Vec<&'a str>,
}

impl<'a> IrcMessage<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        let mut tags = Vec::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw, after) = stripped.split_once(' ')?;
            tags = raw
                .split(';')
                .map(|tag| tag.split_once('=').unwrap_or((tag, "")))
                .collect();
            rest = after.trim_start();
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (raw, after) = stripped.split_once(' ')?;
            prefix = Some(raw);
            rest = after.trim_start();
        }

        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, after)) => (command, after),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing);
                break;
            }
            match rest.split_once(' ') {
                Some((param, after)) => {
                    params.push(param);
                    rest = after;
                }
                None => {
                    params.push(rest);
                    break;
                }
            }
        }

        Some(Self {
            tags,
            prefix,
            command,
            params,
        })
    }

    fn tag(&self, key: &str) -> Option<String> {
        self.tags
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| unescape_tag(v))
    }

    /// Nick from a `nick!user@host` prefix; server prefixes have none.
    fn nick(&self) -> Option<&'a str> {
        self.prefix
            .and_then(|p| p.split_once('!'))
            .map(|(nick, _)| nick)
    }

    fn display_name(&self) -> String {
        self.tag("display-name")
            .filter(|name| !name.is_empty())
            .or_else(|| self.nick().map(str::to_string))
            .unwrap_or_default()
    }

    fn text(&self) -> &'a str {
        self.params.get(1).copied().unwrap_or("")
    }

    fn line(&self) -> ChatLine {
        ChatLine::new(self.display_name(), self.text())
    }

    fn into_event(self) -> Option<ChatEvent> {
        let event = match self.command {
            "PRIVMSG" => ChatEvent::Message(self.line()),
            "WHISPER" => ChatEvent::Whisper(self.line()),
            "ROOMSTATE" => ChatEvent::RoomState(self.line()),
            "CLEARCHAT" => ChatEvent::ClearChat(self.line()),
            "USERNOTICE" => {
                let text = match self.text() {
                    "" => self.tag("system-msg").unwrap_or_default(),
                    text => text.to_string(),
                };
                ChatEvent::UserNotice(ChatLine::new(self.display_name(), text))
            }
            "NOTICE" => ChatEvent::Notice(self.line()),
            "USERSTATE" => ChatEvent::UserState(self.line()),
            "JOIN" => ChatEvent::Join {
                username: self.nick()?.to_string(),
            },
            "PART" => ChatEvent::Part {
                username: self.nick()?.to_string(),
            },
            _ => return None,
        };
        Some(event)
    }
}

fn unescape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some(':') => out.push(';'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
