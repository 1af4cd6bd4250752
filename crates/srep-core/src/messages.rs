//! Messages exchanged over the shell WebSocket.
//!
//! Every frame is a JSON object `{"type": ..., "content": ...}`. Resize
//! events carry their dimensions in `content` as `"<rows>,<cols>"`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Ping,
    Pong,
    Input,
    Output,
    /// Content is `"<rows>,<cols>"`.
    Resize,
    /// Server push: a new active play.
    ActivePlay,
    /// Server push: the play was checked, cancelled or otherwise ended.
    PlayFinished,
    /// Any type string this client does not know about.
    #[serde(other)]
    Unknown,
}

/// One frame on the shell socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub content: String,
}

impl TerminalMessage {
    pub fn new(kind: MessageType, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn pong() -> Self {
        Self::new(MessageType::Pong, "")
    }

    pub fn input(content: impl Into<String>) -> Self {
        Self::new(MessageType::Input, content)
    }

    pub fn resize(dims: Dimensions) -> Self {
        Self::new(MessageType::Resize, dims.to_string())
    }
}

/// Terminal size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub rows: u16,
    pub cols: u16,
}

impl Dimensions {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.rows, self.cols)
    }
}
