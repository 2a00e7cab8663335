//! Compact conversation encoding
//!
//! The device sends its whole history as one string of role-tagged segments,
//! e.g. `[U]hello[A]hi there[U]how are you`.

#[cfg(test)]
mod proptests;

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Marker that precedes a user turn
pub const USER_MARKER: &str = "[U]";
/// Marker that precedes an assistant turn
pub const ASSISTANT_MARKER: &str = "[A]";

/// Size of the device's outgoing message buffer, minus the C string terminator
#[allow(dead_code)] // Budget for `encode`
pub const DEVICE_BUFFER_BYTES: usize = 4095;

static ROLE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[UA]\]").expect("role marker pattern is valid"));

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn marker(self) -> &'static str {
        match self {
            Role::User => USER_MARKER,
            Role::Assistant => ASSISTANT_MARKER,
        }
    }

    fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            USER_MARKER => Some(Role::User),
            ASSISTANT_MARKER => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One role-tagged message. Serializes to the provider's `{role, content}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[allow(dead_code)] // Used in tests
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Token produced by splitting on role markers
enum Token<'a> {
    Marker(Role),
    Text(&'a str),
}

fn tokenize(encoded: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = encoded;

    while let Some(found) = ROLE_MARKER.find(rest) {
        let (before, tail) = rest.split_at(found.start());
        let (marker, after) = tail.split_at(found.len());
        if !before.is_empty() {
            tokens.push(Token::Text(before));
        }
        if let Some(role) = Role::from_marker(marker) {
            tokens.push(Token::Marker(role));
        }
        rest = after;
    }
    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }

    tokens
}

/// Decode a `[U]`/`[A]` tagged string into turns.
///
/// Never fails. Text before the first marker has no role and is dropped, and a
/// marker with nothing after it produces no turn.
pub fn decode(encoded: &str) -> Vec<Turn> {
    let mut turns = Vec::new();
    let mut pending: Option<Role> = None;

    for token in tokenize(encoded) {
        match token {
            Token::Marker(role) => pending = Some(role),
            Token::Text(text) => {
                if let Some(role) = pending.take() {
                    turns.push(Turn::new(role, text));
                }
            }
        }
    }

    turns
}

/// Encode turns the way the device does, stopping once `budget` bytes are used.
///
/// A turn whose marker no longer fits is dropped; content that overflows is cut
/// at the last character boundary that fits.
#[allow(dead_code)] // Device-side encoder
pub fn encode(turns: &[Turn], budget: usize) -> String {
    let mut encoded = String::new();

    for turn in turns {
        let marker = turn.role.marker();
        if encoded.len() + marker.len() >= budget {
            break;
        }
        encoded.push_str(marker);

        let available = budget - encoded.len();
        if turn.content.len() <= available {
            encoded.push_str(&turn.content);
        } else {
            encoded.push_str(truncate_at_char_boundary(&turn.content, available));
            break;
        }
    }

    encoded
}

/// Longest prefix of `text` that is at most `max_bytes` long
pub(crate) fn truncate_at_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.split_at(end).0
}
