//! Participant profiles and the exact lines the server writes to peers.
//!
//! The protocol is newline-delimited UTF-8. Every broadcast line wraps the
//! speaker's name in its color code and [`RESET`].

use std::fmt;

use crate::color::{Color, RESET};

/// Display name and color of an active session. Fixed for the session's life.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    /// Name the peer sent during the handshake.
    pub name: String,
    /// Color assigned at handshake.
    pub color: Color,
}

impl Profile {
    /// Create a profile.
    pub fn new(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }

    /// The colored name: `<color><name><reset>`.
    pub fn tag(&self) -> String {
        format!("{}{}{RESET}", self.color, self.name)
    }
}

/// One broadcast line.
#[derive(Clone, Copy, Debug)]
pub enum ChatLine<'a> {
    /// `*** <tag> joined the chat ***`
    Joined(&'a Profile),
    /// `*** <tag> left the chat ***`
    Left(&'a Profile),
    /// `<tag>: <text>`
    Said(&'a Profile, &'a str),
}

impl ChatLine<'_> {
    /// Render with the trailing newline, ready for the socket.
    pub fn render(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for ChatLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined(p) => write!(f, "*** {} joined the chat ***", p.tag()),
            Self::Left(p) => write!(f, "*** {} left the chat ***", p.tag()),
            Self::Said(p, text) => write!(f, "{}: {text}", p.tag()),
        }
    }
}

/// Strip one trailing `\n` or `\r\n`.
pub fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
