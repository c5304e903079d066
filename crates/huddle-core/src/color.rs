//! ANSI color palette and the per-session color allocator.

use std::fmt;

use rand::Rng;

/// SGR reset sequence written after every colored name.
pub const RESET: &str = "\x1b[0m";

/// A foreground color from the fixed palette.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    code: &'static str,
    name: &'static str,
}

impl Color {
    const fn new(code: &'static str, name: &'static str) -> Self {
        Self { code, name }
    }

    /// The raw escape sequence.
    pub fn code(self) -> &'static str {
        self.code
    }

    /// Human-readable name, used in logs.
    pub fn name(self) -> &'static str {
        self.name
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

/// The twelve colors sessions are drawn from.
pub const PALETTE: [Color; 12] = [
    Color::new("\x1b[31m", "red"),
    Color::new("\x1b[32m", "green"),
    Color::new("\x1b[33m", "yellow"),
    Color::new("\x1b[34m", "blue"),
    Color::new("\x1b[35m", "magenta"),
    Color::new("\x1b[36m", "cyan"),
    Color::new("\x1b[91m", "bright_red"),
    Color::new("\x1b[92m", "bright_green"),
    Color::new("\x1b[93m", "bright_yellow"),
    Color::new("\x1b[94m", "bright_blue"),
    Color::new("\x1b[95m", "bright_magenta"),
    Color::new("\x1b[96m", "bright_cyan"),
];

/// Pick a palette entry uniformly at random using the thread RNG.
///
/// Independent per call; two sessions may well get the same color.
pub fn pick_color() -> Color {
    pick_color_with(&mut rand::rng())
}

/// Pick a palette entry uniformly at random from `rng`.
pub fn pick_color_with<R: Rng>(rng: &mut R) -> Color {
    PALETTE[rng.random_range(0..PALETTE.len())]
}
