//! # huddle-core
//!
//! Types shared by the huddle server and client.
//!
//! - [`ids`]: branded connection ids
//! - [`color`]: the fixed ANSI palette and the random color allocator
//! - [`wire`]: participant profiles and the exact text lines put on the wire
//! - [`signal`]: waiting for the OS to ask the process to stop

#![deny(unsafe_code)]

pub mod color;
pub mod ids;
pub mod signal;
pub mod wire;

pub use color::{Color, PALETTE, RESET, pick_color, pick_color_with};
pub use ids::ConnectionId;
pub use signal::{ShutdownSignal, wait_for_shutdown_signal};
pub use wire::{ChatLine, Profile};
