// src/render/mod.rs
//! Rendering: extracted content → Telegram HTML → transport-sized parts.

pub mod chunk;
pub mod format;
pub mod markup;

pub use chunk::{chunk_message, DEFAULT_MESSAGE_LIMIT};
pub use format::format_message;
