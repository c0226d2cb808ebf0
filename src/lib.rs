//! PIXIE16-RS: Streaming list-mode data decoder for Pixie16 digitizers
//!
//! This crate turns the list-mode byte stream of Pixie16 modules into
//! decoded events, feeding bytes in chunks of any size.

pub mod common;
pub mod config;
pub mod emulator;
pub mod reader;
