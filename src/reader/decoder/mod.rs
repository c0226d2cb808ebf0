//! Decoder module for Pixie16 list-mode data
//!
//! Converts a raw list-mode byte stream into structured Events.

pub mod event;
pub mod layout;
pub mod list_mode;
pub mod words;

pub use event::Event;
pub use layout::{HeaderFields, HeaderVariant};
pub use list_mode::{decode_trace, DecoderConfig, DrainedEvents, EventDecoder, Events, StreamEnd};
pub use words::WordQueue;
