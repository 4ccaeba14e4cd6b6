//! Client for the m4k processing API.
//!
//! Submits raw input with its options and decodes the `multipart/mixed`
//! response into [`ClientEvent`]s as it streams in.

mod client;
mod error;
mod event;
pub mod multipart;

pub use client::{M4kClient, OPTIONS_HEADER};
pub use error::ClientError;
pub use event::{decode_events, ClientEvent, EventStream, ReceivedFile};
pub use m4k_core::StatusPayload;
