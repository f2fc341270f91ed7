//! Echo protocol implementation.
//!
//! A binary-transparent echo service in the spirit of RFC 862:
//! - Client sends arbitrary bytes, with no framing
//! - Server writes every chunk back verbatim, in order
//! - Once the client half-closes, the server finishes writing and closes
//!
//! ## Buffering
//!
//! Each connection owns one fixed-size buffer that is reused for every
//! read. A chunk is written back in full before the next read is issued,
//! so nothing is ever buffered ahead of the peer and memory per
//! connection stays at `buffer_size` regardless of payload size.

pub mod handler;

pub use handler::handle_connection;
