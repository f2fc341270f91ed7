//! Prime protocol implementation.
//!
//! A newline-delimited JSON request/response protocol:
//! - Client sends one JSON object per line
//! - Server answers each well-formed request with one line, in order
//! - The first malformed request gets a fixed error line and the
//!   connection is closed
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  {"method":"isPrime","number":7}\n
//! Response: {"method":"isPrime","prime":true}\n
//!
//! Request:  {"method":"isPrime","number":7.5}\n
//! Response: {"method":"isPrime","prime":false}\n
//!
//! Request:  {"method":"isPrime"}\n
//! Response: {"answer":"Malformed"}\n   (then close)
//! ```
//!
//! A request is malformed if it is not UTF-8, not a JSON object, lacks
//! `method` or `number`, names a method other than `isPrime`, or carries a
//! `number` that is not a JSON number. Non-integral numbers are valid and
//! simply not prime.
//!
//! A trailing fragment without a newline when the client half-closes is
//! dropped without a response.

pub mod handler;
pub mod parser;

pub use handler::handle_connection;
