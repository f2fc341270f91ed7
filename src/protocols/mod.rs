//! Protocol implementations.
//!
//! Each protocol exposes a `handle_connection` entry point that owns one
//! accepted stream end-to-end: read until the peer finishes sending,
//! answer, then shut down the write half.
//!
//! - `echo`: binary-transparent echo, closes after the peer half-closes
//! - `prime`: newline-delimited JSON primality requests

pub mod echo;
pub mod prime;

use std::future::Future;
use std::io;
use std::time::Duration;

/// Await a read, failing with `TimedOut` if it takes longer than `idle`.
pub(crate) async fn with_idle_timeout<T, F>(idle: Option<Duration>, read: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match idle {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "idle timeout"))?,
        None => read.await,
    }
}
