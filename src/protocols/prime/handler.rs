//! Prime protocol handler for the Tokio runtime.

use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use super::parser::{self, Malformed, MALFORMED_RESPONSE};
use crate::config::ConnectionLimits;
use crate::protocols::with_idle_timeout;

/// Handle a prime protocol connection.
///
/// Serves requests in arrival order until the peer half-closes, a request
/// is malformed, or I/O fails. Bytes after the last delimiter at EOF are
/// discarded.
pub async fn handle_connection<S>(mut stream: S, limits: ConnectionLimits) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut input = BytesMut::with_capacity(limits.buffer_size);
    let mut output = Vec::with_capacity(64);
    let mut framer = parser::LineFramer::new(limits.max_line_length);
    let mut served: u64 = 0;

    'session: loop {
        loop {
            let frame = match framer.next_frame(&mut input) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(reason) => {
                    reject(&mut stream, reason).await?;
                    break 'session;
                }
            };

            match parser::decode(&frame) {
                Ok(request) => {
                    trace!(number = %request.number, "Processing request");
                    let response = parser::respond(&request);

                    output.clear();
                    parser::encode(&response, &mut output)?;
                    stream.write_all(&output).await?;
                    served += 1;
                }
                Err(reason) => {
                    reject(&mut stream, reason).await?;
                    break 'session;
                }
            }
        }

        if input.capacity() == input.len() {
            input.reserve(limits.buffer_size);
        }

        let n = with_idle_timeout(limits.idle_timeout, stream.read_buf(&mut input)).await?;
        if n == 0 {
            // EOF
            if !input.is_empty() {
                trace!(bytes = input.len(), "Discarding unterminated frame");
            }
            break;
        }
    }

    stream.shutdown().await?;
    trace!(requests = served, "Session complete");

    Ok(())
}

async fn reject<S>(stream: &mut S, reason: Malformed) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    debug!(%reason, "Malformed request");
    stream.write_all(MALFORMED_RESPONSE).await
}
