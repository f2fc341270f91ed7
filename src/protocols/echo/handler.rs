//! Echo protocol handler for the Tokio runtime.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::config::ConnectionLimits;
use crate::protocols::with_idle_timeout;

/// Handle an echo protocol connection.
///
/// Returns once the peer has half-closed and every byte it sent has been
/// written back, or as soon as a read or write fails.
pub async fn handle_connection<S>(mut stream: S, limits: ConnectionLimits) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; limits.buffer_size];
    let mut echoed: u64 = 0;

    loop {
        let n = with_idle_timeout(limits.idle_timeout, stream.read(&mut buffer)).await?;
        if n == 0 {
            // EOF
            break;
        }

        stream.write_all(&buffer[..n]).await?;
        echoed += n as u64;
    }

    stream.shutdown().await?;
    trace!(bytes = echoed, "Echo complete");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::io::Builder;

    fn limits(buffer_size: usize) -> ConnectionLimits {
        ConnectionLimits {
            buffer_size,
            ..ConnectionLimits::default()
        }
    }

    #[tokio::test]
    async fn test_echo_chunks_in_order() {
        let mock = Builder::new()
            .read(b"hello")
            .write(b"hello")
            .read(b" world")
            .write(b" world")
            .build();

        handle_connection(mock, limits(1024)).await.unwrap();
    }

    #[tokio::test]
    async fn test_echo_is_binary_safe() {
        let payload = [0u8, b'\n', 0xff, 0xfe, b'\r', 0x80, 0];
        let mock = Builder::new().read(&payload).write(&payload).build();

        handle_connection(mock, limits(1024)).await.unwrap();
    }

    #[tokio::test]
    async fn test_small_buffer_splits_reads() {
        // A 4 byte buffer forces three read/write cycles.
        let mock = Builder::new()
            .read(b"0123456789")
            .write(b"0123456789")
            .build();

        handle_connection(mock, limits(4)).await.unwrap();
    }

    #[tokio::test]
    async fn test_immediate_eof() {
        let mock = Builder::new().build();
        handle_connection(mock, limits(1024)).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_error_aborts() {
        let mock = Builder::new()
            .read(b"abc")
            .write(b"abc")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();

        let err = handle_connection(mock, limits(1024)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn test_write_error_aborts() {
        let mock = Builder::new()
            .read(b"abc")
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();

        let err = handle_connection(mock, limits(1024)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_half_close_drains_everything() {
        let (mut client, server) = tokio::io::duplex(64);
        let handler = tokio::spawn(handle_connection(server, limits(16)));

        let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        let (mut rd, mut wr) = tokio::io::split(&mut client);
        let send = async {
            wr.write_all(&payload).await.unwrap();
            wr.shutdown().await.unwrap();
        };
        let mut received = Vec::new();
        let recv = rd.read_to_end(&mut received);
        let (_, read) = tokio::join!(send, recv);

        read.unwrap();
        assert_eq!(received, payload);
        handler.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_idle_connection_times_out() {
        let (_client, server) = tokio::io::duplex(64);
        let limits = ConnectionLimits {
            idle_timeout: Some(Duration::from_millis(20)),
            ..ConnectionLimits::default()
        };

        let err = handle_connection(server, limits).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
