//! Repeat protocol handler for the Tokio runtime.

use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, trace};

use super::parser::{parse, respond, response_error};

/// Longest accepted request line, including its terminator.
const MAX_LINE_LENGTH: usize = 64 * 1024;

const INITIAL_LINE_CAPACITY: usize = 1024;

/// Handle a repeat protocol connection.
///
/// Reads `<n> <message>` lines and answers each one before reading the
/// next. Malformed lines get an `ERROR:` reply and the session continues.
/// Returns when the peer closes the stream, sends a line longer than
/// `MAX_LINE_LENGTH`, or an I/O error occurs; errors are logged here and
/// never reach the caller.
pub async fn handle_connection<S>(stream: S)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);

    match serve(&mut stream).await {
        Ok(()) => trace!("Connection closed by client"),
        Err(e) => debug!(error = %e, "Connection error"),
    }

    // The stream is dropped on return regardless of how shutdown goes.
    if let Err(e) = stream.shutdown().await {
        trace!(error = %e, "Shutdown failed");
    }
}

async fn serve<S>(stream: &mut BufReader<S>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut line = Vec::with_capacity(INITIAL_LINE_CAPACITY);

    loop {
        line.clear();

        let n = (&mut *stream)
            .take(MAX_LINE_LENGTH as u64)
            .read_until(b'\n', &mut line)
            .await?;
        if n == 0 {
            // EOF
            return Ok(());
        }
        if n == MAX_LINE_LENGTH && line.last() != Some(&b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request line too long",
            ));
        }

        let text = String::from_utf8_lossy(&line);

        match parse(Some(&*text)) {
            Ok(request) => {
                trace!(n = request.n, "Processing request");
                for chunk in respond(&request) {
                    stream.write_all(&chunk).await?;
                }
            }
            Err(e) => {
                debug!(error = %e, "Parse error");
                stream.write_all(&response_error(e)).await?;
            }
        }

        stream.flush().await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::repeat::parser::REPLY_CHUNK_SIZE;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_single_request() {
        let mock = Builder::new().read(b"3 hi\n").write(b"hi\nhi\nhi\n").build();
        handle_connection(mock).await;
    }

    #[tokio::test]
    async fn test_multiple_requests_in_order() {
        let mock = Builder::new()
            .read(b"1 first\n")
            .write(b"first\n")
            .read(b"2 second\n")
            .write(b"second\nsecond\n")
            .build();
        handle_connection(mock).await;
    }

    #[tokio::test]
    async fn test_malformed_line_keeps_session_open() {
        let mock = Builder::new()
            .read(b"oops\n")
            .write(b"ERROR: Format: '<n> <message>'\n")
            .read(b"2 ok\n")
            .write(b"ok\nok\n")
            .build();
        handle_connection(mock).await;
    }

    #[tokio::test]
    async fn test_every_error_reason() {
        let mock = Builder::new()
            .read(b"abc hi\n")
            .write(b"ERROR: n must be an integer\n")
            .read(b"-1 hi\n")
            .write(b"ERROR: n must be >= 0\n")
            .read(b"\n")
            .write(b"ERROR: Format: '<n> <message>'\n")
            .build();
        handle_connection(mock).await;
    }

    #[tokio::test]
    async fn test_zero_count_writes_nothing() {
        let mock = Builder::new()
            .read(b"0 ignored\n")
            .read(b"1 next\n")
            .write(b"next\n")
            .build();
        handle_connection(mock).await;
    }

    #[tokio::test]
    async fn test_crlf_lines() {
        let mock = Builder::new().read(b"2 win\r\n").write(b"win\nwin\n").build();
        handle_connection(mock).await;
    }

    #[tokio::test]
    async fn test_line_split_across_reads() {
        let mock = Builder::new()
            .read(b"2 hel")
            .read(b"lo\n")
            .write(b"hello\nhello\n")
            .build();
        handle_connection(mock).await;
    }

    #[tokio::test]
    async fn test_unterminated_last_line() {
        let mock = Builder::new().read(b"1 tail").write(b"tail\n").build();
        handle_connection(mock).await;
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let mock = Builder::new()
            .read(b"1 a\xffb\n")
            .write("a\u{fffd}b\n".as_bytes())
            .build();
        handle_connection(mock).await;
    }

    #[tokio::test]
    async fn test_read_error_ends_session() {
        let mock = Builder::new()
            .read(b"1 before\n")
            .write(b"before\n")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        handle_connection(mock).await;
    }

    #[tokio::test]
    async fn test_write_error_ends_session() {
        let mock = Builder::new()
            .read(b"1 lost\n")
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        handle_connection(mock).await;
    }

    #[tokio::test]
    async fn test_large_count_written_in_chunks() {
        let message = "z".repeat(999);
        let request = format!("300 {message}\n");
        let expected = format!("{message}\n").repeat(300);
        assert!(expected.len() > 4 * REPLY_CHUNK_SIZE);

        let mock = Builder::new()
            .read(request.as_bytes())
            .write(expected.as_bytes())
            .build();
        handle_connection(mock).await;
    }

    #[tokio::test]
    async fn test_line_at_limit_is_served() {
        let message = "a".repeat(MAX_LINE_LENGTH - 3);
        let request = format!("1 {message}\n");
        assert_eq!(request.len(), MAX_LINE_LENGTH);

        let mock = Builder::new()
            .read(request.as_bytes())
            .write(format!("{message}\n").as_bytes())
            .build();
        handle_connection(mock).await;
    }

    #[tokio::test]
    async fn test_overlong_line_ends_session() {
        // No reply is expected: the session closes instead of parsing.
        let mock = Builder::new().read(&vec![b'7'; MAX_LINE_LENGTH]).build();
        handle_connection(mock).await;
    }
}
