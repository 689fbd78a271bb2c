//! Repeat protocol parser and response generator.

use bytes::{BufMut, BytesMut};
use thiserror::Error;

/// A parsed `<n> <message>` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// How many times to repeat the message.
    pub n: u32,
    /// Message text, without the line terminator. May be empty.
    pub message: String,
}

/// Reasons a request line is rejected.
///
/// The `Display` text is sent to the client verbatim after `ERROR: `.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Empty line")]
    EmptyLine,
    #[error("Format: '<n> <message>'")]
    MissingSeparator,
    #[error("n must be an integer")]
    InvalidCount,
    #[error("n must be >= 0")]
    NegativeCount,
}

/// Parse one request line.
///
/// `None` stands for a line that never arrived. The connection handler
/// treats end of stream as a close, so it only ever passes `Some`.
pub fn parse(line: Option<&str>) -> Result<Request, ParseError> {
    let line = line.ok_or(ParseError::EmptyLine)?.trim_start();

    // Trailing whitespace is trimmed off the message rather than the whole
    // line so that "3 " still has its separator.
    let (count, message) = line.split_once(' ').ok_or(ParseError::MissingSeparator)?;

    let n: i32 = count.parse().map_err(|_| ParseError::InvalidCount)?;
    let n = u32::try_from(n).map_err(|_| ParseError::NegativeCount)?;

    Ok(Request {
        n,
        message: message.trim_end().to_string(),
    })
}

/// Upper bound on the size of one reply chunk, unless a single line is
/// longer than this.
pub const REPLY_CHUNK_SIZE: usize = 64 * 1024;

/// Reply to a request: `message\n` repeated `n` times, yielded as chunks
/// of whole lines so memory stays bounded however large `n` is.
#[derive(Debug, Clone)]
pub struct Reply<'a> {
    message: &'a [u8],
    remaining: u32,
}

/// Build the reply for a request. Yields nothing when `n` is zero.
pub fn respond(req: &Request) -> Reply<'_> {
    Reply {
        message: req.message.as_bytes(),
        remaining: req.n,
    }
}

impl Iterator for Reply<'_> {
    type Item = BytesMut;

    fn next(&mut self) -> Option<BytesMut> {
        if self.remaining == 0 {
            return None;
        }

        let line_len = self.message.len() + 1;
        let lines = (REPLY_CHUNK_SIZE / line_len).clamp(1, self.remaining as usize);

        let mut out = BytesMut::with_capacity(line_len * lines);
        for _ in 0..lines {
            out.put_slice(self.message);
            out.put_u8(b'\n');
        }
        self.remaining -= lines as u32;
        Some(out)
    }
}

/// Format an error reply.
pub fn response_error(err: ParseError) -> Vec<u8> {
    format!("ERROR: {err}\n").into_bytes()
}
