//! Repeat protocol implementation.
//!
//! A line-oriented service that echoes a message a requested number of
//! times:
//! - Client sends: `<n> <message>\n`
//! - Server responds: `<message>\n` repeated n times
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  3 hello\n
//! Response: hello\nhello\nhello\n
//!
//! Request:  0 hello\n
//! Response: (nothing)
//!
//! Request:  hello\n
//! Response: ERROR: Format: '<n> <message>'\n
//! ```
//!
//! `n` is a base-10 integer in `0..=2147483647`. The message is everything
//! after the first space and may be empty or contain further spaces.
//!
//! Error replies are `ERROR: <reason>\n` where the reason is one of:
//! - `Empty line`
//! - `Format: '<n> <message>'`
//! - `n must be an integer`
//! - `n must be >= 0`
//!
//! A malformed line never closes the connection; the client can keep
//! sending requests until it disconnects.

pub mod handler;
pub mod parser;

pub use handler::handle_connection;
