//! Protocol implementations.
//!
//! - `repeat`: `<n> <message>` lines answered with the message repeated n times

pub mod repeat;
