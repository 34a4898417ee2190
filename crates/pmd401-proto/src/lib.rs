//! PMD401 Wire Protocol
//!
//! Pure codec for the PMD401 ASCII command set, shared by the emulator and the
//! client transport. Nothing in this crate performs I/O or holds state beyond
//! a framing buffer.
//!
//! # Protocol Overview
//!
//! - Format: ASCII request lines over TCP (default `127.0.0.1:4001`)
//! - Request: `X{channel}{op}[,{arg}]{delimiter}`
//! - Delimiters: `\n` or `\r` (reply expected), `;` (reply suppressed)
//! - Example: `X0T1500\n` (channel 0, set target to 1500)
//!
//! # Modules
//!
//! - [`frame`]: splits a byte stream into delimited lines
//! - [`command`]: request grammar, [`parse_command`]
//! - [`reply`]: emulator replies, [`Reply::encode`]
//! - [`request`]: client-side request encoding and reply decoding

pub mod command;
pub mod constants;
pub mod frame;
pub mod reply;
pub mod request;

pub use command::{parse_command, ChannelAddr, Command, ParseError};
pub use constants::*;
pub use frame::{Delimiter, Frame, FrameBuffer};
pub use reply::Reply;
pub use request::{
    parse_channel_list, parse_config_reply, parse_value_reply, take_reply_line, ReplyError,
    Request,
};
