//! Client side of the protocol: building requests and decoding replies.

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use crate::constants::{ENCODER_CONFIG_OP, ENUMERATE_CHANNEL};
use crate::frame::Delimiter;

/// Replies a controller sends instead of the expected value.
const REJECTIONS: [&str; 3] = ["wat?", "parse error", "bad channel"];

/// A request the client knows how to phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    Status,
    ListChannels,
    ReadTarget { channel: u32 },
    WriteTarget { channel: u32, value: i64 },
    ReadEncoder { channel: u32 },
    ReadEncoderConfig { channel: u32 },
    WriteEncoderConfig { channel: u32, argument: &'a str },
}

impl Request<'_> {
    pub fn encode(&self, delimiter: Delimiter) -> Bytes {
        let mut text = match self {
            Self::Status => "X?".to_string(),
            Self::ListChannels => format!("X{ENUMERATE_CHANNEL}"),
            Self::ReadTarget { channel } => format!("X{channel}T"),
            Self::WriteTarget { channel, value } => format!("X{channel}T{value}"),
            Self::ReadEncoder { channel } => format!("X{channel}E"),
            Self::ReadEncoderConfig { channel } => format!("X{channel}{ENCODER_CONFIG_OP}"),
            Self::WriteEncoderConfig { channel, argument } => {
                format!("X{channel}{ENCODER_CONFIG_OP},{argument}")
            }
        };
        text.push(char::from(delimiter.as_byte()));
        Bytes::from(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    /// The controller answered `wat?`, `parse error` or `bad channel`.
    #[error("controller rejected the request: {0}")]
    Rejected(String),
    #[error("malformed reply '{reply}', expected {expected}")]
    Malformed { reply: String, expected: String },
}

fn check_rejection(line: &str) -> Result<(), ReplyError> {
    if REJECTIONS.contains(&line) {
        return Err(ReplyError::Rejected(line.to_string()));
    }
    Ok(())
}

/// Split the first `\r`- or `\n`-terminated line off `buf`.
///
/// Empty lines are skipped. Returns `None` until a full line is buffered.
pub fn take_reply_line(buf: &mut BytesMut) -> Option<String> {
    loop {
        let pos = buf.iter().position(|&b| b == b'\r' || b == b'\n')?;
        let raw = buf.split_to(pos + 1);
        if pos == 0 {
            continue;
        }
        return Some(String::from_utf8_lossy(&raw[..pos]).into_owned());
    }
}

/// Decode `X<channel><code>:<value>` into the value.
pub fn parse_value_reply(line: &str, channel: u32, code: &str) -> Result<i64, ReplyError> {
    check_rejection(line)?;
    let prefix = format!("X{channel}{code}:");
    line.strip_prefix(prefix.as_str())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or_else(|| ReplyError::Malformed {
            reply: line.to_string(),
            expected: format!("{prefix}<integer>"),
        })
}

/// Decode `X<channel>Y13:<config>` into the configuration text.
pub fn parse_config_reply(line: &str, channel: u32) -> Result<String, ReplyError> {
    check_rejection(line)?;
    let prefix = format!("X{channel}{ENCODER_CONFIG_OP}:");
    line.strip_prefix(prefix.as_str())
        .map(str::to_string)
        .ok_or_else(|| ReplyError::Malformed {
            reply: line.to_string(),
            expected: format!("{prefix}<config>"),
        })
}

/// Decode a channel enumeration, stopping at the status line if one follows.
pub fn parse_channel_list(data: &[u8]) -> Result<Vec<u32>, ReplyError> {
    let text = String::from_utf8_lossy(data);
    let mut channels = Vec::new();

    for line in text.split(|c| c == '\n' || c == '\r') {
        if line.is_empty() {
            continue;
        }
        if line.starts_with("X?:") {
            // status reply marks the end of the listing
            break;
        }
        check_rejection(line)?;

        let number = line
            .strip_prefix('X')
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(|| ReplyError::Malformed {
                reply: line.to_string(),
                expected: "X<channel>".to_string(),
            })?;
        channels.push(number);
    }

    Ok(channels)
}
