//! Replies sent by the controller.
//!
//! Read and write confirmations end in `\r`, error-style replies and the
//! channel list end in `\n`. The `Y13` set confirmation also ends in `\n`.

use bytes::Bytes;

use crate::constants::{CANNED_ENCODER_CONFIG, ENCODER_CONFIG_OP, STATUS_IDENT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `X?:PMD401 V18-emu\r`
    Status,
    /// `X0\nX1\n...` for a controller with `count` channels
    ChannelList { count: u32 },
    /// `X<ch>T:<value>\r`
    Target { channel: u32, value: i64 },
    /// `X<ch>E:<value>\r`
    Encoder { channel: u32, value: i64 },
    /// `X<ch>Y13:<config>\r`
    EncoderConfig { channel: u32, config: String },
    /// `X<ch>Y13,<argument>\n`
    EncoderConfigSet { channel: u32, argument: String },
    /// `wat?\n`
    Unknown,
    /// `parse error\n`
    ParseError,
    /// `bad channel\n`
    BadChannel,
}

impl Reply {
    pub fn encoder_config(channel: u32) -> Self {
        Self::EncoderConfig {
            channel,
            config: CANNED_ENCODER_CONFIG.to_string(),
        }
    }

    /// Serialize to wire bytes, terminator included.
    pub fn encode(&self) -> Bytes {
        let text = match self {
            Self::Status => format!("X?:{STATUS_IDENT}\r"),
            Self::ChannelList { count } => {
                (0..*count).map(|n| format!("X{n}\n")).collect::<String>()
            }
            Self::Target { channel, value } => format!("X{channel}T:{value}\r"),
            Self::Encoder { channel, value } => format!("X{channel}E:{value}\r"),
            Self::EncoderConfig { channel, config } => {
                format!("X{channel}{ENCODER_CONFIG_OP}:{config}\r")
            }
            Self::EncoderConfigSet { channel, argument } => {
                format!("X{channel}{ENCODER_CONFIG_OP},{argument}\n")
            }
            Self::Unknown => "wat?\n".to_string(),
            Self::ParseError => "parse error\n".to_string(),
            Self::BadChannel => "bad channel\n".to_string(),
        };
        Bytes::from(text)
    }
}
