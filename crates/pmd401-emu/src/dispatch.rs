//! Command dispatcher: maps one request line to its effect and reply.
//!
//! Dispatch order, first match wins:
//!
//! 1. parse failure → `parse error` (sent even for `;`-terminated lines)
//! 2. `X?` → status
//! 3. `X127` without an operation → channel list
//! 4. `T` → read target, `T<n>` → swap target, reply with the old one
//! 5. `E` → read encoder
//! 6. `Y13` → canned encoder configuration, `Y13,<arg>` → echo
//! 7. anything else → `wat?`
//!
//! Steps 4-6 need a numbered channel. A number outside the controller's range
//! gets `bad channel` instead of touching any state.

use pmd401_proto::{
    parse_command, ChannelAddr, Command, Delimiter, Reply, ENCODER_CONFIG_OP,
};

use crate::controller::Controller;
use crate::error::ControllerError;

/// Channel operations understood by the emulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation<'a> {
    ReadTarget,
    WriteTarget(i64),
    ReadEncoder,
    ReadEncoderConfig,
    WriteEncoderConfig(&'a str),
}

impl<'a> Operation<'a> {
    fn classify(name: &str, argument: Option<&'a str>) -> Option<Self> {
        if let Some(value) = name.strip_prefix('T') {
            if argument.is_some() {
                return None;
            }
            if value.is_empty() {
                return Some(Self::ReadTarget);
            }
            return value.parse().ok().map(Self::WriteTarget);
        }

        match (name, argument) {
            ("E", None) => Some(Self::ReadEncoder),
            (ENCODER_CONFIG_OP, None) => Some(Self::ReadEncoderConfig),
            (ENCODER_CONFIG_OP, Some(argument)) => Some(Self::WriteEncoderConfig(argument)),
            _ => None,
        }
    }
}

/// Parse and dispatch one framed line.
///
/// Returns `None` when nothing should be written back.
pub fn handle_line(controller: &Controller, line: &[u8], delimiter: Delimiter) -> Option<Reply> {
    let command = match parse_command(line, delimiter) {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!(
                line = %String::from_utf8_lossy(line),
                error = %e,
                "unparseable command"
            );
            return Some(Reply::ParseError);
        }
    };

    let reply = dispatch(controller, &command);
    tracing::trace!(?command, ?reply, "dispatched");

    if command.suppress_response {
        None
    } else {
        Some(reply)
    }
}

/// Compute the reply for a parsed command, applying its effect.
pub fn dispatch(controller: &Controller, command: &Command) -> Reply {
    if command.channel == ChannelAddr::Status {
        return Reply::Status;
    }

    let Some(name) = command.name.as_deref() else {
        if command.is_enumeration() {
            return Reply::ChannelList {
                count: controller.channel_count(),
            };
        }
        return Reply::Unknown;
    };

    let Some(operation) = Operation::classify(name, command.argument.as_deref()) else {
        return Reply::Unknown;
    };

    let ChannelAddr::Number(channel) = command.channel else {
        return Reply::Unknown;
    };

    match execute(controller, channel, operation) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(error = %e, "rejected command");
            Reply::BadChannel
        }
    }
}

fn execute(
    controller: &Controller,
    channel: u32,
    operation: Operation<'_>,
) -> Result<Reply, ControllerError> {
    let reply = match operation {
        Operation::ReadTarget => Reply::Target {
            channel,
            value: controller.get_target(channel)?,
        },
        Operation::WriteTarget(target) => {
            let previous = controller.set_target(channel, target)?;
            tracing::debug!(channel, previous, target, "target updated");
            Reply::Target {
                channel,
                value: previous,
            }
        }
        Operation::ReadEncoder => Reply::Encoder {
            channel,
            value: controller.get_encoder(channel)?,
        },
        Operation::ReadEncoderConfig => {
            controller.channel(channel)?;
            Reply::encoder_config(channel)
        }
        Operation::WriteEncoderConfig(argument) => {
            controller.channel(channel)?;
            tracing::debug!(channel, argument, "encoder configuration accepted");
            Reply::EncoderConfigSet {
                channel,
                argument: argument.to_string(),
            }
        }
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ask(controller: &Controller, request: &str) -> Option<Vec<u8>> {
        let (line, delimiter) = request.as_bytes().split_at(request.len() - 1);
        let delimiter = Delimiter::from_byte(delimiter[0]).unwrap();
        handle_line(controller, line, delimiter).map(|reply| reply.encode().to_vec())
    }

    fn ask_text(controller: &Controller, request: &str) -> String {
        String::from_utf8(ask(controller, request).unwrap()).unwrap()
    }

    #[test]
    fn status_and_enumeration() {
        let controller = Controller::new(3);
        assert_eq!(ask_text(&controller, "X?\n"), "X?:PMD401 V18-emu\r");
        assert_eq!(ask_text(&controller, "X127\n"), "X0\nX1\nX2\n");
    }

    #[test]
    fn status_ignores_operation() {
        let controller = Controller::new(1);
        assert_eq!(ask_text(&controller, "X?E\n"), "X?:PMD401 V18-emu\r");
    }

    #[test]
    fn target_write_then_read() {
        let controller = Controller::new(2);
        assert_eq!(ask_text(&controller, "X0T\n"), "X0T:0\r");
        assert_eq!(ask_text(&controller, "X0T1500\n"), "X0T:0\r");
        assert_eq!(ask_text(&controller, "X0T\r"), "X0T:1500\r");
        assert_eq!(ask_text(&controller, "X0T-7\n"), "X0T:1500\r");
        assert_eq!(controller.get_target(0), Ok(-7));
        assert_eq!(controller.get_target(1), Ok(0));
    }

    #[test]
    fn encoder_read() {
        let controller = Controller::new(1);
        assert_eq!(ask_text(&controller, "X0E\n"), "X0E:0\r");
    }

    #[test]
    fn encoder_config_is_canned() {
        let controller = Controller::new(1);
        assert_eq!(ask_text(&controller, "X0Y13\n"), "X0Y13:1, Quad_32\r");
        assert_eq!(ask(&controller, "X0Y13,6;"), None);
        assert_eq!(ask_text(&controller, "X0Y13,6\n"), "X0Y13,6\n");
        assert_eq!(ask_text(&controller, "X0Y13\n"), "X0Y13:1, Quad_32\r");
    }

    #[test]
    fn silent_delimiter_suppresses_but_still_applies() {
        let controller = Controller::new(1);
        assert_eq!(ask(&controller, "X0T42;"), None);
        assert_eq!(controller.get_target(0), Ok(42));
        assert_eq!(ask(&controller, "X0Q;"), None);
    }

    #[test]
    fn parse_error_always_replied() {
        let controller = Controller::new(1);
        assert_eq!(ask_text(&controller, "nonsense;"), "parse error\n");
        assert_eq!(ask_text(&controller, "X0e\n"), "parse error\n");
    }

    #[test]
    fn unknown_commands() {
        let controller = Controller::new(2);
        for request in ["X0Q\n", "X0E5\n", "X0Y12\n", "X0E,1\n", "X0T,1\n", "X0\n", "X\n", "XE\n"] {
            assert_eq!(ask_text(&controller, request), "wat?\n", "{request:?}");
        }
    }

    #[test]
    fn extreme_targets_step_toward_target() {
        let controller = Controller::new(1);
        let channel = controller.channel(0).unwrap();

        assert_eq!(ask_text(&controller, "X0T9223372036854775807\n"), "X0T:0\r");
        channel.step_toward_target();
        assert_eq!(controller.get_encoder(0), Ok(1));

        assert_eq!(
            ask_text(&controller, "X0T-9223372036854775808\n"),
            "X0T:9223372036854775807\r"
        );
        channel.step_toward_target();
        assert_eq!(controller.get_encoder(0), Ok(0));
    }

    #[test]
    fn out_of_range_channel() {
        let controller = Controller::new(2);
        assert_eq!(ask_text(&controller, "X2E\n"), "bad channel\n");
        assert_eq!(ask_text(&controller, "X127T5\n"), "bad channel\n");
        assert_eq!(ask_text(&controller, "X9Y13\n"), "bad channel\n");
        assert_eq!(ask_text(&controller, "X9Y13,6\n"), "bad channel\n");
    }
}
