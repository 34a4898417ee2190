//! Request grammar.
//!
//! ```text
//! request   = "X" channel [op] delimiter
//! channel   = "?" | digits | ""
//! op        = UPPER [["-"] digits] ["," argument]
//! ```
//!
//! `digits` in the channel must fit a `u32`, the op value an `i64`.
//! [`parse_command`] never panics; every malformed line maps to a
//! [`ParseError`].

use thiserror::Error;

use crate::constants::{COMMAND_PREFIX, ENUMERATE_CHANNEL, MAX_LINE_LEN};
use crate::frame::Delimiter;

/// Channel part of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAddr {
    /// `X?`, the controller status channel
    Status,
    /// `X<n>`; 127 doubles as the enumeration marker
    Number(u32),
    /// `X` followed directly by an op or the delimiter
    Unaddressed,
}

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub channel: ChannelAddr,
    /// Operation letter plus optional value, e.g. `E`, `T1500`, `Y13`.
    pub name: Option<String>,
    /// Text after the first comma.
    pub argument: Option<String>,
    pub suppress_response: bool,
}

impl Command {
    /// `X127` with no operation.
    pub fn is_enumeration(&self) -> bool {
        self.channel == ChannelAddr::Number(ENUMERATE_CHANNEL) && self.name.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("command must start with 'X'")]
    MissingPrefix,
    #[error("command contains non-printable or non-ASCII bytes")]
    NotAscii,
    #[error("command exceeds the maximum line length")]
    TooLong,
    #[error("channel number '{0}' does not fit")]
    ChannelOverflow(String),
    #[error("invalid operation '{0}'")]
    InvalidOperation(String),
    #[error("operation value in '{0}' does not fit")]
    ValueOverflow(String),
    #[error("empty argument after ','")]
    EmptyArgument,
}

/// Parse one request line (terminator already stripped by the framer).
pub fn parse_command(line: &[u8], delimiter: Delimiter) -> Result<Command, ParseError> {
    if line.is_empty() {
        return Err(ParseError::Empty);
    }
    if line.len() > MAX_LINE_LEN {
        return Err(ParseError::TooLong);
    }
    if !line.iter().all(|b| (0x20..=0x7e).contains(b)) {
        return Err(ParseError::NotAscii);
    }
    if line[0] != COMMAND_PREFIX {
        return Err(ParseError::MissingPrefix);
    }
    let text = std::str::from_utf8(&line[1..]).map_err(|_| ParseError::NotAscii)?;

    let (channel, rest) = split_channel(text)?;
    let (name, argument) = split_operation(rest)?;

    Ok(Command {
        channel,
        name,
        argument,
        suppress_response: delimiter.suppresses_response(),
    })
}

fn split_channel(text: &str) -> Result<(ChannelAddr, &str), ParseError> {
    if let Some(rest) = text.strip_prefix('?') {
        return Ok((ChannelAddr::Status, rest));
    }

    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Ok((ChannelAddr::Unaddressed, text));
    }

    let (number, rest) = text.split_at(digits);
    let number = number
        .parse::<u32>()
        .map_err(|_| ParseError::ChannelOverflow(number.to_string()))?;
    Ok((ChannelAddr::Number(number), rest))
}

fn split_operation(text: &str) -> Result<(Option<String>, Option<String>), ParseError> {
    if text.is_empty() {
        return Ok((None, None));
    }

    let (name, argument) = match text.split_once(',') {
        Some((name, argument)) => (name, Some(argument)),
        None => (text, None),
    };

    let mut chars = name.chars();
    match chars.next() {
        Some(letter) if letter.is_ascii_uppercase() => {}
        _ => return Err(ParseError::InvalidOperation(name.to_string())),
    }

    let value = chars.as_str();
    if !value.is_empty() {
        let unsigned = value.strip_prefix('-').unwrap_or(value);
        if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::InvalidOperation(name.to_string()));
        }
        value
            .parse::<i64>()
            .map_err(|_| ParseError::ValueOverflow(name.to_string()))?;
    }

    if argument == Some("") {
        return Err(ParseError::EmptyArgument);
    }

    Ok((Some(name.to_string()), argument.map(str::to_string)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Command, ParseError> {
        parse_command(text.as_bytes(), Delimiter::Newline)
    }

    #[test]
    fn status_query() {
        let cmd = parse("X?").unwrap();
        assert_eq!(cmd.channel, ChannelAddr::Status);
        assert_eq!(cmd.name, None);
        assert!(!cmd.suppress_response);
    }

    #[test]
    fn enumeration() {
        let cmd = parse("X127").unwrap();
        assert!(cmd.is_enumeration());

        let cmd = parse("X127E").unwrap();
        assert!(!cmd.is_enumeration());
    }

    #[test]
    fn target_write_keeps_value_in_name() {
        let cmd = parse("X2T1500").unwrap();
        assert_eq!(cmd.channel, ChannelAddr::Number(2));
        assert_eq!(cmd.name.as_deref(), Some("T1500"));
        assert_eq!(cmd.argument, None);
    }

    #[test]
    fn negative_value_accepted() {
        let cmd = parse("X0T-250").unwrap();
        assert_eq!(cmd.name.as_deref(), Some("T-250"));
    }

    #[test]
    fn argument_split_on_first_comma() {
        let cmd = parse_command(b"X0Y13,6", Delimiter::Silent).unwrap();
        assert_eq!(cmd.name.as_deref(), Some("Y13"));
        assert_eq!(cmd.argument.as_deref(), Some("6"));
        assert!(cmd.suppress_response);

        let cmd = parse("X0Y13,6,7").unwrap();
        assert_eq!(cmd.argument.as_deref(), Some("6,7"));
    }

    #[test]
    fn unaddressed_channel() {
        let cmd = parse("X").unwrap();
        assert_eq!(cmd.channel, ChannelAddr::Unaddressed);

        let cmd = parse("XE").unwrap();
        assert_eq!(cmd.channel, ChannelAddr::Unaddressed);
        assert_eq!(cmd.name.as_deref(), Some("E"));
    }

    #[test]
    fn unknown_letter_still_parses() {
        let cmd = parse("X0Q").unwrap();
        assert_eq!(cmd.name.as_deref(), Some("Q"));
    }

    #[test]
    fn malformed_lines() {
        assert_eq!(parse(""), Err(ParseError::Empty));
        assert_eq!(parse("Y0E"), Err(ParseError::MissingPrefix));
        assert_eq!(parse("hello"), Err(ParseError::MissingPrefix));
        assert!(matches!(parse("X0e"), Err(ParseError::InvalidOperation(_))));
        assert!(matches!(parse("X0T12ab"), Err(ParseError::InvalidOperation(_))));
        assert!(matches!(parse("X0T-"), Err(ParseError::InvalidOperation(_))));
        assert!(matches!(parse("X0 E"), Err(ParseError::InvalidOperation(_))));
        assert_eq!(parse("X0Y13,"), Err(ParseError::EmptyArgument));
        assert_eq!(
            parse_command("X0E\u{e9}".as_bytes(), Delimiter::Newline),
            Err(ParseError::NotAscii)
        );
        assert_eq!(parse_command(b"X0\tE", Delimiter::Newline), Err(ParseError::NotAscii));
    }

    #[test]
    fn numeric_overflow() {
        assert!(matches!(
            parse("X99999999999E"),
            Err(ParseError::ChannelOverflow(_))
        ));
        assert!(matches!(
            parse("X0T99999999999999999999"),
            Err(ParseError::ValueOverflow(_))
        ));
    }

    #[test]
    fn silent_delimiter_sets_suppression() {
        for (delimiter, suppressed) in [
            (Delimiter::Newline, false),
            (Delimiter::CarriageReturn, false),
            (Delimiter::Silent, true),
        ] {
            let cmd = parse_command(b"X0E", delimiter).unwrap();
            assert_eq!(cmd.suppress_response, suppressed);
        }
    }
}
