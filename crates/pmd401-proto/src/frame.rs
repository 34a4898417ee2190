//! Line framing.
//!
//! Requests arrive as a raw byte stream. [`FrameBuffer`] accumulates whatever
//! each read returned and hands out complete lines, so a line split across
//! two reads and several lines packed into one read both come out right.

use bytes::BytesMut;

use crate::constants::MAX_LINE_LEN;

/// Line terminator of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `\n`, reply expected
    Newline,
    /// `\r`, reply expected
    CarriageReturn,
    /// `;`, reply suppressed unless the line fails to parse
    Silent,
}

impl Delimiter {
    /// Map a byte to a delimiter, if it is one.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'\n' => Some(Self::Newline),
            b'\r' => Some(Self::CarriageReturn),
            b';' => Some(Self::Silent),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Newline => b'\n',
            Self::CarriageReturn => b'\r',
            Self::Silent => b';',
        }
    }

    pub fn suppresses_response(self) -> bool {
        matches!(self, Self::Silent)
    }
}

/// One unit of input produced by [`FrameBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line, terminator stripped.
    Line { line: Vec<u8>, delimiter: Delimiter },
    /// More than [`MAX_LINE_LEN`] bytes arrived without a terminator.
    Overflow,
}

/// Accumulates stream bytes and yields delimited frames.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
    /// Dropping the tail of an overlong line up to its terminator.
    discarding: bool,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the stream.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet part of a complete frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Take the next complete frame, if one is buffered.
    ///
    /// Empty lines (for instance the `\n` half of a `\r\n` pair) are skipped.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let Some(pos) = self
                .buf
                .iter()
                .position(|&b| Delimiter::from_byte(b).is_some())
            else {
                return self.check_overflow();
            };

            let raw = self.buf.split_to(pos + 1);
            if self.discarding {
                self.discarding = false;
                continue;
            }
            let Some(delimiter) = Delimiter::from_byte(raw[pos]) else {
                continue;
            };
            if pos == 0 {
                continue;
            }
            if pos > MAX_LINE_LEN {
                return Some(Frame::Overflow);
            }

            return Some(Frame::Line {
                line: raw[..pos].to_vec(),
                delimiter,
            });
        }
    }

    /// Drain the unterminated remainder, e.g. when the peer closed mid-line.
    pub fn take_remainder(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = self.buf.split().to_vec();
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        Some(rest)
    }

    fn check_overflow(&mut self) -> Option<Frame> {
        if self.discarding {
            self.buf.clear();
            return None;
        }
        if self.buf.len() > MAX_LINE_LEN {
            self.buf.clear();
            self.discarding = true;
            return Some(Frame::Overflow);
        }
        None
    }
}
