//! Protocol constants shared by both ends of the wire.

/// Default controller host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default controller TCP port.
pub const DEFAULT_PORT: u16 = 4001;

/// Channel number reserved for "enumerate channels" (`X127`).
pub const ENUMERATE_CHANNEL: u32 = 127;

/// Identification string returned by the status query (`X?`).
pub const STATUS_IDENT: &str = "PMD401 V18-emu";

/// Encoder configuration reported by `X<n>Y13`.
pub const CANNED_ENCODER_CONFIG: &str = "1, Quad_32";

/// Longest request line accepted before the framer gives up on it.
pub const MAX_LINE_LEN: usize = 256;

/// Every request starts with this byte.
pub const COMMAND_PREFIX: u8 = b'X';

/// Encoder configuration code (`Y13`).
pub const ENCODER_CONFIG_OP: &str = "Y13";
