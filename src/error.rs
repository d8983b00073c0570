//! Error types for the IEC 60870-5-104 stack.

use std::borrow::Cow;
use thiserror::Error;

/// Result type alias for IEC 104 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// IEC 60870-5-104 protocol error.
///
/// Uses `Cow<'static, str>` to avoid allocations for static error messages.
#[derive(Debug, Error)]
pub enum Error {
    /// ASDU parameter set is invalid (address widths, cause size).
    #[error("invalid ASDU parameters: {0}")]
    Param(Cow<'static, str>),

    /// Cause of transmission 0 is reserved and rejected on encode.
    #[error("cause of transmission is zero")]
    CauseZero,

    /// Common address 0 is the "unused" sentinel and rejected on encode.
    #[error("common address is zero")]
    CommonAddrZero,

    /// Common address does not fit the configured octet width.
    #[error("common address does not fit {0}-octet width")]
    CommonAddrNotFit(u8),

    /// Originator address present while the cause size is one octet.
    #[error("originator address requires a 2-octet cause size")]
    OriginAddrNotFit,

    /// Information object address does not fit the configured octet width.
    #[error("information object address {0} does not fit {1}-octet width")]
    InfoObjAddrNotFit(u32, u8),

    /// Number of information objects outside [1, 127].
    #[error("variable structure number out of range")]
    VariableCountOutOfRange,

    /// The variable structure qualifier is not permitted for this type.
    #[error("invalid variable structure: {0}")]
    InvalidVariable(Cow<'static, str>),

    /// Encoded ASDU would exceed the 249 octet limit.
    #[error("ASDU length out of range")]
    LengthOutOfRange,

    /// A message was built without any information objects.
    #[error("no information objects")]
    NoObjects,

    /// Cause of transmission not permitted for this operation.
    #[error("cause of transmission not permitted for this command")]
    CommandCause,

    /// Decoder ran out of bytes.
    #[error("truncated ASDU payload")]
    Truncated,

    /// A parser or encoder was invoked for a TypeID it does not support.
    #[error("type identification mismatch: {0}")]
    TypeIdNotMatch(u8),

    /// Unknown cause of transmission value.
    #[error("unknown cause of transmission: {0}")]
    UnknownCause(u8),

    /// Invalid frame format at the APCI level.
    #[error("invalid frame: {0}")]
    InvalidFrame(Cow<'static, str>),

    /// Invalid ASDU contents.
    #[error("invalid ASDU: {0}")]
    InvalidAsdu(Cow<'static, str>),

    /// Sequence-number acknowledge is earlier than a previous one or
    /// later than the last frame sent.
    #[error("acknowledge out of window: ack {ack} with send window [{ack_send}, {seq_send})")]
    AckOutOfWindow { ack: u16, ack_send: u16, seq_send: u16 },

    /// Inbound I-frame carried an unexpected send sequence number.
    #[error("sequence mismatch: expected {expected}, got {actual}")]
    SequenceMismatch { expected: u16, actual: u16 },

    /// TCP connect did not finish within t0.
    #[error("connect timeout t0")]
    ConnectTimeout,

    /// An outstanding I-frame or U-frame confirmation exceeded t1.
    #[error("confirmation timeout t1")]
    T1Timeout,

    /// I/O error on the underlying stream.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the connection.
    #[error("connection closed by peer")]
    RemoteClosed,

    /// The send queue is saturated.
    #[error("send buffer is full")]
    BufferFull,

    /// Data transfer has not been activated with STARTDT.
    #[error("data transfer not active")]
    NotActive,

    /// Operation on a closed connection.
    #[error("use of closed connection")]
    UseClosedConnection,

    /// The client or server was already started.
    #[error("already started")]
    AlreadyStarted,

    /// The server listener has been shut down.
    #[error("server closed")]
    ServerClosed,
}

impl Error {
    /// Create a parameter error with a static message (zero allocation).
    #[inline]
    pub const fn param(msg: &'static str) -> Self {
        Self::Param(Cow::Borrowed(msg))
    }

    /// Create an invalid frame error with a static message (zero allocation).
    #[inline]
    pub const fn invalid_frame(msg: &'static str) -> Self {
        Self::InvalidFrame(Cow::Borrowed(msg))
    }

    /// Create an invalid ASDU error with a static message (zero allocation).
    #[inline]
    pub const fn invalid_asdu(msg: &'static str) -> Self {
        Self::InvalidAsdu(Cow::Borrowed(msg))
    }

    /// Create an invalid variable structure error.
    #[inline]
    pub const fn invalid_variable(msg: &'static str) -> Self {
        Self::InvalidVariable(Cow::Borrowed(msg))
    }

    /// Whether this error terminates the session when it surfaces inside
    /// the control loop. Codec-level errors on individual ASDUs are not
    /// fatal; protocol, timer and transport errors are.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AckOutOfWindow { .. }
                | Self::SequenceMismatch { .. }
                | Self::T1Timeout
                | Self::Io(_)
                | Self::RemoteClosed
        )
    }

    /// Whether this error came from the user-facing flow control surface.
    #[inline]
    pub fn is_flow_control(&self) -> bool {
        matches!(
            self,
            Self::BufferFull | Self::NotActive | Self::UseClosedConnection
        )
    }
}
