//! Stream-oriented APDU framing codec.
//!
//! Built on the tokio-util codec framework so reader and writer tasks can
//! drive a [`Framed`](tokio_util::codec::Framed) transport directly. The
//! decoder carries the ASDU octets through raw: identifier decoding needs
//! the per-connection [`crate::Params`] and a malformed ASDU must not kill
//! the byte stream, so that step happens behind the session's APCI
//! accounting.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Error;
use crate::types::{Apci, UFunction, APDU_LENGTH_MAX, APDU_LENGTH_MIN, START_BYTE};

/// A framed APDU: the control field plus undecoded ASDU octets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apdu {
    /// Control field
    pub apci: Apci,
    /// Raw ASDU octets; empty for S- and U-frames
    pub payload: Bytes,
}

impl Apdu {
    /// An I-frame carrying encoded ASDU octets.
    pub fn i_frame(send_seq: u16, recv_seq: u16, payload: Bytes) -> Self {
        Self { apci: Apci::i_frame(send_seq, recv_seq), payload }
    }

    /// A supervisory acknowledgement.
    pub fn s_frame(recv_seq: u16) -> Self {
        Self { apci: Apci::s_frame(recv_seq), payload: Bytes::new() }
    }

    /// An unnumbered control frame.
    pub fn u_frame(function: UFunction) -> Self {
        Self { apci: Apci::u_frame(function), payload: Bytes::new() }
    }
}

impl std::fmt::Display for Apdu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.apci)?;
        if !self.payload.is_empty() {
            write!(f, " +{}B", self.payload.len())?;
        }
        Ok(())
    }
}

/// APDU framing codec.
///
/// Decoding scans for the start octet, validates the length octet against
/// `4 <= length <= 253` and waits for the complete frame; any deviation
/// drops one octet and resumes the scan.
#[derive(Debug, Clone, Default)]
pub struct ApduCodec {
    state: DecodeState,
}

#[derive(Debug, Clone, Copy, Default)]
enum DecodeState {
    #[default]
    Start,
    Length,
    Data {
        length: usize,
    },
}

impl ApduCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for ApduCodec {
    type Item = Apdu;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Apdu>, Error> {
        loop {
            match self.state {
                DecodeState::Start => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    if src[0] != START_BYTE {
                        match src.iter().position(|&b| b == START_BYTE) {
                            Some(pos) => src.advance(pos),
                            None => {
                                src.clear();
                                return Ok(None);
                            }
                        }
                    }
                    self.state = DecodeState::Length;
                }

                DecodeState::Length => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    let length = src[1] as usize;
                    if !(APDU_LENGTH_MIN..=APDU_LENGTH_MAX).contains(&length) {
                        // drop the start octet and rescan
                        src.advance(1);
                        self.state = DecodeState::Start;
                        continue;
                    }
                    self.state = DecodeState::Data { length };
                }

                DecodeState::Data { length } => {
                    let total = 2 + length;
                    if src.len() < total {
                        return Ok(None);
                    }

                    let frame = src.split_to(total).freeze();
                    self.state = DecodeState::Start;

                    let control = [frame[2], frame[3], frame[4], frame[5]];
                    let apci = Apci::parse(&control);
                    return Ok(Some(Apdu { apci, payload: frame.slice(6..) }));
                }
            }
        }
    }
}

impl Encoder<Apdu> for ApduCodec {
    type Error = Error;

    fn encode(&mut self, item: Apdu, dst: &mut BytesMut) -> Result<(), Error> {
        if item.payload.len() > APDU_LENGTH_MAX - APDU_LENGTH_MIN {
            return Err(Error::LengthOutOfRange);
        }
        dst.reserve(6 + item.payload.len());
        dst.extend_from_slice(&item.apci.encode_header(item.payload.len()));
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}
