//! ASDU data unit identifier and raw container.
//!
//! ```text
//!       | data unit identification | information objects <1..n> |
//!       | type | vsq | cause [1,2] | common address [1,2]       |
//! bytes |  1   |  1  |   1..2      |        1..2                |
//! ```
//!
//! The identifier field widths are selected by [`Params`]; the complete
//! ASDU never exceeds [`ASDU_SIZE_MAX`] octets.

use bytes::{BufMut, Bytes, BytesMut};

use crate::config::Params;
use crate::error::{Error, Result};
use crate::types::{Cause, Cot, TypeId, GLOBAL_COMMON_ADDR, INVALID_COMMON_ADDR};

/// Maximum size of a complete ASDU in octets.
pub const ASDU_SIZE_MAX: usize = 249;

/// Variable structure qualifier: object count plus the SQ flag.
///
/// See companion standard 101, subclass 7.2.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vsq {
    /// Number of information objects or elements, 0..127
    pub number: u8,
    /// SQ=1: a single object address followed by consecutive elements
    pub is_sequence: bool,
}

impl Vsq {
    #[inline]
    pub const fn new(number: u8, is_sequence: bool) -> Self {
        Self { number, is_sequence }
    }

    /// A single scattered object, the shape of every command ASDU.
    #[inline]
    pub const fn single() -> Self {
        Self { number: 1, is_sequence: false }
    }

    #[inline]
    pub const fn from_u8(value: u8) -> Self {
        Self { number: value & 0x7f, is_sequence: value & 0x80 != 0 }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        (self.number & 0x7f) | if self.is_sequence { 0x80 } else { 0 }
    }
}

impl std::fmt::Display for Vsq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n={},sq={}", self.number, self.is_sequence as u8)
    }
}

/// ASDU data unit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsduHeader {
    /// Type identification
    pub type_id: TypeId,
    /// Variable structure qualifier
    pub vsq: Vsq,
    /// Cause of transmission with P/N and test flags
    pub cot: Cot,
    /// Originator address, 0 when unused; carried only with a 2-octet cause
    pub orig_addr: u8,
    /// Station address; 0 is unused, 65535 is broadcast
    pub common_addr: u16,
}

impl AsduHeader {
    /// Identifier with no originator address.
    pub fn new(type_id: TypeId, vsq: Vsq, cot: impl Into<Cot>, common_addr: u16) -> Self {
        Self { type_id, vsq, cot: cot.into(), orig_addr: 0, common_addr }
    }
}

impl std::fmt::Display for AsduHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TID<{}> COT<{}>", self.type_id, self.cot)?;
        if self.orig_addr != 0 {
            write!(f, " {}@{}", self.orig_addr, self.common_addr)
        } else {
            write!(f, " @{}", self.common_addr)
        }
    }
}

/// A raw ASDU: identifier plus the undecoded information object octets.
///
/// This is the unit handed to [`crate::Connection::send`] and produced by
/// the frame reader; [`crate::parse_asdu`] lifts it into a typed
/// [`crate::Message`] without consuming it.
#[derive(Debug, Clone, PartialEq)]
pub struct Asdu {
    /// Structure parameters the identifier was coded with
    pub params: Params,
    /// Data unit identifier
    pub header: AsduHeader,
    /// Information object octets
    pub info_obj: Bytes,
}

impl Asdu {
    pub fn new(params: Params, header: AsduHeader, info_obj: Bytes) -> Self {
        Self { params, header, info_obj }
    }

    /// Decode an ASDU from raw octets.
    ///
    /// Surplus octets beyond the size implied by the variable structure
    /// qualifier are dropped; missing octets are a [`Error::Truncated`].
    pub fn decode(params: Params, raw: &[u8]) -> Result<Self> {
        params.validate()?;
        let id_size = params.identifier_size();
        if raw.len() < id_size {
            return Err(Error::Truncated);
        }

        let type_id = TypeId::from_u8(raw[0]);
        let vsq = Vsq::from_u8(raw[1]);
        let cot = Cot::from_u8(raw[2])?;
        let orig_addr = if params.cause_size == 2 { raw[3] } else { 0 };
        let common_addr = if params.common_addr_size == 1 {
            let a = u16::from(raw[id_size - 1]);
            // the 8-bit broadcast alias maps to the 16-bit equivalent
            if a == 255 {
                GLOBAL_COMMON_ADDR
            } else {
                a
            }
        } else {
            u16::from(raw[id_size - 2]) | u16::from(raw[id_size - 1]) << 8
        };

        let mut asdu = Self {
            params,
            header: AsduHeader { type_id, vsq, cot, orig_addr, common_addr },
            info_obj: Bytes::copy_from_slice(&raw[id_size..]),
        };
        asdu.fix_info_obj_size()?;
        Ok(asdu)
    }

    /// Trim or reject the information object octets against the size the
    /// variable structure qualifier implies. Private types are passed
    /// through untouched.
    fn fix_info_obj_size(&mut self) -> Result<()> {
        let Some(elem_size) = self.header.type_id.element_size() else {
            return Ok(());
        };

        let ioa_size = self.params.info_obj_addr_size as usize;
        let number = self.header.vsq.number as usize;
        let size = if self.header.vsq.is_sequence {
            ioa_size + number * elem_size
        } else {
            number * (ioa_size + elem_size)
        };

        if size == 0 {
            return Err(Error::VariableCountOutOfRange);
        }
        if size > self.info_obj.len() {
            return Err(Error::Truncated);
        }
        if size < self.info_obj.len() {
            // surplus octets are not explicitly prohibited
            self.info_obj.truncate(size);
        }
        Ok(())
    }

    /// Encode to wire octets, validating the identifier against the
    /// structure parameters.
    pub fn encode(&self) -> Result<Bytes> {
        let p = &self.params;
        p.validate()?;
        if self.header.cot.cause == Cause::Unused {
            return Err(Error::CauseZero);
        }
        if p.cause_size == 1 && self.header.orig_addr != 0 {
            return Err(Error::OriginAddrNotFit);
        }
        if self.header.common_addr == INVALID_COMMON_ADDR {
            return Err(Error::CommonAddrZero);
        }
        p.valid_common_addr(self.header.common_addr)?;

        let id_size = p.identifier_size();
        if id_size + self.info_obj.len() > ASDU_SIZE_MAX {
            return Err(Error::LengthOutOfRange);
        }

        let mut buf = BytesMut::with_capacity(id_size + self.info_obj.len());
        buf.put_u8(self.header.type_id.as_u8());
        buf.put_u8(self.header.vsq.as_u8());
        buf.put_u8(self.header.cot.as_u8());
        if p.cause_size == 2 {
            buf.put_u8(self.header.orig_addr);
        }
        if p.common_addr_size == 1 {
            if self.header.common_addr == GLOBAL_COMMON_ADDR {
                buf.put_u8(255);
            } else {
                buf.put_u8(self.header.common_addr as u8);
            }
        } else {
            buf.put_u16_le(self.header.common_addr);
        }
        buf.put_slice(&self.info_obj);
        Ok(buf.freeze())
    }

    /// A responding ASDU addressing `common_addr` with the given cause and
    /// a copy of this unit's information objects.
    pub fn reply(&self, cause: Cause, common_addr: u16) -> Self {
        let mut header = self.header;
        header.cot.cause = cause;
        header.common_addr = common_addr;
        Self { params: self.params, header, info_obj: self.info_obj.clone() }
    }

    /// A responding ASDU mirroring this one with a different cause, the
    /// usual shape of activation confirmations and terminations.
    pub fn mirror(&self, cause: Cause) -> Self {
        self.reply(cause, self.header.common_addr)
    }
}

impl std::fmt::Display for Asdu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} VSQ<n={},sq={}> payload={}B",
            self.header,
            self.header.vsq.number,
            self.header.vsq.is_sequence as u8,
            self.info_obj.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cause;

    #[test]
    fn test_vsq_bits() {
        let vsq = Vsq::new(10, false);
        assert_eq!(vsq.as_u8(), 0x0a);
        let vsq = Vsq::new(10, true);
        assert_eq!(vsq.as_u8(), 0x8a);
        let vsq = Vsq::from_u8(0x8a);
        assert_eq!(vsq.number, 10);
        assert!(vsq.is_sequence);
        assert_eq!(Vsq::single().as_u8(), 0x01);
    }

    #[test]
    fn test_decode_narrow_single_point() {
        // single point, n=1, spontaneous, CA 1, IOA 1, value on
        let raw = [0x01, 0x01, 0x03, 0x01, 0x01, 0x01];
        let asdu = Asdu::decode(Params::narrow(), &raw).unwrap();
        assert_eq!(asdu.header.type_id, TypeId::SinglePoint);
        assert_eq!(asdu.header.vsq.number, 1);
        assert!(!asdu.header.vsq.is_sequence);
        assert_eq!(asdu.header.cot.cause, Cause::Spontaneous);
        assert_eq!(asdu.header.common_addr, 1);
        assert_eq!(asdu.header.orig_addr, 0);
        assert_eq!(&asdu.info_obj[..], &[0x01, 0x01]);
        assert_eq!(&asdu.encode().unwrap()[..], &raw);
    }

    #[test]
    fn test_decode_wide_interrogation() {
        // C_IC_NA_1, activation, CA 0x1234, IOA 0, QOI station
        let raw = [0x64, 0x01, 0x06, 0x00, 0x34, 0x12, 0x00, 0x00, 0x00, 0x14];
        let asdu = Asdu::decode(Params::wide(), &raw).unwrap();
        assert_eq!(asdu.header.type_id, TypeId::InterrogationCommand);
        assert_eq!(asdu.header.cot.cause, Cause::Activation);
        assert_eq!(asdu.header.common_addr, 0x1234);
        assert_eq!(&asdu.encode().unwrap()[..], &raw);
    }

    #[test]
    fn test_broadcast_alias_one_octet() {
        let raw = [0x64, 0x01, 0x06, 0xff, 0x00, 0x14];
        let asdu = Asdu::decode(Params::narrow(), &raw).unwrap();
        assert_eq!(asdu.header.common_addr, GLOBAL_COMMON_ADDR);
        // encoding the broadcast constant writes the 8-bit alias back
        assert_eq!(&asdu.encode().unwrap()[..], &raw);
    }

    #[test]
    fn test_encode_rejects_cause_zero() {
        let header = AsduHeader::new(
            TypeId::SinglePoint,
            Vsq::single(),
            Cot::new(Cause::Unused),
            1,
        );
        let asdu = Asdu::new(Params::wide(), header, Bytes::from_static(&[0, 0, 0, 1]));
        assert!(matches!(asdu.encode(), Err(Error::CauseZero)));
    }

    #[test]
    fn test_encode_rejects_common_addr_zero() {
        let header =
            AsduHeader::new(TypeId::SinglePoint, Vsq::single(), Cause::Spontaneous, 0);
        let asdu = Asdu::new(Params::wide(), header, Bytes::from_static(&[0, 0, 0, 1]));
        assert!(matches!(asdu.encode(), Err(Error::CommonAddrZero)));
    }

    #[test]
    fn test_encode_rejects_origin_with_narrow_cause() {
        let mut header =
            AsduHeader::new(TypeId::SinglePoint, Vsq::single(), Cause::Spontaneous, 1);
        header.orig_addr = 7;
        let asdu = Asdu::new(Params::narrow(), header, Bytes::from_static(&[1, 1]));
        assert!(matches!(asdu.encode(), Err(Error::OriginAddrNotFit)));
    }

    #[test]
    fn test_encode_rejects_oversized() {
        let header = AsduHeader::new(
            TypeId::Private(126),
            Vsq::new(1, false),
            Cause::Spontaneous,
            1,
        );
        let asdu = Asdu::new(Params::wide(), header, Bytes::from(vec![0u8; 250]));
        assert!(matches!(asdu.encode(), Err(Error::LengthOutOfRange)));
    }

    #[test]
    fn test_decode_truncated_header() {
        assert!(matches!(
            Asdu::decode(Params::wide(), &[0x01, 0x01, 0x03]),
            Err(Error::Truncated)
        ));
    }

    #[test]
    fn test_decode_truncated_payload() {
        // claims 2 objects but carries octets for one
        let raw = [0x01, 0x02, 0x03, 0x01, 0x01, 0x01];
        assert!(matches!(Asdu::decode(Params::narrow(), &raw), Err(Error::Truncated)));
    }

    #[test]
    fn test_decode_zero_count() {
        let raw = [0x01, 0x00, 0x03, 0x01];
        assert!(matches!(
            Asdu::decode(Params::narrow(), &raw),
            Err(Error::VariableCountOutOfRange)
        ));
    }

    #[test]
    fn test_decode_trims_surplus() {
        // one single point item plus two stray octets
        let raw = [0x01, 0x01, 0x03, 0x01, 0x01, 0x01, 0xaa, 0xbb];
        let asdu = Asdu::decode(Params::narrow(), &raw).unwrap();
        assert_eq!(&asdu.info_obj[..], &[0x01, 0x01]);
    }

    #[test]
    fn test_private_type_preserves_payload() {
        let raw = [0x7e, 0x01, 0x03, 0x01, 0xde, 0xad, 0xbe, 0xef];
        let asdu = Asdu::decode(Params::narrow(), &raw).unwrap();
        assert_eq!(asdu.header.type_id, TypeId::Private(0x7e));
        assert_eq!(&asdu.info_obj[..], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(&asdu.encode().unwrap()[..], &raw);
    }

    #[test]
    fn test_reply_and_mirror() {
        let raw = [0x64, 0x01, 0x06, 0x00, 0x34, 0x12, 0x00, 0x00, 0x00, 0x14];
        let asdu = Asdu::decode(Params::wide(), &raw).unwrap();

        let con = asdu.mirror(Cause::ActivationConfirm);
        assert_eq!(con.header.cot.cause, Cause::ActivationConfirm);
        assert_eq!(con.header.common_addr, 0x1234);
        assert_eq!(con.info_obj, asdu.info_obj);

        let redirected = asdu.reply(Cause::ActivationTermination, 0x0001);
        assert_eq!(redirected.header.common_addr, 0x0001);
        assert_eq!(redirected.header.cot.cause, Cause::ActivationTermination);
    }

    #[test]
    fn test_header_display() {
        let header =
            AsduHeader::new(TypeId::MeasuredFloat, Vsq::new(2, true), Cause::Spontaneous, 3);
        let s = header.to_string();
        assert!(s.contains("M_ME_NC_1"));
        assert!(s.contains("Spontaneous"));
        assert!(s.contains("@3"));
    }
}
