//! IEC 60870-5-104 cause of transmission.
//!
//! The cause octet packs the 6-bit cause value with the P/N and test bits.

use crate::error::{Error, Result};

/// Cause of transmission value, the low 6 bits of the cause octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cause {
    /// Not used (0); rejected on encode
    Unused = 0,
    /// Periodic, cyclic (1)
    Periodic = 1,
    /// Background scan (2)
    Background = 2,
    /// Spontaneous (3)
    Spontaneous = 3,
    /// Initialized (4)
    Initialized = 4,
    /// Request or requested (5)
    Request = 5,
    /// Activation (6)
    Activation = 6,
    /// Activation confirmation (7)
    ActivationConfirm = 7,
    /// Deactivation (8)
    Deactivation = 8,
    /// Deactivation confirmation (9)
    DeactivationConfirm = 9,
    /// Activation termination (10)
    ActivationTermination = 10,
    /// Return information caused by a remote command (11)
    ReturnRemote = 11,
    /// Return information caused by a local command (12)
    ReturnLocal = 12,
    /// File transfer (13)
    FileTransfer = 13,
    /// Interrogated by station interrogation (20)
    InterrogatedByStation = 20,
    /// Interrogated by group 1 interrogation (21)
    InterrogatedByGroup1 = 21,
    /// Interrogated by group 2 interrogation (22)
    InterrogatedByGroup2 = 22,
    /// Interrogated by group 3 interrogation (23)
    InterrogatedByGroup3 = 23,
    /// Interrogated by group 4 interrogation (24)
    InterrogatedByGroup4 = 24,
    /// Interrogated by group 5 interrogation (25)
    InterrogatedByGroup5 = 25,
    /// Interrogated by group 6 interrogation (26)
    InterrogatedByGroup6 = 26,
    /// Interrogated by group 7 interrogation (27)
    InterrogatedByGroup7 = 27,
    /// Interrogated by group 8 interrogation (28)
    InterrogatedByGroup8 = 28,
    /// Interrogated by group 9 interrogation (29)
    InterrogatedByGroup9 = 29,
    /// Interrogated by group 10 interrogation (30)
    InterrogatedByGroup10 = 30,
    /// Interrogated by group 11 interrogation (31)
    InterrogatedByGroup11 = 31,
    /// Interrogated by group 12 interrogation (32)
    InterrogatedByGroup12 = 32,
    /// Interrogated by group 13 interrogation (33)
    InterrogatedByGroup13 = 33,
    /// Interrogated by group 14 interrogation (34)
    InterrogatedByGroup14 = 34,
    /// Interrogated by group 15 interrogation (35)
    InterrogatedByGroup15 = 35,
    /// Interrogated by group 16 interrogation (36)
    InterrogatedByGroup16 = 36,
    /// Requested by general counter request (37)
    RequestedByGeneralCounter = 37,
    /// Requested by group 1 counter request (38)
    RequestedByGroup1Counter = 38,
    /// Requested by group 2 counter request (39)
    RequestedByGroup2Counter = 39,
    /// Requested by group 3 counter request (40)
    RequestedByGroup3Counter = 40,
    /// Requested by group 4 counter request (41)
    RequestedByGroup4Counter = 41,
    /// Unknown type identification (44)
    UnknownTypeId = 44,
    /// Unknown cause of transmission (45)
    UnknownCause = 45,
    /// Unknown common address of ASDU (46)
    UnknownCommonAddr = 46,
    /// Unknown information object address (47)
    UnknownInfoObjAddr = 47,
}

impl Cause {
    /// Decode a 6-bit cause value. Reserved values are rejected.
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::Unused,
            1 => Self::Periodic,
            2 => Self::Background,
            3 => Self::Spontaneous,
            4 => Self::Initialized,
            5 => Self::Request,
            6 => Self::Activation,
            7 => Self::ActivationConfirm,
            8 => Self::Deactivation,
            9 => Self::DeactivationConfirm,
            10 => Self::ActivationTermination,
            11 => Self::ReturnRemote,
            12 => Self::ReturnLocal,
            13 => Self::FileTransfer,
            20 => Self::InterrogatedByStation,
            21 => Self::InterrogatedByGroup1,
            22 => Self::InterrogatedByGroup2,
            23 => Self::InterrogatedByGroup3,
            24 => Self::InterrogatedByGroup4,
            25 => Self::InterrogatedByGroup5,
            26 => Self::InterrogatedByGroup6,
            27 => Self::InterrogatedByGroup7,
            28 => Self::InterrogatedByGroup8,
            29 => Self::InterrogatedByGroup9,
            30 => Self::InterrogatedByGroup10,
            31 => Self::InterrogatedByGroup11,
            32 => Self::InterrogatedByGroup12,
            33 => Self::InterrogatedByGroup13,
            34 => Self::InterrogatedByGroup14,
            35 => Self::InterrogatedByGroup15,
            36 => Self::InterrogatedByGroup16,
            37 => Self::RequestedByGeneralCounter,
            38 => Self::RequestedByGroup1Counter,
            39 => Self::RequestedByGroup2Counter,
            40 => Self::RequestedByGroup3Counter,
            41 => Self::RequestedByGroup4Counter,
            44 => Self::UnknownTypeId,
            45 => Self::UnknownCause,
            46 => Self::UnknownCommonAddr,
            47 => Self::UnknownInfoObjAddr,
            other => return Err(Error::UnknownCause(other)),
        })
    }

    /// Raw 6-bit cause value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the cause is an interrogation response (groups included).
    #[inline]
    pub fn is_interrogation_response(self) -> bool {
        matches!(self.as_u8(), 20..=36)
    }
}

impl std::fmt::Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unused => "Unused",
            Self::Periodic => "Periodic",
            Self::Background => "Background",
            Self::Spontaneous => "Spontaneous",
            Self::Initialized => "Initialized",
            Self::Request => "Request",
            Self::Activation => "Activation",
            Self::ActivationConfirm => "ActivationConfirm",
            Self::Deactivation => "Deactivation",
            Self::DeactivationConfirm => "DeactivationConfirm",
            Self::ActivationTermination => "ActivationTermination",
            Self::ReturnRemote => "ReturnRemote",
            Self::ReturnLocal => "ReturnLocal",
            Self::FileTransfer => "FileTransfer",
            Self::InterrogatedByStation => "InterrogatedByStation",
            Self::RequestedByGeneralCounter => "RequestedByGeneralCounter",
            Self::UnknownTypeId => "UnknownTypeId",
            Self::UnknownCause => "UnknownCause",
            Self::UnknownCommonAddr => "UnknownCommonAddr",
            Self::UnknownInfoObjAddr => "UnknownInfoObjAddr",
            other if other.is_interrogation_response() => {
                return write!(f, "InterrogatedByGroup{}", other.as_u8() - 20)
            }
            other => return write!(f, "RequestedByGroup{}Counter", other.as_u8() - 37),
        };
        f.write_str(name)
    }
}

/// Cause of transmission octet: 6-bit cause plus P/N and test flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cot {
    /// Cause value (bits 0..5)
    pub cause: Cause,
    /// Negative confirmation (bit 6)
    pub is_negative: bool,
    /// Test flag (bit 7)
    pub is_test: bool,
}

impl Cot {
    /// Positive, non-test cause of transmission.
    #[inline]
    pub const fn new(cause: Cause) -> Self {
        Self { cause, is_negative: false, is_test: false }
    }

    /// Decode the cause octet.
    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(Self {
            cause: Cause::from_u8(value & 0x3f)?,
            is_negative: value & 0x40 != 0,
            is_test: value & 0x80 != 0,
        })
    }

    /// Encode to the cause octet.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self.cause.as_u8()
            | if self.is_negative { 0x40 } else { 0 }
            | if self.is_test { 0x80 } else { 0 }
    }

    /// Same cause with the negative flag set.
    #[inline]
    pub const fn negative(mut self) -> Self {
        self.is_negative = true;
        self
    }
}

impl From<Cause> for Cot {
    fn from(cause: Cause) -> Self {
        Self::new(cause)
    }
}

impl std::fmt::Display for Cot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cause)?;
        if self.is_negative {
            f.write_str(",neg")?;
        }
        if self.is_test {
            f.write_str(",test")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cause_roundtrip() {
        for v in (0..=13).chain(20..=41).chain(44..=47) {
            let c = Cause::from_u8(v).unwrap();
            assert_eq!(c.as_u8(), v, "roundtrip failed for cause {v}");
        }
    }

    #[test]
    fn test_reserved_causes_rejected() {
        for v in [14, 15, 16, 17, 18, 19, 42, 43, 48, 63] {
            assert!(matches!(Cause::from_u8(v), Err(Error::UnknownCause(x)) if x == v));
        }
    }

    #[test]
    fn test_cot_bit_packing() {
        let cot = Cot::from_u8(0x06).unwrap();
        assert_eq!(cot.cause, Cause::Activation);
        assert!(!cot.is_negative);
        assert!(!cot.is_test);

        let cot = Cot::from_u8(0x47).unwrap();
        assert_eq!(cot.cause, Cause::ActivationConfirm);
        assert!(cot.is_negative);
        assert!(!cot.is_test);

        let cot = Cot::from_u8(0x83).unwrap();
        assert_eq!(cot.cause, Cause::Spontaneous);
        assert!(!cot.is_negative);
        assert!(cot.is_test);

        assert_eq!(Cot::from_u8(0xC6).unwrap().as_u8(), 0xC6);
    }

    #[test]
    fn test_negative_builder() {
        let cot = Cot::new(Cause::Activation).negative();
        assert!(cot.is_negative);
        assert_eq!(cot.as_u8(), 0x46);
    }

    #[test]
    fn test_interrogation_response_range() {
        assert!(Cause::InterrogatedByStation.is_interrogation_response());
        assert!(Cause::InterrogatedByGroup16.is_interrogation_response());
        assert!(!Cause::Spontaneous.is_interrogation_response());
        assert!(!Cause::RequestedByGeneralCounter.is_interrogation_response());
    }

    #[test]
    fn test_display() {
        assert_eq!(Cause::Spontaneous.to_string(), "Spontaneous");
        assert_eq!(Cause::InterrogatedByGroup7.to_string(), "InterrogatedByGroup7");
        assert_eq!(Cause::RequestedByGroup2Counter.to_string(), "RequestedByGroup2Counter");
        assert_eq!(Cot::new(Cause::Activation).to_string(), "Activation");
        assert_eq!(Cot::new(Cause::Activation).negative().to_string(), "Activation,neg");
    }
}
