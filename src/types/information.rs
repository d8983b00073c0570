//! Information elements and qualifier octets.
//!
//! These are the per-item building blocks referenced by the payload parser
//! and encoder; bit layouts follow companion standard 101, subclass 7.2.6.

/// Information object address. The wire width (1, 2 or 3 octets) is
/// selected by [`crate::Params::info_obj_addr_size`].
pub type InfoObjAddr = u32;

/// Zero means the information object address is irrelevant.
pub const INFO_OBJ_ADDR_IRRELEVANT: InfoObjAddr = 0;

/// Station (common) address. The wire width is selected by
/// [`crate::Params::common_addr_size`].
pub type CommonAddr = u16;

/// Broadcast station address. In 1-octet mode this is the alias for the
/// wire value 255.
pub const GLOBAL_COMMON_ADDR: CommonAddr = 65_535;

/// Common address 0 means "unused" and is rejected on encode.
pub const INVALID_COMMON_ADDR: CommonAddr = 0;

/// Originator address, carried when the cause size is two octets.
pub type OriginAddr = u8;

/// Fixed test bit pattern carried by test commands (subclass 7.2.6.14).
pub const FBP_TEST_WORD: u16 = 0x55aa;

/// Double-point information value (subclass 7.2.6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DoublePointValue {
    /// Indeterminate or intermediate state (00)
    Indeterminate = 0,
    /// Determined OFF (01)
    Off = 1,
    /// Determined ON (10)
    On = 2,
    /// Indeterminate state (11)
    IndeterminateOrFaulty = 3,
}

impl DoublePointValue {
    /// Decode from the low two bits.
    pub const fn from_u8(value: u8) -> Self {
        match value & 0x03 {
            1 => Self::Off,
            2 => Self::On,
            3 => Self::IndeterminateOrFaulty,
            _ => Self::Indeterminate,
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Quality descriptor flags (QDS, subclass 7.2.6.3).
///
/// Single and double point octets carry the same four high flags; measured
/// values additionally use the overflow bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QualityDescriptor {
    /// Overflow (OV, bit 0): value beyond a predefined range
    pub overflow: bool,
    /// Blocked (BL, bit 4): value blocked for transmission
    pub blocked: bool,
    /// Substituted (SB, bit 5): value entered by an operator
    pub substituted: bool,
    /// Not topical (NT, bit 6): most recent update unsuccessful
    pub not_topical: bool,
    /// Invalid (IV, bit 7): value incorrectly acquired
    pub invalid: bool,
}

impl QualityDescriptor {
    /// No flags, no problems.
    pub const GOOD: Self = Self {
        overflow: false,
        blocked: false,
        substituted: false,
        not_topical: false,
        invalid: false,
    };

    /// Decode from a quality octet. Callers mask value bits beforehand.
    pub const fn from_u8(value: u8) -> Self {
        Self {
            overflow: value & 0x01 != 0,
            blocked: value & 0x10 != 0,
            substituted: value & 0x20 != 0,
            not_topical: value & 0x40 != 0,
            invalid: value & 0x80 != 0,
        }
    }

    /// Encode to the quality bits.
    pub const fn as_u8(self) -> u8 {
        (self.overflow as u8)
            | (self.blocked as u8) << 4
            | (self.substituted as u8) << 5
            | (self.not_topical as u8) << 6
            | (self.invalid as u8) << 7
    }

    /// Whether every flag is clear.
    #[inline]
    pub const fn is_good(self) -> bool {
        !(self.overflow || self.blocked || self.substituted || self.not_topical || self.invalid)
    }
}

impl std::fmt::Display for QualityDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_good() {
            return f.write_str("Good");
        }
        let mut sep = "";
        for (set, name) in [
            (self.overflow, "OV"),
            (self.blocked, "BL"),
            (self.substituted, "SB"),
            (self.not_topical, "NT"),
            (self.invalid, "IV"),
        ] {
            if set {
                write!(f, "{sep}{name}")?;
                sep = "|";
            }
        }
        Ok(())
    }
}

/// Quality descriptor for protection equipment (QDP, subclass 7.2.6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProtectionQuality {
    /// Elapsed time invalid (EI, bit 3)
    pub elapsed_time_invalid: bool,
    /// Blocked (BL, bit 4)
    pub blocked: bool,
    /// Substituted (SB, bit 5)
    pub substituted: bool,
    /// Not topical (NT, bit 6)
    pub not_topical: bool,
    /// Invalid (IV, bit 7)
    pub invalid: bool,
}

impl ProtectionQuality {
    /// No flags, no problems.
    pub const GOOD: Self = Self {
        elapsed_time_invalid: false,
        blocked: false,
        substituted: false,
        not_topical: false,
        invalid: false,
    };

    /// Decode from bits 3..7 of a QDP octet.
    pub const fn from_u8(value: u8) -> Self {
        Self {
            elapsed_time_invalid: value & 0x08 != 0,
            blocked: value & 0x10 != 0,
            substituted: value & 0x20 != 0,
            not_topical: value & 0x40 != 0,
            invalid: value & 0x80 != 0,
        }
    }

    /// Encode to bits 3..7.
    pub const fn as_u8(self) -> u8 {
        (self.elapsed_time_invalid as u8) << 3
            | (self.blocked as u8) << 4
            | (self.substituted as u8) << 5
            | (self.not_topical as u8) << 6
            | (self.invalid as u8) << 7
    }
}

/// Step position with transient indication (VTI, subclass 7.2.6.5).
///
/// The value is a 7-bit two's complement number in [-64, 63]; bit 7 flags
/// a device in transient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPositionValue {
    pub value: i8,
    pub transient: bool,
}

impl StepPositionValue {
    /// Decode, sign-extending bit 6 into the value.
    pub const fn from_u8(b: u8) -> Self {
        Self {
            value: ((b & 0x7f) << 1) as i8 >> 1,
            transient: b & 0x80 != 0,
        }
    }

    /// Encode to the VTI octet.
    pub const fn as_u8(self) -> u8 {
        (self.value as u8 & 0x7f) | if self.transient { 0x80 } else { 0 }
    }
}

/// Normalized measured value: an i16 interpreted as `value / 32768`,
/// covering [-1, 1 - 2^-15] (subclass 7.2.6.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Normalized(pub i16);

impl Normalized {
    /// The represented fraction in [-1, 1 - 2^-15].
    #[inline]
    pub fn as_f32(self) -> f32 {
        f32::from(self.0) / 32_768.0
    }

    /// Build from a fraction, saturating outside [-1, 1 - 2^-15].
    pub fn from_f32(value: f32) -> Self {
        Self((value * 32_768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
    }
}

/// Binary counter reading (BCR, subclass 7.2.6.9): a 32-bit counter plus a
/// flag octet with a 5-bit sequence number and carry/adjusted/invalid bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BinaryCounterReading {
    pub value: i32,
    /// Sequence notation, bits 0..4 of the flag octet
    pub sequence: u8,
    /// Carry (CY, bit 5)
    pub has_carry: bool,
    /// Counter was adjusted (CA, bit 6)
    pub is_adjusted: bool,
    /// Invalid (IV, bit 7)
    pub is_invalid: bool,
}

impl BinaryCounterReading {
    /// Decode the flag octet that follows the counter value.
    pub const fn flags_from_u8(value: i32, flags: u8) -> Self {
        Self {
            value,
            sequence: flags & 0x1f,
            has_carry: flags & 0x20 != 0,
            is_adjusted: flags & 0x40 != 0,
            is_invalid: flags & 0x80 != 0,
        }
    }

    /// Encode the flag octet.
    pub const fn flags_as_u8(self) -> u8 {
        (self.sequence & 0x1f)
            | if self.has_carry { 0x20 } else { 0 }
            | if self.is_adjusted { 0x40 } else { 0 }
            | if self.is_invalid { 0x80 } else { 0 }
    }
}

/// Single event of protection equipment (subclass 7.2.6.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SingleEvent {
    /// Indeterminate or intermediate state (00)
    Indeterminate = 0,
    /// Determined OFF (01)
    Off = 1,
    /// Determined ON (10)
    On = 2,
    /// Indeterminate state (11)
    IndeterminateOrFaulty = 3,
}

impl SingleEvent {
    pub const fn from_u8(value: u8) -> Self {
        match value & 0x03 {
            1 => Self::Off,
            2 => Self::On,
            3 => Self::IndeterminateOrFaulty,
            _ => Self::Indeterminate,
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Start events of protection equipment, a bitset (subclass 7.2.6.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StartEvents(pub u8);

impl StartEvents {
    /// General start of operation
    pub const GENERAL: u8 = 0x01;
    /// Start of operation phase L1
    pub const L1: u8 = 0x02;
    /// Start of operation phase L2
    pub const L2: u8 = 0x04;
    /// Start of operation phase L3
    pub const L3: u8 = 0x08;
    /// Start of operation earth current
    pub const EARTH_CURRENT: u8 = 0x10;
    /// Start of operation in reverse direction
    pub const REVERSE: u8 = 0x20;

    #[inline]
    pub const fn contains(self, mask: u8) -> bool {
        self.0 & mask != 0
    }
}

/// Output circuit information of protection equipment, a bitset
/// (subclass 7.2.6.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputCircuits(pub u8);

impl OutputCircuits {
    /// General command output
    pub const GENERAL: u8 = 0x01;
    /// Command output to phase L1
    pub const L1: u8 = 0x02;
    /// Command output to phase L2
    pub const L2: u8 = 0x04;
    /// Command output to phase L3
    pub const L3: u8 = 0x08;

    #[inline]
    pub const fn contains(self, mask: u8) -> bool {
        self.0 & mask != 0
    }
}

/// Status and status change detection (SCD, subclass 7.2.6.40): 16 status
/// bits plus 16 change-detection bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusChangeDetection(pub u32);

impl StatusChangeDetection {
    /// The sixteen status bits.
    #[inline]
    pub const fn status(self) -> u16 {
        self.0 as u16
    }

    /// The sixteen change-detection bits.
    #[inline]
    pub const fn changed(self) -> u16 {
        (self.0 >> 16) as u16
    }
}

/// Cause of initialization (COI, subclass 7.2.6.21).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CauseOfInitial {
    /// 0 local power on, 1 local manual reset, 2 remote reset,
    /// 3..127 reserved
    pub cause: u8,
    /// Initialization after local parameter change
    pub is_local_change: bool,
}

/// Local power switched on.
pub const COI_LOCAL_POWER_ON: u8 = 0;
/// Local manual reset.
pub const COI_LOCAL_HAND_RESET: u8 = 1;
/// Remote reset.
pub const COI_REMOTE_RESET: u8 = 2;

impl CauseOfInitial {
    pub const fn from_u8(b: u8) -> Self {
        Self { cause: b & 0x7f, is_local_change: b & 0x80 != 0 }
    }

    pub const fn as_u8(self) -> u8 {
        (self.cause & 0x7f) | if self.is_local_change { 0x80 } else { 0 }
    }
}

/// Station interrogation (QOI value 20, subclass 7.2.6.22).
pub const QOI_STATION: u8 = 20;
/// Group 1 interrogation; groups 2..16 follow consecutively.
pub const QOI_GROUP1: u8 = 21;

/// Counter freeze behaviour, bits 6..7 of the QCC octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CounterFreeze {
    /// Read only, no freeze or reset (00)
    Read = 0x00,
    /// Freeze without reset (01)
    FreezeNoReset = 0x40,
    /// Freeze with reset (10)
    FreezeReset = 0x80,
    /// Counter reset (11)
    Reset = 0xc0,
}

/// General counter request (QCC request value 5).
pub const QCC_TOTAL: u8 = 5;

/// Qualifier of counter interrogation command (QCC, subclass 7.2.6.23).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualifierCountCall {
    /// Request group, bits 0..5 (1..4 group, 5 general)
    pub request: u8,
    /// Freeze behaviour, bits 6..7
    pub freeze: CounterFreeze,
}

impl QualifierCountCall {
    pub const fn from_u8(b: u8) -> Self {
        let freeze = match b & 0xc0 {
            0x40 => CounterFreeze::FreezeNoReset,
            0x80 => CounterFreeze::FreezeReset,
            0xc0 => CounterFreeze::Reset,
            _ => CounterFreeze::Read,
        };
        Self { request: b & 0x3f, freeze }
    }

    pub const fn as_u8(self) -> u8 {
        (self.request & 0x3f) | self.freeze as u8
    }
}

/// Qualifier of parameter of measured values (QPM, subclass 7.2.6.24).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualifierOfParameter {
    /// Parameter category, bits 0..5: 1 threshold, 2 smoothing factor,
    /// 3 low limit, 4 high limit
    pub category: u8,
    /// Local parameter change (bit 6)
    pub is_change: bool,
    /// Parameter not in operation (bit 7)
    pub not_in_operation: bool,
}

/// Threshold value parameter category.
pub const QPM_THRESHOLD: u8 = 1;
/// Smoothing factor (filter time constant) parameter category.
pub const QPM_SMOOTHING: u8 = 2;
/// Low limit for transmission of measured values.
pub const QPM_LOW_LIMIT: u8 = 3;
/// High limit for transmission of measured values.
pub const QPM_HIGH_LIMIT: u8 = 4;

impl QualifierOfParameter {
    pub const fn from_u8(b: u8) -> Self {
        Self {
            category: b & 0x3f,
            is_change: b & 0x40 != 0,
            not_in_operation: b & 0x80 != 0,
        }
    }

    pub const fn as_u8(self) -> u8 {
        (self.category & 0x3f)
            | if self.is_change { 0x40 } else { 0 }
            | if self.not_in_operation { 0x80 } else { 0 }
    }
}

/// Qualifier of parameter activation (QPA, subclass 7.2.6.25): 1 activates
/// previously loaded parameters, 2 the addressed object's parameters,
/// 3 the addressed object's cyclic transmission.
pub const QPA_PREVIOUSLY_LOADED: u8 = 1;
pub const QPA_OBJECT_PARAMETER: u8 = 2;
pub const QPA_OBJECT_TRANSMISSION: u8 = 3;

/// Qualifier of command (QOC, subclass 7.2.6.26): a 5-bit qualifier in
/// bits 2..6 plus the select/execute bit 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QualifierOfCommand {
    /// 0 none, 1 short pulse, 2 long pulse, 3 persistent output
    pub qualifier: u8,
    /// true selects, false executes
    pub select: bool,
}

/// Short pulse duration command qualifier.
pub const QOC_SHORT_PULSE: u8 = 1;
/// Long pulse duration command qualifier.
pub const QOC_LONG_PULSE: u8 = 2;
/// Persistent output command qualifier.
pub const QOC_PERSISTENT: u8 = 3;

impl QualifierOfCommand {
    /// Decode from a command octet; the caller masks the value bits.
    pub const fn from_u8(b: u8) -> Self {
        Self { qualifier: (b >> 2) & 0x1f, select: b & 0x80 != 0 }
    }

    /// Encode to the qualifier bits (value bits left clear).
    pub const fn as_u8(self) -> u8 {
        (self.qualifier & 0x1f) << 2 | if self.select { 0x80 } else { 0 }
    }
}

/// Qualifier of set-point command (QOS, subclass 7.2.6.39): a 7-bit
/// qualifier plus the select/execute bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QualifierOfSetpoint {
    pub qualifier: u8,
    /// true selects, false executes
    pub select: bool,
}

impl QualifierOfSetpoint {
    pub const fn from_u8(b: u8) -> Self {
        Self { qualifier: b & 0x7f, select: b & 0x80 != 0 }
    }

    pub const fn as_u8(self) -> u8 {
        (self.qualifier & 0x7f) | if self.select { 0x80 } else { 0 }
    }
}

/// Qualifier of reset process command (QRP, subclass 7.2.6.27).
pub const QRP_GENERAL: u8 = 1;
/// Reset time-tagged information pending in the event buffer.
pub const QRP_PENDING_INFO: u8 = 2;

/// Double command states (subclass 7.2.6.16). Values 0 and 3 are not
/// permitted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DoubleCommandValue {
    NotPermitted0 = 0,
    On = 1,
    Off = 2,
    NotPermitted3 = 3,
}

impl DoubleCommandValue {
    pub const fn from_u8(value: u8) -> Self {
        match value & 0x03 {
            1 => Self::On,
            2 => Self::Off,
            3 => Self::NotPermitted3,
            _ => Self::NotPermitted0,
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Regulating step command states (subclass 7.2.6.17). Values 0 and 3 are
/// not permitted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StepCommandValue {
    NotPermitted0 = 0,
    StepDown = 1,
    StepUp = 2,
    NotPermitted3 = 3,
}

impl StepCommandValue {
    pub const fn from_u8(value: u8) -> Self {
        match value & 0x03 {
            1 => Self::StepDown,
            2 => Self::StepUp,
            3 => Self::NotPermitted3,
            _ => Self::NotPermitted0,
        }
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_descriptor_bits() {
        let q = QualityDescriptor::from_u8(0x90);
        assert!(q.blocked);
        assert!(q.invalid);
        assert!(!q.overflow);
        assert_eq!(q.as_u8(), 0x90);

        let q = QualityDescriptor::from_u8(0x01);
        assert!(q.overflow);
        assert!(!q.is_good());

        assert!(QualityDescriptor::GOOD.is_good());
        assert_eq!(QualityDescriptor::GOOD.as_u8(), 0);
    }

    #[test]
    fn test_quality_display() {
        assert_eq!(QualityDescriptor::GOOD.to_string(), "Good");
        let q = QualityDescriptor { overflow: true, invalid: true, ..Default::default() };
        assert_eq!(q.to_string(), "OV|IV");
    }

    #[test]
    fn test_protection_quality_bits() {
        let q = ProtectionQuality::from_u8(0x88);
        assert!(q.elapsed_time_invalid);
        assert!(q.invalid);
        assert_eq!(q.as_u8(), 0x88);
        assert_eq!(ProtectionQuality::GOOD.as_u8(), 0);
    }

    #[test]
    fn test_step_position_sign_extension() {
        assert_eq!(StepPositionValue::from_u8(0x00).value, 0);
        assert_eq!(StepPositionValue::from_u8(0x3f).value, 63);
        assert_eq!(StepPositionValue::from_u8(0x40).value, -64);
        assert_eq!(StepPositionValue::from_u8(0x7f).value, -1);

        let s = StepPositionValue::from_u8(0xc1);
        assert_eq!(s.value, -63);
        assert!(s.transient);
        assert_eq!(s.as_u8(), 0xc1);

        for raw in 0u8..=255 {
            let s = StepPositionValue::from_u8(raw);
            assert!((-64..=63).contains(&(s.value as i32)));
            assert_eq!(s.as_u8(), raw);
        }
    }

    #[test]
    fn test_normalized_value() {
        assert!((Normalized(16_384).as_f32() - 0.5).abs() < 1e-6);
        assert!((Normalized(i16::MIN).as_f32() + 1.0).abs() < 1e-6);
        assert_eq!(Normalized::from_f32(0.5).0, 16_384);
        assert_eq!(Normalized::from_f32(-2.0).0, i16::MIN);
        assert_eq!(Normalized::from_f32(2.0).0, i16::MAX);
    }

    #[test]
    fn test_binary_counter_flags() {
        let bcr = BinaryCounterReading::flags_from_u8(123_456, 0xe5);
        assert_eq!(bcr.value, 123_456);
        assert_eq!(bcr.sequence, 5);
        assert!(bcr.has_carry);
        assert!(bcr.is_adjusted);
        assert!(bcr.is_invalid);
        assert_eq!(bcr.flags_as_u8(), 0xe5);
    }

    #[test]
    fn test_double_point_and_events() {
        assert_eq!(DoublePointValue::from_u8(0x02), DoublePointValue::On);
        assert_eq!(DoublePointValue::from_u8(0xf1), DoublePointValue::Off);
        assert_eq!(SingleEvent::from_u8(2), SingleEvent::On);
        assert_eq!(DoubleCommandValue::from_u8(1), DoubleCommandValue::On);
        assert_eq!(StepCommandValue::from_u8(2), StepCommandValue::StepUp);
    }

    #[test]
    fn test_start_events_and_output_circuits() {
        let se = StartEvents(StartEvents::GENERAL | StartEvents::L2);
        assert!(se.contains(StartEvents::GENERAL));
        assert!(se.contains(StartEvents::L2));
        assert!(!se.contains(StartEvents::EARTH_CURRENT));

        let oci = OutputCircuits(OutputCircuits::GENERAL);
        assert!(oci.contains(OutputCircuits::GENERAL));
        assert!(!oci.contains(OutputCircuits::L3));
    }

    #[test]
    fn test_scd_halves() {
        let scd = StatusChangeDetection(0xFFFF_0001);
        assert_eq!(scd.status(), 0x0001);
        assert_eq!(scd.changed(), 0xFFFF);
    }

    #[test]
    fn test_cause_of_initial() {
        let coi = CauseOfInitial::from_u8(0x82);
        assert_eq!(coi.cause, COI_REMOTE_RESET);
        assert!(coi.is_local_change);
        assert_eq!(coi.as_u8(), 0x82);
    }

    #[test]
    fn test_qualifier_count_call() {
        let qcc = QualifierCountCall::from_u8(0x45);
        assert_eq!(qcc.request, QCC_TOTAL);
        assert_eq!(qcc.freeze, CounterFreeze::FreezeNoReset);
        assert_eq!(qcc.as_u8(), 0x45);

        let qcc = QualifierCountCall { request: 1, freeze: CounterFreeze::Reset };
        assert_eq!(qcc.as_u8(), 0xc1);
    }

    #[test]
    fn test_qualifier_of_command() {
        let qoc = QualifierOfCommand::from_u8(0x84);
        assert_eq!(qoc.qualifier, QOC_SHORT_PULSE);
        assert!(qoc.select);
        assert_eq!(qoc.as_u8(), 0x84);

        // value bits must not leak into the encoded qualifier
        let qoc = QualifierOfCommand::from_u8(0x07);
        assert_eq!(qoc.qualifier, 1);
        assert_eq!(qoc.as_u8(), 0x04);
    }

    #[test]
    fn test_qualifier_of_setpoint() {
        let qos = QualifierOfSetpoint::from_u8(0x81);
        assert_eq!(qos.qualifier, 1);
        assert!(qos.select);
        assert_eq!(qos.as_u8(), 0x81);
        assert_eq!(QualifierOfSetpoint::default().as_u8(), 0);
    }

    #[test]
    fn test_qualifier_of_parameter() {
        let qpm = QualifierOfParameter::from_u8(0x41);
        assert_eq!(qpm.category, QPM_THRESHOLD);
        assert!(qpm.is_change);
        assert!(!qpm.not_in_operation);
        assert_eq!(qpm.as_u8(), 0x41);
    }
}
