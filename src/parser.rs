//! Non-destructive ASDU payload parser.
//!
//! [`parse_asdu`] lifts a raw [`Asdu`] into a typed [`Message`] by reading
//! the information object octets through a cursor; the source buffer is
//! never mutated, so parsing the same ASDU twice yields equal messages and
//! a byte-identical buffer. [`crate::encode_message`] is the exact inverse
//! for every supported type identification.

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};

use crate::config::Params;
use crate::error::{Error, Result};
use crate::types::{
    decode_cp24time2a, decode_cp56time2a, Asdu, AsduHeader,
    BinaryCounterReading, CauseOfInitial, DoubleCommandValue, DoublePointValue, InfoObjAddr,
    Normalized, OutputCircuits, ProtectionQuality, QualifierCountCall, QualifierOfCommand,
    QualifierOfParameter, QualifierOfSetpoint, QualityDescriptor, SingleEvent, StartEvents,
    StatusChangeDetection, StepCommandValue, StepPositionValue, TimeTag, TypeId, Vsq,
    FBP_TEST_WORD,
};

/// A single-point item (subclass 7.3.1.1/2/22).
#[derive(Debug, Clone, PartialEq)]
pub struct SinglePointInfo {
    pub ioa: InfoObjAddr,
    pub value: bool,
    pub qds: QualityDescriptor,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A double-point item.
#[derive(Debug, Clone, PartialEq)]
pub struct DoublePointInfo {
    pub ioa: InfoObjAddr,
    pub value: DoublePointValue,
    pub qds: QualityDescriptor,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A step position item.
#[derive(Debug, Clone, PartialEq)]
pub struct StepPositionInfo {
    pub ioa: InfoObjAddr,
    pub value: StepPositionValue,
    pub qds: QualityDescriptor,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A 32-bit bitstring item.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitstring32Info {
    pub ioa: InfoObjAddr,
    pub value: u32,
    pub qds: QualityDescriptor,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A normalized measured value item.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredNormalizedInfo {
    pub ioa: InfoObjAddr,
    pub value: Normalized,
    /// Good for the quality-less M_ME_ND_1 layout
    pub qds: QualityDescriptor,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A scaled measured value item.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredScaledInfo {
    pub ioa: InfoObjAddr,
    pub value: i16,
    pub qds: QualityDescriptor,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A short floating point measured value item.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredFloatInfo {
    pub ioa: InfoObjAddr,
    pub value: f32,
    pub qds: QualityDescriptor,
    pub time: Option<DateTime<FixedOffset>>,
}

/// An integrated totals (counter) item.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegratedTotalsInfo {
    pub ioa: InfoObjAddr,
    pub value: BinaryCounterReading,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A protection equipment event item.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectionEventInfo {
    pub ioa: InfoObjAddr,
    pub event: SingleEvent,
    pub qdp: ProtectionQuality,
    /// Relay operating time in milliseconds
    pub msec: u16,
    pub time: Option<DateTime<FixedOffset>>,
}

/// Packed start events of protection equipment.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedStartEventsInfo {
    pub ioa: InfoObjAddr,
    pub events: StartEvents,
    pub qdp: ProtectionQuality,
    /// Relay duration time in milliseconds
    pub msec: u16,
    pub time: Option<DateTime<FixedOffset>>,
}

/// Packed output circuit information of protection equipment.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedOutputCircuitInfo {
    pub ioa: InfoObjAddr,
    pub circuits: OutputCircuits,
    pub qdp: ProtectionQuality,
    /// Relay operating time in milliseconds
    pub msec: u16,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A packed single-point item with status change detection.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedSinglePointScdInfo {
    pub ioa: InfoObjAddr,
    pub scd: StatusChangeDetection,
    pub qds: QualityDescriptor,
}

/// A single command.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleCommandInfo {
    pub ioa: InfoObjAddr,
    pub value: bool,
    pub qoc: QualifierOfCommand,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A double command.
#[derive(Debug, Clone, PartialEq)]
pub struct DoubleCommandInfo {
    pub ioa: InfoObjAddr,
    pub value: DoubleCommandValue,
    pub qoc: QualifierOfCommand,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A regulating step command.
#[derive(Debug, Clone, PartialEq)]
pub struct StepCommandInfo {
    pub ioa: InfoObjAddr,
    pub value: StepCommandValue,
    pub qoc: QualifierOfCommand,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A normalized set-point command.
#[derive(Debug, Clone, PartialEq)]
pub struct SetpointNormalizedInfo {
    pub ioa: InfoObjAddr,
    pub value: Normalized,
    pub qos: QualifierOfSetpoint,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A scaled set-point command.
#[derive(Debug, Clone, PartialEq)]
pub struct SetpointScaledInfo {
    pub ioa: InfoObjAddr,
    pub value: i16,
    pub qos: QualifierOfSetpoint,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A short floating point set-point command.
#[derive(Debug, Clone, PartialEq)]
pub struct SetpointFloatInfo {
    pub ioa: InfoObjAddr,
    pub value: f32,
    pub qos: QualifierOfSetpoint,
    pub time: Option<DateTime<FixedOffset>>,
}

/// A 32-bit bitstring command.
#[derive(Debug, Clone, PartialEq)]
pub struct BitstringCommandInfo {
    pub ioa: InfoObjAddr,
    pub value: u32,
    pub time: Option<DateTime<FixedOffset>>,
}

/// Typed ASDU payload, one variant per supported message family.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    SinglePoint(Vec<SinglePointInfo>),
    DoublePoint(Vec<DoublePointInfo>),
    StepPosition(Vec<StepPositionInfo>),
    Bitstring32(Vec<Bitstring32Info>),
    MeasuredNormalized(Vec<MeasuredNormalizedInfo>),
    MeasuredScaled(Vec<MeasuredScaledInfo>),
    MeasuredFloat(Vec<MeasuredFloatInfo>),
    IntegratedTotals(Vec<IntegratedTotalsInfo>),
    ProtectionEvent(Vec<ProtectionEventInfo>),
    PackedStartEvents(PackedStartEventsInfo),
    PackedOutputCircuit(PackedOutputCircuitInfo),
    PackedSinglePointScd(Vec<PackedSinglePointScdInfo>),
    EndOfInit {
        ioa: InfoObjAddr,
        coi: CauseOfInitial,
    },
    SingleCommand(SingleCommandInfo),
    DoubleCommand(DoubleCommandInfo),
    StepCommand(StepCommandInfo),
    SetpointNormalized(SetpointNormalizedInfo),
    SetpointScaled(SetpointScaledInfo),
    SetpointFloat(SetpointFloatInfo),
    BitstringCommand(BitstringCommandInfo),
    Interrogation {
        ioa: InfoObjAddr,
        /// Qualifier of interrogation, e.g. [`crate::types::QOI_STATION`]
        qoi: u8,
    },
    CounterInterrogation {
        ioa: InfoObjAddr,
        qcc: QualifierCountCall,
    },
    Read {
        ioa: InfoObjAddr,
    },
    ClockSync {
        ioa: InfoObjAddr,
        time: Option<DateTime<FixedOffset>>,
    },
    TestCommand {
        ioa: InfoObjAddr,
        /// Whether the fixed test word 0x55AA was present
        is_test_word: bool,
    },
    ResetProcess {
        ioa: InfoObjAddr,
        /// Qualifier of reset process, e.g. [`crate::types::QRP_GENERAL`]
        qrp: u8,
    },
    DelayAcquire {
        ioa: InfoObjAddr,
        msec: u16,
    },
    TestCommandCp56 {
        ioa: InfoObjAddr,
        is_test_word: bool,
        time: Option<DateTime<FixedOffset>>,
    },
    ParameterNormalized {
        ioa: InfoObjAddr,
        value: Normalized,
        qpm: QualifierOfParameter,
    },
    ParameterScaled {
        ioa: InfoObjAddr,
        value: i16,
        qpm: QualifierOfParameter,
    },
    ParameterFloat {
        ioa: InfoObjAddr,
        value: f32,
        qpm: QualifierOfParameter,
    },
    ParameterActivation {
        ioa: InfoObjAddr,
        /// Qualifier of parameter activation, e.g. [`crate::types::QPA_OBJECT_PARAMETER`]
        qpa: u8,
    },
    /// Unsupported or private type identification; the raw information
    /// object octets are preserved for forwarding or logging.
    Unknown(Bytes),
}

/// A parsed ASDU: the data unit identifier plus a typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: AsduHeader,
    pub payload: Payload,
}

impl Message {
    pub fn new(header: AsduHeader, payload: Payload) -> Self {
        Self { header, payload }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.header.type_id
    }
}

/// Read-only cursor over the information object octets.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    params: &'a Params,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], params: &'a Params) -> Self {
        Self { data, pos: 0, params }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() - self.pos < n {
            return Err(Error::Truncated);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    fn read_ioa(&mut self) -> Result<InfoObjAddr> {
        let width = self.params.info_obj_addr_size as usize;
        let b = self.take(width)?;
        let mut addr = 0u32;
        for (i, &octet) in b.iter().enumerate() {
            addr |= u32::from(octet) << (8 * i);
        }
        Ok(addr)
    }

    fn read_bcr(&mut self) -> Result<BinaryCounterReading> {
        let b = self.take(5)?;
        let value = i32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        Ok(BinaryCounterReading::flags_from_u8(value, b[4]))
    }

    fn read_cp16(&mut self) -> Result<u16> {
        self.read_u16()
    }

    fn read_cp56(&mut self) -> Result<Option<DateTime<FixedOffset>>> {
        let b = self.take(7)?;
        Ok(decode_cp56time2a(b, self.params.time_zone))
    }

    fn read_cp24(&mut self) -> Result<Option<DateTime<FixedOffset>>> {
        let b = self.take(3)?;
        Ok(decode_cp24time2a(b, self.params.time_zone))
    }

    /// Read the trailing time tag shape for the message's type.
    fn read_time(&mut self, tag: TimeTag) -> Result<Option<DateTime<FixedOffset>>> {
        match tag {
            TimeTag::None => Ok(None),
            TimeTag::Cp24 => self.read_cp24(),
            TimeTag::Cp56 => self.read_cp56(),
        }
    }
}

/// Shared iteration primitive for the SQ/scatter layouts.
///
/// With SQ=1 a single object address is read and successive elements take
/// consecutive addresses; with SQ=0 every element is address-prefixed.
fn read_items<T>(
    cur: &mut Cursor<'_>,
    vsq: Vsq,
    mut read_element: impl FnMut(&mut Cursor<'_>, InfoObjAddr) -> Result<T>,
) -> Result<Vec<T>> {
    let mut items = Vec::with_capacity(vsq.number as usize);
    let mut ioa = 0;
    for i in 0..vsq.number {
        if !vsq.is_sequence || i == 0 {
            ioa = cur.read_ioa()?;
        } else {
            ioa += 1;
        }
        items.push(read_element(cur, ioa)?);
    }
    Ok(items)
}

/// Check the single-object shape required by command, parameter and packed
/// protection ASDUs.
fn require_single_object(vsq: Vsq) -> Result<()> {
    if vsq.is_sequence || vsq.number != 1 {
        return Err(Error::invalid_variable("type carries exactly one information object"));
    }
    Ok(())
}

/// Decode a raw ASDU into a typed [`Message`] without mutating it.
///
/// Unsupported type identifications produce [`Payload::Unknown`] with the
/// raw octets preserved; running out of octets is [`Error::Truncated`].
pub fn parse_asdu(asdu: &Asdu) -> Result<Message> {
    let header = asdu.header;
    let vsq = header.vsq;
    let tag = header.type_id.time_tag();
    let mut cur = Cursor::new(&asdu.info_obj, &asdu.params);

    let payload = match header.type_id {
        TypeId::SinglePoint | TypeId::SinglePointTime24 | TypeId::SinglePointTime56 => {
            Payload::SinglePoint(read_items(&mut cur, vsq, |cur, ioa| {
                let b = cur.read_u8()?;
                Ok(SinglePointInfo {
                    ioa,
                    value: b & 0x01 != 0,
                    qds: QualityDescriptor::from_u8(b & 0xf0),
                    time: cur.read_time(tag)?,
                })
            })?)
        }

        TypeId::DoublePoint | TypeId::DoublePointTime24 | TypeId::DoublePointTime56 => {
            Payload::DoublePoint(read_items(&mut cur, vsq, |cur, ioa| {
                let b = cur.read_u8()?;
                Ok(DoublePointInfo {
                    ioa,
                    value: DoublePointValue::from_u8(b),
                    qds: QualityDescriptor::from_u8(b & 0xf0),
                    time: cur.read_time(tag)?,
                })
            })?)
        }

        TypeId::StepPosition | TypeId::StepPositionTime24 | TypeId::StepPositionTime56 => {
            Payload::StepPosition(read_items(&mut cur, vsq, |cur, ioa| {
                let vti = cur.read_u8()?;
                let qds = cur.read_u8()?;
                Ok(StepPositionInfo {
                    ioa,
                    value: StepPositionValue::from_u8(vti),
                    qds: QualityDescriptor::from_u8(qds),
                    time: cur.read_time(tag)?,
                })
            })?)
        }

        TypeId::Bitstring32 | TypeId::Bitstring32Time24 | TypeId::Bitstring32Time56 => {
            Payload::Bitstring32(read_items(&mut cur, vsq, |cur, ioa| {
                let value = cur.read_u32()?;
                let qds = cur.read_u8()?;
                Ok(Bitstring32Info {
                    ioa,
                    value,
                    qds: QualityDescriptor::from_u8(qds),
                    time: cur.read_time(tag)?,
                })
            })?)
        }

        TypeId::MeasuredNormalized
        | TypeId::MeasuredNormalizedTime24
        | TypeId::MeasuredNormalizedTime56
        | TypeId::MeasuredNormalizedNoQuality => {
            let with_quality = header.type_id != TypeId::MeasuredNormalizedNoQuality;
            Payload::MeasuredNormalized(read_items(&mut cur, vsq, |cur, ioa| {
                let value = Normalized(cur.read_i16()?);
                let qds = if with_quality {
                    QualityDescriptor::from_u8(cur.read_u8()?)
                } else {
                    QualityDescriptor::GOOD
                };
                Ok(MeasuredNormalizedInfo { ioa, value, qds, time: cur.read_time(tag)? })
            })?)
        }

        TypeId::MeasuredScaled | TypeId::MeasuredScaledTime24 | TypeId::MeasuredScaledTime56 => {
            Payload::MeasuredScaled(read_items(&mut cur, vsq, |cur, ioa| {
                let value = cur.read_i16()?;
                let qds = cur.read_u8()?;
                Ok(MeasuredScaledInfo {
                    ioa,
                    value,
                    qds: QualityDescriptor::from_u8(qds),
                    time: cur.read_time(tag)?,
                })
            })?)
        }

        TypeId::MeasuredFloat | TypeId::MeasuredFloatTime24 | TypeId::MeasuredFloatTime56 => {
            Payload::MeasuredFloat(read_items(&mut cur, vsq, |cur, ioa| {
                let value = cur.read_f32()?;
                let qds = cur.read_u8()?;
                Ok(MeasuredFloatInfo {
                    ioa,
                    value,
                    qds: QualityDescriptor::from_u8(qds & 0xf1),
                    time: cur.read_time(tag)?,
                })
            })?)
        }

        TypeId::IntegratedTotals
        | TypeId::IntegratedTotalsTime24
        | TypeId::IntegratedTotalsTime56 => {
            Payload::IntegratedTotals(read_items(&mut cur, vsq, |cur, ioa| {
                Ok(IntegratedTotalsInfo {
                    ioa,
                    value: cur.read_bcr()?,
                    time: cur.read_time(tag)?,
                })
            })?)
        }

        TypeId::ProtectionEventTime24 | TypeId::ProtectionEventTime56 => {
            Payload::ProtectionEvent(read_items(&mut cur, vsq, |cur, ioa| {
                let b = cur.read_u8()?;
                let msec = cur.read_cp16()?;
                Ok(ProtectionEventInfo {
                    ioa,
                    event: SingleEvent::from_u8(b),
                    qdp: ProtectionQuality::from_u8(b & 0xf8),
                    msec,
                    time: cur.read_time(tag)?,
                })
            })?)
        }

        TypeId::PackedStartEventsTime24 | TypeId::PackedStartEventsTime56 => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let events = StartEvents(cur.read_u8()?);
            let qdp = ProtectionQuality::from_u8(cur.read_u8()? & 0xf8);
            let msec = cur.read_cp16()?;
            Payload::PackedStartEvents(PackedStartEventsInfo {
                ioa,
                events,
                qdp,
                msec,
                time: cur.read_time(tag)?,
            })
        }

        TypeId::PackedOutputCircuitTime24 | TypeId::PackedOutputCircuitTime56 => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let circuits = OutputCircuits(cur.read_u8()?);
            let qdp = ProtectionQuality::from_u8(cur.read_u8()? & 0xf8);
            let msec = cur.read_cp16()?;
            Payload::PackedOutputCircuit(PackedOutputCircuitInfo {
                ioa,
                circuits,
                qdp,
                msec,
                time: cur.read_time(tag)?,
            })
        }

        TypeId::PackedSinglePointScd => {
            Payload::PackedSinglePointScd(read_items(&mut cur, vsq, |cur, ioa| {
                let scd = StatusChangeDetection(cur.read_u32()?);
                let qds = cur.read_u8()?;
                Ok(PackedSinglePointScdInfo {
                    ioa,
                    scd,
                    qds: QualityDescriptor::from_u8(qds),
                })
            })?)
        }

        TypeId::EndOfInit => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let coi = CauseOfInitial::from_u8(cur.read_u8()?);
            Payload::EndOfInit { ioa, coi }
        }

        TypeId::SingleCommand | TypeId::SingleCommandTime56 => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let b = cur.read_u8()?;
            Payload::SingleCommand(SingleCommandInfo {
                ioa,
                value: b & 0x01 != 0,
                qoc: QualifierOfCommand::from_u8(b & 0xfe),
                time: cur.read_time(tag)?,
            })
        }

        TypeId::DoubleCommand | TypeId::DoubleCommandTime56 => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let b = cur.read_u8()?;
            Payload::DoubleCommand(DoubleCommandInfo {
                ioa,
                value: DoubleCommandValue::from_u8(b),
                qoc: QualifierOfCommand::from_u8(b & 0xfc),
                time: cur.read_time(tag)?,
            })
        }

        TypeId::RegulatingStep | TypeId::RegulatingStepTime56 => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let b = cur.read_u8()?;
            Payload::StepCommand(StepCommandInfo {
                ioa,
                value: StepCommandValue::from_u8(b),
                qoc: QualifierOfCommand::from_u8(b & 0xfc),
                time: cur.read_time(tag)?,
            })
        }

        TypeId::SetpointNormalized | TypeId::SetpointNormalizedTime56 => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let value = Normalized(cur.read_i16()?);
            let qos = QualifierOfSetpoint::from_u8(cur.read_u8()?);
            Payload::SetpointNormalized(SetpointNormalizedInfo {
                ioa,
                value,
                qos,
                time: cur.read_time(tag)?,
            })
        }

        TypeId::SetpointScaled | TypeId::SetpointScaledTime56 => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let value = cur.read_i16()?;
            let qos = QualifierOfSetpoint::from_u8(cur.read_u8()?);
            Payload::SetpointScaled(SetpointScaledInfo { ioa, value, qos, time: cur.read_time(tag)? })
        }

        TypeId::SetpointFloat | TypeId::SetpointFloatTime56 => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let value = cur.read_f32()?;
            let qos = QualifierOfSetpoint::from_u8(cur.read_u8()?);
            Payload::SetpointFloat(SetpointFloatInfo { ioa, value, qos, time: cur.read_time(tag)? })
        }

        TypeId::Bitstring32Command | TypeId::Bitstring32CommandTime56 => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let value = cur.read_u32()?;
            Payload::BitstringCommand(BitstringCommandInfo { ioa, value, time: cur.read_time(tag)? })
        }

        TypeId::InterrogationCommand => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let qoi = cur.read_u8()?;
            Payload::Interrogation { ioa, qoi }
        }

        TypeId::CounterInterrogation => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let qcc = QualifierCountCall::from_u8(cur.read_u8()?);
            Payload::CounterInterrogation { ioa, qcc }
        }

        TypeId::ReadCommand => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            Payload::Read { ioa }
        }

        TypeId::ClockSync => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let time = cur.read_cp56()?;
            Payload::ClockSync { ioa, time }
        }

        TypeId::TestCommand => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let word = cur.read_u16()?;
            Payload::TestCommand { ioa, is_test_word: word == FBP_TEST_WORD }
        }

        TypeId::ResetProcess => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let qrp = cur.read_u8()?;
            Payload::ResetProcess { ioa, qrp }
        }

        TypeId::DelayAcquire => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let msec = cur.read_cp16()?;
            Payload::DelayAcquire { ioa, msec }
        }

        TypeId::TestCommandTime56 => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let word = cur.read_u16()?;
            let time = cur.read_cp56()?;
            Payload::TestCommandCp56 { ioa, is_test_word: word == FBP_TEST_WORD, time }
        }

        TypeId::ParameterNormalized => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let value = Normalized(cur.read_i16()?);
            let qpm = QualifierOfParameter::from_u8(cur.read_u8()?);
            Payload::ParameterNormalized { ioa, value, qpm }
        }

        TypeId::ParameterScaled => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let value = cur.read_i16()?;
            let qpm = QualifierOfParameter::from_u8(cur.read_u8()?);
            Payload::ParameterScaled { ioa, value, qpm }
        }

        TypeId::ParameterFloat => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let value = cur.read_f32()?;
            let qpm = QualifierOfParameter::from_u8(cur.read_u8()?);
            Payload::ParameterFloat { ioa, value, qpm }
        }

        TypeId::ParameterActivation => {
            require_single_object(vsq)?;
            let ioa = cur.read_ioa()?;
            let qpa = cur.read_u8()?;
            Payload::ParameterActivation { ioa, qpa }
        }

        TypeId::Private(_) => Payload::Unknown(asdu.info_obj.clone()),
    };

    Ok(Message { header, payload })
}
