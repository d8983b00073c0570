//! ASDU payload encoder: rebuilds wire octets from a typed [`Message`].
//!
//! [`encode_message`] is the exact inverse of [`crate::parse_asdu`] for
//! every supported type identification; round-tripping a well-formed ASDU
//! reproduces its bytes exactly.

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, FixedOffset};

use crate::config::Params;
use crate::error::{Error, Result};
use crate::parser::{Message, Payload};
use crate::types::{
    encode_cp16time2a, encode_cp24time2a, encode_cp56time2a, Asdu, InfoObjAddr, TimeTag, TypeId,
    Vsq, ASDU_SIZE_MAX, CP24_INVALID, CP56_INVALID, FBP_TEST_WORD,
};

/// Write-side cursor over the information object octets.
struct InfoObjWriter {
    buf: BytesMut,
    params: Params,
}

impl InfoObjWriter {
    fn new(params: Params) -> Self {
        Self { buf: BytesMut::with_capacity(ASDU_SIZE_MAX), params }
    }

    fn put_ioa(&mut self, addr: InfoObjAddr) -> Result<()> {
        let width = self.params.info_obj_addr_size;
        let max = match width {
            1 => 0xff,
            2 => 0xffff,
            3 => 0xff_ffff,
            _ => return Err(Error::param("information object address size not in [1, 3]")),
        };
        if addr > max {
            return Err(Error::InfoObjAddrNotFit(addr, width));
        }
        for i in 0..width {
            self.buf.put_u8((addr >> (8 * i)) as u8);
        }
        Ok(())
    }

    fn put_time(&mut self, tag: TimeTag, time: Option<DateTime<FixedOffset>>) {
        let tz = self.params.time_zone;
        match (tag, time) {
            (TimeTag::None, _) => {}
            (TimeTag::Cp24, Some(t)) => self.buf.put_slice(&encode_cp24time2a(t, tz)),
            (TimeTag::Cp24, None) => self.buf.put_slice(&CP24_INVALID),
            (TimeTag::Cp56, Some(t)) => self.buf.put_slice(&encode_cp56time2a(t, tz)),
            (TimeTag::Cp56, None) => self.buf.put_slice(&CP56_INVALID),
        }
    }

    fn put_cp56(&mut self, time: Option<DateTime<FixedOffset>>) {
        self.put_time(TimeTag::Cp56, time);
    }
}

/// Mirror of the parser's iteration primitive: with SQ=1 only the first
/// element is address-prefixed, with SQ=0 every element is.
fn write_items<T>(
    w: &mut InfoObjWriter,
    is_sequence: bool,
    items: &[T],
    ioa_of: impl Fn(&T) -> InfoObjAddr,
    mut write_element: impl FnMut(&mut InfoObjWriter, &T) -> Result<()>,
) -> Result<()> {
    for (i, item) in items.iter().enumerate() {
        if !is_sequence || i == 0 {
            w.put_ioa(ioa_of(item))?;
        }
        write_element(w, item)?;
    }
    Ok(())
}

fn checked_count(len: usize) -> Result<u8> {
    if len == 0 {
        return Err(Error::NoObjects);
    }
    if len > 127 {
        return Err(Error::VariableCountOutOfRange);
    }
    Ok(len as u8)
}

/// Build a raw [`Asdu`] from a typed message.
///
/// The variable structure count is re-derived from the item list (the SQ
/// flag is taken from the message header); the total ASDU size is
/// validated against the 249 octet limit. A payload that does not match
/// the header's type identification is rejected.
pub fn encode_message(params: Params, msg: &Message) -> Result<Asdu> {
    let type_id = msg.header.type_id;
    let tag = type_id.time_tag();
    let is_sequence = msg.header.vsq.is_sequence;
    let mut w = InfoObjWriter::new(params);

    let vsq = match &msg.payload {
        Payload::SinglePoint(items) => match type_id {
            TypeId::SinglePoint | TypeId::SinglePointTime24 | TypeId::SinglePointTime56 => {
                let n = checked_count(items.len())?;
                write_items(&mut w, is_sequence, items, |it| it.ioa, |w, it| {
                    w.buf.put_u8(u8::from(it.value) | (it.qds.as_u8() & 0xf0));
                    w.put_time(tag, it.time);
                    Ok(())
                })?;
                Vsq::new(n, is_sequence)
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::DoublePoint(items) => match type_id {
            TypeId::DoublePoint | TypeId::DoublePointTime24 | TypeId::DoublePointTime56 => {
                let n = checked_count(items.len())?;
                write_items(&mut w, is_sequence, items, |it| it.ioa, |w, it| {
                    w.buf.put_u8(it.value.as_u8() | (it.qds.as_u8() & 0xf0));
                    w.put_time(tag, it.time);
                    Ok(())
                })?;
                Vsq::new(n, is_sequence)
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::StepPosition(items) => match type_id {
            TypeId::StepPosition | TypeId::StepPositionTime24 | TypeId::StepPositionTime56 => {
                let n = checked_count(items.len())?;
                write_items(&mut w, is_sequence, items, |it| it.ioa, |w, it| {
                    w.buf.put_u8(it.value.as_u8());
                    w.buf.put_u8(it.qds.as_u8());
                    w.put_time(tag, it.time);
                    Ok(())
                })?;
                Vsq::new(n, is_sequence)
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::Bitstring32(items) => match type_id {
            TypeId::Bitstring32 | TypeId::Bitstring32Time24 | TypeId::Bitstring32Time56 => {
                let n = checked_count(items.len())?;
                write_items(&mut w, is_sequence, items, |it| it.ioa, |w, it| {
                    w.buf.put_u32_le(it.value);
                    w.buf.put_u8(it.qds.as_u8());
                    w.put_time(tag, it.time);
                    Ok(())
                })?;
                Vsq::new(n, is_sequence)
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::MeasuredNormalized(items) => match type_id {
            TypeId::MeasuredNormalized
            | TypeId::MeasuredNormalizedTime24
            | TypeId::MeasuredNormalizedTime56
            | TypeId::MeasuredNormalizedNoQuality => {
                let with_quality = type_id != TypeId::MeasuredNormalizedNoQuality;
                let n = checked_count(items.len())?;
                write_items(&mut w, is_sequence, items, |it| it.ioa, |w, it| {
                    w.buf.put_i16_le(it.value.0);
                    if with_quality {
                        w.buf.put_u8(it.qds.as_u8());
                    }
                    w.put_time(tag, it.time);
                    Ok(())
                })?;
                Vsq::new(n, is_sequence)
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::MeasuredScaled(items) => match type_id {
            TypeId::MeasuredScaled | TypeId::MeasuredScaledTime24 | TypeId::MeasuredScaledTime56 => {
                let n = checked_count(items.len())?;
                write_items(&mut w, is_sequence, items, |it| it.ioa, |w, it| {
                    w.buf.put_i16_le(it.value);
                    w.buf.put_u8(it.qds.as_u8());
                    w.put_time(tag, it.time);
                    Ok(())
                })?;
                Vsq::new(n, is_sequence)
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::MeasuredFloat(items) => match type_id {
            TypeId::MeasuredFloat | TypeId::MeasuredFloatTime24 | TypeId::MeasuredFloatTime56 => {
                let n = checked_count(items.len())?;
                write_items(&mut w, is_sequence, items, |it| it.ioa, |w, it| {
                    w.buf.put_u32_le(it.value.to_bits());
                    w.buf.put_u8(it.qds.as_u8() & 0xf1);
                    w.put_time(tag, it.time);
                    Ok(())
                })?;
                Vsq::new(n, is_sequence)
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::IntegratedTotals(items) => match type_id {
            TypeId::IntegratedTotals
            | TypeId::IntegratedTotalsTime24
            | TypeId::IntegratedTotalsTime56 => {
                let n = checked_count(items.len())?;
                write_items(&mut w, is_sequence, items, |it| it.ioa, |w, it| {
                    w.buf.put_i32_le(it.value.value);
                    w.buf.put_u8(it.value.flags_as_u8());
                    w.put_time(tag, it.time);
                    Ok(())
                })?;
                Vsq::new(n, is_sequence)
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::ProtectionEvent(items) => match type_id {
            TypeId::ProtectionEventTime24 | TypeId::ProtectionEventTime56 => {
                let n = checked_count(items.len())?;
                write_items(&mut w, is_sequence, items, |it| it.ioa, |w, it| {
                    w.buf.put_u8(it.event.as_u8() | (it.qdp.as_u8() & 0xf8));
                    w.buf.put_slice(&encode_cp16time2a(it.msec));
                    w.put_time(tag, it.time);
                    Ok(())
                })?;
                Vsq::new(n, is_sequence)
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::PackedStartEvents(it) => match type_id {
            TypeId::PackedStartEventsTime24 | TypeId::PackedStartEventsTime56 => {
                w.put_ioa(it.ioa)?;
                w.buf.put_u8(it.events.0);
                w.buf.put_u8(it.qdp.as_u8() & 0xf8);
                w.buf.put_slice(&encode_cp16time2a(it.msec));
                w.put_time(tag, it.time);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::PackedOutputCircuit(it) => match type_id {
            TypeId::PackedOutputCircuitTime24 | TypeId::PackedOutputCircuitTime56 => {
                w.put_ioa(it.ioa)?;
                w.buf.put_u8(it.circuits.0);
                w.buf.put_u8(it.qdp.as_u8() & 0xf8);
                w.buf.put_slice(&encode_cp16time2a(it.msec));
                w.put_time(tag, it.time);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::PackedSinglePointScd(items) => match type_id {
            TypeId::PackedSinglePointScd => {
                let n = checked_count(items.len())?;
                write_items(&mut w, is_sequence, items, |it| it.ioa, |w, it| {
                    w.buf.put_u32_le(it.scd.0);
                    w.buf.put_u8(it.qds.as_u8());
                    Ok(())
                })?;
                Vsq::new(n, is_sequence)
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::EndOfInit { ioa, coi } => match type_id {
            TypeId::EndOfInit => {
                w.put_ioa(*ioa)?;
                w.buf.put_u8(coi.as_u8());
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::SingleCommand(cmd) => match type_id {
            TypeId::SingleCommand | TypeId::SingleCommandTime56 => {
                w.put_ioa(cmd.ioa)?;
                w.buf.put_u8(cmd.qoc.as_u8() | u8::from(cmd.value));
                w.put_time(tag, cmd.time);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::DoubleCommand(cmd) => match type_id {
            TypeId::DoubleCommand | TypeId::DoubleCommandTime56 => {
                w.put_ioa(cmd.ioa)?;
                w.buf.put_u8(cmd.qoc.as_u8() | (cmd.value.as_u8() & 0x03));
                w.put_time(tag, cmd.time);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::StepCommand(cmd) => match type_id {
            TypeId::RegulatingStep | TypeId::RegulatingStepTime56 => {
                w.put_ioa(cmd.ioa)?;
                w.buf.put_u8(cmd.qoc.as_u8() | (cmd.value.as_u8() & 0x03));
                w.put_time(tag, cmd.time);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::SetpointNormalized(cmd) => match type_id {
            TypeId::SetpointNormalized | TypeId::SetpointNormalizedTime56 => {
                w.put_ioa(cmd.ioa)?;
                w.buf.put_i16_le(cmd.value.0);
                w.buf.put_u8(cmd.qos.as_u8());
                w.put_time(tag, cmd.time);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::SetpointScaled(cmd) => match type_id {
            TypeId::SetpointScaled | TypeId::SetpointScaledTime56 => {
                w.put_ioa(cmd.ioa)?;
                w.buf.put_i16_le(cmd.value);
                w.buf.put_u8(cmd.qos.as_u8());
                w.put_time(tag, cmd.time);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::SetpointFloat(cmd) => match type_id {
            TypeId::SetpointFloat | TypeId::SetpointFloatTime56 => {
                w.put_ioa(cmd.ioa)?;
                w.buf.put_u32_le(cmd.value.to_bits());
                w.buf.put_u8(cmd.qos.as_u8());
                w.put_time(tag, cmd.time);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::BitstringCommand(cmd) => match type_id {
            TypeId::Bitstring32Command | TypeId::Bitstring32CommandTime56 => {
                w.put_ioa(cmd.ioa)?;
                w.buf.put_u32_le(cmd.value);
                w.put_time(tag, cmd.time);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::Interrogation { ioa, qoi } => match type_id {
            TypeId::InterrogationCommand => {
                w.put_ioa(*ioa)?;
                w.buf.put_u8(*qoi);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::CounterInterrogation { ioa, qcc } => match type_id {
            TypeId::CounterInterrogation => {
                w.put_ioa(*ioa)?;
                w.buf.put_u8(qcc.as_u8());
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::Read { ioa } => match type_id {
            TypeId::ReadCommand => {
                w.put_ioa(*ioa)?;
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::ClockSync { ioa, time } => match type_id {
            TypeId::ClockSync => {
                w.put_ioa(*ioa)?;
                w.put_cp56(*time);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::TestCommand { ioa, is_test_word } => match type_id {
            TypeId::TestCommand => {
                w.put_ioa(*ioa)?;
                w.buf.put_u16_le(if *is_test_word { FBP_TEST_WORD } else { 0 });
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::ResetProcess { ioa, qrp } => match type_id {
            TypeId::ResetProcess => {
                w.put_ioa(*ioa)?;
                w.buf.put_u8(*qrp);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::DelayAcquire { ioa, msec } => match type_id {
            TypeId::DelayAcquire => {
                w.put_ioa(*ioa)?;
                w.buf.put_slice(&encode_cp16time2a(*msec));
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::TestCommandCp56 { ioa, is_test_word, time } => match type_id {
            TypeId::TestCommandTime56 => {
                w.put_ioa(*ioa)?;
                w.buf.put_u16_le(if *is_test_word { FBP_TEST_WORD } else { 0 });
                w.put_cp56(*time);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::ParameterNormalized { ioa, value, qpm } => match type_id {
            TypeId::ParameterNormalized => {
                w.put_ioa(*ioa)?;
                w.buf.put_i16_le(value.0);
                w.buf.put_u8(qpm.as_u8());
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::ParameterScaled { ioa, value, qpm } => match type_id {
            TypeId::ParameterScaled => {
                w.put_ioa(*ioa)?;
                w.buf.put_i16_le(*value);
                w.buf.put_u8(qpm.as_u8());
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::ParameterFloat { ioa, value, qpm } => match type_id {
            TypeId::ParameterFloat => {
                w.put_ioa(*ioa)?;
                w.buf.put_u32_le(value.to_bits());
                w.buf.put_u8(qpm.as_u8());
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::ParameterActivation { ioa, qpa } => match type_id {
            TypeId::ParameterActivation => {
                w.put_ioa(*ioa)?;
                w.buf.put_u8(*qpa);
                Vsq::single()
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },

        Payload::Unknown(raw) => match type_id {
            TypeId::Private(_) => {
                if raw.is_empty() {
                    return Err(Error::NoObjects);
                }
                w.buf.put_slice(raw);
                msg.header.vsq
            }
            _ => return Err(Error::TypeIdNotMatch(type_id.as_u8())),
        },
    };

    if params.identifier_size() + w.buf.len() > ASDU_SIZE_MAX {
        return Err(Error::LengthOutOfRange);
    }

    let mut header = msg.header;
    header.vsq = vsq;
    Ok(Asdu::new(params, header, w.buf.freeze()))
}
