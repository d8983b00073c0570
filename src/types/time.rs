//! Binary time tags: CP56Time2a, CP24Time2a and CP16Time2a.
//!
//! Layout, all little-endian (companion standard 101, subclass 7.2.6.18-20):
//!
//! ```text
//! | Milliseconds (D7..D0)                 | milliseconds = 0..59999
//! | Milliseconds (D15..D8)                |
//! | IV(D7)  RES1(D6)  Minutes(D5..D0)     | minutes = 0..59, IV: 1 = invalid
//! | SU(D7)  RES2(D6..D5)  Hours(D4..D0)   | hours = 0..23
//! | DayOfWeek(D7..D5) DayOfMonth(D4..D0)  | day = 1..31, weekday = 1..7
//! | RES3(D7..D4)  Months(D3..D0)          | month = 1..12
//! | RES4(D7)  Year(D6..D0)                | year = 0..99 since 2000
//! ```
//!
//! The standard does not bind the fields to a time zone; the zone is a
//! required policy input carried in [`crate::Params`]. UTC is recommended.

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Timelike, Utc};

/// Encode a CP56Time2a seven-octet binary time.
///
/// The instant is converted into `tz` before field extraction. The year is
/// encoded relative to 2000; the invalid and summer-time bits are left clear.
pub fn encode_cp56time2a(t: DateTime<FixedOffset>, tz: FixedOffset) -> [u8; 7] {
    let ts = t.with_timezone(&tz);
    let msec = ts.timestamp_subsec_millis() as u16 + ts.second() as u16 * 1000;
    [
        msec as u8,
        (msec >> 8) as u8,
        ts.minute() as u8,
        ts.hour() as u8,
        (ts.weekday().number_from_monday() as u8) << 5 | ts.day() as u8,
        ts.month() as u8,
        (ts.year() - 2000) as u8,
    ]
}

/// Decode a CP56Time2a seven-octet binary time.
///
/// Returns `None` for short input, a set invalid bit, or field values that
/// do not form a real calendar date. The year is fixed to the 21st century.
pub fn decode_cp56time2a(bytes: &[u8], tz: FixedOffset) -> Option<DateTime<FixedOffset>> {
    if bytes.len() < 7 || bytes[2] & 0x80 != 0 {
        return None;
    }
    let x = u16::from_le_bytes([bytes[0], bytes[1]]) as u32;
    let msec = x % 1000;
    let sec = x / 1000;
    let min = (bytes[2] & 0x3f) as u32;
    let hour = (bytes[3] & 0x1f) as u32;
    let day = (bytes[4] & 0x1f) as u32;
    let month = (bytes[5] & 0x0f) as u32;
    let year = 2000 + (bytes[6] & 0x7f) as i32;

    tz.with_ymd_and_hms(year, month, day, hour, min, sec)
        .single()?
        .with_nanosecond(msec * 1_000_000)
}

/// Encode a CP24Time2a three-octet binary time: the first three octets of
/// the CP56 layout (milliseconds of minute plus the minute octet).
pub fn encode_cp24time2a(t: DateTime<FixedOffset>, tz: FixedOffset) -> [u8; 3] {
    let ts = t.with_timezone(&tz);
    let msec = ts.timestamp_subsec_millis() as u16 + ts.second() as u16 * 1000;
    [msec as u8, (msec >> 8) as u8, ts.minute() as u8]
}

/// Decode a CP24Time2a three-octet binary time.
///
/// The date and hour are reconstructed from the current clock in `tz`,
/// which leaves a 55-minute ambiguity the caller must resolve if it
/// matters; use CP56 types for unambiguous timestamps.
pub fn decode_cp24time2a(bytes: &[u8], tz: FixedOffset) -> Option<DateTime<FixedOffset>> {
    if bytes.len() < 3 || bytes[2] & 0x80 != 0 {
        return None;
    }
    let x = u16::from_le_bytes([bytes[0], bytes[1]]) as u32;
    let msec = x % 1000;
    let sec = x / 1000;
    let min = (bytes[2] & 0x3f) as u32;

    let now = Utc::now().with_timezone(&tz);
    tz.with_ymd_and_hms(now.year(), now.month(), now.day(), now.hour(), min, sec)
        .single()?
        .with_nanosecond(msec * 1_000_000)
}

/// Encode a CP16Time2a two-octet binary time (milliseconds, 0..65535).
#[inline]
pub fn encode_cp16time2a(msec: u16) -> [u8; 2] {
    msec.to_le_bytes()
}

/// Decode a CP16Time2a two-octet binary time.
#[inline]
pub fn decode_cp16time2a(bytes: &[u8]) -> Option<u16> {
    if bytes.len() < 2 {
        return None;
    }
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Sentinel bytes written for an absent or invalid CP56 tag: all-zero
/// fields with the invalid bit set.
pub(crate) const CP56_INVALID: [u8; 7] = [0, 0, 0x80, 0, 0, 0, 0];

/// Sentinel bytes written for an absent or invalid CP24 tag.
pub(crate) const CP24_INVALID: [u8; 3] = [0, 0, 0x80];
