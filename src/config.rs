//! Protocol configuration: APCI timers and windows, ASDU structure
//! parameters.

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::error::{Error, Result};

/// IANA registered port for unsecured connections.
pub const PORT: u16 = 2404;

/// IANA registered port for TLS connections.
pub const PORT_SECURE: u16 = 19_998;

/// "t0" range [1, 255] seconds.
pub const CONNECT_TIMEOUT0_MIN: Duration = Duration::from_secs(1);
pub const CONNECT_TIMEOUT0_MAX: Duration = Duration::from_secs(255);

/// "t1" range [1, 255] seconds. See IEC 60870-5-104, figure 18.
pub const SEND_UNACK_TIMEOUT1_MIN: Duration = Duration::from_secs(1);
pub const SEND_UNACK_TIMEOUT1_MAX: Duration = Duration::from_secs(255);

/// "t2" range [1, 255] seconds. See IEC 60870-5-104, figure 10.
pub const RECV_UNACK_TIMEOUT2_MIN: Duration = Duration::from_secs(1);
pub const RECV_UNACK_TIMEOUT2_MAX: Duration = Duration::from_secs(255);

/// "t3" range [1 second, 48 hours]. See IEC 60870-5-104, subclass 5.2.
pub const IDLE_TIMEOUT3_MIN: Duration = Duration::from_secs(1);
pub const IDLE_TIMEOUT3_MAX: Duration = Duration::from_secs(48 * 3600);

/// "k" and "w" range [1, 32767]. See IEC 60870-5-104, subclass 5.5.
pub const WINDOW_MIN: u16 = 1;
pub const WINDOW_MAX: u16 = 32_767;

/// APCI session configuration.
///
/// The defaults are the values recommended by the standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// "t0": maximum time for establishing the TCP connection,
    /// range [1, 255] s, default 30 s.
    pub connect_timeout: Duration,
    /// "k": maximum number of unacknowledged outbound I-frames before
    /// transmission stops, range [1, 32767], default 12.
    pub k: u16,
    /// "t1": maximum time waiting for acknowledgement of a sent I-frame or
    /// a U-frame confirmation before the connection is closed,
    /// range [1, 255] s, default 15 s.
    pub t1: Duration,
    /// "w": latest after this many received I-frames an acknowledgement is
    /// sent, range [1, 32767], default 8. Must not exceed two thirds of k.
    pub w: u16,
    /// "t2": maximum time before acknowledging received I-frames,
    /// range [1, 255] s and less than t1, default 10 s.
    pub t2: Duration,
    /// "t3": idle time that triggers the TESTFR keep-alive,
    /// range [1 s, 48 h], default 20 s.
    pub t3: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            k: 12,
            t1: Duration::from_secs(15),
            w: 8,
            t2: Duration::from_secs(10),
            t3: Duration::from_secs(20),
        }
    }
}

impl Config {
    /// Check every bound the standard places on the configuration, plus
    /// `t2 < t1` and `w <= 2k/3`.
    ///
    /// The relation between t2 and t3 is intentionally not policed; with
    /// `t2 > t3` the idle timer always wins, which is legal but unusual.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout < CONNECT_TIMEOUT0_MIN || self.connect_timeout > CONNECT_TIMEOUT0_MAX {
            return Err(Error::param("connect timeout t0 not in [1, 255]s"));
        }
        if self.k < WINDOW_MIN || self.k > WINDOW_MAX {
            return Err(Error::param("send window k not in [1, 32767]"));
        }
        if self.t1 < SEND_UNACK_TIMEOUT1_MIN || self.t1 > SEND_UNACK_TIMEOUT1_MAX {
            return Err(Error::param("unacknowledged-frame timeout t1 not in [1, 255]s"));
        }
        if self.w < WINDOW_MIN || self.w > WINDOW_MAX {
            return Err(Error::param("receive window w not in [1, 32767]"));
        }
        if u32::from(self.w) * 3 > u32::from(self.k) * 2 {
            return Err(Error::param("receive window w exceeds 2/3 of k"));
        }
        if self.t2 < RECV_UNACK_TIMEOUT2_MIN || self.t2 > RECV_UNACK_TIMEOUT2_MAX {
            return Err(Error::param("receive-ack timeout t2 not in [1, 255]s"));
        }
        if self.t2 >= self.t1 {
            return Err(Error::param("receive-ack timeout t2 must be less than t1"));
        }
        if self.t3 < IDLE_TIMEOUT3_MIN || self.t3 > IDLE_TIMEOUT3_MAX {
            return Err(Error::param("idle timeout t3 not in [1s, 48h]"));
        }
        Ok(())
    }
}

/// ASDU structure parameters, immutable for the lifetime of a connection.
///
/// See companion standard 101, subclass 7.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Params {
    /// Size of the cause of transmission field in octets, 1 or 2.
    /// Size 2 carries the originator address.
    pub cause_size: u8,
    /// Originator address [1, 255], or 0 when unused. Only carried when
    /// `cause_size` is 2.
    pub orig_addr: u8,
    /// Size of the common (station) address in octets, 1 or 2.
    pub common_addr_size: u8,
    /// Size of the information object address in octets, 1, 2 or 3.
    pub info_obj_addr_size: u8,
    /// Time zone binding for time-tag interpretation. The standard is
    /// silent here; UTC is the recommended policy.
    pub time_zone: FixedOffset,
}

impl Params {
    /// The largest configuration: 2-octet cause with originator address,
    /// 2-octet common address, 3-octet information object address, UTC.
    pub fn wide() -> Self {
        Self {
            cause_size: 2,
            orig_addr: 0,
            common_addr_size: 2,
            info_obj_addr_size: 3,
            time_zone: Utc.fix(),
        }
    }

    /// The smallest configuration: single-octet fields, UTC.
    pub fn narrow() -> Self {
        Self {
            cause_size: 1,
            orig_addr: 0,
            common_addr_size: 1,
            info_obj_addr_size: 1,
            time_zone: Utc.fix(),
        }
    }

    /// Check the address-width bounds.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.cause_size, 1 | 2) {
            return Err(Error::param("cause size not in [1, 2]"));
        }
        if !matches!(self.common_addr_size, 1 | 2) {
            return Err(Error::param("common address size not in [1, 2]"));
        }
        if !matches!(self.info_obj_addr_size, 1..=3) {
            return Err(Error::param("information object address size not in [1, 3]"));
        }
        Ok(())
    }

    /// Size of the data unit identifier in octets: type, variable
    /// structure, cause and common address fields.
    #[inline]
    pub fn identifier_size(&self) -> usize {
        2 + self.cause_size as usize + self.common_addr_size as usize
    }

    /// Check that a station address is encodable with these parameters.
    pub fn valid_common_addr(&self, addr: u16) -> Result<()> {
        use crate::types::{GLOBAL_COMMON_ADDR, INVALID_COMMON_ADDR};
        if addr == INVALID_COMMON_ADDR {
            return Err(Error::CommonAddrZero);
        }
        if self.common_addr_size == 1 && addr != GLOBAL_COMMON_ADDR && addr >= 255 {
            return Err(Error::CommonAddrNotFit(1));
        }
        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::wide()
    }
}
