//! # iec104
//!
//! IEC 60870-5-104 telecontrol protocol stack for Rust: the TCP transport
//! used between SCADA masters and remote telemetry units in electric-power
//! and similar industrial domains.
//!
//! The crate has two tightly coupled halves:
//!
//! - **APCI session engine**: sequence-numbered I/S/U framing over a
//!   single TCP connection, with the standard's four timers (t0..t3), the
//!   k/w sliding windows, STARTDT/STOPDT activation and TESTFR keep-alive.
//! - **ASDU codec**: a non-destructive parser and encoder covering the
//!   monitored-point, command, setpoint, parameter and system-command
//!   message families with configurable address widths and time tags.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use iec104::{Client, ClientOption, Connection, Message, QOI_STATION};
//! use iec104::{Cause, Cot};
//!
//! #[tokio::main]
//! async fn main() -> iec104::Result<()> {
//!     let handler = |_conn: &Connection, msg: Message| {
//!         println!("RX {:?}", msg.payload);
//!         Ok(())
//!     };
//!     let client = Client::new(handler, ClientOption::new("192.168.1.100:2404"))
//!         .on_conn_state(|conn, state| {
//!             if state == iec104::ConnState::New {
//!                 conn.start_dt().ok();
//!             }
//!             if state == iec104::ConnState::Active {
//!                 conn.interrogation_cmd(Cot::new(Cause::Activation), 1, QOI_STATION).ok();
//!             }
//!         });
//!
//!     // runs until a fatal error or client.close()
//!     client.start().await
//! }
//! ```
//!
//! A substation mirrors this with [`Server`] and the same [`Handler`]
//! shape; see the `server` module.
//!
//! ## Wire format
//!
//! ```text
//! APDU:  | 0x68 | length | control field (4) | ASDU (0..249) |
//! ASDU:  | type | vsq | cause [1,2] | common address [1,2] | objects |
//! ```
//!
//! Default ports: 2404 plain, 19998 TLS (bring your own stream via
//! [`Client::start_with_stream`]).

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod client;
pub mod codec;
pub mod config;
pub mod encoder;
pub mod error;
pub mod parser;
mod process;
pub mod server;
pub mod session;
pub mod types;

pub use client::{Client, ClientOption};
pub use codec::{Apdu, ApduCodec};
pub use config::{Config, Params, PORT, PORT_SECURE};
pub use encoder::encode_message;
pub use error::{Error, Result};
pub use parser::*;
pub use server::Server;
pub use session::{ConnState, ConnStateListener, Connection, Handler};
pub use types::*;
