//! APCI session engine.
//!
//! Per connection, three long-running tasks coordinate through channels: a
//! reader that turns stream bytes into APDUs, a writer that drains raw
//! outbound frames, and the control loop owning every piece of session
//! state (sequence counters, the pending window, the four timers). A
//! fourth task dispatches parsed ASDUs to the user handler so a slow
//! handler cannot stall APCI accounting. No state is shared between tasks
//! except the coarse connected/active flags exposed on [`Connection`].

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::codec::{Apdu, ApduCodec};
use crate::config::{Config, Params};
use crate::encoder::encode_message;
use crate::error::{Error, Result};
use crate::parser::{parse_asdu, Message, Payload};
use crate::types::{
    Asdu, AsduHeader, Cause, Cot, InfoObjAddr, QualifierCountCall, UFunction, Vsq, SEQ_MODULO,
};

/// Timer check resolution of the control loop. The standard speaks in
/// seconds; a tenth of one keeps S-frame acknowledgement prompt.
pub(crate) const TICK: Duration = Duration::from_millis(100);

/// Connection lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// TCP established, fired before any frame is processed
    New,
    /// Data transfer activated by STARTDT
    Active,
    /// Data transfer deactivated by STOPDT
    Inactive,
    /// Session terminated; fired exactly once
    Closed,
}

/// Callback invoked on [`ConnState`] transitions.
pub type ConnStateListener = Arc<dyn Fn(&Connection, ConnState) + Send + Sync>;

/// Processes parsed ASDUs arriving on a connection.
///
/// The handler runs on the connection's dispatch task in peer transmission
/// order; it may call [`Connection::send`] synchronously to reply. A
/// returned error is logged and does not terminate the session.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, conn: &Connection, msg: Message) -> Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&Connection, Message) -> Result<()> + Send + Sync + 'static,
{
    fn handle(&self, conn: &Connection, msg: Message) -> Result<()> {
        self(conn, msg)
    }
}

/// Which end of the link this session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    /// Controlling station: sends STARTDT, consumes confirmations.
    Master,
    /// Controlled station: answers STARTDT/STOPDT activations.
    Substation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ConnectStatus {
    Initial = 0,
    Disconnected = 1,
    Connected = 2,
}

/// Requests from the connection handle into the control loop, so the loop
/// stays the sole owner of the U-frame confirmation deadlines.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SessionCmd {
    StartDt,
    StopDt,
}

struct ConnectionInner {
    params: Params,
    send_tx: mpsc::Sender<Bytes>,
    cmd_tx: mpsc::UnboundedSender<SessionCmd>,
    active: AtomicBool,
    status: AtomicU8,
    cancel: CancellationToken,
    peer_addr: Option<SocketAddr>,
}

/// Handle to a live session, cheap to clone.
///
/// This is the capability handed to [`Handler`] callbacks and state
/// listeners; external callers use it for replies and spontaneous
/// transmissions.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

pub(crate) struct ConnectionChannels {
    pub(crate) send_rx: mpsc::Receiver<Bytes>,
    pub(crate) cmd_rx: mpsc::UnboundedReceiver<SessionCmd>,
}

impl Connection {
    /// Build a connection handle plus the loop-side channel ends. The
    /// submit queue holds `16 * k` marshalled ASDUs.
    pub(crate) fn new(
        config: &Config,
        params: Params,
        peer_addr: Option<SocketAddr>,
    ) -> (Self, ConnectionChannels) {
        let (send_tx, send_rx) = mpsc::channel(usize::from(config.k.max(1)) * 16);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let conn = Self {
            inner: Arc::new(ConnectionInner {
                params,
                send_tx,
                cmd_tx,
                active: AtomicBool::new(false),
                status: AtomicU8::new(ConnectStatus::Initial as u8),
                cancel: CancellationToken::new(),
                peer_addr,
            }),
        };
        (conn, ConnectionChannels { send_rx, cmd_rx })
    }

    /// Read-only view of the ASDU structure parameters.
    pub fn params(&self) -> &Params {
        &self.inner.params
    }

    /// Remote address, when the session runs over a TCP stream.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr
    }

    /// Whether the TCP session is up.
    pub fn is_connected(&self) -> bool {
        self.inner.status.load(Ordering::Acquire) == ConnectStatus::Connected as u8
    }

    /// Whether data transfer has been activated with STARTDT.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    fn set_status(&self, status: ConnectStatus) {
        self.inner.status.store(status as u8, Ordering::Release);
    }

    fn set_active(&self, active: bool) {
        self.inner.active.store(active, Ordering::Release);
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Enqueue an ASDU for transmission.
    ///
    /// Fails fast with [`Error::UseClosedConnection`] when the session is
    /// down, [`Error::NotActive`] before STARTDT, and [`Error::BufferFull`]
    /// when the submit queue is saturated. Encoding errors surface here
    /// synchronously.
    pub fn send(&self, asdu: &Asdu) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::UseClosedConnection);
        }
        if !self.is_active() {
            return Err(Error::NotActive);
        }
        let raw = asdu.encode()?;
        self.inner.send_tx.try_send(raw).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::BufferFull,
            mpsc::error::TrySendError::Closed(_) => Error::UseClosedConnection,
        })
    }

    /// Encode and enqueue a typed message.
    pub fn send_message(&self, msg: &Message) -> Result<()> {
        let asdu = encode_message(self.inner.params, msg)?;
        self.send(&asdu)
    }

    /// Send a mirror of `req` with a different cause, the usual reply to
    /// commands (activation confirmation / termination).
    pub fn send_mirror(&self, req: &Asdu, cause: Cause) -> Result<()> {
        self.send(&req.mirror(cause))
    }

    /// Request STARTDT activation (master side). The confirmation timer
    /// runs inside the control loop.
    pub fn start_dt(&self) -> Result<()> {
        self.inner
            .cmd_tx
            .send(SessionCmd::StartDt)
            .map_err(|_| Error::UseClosedConnection)
    }

    /// Request STOPDT deactivation (master side).
    pub fn stop_dt(&self) -> Result<()> {
        self.inner
            .cmd_tx
            .send(SessionCmd::StopDt)
            .map_err(|_| Error::UseClosedConnection)
    }

    /// Terminate the session. The control loop observes the cancellation
    /// promptly and fires the `Closed` state notification.
    pub fn close(&self) {
        self.inner.cancel.cancel();
    }

    fn command_header(&self, type_id: crate::types::TypeId, cot: Cot) -> AsduHeader {
        AsduHeader {
            type_id,
            vsq: Vsq::single(),
            cot,
            orig_addr: self.inner.params.orig_addr,
            common_addr: 0,
        }
    }

    /// Interrogation command (C_IC_NA_1); cause must be activation or
    /// deactivation.
    pub fn interrogation_cmd(&self, cot: Cot, common_addr: u16, qoi: u8) -> Result<()> {
        if !matches!(cot.cause, Cause::Activation | Cause::Deactivation) {
            return Err(Error::CommandCause);
        }
        let mut header = self.command_header(crate::types::TypeId::InterrogationCommand, cot);
        header.common_addr = common_addr;
        self.send_message(&Message::new(header, Payload::Interrogation { ioa: 0, qoi }))
    }

    /// Counter interrogation command (C_CI_NA_1); cause must be activation.
    pub fn counter_interrogation_cmd(
        &self,
        cot: Cot,
        common_addr: u16,
        qcc: QualifierCountCall,
    ) -> Result<()> {
        if cot.cause != Cause::Activation {
            return Err(Error::CommandCause);
        }
        let mut header = self.command_header(crate::types::TypeId::CounterInterrogation, cot);
        header.common_addr = common_addr;
        self.send_message(&Message::new(header, Payload::CounterInterrogation { ioa: 0, qcc }))
    }

    /// Read command (C_RD_NA_1) for a single information object.
    pub fn read_cmd(&self, common_addr: u16, ioa: InfoObjAddr) -> Result<()> {
        let mut header =
            self.command_header(crate::types::TypeId::ReadCommand, Cot::new(Cause::Request));
        header.common_addr = common_addr;
        self.send_message(&Message::new(header, Payload::Read { ioa }))
    }

    /// Clock synchronization command (C_CS_NA_1).
    pub fn clock_sync_cmd(&self, common_addr: u16, time: DateTime<FixedOffset>) -> Result<()> {
        let mut header =
            self.command_header(crate::types::TypeId::ClockSync, Cot::new(Cause::Activation));
        header.common_addr = common_addr;
        self.send_message(&Message::new(header, Payload::ClockSync { ioa: 0, time: Some(time) }))
    }

    /// Test command (C_TS_NA_1) carrying the fixed test word.
    pub fn test_cmd(&self, common_addr: u16) -> Result<()> {
        let mut header =
            self.command_header(crate::types::TypeId::TestCommand, Cot::new(Cause::Activation));
        header.common_addr = common_addr;
        self.send_message(&Message::new(header, Payload::TestCommand { ioa: 0, is_test_word: true }))
    }

    /// Test command with CP56 time tag (C_TS_TA_1).
    pub fn test_cmd_cp56(&self, common_addr: u16, time: DateTime<FixedOffset>) -> Result<()> {
        let mut header = self
            .command_header(crate::types::TypeId::TestCommandTime56, Cot::new(Cause::Activation));
        header.common_addr = common_addr;
        self.send_message(&Message::new(
            header,
            Payload::TestCommandCp56 { ioa: 0, is_test_word: true, time: Some(time) },
        ))
    }

    /// Reset process command (C_RP_NA_1).
    pub fn reset_process_cmd(&self, common_addr: u16, qrp: u8) -> Result<()> {
        let mut header =
            self.command_header(crate::types::TypeId::ResetProcess, Cot::new(Cause::Activation));
        header.common_addr = common_addr;
        self.send_message(&Message::new(header, Payload::ResetProcess { ioa: 0, qrp }))
    }

    /// Delay acquisition command (C_CD_NA_1); cause must be activation or
    /// spontaneous.
    pub fn delay_acquire_cmd(&self, cot: Cot, common_addr: u16, msec: u16) -> Result<()> {
        if !matches!(cot.cause, Cause::Activation | Cause::Spontaneous) {
            return Err(Error::CommandCause);
        }
        let mut header = self.command_header(crate::types::TypeId::DelayAcquire, cot);
        header.common_addr = common_addr;
        self.send_message(&Message::new(header, Payload::DelayAcquire { ioa: 0, msec }))
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer_addr", &self.inner.peer_addr)
            .field("connected", &self.is_connected())
            .field("active", &self.is_active())
            .finish()
    }
}

/// 15-bit sliding-window distance from `ack` to `next`.
#[inline]
pub(crate) fn seq_no_count(ack: u16, next: u16) -> u16 {
    next.wrapping_sub(ack) & (SEQ_MODULO - 1)
}

#[derive(Debug, Clone, Copy)]
struct SeqPending {
    seq: u16,
    send_time: Instant,
}

/// Sequence-number accounting, private to the control loop.
#[derive(Debug, Default)]
struct SeqState {
    /// Sequence number of the next outbound I-frame
    seq_send: u16,
    /// Oldest outbound sequence number not yet confirmed
    ack_send: u16,
    /// Sequence number expected on the next inbound I-frame
    seq_rcv: u16,
    /// Inbound sequence number we last confirmed to the peer
    ack_rcv: u16,
    /// Outbound I-frames awaiting confirmation, in transmit order
    pending: VecDeque<SeqPending>,
}

impl SeqState {
    /// Apply a peer acknowledgement. Returns false when the acknowledge is
    /// earlier than a previous one or beyond the last frame sent, which is
    /// fatal to the session.
    fn update_ack(&mut self, ack: u16) -> bool {
        if ack == self.ack_send {
            return true;
        }
        if seq_no_count(self.ack_send, self.seq_send) < seq_no_count(ack, self.seq_send) {
            return false;
        }
        let last_confirmed = ack.wrapping_sub(1) & (SEQ_MODULO - 1);
        while let Some(front) = self.pending.pop_front() {
            if front.seq == last_confirmed {
                break;
            }
        }
        self.ack_send = ack;
        true
    }
}

/// Immutable per-session wiring shared by the client and the server.
pub(crate) struct SessionContext {
    pub(crate) side: Side,
    pub(crate) config: Config,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) on_conn_state: Option<ConnStateListener>,
}

impl SessionContext {
    fn notify(&self, conn: &Connection, state: ConnState) {
        if let Some(cb) = &self.on_conn_state {
            cb(conn, state);
        }
    }
}

/// Run a session to completion over `stream`.
///
/// Returns the terminal error: `Ok` for a caller-requested shutdown,
/// otherwise the protocol, timer or transport failure that tore the
/// session down. The `Closed` state notification fires exactly once on
/// the way out.
pub(crate) async fn run_session<S>(
    ctx: SessionContext,
    conn: Connection,
    channels: ConnectionChannels,
    stream: S,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let ConnectionChannels { mut send_rx, mut cmd_rx } = channels;
    let cancel = conn.cancel_token();
    conn.set_active(false);
    conn.set_status(ConnectStatus::Connected);
    ctx.notify(&conn, ConnState::New);

    let framed = Framed::new(stream, ApduCodec::new());
    let (sink, source) = framed.split();

    let recv_cap = usize::from(ctx.config.w.max(1)) * 16;
    let (apdu_tx, mut apdu_rx) = mpsc::channel::<Apdu>(recv_cap);
    // raw frames must never block the control loop
    let (raw_tx, raw_rx) = mpsc::unbounded_channel::<Apdu>();
    let (asdu_tx, asdu_rx) = mpsc::channel::<Bytes>(recv_cap);

    let reader = tokio::spawn(reader_loop(source, apdu_tx, cancel.clone()));
    let writer = tokio::spawn(writer_loop(sink, raw_rx, cancel.clone()));
    let dispatch = tokio::spawn(dispatch_loop(
        asdu_rx,
        ctx.handler.clone(),
        conn.clone(),
        cancel.clone(),
    ));

    let send_u = |function: UFunction| {
        let _ = raw_tx.send(Apdu::u_frame(function));
    };
    let send_s = |recv_seq: u16| {
        debug!("TX ack S[recv={recv_seq}]");
        let _ = raw_tx.send(Apdu::s_frame(recv_seq));
    };

    let mut st = SeqState::default();
    let mut ticker = tokio::time::interval(TICK);
    let mut idle_since = Instant::now();
    let mut unack_rcv_since: Option<Instant> = None;
    let mut testfr_sent: Option<Instant> = None;
    let mut startdt_sent: Option<Instant> = None;
    let mut stopdt_sent: Option<Instant> = None;

    let result: Result<()> = 'session: loop {
        let window_open =
            conn.is_active() && seq_no_count(st.ack_send, st.seq_send) < ctx.config.k;

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("session cancelled");
                break 'session Ok(());
            }

            Some(raw) = send_rx.recv(), if window_open => {
                let seq = st.seq_send;
                debug!("TX I[send={seq}, recv={}]", st.seq_rcv);
                st.ack_rcv = st.seq_rcv; // receive counter piggybacks on the I-frame
                st.seq_send = seq.wrapping_add(1) & (SEQ_MODULO - 1);
                st.pending.push_back(SeqPending { seq, send_time: Instant::now() });
                let _ = raw_tx.send(Apdu::i_frame(seq, st.ack_rcv, raw));
                idle_since = Instant::now();
            }

            Some(cmd) = cmd_rx.recv() => {
                match (cmd, ctx.side) {
                    (SessionCmd::StartDt, Side::Master) => {
                        startdt_sent = Some(Instant::now());
                        send_u(UFunction::StartDtAct);
                    }
                    (SessionCmd::StopDt, Side::Master) => {
                        stopdt_sent = Some(Instant::now());
                        send_u(UFunction::StopDtAct);
                    }
                    (cmd, Side::Substation) => {
                        warn!("{cmd:?} is a controlling-station operation, ignored");
                    }
                }
            }

            apdu = apdu_rx.recv() => {
                let Some(apdu) = apdu else {
                    // reader gone: peer closed or stream failed
                    break 'session Err(Error::RemoteClosed);
                };
                idle_since = Instant::now();

                match apdu.apci {
                    crate::types::Apci::SFrame { recv_seq } => {
                        if !st.update_ack(recv_seq) {
                            error!("fatal acknowledge outside the send window");
                            break 'session Err(Error::AckOutOfWindow {
                                ack: recv_seq,
                                ack_send: st.ack_send,
                                seq_send: st.seq_send,
                            });
                        }
                    }

                    crate::types::Apci::IFrame { send_seq, recv_seq } => {
                        if !conn.is_active() {
                            warn!("station not active, I-frame discarded");
                            continue;
                        }
                        if !st.update_ack(recv_seq) {
                            error!("fatal acknowledge outside the send window");
                            break 'session Err(Error::AckOutOfWindow {
                                ack: recv_seq,
                                ack_send: st.ack_send,
                                seq_send: st.seq_send,
                            });
                        }
                        if send_seq != st.seq_rcv {
                            error!("fatal sequence mismatch: expected {}, got {send_seq}", st.seq_rcv);
                            break 'session Err(Error::SequenceMismatch {
                                expected: st.seq_rcv,
                                actual: send_seq,
                            });
                        }

                        if asdu_tx.send(apdu.payload).await.is_err() {
                            break 'session Err(Error::UseClosedConnection);
                        }

                        if st.ack_rcv == st.seq_rcv {
                            // first unacknowledged inbound frame starts t2
                            unack_rcv_since = Some(Instant::now());
                        }
                        st.seq_rcv = st.seq_rcv.wrapping_add(1) & (SEQ_MODULO - 1);
                        if seq_no_count(st.ack_rcv, st.seq_rcv) >= ctx.config.w {
                            send_s(st.seq_rcv);
                            st.ack_rcv = st.seq_rcv;
                        }
                    }

                    crate::types::Apci::UFrame { function } => {
                        match (UFunction::from_bits(function), ctx.side) {
                            (Some(UFunction::StartDtAct), Side::Substation) => {
                                conn.set_active(true);
                                send_u(UFunction::StartDtCon);
                                ctx.notify(&conn, ConnState::Active);
                            }
                            (Some(UFunction::StartDtCon), Side::Master) => {
                                conn.set_active(true);
                                startdt_sent = None;
                                ctx.notify(&conn, ConnState::Active);
                            }
                            (Some(UFunction::StopDtAct), Side::Substation) => {
                                conn.set_active(false);
                                send_u(UFunction::StopDtCon);
                                ctx.notify(&conn, ConnState::Inactive);
                            }
                            (Some(UFunction::StopDtCon), Side::Master) => {
                                conn.set_active(false);
                                stopdt_sent = None;
                                ctx.notify(&conn, ConnState::Inactive);
                            }
                            (Some(UFunction::TestFrAct), _) => {
                                send_u(UFunction::TestFrCon);
                            }
                            (Some(UFunction::TestFrCon), _) => {
                                testfr_sent = None;
                            }
                            (Some(func), _) => {
                                warn!("U-frame {func} not meaningful for this side, ignored");
                            }
                            (None, _) => {
                                warn!("illegal U-frame function 0x{function:02x} ignored");
                            }
                        }
                    }
                }
            }

            _ = ticker.tick() => {
                let now = Instant::now();
                let t1 = ctx.config.t1;
                let confirm_expired = [testfr_sent, startdt_sent, stopdt_sent]
                    .iter()
                    .any(|t| t.is_some_and(|since| now.duration_since(since) >= t1));
                if confirm_expired {
                    error!("U-frame confirmation timeout t1");
                    break 'session Err(Error::T1Timeout);
                }
                if let Some(front) = st.pending.front() {
                    if now.duration_since(front.send_time) >= t1 {
                        error!("transmission timeout t1 on I-frame {}", front.seq);
                        break 'session Err(Error::T1Timeout);
                    }
                }

                if st.seq_rcv != st.ack_rcv {
                    let t2_expired = unack_rcv_since
                        .is_some_and(|since| now.duration_since(since) >= ctx.config.t2);
                    if t2_expired || now.duration_since(idle_since) >= TICK {
                        send_s(st.seq_rcv);
                        st.ack_rcv = st.seq_rcv;
                    }
                }

                if now.duration_since(idle_since) >= ctx.config.t3 {
                    send_u(UFunction::TestFrAct);
                    testfr_sent = Some(now);
                    idle_since = now;
                }
            }
        }
    };

    conn.set_active(false);
    conn.set_status(ConnectStatus::Disconnected);
    cancel.cancel();
    let _ = reader.await;
    let _ = writer.await;
    let _ = dispatch.await;
    ctx.notify(&conn, ConnState::Closed);
    debug!("session stopped: {result:?}");
    result
}

async fn reader_loop<S>(
    mut source: SplitStream<Framed<S, ApduCodec>>,
    tx: mpsc::Sender<Apdu>,
    cancel: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            item = source.next() => match item {
                Some(Ok(apdu)) => {
                    debug!("RX {apdu}");
                    if tx.send(apdu).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    error!("receive failed, {e}");
                    break;
                }
                None => {
                    debug!("remote connection closed");
                    break;
                }
            },
        }
    }
}

async fn writer_loop<S>(
    mut sink: SplitSink<Framed<S, ApduCodec>, Apdu>,
    mut rx: mpsc::UnboundedReceiver<Apdu>,
    cancel: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            item = rx.recv() => match item {
                Some(apdu) => {
                    debug!("TX {apdu}");
                    if let Err(e) = sink.send(apdu).await {
                        error!("send failed, {e}");
                        cancel.cancel();
                        break;
                    }
                }
                None => break,
            },
        }
    }
}

/// Decode and parse inbound ASDUs, then hand them to the user handler.
/// Malformed payloads are logged and skipped; they were already
/// acknowledged at the APCI level.
async fn dispatch_loop(
    mut rx: mpsc::Receiver<Bytes>,
    handler: Arc<dyn Handler>,
    conn: Connection,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            item = rx.recv() => {
                let Some(raw) = item else { break };
                let asdu = match Asdu::decode(*conn.params(), &raw) {
                    Ok(asdu) => asdu,
                    Err(e) => {
                        warn!("ASDU decode failed, {e}");
                        continue;
                    }
                };
                let msg = match parse_asdu(&asdu) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!("ASDU parse failed for {asdu}, {e}");
                        continue;
                    }
                };
                if let Err(e) = handler.handle(&conn, msg) {
                    warn!("handler failed, {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Apci, QualityDescriptor, TypeId};
    use crate::parser::SinglePointInfo;
    use std::sync::Mutex;

    #[test]
    fn test_seq_no_count() {
        assert_eq!(seq_no_count(0, 0), 0);
        assert_eq!(seq_no_count(0, 5), 5);
        assert_eq!(seq_no_count(5, 5), 0);
        assert_eq!(seq_no_count(32_767, 0), 1);
        assert_eq!(seq_no_count(32_760, 4), 12);
        // distance never exceeds the 15-bit modulus
        assert_eq!(seq_no_count(1, 0), 32_767);
    }

    #[test]
    fn test_update_ack_trims_pending() {
        let mut st = SeqState::default();
        let now = Instant::now();
        for seq in 0..3u16 {
            st.pending.push_back(SeqPending { seq, send_time: now });
        }
        st.seq_send = 3;

        assert!(st.update_ack(2));
        assert_eq!(st.ack_send, 2);
        assert_eq!(st.pending.len(), 1);
        assert_eq!(st.pending[0].seq, 2);

        assert!(st.update_ack(3));
        assert!(st.pending.is_empty());
        assert_eq!(st.ack_send, 3);
    }

    #[test]
    fn test_update_ack_rejects_out_of_window() {
        let mut st = SeqState::default();
        st.seq_send = 2;
        st.pending.push_back(SeqPending { seq: 0, send_time: Instant::now() });
        st.pending.push_back(SeqPending { seq: 1, send_time: Instant::now() });

        // ack beyond the last sent frame
        assert!(!st.update_ack(3));
        // duplicate of the current ack is fine
        assert!(st.update_ack(0));
    }

    #[test]
    fn test_update_ack_wraps() {
        let mut st = SeqState::default();
        st.ack_send = 32_766;
        st.seq_send = 1;
        st.pending.push_back(SeqPending { seq: 32_766, send_time: Instant::now() });
        st.pending.push_back(SeqPending { seq: 32_767, send_time: Instant::now() });

        assert!(st.update_ack(0));
        assert_eq!(st.pending.len(), 1);
        assert_eq!(st.pending[0].seq, 32_767);
        assert!(st.update_ack(1));
        assert!(st.pending.is_empty());
    }

    // Async scenarios drive a session over an in-memory duplex stream with
    // a hand-rolled peer on the other end.

    type Captured = Arc<Mutex<Vec<Message>>>;
    type States = Arc<Mutex<Vec<ConnState>>>;

    fn capture_handler() -> (Captured, Arc<dyn Handler>) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let inner = captured.clone();
        let handler = Arc::new(move |_conn: &Connection, msg: Message| -> Result<()> {
            inner.lock().unwrap().push(msg);
            Ok(())
        });
        (captured, handler)
    }

    fn state_listener() -> (States, ConnStateListener) {
        let states: States = Arc::new(Mutex::new(Vec::new()));
        let inner = states.clone();
        let listener: ConnStateListener = Arc::new(move |_conn: &Connection, s: ConnState| {
            inner.lock().unwrap().push(s);
        });
        (states, listener)
    }

    fn spawn_session(
        side: Side,
        config: Config,
        params: Params,
        handler: Arc<dyn Handler>,
        listener: Option<ConnStateListener>,
        stream: tokio::io::DuplexStream,
    ) -> (Connection, tokio::task::JoinHandle<Result<()>>) {
        let (conn, channels) = Connection::new(&config, params, None);
        let ctx = SessionContext { side, config, handler, on_conn_state: listener };
        let session_conn = conn.clone();
        let handle = tokio::spawn(run_session(ctx, session_conn, channels, stream));
        (conn, handle)
    }

    fn test_asdu(params: Params) -> Asdu {
        let header = AsduHeader::new(
            TypeId::SinglePoint,
            Vsq::new(1, false),
            Cot::new(Cause::Spontaneous),
            1,
        );
        encode_message(
            params,
            &Message::new(
                header,
                Payload::SinglePoint(vec![SinglePointInfo {
                    ioa: 100,
                    value: true,
                    qds: QualityDescriptor::GOOD,
                    time: None,
                }]),
            ),
        )
        .unwrap()
    }

    async fn next_frame(
        framed: &mut Framed<tokio::io::DuplexStream, ApduCodec>,
    ) -> Apdu {
        tokio::time::timeout(Duration::from_secs(5), framed.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("decode failed")
    }

    #[tokio::test]
    async fn test_substation_startdt_handshake_and_dispatch() {
        let (local, remote) = tokio::io::duplex(4096);
        let (captured, handler) = capture_handler();
        let (states, listener) = state_listener();
        let params = Params::wide();

        let (_conn, handle) = spawn_session(
            Side::Substation,
            Config::default(),
            params,
            handler,
            Some(listener),
            local,
        );

        let mut peer = Framed::new(remote, ApduCodec::new());

        // STARTDT handshake
        peer.send(Apdu::u_frame(UFunction::StartDtAct)).await.unwrap();
        let con = next_frame(&mut peer).await;
        assert_eq!(con.apci, Apci::u_frame(UFunction::StartDtCon));

        // interrogation activation as I-frame 0
        let raw = [0x64, 0x01, 0x06, 0x00, 0x34, 0x12, 0x00, 0x00, 0x00, 0x14];
        peer.send(Apdu::i_frame(0, 0, Bytes::copy_from_slice(&raw))).await.unwrap();

        // wait until the dispatch task has delivered it
        for _ in 0..100 {
            if !captured.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let msgs = captured.lock().unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].payload, Payload::Interrogation { ioa: 0, qoi: 20 });
        assert_eq!(msgs[0].header.common_addr, 0x1234);
        drop(msgs);

        // peer disappears; session terminates and reports Closed
        drop(peer);
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(Error::RemoteClosed)));

        let states = states.lock().unwrap();
        assert_eq!(
            states.as_slice(),
            &[ConnState::New, ConnState::Active, ConnState::Closed]
        );
    }

    #[tokio::test]
    async fn test_handler_reply_goes_out_as_i_frame() {
        let (local, remote) = tokio::io::duplex(4096);
        let params = Params::wide();

        // handler mirrors every interrogation with an activation confirm
        let handler = Arc::new(move |conn: &Connection, msg: Message| -> Result<()> {
            if let Payload::Interrogation { .. } = msg.payload {
                let mut header = msg.header;
                header.cot = Cot::new(Cause::ActivationConfirm);
                conn.send_message(&Message::new(header, msg.payload))?;
            }
            Ok(())
        });

        let (_conn, _handle) = spawn_session(
            Side::Substation,
            Config::default(),
            params,
            handler,
            None,
            local,
        );

        let mut peer = Framed::new(remote, ApduCodec::new());
        peer.send(Apdu::u_frame(UFunction::StartDtAct)).await.unwrap();
        assert_eq!(next_frame(&mut peer).await.apci, Apci::u_frame(UFunction::StartDtCon));

        let raw = [0x64, 0x01, 0x06, 0x00, 0x34, 0x12, 0x00, 0x00, 0x00, 0x14];
        peer.send(Apdu::i_frame(0, 0, Bytes::copy_from_slice(&raw))).await.unwrap();

        let reply = next_frame(&mut peer).await;
        assert_eq!(reply.apci, Apci::i_frame(0, 1));
        let asdu = Asdu::decode(params, &reply.payload).unwrap();
        assert_eq!(asdu.header.cot.cause, Cause::ActivationConfirm);
        assert_eq!(asdu.header.type_id, TypeId::InterrogationCommand);
    }

    #[tokio::test]
    async fn test_testfr_act_is_confirmed() {
        let (local, remote) = tokio::io::duplex(4096);
        let (_captured, handler) = capture_handler();

        let (_conn, _handle) = spawn_session(
            Side::Substation,
            Config::default(),
            Params::wide(),
            handler,
            None,
            local,
        );

        let mut peer = Framed::new(remote, ApduCodec::new());
        peer.send(Apdu::u_frame(UFunction::TestFrAct)).await.unwrap();
        assert_eq!(next_frame(&mut peer).await.apci, Apci::u_frame(UFunction::TestFrCon));
    }

    #[tokio::test]
    async fn test_master_window_exhaustion_and_s_frame_release() {
        let (local, remote) = tokio::io::duplex(4096);
        let (_captured, handler) = capture_handler();
        let params = Params::wide();
        let config = Config { k: 2, w: 1, ..Config::default() };

        let (conn, _handle) =
            spawn_session(Side::Master, config, params, handler, None, local);

        let mut peer = Framed::new(remote, ApduCodec::new());

        conn.start_dt().unwrap();
        assert_eq!(next_frame(&mut peer).await.apci, Apci::u_frame(UFunction::StartDtAct));
        peer.send(Apdu::u_frame(UFunction::StartDtCon)).await.unwrap();
        for _ in 0..100 {
            if conn.is_active() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(conn.is_active());

        // three submissions, but k=2 holds the third back
        let asdu = test_asdu(params);
        conn.send(&asdu).unwrap();
        conn.send(&asdu).unwrap();
        conn.send(&asdu).unwrap();

        assert_eq!(next_frame(&mut peer).await.apci.send_seq(), Some(0));
        assert_eq!(next_frame(&mut peer).await.apci.send_seq(), Some(1));
        assert!(
            tokio::time::timeout(Duration::from_millis(300), peer.next()).await.is_err(),
            "third I-frame must wait for the window to open"
        );

        // acknowledging both releases the third frame
        peer.send(Apdu::s_frame(2)).await.unwrap();
        assert_eq!(next_frame(&mut peer).await.apci.send_seq(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_t1_expiry_on_unacknowledged_i_frame() {
        let (local, remote) = tokio::io::duplex(4096);
        let (_captured, handler) = capture_handler();
        let (states, listener) = state_listener();
        let params = Params::wide();
        // keep t3 out of the way so only t1 can fire
        let config = Config {
            t1: Duration::from_secs(1),
            t3: Duration::from_secs(48 * 3600),
            ..Config::default()
        };

        let (conn, handle) =
            spawn_session(Side::Master, config, params, handler, Some(listener), local);

        let mut peer = Framed::new(remote, ApduCodec::new());
        conn.start_dt().unwrap();
        assert_eq!(next_frame(&mut peer).await.apci, Apci::u_frame(UFunction::StartDtAct));
        peer.send(Apdu::u_frame(UFunction::StartDtCon)).await.unwrap();
        while !conn.is_active() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        conn.send(&test_asdu(params)).unwrap();
        assert_eq!(next_frame(&mut peer).await.apci.send_seq(), Some(0));

        // no acknowledgement: virtual time runs into t1
        let result = tokio::time::timeout(Duration::from_secs(30), handle)
            .await
            .expect("session should have timed out")
            .unwrap();
        assert!(matches!(result, Err(Error::T1Timeout)));
        assert_eq!(states.lock().unwrap().last(), Some(&ConnState::Closed));
        assert!(!conn.is_connected());

        // queued sends now fail closed
        assert!(matches!(conn.send(&test_asdu(params)), Err(Error::UseClosedConnection)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_t3_idle_triggers_testfr_cycle() {
        let (local, remote) = tokio::io::duplex(4096);
        let (_captured, handler) = capture_handler();
        let config = Config {
            t1: Duration::from_secs(2),
            t3: Duration::from_secs(1),
            ..Config::default()
        };

        let (_conn, handle) = spawn_session(
            Side::Master,
            config,
            Params::wide(),
            handler,
            None,
            local,
        );

        let mut peer = Framed::new(remote, ApduCodec::new());

        // idle for t3: keep-alive goes out; confirming it keeps the session up
        assert_eq!(next_frame(&mut peer).await.apci, Apci::u_frame(UFunction::TestFrAct));
        peer.send(Apdu::u_frame(UFunction::TestFrCon)).await.unwrap();

        // another idle period, another keep-alive
        assert_eq!(next_frame(&mut peer).await.apci, Apci::u_frame(UFunction::TestFrAct));

        // this time the confirmation never comes: t1 kills the session
        let result = tokio::time::timeout(Duration::from_secs(30), handle)
            .await
            .expect("session should have timed out")
            .unwrap();
        assert!(matches!(result, Err(Error::T1Timeout)));
    }

    #[tokio::test]
    async fn test_send_before_activation_is_rejected() {
        let (local, _remote) = tokio::io::duplex(4096);
        let (_captured, handler) = capture_handler();
        let params = Params::wide();

        let (conn, _handle) = spawn_session(
            Side::Master,
            Config::default(),
            params,
            handler,
            None,
            local,
        );

        // connected but not yet active
        for _ in 0..100 {
            if conn.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(matches!(conn.send(&test_asdu(params)), Err(Error::NotActive)));
    }

    #[tokio::test]
    async fn test_close_fires_closed_once() {
        let (local, _remote) = tokio::io::duplex(4096);
        let (_captured, handler) = capture_handler();
        let (states, listener) = state_listener();

        let (conn, handle) = spawn_session(
            Side::Substation,
            Config::default(),
            Params::wide(),
            handler,
            Some(listener),
            local,
        );

        for _ in 0..100 {
            if conn.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        conn.close();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());

        let states = states.lock().unwrap();
        assert_eq!(states.as_slice(), &[ConnState::New, ConnState::Closed]);
    }
}
