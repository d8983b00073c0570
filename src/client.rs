//! IEC 60870-5-104 controlling station (master).
//!
//! A [`Client`] owns one connection attempt at a time: it dials the
//! substation within t0, runs the session engine until a fatal error or a
//! caller shutdown, and returns the terminal error from [`Client::start`].
//! Reconnect policy is the caller's concern.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::config::{Config, Params};
use crate::error::{Error, Result};
use crate::session::{
    run_session, ConnState, ConnStateListener, Connection, Handler, SessionContext, Side,
};
use crate::types::{Asdu, Cot, InfoObjAddr, QualifierCountCall};

/// Client configuration: server endpoint, APCI timing and ASDU structure.
#[derive(Debug, Clone)]
pub struct ClientOption {
    /// Server address as `host:port`
    pub server_addr: String,
    /// APCI session configuration
    pub config: Config,
    /// ASDU structure parameters
    pub params: Params,
}

impl ClientOption {
    /// Option set with the standard timing defaults and wide addressing.
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self { server_addr: server_addr.into(), config: Config::default(), params: Params::wide() }
    }

    /// Replace the APCI configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Replace the ASDU structure parameters.
    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// IEC 60870-5-104 master.
pub struct Client {
    option: ClientOption,
    handler: Arc<dyn Handler>,
    on_conn_state: Option<ConnStateListener>,
    conn: Mutex<Option<Connection>>,
    started: AtomicBool,
}

impl Client {
    /// Build a client around a handler for inbound ASDUs.
    pub fn new<H: Handler>(handler: H, option: ClientOption) -> Self {
        Self {
            option,
            handler: Arc::new(handler),
            on_conn_state: None,
            conn: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Register a connection state listener; fires `New`, `Active`,
    /// `Inactive` and `Closed`.
    pub fn on_conn_state<F>(mut self, f: F) -> Self
    where
        F: Fn(&Connection, ConnState) + Send + Sync + 'static,
    {
        self.on_conn_state = Some(Arc::new(f));
        self
    }

    /// Dial the configured server and run the session until it ends.
    ///
    /// Returns `Ok` after [`Client::close`], otherwise the fatal protocol,
    /// timer or transport error. A second concurrent call fails with
    /// [`Error::AlreadyStarted`].
    pub async fn start(&self) -> Result<()> {
        self.option.config.validate()?;
        self.option.params.validate()?;

        if self.started.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyStarted);
        }
        let result = self.dial_and_run().await;
        self.started.store(false, Ordering::Release);
        result
    }

    async fn dial_and_run(&self) -> Result<()> {
        debug!("connecting {}", self.option.server_addr);
        let stream = timeout(
            self.option.config.connect_timeout,
            TcpStream::connect(&self.option.server_addr),
        )
        .await
        .map_err(|_| Error::ConnectTimeout)??;
        stream.set_nodelay(true).ok();
        let peer = stream.peer_addr().ok();
        debug!("connected {peer:?}");
        self.run(stream, peer).await
    }

    /// Run the session over a caller-supplied byte stream.
    ///
    /// This is the hook for TLS wrappers, SSH tunnels or any other custom
    /// dialer: establish the stream yourself and hand it over. The t0
    /// deadline is the caller's responsibility on this path.
    pub async fn start_with_stream<S>(&self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        self.option.config.validate()?;
        self.option.params.validate()?;

        if self.started.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyStarted);
        }
        let result = self.run(stream, None).await;
        self.started.store(false, Ordering::Release);
        result
    }

    async fn run<S>(&self, stream: S, peer: Option<std::net::SocketAddr>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (conn, channels) = Connection::new(&self.option.config, self.option.params, peer);
        *self.conn.lock().expect("client conn slot") = Some(conn.clone());

        let ctx = SessionContext {
            side: Side::Master,
            config: self.option.config,
            handler: self.handler.clone(),
            on_conn_state: self.on_conn_state.clone(),
        };
        let result = run_session(ctx, conn, channels, stream).await;

        *self.conn.lock().expect("client conn slot") = None;
        result
    }

    fn current(&self) -> Result<Connection> {
        self.conn
            .lock()
            .expect("client conn slot")
            .clone()
            .ok_or(Error::UseClosedConnection)
    }

    /// Handle to the live connection, if any.
    pub fn connection(&self) -> Option<Connection> {
        self.conn.lock().expect("client conn slot").clone()
    }

    /// Whether a session is currently up.
    pub fn is_connected(&self) -> bool {
        self.connection().is_some_and(|c| c.is_connected())
    }

    /// Whether data transfer is active.
    pub fn is_active(&self) -> bool {
        self.connection().is_some_and(|c| c.is_active())
    }

    /// Terminate the running session, if any. [`Client::start`] then
    /// returns `Ok`.
    pub fn close(&self) {
        if let Some(conn) = self.connection() {
            conn.close();
        }
    }

    /// Request STARTDT activation.
    pub fn send_start_dt(&self) -> Result<()> {
        self.current()?.start_dt()
    }

    /// Request STOPDT deactivation.
    pub fn send_stop_dt(&self) -> Result<()> {
        self.current()?.stop_dt()
    }

    /// Enqueue an ASDU for transmission.
    pub fn send(&self, asdu: &Asdu) -> Result<()> {
        self.current()?.send(asdu)
    }

    /// Interrogation command, see [`Connection::interrogation_cmd`].
    pub fn interrogation_cmd(&self, cot: Cot, common_addr: u16, qoi: u8) -> Result<()> {
        self.current()?.interrogation_cmd(cot, common_addr, qoi)
    }

    /// Counter interrogation command, see
    /// [`Connection::counter_interrogation_cmd`].
    pub fn counter_interrogation_cmd(
        &self,
        cot: Cot,
        common_addr: u16,
        qcc: QualifierCountCall,
    ) -> Result<()> {
        self.current()?.counter_interrogation_cmd(cot, common_addr, qcc)
    }

    /// Read command for a single information object.
    pub fn read_cmd(&self, common_addr: u16, ioa: InfoObjAddr) -> Result<()> {
        self.current()?.read_cmd(common_addr, ioa)
    }

    /// Clock synchronization command.
    pub fn clock_sync_cmd(
        &self,
        common_addr: u16,
        time: chrono::DateTime<chrono::FixedOffset>,
    ) -> Result<()> {
        self.current()?.clock_sync_cmd(common_addr, time)
    }

    /// Test command.
    pub fn test_cmd(&self, common_addr: u16) -> Result<()> {
        self.current()?.test_cmd(common_addr)
    }

    /// Reset process command.
    pub fn reset_process_cmd(&self, common_addr: u16, qrp: u8) -> Result<()> {
        self.current()?.reset_process_cmd(common_addr, qrp)
    }

    /// Delay acquisition command.
    pub fn delay_acquire_cmd(&self, cot: Cot, common_addr: u16, msec: u16) -> Result<()> {
        self.current()?.delay_acquire_cmd(cot, common_addr, msec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Apdu, ApduCodec};
    use crate::parser::{parse_asdu, Payload};
    use crate::types::{Apci, Cause, UFunction};
    use futures::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_util::codec::Framed;

    fn noop_handler() -> impl Handler {
        |_conn: &Connection, _msg: crate::parser::Message| -> Result<()> { Ok(()) }
    }

    #[test]
    fn test_option_defaults() {
        let option = ClientOption::new("192.168.1.100:2404");
        assert_eq!(option.server_addr, "192.168.1.100:2404");
        assert_eq!(option.config.k, 12);
        assert_eq!(option.params.cause_size, 2);

        let option = option.params(Params::narrow());
        assert_eq!(option.params.info_obj_addr_size, 1);
    }

    #[test]
    fn test_not_connected_operations_fail() {
        let client = Client::new(noop_handler(), ClientOption::new("127.0.0.1:2404"));
        assert!(!client.is_connected());
        assert!(!client.is_active());
        assert!(matches!(client.send_start_dt(), Err(Error::UseClosedConnection)));
        assert!(matches!(
            client.interrogation_cmd(Cot::new(Cause::Activation), 1, 20),
            Err(Error::UseClosedConnection)
        ));
    }

    #[test]
    fn test_invalid_config_rejected_before_dial() {
        let mut config = Config::default();
        config.k = 0;
        let option = ClientOption::new("127.0.0.1:2404").config(config);
        let client = Client::new(noop_handler(), option);

        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        assert!(matches!(rt.block_on(client.start()), Err(Error::Param(_))));
    }

    #[tokio::test]
    async fn test_command_cause_validation() {
        let (local, _remote) = tokio::io::duplex(4096);
        let client = Arc::new(Client::new(noop_handler(), ClientOption::new("unused")));
        let c2 = client.clone();
        tokio::spawn(async move { c2.start_with_stream(local).await });

        for _ in 0..100 {
            if client.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // wrong causes are rejected before touching the wire
        assert!(matches!(
            client.interrogation_cmd(Cot::new(Cause::Spontaneous), 1, 20),
            Err(Error::CommandCause)
        ));
        assert!(matches!(
            client.delay_acquire_cmd(Cot::new(Cause::Request), 1, 100),
            Err(Error::CommandCause)
        ));
    }

    #[tokio::test]
    async fn test_client_session_over_stream() {
        let (local, remote) = tokio::io::duplex(4096);
        let option = ClientOption::new("unused");
        let params = option.params;
        let client = Arc::new(Client::new(noop_handler(), option));

        let runner = client.clone();
        let session = tokio::spawn(async move { runner.start_with_stream(local).await });

        let mut peer = Framed::new(remote, ApduCodec::new());
        for _ in 0..100 {
            if client.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // activation handshake
        client.send_start_dt().unwrap();
        let frame = tokio::time::timeout(Duration::from_secs(5), peer.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(frame.apci, Apci::u_frame(UFunction::StartDtAct));
        peer.send(Apdu::u_frame(UFunction::StartDtCon)).await.unwrap();
        for _ in 0..100 {
            if client.is_active() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // a station interrogation goes out as I-frame 0
        client.interrogation_cmd(Cot::new(Cause::Activation), 0x1234, 20).unwrap();
        let frame = tokio::time::timeout(Duration::from_secs(5), peer.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(frame.apci.send_seq(), Some(0));
        let asdu = Asdu::decode(params, &frame.payload).unwrap();
        let msg = parse_asdu(&asdu).unwrap();
        assert_eq!(msg.payload, Payload::Interrogation { ioa: 0, qoi: 20 });
        assert_eq!(
            &frame.payload[..],
            &[0x64, 0x01, 0x06, 0x00, 0x34, 0x12, 0x00, 0x00, 0x00, 0x14]
        );

        // restart protection while the session is live
        assert!(matches!(
            client.start_with_stream(tokio::io::duplex(16).0).await,
            Err(Error::AlreadyStarted)
        ));

        client.close();
        let result = tokio::time::timeout(Duration::from_secs(5), session).await.unwrap().unwrap();
        assert!(result.is_ok());
        assert!(!client.is_connected());
    }
}
