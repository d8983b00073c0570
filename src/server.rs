//! IEC 60870-5-104 controlled station (substation) acceptor.
//!
//! The server accepts TCP connections and runs one session engine per
//! peer, all sharing a single handler and configuration. Shutdown closes
//! the listener and every live session, then waits for the session tasks
//! to drain within a deadline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

use crate::config::{Config, Params};
use crate::error::{Error, Result};
use crate::session::{
    run_session, ConnState, ConnStateListener, Connection, Handler, SessionContext, Side,
};
use crate::types::Asdu;

/// IEC 60870-5-104 substation server.
pub struct Server {
    config: Config,
    params: Params,
    handler: Arc<dyn Handler>,
    on_conn_state: Option<ConnStateListener>,
    sessions: Arc<Mutex<HashMap<u64, Connection>>>,
    next_id: AtomicU64,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Server {
    /// Build a server with the standard timing defaults and wide
    /// addressing.
    pub fn new<H: Handler>(handler: H) -> Self {
        Self {
            config: Config::default(),
            params: Params::wide(),
            handler: Arc::new(handler),
            on_conn_state: None,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
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

    /// Register a connection state listener shared by every session.
    pub fn on_conn_state<F>(mut self, f: F) -> Self
    where
        F: Fn(&Connection, ConnState) + Send + Sync + 'static,
    {
        self.on_conn_state = Some(Arc::new(f));
        self
    }

    /// Bind `addr` and serve until shut down or the listener fails.
    pub async fn listen_and_serve(&self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        self.config.validate()?;
        self.params.validate()?;

        debug!("server listening on {:?}", listener.local_addr().ok());
        loop {
            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("server accept loop stopped");
                    return Err(Error::ServerClosed);
                }
                accepted = listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!("accept failed, {e}");
                    return Err(e.into());
                }
            };
            stream.set_nodelay(true).ok();
            debug!("accepted {peer}");

            let (conn, channels) = Connection::new(&self.config, self.params, Some(peer));
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.sessions.lock().expect("session table").insert(id, conn.clone());

            let ctx = SessionContext {
                side: Side::Substation,
                config: self.config,
                handler: self.handler.clone(),
                on_conn_state: self.on_conn_state.clone(),
            };
            let sessions = self.sessions.clone();
            self.tracker.spawn(async move {
                let result = run_session(ctx, conn, channels, stream).await;
                if let Err(e) = result {
                    debug!("session {peer} ended, {e}");
                }
                sessions.lock().expect("session table").remove(&id);
            });
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("session table").len()
    }

    /// Send an ASDU to every live session. Sessions that are inactive or
    /// saturated are skipped.
    pub fn broadcast(&self, asdu: &Asdu) {
        for conn in self.sessions.lock().expect("session table").values() {
            let _ = conn.send(asdu);
        }
    }

    /// Stop accepting and close every live session without waiting.
    pub fn close(&self) {
        self.cancel.cancel();
        let sessions: Vec<Connection> =
            self.sessions.lock().expect("session table").values().cloned().collect();
        for conn in sessions {
            conn.close();
        }
    }

    /// [`close`](Server::close), then wait up to `deadline` for the
    /// session loops to return.
    pub async fn shutdown(&self, deadline: Duration) -> Result<()> {
        self.close();
        self.tracker.close();
        timeout(deadline, self.tracker.wait())
            .await
            .map_err(|_| Error::Io(std::io::ErrorKind::TimedOut.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Apdu, ApduCodec};
    use crate::encoder::encode_message;
    use crate::parser::{parse_asdu, Message, Payload, SinglePointInfo};
    use crate::types::{
        Apci, AsduHeader, Cause, Cot, QualityDescriptor, TypeId, UFunction, Vsq,
    };
    use bytes::Bytes;
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpStream;
    use tokio_util::codec::Framed;

    async fn next_frame(peer: &mut Framed<TcpStream, ApduCodec>) -> Apdu {
        tokio::time::timeout(Duration::from_secs(5), peer.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("decode failed")
    }

    fn interrogation_responder() -> impl Handler {
        |conn: &Connection, msg: Message| -> Result<()> {
            if let Payload::Interrogation { .. } = msg.payload {
                let mut header = msg.header;
                header.cot = Cot::new(Cause::ActivationConfirm);
                conn.send_message(&Message::new(header, msg.payload))?;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_accept_handshake_dispatch_and_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Arc::new(Server::new(interrogation_responder()));
        let serving = server.clone();
        let serve_task = tokio::spawn(async move { serving.serve(listener).await });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut peer = Framed::new(stream, ApduCodec::new());

        // activation handshake
        peer.send(Apdu::u_frame(UFunction::StartDtAct)).await.unwrap();
        assert_eq!(next_frame(&mut peer).await.apci, Apci::u_frame(UFunction::StartDtCon));

        for _ in 0..100 {
            if server.session_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(server.session_count(), 1);

        // interrogation is answered with an activation confirmation
        let raw = [0x64, 0x01, 0x06, 0x00, 0x34, 0x12, 0x00, 0x00, 0x00, 0x14];
        peer.send(Apdu::i_frame(0, 0, Bytes::copy_from_slice(&raw))).await.unwrap();
        let reply = next_frame(&mut peer).await;
        assert_eq!(reply.apci.send_seq(), Some(0));
        let asdu = Asdu::decode(Params::wide(), &reply.payload).unwrap();
        assert_eq!(asdu.header.cot.cause, Cause::ActivationConfirm);

        // broadcast reaches the activated session
        let header = AsduHeader::new(
            TypeId::SinglePoint,
            Vsq::new(1, false),
            Cot::new(Cause::Spontaneous),
            0x1234,
        );
        let point = encode_message(
            Params::wide(),
            &Message::new(
                header,
                Payload::SinglePoint(vec![SinglePointInfo {
                    ioa: 7,
                    value: true,
                    qds: QualityDescriptor::GOOD,
                    time: None,
                }]),
            ),
        )
        .unwrap();
        server.broadcast(&point);

        let pushed = next_frame(&mut peer).await;
        assert_eq!(pushed.apci.send_seq(), Some(1));
        let asdu = Asdu::decode(Params::wide(), &pushed.payload).unwrap();
        let msg = parse_asdu(&asdu).unwrap();
        let Payload::SinglePoint(items) = msg.payload else { panic!("wrong payload") };
        assert_eq!(items[0].ioa, 7);

        // shutdown drains the session and stops the accept loop
        server.shutdown(Duration::from_secs(5)).await.unwrap();
        assert_eq!(server.session_count(), 0);
        let serve_result =
            tokio::time::timeout(Duration::from_secs(5), serve_task).await.unwrap().unwrap();
        assert!(matches!(serve_result, Err(Error::ServerClosed)));

        // the peer observes the close
        let eof = tokio::time::timeout(Duration::from_secs(5), peer.next()).await.unwrap();
        assert!(eof.is_none() || eof.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_inactive_session_drops_i_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let received = Arc::new(Mutex::new(0usize));
        let counter = received.clone();
        let handler = move |_conn: &Connection, _msg: Message| -> Result<()> {
            *counter.lock().unwrap() += 1;
            Ok(())
        };

        let server = Arc::new(Server::new(handler));
        let serving = server.clone();
        tokio::spawn(async move { serving.serve(listener).await });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut peer = Framed::new(stream, ApduCodec::new());

        // no STARTDT: the I-frame must be logged and discarded
        let raw = [0x64, 0x01, 0x06, 0x00, 0x34, 0x12, 0x00, 0x00, 0x00, 0x14];
        peer.send(Apdu::i_frame(0, 0, Bytes::copy_from_slice(&raw))).await.unwrap();

        // a subsequent TESTFR still answers, proving the session survived
        peer.send(Apdu::u_frame(UFunction::TestFrAct)).await.unwrap();
        assert_eq!(next_frame(&mut peer).await.apci, Apci::u_frame(UFunction::TestFrCon));
        assert_eq!(*received.lock().unwrap(), 0);

        server.close();
    }

    #[tokio::test]
    async fn test_fatal_sequence_error_tears_session_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = Arc::new(Server::new(interrogation_responder()));
        let serving = server.clone();
        tokio::spawn(async move { serving.serve(listener).await });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut peer = Framed::new(stream, ApduCodec::new());

        peer.send(Apdu::u_frame(UFunction::StartDtAct)).await.unwrap();
        assert_eq!(next_frame(&mut peer).await.apci, Apci::u_frame(UFunction::StartDtCon));

        // an acknowledge for a frame the server never sent is fatal
        peer.send(Apdu::s_frame(5)).await.unwrap();

        let eof = tokio::time::timeout(Duration::from_secs(5), peer.next()).await.unwrap();
        assert!(eof.is_none() || eof.unwrap().is_err());

        for _ in 0..100 {
            if server.session_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(server.session_count(), 0);
        server.close();
    }
}
