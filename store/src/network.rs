//! UDP front end coordinating sessions and the store engine

use crate::engine::{Delivery, StoreEngine};
use crate::session_manager::{Admission, SessionManager};
use crate::StoreError;
use log::{debug, error, info, warn};
use shared::{timestamp_ms, Packet, StoreOp, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Runtime knobs for the store server.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub max_sessions: usize,
    /// Silence after which a session is dropped and its hooks run.
    pub session_timeout: Duration,
    pub timeout_check_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: 64,
            session_timeout: Duration::from_secs(5),
            timeout_check_interval: Duration::from_secs(1),
        }
    }
}

/// Messages sent from network tasks to the main store loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    SessionTimeout { session_id: String },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum OutboundMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    Deliver { session_id: String, packet: Packet },
}

pub struct Server {
    socket: Arc<UdpSocket>,
    sessions: Arc<RwLock<SessionManager>>,
    engine: StoreEngine,
    config: StoreConfig,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    out_tx: mpsc::UnboundedSender<OutboundMessage>,
    out_rx: Option<mpsc::UnboundedReceiver<OutboundMessage>>,
}

impl Server {
    pub async fn new(addr: &str, config: StoreConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Store listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            sessions: Arc::new(RwLock::new(SessionManager::new(
                config.max_sessions,
                config.session_timeout,
            ))),
            engine: StoreEngine::new(),
            config,
            server_tx,
            server_rx,
            out_tx,
            out_rx: Some(out_rx),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle that makes [`Server::run`] return.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match Packet::decode(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to decode packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let Some(mut out_rx) = self.out_rx.take() else {
            return;
        };
        let socket = Arc::clone(&self.socket);
        let sessions = Arc::clone(&self.sessions);

        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let (packet, addr) = match message {
                    OutboundMessage::SendPacket { packet, addr } => (packet, addr),
                    OutboundMessage::Deliver { session_id, packet } => {
                        let addr = sessions.read().await.session_addr(&session_id);
                        match addr {
                            Some(addr) => (packet, addr),
                            None => {
                                debug!("Dropping delivery for departed session {}", session_id);
                                continue;
                            }
                        }
                    }
                };

                if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
        });
    }

    /// Spawns task that monitors session timeouts
    fn spawn_timeout_checker(&self) {
        let sessions = Arc::clone(&self.sessions);
        let server_tx = self.server_tx.clone();
        let period = self.config.timeout_check_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                let timed_out = sessions.write().await.check_timeouts();

                for session_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::SessionTimeout { session_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = packet.encode()?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.out_tx.send(OutboundMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn dispatch(&self, deliveries: Vec<Delivery>) {
        for Delivery { session_id, event } in deliveries {
            let message = OutboundMessage::Deliver {
                session_id,
                packet: Packet::Event(event),
            };
            if let Err(e) = self.out_tx.send(message) {
                error!("Failed to queue delivery: {}", e);
                return;
            }
        }
    }

    async fn handle_connect(&mut self, client_version: u32, session_id: String, addr: SocketAddr) {
        if client_version != PROTOCOL_VERSION {
            warn!(
                "Rejecting {} from {}: protocol version {}",
                session_id, addr, client_version
            );
            self.send_packet(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // A different identity reusing this address means the old one is gone
        let previous = self.sessions.read().await.find_session_by_addr(addr);
        if let Some(previous) = previous.filter(|previous| *previous != session_id) {
            self.sessions.write().await.remove_session(&previous);
            let deliveries = self.engine.close_session(&previous);
            self.dispatch(deliveries);
        }

        let admission = self.sessions.write().await.add_session(&session_id, addr);
        match admission {
            Ok(admission) => {
                if let Admission::Replaced { previous_addr } = admission {
                    debug!("{} moved from {} to {}", session_id, previous_addr, addr);
                }
                let deliveries = self.engine.open_session(&session_id);
                self.dispatch(deliveries);
                self.send_packet(Packet::Connected { session_id }, addr);
            }
            Err(e) => {
                warn!("Refusing {} from {}: {}", session_id, addr, e);
                self.send_packet(
                    Packet::Disconnected {
                        reason: e.to_string(),
                    },
                    addr,
                );
            }
        }
    }

    fn handle_op(&mut self, session_id: &str, op: StoreOp) {
        match self.engine.apply(session_id, op, timestamp_ms()) {
            Ok(deliveries) => self.dispatch(deliveries),
            Err(e @ StoreError::UnknownSession(_)) => error!("Engine out of sync: {}", e),
            Err(e) => warn!("Dropped op from {}: {}", session_id, e),
        }
    }

    /// Runs the disconnect hooks of a session the timeout checker dropped.
    ///
    /// The checker and the main loop race: the same identity may have
    /// reconnected after the check but before this message was handled, in
    /// which case the live session must be left alone.
    async fn handle_timeout(&mut self, session_id: String) {
        if self.sessions.read().await.session_addr(&session_id).is_some() {
            debug!("{} reconnected before its timeout was handled", session_id);
            return;
        }

        let deliveries = self.engine.close_session(&session_id);
        self.dispatch(deliveries);
        debug!(
            "{} sessions, {} records",
            self.engine.session_count(),
            self.engine.database().len()
        );
    }

    /// Processes one incoming packet
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                session_id,
            } => {
                self.handle_connect(client_version, session_id, addr).await;
            }

            Packet::Op(op) => {
                let session_id = self.sessions.write().await.touch(addr);
                match session_id {
                    Some(session_id) => self.handle_op(&session_id, op),
                    None => {
                        debug!("Op from unknown address {}", addr);
                        self.send_packet(
                            Packet::Disconnected {
                                reason: "Unknown session".to_string(),
                            },
                            addr,
                        );
                    }
                }
            }

            Packet::Heartbeat => {
                let session_id = self.sessions.write().await.touch(addr);
                if session_id.is_none() {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Unknown session".to_string(),
                        },
                        addr,
                    );
                }
            }

            Packet::Disconnect => {
                let session_id = self.sessions.read().await.find_session_by_addr(addr);
                if let Some(session_id) = session_id {
                    self.sessions.write().await.remove_session(&session_id);
                    let deliveries = self.engine.close_session(&session_id);
                    self.dispatch(deliveries);
                }
            }

            _ => {
                warn!("Unexpected packet type from {}", addr);
            }
        }
    }

    /// Main store loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Store started successfully");

        loop {
            match self.server_rx.recv().await {
                Some(ServerMessage::PacketReceived { packet, addr }) => {
                    self.handle_packet(packet, addr).await;
                }
                Some(ServerMessage::SessionTimeout { session_id }) => {
                    self.handle_timeout(session_id).await;
                }
                Some(ServerMessage::Shutdown) | None => {
                    info!("Store shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::StoreEvent;

    async fn recv_packet(socket: &UdpSocket) -> Packet {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("timed out waiting for store")
            .unwrap();
        Packet::decode(&buf[..len]).unwrap()
    }

    async fn send(socket: &UdpSocket, packet: Packet, addr: SocketAddr) {
        socket.send_to(&packet.encode().unwrap(), addr).await.unwrap();
    }

    async fn start_store(config: StoreConfig) -> SocketAddr {
        let mut server = Server::new("127.0.0.1:0", config).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr
    }

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.session_timeout, Duration::from_secs(5));
        assert!(config.timeout_check_interval < config.session_timeout);
        assert!(config.max_sessions > 0);
    }

    #[tokio::test]
    async fn test_connect_and_subscribe() {
        let store = start_store(StoreConfig::default()).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send(
            &socket,
            Packet::Connect {
                client_version: PROTOCOL_VERSION,
                session_id: "a".to_string(),
            },
            store,
        )
        .await;
        assert_eq!(
            recv_packet(&socket).await,
            Packet::Connected {
                session_id: "a".to_string()
            }
        );

        send(
            &socket,
            Packet::Op(StoreOp::Set {
                path: "players/a".to_string(),
                value: "{\"x\":1}".to_string(),
            }),
            store,
        )
        .await;
        send(
            &socket,
            Packet::Op(StoreOp::SubscribeValue {
                path: "players".to_string(),
            }),
            store,
        )
        .await;

        match recv_packet(&socket).await {
            Packet::Event(StoreEvent::Value { path, children }) => {
                assert_eq!(path, "players");
                assert_eq!(children, vec![("a".to_string(), "{\"x\":1}".to_string())]);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reconnect_survives_stale_timeout() {
        let config = StoreConfig {
            session_timeout: Duration::from_millis(1),
            ..StoreConfig::default()
        };
        let mut server = Server::new("127.0.0.1:0", config).await.unwrap();
        let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();

        server
            .handle_connect(PROTOCOL_VERSION, "a".to_string(), addr)
            .await;
        for op in [
            StoreOp::OnDisconnectRemove {
                path: "players/a".to_string(),
            },
            StoreOp::Set {
                path: "players/a".to_string(),
                value: "{}".to_string(),
            },
        ] {
            server.engine.apply("a", op, 0).unwrap();
        }

        // The checker drops the session, then a reconnect lands before the
        // main loop sees the timeout
        tokio::time::sleep(Duration::from_millis(10)).await;
        let timed_out = server.sessions.write().await.check_timeouts();
        assert_eq!(timed_out, vec!["a".to_string()]);

        server
            .handle_connect(PROTOCOL_VERSION, "a".to_string(), addr)
            .await;
        assert!(server.engine.database().get("players/a").is_none());

        server.handle_timeout("a".to_string()).await;

        assert!(server.engine.has_session("a"));
        let publish = StoreOp::Set {
            path: "players/a".to_string(),
            value: "{}".to_string(),
        };
        assert!(server.engine.apply("a", publish, 1).is_ok());
        assert!(server.engine.database().get("players/a").is_some());
    }

    #[tokio::test]
    async fn test_shutdown_stops_run() {
        let mut server = Server::new("127.0.0.1:0", StoreConfig::default())
            .await
            .unwrap();
        let handle = server.shutdown_handle();
        let running = tokio::spawn(async move { server.run().await.is_ok() });

        handle.send(ServerMessage::Shutdown).unwrap();
        let stopped = tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("store kept running")
            .unwrap();
        assert!(stopped);
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let store = start_store(StoreConfig::default()).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send(
            &socket,
            Packet::Connect {
                client_version: PROTOCOL_VERSION + 1,
                session_id: "a".to_string(),
            },
            store,
        )
        .await;

        match recv_packet(&socket).await {
            Packet::Disconnected { reason } => assert!(reason.contains("version")),
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_session_told_to_reconnect() {
        let store = start_store(StoreConfig::default()).await;
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        send(&socket, Packet::Heartbeat, store).await;

        match recv_packet(&socket).await {
            Packet::Disconnected { reason } => assert_eq!(reason, "Unknown session"),
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_runs_disconnect_hook() {
        let config = StoreConfig {
            session_timeout: Duration::from_millis(200),
            timeout_check_interval: Duration::from_millis(50),
            ..StoreConfig::default()
        };
        let store = start_store(config).await;
        let watcher = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let quitter = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        for (socket, id) in [(&watcher, "watcher"), (&quitter, "quitter")] {
            send(
                socket,
                Packet::Connect {
                    client_version: PROTOCOL_VERSION,
                    session_id: id.to_string(),
                },
                store,
            )
            .await;
            recv_packet(socket).await;
        }

        send(
            &quitter,
            Packet::Op(StoreOp::OnDisconnectRemove {
                path: "players/quitter".to_string(),
            }),
            store,
        )
        .await;
        send(
            &quitter,
            Packet::Op(StoreOp::Set {
                path: "players/quitter".to_string(),
                value: "{}".to_string(),
            }),
            store,
        )
        .await;
        send(
            &watcher,
            Packet::Op(StoreOp::SubscribeValue {
                path: "players".to_string(),
            }),
            store,
        )
        .await;

        // Keep the watcher alive while the quitter goes silent
        let mut saw_quitter = false;
        let mut saw_removal = false;
        for _ in 0..20 {
            send(&watcher, Packet::Heartbeat, store).await;
            let mut buf = vec![0u8; MAX_PACKET_SIZE];
            let received =
                tokio::time::timeout(Duration::from_millis(100), watcher.recv_from(&mut buf)).await;
            if let Ok(Ok((len, _))) = received {
                if let Ok(Packet::Event(StoreEvent::Value { children, .. })) =
                    Packet::decode(&buf[..len])
                {
                    if children.iter().any(|(key, _)| key == "quitter") {
                        saw_quitter = true;
                    } else if saw_quitter {
                        saw_removal = true;
                        break;
                    }
                }
            }
        }

        assert!(saw_quitter);
        assert!(saw_removal);
    }
}
