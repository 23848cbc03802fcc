//! UDP link to the shared store
//!
//! The render loop owns a [`NetworkStore`]; the socket lives on a dedicated
//! thread running a single-threaded tokio runtime. The two sides only talk
//! through channels, so a slow or dead network never stalls a frame.

use log::{debug, error, info, warn};
use shared::{Packet, ProtocolError, StoreOp, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::shared_store::{SharedStore, StoreNotice};

/// Heartbeats keep the session alive; while not yet connected the same tick
/// retries the handshake.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid store address {0:?}")]
    Address(String),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug)]
enum Command {
    Op(StoreOp),
    Shutdown,
}

pub struct NetworkStore {
    commands: mpsc::UnboundedSender<Command>,
    notices: std_mpsc::Receiver<StoreNotice>,
    worker: Option<JoinHandle<()>>,
}

impl NetworkStore {
    /// Starts the network thread and begins the handshake with `server`.
    /// Returns immediately; a [`StoreNotice::Connected`] arrives once the
    /// store accepts the session.
    pub fn connect(server: &str, session_id: String) -> Result<Self, NetworkError> {
        let server_addr: SocketAddr = server
            .parse()
            .map_err(|_| NetworkError::Address(server.to_string()))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = std_mpsc::channel();

        let worker = std::thread::Builder::new()
            .name("store-link".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to start network runtime: {}", e);
                        return;
                    }
                };

                let result = runtime.block_on(run_connection(
                    server_addr,
                    session_id,
                    command_rx,
                    notice_tx.clone(),
                ));
                if let Err(e) = result {
                    error!("Store link failed: {}", e);
                    let _ = notice_tx.send(StoreNotice::Disconnected {
                        reason: e.to_string(),
                    });
                }
            })?;

        Ok(Self {
            commands: command_tx,
            notices: notice_rx,
            worker: Some(worker),
        })
    }

    /// Says goodbye to the store and waits for the network thread to exit.
    pub fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Network thread panicked");
            }
        }
    }
}

impl SharedStore for NetworkStore {
    fn send(&mut self, op: StoreOp) {
        if self.commands.send(Command::Op(op)).is_err() {
            debug!("Network thread gone, dropping operation");
        }
    }

    fn poll_event(&mut self) -> Option<StoreNotice> {
        self.notices.try_recv().ok()
    }
}

impl Drop for NetworkStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn send_packet(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), NetworkError> {
    let data = packet.encode()?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

async fn run_connection(
    server_addr: SocketAddr,
    session_id: String,
    mut commands: mpsc::UnboundedReceiver<Command>,
    notices: std_mpsc::Sender<StoreNotice>,
) -> Result<(), NetworkError> {
    let bind_addr = if server_addr.is_ipv4() {
        "0.0.0.0:0"
    } else {
        "[::]:0"
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    let connect = Packet::Connect {
        client_version: PROTOCOL_VERSION,
        session_id: session_id.clone(),
    };

    info!("Connecting to store at {} as {}", server_addr, session_id);
    send_packet(&socket, &connect, server_addr).await?;

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    let mut buffer = vec![0u8; MAX_PACKET_SIZE];
    let mut connected = false;

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buffer) => {
                let (len, from) = match result {
                    Ok(received) => received,
                    Err(e) => {
                        // ICMP port unreachable surfaces here on some platforms
                        debug!("Receive error: {}", e);
                        continue;
                    }
                };
                if from != server_addr {
                    debug!("Ignoring datagram from {}", from);
                    continue;
                }

                let notice = match Packet::decode(&buffer[..len]) {
                    Ok(Packet::Connected { session_id }) => {
                        connected = true;
                        info!("Store accepted session {}", session_id);
                        StoreNotice::Connected { session_id }
                    }
                    Ok(Packet::Event(event)) => StoreNotice::Event(event),
                    Ok(Packet::Disconnected { reason }) => {
                        connected = false;
                        warn!("Store dropped us: {}", reason);
                        StoreNotice::Disconnected { reason }
                    }
                    Ok(other) => {
                        warn!("Unexpected packet from store: {:?}", other);
                        continue;
                    }
                    Err(e) => {
                        warn!("Failed to decode packet from store: {}", e);
                        continue;
                    }
                };

                if notices.send(notice).is_err() {
                    break;
                }
            }

            command = commands.recv() => {
                match command {
                    Some(Command::Op(op)) if connected => {
                        if let Err(e) = send_packet(&socket, &Packet::Op(op), server_addr).await {
                            warn!("Failed to send operation: {}", e);
                        }
                    }
                    Some(Command::Op(op)) => {
                        debug!("Not connected, dropping {:?}", op);
                    }
                    Some(Command::Shutdown) | None => {
                        if connected {
                            send_packet(&socket, &Packet::Disconnect, server_addr).await?;
                        }
                        info!("Store link closed");
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                let packet = if connected { &Packet::Heartbeat } else { &connect };
                if let Err(e) = send_packet(&socket, packet, server_addr).await {
                    warn!("Failed to send heartbeat: {}", e);
                }
            }
        }
    }

    Ok(())
}
