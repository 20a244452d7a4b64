use crate::channel::channel_event::ChannelEvent;
use crate::channel::frame::{read_frame, write_frame};
use crate::error::MeshError;
use ciak_core::{FramedMessage, PeerDescriptor};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Serializes event delivery so nothing can slip out after `Closed`.
struct EventSink {
    tx: mpsc::UnboundedSender<ChannelEvent>,
    closed: Mutex<bool>,
}

impl EventSink {
    fn emit(&self, event: ChannelEvent) {
        let Ok(closed) = self.closed.lock() else {
            return;
        };
        if *closed {
            return;
        }
        let _ = self.tx.send(event);
    }

    fn emit_closed(&self) {
        let Ok(mut closed) = self.closed.lock() else {
            return;
        };
        if *closed {
            return;
        }
        *closed = true;
        let _ = self.tx.send(ChannelEvent::Closed);
    }
}

/// One TCP connection to one peer, carrying newline-delimited JSON messages.
///
/// The listening or dialing side is picked from `descriptor.is_initiator`.
/// Events arrive on the receiver returned by [`FramedChannel::open`].
pub struct FramedChannel {
    outbound_tx: mpsc::UnboundedSender<FramedMessage>,
    connected: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    sink: Arc<EventSink>,
}

impl FramedChannel {
    pub fn open(
        descriptor: PeerDescriptor,
        accept_timeout: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);

        let sink = Arc::new(EventSink {
            tx: event_tx,
            closed: Mutex::new(false),
        });
        let connected = Arc::new(AtomicBool::new(false));

        let shutdown = ShutdownSignals {
            connect: shutdown_tx.subscribe(),
            reader: shutdown_tx.subscribe(),
            writer: shutdown_tx.subscribe(),
            listener: shutdown_tx.subscribe(),
        };

        tokio::spawn(channel_task(
            descriptor,
            accept_timeout,
            sink.clone(),
            connected.clone(),
            outbound_rx,
            shutdown,
        ));

        let channel = Self {
            outbound_tx,
            connected,
            shutdown_tx,
            sink,
        };

        (channel, event_rx)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Queue a message for the writer task. Never blocks.
    pub fn send(&self, message: FramedMessage) -> Result<(), MeshError> {
        if !self.is_connected() {
            return Err(MeshError::NotConnected);
        }
        self.outbound_tx
            .send(message)
            .map_err(|_| MeshError::NotConnected)
    }

    /// Idempotent. Queued lines are still flushed before the socket closes.
    pub fn close(&self) {
        self.connected.store(false, Ordering::Release);
        let _ = self.shutdown_tx.send(());
        self.sink.emit_closed();
    }
}

impl Drop for FramedChannel {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

struct ShutdownSignals {
    connect: broadcast::Receiver<()>,
    reader: broadcast::Receiver<()>,
    writer: broadcast::Receiver<()>,
    listener: broadcast::Receiver<()>,
}

async fn channel_task(
    descriptor: PeerDescriptor,
    accept_timeout: Duration,
    sink: Arc<EventSink>,
    connected: Arc<AtomicBool>,
    outbound_rx: mpsc::UnboundedReceiver<FramedMessage>,
    mut shutdown: ShutdownSignals,
) {
    let established = tokio::select! {
        _ = shutdown.connect.recv() => {
            debug!(peer = %descriptor, "Channel closed before connecting");
            return;
        }
        result = establish(&descriptor, accept_timeout) => result,
    };

    let (stream, remote_addr, listener) = match established {
        Ok(established) => established,
        Err(e) => {
            warn!(peer = %descriptor, error = %e, "Channel failed to connect");
            sink.emit(ChannelEvent::Error(e));
            return;
        }
    };

    if let Some(listener) = listener {
        tokio::spawn(reject_extra_peers(listener, remote_addr, shutdown.listener));
    }

    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "Failed to set TCP_NODELAY");
    }

    let (read_half, write_half) = stream.into_split();

    connected.store(true, Ordering::Release);
    info!(peer = %descriptor, addr = %remote_addr, "Channel connected");
    sink.emit(ChannelEvent::Connected(remote_addr));

    tokio::spawn(writer_task(write_half, outbound_rx, shutdown.writer));

    let mut reader = BufReader::new(read_half);
    loop {
        tokio::select! {
            _ = shutdown.reader.recv() => {
                debug!(addr = %remote_addr, "Reader stopped by close");
                break;
            }
            result = read_frame(&mut reader) => {
                match result {
                    Ok(msg) => {
                        debug!(addr = %remote_addr, action = %msg.action(), "Received frame");
                        sink.emit(ChannelEvent::Message(msg));
                    }
                    Err(MeshError::ChannelClosed) => {
                        debug!(addr = %remote_addr, "Peer closed connection");
                        break;
                    }
                    Err(e @ MeshError::Protocol(_)) => {
                        warn!(addr = %remote_addr, error = %e, "Skipping bad frame");
                        sink.emit(ChannelEvent::Error(e));
                    }
                    Err(e) => {
                        warn!(addr = %remote_addr, error = %e, "Read error");
                        break;
                    }
                }
            }
        }
    }

    connected.store(false, Ordering::Release);
    sink.emit_closed();
}

async fn establish(
    descriptor: &PeerDescriptor,
    accept_timeout: Duration,
) -> Result<(TcpStream, SocketAddr, Option<TcpListener>), MeshError> {
    if descriptor.is_initiator {
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, descriptor.port));
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|source| MeshError::Connect {
                addr: bind_addr,
                source,
            })?;
        info!(addr = %bind_addr, "Waiting for peer");

        let accepted = tokio::time::timeout(accept_timeout, listener.accept())
            .await
            .map_err(|_| MeshError::AcceptTimeout {
                port: descriptor.port,
                timeout_ms: accept_timeout.as_millis() as u64,
            })?;
        let (stream, remote_addr) = accepted.map_err(|source| MeshError::Connect {
            addr: bind_addr,
            source,
        })?;

        Ok((stream, remote_addr, Some(listener)))
    } else {
        let addr = descriptor.addr();
        debug!(addr = %addr, "Dialing peer");

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| MeshError::Connect { addr, source })?;

        Ok((stream, addr, None))
    }
}

async fn reject_extra_peers(
    listener: TcpListener,
    accepted: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            result = listener.accept() => match result {
                Ok((mut stream, addr)) => {
                    warn!(addr = %addr, accepted = %accepted, "Rejecting second connection on a channel port");
                    let _ = stream.shutdown().await;
                }
                Err(e) => {
                    warn!(error = %e, "Listener accept failed");
                    break;
                }
            }
        }
    }
}

async fn writer_task(
    mut writer: OwnedWriteHalf,
    mut outbound_rx: mpsc::UnboundedReceiver<FramedMessage>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;

            msg = outbound_rx.recv() => {
                let Some(msg) = msg else { break };
                if let Err(e) = write_frame(&mut writer, &msg).await {
                    warn!(error = %e, "Write error");
                    return;
                }
            }
            _ = shutdown_rx.recv() => {
                while let Ok(msg) = outbound_rx.try_recv() {
                    if write_frame(&mut writer, &msg).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }

    let _ = writer.shutdown().await;
}
