//! Transport seam between the connection state machine and the socket.
//!
//! A [`Connector`] opens one [`Link`] per connection attempt. Everything the transport
//! observes afterwards (open, inbound frames, close) is reported as a [`TransportEvent`]
//! tagged with the generation the link was opened under, so events from abandoned
//! links can be recognized and ignored.
//!
//! [`WsConnector`] is the `tokio-tungstenite` implementation. [`MockConnector`] is an
//! in-memory stand-in that records what was opened and sent.

use crate::network::address::WsAddress;
use crate::network::protocol::RawFrame;
use futures::{SinkExt, StreamExt};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

/// Something observed by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    /// Generation of the link that produced the event
    pub generation: u64,
    /// What happened
    pub kind: TransportEventKind,
}

/// What happened on the link.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    /// The handshake completed
    Opened,
    /// One inbound message
    Frame(RawFrame),
    /// The link is gone. `clean` is true only for a normal closing handshake.
    Closed { clean: bool },
}

/// Outbound half of one open (or opening) transport.
pub trait Link {
    /// Queue one text message. Returns `false` if the link can no longer send.
    fn send_text(&mut self, text: String) -> bool;

    /// Close the link. No further events will be reported for it.
    fn close(&mut self);
}

/// Opens links.
pub trait Connector {
    /// Link type handed back by [`Connector::open`].
    type Link: Link;

    /// Start opening a link. The outcome is reported asynchronously through
    /// [`TransportEvent`]s carrying `generation`.
    fn open(&mut self, generation: u64) -> Self::Link;
}

#[derive(Debug)]
enum Outbound {
    Text(String),
    Close,
}

/// WebSocket connector built on `tokio-tungstenite`.
///
/// Each [`Connector::open`] spawns one task on the current tokio runtime that owns the
/// socket until it closes.
#[derive(Debug, Clone)]
pub struct WsConnector {
    address: WsAddress,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl WsConnector {
    /// Create a connector and the receiver its links report into.
    #[must_use]
    pub fn new(address: WsAddress) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { address, events }, rx)
    }

    /// Endpoint this connector dials.
    #[must_use]
    pub fn address(&self) -> &WsAddress {
        &self.address
    }
}

impl Connector for WsConnector {
    type Link = WsLink;

    fn open(&mut self, generation: u64) -> WsLink {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_link(
            self.address.as_str().to_string(),
            generation,
            self.events.clone(),
            outbound_rx,
        ));
        WsLink { outbound }
    }
}

/// Handle to a socket task spawned by [`WsConnector`].
///
/// Dropping the handle closes the socket.
#[derive(Debug)]
pub struct WsLink {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Link for WsLink {
    fn send_text(&mut self, text: String) -> bool {
        self.outbound.send(Outbound::Text(text)).is_ok()
    }

    fn close(&mut self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

async fn run_link(
    url: String,
    generation: u64,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let emit = |kind: TransportEventKind| {
        let _ = events.send(TransportEvent { generation, kind });
    };

    let socket = tokio::select! {
        result = tokio_tungstenite::connect_async(url.as_str()) => match result {
            Ok((socket, _response)) => socket,
            Err(e) => {
                tracing::warn!(generation, url = %url, error = %e, "WebSocket connect failed");
                emit(TransportEventKind::Closed { clean: false });
                return;
            }
        },
        // Close requested (or handle dropped) before the handshake finished.
        _ = outbound.recv() => {
            tracing::debug!(generation, "Connection attempt abandoned");
            return;
        }
    };

    tracing::debug!(generation, url = %url, "WebSocket handshake complete");
    emit(TransportEventKind::Opened);

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => emit(TransportEventKind::Frame(RawFrame::Text(text))),
                Some(Ok(Message::Binary(bytes))) => {
                    emit(TransportEventKind::Frame(RawFrame::Binary(bytes)));
                }
                Some(Ok(Message::Close(frame))) => {
                    let clean = frame.as_ref().map_or(true, |f| f.code == CloseCode::Normal);
                    tracing::debug!(generation, clean, ?frame, "Server closed the connection");
                    emit(TransportEventKind::Closed { clean });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(generation, error = %e, "WebSocket read failed");
                    emit(TransportEventKind::Closed { clean: false });
                    return;
                }
                None => {
                    emit(TransportEventKind::Closed { clean: false });
                    return;
                }
            },
            request = outbound.recv() => match request {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        tracing::warn!(generation, error = %e, "WebSocket write failed");
                        emit(TransportEventKind::Closed { clean: false });
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    tracing::debug!(generation, "Closed WebSocket");
                    return;
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct MockShared {
    opened: Vec<u64>,
    live: BTreeSet<u64>,
    sent: Vec<String>,
}

/// In-memory connector that records every link it opens and every message sent.
///
/// Nothing is delivered back automatically; feed [`TransportEvent`]s by hand to
/// simulate the server.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    shared: Arc<Mutex<MockShared>>,
}

impl MockConnector {
    /// A connector with no links opened yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Total links ever opened.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.lock().opened.len()
    }

    /// Links opened and not yet closed or dropped.
    #[must_use]
    pub fn live_links(&self) -> usize {
        self.lock().live.len()
    }

    /// Generation of the most recently opened link.
    #[must_use]
    pub fn last_generation(&self) -> Option<u64> {
        self.lock().opened.last().copied()
    }

    /// Every message sent on any link, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }
}

impl Connector for MockConnector {
    type Link = MockLink;

    fn open(&mut self, generation: u64) -> MockLink {
        let mut shared = self.lock();
        shared.opened.push(generation);
        shared.live.insert(generation);
        MockLink {
            generation,
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Link handed out by [`MockConnector`].
#[derive(Debug)]
pub struct MockLink {
    generation: u64,
    shared: Arc<Mutex<MockShared>>,
}

impl MockLink {
    fn lock(&self) -> MutexGuard<'_, MockShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Link for MockLink {
    fn send_text(&mut self, text: String) -> bool {
        let mut shared = self.lock();
        if !shared.live.contains(&self.generation) {
            return false;
        }
        shared.sent.push(text);
        true
    }

    fn close(&mut self) {
        let generation = self.generation;
        self.lock().live.remove(&generation);
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        let generation = self.generation;
        self.lock().live.remove(&generation);
    }
}
