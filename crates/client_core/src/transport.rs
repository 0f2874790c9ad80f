//! Receive-only transport for the gesture producer.

use std::{pin::Pin, sync::Arc};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace};

use crate::{config::validate_ws_url, error::TransportError};

/// Text frames from one open connection. The stream ends when the peer
/// closes.
pub type InboundStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<InboundStream, TransportError>;
}

/// WebSocket client for the producer's endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketSource;

#[async_trait]
impl EventSource for WebSocketSource {
    async fn connect(&self, url: &str) -> Result<InboundStream, TransportError> {
        let url = validate_ws_url(url)?;
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|source| TransportError::Connect {
                url: url.to_string(),
                source,
            })?;
        let (_, ws_reader) = ws_stream.split();

        let texts = ws_reader
            .take_while(|msg| futures::future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| async move {
                match msg {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(other) => {
                        trace!(kind = frame_kind(&other), "ignoring non-text frame");
                        None
                    }
                    Err(err) => Some(Err(TransportError::Receive(err))),
                }
            });
        Ok(Box::pin(texts))
    }
}

fn frame_kind(message: &Message) -> &'static str {
    match message {
        Message::Text(_) => "text",
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        Message::Close(_) => "close",
        Message::Frame(_) => "frame",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    Opened,
    Message(String),
    Closed,
    Error(String),
}

/// Transport activity tagged with the attempt that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub generation: u64,
    pub kind: TransportEventKind,
}

/// Runs one connection attempt to completion, forwarding everything it
/// sees. Every attempt ends with exactly one `Closed` or `Error`, unless
/// the task is aborted or the receiver is gone.
pub fn spawn_transport<E: EventSource>(
    source: Arc<E>,
    url: String,
    generation: u64,
    events: mpsc::Sender<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let send = |kind| {
            let events = events.clone();
            async move { events.send(TransportEvent { generation, kind }).await.is_ok() }
        };

        let mut stream = match source.connect(&url).await {
            Ok(stream) => stream,
            Err(err) => {
                send(TransportEventKind::Error(err.to_string())).await;
                return;
            }
        };
        if !send(TransportEventKind::Opened).await {
            return;
        }

        while let Some(item) = stream.next().await {
            match item {
                Ok(text) => {
                    if !send(TransportEventKind::Message(text)).await {
                        return;
                    }
                }
                Err(err) => {
                    send(TransportEventKind::Error(err.to_string())).await;
                    return;
                }
            }
        }
        debug!(generation, "event stream ended");
        send(TransportEventKind::Closed).await;
    })
}
