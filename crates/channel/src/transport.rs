//! The seam between the channel and its websocket. The channel only ever
//! talks to a [`FrameSink`]/[`FrameSource`] pair, so tests can drive it with
//! in-memory frames instead of a live server.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An abnormal transport failure. A clean closure is not an error; sources
/// report it by ending the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Write half of the streaming connection. Owned by the channel's writer
/// task, which serializes all request frames.
#[async_trait]
pub trait FrameSink: Send + 'static {
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;
    async fn close(&mut self);
}

/// Read half of the streaming connection. Owned by the channel's receiver
/// task, the sole reader. `None` means the peer closed cleanly.
#[async_trait]
pub trait FrameSource: Send + 'static {
    async fn next(&mut self) -> Option<Result<String, TransportError>>;
}

pub struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

pub struct WsSource {
    inner: SplitStream<WsStream>,
}

/// Dials the websocket and splits it into the channel's two halves.
pub async fn ws_connect(url: &str) -> Result<(WsSink, WsSource), TransportError> {
    let (stream, _response) = connect_async(url)
        .await
        .map_err(|e| TransportError(e.to_string()))?;
    let (sink, source) = stream.split();

    Ok((WsSink { inner: sink }, WsSource { inner: source }))
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.inner.close().await;
    }
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next(&mut self) -> Option<Result<String, TransportError>> {
        while let Some(message) = self.inner.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite itself; binary frames do
                // not occur on the kernel channel.
                Ok(_) => continue,
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(TransportError(e.to_string()))),
            }
        }

        None
    }
}
