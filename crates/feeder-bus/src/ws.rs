//! JSON-over-WebSocket transport.
//!
//! The broker contract is simple: one socket per device, channel selected by
//! query parameter, keys passed as headers, every frame a JSON object. A
//! failed connect leaves the transport in degraded mode rather than failing
//! the daemon.

use anyhow::Context;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};
use tracing::{debug, info, warn};

use feeder_config::BusSettings;

use crate::transport::{DEGRADED_POLL, Transport};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const INBOUND_BUFFER: usize = 64;

struct Connected {
    sink: Mutex<WsSink>,
    inbound: Mutex<mpsc::Receiver<Value>>,
    reader: JoinHandle<()>,
}

/// WebSocket-backed [`Transport`].
pub struct WsTransport {
    url: String,
    channel: String,
    client_id: String,
    publish_key: Option<String>,
    subscribe_key: Option<String>,
    state: RwLock<Option<Connected>>,
}

impl WsTransport {
    pub fn new(url: String, settings: &BusSettings) -> Self {
        Self {
            url,
            channel: settings.channel.clone(),
            client_id: settings.uuid.clone().unwrap_or_default(),
            publish_key: settings.publish_key.clone(),
            subscribe_key: settings.subscribe_key.clone(),
            state: RwLock::new(None),
        }
    }

    fn build_request(&self) -> anyhow::Result<tungstenite::handshake::client::Request> {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        let ws_url = format!(
            "{}{separator}channel={}&client_id={}",
            self.url, self.channel, self.client_id
        );

        let mut request = tungstenite::http::Request::builder()
            .uri(&ws_url)
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", extract_host(&ws_url).unwrap_or("localhost"));

        if let Some(key) = &self.publish_key {
            request = request.header("X-Publish-Key", key);
        }
        if let Some(key) = &self.subscribe_key {
            request = request.header("X-Subscribe-Key", key);
        }

        request.body(()).context("building bus request")
    }
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn start(&self) {
        let request = match self.build_request() {
            Ok(request) => request,
            Err(e) => {
                warn!("Bus request invalid ({e}); running degraded");
                return;
            }
        };

        match tokio_tungstenite::connect_async(request).await {
            Ok((socket, _response)) => {
                let (sink, source) = socket.split();
                let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
                let reader = tokio::spawn(read_loop(source, tx));
                *self.state.write().await = Some(Connected {
                    sink: Mutex::new(sink),
                    inbound: Mutex::new(rx),
                    reader,
                });
                info!(channel = %self.channel, "Bus connected");
            }
            Err(e) => {
                warn!("Bus connect failed ({e}); running degraded");
            }
        }
    }

    async fn stop(&self) {
        if let Some(connected) = self.state.write().await.take() {
            let mut sink = connected.sink.lock().await;
            if let Err(e) = sink.send(Message::Close(None)).await {
                debug!("Bus close frame not sent: {e}");
            }
            drop(sink);
            // Let in-flight frames settle before dropping the reader.
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            connected.reader.abort();
            info!("Bus disconnected");
        }
    }

    async fn publish(&self, payload: &Value) -> anyhow::Result<()> {
        let state = self.state.read().await;
        let Some(connected) = state.as_ref() else {
            info!("[no-op publish] {payload}");
            return Ok(());
        };
        let mut sink = connected.sink.lock().await;
        sink.send(Message::Text(payload.to_string().into()))
            .await
            .context("bus publish")
    }

    async fn recv(&self) -> Option<Value> {
        let state = self.state.read().await;
        let Some(connected) = state.as_ref() else {
            tokio::time::sleep(DEGRADED_POLL).await;
            return None;
        };
        let msg = connected.inbound.lock().await.recv().await;
        if msg.is_none() {
            // Reader gone (socket closed); pace the caller like degraded mode.
            tokio::time::sleep(DEGRADED_POLL).await;
        }
        msg
    }
}

async fn read_loop(mut source: WsSource, tx: mpsc::Sender<Value>) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(msg) => {
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Undecodable bus frame: {e}"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Bus socket error: {e}");
                break;
            }
        }
    }
    debug!("Bus reader stopped");
}

fn extract_host(url: &str) -> Option<&str> {
    let rest = url.split("://").nth(1)?;
    let host = rest.split('/').next()?.split('?').next()?;
    Some(host)
}
