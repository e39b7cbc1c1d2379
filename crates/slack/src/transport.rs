use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::api::{check_ok, SLACK_API_BASE_URL};
use crate::events::SlackEnvelope;
use crate::payloads::{decode_frame, SocketFrame};
use crate::socket::{SocketTransport, TransportError};

type SocketStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONNECTIONS_OPEN: &str = "apps.connections.open";

/// Socket Mode over a real WebSocket. The URL comes from
/// `apps.connections.open` and is single use, so every `connect` asks for a
/// fresh one.
pub struct WebSocketTransport {
    http: reqwest::Client,
    api_base_url: String,
    app_token: SecretString,
    writer: Mutex<Option<SplitSink<SocketStream, Message>>>,
    reader: Mutex<Option<SplitStream<SocketStream>>>,
}

impl WebSocketTransport {
    pub fn new(app_token: SecretString) -> Self {
        Self::with_base_url(app_token, SLACK_API_BASE_URL)
    }

    pub fn with_base_url(app_token: SecretString, api_base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_owned(),
            app_token,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    async fn open_connection(&self) -> Result<String, TransportError> {
        let response = self
            .http
            .post(format!("{}/{CONNECTIONS_OPEN}", self.api_base_url))
            .bearer_auth(self.app_token.expose_secret())
            .send()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Connect(format!(
                "{CONNECTIONS_OPEN} returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: Value =
            response.json().await.map_err(|error| TransportError::Connect(error.to_string()))?;
        let body = check_ok(CONNECTIONS_OPEN, body)
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        body.get("url").and_then(Value::as_str).map(str::to_owned).ok_or_else(|| {
            TransportError::Connect(format!("{CONNECTIONS_OPEN} response missing url"))
        })
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self.open_connection().await?;
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        let (writer, reader) = stream.split();

        *self.writer.lock().await = Some(writer);
        *self.reader.lock().await = Some(reader);
        info!(event_name = "ingress.slack.connected", "socket mode websocket open");
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut reader = self.reader.lock().await;
        let stream = reader
            .as_mut()
            .ok_or_else(|| TransportError::Receive("transport is not connected".to_owned()))?;

        loop {
            let Some(frame) = stream.next().await else {
                return Err(TransportError::Receive("websocket stream ended".to_owned()));
            };
            let message = frame.map_err(|error| TransportError::Receive(error.to_string()))?;

            match message {
                Message::Text(text) => match decode_frame(&text) {
                    Ok(SocketFrame::Hello) => debug!("socket mode hello received"),
                    Ok(SocketFrame::Disconnect { reason }) if reason == "link_disabled" => {
                        return Err(TransportError::Receive(
                            "socket mode was disabled for this app".to_owned(),
                        ));
                    }
                    Ok(SocketFrame::Disconnect { reason }) => {
                        return Err(TransportError::RefreshRequested(reason));
                    }
                    Ok(SocketFrame::Envelope(envelope)) => return Ok(Some(envelope)),
                    Err(error) => {
                        warn!(error = %error, "skipping undecodable socket mode frame");
                    }
                },
                // Only a Socket Mode `disconnect` is a refresh; a bare close
                // counts against the retry budget.
                Message::Close(frame) => {
                    let reason = frame
                        .map(|frame| frame.reason.to_string())
                        .filter(|reason| !reason.is_empty())
                        .unwrap_or_else(|| "no reason given".to_owned());
                    return Err(TransportError::Receive(format!("websocket closed: {reason}")));
                }
                // tungstenite answers pings itself while reading.
                Message::Ping(_) | Message::Pong(_) => {}
                other => debug!(kind = ?other, "ignoring non-text socket mode frame"),
            }
        }
    }

    async fn acknowledge(
        &self,
        envelope_id: &str,
        payload: Option<&Value>,
    ) -> Result<(), TransportError> {
        let frame = ack_frame(envelope_id, payload);
        let mut writer = self.writer.lock().await;
        let sink = writer
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("transport is not connected".to_owned()))?;

        sink.send(Message::Text(frame.to_string()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let writer = self.writer.lock().await.take();
        self.reader.lock().await.take();

        let Some(mut writer) = writer else {
            return Ok(());
        };
        match writer.close().await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(error) => Err(TransportError::Disconnect(error.to_string())),
        }
    }
}

/// Socket Mode ack: the envelope id plus an optional response payload.
pub fn ack_frame(envelope_id: &str, payload: Option<&Value>) -> Value {
    let mut frame = json!({ "envelope_id": envelope_id });
    if let Some(payload) = payload {
        frame["payload"] = payload.clone();
    }
    frame
}
