use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::events::{EventContext, EventDispatcher, SlackEnvelope};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("slack asked for a fresh connection: {0}")]
    RefreshRequested(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SocketError {
    #[error("socket mode gave up after {attempts} failed attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: TransportError },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// A Socket Mode connection. `next_envelope` returns `Ok(None)` once the
/// stream has closed cleanly.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(
        &self,
        envelope_id: &str,
        payload: Option<&Value>,
    ) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), reconnect_policy }
    }

    /// Pumps envelopes until the stream closes or reconnects are exhausted,
    /// then waits for in-flight handlers to finish.
    pub async fn start(&self) -> Result<(), SocketError> {
        let mut in_flight = JoinSet::new();
        let result = self.run_connections(&mut in_flight).await;

        if !in_flight.is_empty() {
            info!(pending = in_flight.len(), "waiting for in-flight slack handlers");
        }
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }

        result
    }

    async fn run_connections(&self, in_flight: &mut JoinSet<()>) -> Result<(), SocketError> {
        let mut attempt = 0;
        loop {
            let transport_error = match self.connect_and_pump(&mut attempt, in_flight).await {
                Ok(()) => return Ok(()),
                Err(TransportError::RefreshRequested(reason)) => {
                    info!(
                        event_name = "ingress.slack.refresh_requested",
                        reason = %reason,
                        "slack requested a fresh connection; reconnecting"
                    );
                    self.close_quietly().await;
                    attempt = 0;
                    // Refreshes skip the retry budget, never the delay.
                    let delay = self.reconnect_policy.backoff(0);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    continue;
                }
                Err(transport_error) => transport_error,
            };

            warn!(
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                error = %transport_error,
                "socket mode transport failed"
            );
            self.close_quietly().await;

            if attempt >= self.reconnect_policy.max_retries {
                error!(
                    max_retries = self.reconnect_policy.max_retries,
                    "socket mode retries exhausted"
                );
                return Err(SocketError::RetriesExhausted {
                    attempts: attempt + 1,
                    last_error: transport_error,
                });
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: &mut u32,
        in_flight: &mut JoinSet<()>,
    ) -> Result<(), TransportError> {
        info!(attempt = *attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt = *attempt, "socket mode transport connected");
        *attempt = 0;

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!("socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            let ctx = EventContext { correlation_id: envelope.envelope_id.clone() };
            let event_type = envelope.event.event_type();

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?event_type,
                correlation_id = %ctx.correlation_id,
                user_id = envelope.event.user_id().unwrap_or("unknown"),
                "received slack envelope"
            );

            let ack = self.dispatcher.acknowledgement(&envelope, &ctx);
            if let Err(error) =
                self.transport.acknowledge(&envelope.envelope_id, ack.payload.as_ref()).await
            {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %ctx.correlation_id,
                    with_payload = ack.payload.is_some(),
                    "acknowledged slack envelope"
                );
            }

            while let Some(joined) = in_flight.try_join_next() {
                log_join(joined);
            }

            if !self.dispatcher.handles(event_type) {
                debug!(
                    correlation_id = %ctx.correlation_id,
                    event_type = ?event_type,
                    "no handler registered"
                );
                continue;
            }

            let dispatcher = self.dispatcher.clone();
            in_flight.spawn(async move {
                match dispatcher.dispatch(&envelope, &ctx).await {
                    Ok(result) => debug!(
                        correlation_id = %ctx.correlation_id,
                        result = ?result,
                        "slack event handled"
                    ),
                    Err(error) => warn!(
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %ctx.correlation_id,
                        error = %error,
                        "event dispatch failed; continuing socket loop"
                    ),
                }
            });
        }
    }

    async fn close_quietly(&self) {
        if let Err(error) = self.transport.disconnect().await {
            debug!(error = %error, "ignoring disconnect failure before reconnect");
        }
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(error) = joined {
        error!(
            event_name = "ingress.slack.handler_aborted",
            error = %error,
            "slack event handler task did not complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    use super::{ReconnectPolicy, SocketError, SocketModeRunner, SocketTransport, TransportError};
    use crate::events::{default_dispatcher, EventDispatcher, SlackEnvelope, SlackEvent};
    use crate::test_support::{submission_event, RecordingSlackApi, ScriptedAgent};

    type EnvelopeScript = Result<Option<SlackEnvelope>, TransportError>;

    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<EnvelopeScript>,
        connect_attempts: usize,
        acknowledgements: Vec<(String, Option<Value>)>,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<EnvelopeScript>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }

        async fn acknowledgements(&self) -> Vec<(String, Option<Value>)> {
            self.state.lock().await.acknowledgements.clone()
        }
    }

    #[async_trait]
    impl SocketTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state.connect_results.pop_front().unwrap_or(Ok(()))
        }

        async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn acknowledge(
            &self,
            envelope_id: &str,
            payload: Option<&Value>,
        ) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.acknowledgements.push((envelope_id.to_owned(), payload.cloned()));
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            Ok(())
        }
    }

    fn immediate(max_retries: u32) -> ReconnectPolicy {
        ReconnectPolicy { max_retries, base_delay_ms: 0, max_delay_ms: 0 }
    }

    fn unsupported(envelope_id: &str) -> EnvelopeScript {
        Ok(Some(SlackEnvelope {
            envelope_id: envelope_id.to_owned(),
            event: SlackEvent::Unsupported { event_type: "test".to_owned() },
        }))
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![unsupported("env-1"), Ok(None)],
        ));

        let runner =
            SocketModeRunner::new(transport.clone(), EventDispatcher::default(), immediate(2));
        runner.start().await.expect("runner should recover");

        assert_eq!(transport.connect_attempts().await, 2);
        assert_eq!(transport.disconnect_calls().await, 2);
        assert_eq!(transport.acknowledgements().await, vec![("env-1".to_owned(), None)]);
    }

    #[tokio::test]
    async fn exhausted_retries_are_reported() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner =
            SocketModeRunner::new(transport.clone(), EventDispatcher::default(), immediate(2));
        let error = runner.start().await.expect_err("retries should run out");

        assert_eq!(
            error,
            SocketError::RetriesExhausted {
                attempts: 3,
                last_error: TransportError::Connect("fail-3".to_owned())
            }
        );
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn refresh_request_reconnects_without_spending_retries() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Err(TransportError::RefreshRequested("refresh_requested".to_owned())),
                Err(TransportError::RefreshRequested("refresh_requested".to_owned())),
                unsupported("env-2"),
                Ok(None),
            ],
        ));

        let runner =
            SocketModeRunner::new(transport.clone(), EventDispatcher::default(), immediate(0));
        runner.start().await.expect("refresh is not a failure");

        assert_eq!(transport.connect_attempts().await, 3);
        assert_eq!(transport.acknowledgements().await.len(), 1);
    }

    #[tokio::test]
    async fn repeated_refreshes_still_wait_between_connects() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Err(TransportError::RefreshRequested("refresh_requested".to_owned())),
                Err(TransportError::RefreshRequested("refresh_requested".to_owned())),
                Err(TransportError::RefreshRequested("refresh_requested".to_owned())),
                Ok(None),
            ],
        ));
        let policy = ReconnectPolicy { max_retries: 0, base_delay_ms: 40, max_delay_ms: 40 };

        let started = Instant::now();
        let runner = SocketModeRunner::new(transport.clone(), EventDispatcher::default(), policy);
        runner.start().await.expect("refreshes are not failures");

        assert_eq!(transport.connect_attempts().await, 4);
        assert!(
            started.elapsed() >= Duration::from_millis(120),
            "three refreshes should wait 40ms each, took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn empty_modal_submission_is_rejected_in_the_ack() {
        let api = Arc::new(RecordingSlackApi::default());
        let agent = Arc::new(ScriptedAgent::replying(json!({"answer": "unused"})));
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(SlackEnvelope {
                    envelope_id: "env-empty".to_owned(),
                    event: SlackEvent::ViewSubmission(submission_event("   ", None)),
                })),
                Ok(None),
            ],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            default_dispatcher(api.clone(), agent.clone(), "/cortex"),
            immediate(0),
        );
        runner.start().await.expect("runner");

        let acks = transport.acknowledgements().await;
        assert_eq!(acks.len(), 1);
        assert_eq!(
            acks[0].1,
            Some(json!({
                "response_action": "errors",
                "errors": {"query_block": "Please enter a question."}
            }))
        );
        assert!(agent.calls().await.is_empty());
        assert!(api.calls().await.is_empty());
    }

    #[tokio::test]
    async fn valid_submission_is_acked_then_answered_before_shutdown() {
        let api = Arc::new(RecordingSlackApi::default());
        let agent = Arc::new(ScriptedAgent::replying(json!({"answer": "42"})));
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![],
            vec![
                Ok(Some(SlackEnvelope {
                    envelope_id: "env-ask".to_owned(),
                    event: SlackEvent::ViewSubmission(submission_event("meaning of life?", None)),
                })),
                Ok(None),
            ],
        ));

        let runner = SocketModeRunner::new(
            transport.clone(),
            default_dispatcher(api.clone(), agent.clone(), "/cortex"),
            immediate(0),
        );
        runner.start().await.expect("runner");

        assert_eq!(
            transport.acknowledgements().await[0].1,
            Some(json!({"response_action": "clear"}))
        );
        assert_eq!(agent.calls().await.len(), 1);
        assert_eq!(api.posted_messages().await.len(), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = ReconnectPolicy { max_retries: 10, base_delay_ms: 100, max_delay_ms: 1_000 };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(9), Duration::from_millis(1_000));
    }
}
