//! The per-destination delivery worker.

use crate::error::DeliveryError;
use crate::retry::RetryPolicy;
use crate::signing::{SIGNATURE_HEADER, sign};
use botbridge_config::{HttpServerConfig, PostTarget};
use botbridge_core::{BotEvent, EventSource, FilterRegistry, QuickOperationSink};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Sent as `User-Agent` on every delivery.
pub const USER_AGENT: &str = concat!("BotBridge/", env!("CARGO_PKG_VERSION"));

/// Events waiting for a worker. Newer events are dropped when full.
pub const QUEUE_CAPACITY: usize = 256;

/// Everything one worker needs to know about its destination.
#[derive(Clone)]
pub struct WorkerConfig {
    pub url: String,
    /// HMAC key. Empty = unsigned.
    pub secret: String,
    /// Filter name. Empty = deliver everything.
    pub filter: String,
    /// Per-attempt timeout
    pub timeout: Duration,
    pub self_id: i64,
    /// Port of the API listener belonging to the same server, if any
    pub api_port: Option<u16>,
    pub retry: RetryPolicy,
}

impl WorkerConfig {
    pub fn from_server(
        server: &HttpServerConfig,
        target: &PostTarget,
        self_id: i64,
        api_port: Option<u16>,
    ) -> Self {
        Self {
            url: target.url.clone(),
            secret: target.secret.clone(),
            filter: server.filter.clone(),
            timeout: server.post_timeout(),
            self_id,
            api_port,
            retry: RetryPolicy::default(),
        }
    }
}

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The filter rejected the event; nothing was sent.
    Filtered,
    /// A 2xx answer arrived. `feedback` is true when its body was JSON and
    /// was handed to the bot.
    Delivered { attempts: u32, feedback: bool },
    /// Every attempt failed. The event is dropped for this destination.
    Abandoned { attempts: u32 },
}

pub struct WebhookWorker {
    config: WorkerConfig,
    client: reqwest::Client,
    headers: HeaderMap,
    filters: Arc<dyn FilterRegistry>,
    feedback: Arc<dyn QuickOperationSink>,
}

impl WebhookWorker {
    pub fn new(
        config: WorkerConfig,
        filters: Arc<dyn FilterRegistry>,
        feedback: Arc<dyn QuickOperationSink>,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("x-self-id"), HeaderValue::from(config.self_id));
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(port) = config.api_port {
            headers.insert(HeaderName::from_static("x-api-port"), HeaderValue::from(port));
        }

        Ok(Self {
            config,
            client,
            headers,
            filters,
            feedback,
        })
    }

    /// An unknown filter name lets everything through.
    fn passes_filter(&self, event: &Value) -> bool {
        if self.config.filter.is_empty() {
            return true;
        }
        match self.filters.find(&self.config.filter) {
            Some(filter) => filter.eval(event),
            None => true,
        }
    }

    fn headers_for(&self, body: &[u8]) -> HeaderMap {
        let mut headers = self.headers.clone();
        if !self.config.secret.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&sign(&self.config.secret, body)) {
                headers.insert(HeaderName::from_static(SIGNATURE_HEADER), value);
            }
        }
        headers
    }

    /// One POST with a fresh request. Returns the response body on 2xx.
    async fn attempt(&self, body: &[u8], headers: &HeaderMap) -> Result<Vec<u8>, DeliveryError> {
        let response = self
            .client
            .post(&self.config.url)
            .headers(headers.clone())
            .body(body.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        match response.bytes().await {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(e) => {
                debug!(url = %self.config.url, error = %e, "Failed to read webhook reply body");
                Ok(Vec::new())
            }
        }
    }

    /// Filter, sign, deliver with retries, then hand any JSON reply back.
    pub async fn handle_event(&self, event: &BotEvent) -> DeliveryOutcome {
        if !self.passes_filter(event.json()) {
            debug!(url = %self.config.url, post_type = event.post_type(), "Event filtered out");
            return DeliveryOutcome::Filtered;
        }

        let body = event.json_bytes();
        let headers = self.headers_for(body);
        let policy = &self.config.retry;

        let mut attempt = 0;
        let reply = loop {
            attempt += 1;
            match self.attempt(body, &headers).await {
                Ok(reply) => break reply,
                Err(e) if policy.should_retry(attempt) => {
                    let delay = policy.next_delay();
                    warn!(
                        url = %self.config.url,
                        attempt,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Webhook delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(
                        url = %self.config.url,
                        attempts = attempt,
                        error = %e,
                        event = %event.json_string(),
                        "Webhook delivery abandoned"
                    );
                    return DeliveryOutcome::Abandoned { attempts: attempt };
                }
            }
        };
        debug!(url = %self.config.url, attempts = attempt, "Webhook delivered");

        let feedback = match serde_json::from_slice::<Value>(&reply) {
            Ok(operation) => {
                self.feedback
                    .handle_quick_operation(event.json(), &operation)
                    .await;
                true
            }
            Err(_) => false,
        };
        DeliveryOutcome::Delivered {
            attempts: attempt,
            feedback,
        }
    }

    /// Subscribe to `source` and deliver events on a dedicated task until
    /// `shutdown` turns true. Shutdown also cuts short a retry sequence in
    /// progress.
    pub fn spawn(self, source: &dyn EventSource, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        if !self.config.filter.is_empty() && self.filters.find(&self.config.filter).is_none() {
            warn!(filter = %self.config.filter, "Unknown event filter, delivering all events");
        }

        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let url = self.config.url.clone();
        source.on_event_push(Box::new(move |event| match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(url = %url, "Webhook queue full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {}
        }));

        info!(url = %self.config.url, "Webhook worker started");
        tokio::spawn(self.run(rx, shutdown))
    }

    async fn run(self, mut events: mpsc::Receiver<Arc<BotEvent>>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let event = tokio::select! {
                _ = stop_requested(&mut shutdown) => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            tokio::select! {
                _ = stop_requested(&mut shutdown) => {
                    warn!(url = %self.config.url, "Shutdown interrupted webhook delivery");
                    break;
                }
                _ = self.handle_event(&event) => {}
            }
        }
        info!(url = %self.config.url, "Webhook worker stopped");
    }
}

/// Resolves once shutdown is requested. Never resolves if the sender is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
