//! Firebase Realtime Database REST client.
//!
//! Reads and writes go through `<base>/<path>.json`; child-added
//! subscriptions use the REST streaming endpoint (`text/event-stream`).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::RemoteStoreConfig;

use super::{ChildEvent, PathUpdates, RemoteError, RemoteStore, split_path};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Remote store client for the Firebase REST API.
#[derive(Clone)]
pub struct HttpRemoteStore {
    inner: Arc<HttpRemoteStoreInner>,
}

struct HttpRemoteStoreInner {
    client: reqwest::Client,
    base: Url,
    auth: Option<SecretString>,
    request_timeout: Duration,
}

impl std::fmt::Debug for HttpRemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRemoteStore")
            .field("base", &self.inner.base.as_str())
            .field("auth", &self.inner.auth.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

/// Body of a `put` or `patch` stream event.
#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    data: Value,
}

/// POST response carrying the generated key.
#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

impl HttpRemoteStore {
    /// Create a client for the configured database.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Http` if the HTTP client cannot be built.
    pub fn new(config: &RemoteStoreConfig) -> Result<Self, RemoteError> {
        let mut base = config.url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        // No client-wide timeout: event streams stay open indefinitely.
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpRemoteStoreInner {
                client,
                base,
                auth: config.auth.clone(),
                request_timeout: config.request_timeout,
            }),
        })
    }

    fn url_for(&self, path: &str, params: &[(&str, String)]) -> Result<Url, RemoteError> {
        let mut url = self
            .inner
            .base
            .join(&format!("{}.json", path.trim_matches('/')))?;

        if self.inner.auth.is_some() || !params.is_empty() {
            let mut query = url.query_pairs_mut();
            if let Some(auth) = &self.inner.auth {
                query.append_pair("auth", auth.expose_secret());
            }
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, RemoteError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| RemoteError::Parse(format!("Failed to parse response: {e}")))
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    #[instrument(skip(self))]
    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError> {
        split_path(path)?;
        let response = self
            .inner
            .client
            .get(self.url_for(path, &[])?)
            .timeout(self.inner.request_timeout)
            .send()
            .await?;

        let value = read_json(response).await?;
        Ok((!value.is_null()).then_some(value))
    }

    #[instrument(skip(self, value))]
    async fn query_equal(
        &self,
        path: &str,
        child: &str,
        value: &Value,
    ) -> Result<BTreeMap<String, Value>, RemoteError> {
        split_path(path)?;
        let params = [
            ("orderBy", Value::from(child).to_string()),
            ("equalTo", value.to_string()),
        ];
        let response = self
            .inner
            .client
            .get(self.url_for(path, &params)?)
            .timeout(self.inner.request_timeout)
            .send()
            .await?;

        match read_json(response).await? {
            Value::Object(children) => Ok(children.into_iter().collect()),
            Value::Null => Ok(BTreeMap::new()),
            other => Err(RemoteError::Parse(format!(
                "expected an object of children, got {other}"
            ))),
        }
    }

    #[instrument(skip(self, value))]
    async fn push(&self, path: &str, value: Value) -> Result<String, RemoteError> {
        split_path(path)?;
        let response = self
            .inner
            .client
            .post(self.url_for(path, &[])?)
            .timeout(self.inner.request_timeout)
            .json(&value)
            .send()
            .await?;

        let pushed: PushResponse = serde_json::from_value(read_json(response).await?)
            .map_err(|e| RemoteError::Parse(format!("Failed to parse push response: {e}")))?;
        Ok(pushed.name)
    }

    #[instrument(skip(self, updates), fields(paths = updates.len()))]
    async fn update(&self, updates: PathUpdates) -> Result<(), RemoteError> {
        let mut body = serde_json::Map::new();
        for (path, value) in updates {
            split_path(&path)?;
            body.insert(path, value.unwrap_or(Value::Null));
        }

        let response = self
            .inner
            .client
            .patch(self.url_for("", &[])?)
            .timeout(self.inner.request_timeout)
            .json(&Value::Object(body))
            .send()
            .await?;

        read_json(response).await?;
        Ok(())
    }

    async fn subscribe_child_added(
        &self,
        path: &str,
    ) -> Result<mpsc::UnboundedReceiver<ChildEvent>, RemoteError> {
        split_path(path)?;
        let url = self.url_for(path, &[])?;
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(watch_children(
            self.inner.client.clone(),
            url,
            path.to_owned(),
            tx,
        ));

        Ok(rx)
    }
}

/// Keep a child-added stream open until the receiver is dropped.
async fn watch_children(
    client: reqwest::Client,
    url: Url,
    path: String,
    tx: mpsc::UnboundedSender<ChildEvent>,
) {
    let mut known = BTreeSet::new();

    loop {
        match stream_children(&client, &url, &tx, &mut known).await {
            Ok(()) if tx.is_closed() => break,
            Ok(()) => warn!(path = %path, "Remote event stream ended, reconnecting"),
            Err(e) => warn!(path = %path, error = %e, "Remote event stream failed, reconnecting"),
        }

        tokio::time::sleep(RECONNECT_DELAY).await;
        if tx.is_closed() {
            break;
        }
    }

    debug!(path = %path, "Child-added subscription closed");
}

async fn stream_children(
    client: &reqwest::Client,
    url: &Url,
    tx: &mpsc::UnboundedSender<ChildEvent>,
    known: &mut BTreeSet<String>,
) -> Result<(), RemoteError> {
    let response = client
        .get(url.clone())
        .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let mut pending = Vec::new();
    let mut buffer = String::new();
    let mut byte_stream = std::pin::pin!(response.bytes_stream());

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(|e| RemoteError::Stream(e.to_string()))?;
        pending.extend_from_slice(&chunk);
        drain_utf8(&mut pending, &mut buffer)?;

        while let Some(event) = extract_sse_event(&mut buffer) {
            let Some((name, data)) = parse_sse_event(&event) else {
                continue;
            };

            match name.as_str() {
                "put" | "patch" => {
                    let payload: StreamPayload = serde_json::from_str(&data).map_err(|e| {
                        RemoteError::Parse(format!("Failed to parse stream event: {e}"))
                    })?;
                    for child in child_events(&name, payload, known) {
                        if tx.send(child).is_err() {
                            return Ok(());
                        }
                    }
                }
                "keep-alive" => {}
                "cancel" => {
                    return Err(RemoteError::Stream(
                        "subscription cancelled by the remote store".to_string(),
                    ));
                }
                "auth_revoked" => {
                    return Err(RemoteError::Stream("credential revoked".to_string()));
                }
                other => debug!(event = other, "Ignoring remote stream event"),
            }
        }
    }

    Ok(())
}

/// Move the valid UTF-8 prefix of `pending` into `buffer`.
///
/// A multi-byte character split across chunks stays in `pending`.
fn drain_utf8(pending: &mut Vec<u8>, buffer: &mut String) -> Result<(), RemoteError> {
    let valid = match std::str::from_utf8(pending) {
        Ok(text) => {
            buffer.push_str(text);
            pending.clear();
            return Ok(());
        }
        Err(e) if e.error_len().is_some() => {
            return Err(RemoteError::Parse(format!("Invalid UTF-8: {e}")));
        }
        Err(e) => e.valid_up_to(),
    };

    let rest = pending.split_off(valid);
    buffer.push_str(&String::from_utf8_lossy(pending));
    *pending = rest;
    Ok(())
}

/// Extract a complete SSE event from the buffer.
///
/// Returns `Some(event)` if a complete event was found (and removes it from
/// buffer), or `None` if no complete event is available yet.
fn extract_sse_event(buffer: &mut String) -> Option<String> {
    let idx = buffer.find("\n\n")?;
    let event = buffer.get(..idx).map(str::to_owned);
    buffer.replace_range(..idx + 2, "");
    event
}

/// Parse an SSE event into its name and data.
fn parse_sse_event(event: &str) -> Option<(String, String)> {
    if event.trim().is_empty() {
        return None;
    }

    let mut name = None;
    let mut data = None;
    for line in event.lines() {
        if let Some(stripped) = line.strip_prefix("event: ") {
            name = Some(stripped.trim().to_owned());
        } else if let Some(stripped) = line.strip_prefix("data: ") {
            data = Some(stripped.to_owned());
        }
    }

    Some((name?, data.unwrap_or_default()))
}

/// Turn a `put` or `patch` event into child-added events.
///
/// `known` holds the child keys seen so far and is updated in place, so a
/// reconnect that replays the full snapshot only reports new children.
fn child_events(kind: &str, payload: StreamPayload, known: &mut BTreeSet<String>) -> Vec<ChildEvent> {
    let mut added = Vec::new();
    let segments: Vec<&str> = payload
        .path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    match segments.as_slice() {
        [] => {
            let children = match payload.data {
                Value::Object(children) => children,
                _ => serde_json::Map::new(),
            };
            if kind == "put" {
                known.retain(|key| children.contains_key(key));
            }
            for (key, value) in children {
                if value.is_null() {
                    known.remove(&key);
                } else if known.insert(key.clone()) {
                    added.push(ChildEvent { key, value });
                }
            }
        }
        [key] => {
            if payload.data.is_null() {
                if kind == "put" {
                    known.remove(*key);
                }
            } else if known.insert((*key).to_owned()) {
                added.push(ChildEvent {
                    key: (*key).to_owned(),
                    value: payload.data,
                });
            }
        }
        // Field-level changes to a child never add one.
        _ => {}
    }

    added
}
