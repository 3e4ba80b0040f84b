//! Firebase Realtime Database adapter.
//!
//! Writes use the REST API (`POST` to append, `PUT` to set, `DELETE`). A
//! subscription is one long-lived `GET` with `Accept: text/event-stream`;
//! the server sends `put` and `patch` events relative to the collection,
//! which are folded into a local copy of the collection and re-emitted as
//! complete snapshots.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{header, Client, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, trace, warn};

use super::{
    normalize_path, validate_id, RemoteStore, Snapshot, SnapshotSender, StoreError, Subscription,
};
use crate::record::RecordFields;

/// Client for a Firebase Realtime Database.
#[derive(Debug, Clone)]
pub struct FirebaseStore {
    base_url: String,
    client: Client,
    request_timeout: Duration,
}

/// Body of a successful `POST`.
#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

impl FirebaseStore {
    /// Create a client for the database at `base_url`
    /// (e.g. `https://example-default-rtdb.firebaseio.com`).
    ///
    /// `request_timeout` applies to one-shot writes; subscriptions stay open
    /// until cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(concat!("tapak/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            request_timeout,
        })
    }

    /// Database URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{collection}.json", self.base_url)
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}.json", self.base_url)
    }

    fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(StoreError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            })
        }
    }
}

#[async_trait]
impl RemoteStore for FirebaseStore {
    fn name(&self) -> &'static str {
        "firebase"
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let collection = normalize_path(path)?;
        let url = self.collection_url(&collection);

        debug!(url = %url, "Opening event stream");
        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = Self::check(response)?;
        info!(collection = %collection, "Subscribed to hosted collection");

        let (sender, subscription) = Subscription::channel(collection.clone());
        let task = tokio::spawn(pump_events(response.bytes_stream(), sender, collection));
        Ok(subscription.with_task(task.abort_handle()))
    }

    async fn append(&self, path: &str, fields: &RecordFields) -> Result<String, StoreError> {
        let collection = normalize_path(path)?;
        let response = self
            .client
            .post(self.collection_url(&collection))
            .timeout(self.request_timeout)
            .json(fields)
            .send()
            .await?;
        let pushed: PushResponse = Self::check(response)?.json().await?;
        debug!(collection = %collection, id = %pushed.name, "Appended document");
        Ok(pushed.name)
    }

    async fn set(&self, path: &str, id: &str, fields: &RecordFields) -> Result<(), StoreError> {
        let collection = normalize_path(path)?;
        validate_id(id)?;
        let response = self
            .client
            .put(self.document_url(&collection, id))
            .timeout(self.request_timeout)
            .json(fields)
            .send()
            .await?;
        Self::check(response)?;
        debug!(collection = %collection, id, "Set document");
        Ok(())
    }

    async fn delete(&self, path: &str, id: &str) -> Result<(), StoreError> {
        let collection = normalize_path(path)?;
        validate_id(id)?;
        let response = self
            .client
            .delete(self.document_url(&collection, id))
            .timeout(self.request_timeout)
            .send()
            .await?;
        Self::check(response)?;
        debug!(collection = %collection, id, "Deleted document");
        Ok(())
    }
}

/// Read the event stream until it ends, the server cancels, or nobody is
/// listening any more.
async fn pump_events<S, B, E>(body: S, sender: SnapshotSender, collection: String)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut body = std::pin::pin!(body);
    let mut parser = EventStreamParser::default();
    let mut tree = CollectionTree::default();

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                error!(collection = %collection, error = %e, "Event stream failed");
                sender.send(Err(StoreError::stream(e.to_string())));
                return;
            }
        };

        for event in parser.feed(chunk.as_ref()) {
            match tree.apply(&event) {
                Ok(TreeChange::Changed) => {
                    let snapshot = Snapshot::new(collection.clone(), tree.entries().clone());
                    if !sender.send(Ok(snapshot)) {
                        debug!(collection = %collection, "Subscriber gone; closing event stream");
                        return;
                    }
                }
                Ok(TreeChange::Unchanged) => {}
                Ok(TreeChange::Closed(reason)) => {
                    warn!(collection = %collection, reason = %reason, "Server closed subscription");
                    sender.send(Err(StoreError::stream(reason)));
                    return;
                }
                Err(e) => {
                    // One bad event does not invalidate the stream.
                    warn!(collection = %collection, error = %e, "Ignoring malformed event");
                }
            }
        }
    }

    debug!(collection = %collection, "Event stream ended");
    sender.send(Err(StoreError::stream("event stream ended")));
}

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    /// Event name (`put`, `patch`, `keep-alive`, ...).
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
}

/// Incremental `text/event-stream` parser.
///
/// Bytes are buffered until a blank line completes an event, so chunks may
/// split lines or UTF-8 sequences anywhere.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    buffer: Vec<u8>,
}

impl EventStreamParser {
    /// Feed a chunk and return every event it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ServerEvent> {
        self.buffer.extend(chunk.iter().filter(|&&b| b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(event) = Self::parse_block(&String::from_utf8_lossy(&block[..end])) {
                events.push(event);
            }
        }
        events
    }

    fn parse_block(block: &str) -> Option<ServerEvent> {
        let mut event = String::from("message");
        let mut data: Vec<&str> = Vec::new();

        for line in block.lines() {
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => event = value.to_string(),
                "data" => data.push(value),
                _ => trace!(field, "Ignoring event-stream field"),
            }
        }

        if data.is_empty() && event == "message" {
            return None;
        }
        Some(ServerEvent {
            event,
            data: data.join("\n"),
        })
    }
}

/// Effect of one event on the local collection copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChange {
    /// The collection changed; a snapshot should be emitted.
    Changed,
    /// Nothing to emit (keep-alive or unknown event).
    Unchanged,
    /// The server ended the subscription.
    Closed(String),
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    path: String,
    data: Value,
}

/// Local copy of a collection maintained from `put`/`patch` events.
#[derive(Debug, Default)]
pub struct CollectionTree {
    entries: Map<String, Value>,
}

impl CollectionTree {
    /// Current entries.
    #[must_use]
    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }

    /// Apply one server event.
    ///
    /// # Errors
    ///
    /// Returns an error if a `put`/`patch` payload is not valid JSON.
    pub fn apply(&mut self, event: &ServerEvent) -> Result<TreeChange, StoreError> {
        match event.event.as_str() {
            "put" => {
                let change: ChangePayload = serde_json::from_str(&event.data)?;
                put_at(&mut self.entries, &segments(&change.path), change.data);
                Ok(TreeChange::Changed)
            }
            "patch" => {
                let change: ChangePayload = serde_json::from_str(&event.data)?;
                let Value::Object(children) = change.data else {
                    return Err(StoreError::decode("patch data is not an object"));
                };
                let base = segments(&change.path);
                for (key, value) in children {
                    let mut path = base.clone();
                    path.extend(segments(&key));
                    put_at(&mut self.entries, &path, value);
                }
                Ok(TreeChange::Changed)
            }
            "keep-alive" => Ok(TreeChange::Unchanged),
            "cancel" => Ok(TreeChange::Closed(format!(
                "subscription cancelled by server: {}",
                event.data
            ))),
            "auth_revoked" => Ok(TreeChange::Closed("credentials revoked".to_string())),
            other => {
                debug!(event = other, "Ignoring unknown event");
                Ok(TreeChange::Unchanged)
            }
        }
    }
}

fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Set `data` at `path` below `map`; `null` removes, and objects left empty
/// by a removal disappear, as they do on the server.
fn put_at(map: &mut Map<String, Value>, path: &[String], data: Value) {
    match path {
        [] => {
            *map = match data {
                Value::Object(object) => object,
                _ => Map::new(),
            };
        }
        [key] => {
            if data.is_null() {
                map.retain(|k, _| k != key);
            } else {
                map.insert(key.clone(), data);
            }
        }
        [key, rest @ ..] => {
            if data.is_null() && !map.contains_key(key) {
                return;
            }
            let child = map
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            let now_empty = match child {
                Value::Object(object) => {
                    put_at(object, rest, data);
                    object.is_empty()
                }
                _ => false,
            };
            if now_empty {
                map.retain(|k, _| k != key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    type Chunk = Result<Vec<u8>, std::io::Error>;

    fn chunk(text: &str) -> Chunk {
        Ok(text.as_bytes().to_vec())
    }

    /// Chunks followed by a stream that never ends, so only the pump itself
    /// can decide to stop.
    fn held_open(chunks: Vec<Chunk>) -> impl Stream<Item = Chunk> {
        stream::iter(chunks).chain(stream::pending())
    }

    async fn pump_with_deadline(body: impl Stream<Item = Chunk>, sender: SnapshotSender) {
        tokio::time::timeout(
            Duration::from_secs(5),
            pump_events(body, sender, "points".to_string()),
        )
        .await
        .expect("event pump did not stop");
    }

    fn event(name: &str, data: Value) -> ServerEvent {
        ServerEvent {
            event: name.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_urls() {
        let store =
            FirebaseStore::new("https://demo-rtdb.firebaseio.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(store.base_url(), "https://demo-rtdb.firebaseio.com");
        assert_eq!(
            store.collection_url("points"),
            "https://demo-rtdb.firebaseio.com/points.json"
        );
        assert_eq!(
            store.document_url("points", "-Nx1"),
            "https://demo-rtdb.firebaseio.com/points/-Nx1.json"
        );
    }

    #[test]
    fn test_parser_handles_split_chunks() {
        let mut parser = EventStreamParser::default();
        assert!(parser.feed(b"event: put\ndata: {\"path\":\"/\",").is_empty());
        let events = parser.feed(b"\"data\":null}\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "put");
        assert_eq!(events[0].data, "{\"path\":\"/\",\"data\":null}");
        assert_eq!(events[1].event, "keep-alive");
    }

    #[test]
    fn test_parser_handles_crlf_and_comments() {
        let mut parser = EventStreamParser::default();
        let events = parser.feed(b": hello\r\nevent: put\r\ndata: 1\r\ndata: 2\r\n\r\n");
        assert_eq!(
            events,
            vec![ServerEvent {
                event: "put".to_string(),
                data: "1\n2".to_string(),
            }]
        );
    }

    #[test]
    fn test_parser_handles_split_utf8() {
        let mut parser = EventStreamParser::default();
        let bytes = "event: put\ndata: Caf\u{e9}\n\n".as_bytes();
        let split = bytes.len() - 3;
        assert!(parser.feed(&bytes[..split]).is_empty());
        let events = parser.feed(&bytes[split..]);
        assert_eq!(events[0].data, "Caf\u{e9}");
    }

    #[test]
    fn test_root_put_replaces_collection() {
        let mut tree = CollectionTree::default();
        let change = tree
            .apply(&event(
                "put",
                json!({ "path": "/", "data": { "a": { "name": "A" }, "b": { "name": "B" } } }),
            ))
            .unwrap();
        assert_eq!(change, TreeChange::Changed);
        assert_eq!(tree.entries().len(), 2);

        tree.apply(&event("put", json!({ "path": "/", "data": null })))
            .unwrap();
        assert!(tree.entries().is_empty());
    }

    #[test]
    fn test_child_put_adds_and_removes() {
        let mut tree = CollectionTree::default();
        tree.apply(&event("put", json!({ "path": "/a", "data": { "name": "A" } })))
            .unwrap();
        tree.apply(&event("put", json!({ "path": "/b", "data": { "name": "B" } })))
            .unwrap();
        tree.apply(&event("put", json!({ "path": "/a", "data": null })))
            .unwrap();

        let keys: Vec<_> = tree.entries().keys().cloned().collect();
        assert_eq!(keys, vec!["b".to_string()]);
    }

    #[test]
    fn test_nested_put_updates_field() {
        let mut tree = CollectionTree::default();
        tree.apply(&event(
            "put",
            json!({ "path": "/a", "data": { "name": "A", "details": "old" } }),
        ))
        .unwrap();
        tree.apply(&event("put", json!({ "path": "/a/details", "data": "new" })))
            .unwrap();
        assert_eq!(tree.entries()["a"]["details"], "new");

        tree.apply(&event("put", json!({ "path": "/a/details", "data": null })))
            .unwrap();
        tree.apply(&event("put", json!({ "path": "/a/name", "data": null })))
            .unwrap();
        assert!(!tree.entries().contains_key("a"));
    }

    #[test]
    fn test_patch_merges_children() {
        let mut tree = CollectionTree::default();
        tree.apply(&event(
            "put",
            json!({ "path": "/", "data": { "a": { "name": "A", "category": "X" } } }),
        ))
        .unwrap();
        tree.apply(&event(
            "patch",
            json!({ "path": "/a", "data": { "name": "A2", "details": "d" } }),
        ))
        .unwrap();

        let a = &tree.entries()["a"];
        assert_eq!(a["name"], "A2");
        assert_eq!(a["category"], "X");
        assert_eq!(a["details"], "d");
    }

    #[test]
    fn test_keep_alive_and_cancel() {
        let mut tree = CollectionTree::default();
        assert_eq!(
            tree.apply(&ServerEvent {
                event: "keep-alive".to_string(),
                data: "null".to_string(),
            })
            .unwrap(),
            TreeChange::Unchanged
        );
        assert!(matches!(
            tree.apply(&ServerEvent {
                event: "cancel".to_string(),
                data: "permission denied".to_string(),
            })
            .unwrap(),
            TreeChange::Closed(_)
        ));
    }

    #[test]
    fn test_malformed_put_is_an_error() {
        let mut tree = CollectionTree::default();
        let result = tree.apply(&ServerEvent {
            event: "put".to_string(),
            data: "not json".to_string(),
        });
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_pump_emits_snapshots_then_error_at_end() {
        crate::logging::init_test_logging();
        let (sender, mut subscription) = Subscription::channel("points");
        let body = stream::iter(vec![
            chunk("event: put\ndata: {\"path\":\"/\",\"data\":{\"a\":{\"name\":\"A\"}}}\n\n"),
            chunk("event: keep-alive\ndata: null\n\n"),
            chunk("event: put\ndata: {\"path\":\"/b\",\"data\":{\"name\":\"B\"}}\n\n"),
        ]);
        pump_with_deadline(body, sender).await;

        let first = subscription.next().await.unwrap().unwrap();
        assert_eq!(first.path(), "points");
        assert_eq!(first.len(), 1);
        let second = subscription.next().await.unwrap().unwrap();
        assert_eq!(second.len(), 2);
        assert!(matches!(
            subscription.next().await,
            Some(Err(StoreError::Stream(_)))
        ));
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_skips_malformed_events() {
        crate::logging::init_test_logging();
        let (sender, mut subscription) = Subscription::channel("points");
        let body = stream::iter(vec![
            chunk("event: put\ndata: not json\n\n"),
            chunk("event: put\ndata: {\"path\":\"/a\",\"data\":{\"name\":\"A\"}}\n\n"),
        ]);
        pump_with_deadline(body, sender).await;

        let snapshot = subscription.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(matches!(subscription.next().await, Some(Err(_))));
    }

    #[tokio::test]
    async fn test_pump_stops_after_server_cancel() {
        crate::logging::init_test_logging();
        let (sender, mut subscription) = Subscription::channel("points");
        let body = held_open(vec![
            chunk("event: cancel\ndata: permission denied\n\n"),
            chunk("event: put\ndata: {\"path\":\"/a\",\"data\":{\"name\":\"A\"}}\n\n"),
        ]);
        pump_with_deadline(body, sender).await;

        match subscription.next().await {
            Some(Err(StoreError::Stream(reason))) => assert!(reason.contains("permission denied")),
            other => panic!("expected a stream error, got {other:?}"),
        }
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_reports_transport_failure() {
        crate::logging::init_test_logging();
        let (sender, mut subscription) = Subscription::channel("points");
        let body = held_open(vec![Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        ))]);
        pump_with_deadline(body, sender).await;

        match subscription.next().await {
            Some(Err(StoreError::Stream(reason))) => assert!(reason.contains("connection reset")),
            other => panic!("expected a stream error, got {other:?}"),
        }
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn test_pump_stops_when_subscriber_is_gone() {
        let (sender, subscription) = Subscription::channel("points");
        drop(subscription);
        let body = held_open(vec![chunk(
            "event: put\ndata: {\"path\":\"/a\",\"data\":{\"name\":\"A\"}}\n\n",
        )]);
        pump_with_deadline(body, sender).await;
    }
}
