//! Remote ledger mirror.
//!
//! Every ledger write offers a copy of the written row to a channel;
//! a background worker replays the events against a PostgREST-style
//! remote store (`POST /rest/v1/{table}` for inserts, `PATCH` with an
//! `id=eq.{id}` filter for updates). The local store is authoritative:
//! remote failures are logged and never reach ledger callers. When no
//! mirror is configured the handle simply drops events.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Errors from the remote mirror. Logged by the worker, never
/// propagated to ledger callers.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote: {0}")]
    Remote(String),
}

/// A single replicated ledger write. The row carries the snake_case
/// column names of the remote tables.
#[derive(Debug, Clone)]
pub enum MirrorEvent {
    Insert {
        table: &'static str,
        row: serde_json::Value,
    },
    Update {
        table: &'static str,
        id: String,
        row: serde_json::Value,
    },
}

impl MirrorEvent {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Insert { table, .. } | Self::Update { table, .. } => table,
        }
    }
}

/// Producer side of the mirror channel, held by the ledger service.
/// Cloneable; a disabled handle drops events on the floor.
#[derive(Clone)]
pub struct MirrorHandle {
    tx: Option<mpsc::UnboundedSender<MirrorEvent>>,
}

impl MirrorHandle {
    /// A handle that discards every event. Used when no remote mirror
    /// is configured.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Offer a freshly inserted row to the mirror.
    pub fn insert<T: serde::Serialize>(&self, table: &'static str, record: &T) {
        self.offer(|row| MirrorEvent::Insert { table, row }, table, record);
    }

    /// Offer an updated row to the mirror.
    pub fn update<T: serde::Serialize>(&self, table: &'static str, id: &str, record: &T) {
        let id = id.to_string();
        self.offer(|row| MirrorEvent::Update { table, id, row }, table, record);
    }

    fn offer<T: serde::Serialize>(
        &self,
        make: impl FnOnce(serde_json::Value) -> MirrorEvent,
        table: &str,
        record: &T,
    ) {
        let Some(tx) = &self.tx else { return };
        let row = match serde_json::to_value(record) {
            Ok(value) => snake_case_keys(value),
            Err(e) => {
                warn!("mirror: cannot serialize {} row: {}", table, e);
                return;
            }
        };
        if tx.send(make(row)).is_err() {
            warn!("mirror: worker gone, dropping {} event", table);
        }
    }
}

/// Create a connected handle/receiver pair. The receiver goes to
/// [`start`], the handle to the ledger service.
pub fn channel() -> (MirrorHandle, mpsc::UnboundedReceiver<MirrorEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MirrorHandle { tx: Some(tx) }, rx)
}

/// Rewrite top-level keys to the snake_case column names of the remote
/// tables. Nested values (the history array) are stored as JSON and
/// keep their shape.
fn snake_case_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter().map(|(k, v)| (snake_key(&k), v)).collect(),
        ),
        other => other,
    }
}

fn snake_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// PostgREST-speaking client for the remote store.
pub struct RestMirror {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestMirror {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: api_key.into(),
        }
    }

    async fn insert(&self, table: &str, row: &serde_json::Value) -> Result<(), MirrorError> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        Self::check(resp).await
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        row: &serde_json::Value,
    ) -> Result<(), MirrorError> {
        let url = format!("{}/rest/v1/{}?id=eq.{}", self.base_url, table, id);
        let resp = self
            .client
            .patch(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        Self::check(resp).await
    }

    async fn check(resp: reqwest::Response) -> Result<(), MirrorError> {
        if resp.status().is_success() {
            return Ok(());
        }
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        Err(MirrorError::Remote(format!("{}: {}", status, body)))
    }
}

/// Start the background worker that drains the mirror channel.
///
/// Returns a CancellationToken that stops the worker when cancelled.
/// Events are replayed in order; a failed event is logged and skipped.
pub fn start(
    mirror: RestMirror,
    mut rx: mpsc::UnboundedReceiver<MirrorEvent>,
) -> CancellationToken {
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        let mirror = Arc::new(mirror);

        tokio::spawn(async move {
            info!("mail mirror worker started ({})", mirror.base_url);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("mail mirror worker stopped");
                        break;
                    }
                    event = rx.recv() => {
                        match event {
                            Some(event) => apply_event(&mirror, event).await,
                            None => {
                                info!("mail mirror channel closed");
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    cancel
}

async fn apply_event(mirror: &RestMirror, event: MirrorEvent) {
    let result = match &event {
        MirrorEvent::Insert { table, row } => mirror.insert(table, row).await,
        MirrorEvent::Update { table, id, row } => mirror.update(table, id, row).await,
    };
    if let Err(e) = result {
        error!("mirror write to {} failed: {}", event.table(), e);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use axum::Router;
    use axum::extract::{Request, State};
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_snake_case_keys_maps_columns() {
        let row = snake_case_keys(serde_json::json!({
            "id": "m1",
            "receivedDate": "2024-01-10",
            "classificationCode": "UM.01",
            "fileUrl": "https://drive.example/abc",
            "history": [{"fromId": "u1"}],
        }));
        assert_eq!(row["received_date"], "2024-01-10");
        assert_eq!(row["classification_code"], "UM.01");
        assert_eq!(row["file_url"], "https://drive.example/abc");
        // Nested JSON keeps its stored shape.
        assert_eq!(row["history"][0]["fromId"], "u1");
        assert!(row.get("receivedDate").is_none());
    }

    #[test]
    fn test_disabled_handle_drops_events() {
        let handle = MirrorHandle::disabled();
        handle.insert("incoming_mails", &serde_json::json!({"id": "m1"}));
        handle.update("dispositions", "d1", &serde_json::json!({"id": "d1"}));
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    async fn record(State(rec): State<Recorder>, req: Request) -> StatusCode {
        rec.0
            .lock()
            .unwrap()
            .push(format!("{} {}", req.method(), req.uri()));
        StatusCode::CREATED
    }

    async fn serve_recorder(rec: Recorder) -> String {
        let app = Router::new().fallback(record).with_state(rec);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn wait_for(rec: &Recorder, n: usize) {
        for _ in 0..100 {
            if rec.0.lock().unwrap().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_worker_replays_one_call_per_write() {
        let rec = Recorder::default();
        let base = serve_recorder(rec.clone()).await;

        let (handle, rx) = channel();
        let cancel = start(RestMirror::new(base, "test-key"), rx);

        handle.insert("incoming_mails", &serde_json::json!({"id": "m1", "subject": "Rapat"}));
        handle.update("dispositions", "d1", &serde_json::json!({"id": "d1", "status": "process"}));

        wait_for(&rec, 2).await;
        let calls = rec.0.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "POST /rest/v1/incoming_mails".to_string(),
                "PATCH /rest/v1/dispositions?id=eq.d1".to_string(),
            ]
        );

        cancel.cancel();
    }

    async fn reject(State(rec): State<Recorder>, req: Request) -> StatusCode {
        rec.0
            .lock()
            .unwrap()
            .push(format!("{} {}", req.method(), req.uri()));
        StatusCode::INTERNAL_SERVER_ERROR
    }

    #[tokio::test]
    async fn test_worker_survives_remote_failures() {
        let rec = Recorder::default();
        let app = Router::new().fallback(reject).with_state(rec.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let (handle, rx) = channel();
        let cancel = start(RestMirror::new(format!("http://{}", addr), "test-key"), rx);

        handle.insert("outgoing_mails", &serde_json::json!({"id": "o1"}));
        handle.insert("outgoing_mails", &serde_json::json!({"id": "o2"}));

        // Both attempts go out even though the first one failed.
        wait_for(&rec, 2).await;
        assert_eq!(rec.0.lock().unwrap().len(), 2);

        cancel.cancel();
    }
}
