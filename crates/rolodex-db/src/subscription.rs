// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::{DocumentQuery, DocumentSnapshot, Store};

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEvent {
    /// The full ordered result set; replaces whatever was seen before.
    Snapshot(Vec<DocumentSnapshot>),
    /// Terminal. No further events follow.
    Failed(String),
}

/// Handle to a live query. Cancelling (or dropping) stops the poller and
/// waits for it, so no event is sent after `cancel` returns.
pub struct Subscription {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::warn!("snapshot poller panicked during shutdown");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Opens a second connection to `db_path` and streams full snapshots of
/// `query` over `tx`: one immediately, then one per observed change.
pub fn subscribe(
    db_path: &Path,
    query: DocumentQuery,
    poll_interval: Duration,
    tx: Sender<SnapshotEvent>,
) -> Result<Subscription> {
    if db_path.as_os_str() == ":memory:" {
        bail!("live subscriptions need an on-disk database; in-memory stores cannot be shared");
    }
    if poll_interval.is_zero() {
        bail!("poll interval must be positive");
    }

    let store = Store::open(db_path)
        .with_context(|| format!("open subscription connection to {}", db_path.display()))?;
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);

    let handle = thread::Builder::new()
        .name(format!("snapshot-{}", query.collection))
        .spawn(move || poll_loop(&store, &query, poll_interval, &flag, &tx))
        .context("spawn snapshot poller")?;

    Ok(Subscription {
        stop,
        handle: Some(handle),
    })
}

fn poll_loop(
    store: &Store,
    query: &DocumentQuery,
    poll_interval: Duration,
    stop: &AtomicBool,
    tx: &Sender<SnapshotEvent>,
) {
    tracing::debug!(collection = %query.collection, order_by = %query.order_by, "subscription started");

    let mut last_version: Option<i64> = None;
    let mut last_snapshot: Option<Vec<DocumentSnapshot>> = None;

    while !stop.load(Ordering::SeqCst) {
        match poll_once(store, query, &mut last_version, &mut last_snapshot) {
            Ok(Some(documents)) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                tracing::debug!(
                    collection = %query.collection,
                    documents = documents.len(),
                    "snapshot emitted"
                );
                if tx.send(SnapshotEvent::Snapshot(documents)).is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(error) => {
                let message = format!("{error:#}");
                tracing::warn!(collection = %query.collection, error = %message, "subscription failed");
                if !stop.load(Ordering::SeqCst) {
                    let _ = tx.send(SnapshotEvent::Failed(message));
                }
                break;
            }
        }
        thread::park_timeout(poll_interval);
    }

    tracing::debug!(collection = %query.collection, "subscription stopped");
}

// Returns a snapshot only when the ordered result set differs from the last
// one sent. The first poll always emits.
fn poll_once(
    store: &Store,
    query: &DocumentQuery,
    last_version: &mut Option<i64>,
    last_snapshot: &mut Option<Vec<DocumentSnapshot>>,
) -> Result<Option<Vec<DocumentSnapshot>>> {
    let version = store.data_version()?;
    if last_snapshot.is_some() && *last_version == Some(version) {
        return Ok(None);
    }
    *last_version = Some(version);

    let documents = store.list_documents(query)?;
    if last_snapshot.as_ref() == Some(&documents) {
        return Ok(None);
    }
    *last_snapshot = Some(documents.clone());
    Ok(Some(documents))
}
