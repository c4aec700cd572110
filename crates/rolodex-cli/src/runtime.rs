// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rolodex_db::{DocumentQuery, SnapshotEvent, Subscription, client_records};
use rolodex_tui::{ClientFeed, InternalEvent};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Live client feed backed by a store subscription. Raw documents are mapped
/// to `ClientRecord`s on a forwarding thread before they reach the UI.
pub struct StoreFeed {
    db_path: PathBuf,
    query: DocumentQuery,
    poll_interval: Duration,
    subscription: Option<Subscription>,
    forwarder: Option<JoinHandle<()>>,
}

impl StoreFeed {
    pub fn new(db_path: PathBuf, query: DocumentQuery, poll_interval: Duration) -> Self {
        Self {
            db_path,
            query,
            poll_interval,
            subscription: None,
            forwarder: None,
        }
    }
}

impl ClientFeed for StoreFeed {
    fn subscribe(&mut self, tx: Sender<InternalEvent>) -> Result<()> {
        if self.subscription.is_some() {
            bail!("client feed is already subscribed");
        }

        let (snapshot_tx, snapshot_rx) = mpsc::channel();
        let subscription = rolodex_db::subscribe(
            &self.db_path,
            self.query.clone(),
            self.poll_interval,
            snapshot_tx,
        )?;
        let forwarder = thread::Builder::new()
            .name("client-feed".to_owned())
            .spawn(move || forward_snapshots(&snapshot_rx, &tx))
            .context("spawn client feed forwarder")?;

        tracing::info!(
            db = %self.db_path.display(),
            collection = %self.query.collection,
            "client feed subscribed"
        );
        self.subscription = Some(subscription);
        self.forwarder = Some(forwarder);
        Ok(())
    }

    fn unsubscribe(&mut self) -> Result<()> {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        // The poller has been joined, so its sender is gone and the
        // forwarder's receive loop ends.
        if let Some(forwarder) = self.forwarder.take() {
            forwarder
                .join()
                .map_err(|_| anyhow!("client feed forwarder panicked"))?;
            tracing::info!(collection = %self.query.collection, "client feed unsubscribed");
        }
        Ok(())
    }
}

impl Drop for StoreFeed {
    fn drop(&mut self) {
        if let Err(error) = self.unsubscribe() {
            tracing::warn!(error = %format!("{error:#}"), "error dropping client feed");
        }
    }
}

fn forward_snapshots(rx: &Receiver<SnapshotEvent>, tx: &Sender<InternalEvent>) {
    for event in rx {
        let forwarded = match event {
            SnapshotEvent::Snapshot(documents) => InternalEvent::Snapshot(client_records(&documents)),
            SnapshotEvent::Failed(message) => InternalEvent::StreamFailed(message),
        };
        if tx.send(forwarded).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StoreFeed;
    use anyhow::Result;
    use rolodex_app::{ClientStatus, DocumentId};
    use rolodex_db::{CLIENTS_COLLECTION, DocumentQuery, Store};
    use rolodex_testkit::{ClientFaker, fixture_today, margin_pair_documents, temp_db_path};
    use rolodex_tui::{ClientFeed, InternalEvent};
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::time::Duration;

    const POLL: Duration = Duration::from_millis(20);
    const WAIT: Duration = Duration::from_secs(5);

    fn seeded_store() -> Result<(tempfile::TempDir, PathBuf, Store)> {
        let (dir, db_path) = temp_db_path()?;
        let store = Store::open(&db_path)?;
        store.bootstrap()?;
        for (id, data) in margin_pair_documents() {
            store.put_document(CLIENTS_COLLECTION, &id, &data)?;
        }
        Ok((dir, db_path, store))
    }

    #[test]
    fn feed_forwards_mapped_records() -> Result<()> {
        let (_dir, db_path, store) = seeded_store()?;
        let mut feed = StoreFeed::new(
            db_path,
            DocumentQuery::clients(CLIENTS_COLLECTION),
            POLL,
        );
        let (tx, rx) = mpsc::channel();
        feed.subscribe(tx)?;

        let InternalEvent::Snapshot(records) = rx.recv_timeout(WAIT)? else {
            panic!("expected initial snapshot");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.as_str(), "pair-a");
        assert_eq!(records[0].status, ClientStatus::Active);
        assert_eq!(records[1].status, ClientStatus::Inactive);
        assert_eq!(records[1].place, "TIRUPATI");

        let mut faker = ClientFaker::new(11);
        store.put_document(
            CLIENTS_COLLECTION,
            &DocumentId::new("walk-in"),
            &faker.client_document(fixture_today()),
        )?;
        let InternalEvent::Snapshot(records) = rx.recv_timeout(WAIT)? else {
            panic!("expected change snapshot");
        };
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id.as_str(), "walk-in");

        feed.unsubscribe()?;
        store.delete_document(CLIENTS_COLLECTION, &DocumentId::new("walk-in"))?;
        std::thread::sleep(POLL * 5);
        assert!(rx.try_recv().is_err(), "feed must be silent after unsubscribe");
        Ok(())
    }

    #[test]
    fn feed_rejects_double_subscribe() -> Result<()> {
        let (_dir, db_path, _store) = seeded_store()?;
        let mut feed = StoreFeed::new(
            db_path,
            DocumentQuery::clients(CLIENTS_COLLECTION),
            POLL,
        );
        let (tx, _rx) = mpsc::channel();
        feed.subscribe(tx.clone())?;
        let error = feed.subscribe(tx).expect_err("second subscribe should fail");
        assert!(error.to_string().contains("already subscribed"));

        feed.unsubscribe()?;
        feed.unsubscribe()?;
        Ok(())
    }

    #[test]
    fn feed_surfaces_store_failure_as_stream_failure() -> Result<()> {
        let (_dir, db_path, store) = seeded_store()?;
        let mut feed = StoreFeed::new(
            db_path,
            DocumentQuery::clients(CLIENTS_COLLECTION),
            POLL,
        );
        let (tx, rx) = mpsc::channel();
        feed.subscribe(tx)?;
        assert!(matches!(
            rx.recv_timeout(WAIT)?,
            InternalEvent::Snapshot(_)
        ));

        store.raw_connection().execute_batch("DROP TABLE documents;")?;
        let InternalEvent::StreamFailed(message) = rx.recv_timeout(WAIT)? else {
            panic!("expected stream failure");
        };
        assert!(!message.is_empty());
        feed.unsubscribe()?;
        Ok(())
    }

    #[test]
    fn feed_cannot_follow_in_memory_store() {
        let mut feed = StoreFeed::new(
            PathBuf::from(":memory:"),
            DocumentQuery::clients(CLIENTS_COLLECTION),
            POLL,
        );
        let (tx, _rx) = mpsc::channel();
        let error = feed.subscribe(tx).expect_err("memory store cannot be followed");
        assert!(error.to_string().contains("on-disk database"));
    }
}
