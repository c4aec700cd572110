// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use rolodex_app::{ClientStatus, DocumentId, StockType, format_iso_date};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use time::macros::date;
use time::{Date, Duration};

const FIRST_NAMES: [&str; 16] = [
    "Ravi", "Lakshmi", "Srinivas", "Padma", "Venkat", "Anitha", "Suresh", "Kavya", "Naveen",
    "Divya", "Prasad", "Swathi", "Harish", "Bhavani", "Kiran", "Sravani",
];
const LAST_NAMES: [&str; 12] = [
    "Reddy", "Naidu", "Rao", "Kumar", "Chowdary", "Sharma", "Varma", "Goud", "Setty", "Raju",
    "Murthy", "Prasad",
];
const PLACES: [&str; 10] = [
    "TIRUPATI",
    "CHITTOOR",
    "NELLORE",
    "KADAPA",
    "SRIKALAHASTI",
    "PUTTUR",
    "MADANAPALLE",
    "RENIGUNTA",
    "PILERU",
    "NAGARI",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator for raw client documents in the store's wire shape.
#[derive(Debug, Clone)]
pub struct ClientFaker {
    rng: DeterministicRng,
    serial: u32,
}

impl ClientFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            serial: 0,
        }
    }

    /// A complete document dated `date`.
    pub fn client_document(&mut self, date: Date) -> Map<String, Value> {
        self.serial += 1;
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let status = if self.rng.int_n(5) == 0 {
            ClientStatus::Inactive
        } else {
            ClientStatus::Active
        };
        let stock_type = StockType::ALL[self.rng.int_n(StockType::ALL.len())];
        let margin = self.int_range(0, 400) as f64 / 2.0;

        let value = json!({
            "clientName": format!("{first} {last}"),
            "clientId": format!("CL-{:05}", self.serial),
            "mobileNum": self.mobile_number(),
            "date": format_iso_date(date),
            "place": self.pick(&PLACES),
            "status": status.as_str(),
            "stockType": stock_type.as_str(),
            "margin": margin,
        });
        into_map(value)
    }

    /// Like `client_document` but with a couple of optional fields dropped,
    /// the way older entries look in the store.
    pub fn sparse_client_document(&mut self, date: Date) -> Map<String, Value> {
        let mut document = self.client_document(date);
        for key in ["place", "status", "stockType", "margin"] {
            if self.rng.int_n(2) == 0 {
                document.remove(key);
            }
        }
        document
    }

    /// `count` documents spread over the weeks before `today`, with the
    /// first few dated `today` so the new marker shows up.
    pub fn demo_documents(&mut self, count: usize, today: Date) -> Vec<Map<String, Value>> {
        (0..count)
            .map(|index| {
                let date = if index < 3 {
                    today
                } else {
                    today - Duration::days(self.int_range(1, 60))
                };
                if index % 4 == 3 {
                    self.sparse_client_document(date)
                } else {
                    self.client_document(date)
                }
            })
            .collect()
    }

    fn mobile_number(&mut self) -> String {
        let lead = ["6", "7", "8", "9"][self.rng.int_n(4)];
        format!("{lead}{:09}", self.rng.next_u64() % 1_000_000_000)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("rolodex.db");
    Ok((dir, db_path))
}

pub fn fixture_today() -> Date {
    date!(2026 - 02 - 19)
}

/// The two-client set used across filter scenarios: an active client on
/// 2024-01-02 with margin 100 and an inactive one on 2024-01-01 with 50.
pub fn margin_pair_documents() -> Vec<(DocumentId, Map<String, Value>)> {
    vec![
        (
            DocumentId::new("pair-a"),
            into_map(json!({"date": "2024-01-02", "status": "ACTIVE", "margin": 100})),
        ),
        (
            DocumentId::new("pair-b"),
            into_map(json!({"date": "2024-01-01", "status": "INACTIVE", "margin": 50})),
        ),
    ]
}

pub fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_owned(), other);
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientFaker, fixture_today};
    use rolodex_app::{ClientRecord, DocumentId, format_iso_date};

    #[test]
    fn faker_is_deterministic_per_seed() {
        let mut a = ClientFaker::new(7);
        let mut b = ClientFaker::new(7);
        assert_eq!(
            a.client_document(fixture_today()),
            b.client_document(fixture_today())
        );
    }

    #[test]
    fn demo_documents_start_with_today() {
        let mut faker = ClientFaker::new(42);
        let today = fixture_today();
        let documents = faker.demo_documents(12, today);
        assert_eq!(documents.len(), 12);
        for document in &documents[..3] {
            assert_eq!(
                document.get("date").and_then(|value| value.as_str()),
                Some(format_iso_date(today).as_str())
            );
        }
        assert!(
            documents[3..]
                .iter()
                .all(|document| document.get("date").and_then(|v| v.as_str())
                    < Some(format_iso_date(today).as_str()))
        );
    }

    #[test]
    fn generated_documents_map_cleanly() {
        let mut faker = ClientFaker::new(3);
        let record =
            ClientRecord::from_document(DocumentId::new("x"), &faker.client_document(fixture_today()));
        assert!(record.client_id.starts_with("CL-"));
        assert_eq!(record.mobile_num.len(), 10);
        assert!(record.margin >= 0.0 && record.margin <= 200.0);
    }
}
