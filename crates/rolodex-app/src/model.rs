// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::Date;
use time::macros::format_description;

use crate::ids::DocumentId;

pub const DEFAULT_PLACE: &str = "TIRUPATI";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClientStatus {
    #[default]
    Active,
    Inactive,
}

impl ClientStatus {
    pub const ALL: [Self; 2] = [Self::Active, Self::Inactive];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Self::Active),
            "INACTIVE" => Some(Self::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StockType {
    #[default]
    Delivery,
    Sales,
}

impl StockType {
    pub const ALL: [Self; 2] = [Self::Delivery, Self::Sales];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delivery => "DELIVERY",
            Self::Sales => "SALES",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DELIVERY" => Some(Self::Delivery),
            "SALES" => Some(Self::Sales),
            _ => None,
        }
    }
}

/// One directory entry, with every field already defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: DocumentId,
    pub client_name: String,
    pub client_id: String,
    pub mobile_num: String,
    /// `YYYY-MM-DD`, or empty when the store had none.
    pub date: String,
    pub place: String,
    pub status: ClientStatus,
    pub stock_type: StockType,
    pub margin: f64,
}

impl ClientRecord {
    /// Maps a raw store document into a record. Never fails: absent or
    /// unusable fields take their defaults.
    pub fn from_document(id: DocumentId, data: &Map<String, Value>) -> Self {
        Self {
            id,
            client_name: text_field(data, "clientName").unwrap_or_default(),
            client_id: text_field(data, "clientId").unwrap_or_default(),
            mobile_num: text_field(data, "mobileNum").unwrap_or_default(),
            date: text_field(data, "date").unwrap_or_default(),
            place: text_field(data, "place").unwrap_or_else(|| DEFAULT_PLACE.to_owned()),
            status: text_field(data, "status")
                .and_then(|raw| ClientStatus::parse(&raw))
                .unwrap_or_default(),
            stock_type: text_field(data, "stockType")
                .and_then(|raw| StockType::parse(&raw))
                .unwrap_or_default(),
            margin: number_field(data, "margin").unwrap_or(0.0),
        }
    }

    pub fn is_new_on(&self, today: Date) -> bool {
        !self.date.is_empty() && self.date == format_iso_date(today)
    }
}

pub fn format_iso_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}

pub fn format_margin(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

// Falsy values (missing, null, "", false) fall back to the caller's default.
fn text_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) if number.as_f64() == Some(0.0) => None,
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn number_field(data: &Map<String, Value>, key: &str) -> Option<f64> {
    match data.get(key)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientRecord, ClientStatus, DEFAULT_PLACE, StockType, format_margin};
    use crate::DocumentId;
    use serde_json::{Map, Value, json};
    use time::{Date, Month};

    fn document(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn empty_document_takes_every_default() {
        let record = ClientRecord::from_document(DocumentId::new("a1"), &Map::new());
        assert_eq!(record.id.as_str(), "a1");
        assert_eq!(record.client_name, "");
        assert_eq!(record.client_id, "");
        assert_eq!(record.mobile_num, "");
        assert_eq!(record.date, "");
        assert_eq!(record.place, DEFAULT_PLACE);
        assert_eq!(record.status, ClientStatus::Active);
        assert_eq!(record.stock_type, StockType::Delivery);
        assert_eq!(record.margin, 0.0);
    }

    #[test]
    fn populated_document_maps_fields() {
        let record = ClientRecord::from_document(
            DocumentId::new("b2"),
            &document(json!({
                "clientName": "Ravi Kumar",
                "clientId": "CL-00042",
                "mobileNum": "9876543210",
                "date": "2024-01-02",
                "place": "NELLORE",
                "status": "INACTIVE",
                "stockType": "SALES",
                "margin": 12.5,
            })),
        );
        assert_eq!(record.client_name, "Ravi Kumar");
        assert_eq!(record.client_id, "CL-00042");
        assert_eq!(record.mobile_num, "9876543210");
        assert_eq!(record.date, "2024-01-02");
        assert_eq!(record.place, "NELLORE");
        assert_eq!(record.status, ClientStatus::Inactive);
        assert_eq!(record.stock_type, StockType::Sales);
        assert_eq!(record.margin, 12.5);
    }

    #[test]
    fn empty_place_falls_back_to_default() {
        let record =
            ClientRecord::from_document(DocumentId::new("c3"), &document(json!({"place": ""})));
        assert_eq!(record.place, DEFAULT_PLACE);
    }

    #[test]
    fn numeric_zero_in_any_spelling_takes_defaults() {
        let record = ClientRecord::from_document(
            DocumentId::new("z0"),
            &document(json!({"place": 0.0, "mobileNum": -0.0, "clientId": 0})),
        );
        assert_eq!(record.place, DEFAULT_PLACE);
        assert_eq!(record.mobile_num, "");
        assert_eq!(record.client_id, "");
    }

    #[test]
    fn numeric_phone_is_rendered_as_text() {
        let record = ClientRecord::from_document(
            DocumentId::new("d4"),
            &document(json!({"mobileNum": 9876543210_i64, "margin": "42"})),
        );
        assert_eq!(record.mobile_num, "9876543210");
        assert_eq!(record.margin, 42.0);
    }

    #[test]
    fn unknown_enum_values_and_junk_take_defaults() {
        let record = ClientRecord::from_document(
            DocumentId::new("e5"),
            &document(json!({
                "clientName": null,
                "status": "PAUSED",
                "stockType": 7,
                "margin": {"value": 3},
            })),
        );
        assert_eq!(record.client_name, "");
        assert_eq!(record.status, ClientStatus::Active);
        assert_eq!(record.stock_type, StockType::Delivery);
        assert_eq!(record.margin, 0.0);
    }

    #[test]
    fn enum_parsing_is_case_insensitive() {
        assert_eq!(ClientStatus::parse(" inactive "), Some(ClientStatus::Inactive));
        assert_eq!(StockType::parse("Sales"), Some(StockType::Sales));
        assert_eq!(StockType::parse(""), None);
    }

    #[test]
    fn new_marker_matches_only_today() -> anyhow::Result<()> {
        let today = Date::from_calendar_date(2024, Month::January, 2)?;
        let mut record = ClientRecord::from_document(
            DocumentId::new("f6"),
            &document(json!({"date": "2024-01-02"})),
        );
        assert!(record.is_new_on(today));

        record.date = "2024-01-01".to_owned();
        assert!(!record.is_new_on(today));

        record.date.clear();
        assert!(!record.is_new_on(today));
        Ok(())
    }

    #[test]
    fn margin_formatting_drops_trailing_zero_fraction() {
        assert_eq!(format_margin(100.0), "100");
        assert_eq!(format_margin(12.5), "12.5");
        assert_eq!(format_margin(-3.0), "-3");
    }
}
