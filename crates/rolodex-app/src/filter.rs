// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::model::{ClientRecord, ClientStatus, StockType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetField {
    Status,
    StockType,
    Place,
    MinMargin,
    MaxMargin,
}

impl FacetField {
    pub const ALL: [Self; 5] = [
        Self::Status,
        Self::StockType,
        Self::Place,
        Self::MinMargin,
        Self::MaxMargin,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::StockType => "stock type",
            Self::Place => "place",
            Self::MinMargin => "min margin",
            Self::MaxMargin => "max margin",
        }
    }

    pub const fn is_margin(self) -> bool {
        matches!(self, Self::MinMargin | Self::MaxMargin)
    }
}

/// Search text plus facet selections. Empty fields do not constrain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterState {
    pub search_term: String,
    pub status: Option<ClientStatus>,
    pub stock_type: Option<StockType>,
    pub place: String,
    /// Raw bound text; coerced to a number when the predicate runs.
    pub min_margin: String,
    pub max_margin: String,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.search_term.is_empty() && !self.has_facets()
    }

    pub fn has_facets(&self) -> bool {
        self.status.is_some()
            || self.stock_type.is_some()
            || !self.place.is_empty()
            || !self.min_margin.is_empty()
            || !self.max_margin.is_empty()
    }

    pub fn facet_text(&self, field: FacetField) -> &str {
        match field {
            FacetField::Status => self.status.map_or("", ClientStatus::as_str),
            FacetField::StockType => self.stock_type.map_or("", StockType::as_str),
            FacetField::Place => &self.place,
            FacetField::MinMargin => &self.min_margin,
            FacetField::MaxMargin => &self.max_margin,
        }
    }

    /// Sets one facet from its text form. Empty text clears the facet.
    pub fn set_facet(&mut self, field: FacetField, value: &str) -> Result<()> {
        match field {
            FacetField::Status => {
                self.status = if value.is_empty() {
                    None
                } else {
                    match ClientStatus::parse(value) {
                        Some(status) => Some(status),
                        None => bail!("unknown status {value:?}; expected ACTIVE or INACTIVE"),
                    }
                };
            }
            FacetField::StockType => {
                self.stock_type = if value.is_empty() {
                    None
                } else {
                    match StockType::parse(value) {
                        Some(stock_type) => Some(stock_type),
                        None => bail!("unknown stock type {value:?}; expected DELIVERY or SALES"),
                    }
                };
            }
            FacetField::Place => value.clone_into(&mut self.place),
            FacetField::MinMargin => value.clone_into(&mut self.min_margin),
            FacetField::MaxMargin => value.clone_into(&mut self.max_margin),
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn matches(&self, record: &ClientRecord) -> bool {
        matches_search(record, &self.search_term) && self.matches_facets(record)
    }

    fn matches_facets(&self, record: &ClientRecord) -> bool {
        if let Some(status) = self.status
            && record.status != status
        {
            return false;
        }
        if let Some(stock_type) = self.stock_type
            && record.stock_type != stock_type
        {
            return false;
        }
        if !self.place.is_empty() && record.place != self.place {
            return false;
        }
        // A NaN bound never compares true, so junk input hides everything.
        if !self.min_margin.is_empty() {
            let bound = coerce_bound(&self.min_margin);
            if bound.is_nan() || record.margin < bound {
                return false;
            }
        }
        if !self.max_margin.is_empty() {
            let bound = coerce_bound(&self.max_margin);
            if bound.is_nan() || record.margin > bound {
                return false;
            }
        }
        true
    }
}

/// Empty terms match everything. Name, id and place fold case; phone and
/// date are literal substrings.
pub fn matches_search(record: &ClientRecord, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let folded = term.to_lowercase();
    record.client_name.to_lowercase().contains(&folded)
        || record.client_id.to_lowercase().contains(&folded)
        || record.mobile_num.contains(term)
        || record.date.contains(term)
        || record.place.to_lowercase().contains(&folded)
}

/// Derives the visible rows. Keeps mirror order; recomputed from scratch.
pub fn project(mirror: &[ClientRecord], filter: &FilterState) -> Vec<ClientRecord> {
    mirror
        .iter()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect()
}

/// Distinct places in first-seen order, for cycling the place facet.
pub fn distinct_places(mirror: &[ClientRecord]) -> Vec<String> {
    let mut places: Vec<String> = Vec::new();
    for record in mirror {
        if !places.iter().any(|place| *place == record.place) {
            places.push(record.place.clone());
        }
    }
    places
}

// Number-literal coercion for typed bounds: blank is 0, decimal and
// exponent forms parse, `Infinity` is spelled exactly, and unsigned
// 0x/0o/0b literals read in their radix. Anything else is NaN.
fn coerce_bound(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(value) = radix_literal(trimmed) {
        return value;
    }
    let decimal = trimmed
        .bytes()
        .all(|byte| byte.is_ascii_digit() || matches!(byte, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !decimal {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn radix_literal(text: &str) -> Option<f64> {
    let mut chars = text.chars();
    if chars.next()? != '0' {
        return None;
    }
    let radix = match chars.next()? {
        'x' | 'X' => 16,
        'o' | 'O' => 8,
        'b' | 'B' => 2,
        _ => return None,
    };
    let digits = chars.as_str();
    if digits.is_empty() {
        return Some(f64::NAN);
    }
    let value = digits.chars().try_fold(0.0_f64, |acc, ch| {
        ch.to_digit(radix)
            .map(|digit| acc * f64::from(radix) + f64::from(digit))
    });
    Some(value.unwrap_or(f64::NAN))
}
