use std::collections::HashMap;

use plant_client::domain::{PlantRecord, StateCode};
use serde_json::Value;

use crate::sources::spreadsheet::RawRow;

pub const FACILITY_CODE: &str = "DOE/EIA ORIS plant or facility code";
pub const PLANT_NAME: &str = "Plant name";
pub const STATE_ABBREVIATION: &str = "Plant state abbreviation";
pub const LATITUDE: &str = "Plant latitude";
pub const LONGITUDE: &str = "Plant longitude";
pub const ANNUAL_NET_GENERATION: &str = "Plant annual net generation (MWh)";

/// Convert a raw sheet row into a `PlantRecord`.
///
/// Rules:
/// - facility code must be an integer, name non-blank, state two letters;
///   otherwise the row is skipped.
/// - latitude/longitude fall back to 0.0 when missing or unparsable.
/// - generation is read through its string form, see [`parse_generation`].
pub fn normalize_row(row: &RawRow) -> Option<PlantRecord> {
    let Some(facility_id) = row.get(FACILITY_CODE).and_then(parse_facility_id) else {
        tracing::debug!(value = ?row.get(FACILITY_CODE), "skipping row without facility code");
        return None;
    };

    let name = row.get(PLANT_NAME).map(value_to_string).unwrap_or_default();
    let name = name.trim();
    if name.is_empty() {
        tracing::debug!(facility_id, "skipping row without plant name");
        return None;
    }

    let state_raw = row.get(STATE_ABBREVIATION).map(value_to_string).unwrap_or_default();
    let state: StateCode = match state_raw.parse() {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(facility_id, error = %e, "skipping row with invalid state");
            return None;
        }
    };

    let generation_raw = row.get(ANNUAL_NET_GENERATION).map(value_to_string).unwrap_or_default();

    Some(PlantRecord {
        facility_id,
        name: name.to_string(),
        state: state.as_str().to_string(),
        latitude: row.get(LATITUDE).map(parse_coordinate).unwrap_or(0.0),
        longitude: row.get(LONGITUDE).map(parse_coordinate).unwrap_or(0.0),
        annual_net_generation: parse_generation(&generation_raw),
    })
}

/// Parse annual net generation from its string form.
///
/// - blank → 0.0
/// - thousands separators are dropped
/// - accounting notation `(123.4)` reads as `-123.4`
/// - anything left unparsable or non-finite → 0.0
pub fn parse_generation(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => {
            tracing::debug!(value = trimmed, "annual net generation in parentheses");
            (true, inner)
        }
        None => (false, trimmed),
    };

    let cleaned: String = body.chars().filter(|c| *c != ',').collect();
    match cleaned.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => {
            if negative {
                -v.abs()
            } else {
                v
            }
        }
        _ => {
            tracing::debug!(value = trimmed, "unparsable annual net generation, using 0");
            0.0
        }
    }
}

fn parse_coordinate(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn parse_facility_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Collapse records sharing a facility code, keeping the one that came last
/// in sheet order. Returns the surviving records and how many were dropped.
pub fn dedupe_by_facility(records: Vec<PlantRecord>) -> (Vec<PlantRecord>, usize) {
    let input = records.len();
    let mut position: HashMap<i64, usize> = HashMap::with_capacity(input);
    let mut unique: Vec<PlantRecord> = Vec::with_capacity(input);

    for record in records {
        match position.get(&record.facility_id) {
            Some(&idx) => {
                tracing::debug!(facility_id = record.facility_id, "later sheet row replaces earlier duplicate");
                unique[idx] = record;
            }
            None => {
                position.insert(record.facility_id, unique.len());
                unique.push(record);
            }
        }
    }

    let dropped = input - unique.len();
    (unique, dropped)
}

/// Order records largest generator first; ties by facility code.
pub fn sort_by_generation_desc(records: &mut [PlantRecord]) {
    records.sort_by(|a, b| {
        b.annual_net_generation
            .total_cmp(&a.annual_net_generation)
            .then(a.facility_id.cmp(&b.facility_id))
    });
}
