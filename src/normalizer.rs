use crate::prelude::*;
use crate::register::RegisterKind;
use crate::snapshot::as_number;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Same-day drops smaller than this are jitter, not a rollback.
pub const COUNTER_TOLERANCE: f64 = 0.1;

pub const UNKNOWN_LABEL: &str = "unknown";

/// A display-ready register value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Number(f64),
    Label(String),
    Text(String),
}

impl Reading {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterTrackState {
    pub last_valid_value: Option<f64>,
    pub last_update_date: Option<NaiveDate>,
}

impl CounterTrackState {
    fn accept(&mut self, value: f64, today: NaiveDate) -> f64 {
        self.last_valid_value = Some(value);
        self.last_update_date = Some(today);
        value
    }
}

/// Turn one raw register value into a reading.
///
/// `track` is only read or written for counter registers, and only on
/// acceptance of a new value.
pub fn normalize(
    descriptor: &RegisterDescriptor,
    raw: Option<&Value>,
    track: &mut CounterTrackState,
    today: NaiveDate,
) -> Option<Reading> {
    let raw = raw.filter(|v| !v.is_null());

    match descriptor.kind {
        // enums never echo a stale label
        RegisterKind::Enum(_) => {
            let label = raw
                .and_then(as_number)
                .and_then(|code| descriptor.label_for(code as i64))
                .unwrap_or(UNKNOWN_LABEL);
            Some(Reading::Label(label.to_string()))
        }
        RegisterKind::Text => raw.map(|v| match v {
            Value::String(s) => Reading::Text(s.clone()),
            other => Reading::Text(other.to_string()),
        }),
        RegisterKind::Numeric => {
            let raw = match raw {
                Some(raw) => raw,
                None if descriptor.is_counter => return track.last_valid_value.map(Reading::Number),
                None => return None,
            };

            let value = match as_number(raw) {
                Some(value) => value,
                // firmware occasionally answers with text for a numeric key
                None => {
                    return match raw {
                        Value::String(s) => Some(Reading::Text(s.clone())),
                        _ => None,
                    }
                }
            };

            let scaled = value * descriptor.scale;
            if !descriptor.is_counter {
                return Some(Reading::Number(scaled));
            }

            Some(Reading::Number(track_counter(descriptor, scaled, track, today)))
        }
    }
}

fn track_counter(
    descriptor: &RegisterDescriptor,
    scaled: f64,
    track: &mut CounterTrackState,
    today: NaiveDate,
) -> f64 {
    let (last_value, last_date) = match (track.last_valid_value, track.last_update_date) {
        (Some(value), Some(date)) => (value, date),
        (Some(value), None) => {
            // restored without a date; treat as seen today
            (value, today)
        }
        (None, _) => return track.accept(scaled, today),
    };

    if today > last_date {
        if scaled < last_value {
            info!(
                "accepting daily reset for {} ({}): {} -> {}",
                descriptor.name, descriptor.key, last_value, scaled
            );
        }
        return track.accept(scaled, today);
    }

    if scaled < last_value - COUNTER_TOLERANCE {
        debug!(
            "ignoring same-day drop for {} ({}): {} -> {}",
            descriptor.name, descriptor.key, last_value, scaled
        );
        return last_value;
    }

    track.accept(scaled, today)
}

/// Owns the counter track state of every counter register of one device.
#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    counters: HashMap<u16, CounterTrackState>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed track state restored from a durable store.
    pub fn load(&mut self, states: HashMap<u16, CounterTrackState>) {
        self.counters = states;
    }

    pub fn states(&self) -> &HashMap<u16, CounterTrackState> {
        &self.counters
    }

    pub fn normalize(
        &mut self,
        descriptor: &RegisterDescriptor,
        raw: Option<&Value>,
        today: NaiveDate,
    ) -> Option<Reading> {
        if descriptor.is_counter {
            let track = self.counters.entry(descriptor.key).or_default();
            normalize(descriptor, raw, track, today)
        } else {
            normalize(descriptor, raw, &mut CounterTrackState::default(), today)
        }
    }
}
