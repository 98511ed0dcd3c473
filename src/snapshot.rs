use crate::prelude::*;
use crate::register::BatteryState;
use serde_json::Value;
use std::collections::BTreeMap;

/// Last-known raw value of every register a device has ever reported.
///
/// Keys are kept in their wire form ("6002"). A key, once seen, is never
/// removed by a later poll that omits it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateSnapshot {
    values: BTreeMap<String, Value>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite every key present in `data`, keep everything else.
    pub fn merge(&mut self, data: &RawData) {
        for (key, value) in data {
            if value.is_null() {
                continue;
            }
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: u16) -> Option<&Value> {
        self.values.get(&key.to_string())
    }

    pub fn number(&self, key: u16) -> Option<f64> {
        self.get(key).and_then(as_number)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn soc(&self) -> Option<f64> {
        self.number(register::BATTERY_SOC)
    }

    pub fn battery_state(&self) -> Option<BatteryState> {
        let code = self.number(register::BATTERY_STATE)?;
        BatteryState::try_from(code as u16).ok()
    }

    pub fn serial_number(&self) -> Option<String> {
        match self.get(register::SERIAL_NUMBER)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Devices report most readings as JSON numbers, some firmware sends them
/// as numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawData {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn merge_retains_omitted_keys() {
        let mut snapshot = StateSnapshot::new();
        snapshot.merge(&raw(json!({"6000": 150, "6002": 42})));
        snapshot.merge(&raw(json!({"6000": 90})));

        assert_eq!(snapshot.number(6000), Some(90.0));
        assert_eq!(snapshot.soc(), Some(42.0));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn null_does_not_erase() {
        let mut snapshot = StateSnapshot::new();
        snapshot.merge(&raw(json!({"6002": 42})));
        snapshot.merge(&raw(json!({"6002": null})));
        assert_eq!(snapshot.soc(), Some(42.0));
    }

    #[test]
    fn battery_state_and_serial() {
        let mut snapshot = StateSnapshot::new();
        assert_eq!(snapshot.battery_state(), None);
        snapshot.merge(&raw(json!({"6001": 1002, "0": "BK1600A123"})));
        assert_eq!(snapshot.battery_state(), Some(BatteryState::Discharging));
        assert_eq!(snapshot.serial_number().as_deref(), Some("BK1600A123"));
    }

    #[test]
    fn numeric_strings() {
        assert_eq!(as_number(&json!("12.5")), Some(12.5));
        assert_eq!(as_number(&json!("n/a")), None);
        assert_eq!(as_number(&json!(true)), None);
    }
}
