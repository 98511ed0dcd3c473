use crate::prelude::*;

use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const MIN_SCAN_INTERVAL: Duration = Duration::from_secs(5);
pub const MAX_POWER: u16 = 2400;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub devices: Vec<Device>,
    pub mqtt: Mqtt,
    pub state_store: Option<StateStore>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,
}

// Device {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Device {
    pub id: String,

    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub host: String,
    #[serde(default = "Config::default_device_port")]
    pub port: u16,
    pub model: String,

    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_scan_interval")]
    pub scan_interval: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "Config::default_request_timeout")]
    pub request_timeout: Duration,
    pub batch_size: Option<usize>,
    #[serde(default = "Config::default_rpc_namespace")]
    pub rpc_namespace: String,

    #[serde(default = "Config::default_max_charge_power")]
    pub max_charge_power: u16,
    #[serde(default = "Config::default_max_discharge_power")]
    pub max_discharge_power: u16,
    #[serde(default = "Config::default_virtual_min_soc")]
    pub virtual_min_soc: u8,

    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub read_only: bool,
}
impl Device {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generation(&self) -> Result<DeviceGeneration> {
        DeviceGeneration::from_model(&self.model)
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// None (or 0) means every key goes in a single request.
    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size.filter(|n| *n > 0)
    }

    pub fn rpc_namespace(&self) -> &str {
        &self.rpc_namespace
    }

    pub fn max_charge_power(&self) -> u16 {
        self.max_charge_power
    }

    pub fn max_discharge_power(&self) -> u16 {
        self.max_discharge_power
    }

    pub fn virtual_min_soc(&self) -> u8 {
        self.virtual_min_soc
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }
} // }}}

// Mqtt {{{
#[derive(Clone, Debug, Deserialize)]
pub struct Mqtt {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub host: String,
    #[serde(default = "Config::default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,

    #[serde(default = "Config::default_mqtt_namespace")]
    pub namespace: String,
}
impl Mqtt {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> &Option<String> {
        &self.username
    }

    pub fn password(&self) -> &Option<String> {
        &self.password
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
} // }}}

// StateStore {{{
#[derive(Clone, Debug, Deserialize)]
pub struct StateStore {
    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub url: String,
}
impl StateStore {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn url(&self) -> &str {
        &self.url
    }
} // }}}

pub struct ConfigWrapper {
    config: Arc<Mutex<Config>>,
}

impl Clone for ConfigWrapper {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
        }
    }
}

impl ConfigWrapper {
    pub fn new(file: String) -> Result<Self> {
        let config = Config::new(file)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Config> {
        // nothing panics while holding the lock, but don't let a poisoned
        // mutex take the bridge down with it
        self.config.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn devices(&self) -> Vec<Device> {
        self.lock().devices.clone()
    }

    pub fn enabled_devices(&self) -> Vec<Device> {
        self.devices().into_iter().filter(|d| d.enabled()).collect()
    }

    pub fn device(&self, id: &str) -> Option<Device> {
        self.devices().into_iter().find(|d| d.id() == id)
    }

    pub fn mqtt(&self) -> Mqtt {
        self.lock().mqtt.clone()
    }

    pub fn state_store(&self) -> Option<StateStore> {
        self.lock().state_store.clone().filter(|s| s.enabled())
    }

    pub fn loglevel(&self) -> String {
        self.lock().loglevel.clone()
    }

    pub fn log_summary(&self) {
        self.lock().log_summary()
    }
}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        let content = std::fs::read_to_string(&file)
            .map_err(|err| anyhow!("error reading {}: {}", file, err))?;

        Self::from_yaml(&content).map_err(|err| anyhow!("{}: {}", file, err))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn log_summary(&self) {
        info!("Configuration loaded successfully:");
        info!(
            "  Devices: {} configured, {} enabled",
            self.devices.len(),
            self.devices.iter().filter(|d| d.enabled).count()
        );
        for device in &self.devices {
            info!("    Device[{}]:", device.id);
            info!("      Enabled: {}", device.enabled);
            info!("      Address: {}:{}", device.host, device.port);
            info!("      Model: {}", device.model);
            info!("      Scan Interval: {}s", device.scan_interval.as_secs());
            info!("      Request Timeout: {}s", device.request_timeout.as_secs());
            if let Some(batch_size) = device.batch_size() {
                info!("      Batch Size: {}", batch_size);
            }
            info!(
                "      Max Charge/Discharge: {}W / {}W",
                device.max_charge_power, device.max_discharge_power
            );
            info!("      Virtual Min SOC: {}%", device.virtual_min_soc);
            info!("      Primary: {}", device.is_primary);
            info!("      Read Only: {}", device.read_only);
        }

        info!("  MQTT: {}", if self.mqtt.enabled { "enabled" } else { "disabled" });
        if self.mqtt.enabled {
            info!("    Host: {}", self.mqtt.host);
            info!("    Port: {}", self.mqtt.port);
            info!("    Namespace: {}", self.mqtt.namespace);
        }

        match &self.state_store {
            Some(store) if store.enabled => info!("  State Store: {}", store.url),
            _ => info!("  State Store: disabled"),
        }

        info!("  Log Level: {}", self.loglevel);
    }

    fn validate(&self) -> Result<()> {
        if self.mqtt.enabled {
            if self.mqtt.port == 0 {
                bail!("mqtt.port must be between 1 and 65535");
            }
            if self.mqtt.host.is_empty() {
                bail!("mqtt.host cannot be empty");
            }
        }

        if let Some(store) = &self.state_store {
            if store.enabled && !store.url.starts_with("sqlite:") {
                bail!("state_store.url must be a sqlite: url, got {}", store.url);
            }
        }

        if !self.devices.iter().any(|d| d.enabled) {
            bail!("at least one enabled device is required");
        }

        let mut ids = HashSet::new();
        for device in &self.devices {
            if !ids.insert(device.id.as_str()) {
                bail!("duplicate device id {}", device.id);
            }
            Self::validate_device(device)?;
        }

        let primaries = self
            .devices
            .iter()
            .filter(|d| d.enabled && d.is_primary)
            .count();
        if primaries > 1 {
            bail!("only one device may be marked is_primary, found {}", primaries);
        }

        Ok(())
    }

    fn validate_device(device: &Device) -> Result<()> {
        let id = &device.id;

        if id.is_empty() || id.contains('/') || id == "default" || id == "cluster" {
            bail!("device id {:?} is not usable as an mqtt topic segment", id);
        }
        if device.host.is_empty() {
            bail!("device[{}].host cannot be empty", id);
        }
        if device.port == 0 {
            bail!("device[{}].port must be between 1 and 65535", id);
        }
        device
            .generation()
            .map_err(|err| anyhow!("device[{}]: {}", id, err))?;
        if device.scan_interval < MIN_SCAN_INTERVAL {
            bail!(
                "device[{}].scan_interval must be at least {}s",
                id,
                MIN_SCAN_INTERVAL.as_secs()
            );
        }
        if device.request_timeout.is_zero() {
            bail!("device[{}].request_timeout cannot be 0", id);
        }
        if device.max_charge_power > MAX_POWER {
            bail!("device[{}].max_charge_power must be between 0 and {}", id, MAX_POWER);
        }
        if device.max_discharge_power > MAX_POWER {
            bail!("device[{}].max_discharge_power must be between 0 and {}", id, MAX_POWER);
        }
        if device.virtual_min_soc > 100 {
            bail!("device[{}].virtual_min_soc must be between 0 and 100", id);
        }

        Ok(())
    }

    fn default_device_port() -> u16 {
        8080
    }

    fn default_scan_interval() -> Duration {
        Duration::from_secs(30)
    }

    fn default_request_timeout() -> Duration {
        Duration::from_secs(15)
    }

    fn default_rpc_namespace() -> String {
        "Indevolt".to_string()
    }

    fn default_max_charge_power() -> u16 {
        1200
    }

    fn default_max_discharge_power() -> u16 {
        800
    }

    fn default_virtual_min_soc() -> u8 {
        10
    }

    fn default_mqtt_port() -> u16 {
        1883
    }

    fn default_mqtt_namespace() -> String {
        "indevolt".to_string()
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
devices:
  - id: garage
    host: 192.168.1.50
    model: SolidFlex/PowerFlex2000
mqtt:
  host: localhost
"#;

    #[test]
    fn defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        let device = &config.devices[0];

        assert!(device.enabled());
        assert_eq!(device.port(), 8080);
        assert_eq!(device.scan_interval(), Duration::from_secs(30));
        assert_eq!(device.request_timeout(), Duration::from_secs(15));
        assert_eq!(device.batch_size(), None);
        assert_eq!(device.rpc_namespace(), "Indevolt");
        assert_eq!(device.max_charge_power(), 1200);
        assert_eq!(device.max_discharge_power(), 800);
        assert_eq!(device.virtual_min_soc(), 10);
        assert!(!device.is_primary());
        assert!(!device.read_only());
        assert_eq!(device.generation().unwrap(), DeviceGeneration::Gen2);
        assert_eq!(device.base_url(), "http://192.168.1.50:8080");

        assert_eq!(config.mqtt.port(), 1883);
        assert_eq!(config.mqtt.namespace(), "indevolt");
        assert_eq!(config.loglevel, "info");
        assert!(config.state_store.is_none());
    }

    #[test]
    fn scan_interval_minimum() {
        let yaml = MINIMAL.replace("model:", "scan_interval: 4\n    model:");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("scan_interval"), "{}", err);

        let yaml = MINIMAL.replace("model:", "scan_interval: 5\n    model:");
        assert!(Config::from_yaml(&yaml).is_ok());
    }

    #[test]
    fn rejects_unknown_model() {
        let yaml = MINIMAL.replace("SolidFlex/PowerFlex2000", "Powerwall");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn rejects_ceiling_above_absolute_max() {
        let yaml = MINIMAL.replace("model:", "max_charge_power: 2500\n    model:");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn rejects_two_primaries() {
        let yaml = r#"
devices:
  - id: a
    host: 10.0.0.1
    model: BK1600
    is_primary: true
  - id: b
    host: 10.0.0.2
    model: BK1600
    is_primary: true
mqtt:
  host: localhost
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("is_primary"), "{}", err);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let yaml = r#"
devices:
  - id: a
    host: 10.0.0.1
    model: BK1600
  - id: a
    host: 10.0.0.2
    model: BK1600
mqtt:
  host: localhost
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn requires_an_enabled_device() {
        let yaml = MINIMAL.replace("model:", "enabled: false\n    model:");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn mqtt_host_required_only_when_enabled() {
        let yaml = MINIMAL.replace("  host: localhost", "  enabled: false");
        assert!(Config::from_yaml(&yaml).is_ok());

        let yaml = MINIMAL.replace("  host: localhost", "  port: 1883");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn state_store_must_be_sqlite() {
        let yaml = format!("{}state_store:\n  url: postgres://localhost/x\n", MINIMAL);
        assert!(Config::from_yaml(&yaml).is_err());

        let yaml = format!("{}state_store:\n  url: sqlite://state.db\n", MINIMAL);
        assert!(Config::from_yaml(&yaml).is_ok());
    }

    #[test]
    fn wrapper_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = ConfigWrapper::new(file.path().display().to_string()).unwrap();
        assert_eq!(config.enabled_devices().len(), 1);
        assert!(config.device("garage").is_some());
        assert!(config.device("shed").is_none());
        assert!(config.state_store().is_none());
    }

    #[test]
    fn missing_file() {
        assert!(ConfigWrapper::new("/nonexistent/indevolt.yaml".to_string()).is_err());
    }
}
