use crate::prelude::*;

use std::sync::Arc;
use tokio::sync::Mutex;

/// A running device instance. The mutex is held for the whole of a poll or
/// a command, so at most one operation is in flight per device.
#[derive(Clone)]
pub struct DeviceHandle {
    pub id: String,
    pub is_primary: bool,
    pub coordinator: Arc<Mutex<Coordinator>>,
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("id", &self.id)
            .field("is_primary", &self.is_primary)
            .finish_non_exhaustive()
    }
}

impl DeviceHandle {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            id: coordinator.id().to_string(),
            is_primary: coordinator.device().is_primary(),
            coordinator: Arc::new(Mutex::new(coordinator)),
        }
    }
}

/// Every device instance this process runs, in configuration order.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceHandle>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP-backed coordinators for every enabled device.
    pub fn from_config(config: &ConfigWrapper) -> Result<Self> {
        let mut registry = Self::new();
        for device in config.enabled_devices() {
            registry.insert(Coordinator::from_config(device)?)?;
        }
        Ok(registry)
    }

    pub fn insert(&mut self, coordinator: Coordinator) -> Result<DeviceHandle> {
        if self.get(coordinator.id()).is_some() {
            bail!("device {} is already registered", coordinator.id());
        }

        let handle = DeviceHandle::new(coordinator);
        self.devices.push(handle.clone());
        Ok(handle)
    }

    pub fn get(&self, id: &str) -> Option<&DeviceHandle> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn list_all(&self) -> &[DeviceHandle] {
        &self.devices
    }

    pub fn primary(&self) -> Option<&DeviceHandle> {
        self.devices.iter().find(|d| d.is_primary)
    }

    pub fn resolve(&self, selector: &DeviceSelector) -> Result<&DeviceHandle> {
        let handle = match selector {
            DeviceSelector::Device(id) => self
                .get(id)
                .ok_or_else(|| ValidationError::UnknownDevice(id.clone()))?,
            DeviceSelector::Default => self
                .primary()
                .or_else(|| self.devices.first())
                .ok_or(ValidationError::NoDevices)?,
            DeviceSelector::Cluster => self.primary().ok_or(ValidationError::NoPrimaryDevice)?,
        };

        Ok(handle)
    }
}
