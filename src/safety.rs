use crate::prelude::*;
use crate::register::{BatteryState, ChargeState, ControlRegister, FUNCTION_WRITE};

/// Per-device limits applied to every charge/discharge request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafetyPolicy {
    pub virtual_min_soc: f64,
    pub max_charge_power: u16,
    pub max_discharge_power: u16,
}

impl SafetyPolicy {
    pub fn from_device(device: &config::Device) -> Self {
        Self {
            virtual_min_soc: device.virtual_min_soc() as f64,
            max_charge_power: device.max_charge_power(),
            max_discharge_power: device.max_discharge_power(),
        }
    }

    pub fn ceiling(&self, intent: PowerIntent) -> u16 {
        match intent {
            PowerIntent::Charge => self.max_charge_power,
            PowerIntent::Discharge => self.max_discharge_power,
        }
    }

    pub fn clamp(&self, intent: PowerIntent, power: u16) -> u16 {
        power.min(self.ceiling(intent))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerIntent {
    Charge,
    Discharge,
}

impl PowerIntent {
    pub fn charge_state(&self) -> ChargeState {
        match self {
            Self::Charge => ChargeState::Charge,
            Self::Discharge => ChargeState::Discharge,
        }
    }

    pub fn default_soc_limit(&self) -> u8 {
        match self {
            Self::Charge => 100,
            Self::Discharge => 5,
        }
    }
}

impl std::fmt::Display for PowerIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Charge => write!(f, "charge"),
            Self::Discharge => write!(f, "discharge"),
        }
    }
}

/// Gate an operator charge/discharge request on the live SOC.
///
/// An unknown SOC never blocks: losing telemetry must not leave the
/// operator unable to act on the device.
pub fn precheck_power(
    _intent: PowerIntent,
    snapshot: &StateSnapshot,
    policy: &SafetyPolicy,
) -> Result<(), Rejection> {
    match snapshot.soc() {
        Some(soc) if soc <= policy.virtual_min_soc => Err(Rejection::SocFloor {
            soc,
            virtual_min_soc: policy.virtual_min_soc,
        }),
        _ => Ok(()),
    }
}

/// True when the device is discharging at or below the SOC floor.
pub fn needs_stop(snapshot: &StateSnapshot, policy: &SafetyPolicy) -> bool {
    if snapshot.battery_state() != Some(BatteryState::Discharging) {
        return false;
    }

    matches!(snapshot.soc(), Some(soc) if soc <= policy.virtual_min_soc)
}

/// Halt an unattended discharge that has crossed the floor.
///
/// Returns whether a stop was sent.
pub async fn watchdog(
    device: &str,
    snapshot: &StateSnapshot,
    policy: &SafetyPolicy,
    transport: &dyn Transport,
) -> Result<bool> {
    if !needs_stop(snapshot, policy) {
        return Ok(false);
    }

    warn!(
        "{}: discharging at SOC {}% with virtual Min-SOC {}%, sending stop",
        device,
        snapshot.soc().unwrap_or_default(),
        policy.virtual_min_soc
    );

    transport
        .write(
            FUNCTION_WRITE,
            ControlRegister::ChargeDischarge.into(),
            &[ChargeState::Stop as i64, 0, 0],
        )
        .await?;

    Ok(true)
}
