use crate::prelude::*;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Modbus-style function code used by every SetData write the device accepts.
pub const FUNCTION_WRITE: u8 = 16;

pub const SERIAL_NUMBER: u16 = 0;
pub const BATTERY_STATE: u16 = 6001;
pub const BATTERY_SOC: u16 = 6002;
pub const WORKING_MODE: u16 = 7101;

// DeviceGeneration {{{
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceGeneration {
    /// BK1600 / BK1600Ultra
    Gen1,
    /// SolidFlex / PowerFlex2000
    Gen2,
}

impl DeviceGeneration {
    pub fn from_model(model: &str) -> Result<Self> {
        let lower = model.to_ascii_lowercase();
        if lower.contains("bk1600") {
            Ok(Self::Gen1)
        } else if lower.contains("solidflex") || lower.contains("powerflex") {
            Ok(Self::Gen2)
        } else {
            bail!("unsupported device model {:?}", model)
        }
    }
}

impl std::fmt::Display for DeviceGeneration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gen1 => write!(f, "Gen 1"),
            Self::Gen2 => write!(f, "Gen 2"),
        }
    }
} // }}}

// RegisterDescriptor {{{
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RegisterKind {
    Numeric,
    Enum(&'static [(i64, &'static str)]),
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unit {
    None,
    Watt,
    KiloWattHour,
    Percent,
    Volt,
    Ampere,
    Celsius,
    Hertz,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Watt => "W",
            Self::KiloWattHour => "kWh",
            Self::Percent => "%",
            Self::Volt => "V",
            Self::Ampere => "A",
            Self::Celsius => "°C",
            Self::Hertz => "Hz",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RegisterDescriptor {
    pub key: u16,
    pub name: &'static str,
    pub kind: RegisterKind,
    pub unit: Unit,
    pub scale: f64,
    pub is_counter: bool,
}

impl RegisterDescriptor {
    pub const fn numeric(key: u16, name: &'static str, unit: Unit) -> Self {
        Self {
            key,
            name,
            kind: RegisterKind::Numeric,
            unit,
            scale: 1.0,
            is_counter: false,
        }
    }

    pub const fn enumeration(
        key: u16,
        name: &'static str,
        map: &'static [(i64, &'static str)],
    ) -> Self {
        Self {
            key,
            name,
            kind: RegisterKind::Enum(map),
            unit: Unit::None,
            scale: 1.0,
            is_counter: false,
        }
    }

    pub const fn text(key: u16, name: &'static str) -> Self {
        Self {
            key,
            name,
            kind: RegisterKind::Text,
            unit: Unit::None,
            scale: 1.0,
            is_counter: false,
        }
    }

    /// Energy accumulator: only increases within a day, may reset at midnight.
    pub const fn counter(self) -> Self {
        Self {
            is_counter: true,
            ..self
        }
    }

    pub const fn scaled(self, scale: f64) -> Self {
        Self { scale, ..self }
    }

    /// Key as it appears in GetData responses.
    pub fn wire_key(&self) -> String {
        self.key.to_string()
    }

    /// "Battery Daily Charging Energy" -> "battery_daily_charging_energy"
    pub fn slug(&self) -> String {
        let mut r = String::with_capacity(self.name.len());
        for c in self.name.chars() {
            if c.is_ascii_alphanumeric() {
                r.push(c.to_ascii_lowercase());
            } else if !r.ends_with('_') {
                r.push('_');
            }
        }
        r.trim_matches('_').to_string()
    }

    pub fn label_for(&self, code: i64) -> Option<&'static str> {
        match self.kind {
            RegisterKind::Enum(map) => map.iter().find(|(c, _)| *c == code).map(|(_, l)| *l),
            _ => None,
        }
    }
} // }}}

// Control values {{{
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum ControlRegister {
    InverterInputLimit = 1138,
    BackupSoc = 1142,
    GridCharging = 1143,
    FeedInLimit = 1146,
    AcOutputPower = 1147,
    LedLight = 7265,
    BypassSocket = 7266,
    WorkingMode = 47005,
    ChargeDischarge = 47015,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ChargeState {
    Stop = 0,
    Charge = 1,
    Discharge = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum WorkingMode {
    SelfConsumption = 1,
    Schedule = 2,
    RealTime = 4,
    /// Newer firmware reports the schedule mode as 5.
    ScheduleAlt = 5,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum BatteryState {
    Static = 1000,
    Charging = 1001,
    Discharging = 1002,
} // }}}
