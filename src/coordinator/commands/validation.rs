use crate::prelude::*;

/// Absolute power range accepted by any device, regardless of its ceilings.
pub const POWER_RANGE: (i64, i64) = (0, config::MAX_POWER as i64);
pub const SOC_RANGE: (i64, i64) = (0, 100);
pub const BACKUP_SOC_RANGE: (i64, i64) = (5, 100);

/// Checks `value` against an inclusive range.
///
/// # Examples
/// ```
/// use indevolt_bridge::coordinator::commands::validation::{validate_range, POWER_RANGE};
///
/// assert!(validate_range("power", 800, POWER_RANGE).is_ok());
/// assert!(validate_range("power", 2401, POWER_RANGE).is_err());
/// ```
pub fn validate_range(field: &'static str, value: i64, (min, max): (i64, i64)) -> Result<()> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        }
        .into());
    }

    Ok(())
}

pub fn validate_writable(device: &config::Device) -> Result<()> {
    if device.read_only() {
        return Err(ValidationError::ReadOnly(device.id().to_string()).into());
    }

    Ok(())
}

pub fn validate_gen2(
    command: &'static str,
    device: &config::Device,
    generation: DeviceGeneration,
) -> Result<()> {
    if generation != DeviceGeneration::Gen2 {
        return Err(ValidationError::UnsupportedGeneration {
            command,
            device: device.id().to_string(),
        }
        .into());
    }

    Ok(())
}

pub fn validate_mode(code: i64) -> Result<register::WorkingMode> {
    u16::try_from(code)
        .ok()
        .and_then(|c| register::WorkingMode::try_from(c).ok())
        .ok_or_else(|| ValidationError::InvalidMode(code).into())
}
