use std::fmt;

/// A command refused before anything was written to the device.
///
/// Returned wrapped in `anyhow::Error` so callers can `downcast_ref` it and
/// tell a bad request apart from a transport failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    UnknownDevice(String),
    NoPrimaryDevice,
    NoDevices,
    UnsupportedGeneration {
        command: &'static str,
        device: String,
    },
    ReadOnly(String),
    InvalidMode(i64),
    ClusterUnsupported(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ValidationError::*;

        match self {
            OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{} must be between {} and {} (got {})", field, min, max, value),
            UnknownDevice(id) => write!(f, "device with id {} not found", id),
            NoPrimaryDevice => write!(f, "no primary device configured for cluster mode"),
            NoDevices => write!(f, "no devices configured"),
            UnsupportedGeneration { command, device } => write!(
                f,
                "{} is only available for Gen 2 devices (SolidFlex/PowerFlex2000), {} is Gen 1",
                command, device
            ),
            ReadOnly(id) => write!(f, "device {} is in read-only mode", id),
            InvalidMode(code) => write!(f, "unknown working mode code {}", code),
            ClusterUnsupported(command) => {
                write!(f, "{} cannot be sent in cluster mode, address a device instead", command)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Why a charge/discharge command was deliberately ignored.
///
/// This is an expected outcome near the SOC floor, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    SocFloor { soc: f64, virtual_min_soc: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::SocFloor {
                soc,
                virtual_min_soc,
            } => write!(
                f,
                "current SOC ({}%) at or below virtual Min-SOC ({}%)",
                soc, virtual_min_soc
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_survives_anyhow() {
        let err: anyhow::Error = ValidationError::NoPrimaryDevice.into();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::NoPrimaryDevice)
        );
    }

    #[test]
    fn out_of_range_message() {
        let err = ValidationError::OutOfRange {
            field: "power",
            value: 3000,
            min: 0,
            max: 2400,
        };
        assert_eq!(err.to_string(), "power must be between 0 and 2400 (got 3000)");
    }
}
