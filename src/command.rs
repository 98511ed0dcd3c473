use crate::prelude::*;

/// Which configured device a command is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    Device(String),
    /// The primary device, else the first configured one.
    Default,
    /// The primary device, acting on behalf of all of them.
    Cluster,
}

impl DeviceSelector {
    pub fn from_topic_segment(segment: &str) -> Self {
        match segment {
            "default" => Self::Default,
            "cluster" => Self::Cluster,
            id => Self::Device(id.to_string()),
        }
    }
}

impl std::fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device(id) => write!(f, "{}", id),
            Self::Default => write!(f, "default"),
            Self::Cluster => write!(f, "cluster"),
        }
    }
}

/// Operator requests. Numeric arguments are kept as received and range
/// checked by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Charge(DeviceSelector, i64, Option<i64>),
    Discharge(DeviceSelector, i64, Option<i64>),
    Stop(DeviceSelector),
    SetMode(DeviceSelector, i64),
    SetBackupSoc(DeviceSelector, i64),
    SetAcOutputPower(DeviceSelector, i64),
    SetFeedInLimit(DeviceSelector, i64),
    SetGridCharging(DeviceSelector, bool),
    SetInverterInputLimit(DeviceSelector, i64),
    SetBypassSocket(DeviceSelector, bool),
    SetLedLight(DeviceSelector, bool),
}

impl Command {
    pub fn selector(&self) -> &DeviceSelector {
        use Command::*;

        match self {
            Charge(s, _, _)
            | Discharge(s, _, _)
            | Stop(s)
            | SetMode(s, _)
            | SetBackupSoc(s, _)
            | SetAcOutputPower(s, _)
            | SetFeedInLimit(s, _)
            | SetGridCharging(s, _)
            | SetInverterInputLimit(s, _)
            | SetBypassSocket(s, _)
            | SetLedLight(s, _) => s,
        }
    }

    /// Topic suffix after the target, as used on cmd/ and result/.
    pub fn action(&self) -> &'static str {
        use Command::*;

        match self {
            Charge(..) => "charge",
            Discharge(..) => "discharge",
            Stop(..) => "stop",
            SetMode(..) => "set/mode",
            SetBackupSoc(..) => "set/backup_soc",
            SetAcOutputPower(..) => "set/ac_output_power",
            SetFeedInLimit(..) => "set/feed_in_limit",
            SetGridCharging(..) => "set/grid_charging",
            SetInverterInputLimit(..) => "set/inverter_input_limit",
            SetBypassSocket(..) => "set/bypass_socket",
            SetLedLight(..) => "set/led_light",
        }
    }

    pub fn allowed_in_cluster(&self) -> bool {
        matches!(self, Command::Charge(..) | Command::Discharge(..) | Command::Stop(..))
    }

    pub fn to_result_topic(&self) -> String {
        format!("result/{}/{}", self.selector(), self.action())
    }
}

/// What happened to a command that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Applied(Ack),
    Rejected(Rejection),
}

impl CommandOutcome {
    /// Result topic payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied(_) => "OK",
            Self::Rejected(_) => "IGNORED",
        }
    }
}
