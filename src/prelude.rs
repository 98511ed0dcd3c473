pub use anyhow::{anyhow, bail, Result};
pub use log::{debug, error, info, trace, warn};
pub use std::str::FromStr;
pub use tokio::sync::broadcast;

pub use crate::{
    catalog,
    channels::Channels,
    command::{Command, CommandOutcome, DeviceSelector},
    config::{self, ConfigWrapper},
    coordinator::{self, Coordinator, PollOutcome},
    error::{Rejection, ValidationError},
    mqtt,
    normalizer::{CounterTrackState, Reading},
    register::{self, DeviceGeneration, RegisterDescriptor},
    safety::{self, SafetyPolicy},
    snapshot::StateSnapshot,
    transport::{self, Ack, RawData, Transport},
};

pub use crate::config::Config;
