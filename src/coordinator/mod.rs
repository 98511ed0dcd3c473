use crate::prelude::*;

pub mod commands;

use crate::normalizer::Normalizer;
use crate::register::ControlRegister;
use crate::safety::PowerIntent;
use crate::transport::HttpTransport;
use chrono::NaiveDate;
use commands::{
    charge_discharge::ChargeDischarge, set_register::SetRegister, validate_gen2, validate_mode,
    validate_range, validate_writable, BACKUP_SOC_RANGE, POWER_RANGE, SOC_RANGE,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Consecutive poll failures after which they are logged as warnings.
pub const FAILURE_ESCALATION_THRESHOLD: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The device answered this tick.
    Fresh,
    /// The device did not answer; the previous snapshot is still current.
    Stale,
}

/// Owns the live state of one configured device: its snapshot, counter
/// tracking and failure count. Callers serialise access (see
/// `registry::DeviceHandle`).
pub struct Coordinator {
    device: config::Device,
    generation: DeviceGeneration,
    policy: SafetyPolicy,
    transport: Arc<dyn Transport>,
    keys: Vec<u16>,

    snapshot: StateSnapshot,
    normalizer: Normalizer,
    readings: BTreeMap<u16, Reading>,
    consecutive_failures: u32,
    has_succeeded: bool,
    serial: Option<String>,
}

impl Coordinator {
    pub fn new(device: config::Device, transport: Arc<dyn Transport>) -> Result<Self> {
        let generation = device.generation()?;

        Ok(Self {
            policy: SafetyPolicy::from_device(&device),
            keys: catalog::keys(generation),
            device,
            generation,
            transport,
            snapshot: StateSnapshot::new(),
            normalizer: Normalizer::new(),
            readings: BTreeMap::new(),
            consecutive_failures: 0,
            has_succeeded: false,
            serial: None,
        })
    }

    /// Coordinator talking HTTP to the configured host.
    pub fn from_config(device: config::Device) -> Result<Self> {
        let transport = HttpTransport::new(&device)?;
        Self::new(device, Arc::new(transport))
    }

    // accessors {{{
    pub fn id(&self) -> &str {
        self.device.id()
    }

    pub fn device(&self) -> &config::Device {
        &self.device
    }

    pub fn generation(&self) -> DeviceGeneration {
        self.generation
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub fn snapshot(&self) -> &StateSnapshot {
        &self.snapshot
    }

    /// Normalized values from the most recent fresh poll.
    pub fn readings(&self) -> &BTreeMap<u16, Reading> {
        &self.readings
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn has_succeeded(&self) -> bool {
        self.has_succeeded
    }

    /// Serial number reported by the device on first contact.
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    pub fn load_counters(&mut self, states: HashMap<u16, CounterTrackState>) {
        debug!("{}: restored {} counter states", self.id(), states.len());
        self.normalizer.load(states);
    }

    pub fn counter_states(&self) -> &HashMap<u16, CounterTrackState> {
        self.normalizer.states()
    }
    // }}}

    // polling {{{
    pub async fn refresh(&mut self) -> Result<PollOutcome> {
        self.refresh_on(chrono::Local::now().date_naive()).await
    }

    /// One poll. Errors only while the device has never answered.
    pub async fn refresh_on(&mut self, today: NaiveDate) -> Result<PollOutcome> {
        if self.serial.is_none() {
            match self.transport.probe().await {
                Ok(serial) => self.serial = Some(serial),
                Err(err) => return self.poll_failed(err),
            }
        }

        let data = match self.transport.read(&self.keys).await {
            Ok(data) if data.is_empty() => Err(anyhow!("device returned no data")),
            other => other,
        };

        let data = match data {
            Ok(data) => data,
            Err(err) => return self.poll_failed(err),
        };

        self.snapshot.merge(&data);
        self.readings = self.normalize(&data, today);

        if !self.has_succeeded {
            info!(
                "{}: connected to {} {} ({}), {} registers",
                self.id(),
                self.device.model(),
                self.serial.as_deref().unwrap_or("?"),
                self.generation,
                data.len()
            );
        } else if self.consecutive_failures > 0 {
            info!(
                "{}: device answering again after {} failed polls",
                self.id(),
                self.consecutive_failures
            );
        } else {
            debug!("{}: polled {} registers", self.id(), data.len());
        }
        self.has_succeeded = true;
        self.consecutive_failures = 0;

        self.run_watchdog().await;

        Ok(PollOutcome::Fresh)
    }

    async fn run_watchdog(&self) {
        if self.device.read_only() {
            if safety::needs_stop(&self.snapshot, &self.policy) {
                warn!(
                    "{}: discharging below virtual Min-SOC, not stopping a read_only device",
                    self.id()
                );
            }
            return;
        }

        let transport = self.transport.as_ref();
        let policy = &self.policy;
        if let Err(err) = safety::watchdog(self.id(), &self.snapshot, policy, transport).await {
            // re-evaluated on the next tick
            error!("{}: watchdog stop failed: {}", self.id(), err);
        }
    }

    fn poll_failed(&mut self, err: anyhow::Error) -> Result<PollOutcome> {
        self.consecutive_failures += 1;

        if !self.has_succeeded {
            bail!("{}: device never answered: {}", self.id(), err);
        }

        if self.consecutive_failures >= FAILURE_ESCALATION_THRESHOLD {
            warn!(
                "{}: poll failed {} times in a row, keeping last state: {}",
                self.id(),
                self.consecutive_failures,
                err
            );
        } else {
            debug!("{}: poll failed, keeping last state: {}", self.id(), err);
        }

        Ok(PollOutcome::Stale)
    }

    fn normalize(&mut self, data: &RawData, today: NaiveDate) -> BTreeMap<u16, Reading> {
        let mut readings = BTreeMap::new();

        for descriptor in catalog::for_generation(self.generation) {
            let raw = data.get(&descriptor.wire_key());
            if let Some(reading) = self.normalizer.normalize(descriptor, raw, today) {
                readings.insert(descriptor.key, reading);
            }
        }

        readings
    }
    // }}}

    // control {{{
    pub async fn charge(&self, power: i64, soc_limit: Option<i64>) -> Result<CommandOutcome> {
        self.charge_discharge(PowerIntent::Charge, power, soc_limit).await
    }

    pub async fn discharge(&self, power: i64, soc_limit: Option<i64>) -> Result<CommandOutcome> {
        self.charge_discharge(PowerIntent::Discharge, power, soc_limit).await
    }

    async fn charge_discharge(
        &self,
        intent: PowerIntent,
        power: i64,
        soc_limit: Option<i64>,
    ) -> Result<CommandOutcome> {
        validate_writable(&self.device)?;
        validate_range("power", power, POWER_RANGE)?;
        let soc_limit = soc_limit.unwrap_or(intent.default_soc_limit() as i64);
        validate_range("soc_limit", soc_limit, SOC_RANGE)?;

        if let Err(rejection) = safety::precheck_power(intent, &self.snapshot, &self.policy) {
            warn!("{}: ignoring {} command: {}", self.id(), intent, rejection);
            return Ok(CommandOutcome::Rejected(rejection));
        }

        // both already range checked above
        let requested = power as u16;
        let power = self.policy.clamp(intent, requested);
        if power != requested {
            info!(
                "{}: clamping {} power {}W to configured maximum {}W",
                self.id(),
                intent,
                requested,
                power
            );
        }

        let ack = ChargeDischarge::new(
            self.transport(),
            self.id(),
            intent.charge_state(),
            power,
            soc_limit as u8,
        )
        .run()
        .await?;

        Ok(CommandOutcome::Applied(ack))
    }

    pub async fn stop(&self) -> Result<CommandOutcome> {
        validate_writable(&self.device)?;

        let ack = ChargeDischarge::stop(self.transport(), self.id())
            .run()
            .await?;

        Ok(CommandOutcome::Applied(ack))
    }

    pub async fn set_mode(&self, code: i64) -> Result<CommandOutcome> {
        validate_writable(&self.device)?;
        let mode = validate_mode(code)?;

        self.write_register(ControlRegister::WorkingMode, u16::from(mode) as i64).await
    }

    pub async fn set_backup_soc(&self, percent: i64) -> Result<CommandOutcome> {
        self.set_gen2_value(
            "set_backup_soc",
            ControlRegister::BackupSoc,
            "backup_soc",
            percent,
            BACKUP_SOC_RANGE,
        )
        .await
    }

    pub async fn set_ac_output_power(&self, watts: i64) -> Result<CommandOutcome> {
        self.set_gen2_value(
            "set_ac_output_power",
            ControlRegister::AcOutputPower,
            "power",
            watts,
            POWER_RANGE,
        )
        .await
    }

    pub async fn set_feed_in_limit(&self, watts: i64) -> Result<CommandOutcome> {
        self.set_gen2_value(
            "set_feed_in_limit",
            ControlRegister::FeedInLimit,
            "power",
            watts,
            POWER_RANGE,
        )
        .await
    }

    pub async fn set_inverter_input_limit(&self, watts: i64) -> Result<CommandOutcome> {
        self.set_gen2_value(
            "set_inverter_input_limit",
            ControlRegister::InverterInputLimit,
            "power",
            watts,
            POWER_RANGE,
        )
        .await
    }

    pub async fn set_grid_charging(&self, enabled: bool) -> Result<CommandOutcome> {
        self.set_gen2_switch("set_grid_charging", ControlRegister::GridCharging, enabled).await
    }

    pub async fn set_bypass_socket(&self, enabled: bool) -> Result<CommandOutcome> {
        self.set_gen2_switch("set_bypass_socket", ControlRegister::BypassSocket, enabled).await
    }

    pub async fn set_led_light(&self, enabled: bool) -> Result<CommandOutcome> {
        self.set_gen2_switch("set_led_light", ControlRegister::LedLight, enabled).await
    }

    async fn set_gen2_value(
        &self,
        command: &'static str,
        register: ControlRegister,
        field: &'static str,
        value: i64,
        range: (i64, i64),
    ) -> Result<CommandOutcome> {
        validate_writable(&self.device)?;
        validate_gen2(command, &self.device, self.generation)?;
        validate_range(field, value, range)?;

        self.write_register(register, value).await
    }

    async fn set_gen2_switch(
        &self,
        command: &'static str,
        register: ControlRegister,
        enabled: bool,
    ) -> Result<CommandOutcome> {
        validate_writable(&self.device)?;
        validate_gen2(command, &self.device, self.generation)?;

        self.write_register(register, enabled as i64).await
    }

    async fn write_register(
        &self,
        register: ControlRegister,
        value: i64,
    ) -> Result<CommandOutcome> {
        let ack = SetRegister::new(self.transport(), self.id(), register, value)
            .run()
            .await?;

        Ok(CommandOutcome::Applied(ack))
    }
    // }}}
}
