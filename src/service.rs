use crate::prelude::*;
use crate::registry::DeviceRegistry;

/// Turns operator commands into façade calls on the addressed device.
#[derive(Clone)]
pub struct Service {
    channels: Channels,
    registry: DeviceRegistry,
}

impl Service {
    pub fn new(channels: Channels, registry: DeviceRegistry) -> Self {
        Self { channels, registry }
    }

    pub async fn start(&self) -> Result<()> {
        let mut receiver = self.channels.from_mqtt.subscribe();

        loop {
            match receiver.recv().await {
                Ok(mqtt::ChannelData::Message(message)) => {
                    if let Err(err) = self.process_message(message).await {
                        error!("{:#}", err);
                    }
                }
                Ok(mqtt::ChannelData::Shutdown) => break,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("command receiver lagged, {} commands dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        Ok(())
    }

    pub fn stop(&self) {
        let _ = self.channels.from_mqtt.send(mqtt::ChannelData::Shutdown);
    }

    async fn process_message(&self, message: mqtt::Message) -> Result<()> {
        let command = match message.to_command() {
            Ok(command) => command,
            Err(err) => {
                warn!("{}", err);
                if let Some(topic) = message.to_result_topic() {
                    self.reply(mqtt::Message {
                        topic,
                        retain: false,
                        payload: "FAIL".to_string(),
                    })?;
                }
                return Ok(());
            }
        };

        info!("parsed command {:?}", command);
        let payload = match self.process_command(command.clone()).await {
            Ok(outcome) => outcome.as_str(),
            Err(err) => {
                if err.downcast_ref::<ValidationError>().is_some() {
                    warn!("{}: {}", command.to_result_topic(), err);
                } else {
                    error!("{}: {:#}", command.to_result_topic(), err);
                }
                "FAIL"
            }
        };

        self.reply(mqtt::Message::for_result(&command, payload))
    }

    fn reply(&self, message: mqtt::Message) -> Result<()> {
        if self
            .channels
            .to_mqtt
            .send(mqtt::ChannelData::Message(message))
            .is_err()
        {
            bail!("send(to_mqtt) failed - channel closed?");
        }

        Ok(())
    }

    pub async fn process_command(&self, command: Command) -> Result<CommandOutcome> {
        use Command::*;

        if command.selector() == &DeviceSelector::Cluster && !command.allowed_in_cluster() {
            return Err(ValidationError::ClusterUnsupported(command.action()).into());
        }

        let handle = self.registry.resolve(command.selector())?;
        debug!("{} -> {}", command.selector(), handle.id);

        let coordinator = handle.coordinator.lock().await;

        match command {
            Charge(_, power, soc_limit) => coordinator.charge(power, soc_limit).await,
            Discharge(_, power, soc_limit) => coordinator.discharge(power, soc_limit).await,
            Stop(_) => coordinator.stop().await,
            SetMode(_, code) => coordinator.set_mode(code).await,
            SetBackupSoc(_, v) => coordinator.set_backup_soc(v).await,
            SetAcOutputPower(_, v) => coordinator.set_ac_output_power(v).await,
            SetFeedInLimit(_, v) => coordinator.set_feed_in_limit(v).await,
            SetGridCharging(_, v) => coordinator.set_grid_charging(v).await,
            SetInverterInputLimit(_, v) => coordinator.set_inverter_input_limit(v).await,
            SetBypassSocket(_, v) => coordinator.set_bypass_socket(v).await,
            SetLedLight(_, v) => coordinator.set_led_light(v).await,
        }
    }
}
