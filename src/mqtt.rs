use crate::prelude::*;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, Publish, QoS};
use serde::Deserialize;
use std::collections::BTreeMap;

// Message {{{
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub retain: bool,
    pub payload: String,
}

/// Availability of a device as published on `<device>/status`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceStatus {
    Online,
    Stale,
    Offline,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Stale => "stale",
            Self::Offline => "offline",
        }
    }
}

impl Message {
    /// All normalized readings of a device as one JSON object keyed by
    /// register slug.
    pub fn for_state(
        device: &str,
        generation: DeviceGeneration,
        readings: &BTreeMap<u16, Reading>,
    ) -> Result<Message> {
        let mut state = serde_json::Map::new();
        for (key, reading) in readings {
            let name = match catalog::descriptor(generation, *key) {
                Some(descriptor) => descriptor.slug(),
                None => key.to_string(),
            };
            state.insert(name, serde_json::to_value(reading)?);
        }

        Ok(Message {
            topic: format!("{}/state", device),
            retain: true,
            payload: serde_json::to_string(&state)?,
        })
    }

    pub fn for_status(device: &str, status: DeviceStatus) -> Message {
        Message {
            topic: format!("{}/status", device),
            retain: true,
            payload: status.as_str().to_string(),
        }
    }

    pub fn for_result(command: &Command, payload: &str) -> Message {
        Message {
            topic: command.to_result_topic(),
            retain: false,
            payload: payload.to_string(),
        }
    }

    pub fn to_command(&self) -> Result<Command> {
        use Command::*;

        let (selector, parts) = self.split_cmd_topic()?;

        let r = match parts[..] {
            ["charge"] => {
                let (power, soc_limit) = self.payload_power()?;
                Charge(selector, power, soc_limit)
            }
            ["discharge"] => {
                let (power, soc_limit) = self.payload_power()?;
                Discharge(selector, power, soc_limit)
            }
            ["stop"] => Stop(selector),
            ["set", "mode"] => SetMode(selector, self.payload_int()?),
            ["set", "backup_soc"] => SetBackupSoc(selector, self.payload_int()?),
            ["set", "ac_output_power"] => SetAcOutputPower(selector, self.payload_int()?),
            ["set", "feed_in_limit"] => SetFeedInLimit(selector, self.payload_int()?),
            ["set", "grid_charging"] => SetGridCharging(selector, self.payload_bool()?),
            ["set", "inverter_input_limit"] => {
                SetInverterInputLimit(selector, self.payload_int()?)
            }
            ["set", "bypass_socket"] => SetBypassSocket(selector, self.payload_bool()?),
            ["set", "led_light"] => SetLedLight(selector, self.payload_bool()?),
            [..] => bail!("unhandled: {:?}", self),
        };

        if r.selector() == &DeviceSelector::Cluster && !r.allowed_in_cluster() {
            bail!("{} is not available in cluster mode", r.action());
        }

        Ok(r)
    }

    /// Where the outcome of a cmd message is reported, even when the
    /// message itself could not be parsed.
    pub fn to_result_topic(&self) -> Option<String> {
        self.split_cmd_topic().ok()?;
        self.topic
            .strip_prefix("cmd/")
            .map(|rest| format!("result/{}", rest))
    }

    // given a cmd Message, return the device it is intended for.
    //
    // eg cmd/garage/set/mode => (Device("garage"), ['set', 'mode'])
    pub fn split_cmd_topic(&self) -> Result<(DeviceSelector, Vec<&str>)> {
        let parts: Vec<&str> = self.topic.split('/').collect();

        // this *shouldn't* happen as our subscribe is for <ns>/cmd/#
        if parts.len() < 3 || parts[0] != "cmd" || parts[1].is_empty() {
            bail!("ignoring badly formed MQTT topic: {}", self.topic);
        }

        Ok((DeviceSelector::from_topic_segment(parts[1]), parts[2..].to_vec()))
    }

    // {"power":800,"soc_limit":20} or just 800
    fn payload_power(&self) -> Result<(i64, Option<i64>)> {
        #[derive(Deserialize)]
        struct PowerRequest {
            power: i64,
            soc_limit: Option<i64>,
        }

        if let Ok(power) = self.payload_int() {
            return Ok((power, None));
        }

        let r = serde_json::from_str::<PowerRequest>(&self.payload)
            .map_err(|err| anyhow!("payload_power: {}", err))?;
        Ok((r.power, r.soc_limit))
    }

    fn payload_int(&self) -> Result<i64> {
        self.payload
            .trim()
            .parse()
            .map_err(|err| anyhow!("payload_int: {}", err))
    }

    fn payload_bool(&self) -> Result<bool> {
        match self.payload.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Ok(true),
            "0" | "false" | "off" | "no" => Ok(false),
            _ => bail!("payload_bool: expected on/off, got {:?}", self.payload),
        }
    }
} // }}}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ChannelData {
    Message(Message),
    Shutdown,
}

pub type Sender = broadcast::Sender<ChannelData>;

#[derive(Clone)]
pub struct Mqtt {
    config: ConfigWrapper,
    channels: Channels,
}

impl Mqtt {
    pub fn new(config: ConfigWrapper, channels: Channels) -> Self {
        Self { config, channels }
    }

    pub async fn start(&self) -> Result<()> {
        let c = self.config.mqtt();

        if !c.enabled() {
            info!("mqtt disabled, skipping");
            return Ok(());
        }

        let mut options = MqttOptions::new("indevolt-bridge", c.host(), c.port());

        let will = LastWill {
            topic: self.lwt_topic(),
            message: bytes::Bytes::from("offline"),
            qos: QoS::AtLeastOnce,
            retain: true,
        };
        options.set_last_will(will);

        options.set_keep_alive(std::time::Duration::from_secs(60));
        if let (Some(u), Some(p)) = (c.username(), c.password()) {
            options.set_credentials(u, p);
        }

        info!("initializing mqtt at {}:{}", c.host(), c.port());

        let (client, eventloop) = AsyncClient::new(options, 10);

        self.setup(client.clone()).await?;

        // the sender ends on Shutdown, which takes the receiver with it
        tokio::select! {
            r = self.receiver(eventloop) => r,
            r = self.sender(client) => r,
        }
    }

    pub fn stop(&self) {
        let _ = self.channels.to_mqtt.send(ChannelData::Shutdown);
    }

    async fn setup(&self, client: AsyncClient) -> Result<()> {
        client
            .publish(self.lwt_topic(), QoS::AtLeastOnce, true, "online")
            .await?;

        client
            .subscribe(
                format!("{}/cmd/#", self.config.mqtt().namespace()),
                QoS::AtMostOnce,
            )
            .await?;

        Ok(())
    }

    // mqtt -> service
    async fn receiver(&self, mut eventloop: EventLoop) -> Result<()> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    if let Err(err) = self.handle_message(publish) {
                        warn!("{}", err);
                    }
                }
                Err(e) => {
                    error!("{}", e);
                    info!("reconnecting in 5s");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                }
                _ => {} // keepalives etc
            }
        }
    }

    fn handle_message(&self, publish: Publish) -> Result<()> {
        // remove the namespace, including the first /
        // doing it this way means we don't break if namespace happens to contain a /
        let namespace = self.config.mqtt().namespace().to_string();
        let topic = match publish.topic.strip_prefix(&namespace) {
            Some(rest) => rest.trim_start_matches('/').to_owned(),
            None => bail!("ignoring message outside namespace: {}", publish.topic),
        };

        let message = Message {
            topic,
            retain: publish.retain,
            payload: String::from_utf8(publish.payload.to_vec())?,
        };
        debug!("RX: {:?}", message);
        if self
            .channels
            .from_mqtt
            .send(ChannelData::Message(message))
            .is_err()
        {
            bail!("send(from_mqtt) failed - channel closed?");
        }

        Ok(())
    }

    // scheduler/service -> mqtt
    async fn sender(&self, client: AsyncClient) -> Result<()> {
        use ChannelData::*;

        let mut receiver = self.channels.to_mqtt.subscribe();

        loop {
            match receiver.recv().await {
                Ok(Shutdown) => {
                    info!("MQTT sender received shutdown signal");
                    let _ = client
                        .publish(self.lwt_topic(), QoS::AtLeastOnce, true, "offline")
                        .await;
                    let _ = client.disconnect().await;
                    break;
                }
                Ok(Message(message)) => {
                    let topic = format!("{}/{}", self.config.mqtt().namespace(), message.topic);
                    debug!("publishing: {} = {}", topic, message.payload);
                    if let Err(err) = client
                        .publish(&topic, QoS::AtLeastOnce, message.retain, message.payload)
                        .await
                    {
                        error!("MQTT publish to {} failed: {:?}", topic, err);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("MQTT sender lagged, {} messages dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        info!("MQTT sender loop exiting");
        Ok(())
    }

    fn lwt_topic(&self) -> String {
        format!("{}/LWT", self.config.mqtt().namespace())
    }
}
