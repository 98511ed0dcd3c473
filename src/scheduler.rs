use crate::prelude::*;
use crate::database::CounterStore;
use crate::mqtt::DeviceStatus;
use crate::registry::{DeviceHandle, DeviceRegistry};

use std::sync::Arc;
use tokio::time::MissedTickBehavior;

/// Drives one polling loop per device.
#[derive(Clone)]
pub struct Scheduler {
    config: ConfigWrapper,
    channels: Channels,
    registry: DeviceRegistry,
    store: Option<Arc<CounterStore>>,
}

impl Scheduler {
    pub fn new(
        config: ConfigWrapper,
        channels: Channels,
        registry: DeviceRegistry,
        store: Option<Arc<CounterStore>>,
    ) -> Self {
        Self {
            config,
            channels,
            registry,
            store,
        }
    }

    pub async fn start(&self) -> Result<()> {
        let loops = self
            .registry
            .list_all()
            .iter()
            .map(|handle| self.poll_device(handle));

        futures::future::try_join_all(loops).await?;

        Ok(())
    }

    async fn poll_device(&self, handle: &DeviceHandle) -> Result<()> {
        let scan_interval = match self.config.device(&handle.id) {
            Some(device) => device.scan_interval(),
            None => bail!("device {} missing from config", handle.id),
        };
        info!("{}: polling every {}s", handle.id, scan_interval.as_secs());

        let mut interval = tokio::time::interval(scan_interval);
        // a slow device must not cause a burst of catch-up polls
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            if let Err(err) = self.tick(handle).await {
                error!("{}: {:#}", handle.id, err);
            }
        }
    }

    /// Poll once and publish the result.
    pub async fn tick(&self, handle: &DeviceHandle) -> Result<()> {
        let mut coordinator = handle.coordinator.lock().await;

        match coordinator.refresh().await {
            Ok(PollOutcome::Fresh) => {
                if let Some(store) = &self.store {
                    store.save(&handle.id, coordinator.counter_states()).await?;
                }

                self.publish(mqtt::Message::for_state(
                    &handle.id,
                    coordinator.generation(),
                    coordinator.readings(),
                )?);
                self.publish(mqtt::Message::for_status(&handle.id, DeviceStatus::Online));
            }
            Ok(PollOutcome::Stale) => {
                self.publish(mqtt::Message::for_status(&handle.id, DeviceStatus::Stale));
            }
            Err(err) => {
                // retried on the next tick
                error!("{}: setup not ready: {}", handle.id, err);
                self.publish(mqtt::Message::for_status(&handle.id, DeviceStatus::Offline));
            }
        }

        Ok(())
    }

    fn publish(&self, message: mqtt::Message) {
        if !self.config.mqtt().enabled() {
            return;
        }

        let topic = message.topic.clone();
        if self
            .channels
            .to_mqtt
            .send(mqtt::ChannelData::Message(message))
            .is_err()
        {
            warn!("send(to_mqtt) failed - channel closed? dropping {}", topic);
        }
    }
}
