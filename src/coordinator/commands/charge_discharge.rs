use crate::prelude::*;
use crate::register::{ChargeState, ControlRegister, FUNCTION_WRITE};

use std::sync::Arc;

/// One write of the charge/discharge control register: `[state, power, soc_limit]`.
pub struct ChargeDischarge {
    transport: Arc<dyn Transport>,
    device: String,
    state: ChargeState,
    power: u16,
    soc_limit: u8,
}

impl ChargeDischarge {
    pub fn new<S>(
        transport: Arc<dyn Transport>,
        device: S,
        state: ChargeState,
        power: u16,
        soc_limit: u8,
    ) -> Self
    where
        S: Into<String>,
    {
        Self {
            transport,
            device: device.into(),
            state,
            power,
            soc_limit,
        }
    }

    pub fn stop<S>(transport: Arc<dyn Transport>, device: S) -> Self
    where
        S: Into<String>,
    {
        Self::new(transport, device, ChargeState::Stop, 0, 0)
    }

    pub fn values(&self) -> [i64; 3] {
        [
            u8::from(self.state) as i64,
            self.power as i64,
            self.soc_limit as i64,
        ]
    }

    pub async fn run(&self) -> Result<Ack> {
        let register: u16 = ControlRegister::ChargeDischarge.into();
        let values = self.values();

        info!(
            "{}: setting {:?} power={}W soc_limit={}% (register {})",
            self.device, self.state, self.power, self.soc_limit, register
        );

        self.transport
            .write(FUNCTION_WRITE, register, &values)
            .await
            .map_err(|err| anyhow!("{}: {:?} failed: {}", self.device, self.state, err))
    }
}
