use crate::prelude::*;
use crate::register::{ControlRegister, FUNCTION_WRITE};

use std::sync::Arc;

pub struct SetRegister {
    transport: Arc<dyn Transport>,
    device: String,
    register: ControlRegister,
    value: i64,
}

impl SetRegister {
    pub fn new<S>(
        transport: Arc<dyn Transport>,
        device: S,
        register: ControlRegister,
        value: i64,
    ) -> Self
    where
        S: Into<String>,
    {
        Self {
            transport,
            device: device.into(),
            register,
            value,
        }
    }

    pub async fn run(&self) -> Result<Ack> {
        let register: u16 = self.register.into();

        info!(
            "{}: setting {:?} (register {}) to {}",
            self.device, self.register, register, self.value
        );

        self.transport
            .write(FUNCTION_WRITE, register, &[self.value])
            .await
            .map_err(|err| {
                anyhow!(
                    "{}: failed to set register {} to {}: {}",
                    self.device,
                    register,
                    self.value,
                    err
                )
            })
    }
}
