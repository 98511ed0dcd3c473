#![allow(dead_code)]

use async_trait::async_trait;
use indevolt_bridge::prelude::*;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub fn common_setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Transport with scripted read responses that records every write.
#[derive(Default)]
pub struct MockTransport {
    reads: Mutex<VecDeque<Result<RawData, String>>>,
    read_requests: Mutex<Vec<Vec<u16>>>,
    writes: Mutex<Vec<(u8, u16, Vec<i64>)>>,
    fail_writes: Mutex<bool>,
    probe_error: Mutex<Option<String>>,
    probes: Mutex<usize>,
}

pub const MOCK_SERIAL: &str = "IDV0000000001";

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_read(&self, data: Value) {
        let data = data.as_object().cloned().unwrap_or_default();
        self.reads.lock().unwrap().push_back(Ok(data));
    }

    pub fn push_error(&self, error: &str) {
        self.reads.lock().unwrap().push_back(Err(error.to_string()));
    }

    pub fn fail_writes(&self) {
        *self.fail_writes.lock().unwrap() = true;
    }

    pub fn fail_probe(&self, error: &str) {
        *self.probe_error.lock().unwrap() = Some(error.to_string());
    }

    pub fn clear_probe_error(&self) {
        *self.probe_error.lock().unwrap() = None;
    }

    pub fn probes(&self) -> usize {
        *self.probes.lock().unwrap()
    }

    pub fn read_requests(&self) -> Vec<Vec<u16>> {
        self.read_requests.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(u8, u16, Vec<i64>)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn read(&self, keys: &[u16]) -> Result<RawData> {
        self.read_requests.lock().unwrap().push(keys.to_vec());

        match self.reads.lock().unwrap().pop_front() {
            Some(Ok(data)) => Ok(data),
            Some(Err(err)) => bail!("{}", err),
            None => bail!("connection timed out"),
        }
    }

    async fn write(&self, function: u8, register: u16, values: &[i64]) -> Result<Ack> {
        if *self.fail_writes.lock().unwrap() {
            bail!("connection refused");
        }

        self.writes
            .lock()
            .unwrap()
            .push((function, register, values.to_vec()));
        Ok(json!({ "result": true }))
    }

    async fn probe(&self) -> Result<String> {
        *self.probes.lock().unwrap() += 1;

        match &*self.probe_error.lock().unwrap() {
            Some(err) => bail!("{}", err),
            None => Ok(MOCK_SERIAL.to_string()),
        }
    }
}

pub struct Factory;

impl Factory {
    pub fn device(id: &str, model: &str) -> config::Device {
        Self::device_with(id, model, "")
    }

    /// `extra` is additional YAML keys for the device, one per line.
    pub fn device_with(id: &str, model: &str, extra: &str) -> config::Device {
        let mut yaml = format!("id: {}\nhost: 127.0.0.1\nmodel: {}\n", id, model);
        yaml.push_str(extra);
        serde_yaml::from_str(&yaml).unwrap()
    }

    pub fn gen1(id: &str) -> config::Device {
        Self::device(id, "BK1600/BK1600Ultra")
    }

    pub fn gen2(id: &str) -> config::Device {
        Self::device(id, "SolidFlex/PowerFlex2000")
    }

    pub fn coordinator(device: config::Device, transport: Arc<MockTransport>) -> Coordinator {
        Coordinator::new(device, transport).unwrap()
    }

    /// A coordinator that has already completed one poll of `data`.
    pub async fn polled(device: config::Device, data: Value) -> (Coordinator, Arc<MockTransport>) {
        let transport = MockTransport::new();
        transport.push_read(data);

        let mut coordinator = Self::coordinator(device, transport.clone());
        coordinator.refresh().await.unwrap();

        (coordinator, transport)
    }
}
