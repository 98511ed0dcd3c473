use crate::prelude::*;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Raw GetData response: wire key ("6002") -> value.
pub type RawData = serde_json::Map<String, Value>;

/// Whatever the device answers to a SetData call.
pub type Ack = Value;

/// Request/response channel to one device. Implementations do not cache
/// or retry; failures are surfaced as-is.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn read(&self, keys: &[u16]) -> Result<RawData>;

    async fn write(&self, function: u8, register: u16, values: &[i64]) -> Result<Ack>;

    /// Identify the device by its serial number.
    async fn probe(&self) -> Result<String> {
        let key = register::SERIAL_NUMBER;
        let mut snapshot = StateSnapshot::new();
        snapshot.merge(&self.read(&[key]).await?);

        snapshot
            .serial_number()
            .ok_or_else(|| anyhow!("device did not report a serial number (register {})", key))
    }
}

/// JSON-RPC over HTTP as spoken by the device's local API.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    namespace: String,
    batch_size: Option<usize>,
}

impl HttpTransport {
    pub fn new(device: &config::Device) -> Result<Self> {
        Self::with_base_url(
            device.base_url(),
            device.rpc_namespace(),
            device.request_timeout(),
            device.batch_size(),
        )
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        namespace: impl Into<String>,
        timeout: Duration,
        batch_size: Option<usize>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| anyhow!("failed to build HTTP client: {}", err))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            namespace: namespace.into(),
            batch_size: batch_size.filter(|n| *n > 0),
        })
    }

    fn rpc_url(&self, method: &str) -> String {
        format!("{}/rpc/{}.{}", self.base_url, self.namespace, method)
    }

    async fn call(&self, method: &str, config: Value) -> Result<Value> {
        let url = self.rpc_url(method);
        let config = config.to_string();
        trace!("POST {}?config={}", url, config);

        let response = self
            .client
            .post(&url)
            .query(&[("config", &config)])
            .send()
            .await
            .map_err(|err| anyhow!("{} failed: {}", method, err))?;

        let status = response.status();
        if !status.is_success() {
            bail!("{} returned HTTP {}", method, status);
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| anyhow!("{} returned malformed JSON: {}", method, err))
    }

    async fn read_chunk(&self, keys: &[u16]) -> Result<RawData> {
        match self.call("GetData", json!({ "t": keys })).await? {
            Value::Object(map) => Ok(map),
            other => bail!("GetData returned {} instead of an object", type_name(&other)),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn read(&self, keys: &[u16]) -> Result<RawData> {
        let chunk_size = self.batch_size.unwrap_or(keys.len()).max(1);

        let mut data = RawData::new();
        for chunk in keys.chunks(chunk_size) {
            data.extend(self.read_chunk(chunk).await?);
        }

        Ok(data)
    }

    async fn write(&self, function: u8, register: u16, values: &[i64]) -> Result<Ack> {
        self.call("SetData", json!({ "f": function, "t": register, "v": values }))
            .await
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_url() {
        let t = HttpTransport::with_base_url(
            "http://192.168.1.50:8080/",
            "Indevolt",
            Duration::from_secs(15),
            Some(0),
        )
        .unwrap();

        assert_eq!(t.rpc_url("GetData"), "http://192.168.1.50:8080/rpc/Indevolt.GetData");
        assert_eq!(t.batch_size, None);
    }
}
