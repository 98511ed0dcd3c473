pub mod catalog;
pub mod channels;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod database;
pub mod error;
pub mod mqtt;
pub mod normalizer;
pub mod options;
pub mod prelude;
pub mod register;
pub mod registry;
pub mod safety;
pub mod scheduler;
pub mod service;
pub mod snapshot;
pub mod transport;

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::database::CounterStore;
use crate::mqtt::Mqtt;
use crate::prelude::*;
use crate::registry::DeviceRegistry;
use crate::scheduler::Scheduler;
use crate::service::Service;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Everything that gets started, held so it can be stopped in order.
pub struct Components {
    pub mqtt: Mqtt,
    pub service: Service,
    pub scheduler: Scheduler,
    pub channels: Channels,
    mqtt_handle: JoinHandle<()>,
    service_handle: JoinHandle<()>,
    scheduler_handle: JoinHandle<()>,
}

impl Components {
    /// Stop polling, stop accepting commands, then drop the broker link.
    pub async fn stop(self) {
        info!("Stopping all components...");

        self.scheduler_handle.abort();
        let _ = self.scheduler_handle.await;

        self.service.stop();
        if let Err(e) = self.service_handle.await {
            error!("Error waiting for service task: {}", e);
        }

        // gives the sender a chance to publish offline before disconnecting
        self.mqtt.stop();
        let mut mqtt_handle = self.mqtt_handle;
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut mqtt_handle).await.is_err() {
            warn!("MQTT did not stop within {}s", SHUTDOWN_GRACE.as_secs());
            mqtt_handle.abort();
        }

        info!("Shutdown complete");
    }
}

pub fn init_logging(level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init();
}

pub async fn start(config: ConfigWrapper) -> Result<Components> {
    let channels = Channels::new();

    let store = match config.state_store() {
        Some(store) => Some(Arc::new(CounterStore::connect(store.url()).await?)),
        None => None,
    };

    let registry = DeviceRegistry::from_config(&config)?;
    if let Some(store) = &store {
        for handle in registry.list_all() {
            let states = store.load(&handle.id).await?;
            handle.coordinator.lock().await.load_counters(states);
        }
    }
    info!("{} devices registered", registry.list_all().len());

    let mqtt = Mqtt::new(config.clone(), channels.clone());
    let service = Service::new(channels.clone(), registry.clone());
    let scheduler = Scheduler::new(config.clone(), channels.clone(), registry, store);

    let s = service.clone();
    let service_handle = tokio::spawn(async move {
        if let Err(e) = s.start().await {
            error!("Service task failed: {}", e);
        }
    });

    let m = mqtt.clone();
    let mqtt_handle = tokio::spawn(async move {
        if let Err(e) = m.start().await {
            error!("MQTT task failed: {}", e);
        }
    });

    let s = scheduler.clone();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = s.start().await {
            error!("Scheduler task failed: {}", e);
        }
    });

    Ok(Components {
        mqtt,
        service,
        scheduler,
        channels,
        mqtt_handle,
        service_handle,
        scheduler_handle,
    })
}

/// Main application entry point
pub async fn app(mut shutdown_rx: broadcast::Receiver<()>, config: ConfigWrapper) -> Result<()> {
    init_logging(&config.loglevel());

    info!("indevolt-bridge {} starting", CARGO_PKG_VERSION);
    config.log_summary();

    let components = start(config).await?;

    info!("Waiting for shutdown signal...");
    let _ = shutdown_rx.recv().await;

    info!("Shutdown signal received, stopping components...");
    components.stop().await;

    Ok(())
}
