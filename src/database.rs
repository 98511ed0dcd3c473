use crate::prelude::*;

use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashMap;

/// Durable home for counter track state, so a restart does not make the
/// first same-day reading look like a fresh baseline.
#[derive(Clone, Debug)]
pub struct CounterStore {
    pool: SqlitePool,
}

impl CounterStore {
    pub async fn connect(url: &str) -> Result<Self> {
        info!("initializing state store at {}", url);

        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        sqlx::migrate!("db/migrations/sqlite").run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn load(&self, device: &str) -> Result<HashMap<u16, CounterTrackState>> {
        let rows: Vec<(i64, Option<f64>, Option<NaiveDate>)> = sqlx::query_as(
            "SELECT register_key, last_valid_value, last_update_date FROM counter_state WHERE device = ?",
        )
        .bind(device)
        .fetch_all(&self.pool)
        .await?;

        let mut states = HashMap::new();
        for (key, last_valid_value, last_update_date) in rows {
            let key = match u16::try_from(key) {
                Ok(key) => key,
                Err(_) => {
                    warn!("{}: ignoring stored counter for register {}", device, key);
                    continue;
                }
            };
            states.insert(
                key,
                CounterTrackState {
                    last_valid_value,
                    last_update_date,
                },
            );
        }

        Ok(states)
    }

    pub async fn save(&self, device: &str, states: &HashMap<u16, CounterTrackState>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (key, state) in states {
            sqlx::query(
                "INSERT INTO counter_state (device, register_key, last_valid_value, last_update_date) \
                 VALUES (?, ?, ?, ?) \
                 ON CONFLICT (device, register_key) DO UPDATE SET \
                 last_valid_value = excluded.last_valid_value, \
                 last_update_date = excluded.last_update_date, \
                 updated_at = CURRENT_TIMESTAMP",
            )
            .bind(device)
            .bind(*key as i64)
            .bind(state.last_valid_value)
            .bind(state.last_update_date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        trace!("{}: saved {} counter states", device, states.len());

        Ok(())
    }
}
