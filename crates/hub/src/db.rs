use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

use crate::model::{OutletCommand, OutletState, SensorReading, Threshold};

/// SQLite-backed store for readings, the outlet command audit trail,
/// believed outlet state, and thresholds. Each write is independent and
/// best-effort; there are no cross-write transactions.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// db_url examples:
    /// - "sqlite:/var/lib/reptilia/reptilia.db"
    /// - "sqlite::memory:" (tests)
    pub async fn connect(db_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(db_url)
            .with_context(|| format!("invalid sqlite connection string: {db_url}"))?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to connect to sqlite db: {db_url}"))?;

        Ok(Self { pool })
    }

    /// Runs SQLx migrations from ./migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }

    // ----------------------------
    // Readings
    // ----------------------------

    pub async fn insert_reading(&self, reading: &SensorReading) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO readings (sensor_id, habitat_id, value, unit, ts, is_valid)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&reading.sensor_id)
        .bind(&reading.habitat_id)
        .bind(reading.value)
        .bind(reading.unit.to_string())
        .bind(reading.timestamp.timestamp())
        .bind(reading.is_valid)
        .execute(&self.pool)
        .await
        .context("insert_reading failed")?;
        Ok(())
    }

    pub async fn latest_reading(&self, sensor_id: &str) -> Result<Option<SensorReading>> {
        let row = sqlx::query(
            r#"
            SELECT sensor_id, habitat_id, value, unit, ts, is_valid
            FROM readings
            WHERE sensor_id = ?
            ORDER BY ts DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(sensor_id)
        .fetch_optional(&self.pool)
        .await
        .context("latest_reading failed")?;

        row.map(row_to_reading).transpose()
    }

    pub async fn readings_range(
        &self,
        sensor_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>> {
        let rows = sqlx::query(
            r#"
            SELECT sensor_id, habitat_id, value, unit, ts, is_valid
            FROM readings
            WHERE sensor_id = ? AND ts >= ? AND ts <= ?
            ORDER BY ts ASC
            "#,
        )
        .bind(sensor_id)
        .bind(start.timestamp())
        .bind(end.timestamp())
        .fetch_all(&self.pool)
        .await
        .context("readings_range failed")?;

        rows.into_iter().map(row_to_reading).collect()
    }

    pub async fn count_readings(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM readings")
            .fetch_one(&self.pool)
            .await
            .context("count_readings failed")?;
        Ok(row.try_get("n")?)
    }

    // ----------------------------
    // Outlet commands (append-only audit)
    // ----------------------------

    pub async fn insert_command(&self, command: &OutletCommand) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outlet_commands (
              command_id, outlet_id, desired_state, reason,
              triggered_by_sensor, triggered_by_user,
              ts, executed, execution_result
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&command.command_id)
        .bind(&command.outlet_id)
        .bind(command.desired_state.to_string())
        .bind(&command.reason)
        .bind(&command.triggered_by_sensor)
        .bind(&command.triggered_by_user)
        .bind(command.timestamp.timestamp())
        .bind(command.executed)
        .bind(&command.execution_result)
        .execute(&self.pool)
        .await
        .context("insert_command failed")?;
        Ok(())
    }

    pub async fn command_history(
        &self,
        outlet_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OutletCommand>> {
        let rows = sqlx::query(
            r#"
            SELECT command_id, outlet_id, desired_state, reason,
                   triggered_by_sensor, triggered_by_user,
                   ts, executed, execution_result
            FROM outlet_commands
            WHERE outlet_id = ? AND ts >= ? AND ts <= ?
            ORDER BY ts ASC
            "#,
        )
        .bind(outlet_id)
        .bind(start.timestamp())
        .bind(end.timestamp())
        .fetch_all(&self.pool)
        .await
        .context("command_history failed")?;

        rows.into_iter().map(row_to_command).collect()
    }

    // ----------------------------
    // Believed outlet state
    // ----------------------------

    pub async fn upsert_outlet_state(&self, state: &OutletState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO outlet_states (outlet_id, power, last_changed, mode, power_watts)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(outlet_id) DO UPDATE SET
              power=excluded.power,
              last_changed=excluded.last_changed,
              mode=excluded.mode,
              power_watts=excluded.power_watts
            "#,
        )
        .bind(&state.outlet_id)
        .bind(state.power.to_string())
        .bind(state.last_changed.timestamp())
        .bind(state.mode.to_string())
        .bind(state.power_watts)
        .execute(&self.pool)
        .await
        .context("upsert_outlet_state failed")?;
        Ok(())
    }

    pub async fn get_outlet_state(&self, outlet_id: &str) -> Result<Option<OutletState>> {
        let row = sqlx::query(
            r#"
            SELECT outlet_id, power, last_changed, mode, power_watts
            FROM outlet_states
            WHERE outlet_id = ?
            "#,
        )
        .bind(outlet_id)
        .fetch_optional(&self.pool)
        .await
        .context("get_outlet_state failed")?;

        row.map(row_to_outlet_state).transpose()
    }

    // ----------------------------
    // Thresholds
    // ----------------------------

    pub async fn upsert_threshold(&self, threshold: &Threshold) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO thresholds (
              sensor_id, zone_type, min_value, max_value,
              warning_min, warning_max, hysteresis
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(sensor_id) DO UPDATE SET
              zone_type=excluded.zone_type,
              min_value=excluded.min_value,
              max_value=excluded.max_value,
              warning_min=excluded.warning_min,
              warning_max=excluded.warning_max,
              hysteresis=excluded.hysteresis
            "#,
        )
        .bind(&threshold.sensor_id)
        .bind(threshold.zone_type.to_string())
        .bind(threshold.min_value)
        .bind(threshold.max_value)
        .bind(threshold.warning_min)
        .bind(threshold.warning_max)
        .bind(threshold.hysteresis)
        .execute(&self.pool)
        .await
        .context("upsert_threshold failed")?;
        Ok(())
    }

    pub async fn get_threshold(&self, sensor_id: &str) -> Result<Option<Threshold>> {
        let row = sqlx::query(
            r#"
            SELECT sensor_id, zone_type, min_value, max_value,
                   warning_min, warning_max, hysteresis
            FROM thresholds
            WHERE sensor_id = ?
            "#,
        )
        .bind(sensor_id)
        .fetch_optional(&self.pool)
        .await
        .context("get_threshold failed")?;

        row.map(row_to_threshold).transpose()
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn ts_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn row_to_reading(row: SqliteRow) -> Result<SensorReading> {
    Ok(SensorReading {
        sensor_id: row.try_get("sensor_id")?,
        habitat_id: row.try_get("habitat_id")?,
        value: row.try_get("value")?,
        unit: row.try_get::<String, _>("unit")?.parse()?,
        timestamp: ts_to_datetime(row.try_get("ts")?),
        is_valid: row.try_get("is_valid")?,
    })
}

fn row_to_command(row: SqliteRow) -> Result<OutletCommand> {
    Ok(OutletCommand {
        command_id: row.try_get("command_id")?,
        outlet_id: row.try_get("outlet_id")?,
        desired_state: row.try_get::<String, _>("desired_state")?.parse()?,
        reason: row.try_get("reason")?,
        triggered_by_sensor: row.try_get("triggered_by_sensor")?,
        triggered_by_user: row.try_get("triggered_by_user")?,
        timestamp: ts_to_datetime(row.try_get("ts")?),
        executed: row.try_get("executed")?,
        execution_result: row.try_get("execution_result")?,
    })
}

fn row_to_outlet_state(row: SqliteRow) -> Result<OutletState> {
    Ok(OutletState {
        outlet_id: row.try_get("outlet_id")?,
        power: row.try_get::<String, _>("power")?.parse()?,
        last_changed: ts_to_datetime(row.try_get("last_changed")?),
        mode: row.try_get::<String, _>("mode")?.parse()?,
        power_watts: row.try_get("power_watts")?,
    })
}

fn row_to_threshold(row: SqliteRow) -> Result<Threshold> {
    Ok(Threshold {
        sensor_id: row.try_get("sensor_id")?,
        zone_type: row.try_get::<String, _>("zone_type")?.parse()?,
        min_value: row.try_get("min_value")?,
        max_value: row.try_get("max_value")?,
        warning_min: row.try_get("warning_min")?,
        warning_max: row.try_get("warning_max")?,
        hysteresis: row.try_get("hysteresis")?,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
