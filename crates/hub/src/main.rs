mod automation;
mod clock;
mod config;
mod daynight;
mod db;
mod error;
mod habitat;
mod model;
mod monitor;
mod outlet;
mod sensor;
mod species;
mod state;
mod web;

use anyhow::Result;
use std::{env, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use automation::AutomationService;
use clock::{Clock, SunTimes, SystemClock};
use daynight::DayNightService;
use db::Store;
use model::SensorUnit;
use monitor::{MonitoringService, ProcessOutcome};
use outlet::{MockOutletBank, OutletController};
use sensor::{MockSensor, SensorDevice};
use state::{SharedState, SystemState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── Env config ──────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let db_url = env::var("DB_URL").unwrap_or_else(|_| "sqlite:reptilia.db?mode=rwc".to_string());

    // ── Database ────────────────────────────────────────────────────
    let store = Store::connect(&db_url).await?;
    store.migrate().await?;

    // ── Config file ─────────────────────────────────────────────────
    let cfg = config::load(&config_path)?;
    if cfg.habitats.is_empty() {
        error!("no habitats configured — nothing to automate");
    }

    // ── Core service wiring (explicit injection, no statics) ────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sun: Arc<dyn SunTimes> = Arc::new(cfg.sun.sun_times()?);
    // Mock outlets and sensors stand in until real drivers are wired; the
    // services only ever see the port traits.
    let outlets: Arc<dyn OutletController> = Arc::new(MockOutletBank::new());

    let mut automation = AutomationService::new(outlets.clone(), store.clone(), clock.clone());
    let mut daynight = DayNightService::new(outlets.clone(), sun, clock.clone());
    let monitoring = MonitoringService::new(store.clone(), clock.clone());

    // ── Habitat setup ───────────────────────────────────────────────
    let mut devices: Vec<SensorDevice> = Vec::new();
    for entry in &cfg.habitats {
        let habitat = entry.to_habitat();
        let summary = habitat::setup_habitat(&store, &habitat, &mut automation, &mut daynight).await?;
        info!(
            habitat = %habitat.habitat_id,
            thresholds = summary.threshold_count,
            rules = summary.rule_ids.len(),
            "habitat ready"
        );

        let req = &habitat.requirements;

        // Warm-side device feeds the basking-temp channel and, if present,
        // the humidity channel. Mock values start mid-range.
        devices.push(SensorDevice {
            device_id: format!("{}/warm", habitat.habitat_id),
            habitat_id: habitat.habitat_id.clone(),
            source: Arc::new(MockSensor::new(
                (req.basking_temp_min + req.basking_temp_max) / 2.0,
                (req.humidity_min + req.humidity_max) / 2.0,
            )),
            temp_sensor_id: habitat.basking_temp_sensor_id.clone(),
            humidity_sensor_id: habitat.humidity_sensor_id.clone(),
        });

        if let Some(cool_sensor_id) = &habitat.cool_temp_sensor_id {
            devices.push(SensorDevice {
                device_id: format!("{}/cool", habitat.habitat_id),
                habitat_id: habitat.habitat_id.clone(),
                source: Arc::new(MockSensor::new(
                    (req.cool_side_temp_min + req.cool_side_temp_max) / 2.0,
                    (req.humidity_min + req.humidity_max) / 2.0,
                )),
                temp_sensor_id: cool_sensor_id.clone(),
                humidity_sensor_id: None,
            });
        }
    }

    info!(
        habitats = cfg.habitats.len(),
        devices = devices.len(),
        rules = automation.rule_count(),
        "hub configured"
    );

    // ── Shared state + web server ───────────────────────────────────
    let shared: SharedState = Arc::new(RwLock::new(SystemState::new()));
    {
        let mut st = shared.write().await;
        st.record_system("hub started".to_string());
    }

    let web_state = Arc::clone(&shared);
    tokio::spawn(async move {
        web::serve(web_state).await;
    });

    // ── Polling loop ────────────────────────────────────────────────
    // One sequential cycle: day/night check first (so rule enablement
    // matches the mode before any trigger fires), then every device.
    let polling_interval = cfg.service.polling_interval_seconds;

    loop {
        let report = daynight.check_and_update(&mut automation);
        if report.mode_changed {
            info!(mode = ?report.mode, actions = report.actions.len(), "mode change applied");
            let mut st = shared.write().await;
            st.record_mode(report.mode, &report.actions);
        }

        for device in &devices {
            match device.source.read() {
                Ok((temperature, humidity)) => {
                    let outcome = monitoring
                        .process_reading(
                            &device.temp_sensor_id,
                            Some(&device.habitat_id),
                            temperature,
                            SensorUnit::Celsius,
                            &mut automation,
                        )
                        .await;
                    record_outcome(&shared, outcome).await;

                    if let Some(humidity_sensor_id) = &device.humidity_sensor_id {
                        let outcome = monitoring
                            .process_reading(
                                humidity_sensor_id,
                                Some(&device.habitat_id),
                                humidity,
                                SensorUnit::Percent,
                                &mut automation,
                            )
                            .await;
                        record_outcome(&shared, outcome).await;
                    }
                }
                Err(e) => {
                    error!(device = %device.device_id, "sensor read failed: {e}");
                    let mut st = shared.write().await;
                    st.record_error(format!("{}: sensor read failed: {e}", device.device_id));
                }
            }
        }

        // Cap sleep so a sunrise/sunset crossing is caught promptly.
        let (secs_to_event, event) = daynight.seconds_until_next_sun_event();
        let sleep_secs = polling_interval.min(secs_to_event.max(1) as u64);
        debug!(sleep_secs, next_event = ?event, "cycle complete");
        sleep(Duration::from_secs(sleep_secs)).await;
    }
}

/// Push everything a reading produced into the shared status snapshot.
async fn record_outcome(shared: &SharedState, outcome: ProcessOutcome) {
    let mut st = shared.write().await;
    st.record_reading(&outcome.reading);
    if let Some(alert) = &outcome.alert {
        st.record_alert(alert);
    }
    for command in &outcome.commands {
        st.record_command(command);
    }
}
