use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::daynight::Mode;
use crate::model::{Alert, OutletCommand, OutletPower, SensorReading, SensorUnit};

/// Maximum number of events retained in the ring buffer.
const MAX_EVENTS: usize = 200;

// ---------------------------------------------------------------------------
// Public type alias
// ---------------------------------------------------------------------------

pub type SharedState = Arc<RwLock<SystemState>>;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

pub struct SystemState {
    pub started_at: Instant,
    pub mode: Mode,
    pub readings: HashMap<String, ReadingSnapshot>,
    pub outlets: HashMap<String, OutletSnapshot>,
    pub events: VecDeque<SystemEvent>,
}

#[derive(Clone, Serialize)]
pub struct ReadingSnapshot {
    pub value: f64,
    pub unit: SensorUnit,
    pub is_valid: bool,
    pub at: DateTime<Utc>,
}

#[derive(Clone, Serialize)]
pub struct OutletSnapshot {
    pub power: OutletPower,
    pub last_changed: DateTime<Utc>,
}

#[derive(Clone, Serialize)]
pub struct SystemEvent {
    pub ts: DateTime<Utc>,
    pub kind: EventKind,
    pub detail: String,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Reading,
    Outlet,
    Alert,
    DayNight,
    Error,
    System,
}

// ---------------------------------------------------------------------------
// JSON response (what the API returns)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub mode: Mode,
    pub readings: HashMap<String, ReadingSnapshot>,
    pub outlets: HashMap<String, OutletSnapshot>,
    pub events: Vec<SystemEvent>,
}

// ---------------------------------------------------------------------------
// Construction & mutation
// ---------------------------------------------------------------------------

impl Default for SystemState {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            mode: Mode::Uninitialized,
            readings: HashMap::new(),
            outlets: HashMap::new(),
            events: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    /// Record a processed sensor reading.
    pub fn record_reading(&mut self, reading: &SensorReading) {
        self.readings.insert(
            reading.sensor_id.clone(),
            ReadingSnapshot {
                value: reading.value,
                unit: reading.unit,
                is_valid: reading.is_valid,
                at: reading.timestamp,
            },
        );

        let validity = if reading.is_valid { "" } else { " (invalid)" };
        self.push_event(
            EventKind::Reading,
            format!("{}: {:.1}{}{validity}", reading.sensor_id, reading.value, reading.unit),
        );
    }

    /// Record an attempted outlet command.
    pub fn record_command(&mut self, command: &OutletCommand) {
        if command.executed {
            self.outlets.insert(
                command.outlet_id.clone(),
                OutletSnapshot {
                    power: command.desired_state,
                    last_changed: command.timestamp,
                },
            );
        }

        let result = if command.executed { "ok" } else { "FAILED" };
        self.push_event(
            EventKind::Outlet,
            format!(
                "{} set {} ({result}) — {}",
                command.outlet_id, command.desired_state, command.reason
            ),
        );
    }

    /// Record a threshold alert.
    pub fn record_alert(&mut self, alert: &Alert) {
        self.push_event(
            EventKind::Alert,
            format!("[{}] {}", alert.severity, alert.message),
        );
    }

    /// Record a day/night transition and its entry actions.
    pub fn record_mode(&mut self, mode: Mode, actions: &[String]) {
        self.mode = mode;
        self.push_event(EventKind::DayNight, format!("mode changed: {mode:?}"));
        for action in actions {
            self.push_event(EventKind::DayNight, action.clone());
        }
    }

    /// Record an error event.
    pub fn record_error(&mut self, detail: String) {
        self.push_event(EventKind::Error, detail);
    }

    /// Record a generic system event.
    pub fn record_system(&mut self, detail: String) {
        self.push_event(EventKind::System, detail);
    }

    /// Build the JSON-serialisable status snapshot.
    pub fn to_status(&self) -> StatusResponse {
        StatusResponse {
            uptime_secs: self.started_at.elapsed().as_secs(),
            mode: self.mode,
            readings: self.readings.clone(),
            outlets: self.outlets.clone(),
            events: self.events.iter().rev().cloned().collect(),
        }
    }

    fn push_event(&mut self, kind: EventKind, detail: String) {
        if self.events.len() >= MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(SystemEvent {
            ts: Utc::now(),
            kind,
            detail,
        });
    }
}

// ===========================================================================
// Tests
// ===========================================================================
