//! Sensor port and the settable mock used when no BLE hardware is present.
//!
//! One physical device reports a (temperature, humidity) pair; the hub maps
//! that pair onto logical sensor channels (a warm-side device feeds both the
//! basking-temp and humidity channels).

use std::sync::{Arc, Mutex};

use crate::error::SensorError;

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

pub trait SensorSource: Send + Sync {
    /// One measurement: (temperature °C, relative humidity %).
    fn read(&self) -> Result<(f64, f64), SensorError>;

    fn is_healthy(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Device → logical channel binding
// ---------------------------------------------------------------------------

/// A physical source bound to the logical channel IDs it feeds.
pub struct SensorDevice {
    pub device_id: String,
    pub habitat_id: String,
    pub source: Arc<dyn SensorSource>,
    pub temp_sensor_id: String,
    pub humidity_sensor_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Mock sensor (development and tests)
// ---------------------------------------------------------------------------

struct MockInner {
    temperature: f64,
    humidity: f64,
    failing: bool,
}

/// Settable fake sensor.
pub struct MockSensor {
    inner: Mutex<MockInner>,
}

impl MockSensor {
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self {
            inner: Mutex::new(MockInner {
                temperature,
                humidity,
                failing: false,
            }),
        }
    }

    pub fn set_temperature(&self, temperature: f64) {
        self.inner.lock().expect("sensor lock poisoned").temperature = temperature;
    }

    pub fn set_humidity(&self, humidity: f64) {
        self.inner.lock().expect("sensor lock poisoned").humidity = humidity;
    }

    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().expect("sensor lock poisoned").failing = failing;
    }
}

impl SensorSource for MockSensor {
    fn read(&self) -> Result<(f64, f64), SensorError> {
        let inner = self.inner.lock().expect("sensor lock poisoned");
        if inner.failing {
            return Err(SensorError::Read("device not responding".to_string()));
        }
        Ok((inner.temperature, inner.humidity))
    }

    fn is_healthy(&self) -> bool {
        !self.inner.lock().expect("sensor lock poisoned").failing
    }
}

// ===========================================================================
// Tests
// ===========================================================================
