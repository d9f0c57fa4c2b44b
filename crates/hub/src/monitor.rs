//! Sensor monitoring: validates raw readings, persists them (valid or not,
//! for audit), raises threshold alerts, and feeds valid readings into the
//! automation engine.
//!
//! Alerting and automation are independent checks against the same
//! threshold: a reading can raise a critical alert *and* trigger a rule.

use std::sync::Arc;

use tracing::{error, warn};
use uuid::Uuid;

use crate::automation::AutomationService;
use crate::clock::Clock;
use crate::db::Store;
use crate::model::{Alert, AlertLevel, OutletCommand, SensorReading, SensorUnit, Threshold};

/// Everything one reading produced: the (possibly invalid) reading itself,
/// an alert if a threshold was violated, and the commands automation issued.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub reading: SensorReading,
    pub alert: Option<Alert>,
    pub commands: Vec<OutletCommand>,
}

pub struct MonitoringService {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl MonitoringService {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Validate, persist, alert-check, and forward one raw measurement.
    ///
    /// Invalid readings are persisted with `is_valid = false` and excluded
    /// from both alerting and rule evaluation.
    pub async fn process_reading(
        &self,
        sensor_id: &str,
        habitat_id: Option<&str>,
        value: f64,
        unit: SensorUnit,
        automation: &mut AutomationService,
    ) -> ProcessOutcome {
        let now = self.clock.now();
        let is_valid = is_plausible(value, unit);

        let reading = SensorReading {
            sensor_id: sensor_id.to_string(),
            value,
            unit,
            timestamp: now,
            is_valid,
            habitat_id: habitat_id.map(str::to_string),
        };

        if let Err(e) = self.store.insert_reading(&reading).await {
            error!(sensor = %sensor_id, "failed to persist reading: {e:#}");
        }

        if !is_valid {
            warn!(sensor = %sensor_id, value, unit = %unit, "implausible reading rejected");
            return ProcessOutcome {
                reading,
                alert: None,
                commands: Vec::new(),
            };
        }

        let alert = match self.store.get_threshold(sensor_id).await {
            Ok(Some(threshold)) => self.check_threshold(&reading, &threshold),
            Ok(None) => None,
            Err(e) => {
                error!(sensor = %sensor_id, "failed to load threshold: {e:#}");
                None
            }
        };

        let commands = automation.process_sensor_reading(&reading).await;

        ProcessOutcome {
            reading,
            alert,
            commands,
        }
    }

    /// Alert severity by distance from the ideal range: inside [min, max]
    /// none; outside it but inside the warning band → warning; beyond the
    /// warning band → critical.
    fn check_threshold(&self, reading: &SensorReading, threshold: &Threshold) -> Option<Alert> {
        let v = reading.value;
        if v >= threshold.min_value && v <= threshold.max_value {
            return None;
        }

        let below = v < threshold.min_value;
        let (violated, bound, within_warning_band) = if below {
            (
                "min",
                threshold.min_value,
                threshold.warning_min.is_some_and(|w| v >= w),
            )
        } else {
            (
                "max",
                threshold.max_value,
                threshold.warning_max.is_some_and(|w| v <= w),
            )
        };

        let severity = if within_warning_band {
            AlertLevel::Warning
        } else {
            AlertLevel::Critical
        };

        let message = format!(
            "{} reading {:.1}{} {} {} bound {:.1}{}",
            reading.sensor_id,
            v,
            reading.unit,
            if below { "below" } else { "above" },
            violated,
            bound,
            reading.unit,
        );

        match severity {
            AlertLevel::Critical => error!(sensor = %reading.sensor_id, value = v, "{message}"),
            _ => warn!(sensor = %reading.sensor_id, value = v, "{message}"),
        }

        Some(Alert {
            alert_id: Uuid::new_v4().to_string(),
            sensor_id: reading.sensor_id.clone(),
            severity,
            message,
            value: v,
            threshold_violated: Some(violated.to_string()),
            created_at: reading.timestamp,
        })
    }
}

/// Physically plausible ranges per unit. NaN is never plausible.
fn is_plausible(value: f64, unit: SensorUnit) -> bool {
    if value.is_nan() {
        return false;
    }
    match unit {
        SensorUnit::Celsius => (-50.0..=100.0).contains(&value),
        SensorUnit::Fahrenheit => (-58.0..=212.0).contains(&value),
        SensorUnit::Percent => (0.0..=100.0).contains(&value),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::{OutletPower, ZoneType};
    use crate::outlet::{MockOutletBank, OutletController};
    use crate::species;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    struct Harness {
        monitor: MonitoringService,
        automation: AutomationService,
        outlets: Arc<MockOutletBank>,
        store: Store,
    }

    async fn harness() -> Harness {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        let outlets = Arc::new(MockOutletBank::new());
        let clock = Arc::new(FixedClock::new(at(0)));
        let automation = AutomationService::new(outlets.clone(), store.clone(), clock.clone());
        let monitor = MonitoringService::new(store.clone(), clock);
        Harness {
            monitor,
            automation,
            outlets,
            store,
        }
    }

    /// Seed the basking threshold (32–35, warning 30–37) and its rule pair.
    async fn seed_basking(h: &mut Harness) {
        let req = species::requirements_for(crate::model::Species::LeopardGecko);
        let threshold = Threshold::derive("s1", ZoneType::Basking, &req);
        h.store.upsert_threshold(&threshold).await.unwrap();
        let [on, off] = threshold.heating_rules("h1", "o1");
        h.automation.register_rule(on);
        h.automation.register_rule(off);
    }

    // -- Validation ---------------------------------------------------------

    #[test]
    fn plausible_ranges_per_unit() {
        assert!(is_plausible(25.0, SensorUnit::Celsius));
        assert!(is_plausible(-50.0, SensorUnit::Celsius));
        assert!(is_plausible(100.0, SensorUnit::Celsius));
        assert!(!is_plausible(-50.1, SensorUnit::Celsius));
        assert!(!is_plausible(100.1, SensorUnit::Celsius));

        assert!(is_plausible(-58.0, SensorUnit::Fahrenheit));
        assert!(is_plausible(212.0, SensorUnit::Fahrenheit));
        assert!(!is_plausible(213.0, SensorUnit::Fahrenheit));

        assert!(is_plausible(0.0, SensorUnit::Percent));
        assert!(is_plausible(100.0, SensorUnit::Percent));
        assert!(!is_plausible(-0.1, SensorUnit::Percent));
        assert!(!is_plausible(100.5, SensorUnit::Percent));
    }

    #[test]
    fn nan_is_never_plausible() {
        assert!(!is_plausible(f64::NAN, SensorUnit::Celsius));
        assert!(!is_plausible(f64::NAN, SensorUnit::Percent));
    }

    #[tokio::test]
    async fn invalid_reading_is_persisted_but_not_processed() {
        let mut h = harness().await;
        seed_basking(&mut h).await;

        let outcome = h
            .monitor
            .process_reading("s1", Some("h1"), 400.0, SensorUnit::Celsius, &mut h.automation)
            .await;

        assert!(!outcome.reading.is_valid);
        assert!(outcome.alert.is_none());
        assert!(outcome.commands.is_empty());
        // No actuation happened despite the rules being registered.
        assert_eq!(h.outlets.get_state("o1").power, OutletPower::Unknown);
        // Audit row exists anyway.
        let latest = h.store.latest_reading("s1").await.unwrap().unwrap();
        assert!(!latest.is_valid);
    }

    // -- Alerting -----------------------------------------------------------

    #[tokio::test]
    async fn in_range_reading_raises_no_alert() {
        let mut h = harness().await;
        seed_basking(&mut h).await;

        let outcome = h
            .monitor
            .process_reading("s1", Some("h1"), 33.0, SensorUnit::Celsius, &mut h.automation)
            .await;
        assert!(outcome.alert.is_none());
    }

    #[tokio::test]
    async fn slightly_low_reading_raises_warning() {
        let mut h = harness().await;
        seed_basking(&mut h).await;

        // 31.0: below min 32, inside warning band (>= 30).
        let outcome = h
            .monitor
            .process_reading("s1", Some("h1"), 31.0, SensorUnit::Celsius, &mut h.automation)
            .await;

        let alert = outcome.alert.unwrap();
        assert_eq!(alert.severity, AlertLevel::Warning);
        assert_eq!(alert.threshold_violated.as_deref(), Some("min"));
        assert_eq!(alert.sensor_id, "s1");
    }

    #[tokio::test]
    async fn far_out_of_range_reading_raises_critical() {
        let mut h = harness().await;
        seed_basking(&mut h).await;

        // 28.0 is below warning_min 30.
        let outcome = h
            .monitor
            .process_reading("s1", Some("h1"), 28.0, SensorUnit::Celsius, &mut h.automation)
            .await;
        assert_eq!(outcome.alert.unwrap().severity, AlertLevel::Critical);

        // 38.0 is above warning_max 37.
        let outcome = h
            .monitor
            .process_reading("s1", Some("h1"), 38.0, SensorUnit::Celsius, &mut h.automation)
            .await;
        let alert = outcome.alert.unwrap();
        assert_eq!(alert.severity, AlertLevel::Critical);
        assert_eq!(alert.threshold_violated.as_deref(), Some("max"));
    }

    #[tokio::test]
    async fn sensor_without_threshold_gets_no_alert() {
        let mut h = harness().await;

        let outcome = h
            .monitor
            .process_reading("unthresholded", None, 33.0, SensorUnit::Celsius, &mut h.automation)
            .await;
        assert!(outcome.alert.is_none());
    }

    // -- Alert + automation independence ------------------------------------

    #[tokio::test]
    async fn reading_can_alert_and_trigger_automation_together() {
        let mut h = harness().await;
        seed_basking(&mut h).await;

        // 31.0 is a warning AND below the heat-on trigger of 32.
        let outcome = h
            .monitor
            .process_reading("s1", Some("h1"), 31.0, SensorUnit::Celsius, &mut h.automation)
            .await;

        assert!(outcome.alert.is_some());
        assert_eq!(outcome.commands.len(), 1);
        assert_eq!(outcome.commands[0].desired_state, OutletPower::On);
        assert_eq!(h.outlets.get_state("o1").power, OutletPower::On);
    }

    #[tokio::test]
    async fn valid_reading_is_persisted_with_habitat() {
        let mut h = harness().await;
        seed_basking(&mut h).await;

        h.monitor
            .process_reading("s1", Some("h1"), 33.0, SensorUnit::Celsius, &mut h.automation)
            .await;

        let latest = h.store.latest_reading("s1").await.unwrap().unwrap();
        assert!(latest.is_valid);
        assert_eq!(latest.value, 33.0);
        assert_eq!(latest.habitat_id.as_deref(), Some("h1"));
    }
}
