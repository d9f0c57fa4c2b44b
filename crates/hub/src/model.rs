//! Domain model: sensor readings, species requirements, operational
//! thresholds, and the automation rules derived from them.
//!
//! Rules carry their own trigger/clear logic; everything time-dependent
//! takes `now` from the caller so the evaluation engine stays deterministic
//! under a fixed clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Absolute tolerance for the `eq` operator. Absolute, not relative — a
/// relative tolerance would shift trigger timing for small magnitudes.
const EQ_TOLERANCE: f64 = 0.001;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorUnit {
    Celsius,
    Fahrenheit,
    Percent,
}

impl fmt::Display for SensorUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorUnit::Celsius => write!(f, "°C"),
            SensorUnit::Fahrenheit => write!(f, "°F"),
            SensorUnit::Percent => write!(f, "%"),
        }
    }
}

impl FromStr for SensorUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "celsius" | "°C" => Ok(SensorUnit::Celsius),
            "fahrenheit" | "°F" => Ok(SensorUnit::Fahrenheit),
            "percent" | "%" => Ok(SensorUnit::Percent),
            other => Err(ParseError::UnknownUnit(other.to_string())),
        }
    }
}

/// Power state of an outlet. `On`/`Off` are the only valid command targets;
/// `Unknown`/`Error` only ever describe observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutletPower {
    On,
    Off,
    Unknown,
    Error,
}

impl fmt::Display for OutletPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutletPower::On => write!(f, "on"),
            OutletPower::Off => write!(f, "off"),
            OutletPower::Unknown => write!(f, "unknown"),
            OutletPower::Error => write!(f, "error"),
        }
    }
}

impl FromStr for OutletPower {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(OutletPower::On),
            "off" => Ok(OutletPower::Off),
            "unknown" => Ok(OutletPower::Unknown),
            "error" => Ok(OutletPower::Error),
            other => Err(ParseError::UnknownPower(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    Manual,
    Automatic,
    Override,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Manual => write!(f, "manual"),
            ControlMode::Automatic => write!(f, "automatic"),
            ControlMode::Override => write!(f, "override"),
        }
    }
}

impl FromStr for ControlMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ControlMode::Manual),
            "automatic" => Ok(ControlMode::Automatic),
            "override" => Ok(ControlMode::Override),
            other => Err(ParseError::UnknownMode(other.to_string())),
        }
    }
}

/// Comparison operator for rule trigger conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = "lt")]
    Lt,
    #[serde(rename = "gt")]
    Gt,
    #[serde(rename = "lte")]
    Lte,
    #[serde(rename = "gte")]
    Gte,
    #[serde(rename = "eq")]
    Eq,
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOp::Lt => write!(f, "lt"),
            ComparisonOp::Gt => write!(f, "gt"),
            ComparisonOp::Lte => write!(f, "lte"),
            ComparisonOp::Gte => write!(f, "gte"),
            ComparisonOp::Eq => write!(f, "eq"),
        }
    }
}

impl FromStr for ComparisonOp {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lt" => Ok(ComparisonOp::Lt),
            "gt" => Ok(ComparisonOp::Gt),
            "lte" => Ok(ComparisonOp::Lte),
            "gte" => Ok(ComparisonOp::Gte),
            "eq" => Ok(ComparisonOp::Eq),
            other => Err(ParseError::UnknownOperator(other.to_string())),
        }
    }
}

/// Which operational envelope a threshold governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    Basking,
    CoolSide,
    Night,
    Humidity,
}

impl fmt::Display for ZoneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneType::Basking => write!(f, "basking"),
            ZoneType::CoolSide => write!(f, "cool_side"),
            ZoneType::Night => write!(f, "night"),
            ZoneType::Humidity => write!(f, "humidity"),
        }
    }
}

impl FromStr for ZoneType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basking" => Ok(ZoneType::Basking),
            "cool_side" => Ok(ZoneType::CoolSide),
            "night" => Ok(ZoneType::Night),
            "humidity" => Ok(ZoneType::Humidity),
            other => Err(ParseError::UnknownZone(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Info => write!(f, "info"),
            AlertLevel::Warning => write!(f, "warning"),
            AlertLevel::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    BallPython,
    CornSnake,
    BeardedDragon,
    LeopardGecko,
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Species::BallPython => write!(f, "ball_python"),
            Species::CornSnake => write!(f, "corn_snake"),
            Species::BeardedDragon => write!(f, "bearded_dragon"),
            Species::LeopardGecko => write!(f, "leopard_gecko"),
        }
    }
}

impl FromStr for Species {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ball_python" => Ok(Species::BallPython),
            "corn_snake" => Ok(Species::CornSnake),
            "bearded_dragon" => Ok(Species::BeardedDragon),
            "leopard_gecko" => Ok(Species::LeopardGecko),
            other => Err(ParseError::UnknownSpecies(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SensorReading {
    pub sensor_id: String,
    pub value: f64,
    pub unit: SensorUnit,
    pub timestamp: DateTime<Utc>,
    pub is_valid: bool,
    pub habitat_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Species requirements & habitats
// ---------------------------------------------------------------------------

/// Ideal conditions for one species. Immutable reference data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitatRequirements {
    pub species: Species,

    pub basking_temp_min: f64,
    pub basking_temp_max: f64,
    pub cool_side_temp_min: f64,
    pub cool_side_temp_max: f64,
    pub night_temp_min: f64,
    pub night_temp_max: f64,

    pub humidity_min: f64,
    pub humidity_max: f64,

    pub uvb_required: bool,
}

/// One physical enclosure: its species requirements and the logical IDs of
/// the sensors and outlets wired to it.
#[derive(Debug, Clone, Serialize)]
pub struct Habitat {
    pub habitat_id: String,
    pub name: String,
    pub species: Species,
    pub requirements: HabitatRequirements,

    pub basking_temp_sensor_id: String,
    pub cool_temp_sensor_id: Option<String>,
    pub humidity_sensor_id: Option<String>,

    pub heat_lamp_outlet_id: String,
    pub ceramic_heater_outlet_id: Option<String>,
    pub uvb_outlet_id: Option<String>,
    pub humidifier_outlet_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

fn default_hysteresis() -> f64 {
    2.0
}

/// Operational bounds for one sensor. Derived from species requirements,
/// user-overridable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threshold {
    pub sensor_id: String,
    pub zone_type: ZoneType,

    pub min_value: f64,
    pub max_value: f64,

    pub warning_min: Option<f64>,
    pub warning_max: Option<f64>,

    #[serde(default = "default_hysteresis")]
    pub hysteresis: f64,
}

impl Threshold {
    /// Map species requirements to operational bounds for a zone.
    ///
    /// Temperature zones get a ±2° warning band and hysteresis 1.0; humidity
    /// gets a ±5% band and hysteresis 5.0 (humidity drifts slowly, a narrow
    /// dead-band would cycle the humidifier).
    pub fn derive(sensor_id: &str, zone_type: ZoneType, requirements: &HabitatRequirements) -> Self {
        let (min_value, max_value, band, hysteresis) = match zone_type {
            ZoneType::Basking => (
                requirements.basking_temp_min,
                requirements.basking_temp_max,
                2.0,
                1.0,
            ),
            ZoneType::CoolSide => (
                requirements.cool_side_temp_min,
                requirements.cool_side_temp_max,
                2.0,
                1.0,
            ),
            ZoneType::Night => (
                requirements.night_temp_min,
                requirements.night_temp_max,
                2.0,
                1.0,
            ),
            ZoneType::Humidity => (requirements.humidity_min, requirements.humidity_max, 5.0, 5.0),
        };

        Self {
            sensor_id: sensor_id.to_string(),
            zone_type,
            min_value,
            max_value,
            warning_min: Some(min_value - band),
            warning_max: Some(max_value + band),
            hysteresis,
        }
    }

    /// Paired rules for heating equipment: ON below min, OFF at or above max.
    ///
    /// Two stateless rules instead of one rule with "currently heating"
    /// memory; the cooldown plus the live outlet-state check keep them from
    /// fighting each other.
    pub fn heating_rules(&self, habitat_id: &str, outlet_id: &str) -> [AutomationRule; 2] {
        let on_rule = AutomationRule {
            rule_id: format!("{habitat_id}-{}-heat-on", self.zone_type),
            name: format!("Turn on {} heat when < {}°C", self.zone_type, self.min_value),
            habitat_id: habitat_id.to_string(),
            sensor_id: self.sensor_id.clone(),
            outlet_id: outlet_id.to_string(),
            trigger_value: self.min_value,
            trigger_operator: ComparisonOp::Lt,
            action_on_trigger: OutletPower::On,
            action_on_clear: None,
            min_duration_seconds: 300,
            hysteresis: self.hysteresis,
            enabled: true,
            last_triggered: None,
        };

        let off_rule = AutomationRule {
            rule_id: format!("{habitat_id}-{}-heat-off", self.zone_type),
            name: format!("Turn off {} heat when >= {}°C", self.zone_type, self.max_value),
            habitat_id: habitat_id.to_string(),
            sensor_id: self.sensor_id.clone(),
            outlet_id: outlet_id.to_string(),
            trigger_value: self.max_value,
            trigger_operator: ComparisonOp::Gte,
            action_on_trigger: OutletPower::Off,
            action_on_clear: None,
            min_duration_seconds: 300,
            hysteresis: self.hysteresis,
            enabled: true,
            last_triggered: None,
        };

        [on_rule, off_rule]
    }

    /// Paired rules for humidity equipment. Same shape as heating, but with
    /// a 600 s cooldown — humidity responds slowly and faster cycling would
    /// thrash the humidifier.
    pub fn humidity_rules(&self, habitat_id: &str, outlet_id: &str) -> [AutomationRule; 2] {
        let on_rule = AutomationRule {
            rule_id: format!("{habitat_id}-humidity-on"),
            name: format!("Turn on humidifier when < {}%", self.min_value),
            habitat_id: habitat_id.to_string(),
            sensor_id: self.sensor_id.clone(),
            outlet_id: outlet_id.to_string(),
            trigger_value: self.min_value,
            trigger_operator: ComparisonOp::Lt,
            action_on_trigger: OutletPower::On,
            action_on_clear: None,
            min_duration_seconds: 600,
            hysteresis: self.hysteresis,
            enabled: true,
            last_triggered: None,
        };

        let off_rule = AutomationRule {
            rule_id: format!("{habitat_id}-humidity-off"),
            name: format!("Turn off humidifier when >= {}%", self.max_value),
            habitat_id: habitat_id.to_string(),
            sensor_id: self.sensor_id.clone(),
            outlet_id: outlet_id.to_string(),
            trigger_value: self.max_value,
            trigger_operator: ComparisonOp::Gte,
            action_on_trigger: OutletPower::Off,
            action_on_clear: None,
            min_duration_seconds: 600,
            hysteresis: self.hysteresis,
            enabled: true,
            last_triggered: None,
        };

        [on_rule, off_rule]
    }
}

// ---------------------------------------------------------------------------
// Automation rules
// ---------------------------------------------------------------------------

/// A single trigger condition mapped to an outlet action.
///
/// `last_triggered` is the rule's only state: set on successful execution,
/// it gates re-triggering for `min_duration_seconds`.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationRule {
    pub rule_id: String,
    pub name: String,
    pub habitat_id: String,
    pub sensor_id: String,
    pub outlet_id: String,

    pub trigger_value: f64,
    pub trigger_operator: ComparisonOp,
    pub action_on_trigger: OutletPower,
    /// Never set by any production path; the paired on/off rule pattern
    /// supersedes it. Kept for model compatibility.
    pub action_on_clear: Option<OutletPower>,

    pub min_duration_seconds: i64,
    pub hysteresis: f64,

    pub enabled: bool,
    pub last_triggered: Option<DateTime<Utc>>,
}

impl AutomationRule {
    /// True while the post-trigger cooldown has not yet elapsed. Eligible
    /// again exactly at `last_triggered + min_duration_seconds`.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match self.last_triggered {
            Some(t) => (now - t).num_seconds() < self.min_duration_seconds,
            None => false,
        }
    }

    /// Raw operator comparison, ignoring enablement and cooldown.
    pub fn condition_met(&self, value: f64) -> bool {
        match self.trigger_operator {
            ComparisonOp::Lt => value < self.trigger_value,
            ComparisonOp::Gt => value > self.trigger_value,
            ComparisonOp::Lte => value <= self.trigger_value,
            ComparisonOp::Gte => value >= self.trigger_value,
            ComparisonOp::Eq => (value - self.trigger_value).abs() < EQ_TOLERANCE,
        }
    }

    /// Full trigger decision: enabled, out of cooldown, condition met.
    pub fn should_trigger(&self, value: f64, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        if self.in_cooldown(now) {
            return false;
        }
        self.condition_met(value)
    }

    /// Whether the trigger condition has cleared, with hysteresis applied
    /// opposite the trigger direction. Only meaningful when
    /// `action_on_clear` is set.
    pub fn should_clear(&self, value: f64) -> bool {
        if !self.enabled || self.action_on_clear.is_none() {
            return false;
        }

        match self.trigger_operator {
            ComparisonOp::Gt | ComparisonOp::Gte => value < self.trigger_value - self.hysteresis,
            ComparisonOp::Lt | ComparisonOp::Lte => value > self.trigger_value + self.hysteresis,
            ComparisonOp::Eq => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Outlet commands & state
// ---------------------------------------------------------------------------

/// Append-only audit record of an attempted outlet actuation.
#[derive(Debug, Clone, Serialize)]
pub struct OutletCommand {
    pub command_id: String,
    pub outlet_id: String,
    pub desired_state: OutletPower,
    pub reason: String,
    pub triggered_by_sensor: Option<String>,
    pub triggered_by_user: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub executed: bool,
    pub execution_result: Option<String>,
}

/// The believed current state of a physical outlet.
#[derive(Debug, Clone, Serialize)]
pub struct OutletState {
    pub outlet_id: String,
    pub power: OutletPower,
    pub last_changed: DateTime<Utc>,
    pub mode: ControlMode,
    pub power_watts: Option<f64>,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub alert_id: String,
    pub sensor_id: String,
    pub severity: AlertLevel,
    pub message: String,
    pub value: f64,
    pub threshold_violated: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Day/night wiring
// ---------------------------------------------------------------------------

/// Per-habitat day/night wiring, built at registration time.
#[derive(Debug, Clone)]
pub struct HabitatDayNightConfig {
    pub habitat_id: String,
    pub uvb_outlet_id: Option<String>,
    pub heat_lamp_outlet_id: Option<String>,
    pub ceramic_heater_outlet_id: Option<String>,
    pub cool_temp_sensor_id: Option<String>,
    pub night_temp_min: f64,
    pub night_temp_max: f64,
    pub daytime_heat_rule_ids: Vec<String>,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn leopard_gecko_requirements() -> HabitatRequirements {
        HabitatRequirements {
            species: Species::LeopardGecko,
            basking_temp_min: 32.0,
            basking_temp_max: 35.0,
            cool_side_temp_min: 24.0,
            cool_side_temp_max: 27.0,
            night_temp_min: 18.0,
            night_temp_max: 24.0,
            humidity_min: 30.0,
            humidity_max: 40.0,
            uvb_required: false,
        }
    }

    fn test_rule(op: ComparisonOp, trigger_value: f64) -> AutomationRule {
        AutomationRule {
            rule_id: "r1".into(),
            name: "test rule".into(),
            habitat_id: "h1".into(),
            sensor_id: "s1".into(),
            outlet_id: "o1".into(),
            trigger_value,
            trigger_operator: op,
            action_on_trigger: OutletPower::On,
            action_on_clear: None,
            min_duration_seconds: 300,
            hysteresis: 2.0,
            enabled: true,
            last_triggered: None,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    // -- Threshold derivation -----------------------------------------------

    #[test]
    fn derive_basking_threshold() {
        let t = Threshold::derive("s1", ZoneType::Basking, &leopard_gecko_requirements());
        assert_eq!(t.min_value, 32.0);
        assert_eq!(t.max_value, 35.0);
        assert_eq!(t.warning_min, Some(30.0));
        assert_eq!(t.warning_max, Some(37.0));
        assert_eq!(t.hysteresis, 1.0);
        assert_eq!(t.zone_type, ZoneType::Basking);
    }

    #[test]
    fn derive_cool_side_threshold() {
        let t = Threshold::derive("s1", ZoneType::CoolSide, &leopard_gecko_requirements());
        assert_eq!(t.min_value, 24.0);
        assert_eq!(t.max_value, 27.0);
        assert_eq!(t.hysteresis, 1.0);
    }

    #[test]
    fn derive_night_threshold() {
        let t = Threshold::derive("s1", ZoneType::Night, &leopard_gecko_requirements());
        assert_eq!(t.min_value, 18.0);
        assert_eq!(t.max_value, 24.0);
        assert_eq!(t.warning_min, Some(16.0));
        assert_eq!(t.hysteresis, 1.0);
    }

    #[test]
    fn derive_humidity_threshold_wider_bands() {
        let t = Threshold::derive("s1", ZoneType::Humidity, &leopard_gecko_requirements());
        assert_eq!(t.min_value, 30.0);
        assert_eq!(t.max_value, 40.0);
        assert_eq!(t.warning_min, Some(25.0));
        assert_eq!(t.warning_max, Some(45.0));
        assert_eq!(t.hysteresis, 5.0);
    }

    #[test]
    fn unknown_zone_string_rejected() {
        let err = "warm_side".parse::<ZoneType>().unwrap_err();
        assert_eq!(err, ParseError::UnknownZone("warm_side".into()));
    }

    #[test]
    fn unknown_operator_string_rejected() {
        let err = "ne".parse::<ComparisonOp>().unwrap_err();
        assert_eq!(err, ParseError::UnknownOperator("ne".into()));
    }

    #[test]
    fn threshold_hysteresis_defaults_on_deserialize() {
        let t: Threshold = serde_json::from_str(
            r#"{"sensor_id":"s1","zone_type":"basking","min_value":30.0,"max_value":35.0,
                "warning_min":null,"warning_max":null}"#,
        )
        .unwrap();
        assert_eq!(t.hysteresis, 2.0);
    }

    // -- Rule factories -----------------------------------------------------

    #[test]
    fn heating_rules_paired_on_off() {
        let t = Threshold::derive("s1", ZoneType::Basking, &leopard_gecko_requirements());
        let [on, off] = t.heating_rules("h1", "o1");

        assert_eq!(on.rule_id, "h1-basking-heat-on");
        assert_eq!(on.trigger_operator, ComparisonOp::Lt);
        assert_eq!(on.trigger_value, 32.0);
        assert_eq!(on.action_on_trigger, OutletPower::On);
        assert_eq!(on.min_duration_seconds, 300);
        assert!(on.enabled);
        assert!(on.action_on_clear.is_none());

        assert_eq!(off.rule_id, "h1-basking-heat-off");
        assert_eq!(off.trigger_operator, ComparisonOp::Gte);
        assert_eq!(off.trigger_value, 35.0);
        assert_eq!(off.action_on_trigger, OutletPower::Off);
        assert_eq!(off.min_duration_seconds, 300);
    }

    #[test]
    fn humidity_rules_use_longer_cooldown() {
        let t = Threshold::derive("s1", ZoneType::Humidity, &leopard_gecko_requirements());
        let [on, off] = t.humidity_rules("h1", "o1");

        assert_eq!(on.rule_id, "h1-humidity-on");
        assert_eq!(on.min_duration_seconds, 600);
        assert_eq!(off.rule_id, "h1-humidity-off");
        assert_eq!(off.min_duration_seconds, 600);
        assert_eq!(off.trigger_value, 40.0);
    }

    // -- should_trigger: operators ------------------------------------------

    #[test]
    fn trigger_lt() {
        let r = test_rule(ComparisonOp::Lt, 32.0);
        assert!(r.should_trigger(31.9, at(0)));
        assert!(!r.should_trigger(32.0, at(0)));
        assert!(!r.should_trigger(33.0, at(0)));
    }

    #[test]
    fn trigger_gt() {
        let r = test_rule(ComparisonOp::Gt, 32.0);
        assert!(r.should_trigger(32.1, at(0)));
        assert!(!r.should_trigger(32.0, at(0)));
    }

    #[test]
    fn trigger_lte() {
        let r = test_rule(ComparisonOp::Lte, 32.0);
        assert!(r.should_trigger(32.0, at(0)));
        assert!(r.should_trigger(31.0, at(0)));
        assert!(!r.should_trigger(32.1, at(0)));
    }

    #[test]
    fn trigger_gte() {
        let r = test_rule(ComparisonOp::Gte, 32.0);
        assert!(r.should_trigger(32.0, at(0)));
        assert!(!r.should_trigger(31.9, at(0)));
    }

    #[test]
    fn trigger_eq_uses_absolute_tolerance() {
        let r = test_rule(ComparisonOp::Eq, 32.0);
        assert!(r.should_trigger(32.0, at(0)));
        assert!(r.should_trigger(32.0005, at(0)));
        assert!(r.should_trigger(31.9995, at(0)));
        assert!(!r.should_trigger(32.002, at(0)));
        assert!(!r.should_trigger(31.998, at(0)));
    }

    // -- should_trigger: enablement and cooldown ----------------------------

    #[test]
    fn disabled_rule_never_triggers() {
        let mut r = test_rule(ComparisonOp::Lt, 32.0);
        r.enabled = false;
        assert!(!r.should_trigger(0.0, at(0)));
    }

    #[test]
    fn disabled_rule_never_clears() {
        let mut r = test_rule(ComparisonOp::Lt, 32.0);
        r.action_on_clear = Some(OutletPower::Off);
        r.enabled = false;
        assert!(!r.should_clear(100.0));
    }

    #[test]
    fn cooldown_blocks_at_299_allows_at_300() {
        let mut r = test_rule(ComparisonOp::Lt, 32.0);
        r.last_triggered = Some(at(0));

        assert!(!r.should_trigger(20.0, at(299)));
        assert!(r.should_trigger(20.0, at(300)));
        assert!(r.should_trigger(20.0, at(301)));
    }

    #[test]
    fn never_triggered_rule_is_immediately_eligible() {
        let r = test_rule(ComparisonOp::Lt, 32.0);
        assert!(!r.in_cooldown(at(0)));
        assert!(r.should_trigger(20.0, at(0)));
    }

    // -- should_clear -------------------------------------------------------

    #[test]
    fn clear_requires_action_on_clear() {
        let r = test_rule(ComparisonOp::Lt, 32.0);
        assert!(!r.should_clear(100.0));
    }

    #[test]
    fn clear_applies_hysteresis_opposite_lt_trigger() {
        let mut r = test_rule(ComparisonOp::Lt, 32.0);
        r.action_on_clear = Some(OutletPower::Off);

        // Triggered below 32; clears only above 32 + 2.
        assert!(!r.should_clear(33.0));
        assert!(!r.should_clear(34.0));
        assert!(r.should_clear(34.1));
    }

    #[test]
    fn clear_applies_hysteresis_opposite_gt_trigger() {
        let mut r = test_rule(ComparisonOp::Gt, 32.0);
        r.action_on_clear = Some(OutletPower::Off);

        assert!(!r.should_clear(31.0));
        assert!(!r.should_clear(30.0));
        assert!(r.should_clear(29.9));
    }

    #[test]
    fn clear_eq_never_clears() {
        let mut r = test_rule(ComparisonOp::Eq, 32.0);
        r.action_on_clear = Some(OutletPower::Off);
        assert!(!r.should_clear(0.0));
        assert!(!r.should_clear(100.0));
    }

    // -- Enum round trips ----------------------------------------------------

    #[test]
    fn zone_type_display_parse_round_trip() {
        for z in [ZoneType::Basking, ZoneType::CoolSide, ZoneType::Night, ZoneType::Humidity] {
            assert_eq!(z.to_string().parse::<ZoneType>().unwrap(), z);
        }
    }

    #[test]
    fn outlet_power_display_parse_round_trip() {
        for p in [OutletPower::On, OutletPower::Off, OutletPower::Unknown, OutletPower::Error] {
            assert_eq!(p.to_string().parse::<OutletPower>().unwrap(), p);
        }
    }

    #[test]
    fn comparison_op_serde_uses_short_names() {
        assert_eq!(serde_json::to_string(&ComparisonOp::Gte).unwrap(), r#""gte""#);
        let op: ComparisonOp = serde_json::from_str(r#""lt""#).unwrap();
        assert_eq!(op, ComparisonOp::Lt);
    }
}
