//! TOML config file loading and validation: the sun schedule, service
//! tuning, and per-habitat sensor/outlet wiring.

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::collections::HashSet;

use crate::clock::FixedSunTimes;
use crate::model::{Habitat, HabitatRequirements, Species};
use crate::species;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sun: SunSchedule,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub habitats: Vec<HabitatEntry>,
}

/// Daily sunrise/sunset, "HH:MM" in UTC.
#[derive(Debug, Deserialize)]
pub struct SunSchedule {
    #[serde(default = "default_sunrise")]
    pub sunrise: String,
    #[serde(default = "default_sunset")]
    pub sunset: String,
}

impl Default for SunSchedule {
    fn default() -> Self {
        Self {
            sunrise: default_sunrise(),
            sunset: default_sunset(),
        }
    }
}

fn default_sunrise() -> String {
    "07:00".to_string()
}

fn default_sunset() -> String {
    "19:00".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_polling_interval")]
    pub polling_interval_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            polling_interval_seconds: default_polling_interval(),
        }
    }
}

fn default_polling_interval() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
pub struct HabitatEntry {
    pub habitat_id: String,
    pub name: String,
    pub species: Species,

    pub basking_temp_sensor_id: String,
    #[serde(default)]
    pub cool_temp_sensor_id: Option<String>,
    #[serde(default)]
    pub humidity_sensor_id: Option<String>,

    pub heat_lamp_outlet_id: String,
    #[serde(default)]
    pub ceramic_heater_outlet_id: Option<String>,
    #[serde(default)]
    pub uvb_outlet_id: Option<String>,
    #[serde(default)]
    pub humidifier_outlet_id: Option<String>,

    /// Optional per-habitat overrides of the species defaults.
    #[serde(default)]
    pub requirements: Option<RequirementsOverride>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RequirementsOverride {
    pub basking_temp_min: Option<f64>,
    pub basking_temp_max: Option<f64>,
    pub cool_side_temp_min: Option<f64>,
    pub cool_side_temp_max: Option<f64>,
    pub night_temp_min: Option<f64>,
    pub night_temp_max: Option<f64>,
    pub humidity_min: Option<f64>,
    pub humidity_max: Option<f64>,
    pub uvb_required: Option<bool>,
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

impl HabitatEntry {
    /// Species defaults with any per-habitat overrides applied.
    pub fn effective_requirements(&self) -> HabitatRequirements {
        let mut req = species::requirements_for(self.species);
        if let Some(o) = &self.requirements {
            if let Some(v) = o.basking_temp_min {
                req.basking_temp_min = v;
            }
            if let Some(v) = o.basking_temp_max {
                req.basking_temp_max = v;
            }
            if let Some(v) = o.cool_side_temp_min {
                req.cool_side_temp_min = v;
            }
            if let Some(v) = o.cool_side_temp_max {
                req.cool_side_temp_max = v;
            }
            if let Some(v) = o.night_temp_min {
                req.night_temp_min = v;
            }
            if let Some(v) = o.night_temp_max {
                req.night_temp_max = v;
            }
            if let Some(v) = o.humidity_min {
                req.humidity_min = v;
            }
            if let Some(v) = o.humidity_max {
                req.humidity_max = v;
            }
            if let Some(v) = o.uvb_required {
                req.uvb_required = v;
            }
        }
        req
    }

    pub fn to_habitat(&self) -> Habitat {
        Habitat {
            habitat_id: self.habitat_id.clone(),
            name: self.name.clone(),
            species: self.species,
            requirements: self.effective_requirements(),
            basking_temp_sensor_id: self.basking_temp_sensor_id.clone(),
            cool_temp_sensor_id: self.cool_temp_sensor_id.clone(),
            humidity_sensor_id: self.humidity_sensor_id.clone(),
            heat_lamp_outlet_id: self.heat_lamp_outlet_id.clone(),
            ceramic_heater_outlet_id: self.ceramic_heater_outlet_id.clone(),
            uvb_outlet_id: self.uvb_outlet_id.clone(),
            humidifier_outlet_id: self.humidifier_outlet_id.clone(),
        }
    }

    fn sensor_ids(&self) -> Vec<&str> {
        let mut ids = vec![self.basking_temp_sensor_id.as_str()];
        ids.extend(self.cool_temp_sensor_id.as_deref());
        ids.extend(self.humidity_sensor_id.as_deref());
        ids
    }

    fn outlet_ids(&self) -> Vec<&str> {
        let mut ids = vec![self.heat_lamp_outlet_id.as_str()];
        ids.extend(self.ceramic_heater_outlet_id.as_deref());
        ids.extend(self.uvb_outlet_id.as_deref());
        ids.extend(self.humidifier_outlet_id.as_deref());
        ids
    }
}

impl SunSchedule {
    pub fn parse_times(&self) -> Result<(NaiveTime, NaiveTime)> {
        let sunrise = NaiveTime::parse_from_str(&self.sunrise, "%H:%M")
            .with_context(|| format!("invalid sunrise time '{}', expected HH:MM", self.sunrise))?;
        let sunset = NaiveTime::parse_from_str(&self.sunset, "%H:%M")
            .with_context(|| format!("invalid sunset time '{}', expected HH:MM", self.sunset))?;
        Ok((sunrise, sunset))
    }

    pub fn sun_times(&self) -> Result<FixedSunTimes> {
        let (sunrise, sunset) = self.parse_times()?;
        Ok(FixedSunTimes::new(sunrise, sunset))
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_sun(&mut errors);
        self.validate_service(&mut errors);
        self.validate_habitats(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_sun(&self, errors: &mut Vec<String>) {
        match self.sun.parse_times() {
            Ok((sunrise, sunset)) => {
                if sunrise >= sunset {
                    errors.push(format!(
                        "sun: sunrise ({}) must be before sunset ({})",
                        self.sun.sunrise, self.sun.sunset
                    ));
                }
            }
            Err(e) => errors.push(format!("sun: {e:#}")),
        }
    }

    fn validate_service(&self, errors: &mut Vec<String>) {
        if self.service.polling_interval_seconds == 0 {
            errors.push("service: polling_interval_seconds must be positive".to_string());
        }
    }

    fn validate_habitats(&self, errors: &mut Vec<String>) {
        let mut seen_habitat_ids: HashSet<&str> = HashSet::new();
        let mut seen_sensor_ids: HashSet<&str> = HashSet::new();
        let mut seen_outlet_ids: HashSet<&str> = HashSet::new();

        for (i, h) in self.habitats.iter().enumerate() {
            let ctx = || {
                if h.habitat_id.is_empty() {
                    format!("habitats[{i}]")
                } else {
                    format!("habitat '{}'", h.habitat_id)
                }
            };

            // ── Identity ────────────────────────────────────────
            if h.habitat_id.trim().is_empty() {
                errors.push(format!("{}: habitat_id is empty", ctx()));
            } else if !seen_habitat_ids.insert(&h.habitat_id) {
                errors.push(format!("{}: duplicate habitat_id", ctx()));
            }

            if h.name.trim().is_empty() {
                errors.push(format!("{}: name is empty", ctx()));
            }

            // ── Sensor wiring ───────────────────────────────────
            if h.basking_temp_sensor_id.trim().is_empty() {
                errors.push(format!("{}: basking_temp_sensor_id is empty", ctx()));
            }

            let mut local_sensors: HashSet<&str> = HashSet::new();
            for id in h.sensor_ids() {
                if id.trim().is_empty() {
                    continue; // already reported above where required
                }
                if !local_sensors.insert(id) {
                    errors.push(format!("{}: sensor '{id}' wired to multiple channels", ctx()));
                } else if !seen_sensor_ids.insert(id) {
                    errors.push(format!("{}: sensor '{id}' already used by another habitat", ctx()));
                }
            }

            // ── Outlet wiring ───────────────────────────────────
            if h.heat_lamp_outlet_id.trim().is_empty() {
                errors.push(format!("{}: heat_lamp_outlet_id is empty", ctx()));
            }

            let mut local_outlets: HashSet<&str> = HashSet::new();
            for id in h.outlet_ids() {
                if id.trim().is_empty() {
                    continue;
                }
                if !local_outlets.insert(id) {
                    errors.push(format!("{}: outlet '{id}' wired to multiple roles", ctx()));
                } else if !seen_outlet_ids.insert(id) {
                    errors.push(format!("{}: outlet '{id}' already used by another habitat", ctx()));
                }
            }

            // ── Effective requirement sanity ────────────────────
            let req = h.effective_requirements();
            let pairs = [
                ("basking_temp", req.basking_temp_min, req.basking_temp_max),
                ("cool_side_temp", req.cool_side_temp_min, req.cool_side_temp_max),
                ("night_temp", req.night_temp_min, req.night_temp_max),
                ("humidity", req.humidity_min, req.humidity_max),
            ];
            for (what, min, max) in pairs {
                if min >= max {
                    errors.push(format!(
                        "{}: {what}_min ({min}) must be less than {what}_max ({max})",
                        ctx()
                    ));
                }
            }
            if !(0.0..=100.0).contains(&req.humidity_min) || !(0.0..=100.0).contains(&req.humidity_max) {
                errors.push(format!("{}: humidity range must lie within 0-100%", ctx()));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let config: Config =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_habitat() -> HabitatEntry {
        HabitatEntry {
            habitat_id: "h1".into(),
            name: "Gecko Enclosure".into(),
            species: Species::LeopardGecko,
            basking_temp_sensor_id: "basking-temp".into(),
            cool_temp_sensor_id: Some("cool-temp".into()),
            humidity_sensor_id: Some("humidity".into()),
            heat_lamp_outlet_id: "heat-lamp".into(),
            ceramic_heater_outlet_id: Some("ceramic".into()),
            uvb_outlet_id: Some("uvb".into()),
            humidifier_outlet_id: Some("humidifier".into()),
            requirements: None,
        }
    }

    fn valid_config() -> Config {
        Config {
            sun: SunSchedule::default(),
            service: ServiceConfig::default(),
            habitats: vec![valid_habitat()],
        }
    }

    /// Assert validation fails and the error message contains `needle`.
    fn assert_validation_err(cfg: &Config, needle: &str) {
        let err = cfg.validate().unwrap_err();
        let msg = format!("{err:#}");
        assert!(
            msg.contains(needle),
            "expected error containing {needle:?}, got: {msg}"
        );
    }

    // -- Parsing ----------------------------------------------------------

    #[test]
    fn parse_minimal_config() {
        let toml_str = r#"
[sun]
sunrise = "06:30"
sunset = "20:15"

[service]
polling_interval_seconds = 10

[[habitats]]
habitat_id = "gecko-01"
name = "Gary's Leopard Gecko Enclosure"
species = "leopard_gecko"
basking_temp_sensor_id = "basking-temp"
cool_temp_sensor_id = "cool-temp"
humidity_sensor_id = "basking-humidity"
heat_lamp_outlet_id = "basking-heat-lamp"
ceramic_heater_outlet_id = "ambient-heater"
humidifier_outlet_id = "humidifier"
uvb_outlet_id = "uvb-light"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sun.sunrise, "06:30");
        assert_eq!(config.service.polling_interval_seconds, 10);
        assert_eq!(config.habitats.len(), 1);
        assert_eq!(config.habitats[0].species, Species::LeopardGecko);
        config.validate().unwrap();
    }

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.sun.sunrise, "07:00");
        assert_eq!(config.sun.sunset, "19:00");
        assert_eq!(config.service.polling_interval_seconds, 30);
        assert!(config.habitats.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn unknown_species_fails_parse() {
        let toml_str = r#"
[[habitats]]
habitat_id = "h1"
name = "Enclosure"
species = "komodo_dragon"
basking_temp_sensor_id = "s1"
heat_lamp_outlet_id = "o1"
"#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn requirement_overrides_are_applied() {
        let toml_str = r#"
[[habitats]]
habitat_id = "h1"
name = "Enclosure"
species = "leopard_gecko"
basking_temp_sensor_id = "s1"
heat_lamp_outlet_id = "o1"

[habitats.requirements]
basking_temp_min = 33.0
humidity_max = 45.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let req = config.habitats[0].effective_requirements();
        assert_eq!(req.basking_temp_min, 33.0);
        assert_eq!(req.basking_temp_max, 35.0); // species default kept
        assert_eq!(req.humidity_max, 45.0);
        assert_eq!(req.humidity_min, 30.0);
    }

    #[test]
    fn to_habitat_copies_wiring() {
        let habitat = valid_habitat().to_habitat();
        assert_eq!(habitat.habitat_id, "h1");
        assert_eq!(habitat.basking_temp_sensor_id, "basking-temp");
        assert_eq!(habitat.ceramic_heater_outlet_id.as_deref(), Some("ceramic"));
        assert_eq!(habitat.requirements.basking_temp_min, 32.0);
    }

    // -- Sun schedule -------------------------------------------------------

    #[test]
    fn bad_sunrise_format_rejected() {
        let mut cfg = valid_config();
        cfg.sun.sunrise = "7am".into();
        assert_validation_err(&cfg, "invalid sunrise time");
    }

    #[test]
    fn sunrise_after_sunset_rejected() {
        let mut cfg = valid_config();
        cfg.sun.sunrise = "20:00".into();
        cfg.sun.sunset = "07:00".into();
        assert_validation_err(&cfg, "must be before sunset");
    }

    // -- Service ------------------------------------------------------------

    #[test]
    fn zero_polling_interval_rejected() {
        let mut cfg = valid_config();
        cfg.service.polling_interval_seconds = 0;
        assert_validation_err(&cfg, "polling_interval_seconds must be positive");
    }

    // -- Habitats -----------------------------------------------------------

    #[test]
    fn valid_config_passes() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn habitat_empty_id_rejected() {
        let mut cfg = valid_config();
        cfg.habitats[0].habitat_id = "".into();
        assert_validation_err(&cfg, "habitat_id is empty");
    }

    #[test]
    fn habitat_duplicate_id_rejected() {
        let mut cfg = valid_config();
        let mut second = valid_habitat();
        second.basking_temp_sensor_id = "other-sensor".into();
        second.cool_temp_sensor_id = None;
        second.humidity_sensor_id = None;
        second.heat_lamp_outlet_id = "other-lamp".into();
        second.ceramic_heater_outlet_id = None;
        second.uvb_outlet_id = None;
        second.humidifier_outlet_id = None;
        cfg.habitats.push(second);
        assert_validation_err(&cfg, "duplicate habitat_id");
    }

    #[test]
    fn habitat_empty_name_rejected() {
        let mut cfg = valid_config();
        cfg.habitats[0].name = "  ".into();
        assert_validation_err(&cfg, "name is empty");
    }

    #[test]
    fn empty_basking_sensor_rejected() {
        let mut cfg = valid_config();
        cfg.habitats[0].basking_temp_sensor_id = "".into();
        assert_validation_err(&cfg, "basking_temp_sensor_id is empty");
    }

    #[test]
    fn sensor_shared_between_channels_rejected() {
        let mut cfg = valid_config();
        cfg.habitats[0].cool_temp_sensor_id = Some("basking-temp".into());
        assert_validation_err(&cfg, "wired to multiple channels");
    }

    #[test]
    fn sensor_shared_between_habitats_rejected() {
        let mut cfg = valid_config();
        let mut second = valid_habitat();
        second.habitat_id = "h2".into();
        second.cool_temp_sensor_id = None;
        second.humidity_sensor_id = None;
        second.heat_lamp_outlet_id = "other-lamp".into();
        second.ceramic_heater_outlet_id = None;
        second.uvb_outlet_id = None;
        second.humidifier_outlet_id = None;
        // second still uses "basking-temp"
        cfg.habitats.push(second);
        assert_validation_err(&cfg, "already used by another habitat");
    }

    #[test]
    fn outlet_shared_between_roles_rejected() {
        let mut cfg = valid_config();
        cfg.habitats[0].uvb_outlet_id = Some("heat-lamp".into());
        assert_validation_err(&cfg, "wired to multiple roles");
    }

    #[test]
    fn inverted_override_range_rejected() {
        let mut cfg = valid_config();
        cfg.habitats[0].requirements = Some(RequirementsOverride {
            basking_temp_min: Some(40.0), // above species max of 35
            ..Default::default()
        });
        assert_validation_err(&cfg, "basking_temp_min (40) must be less than");
    }

    #[test]
    fn humidity_outside_percent_range_rejected() {
        let mut cfg = valid_config();
        cfg.habitats[0].requirements = Some(RequirementsOverride {
            humidity_max: Some(120.0),
            ..Default::default()
        });
        assert_validation_err(&cfg, "humidity range must lie within 0-100%");
    }

    #[test]
    fn multiple_errors_collected() {
        let mut cfg = valid_config();
        cfg.habitats[0].habitat_id = "".into();
        cfg.habitats[0].name = "".into();
        cfg.service.polling_interval_seconds = 0;
        cfg.sun.sunset = "junk".into();

        let err = cfg.validate().unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("habitat_id is empty"), "missing habitat error in: {msg}");
        assert!(msg.contains("name is empty"), "missing name error in: {msg}");
        assert!(msg.contains("polling_interval_seconds"), "missing service error in: {msg}");
        assert!(msg.contains("invalid sunset time"), "missing sun error in: {msg}");
    }
}
