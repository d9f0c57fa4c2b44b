//! One-time habitat setup: derive operational thresholds from species
//! requirements, persist them, build the paired automation rules, and
//! register everything with the automation and day/night services.

use anyhow::{Context, Result};
use tracing::info;

use crate::automation::AutomationService;
use crate::daynight::DayNightService;
use crate::db::Store;
use crate::model::{Habitat, Threshold, ZoneType};

/// What setup produced, mainly for logging and the status page.
#[derive(Debug)]
pub struct SetupSummary {
    pub threshold_count: usize,
    pub rule_ids: Vec<String>,
}

/// Build and register thresholds + rules for one habitat.
///
/// - basking sensor + heat lamp → paired heating rules
/// - cool-side sensor + ceramic heater → paired heating rules
/// - humidity sensor + humidifier → paired humidity rules
///
/// Rules whose name mentions heat are handed to the day/night service as
/// the daytime set (disabled after sunset).
pub async fn setup_habitat(
    store: &Store,
    habitat: &Habitat,
    automation: &mut AutomationService,
    daynight: &mut DayNightService,
) -> Result<SetupSummary> {
    let mut thresholds: Vec<Threshold> = Vec::new();
    let mut rules = Vec::new();

    let basking = Threshold::derive(
        &habitat.basking_temp_sensor_id,
        ZoneType::Basking,
        &habitat.requirements,
    );
    rules.extend(basking.heating_rules(&habitat.habitat_id, &habitat.heat_lamp_outlet_id));
    thresholds.push(basking);

    if let (Some(sensor_id), Some(outlet_id)) =
        (&habitat.cool_temp_sensor_id, &habitat.ceramic_heater_outlet_id)
    {
        let cool = Threshold::derive(sensor_id, ZoneType::CoolSide, &habitat.requirements);
        rules.extend(cool.heating_rules(&habitat.habitat_id, outlet_id));
        thresholds.push(cool);
    } else if let Some(sensor_id) = &habitat.cool_temp_sensor_id {
        // No heater on the cool side: still track the threshold for alerts.
        thresholds.push(Threshold::derive(
            sensor_id,
            ZoneType::CoolSide,
            &habitat.requirements,
        ));
    }

    if let Some(sensor_id) = &habitat.humidity_sensor_id {
        let humidity = Threshold::derive(sensor_id, ZoneType::Humidity, &habitat.requirements);
        if let Some(outlet_id) = &habitat.humidifier_outlet_id {
            rules.extend(humidity.humidity_rules(&habitat.habitat_id, outlet_id));
        }
        thresholds.push(humidity);
    }

    for threshold in &thresholds {
        store
            .upsert_threshold(threshold)
            .await
            .with_context(|| format!("failed to save threshold for '{}'", threshold.sensor_id))?;
    }

    let rule_ids: Vec<String> = rules.iter().map(|r| r.rule_id.clone()).collect();
    let daytime_heat_rule_ids: Vec<String> = rules
        .iter()
        .filter(|r| r.name.to_lowercase().contains("heat"))
        .map(|r| r.rule_id.clone())
        .collect();

    for rule in rules {
        automation.register_rule(rule);
    }
    daynight.register_habitat(habitat, daytime_heat_rule_ids);

    info!(
        habitat = %habitat.habitat_id,
        species = %habitat.species,
        thresholds = thresholds.len(),
        rules = rule_ids.len(),
        "habitat configured"
    );

    Ok(SetupSummary {
        threshold_count: thresholds.len(),
        rule_ids,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
