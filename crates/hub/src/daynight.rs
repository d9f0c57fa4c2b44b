//! Day/night state machine: tracks the current mode, detects sunrise/sunset
//! crossings, and on each transition flips UVB/heat-lamp outlets and swaps
//! the active rule subsets.
//!
//! ## Mode machine
//!
//! ```text
//! Uninitialized ──[first check]──▶ Day ◀──[sunrise]── Night
//!                     └──────────▶ Night ◀─[sunset]── Day
//! ```
//!
//! The first check always runs entry actions for the detected mode, so a
//! process started at noon still turns UVB on. Checks in an unchanged mode
//! are no-ops.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::automation::AutomationService;
use crate::clock::{Clock, SunEvent, SunTimes};
use crate::model::{AutomationRule, ComparisonOp, Habitat, HabitatDayNightConfig, OutletPower};
use crate::outlet::OutletController;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Uninitialized,
    Day,
    Night,
}

/// What one `check_and_update` call did.
#[derive(Debug, Clone)]
pub struct TransitionReport {
    pub mode: Mode,
    pub mode_changed: bool,
    pub actions: Vec<String>,
}

pub struct DayNightService {
    mode: Mode,
    habitats: Vec<HabitatDayNightConfig>,
    /// habitat_id → IDs of the night rules created at the last night entry.
    night_rule_ids: HashMap<String, Vec<String>>,
    outlets: Arc<dyn OutletController>,
    sun: Arc<dyn SunTimes>,
    clock: Arc<dyn Clock>,
}

impl DayNightService {
    pub fn new(outlets: Arc<dyn OutletController>, sun: Arc<dyn SunTimes>, clock: Arc<dyn Clock>) -> Self {
        Self {
            mode: Mode::Uninitialized,
            habitats: Vec::new(),
            night_rule_ids: HashMap::new(),
            outlets,
            sun,
            clock,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Wire a habitat into the day/night cycle. `daytime_heat_rule_ids` are
    /// disabled at night and re-enabled at day.
    pub fn register_habitat(&mut self, habitat: &Habitat, daytime_heat_rule_ids: Vec<String>) {
        info!(
            habitat = %habitat.habitat_id,
            daytime_rules = daytime_heat_rule_ids.len(),
            "habitat registered for day/night control"
        );
        self.habitats.push(HabitatDayNightConfig {
            habitat_id: habitat.habitat_id.clone(),
            uvb_outlet_id: habitat.uvb_outlet_id.clone(),
            heat_lamp_outlet_id: Some(habitat.heat_lamp_outlet_id.clone()),
            ceramic_heater_outlet_id: habitat.ceramic_heater_outlet_id.clone(),
            cool_temp_sensor_id: habitat.cool_temp_sensor_id.clone(),
            night_temp_min: habitat.requirements.night_temp_min,
            night_temp_max: habitat.requirements.night_temp_max,
            daytime_heat_rule_ids,
        });
    }

    /// Detect and apply a mode transition. The only mutator of `mode`;
    /// idempotent while the mode is unchanged.
    pub fn check_and_update(&mut self, automation: &mut AutomationService) -> TransitionReport {
        let now = self.clock.now();
        let target = if self.sun.is_daytime(now) { Mode::Day } else { Mode::Night };

        if self.mode == target {
            return TransitionReport {
                mode: self.mode,
                mode_changed: false,
                actions: Vec::new(),
            };
        }

        info!(from = ?self.mode, to = ?target, "day/night transition");
        let actions = match target {
            Mode::Day => self.enter_day(automation),
            Mode::Night => self.enter_night(automation),
            Mode::Uninitialized => Vec::new(), // unreachable: target is never Uninitialized
        };
        self.mode = target;

        TransitionReport {
            mode: target,
            mode_changed: true,
            actions,
        }
    }

    // ── Entry actions ────────────────────────────────────────────
    //
    // Every outlet call is independently fallible: one broken outlet must
    // not stall the remaining actions or the other habitats.

    fn enter_day(&mut self, automation: &mut AutomationService) -> Vec<String> {
        let mut actions = Vec::new();

        for habitat in &self.habitats {
            if let Some(uvb) = &habitat.uvb_outlet_id {
                match self.outlets.turn_on(uvb) {
                    Ok(()) => actions.push(format!("{}: UVB on ({uvb})", habitat.habitat_id)),
                    Err(e) => {
                        error!(habitat = %habitat.habitat_id, outlet = %uvb, "UVB on failed: {e}");
                        actions.push(format!("{}: UVB on failed: {e}", habitat.habitat_id));
                    }
                }
            }

            for rule_id in &habitat.daytime_heat_rule_ids {
                if automation.enable_rule(rule_id) {
                    actions.push(format!("{}: enabled rule {rule_id}", habitat.habitat_id));
                }
            }

            if let Some(night_ids) = self.night_rule_ids.remove(&habitat.habitat_id) {
                for rule_id in &night_ids {
                    automation.unregister_rule(rule_id);
                }
                actions.push(format!(
                    "{}: removed {} night heating rule(s)",
                    habitat.habitat_id,
                    night_ids.len()
                ));
            }
        }

        actions
    }

    fn enter_night(&mut self, automation: &mut AutomationService) -> Vec<String> {
        let mut actions = Vec::new();

        for habitat in &self.habitats {
            if let Some(uvb) = &habitat.uvb_outlet_id {
                match self.outlets.turn_off(uvb) {
                    Ok(()) => actions.push(format!("{}: UVB off ({uvb})", habitat.habitat_id)),
                    Err(e) => {
                        error!(habitat = %habitat.habitat_id, outlet = %uvb, "UVB off failed: {e}");
                        actions.push(format!("{}: UVB off failed: {e}", habitat.habitat_id));
                    }
                }
            }

            // Visible-light heat is never appropriate at night, whatever the
            // rule state says.
            if let Some(lamp) = &habitat.heat_lamp_outlet_id {
                match self.outlets.turn_off(lamp) {
                    Ok(()) => actions.push(format!("{}: heat lamp off ({lamp})", habitat.habitat_id)),
                    Err(e) => {
                        error!(habitat = %habitat.habitat_id, outlet = %lamp, "heat lamp off failed: {e}");
                        actions.push(format!("{}: heat lamp off failed: {e}", habitat.habitat_id));
                    }
                }
            }

            for rule_id in &habitat.daytime_heat_rule_ids {
                if automation.disable_rule(rule_id) {
                    actions.push(format!("{}: disabled rule {rule_id}", habitat.habitat_id));
                }
            }

            // Night heating runs off the ceramic (non-light) heater, driven
            // by the cool-side sensor. Rules are created here and removed at
            // the next day entry rather than held disabled all day.
            if let (Some(heater), Some(sensor)) =
                (&habitat.ceramic_heater_outlet_id, &habitat.cool_temp_sensor_id)
            {
                let ids = register_night_rules(automation, habitat, heater, sensor);
                actions.push(format!(
                    "{}: created night heating rules ({} – {}°C)",
                    habitat.habitat_id, habitat.night_temp_min, habitat.night_temp_max
                ));
                self.night_rule_ids.insert(habitat.habitat_id.clone(), ids);
            }
        }

        actions
    }

    // ── Sun event queries ────────────────────────────────────────

    /// The nearer of today's remaining sunrise/sunset, or tomorrow's sunrise
    /// once both have passed.
    pub fn next_sun_event(&self) -> (DateTime<Utc>, SunEvent) {
        let now = self.clock.now();
        let today = now.date_naive();

        let sunrise = self.sun.sunrise(today);
        let sunset = self.sun.sunset(today);

        if now < sunrise {
            (sunrise, SunEvent::Sunrise)
        } else if now < sunset {
            (sunset, SunEvent::Sunset)
        } else {
            let tomorrow = today.succ_opt().unwrap_or(today);
            (self.sun.sunrise(tomorrow), SunEvent::Sunrise)
        }
    }

    /// Scheduling hint for the polling loop: cap sleep so a transition is
    /// never missed by more than one interval.
    pub fn seconds_until_next_sun_event(&self) -> (i64, SunEvent) {
        let now = self.clock.now();
        let (at, event) = self.next_sun_event();
        ((at - now).num_seconds().max(0), event)
    }
}

fn register_night_rules(
    automation: &mut AutomationService,
    habitat: &HabitatDayNightConfig,
    heater_outlet_id: &str,
    cool_sensor_id: &str,
) -> Vec<String> {
    let on_rule = AutomationRule {
        rule_id: format!("{}-night-heat-on", habitat.habitat_id),
        name: format!("Night heat on when < {}°C", habitat.night_temp_min),
        habitat_id: habitat.habitat_id.clone(),
        sensor_id: cool_sensor_id.to_string(),
        outlet_id: heater_outlet_id.to_string(),
        trigger_value: habitat.night_temp_min,
        trigger_operator: ComparisonOp::Lt,
        action_on_trigger: OutletPower::On,
        action_on_clear: None,
        min_duration_seconds: 300,
        hysteresis: 1.0,
        enabled: true,
        last_triggered: None,
    };
    let off_rule = AutomationRule {
        rule_id: format!("{}-night-heat-off", habitat.habitat_id),
        name: format!("Night heat off when >= {}°C", habitat.night_temp_max),
        habitat_id: habitat.habitat_id.clone(),
        sensor_id: cool_sensor_id.to_string(),
        outlet_id: heater_outlet_id.to_string(),
        trigger_value: habitat.night_temp_max,
        trigger_operator: ComparisonOp::Gte,
        action_on_trigger: OutletPower::Off,
        action_on_clear: None,
        min_duration_seconds: 300,
        hysteresis: 1.0,
        enabled: true,
        last_triggered: None,
    };

    let ids = vec![on_rule.rule_id.clone(), off_rule.rule_id.clone()];
    automation.register_rule(on_rule);
    automation.register_rule(off_rule);
    ids
}

// ===========================================================================
// Tests
// ===========================================================================
