//! Rule evaluation engine: holds the active rule set, evaluates incoming
//! readings, enforces cooldowns, actuates outlets, and records every
//! attempted command in the audit trail.
//!
//! Rules live only in memory; they are rebuilt from habitat + threshold
//! data at startup. Only the commands they produce are persisted.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::db::Store;
use crate::model::{AutomationRule, ControlMode, OutletCommand, OutletPower, OutletState, SensorReading};
use crate::outlet::OutletController;

// ---------------------------------------------------------------------------
// Rule registry
// ---------------------------------------------------------------------------

/// In-memory rule set keyed by rule ID. A BTreeMap so that evaluation order
/// is deterministic: rules for the same sensor always run in `rule_id`
/// order.
#[derive(Default)]
pub struct RuleRegistry {
    rules: BTreeMap<String, AutomationRule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, replacing any existing rule with the same ID.
    pub fn register(&mut self, rule: AutomationRule) {
        if self.rules.contains_key(&rule.rule_id) {
            warn!(rule = %rule.rule_id, "replacing existing rule");
        }
        self.rules.insert(rule.rule_id.clone(), rule);
    }

    pub fn unregister(&mut self, rule_id: &str) -> Option<AutomationRule> {
        self.rules.remove(rule_id)
    }

    /// Returns false if no such rule exists.
    pub fn enable(&mut self, rule_id: &str) -> bool {
        match self.rules.get_mut(rule_id) {
            Some(rule) => {
                rule.enabled = true;
                true
            }
            None => false,
        }
    }

    pub fn disable(&mut self, rule_id: &str) -> bool {
        match self.rules.get_mut(rule_id) {
            Some(rule) => {
                rule.enabled = false;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, rule_id: &str) -> Option<&AutomationRule> {
        self.rules.get(rule_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AutomationRule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// IDs of enabled rules watching `sensor_id`, in rule_id order.
    pub fn rule_ids_for_sensor(&self, sensor_id: &str) -> Vec<String> {
        self.rules
            .values()
            .filter(|r| r.enabled && r.sensor_id == sensor_id)
            .map(|r| r.rule_id.clone())
            .collect()
    }

    fn mark_triggered(&mut self, rule_id: &str, now: DateTime<Utc>) {
        if let Some(rule) = self.rules.get_mut(rule_id) {
            rule.last_triggered = Some(now);
        }
    }
}

// ---------------------------------------------------------------------------
// Automation service
// ---------------------------------------------------------------------------

pub struct AutomationService {
    registry: RuleRegistry,
    outlets: Arc<dyn OutletController>,
    store: Store,
    clock: Arc<dyn Clock>,
}

impl AutomationService {
    pub fn new(outlets: Arc<dyn OutletController>, store: Store, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: RuleRegistry::new(),
            outlets,
            store,
            clock,
        }
    }

    // ── Registry surface ─────────────────────────────────────────

    pub fn register_rule(&mut self, rule: AutomationRule) {
        self.registry.register(rule);
    }

    pub fn unregister_rule(&mut self, rule_id: &str) -> Option<AutomationRule> {
        self.registry.unregister(rule_id)
    }

    pub fn enable_rule(&mut self, rule_id: &str) -> bool {
        self.registry.enable(rule_id)
    }

    pub fn disable_rule(&mut self, rule_id: &str) -> bool {
        self.registry.disable(rule_id)
    }

    pub fn get_rule(&self, rule_id: &str) -> Option<&AutomationRule> {
        self.registry.get(rule_id)
    }

    pub fn rules(&self) -> impl Iterator<Item = &AutomationRule> {
        self.registry.iter()
    }

    pub fn rule_count(&self) -> usize {
        self.registry.len()
    }

    // ── Evaluation ───────────────────────────────────────────────

    /// Evaluate one reading against all enabled rules for its sensor and
    /// actuate whatever triggers. Returns the commands attempted (executed
    /// or failed), in rule_id order.
    ///
    /// A single outlet failure never aborts the remaining rules, and a
    /// failed audit write never rolls back the in-memory cooldown state.
    pub async fn process_sensor_reading(&mut self, reading: &SensorReading) -> Vec<OutletCommand> {
        let now = self.clock.now();
        let mut commands = Vec::new();

        for rule_id in self.registry.rule_ids_for_sensor(&reading.sensor_id) {
            let rule = match self.registry.get(&rule_id) {
                Some(rule) => rule.clone(),
                None => continue,
            };

            if !rule.should_trigger(reading.value, now) {
                if rule.in_cooldown(now) {
                    debug!(
                        rule = %rule.rule_id,
                        cooldown_sec = rule.min_duration_seconds,
                        "rule condition held back by cooldown"
                    );
                }
                continue;
            }

            // Idempotence: don't re-command an outlet that is already where
            // this rule wants it. The cooldown state is left untouched.
            let live = self.outlets.get_state(&rule.outlet_id);
            if live.power == rule.action_on_trigger {
                debug!(
                    rule = %rule.rule_id,
                    outlet = %rule.outlet_id,
                    state = %live.power,
                    "outlet already in desired state — skipping"
                );
                continue;
            }

            let mut command = OutletCommand {
                command_id: Uuid::new_v4().to_string(),
                outlet_id: rule.outlet_id.clone(),
                desired_state: rule.action_on_trigger,
                reason: rule.name.clone(),
                triggered_by_sensor: Some(reading.sensor_id.clone()),
                triggered_by_user: None,
                timestamp: now,
                executed: false,
                execution_result: None,
            };

            match self.actuate(&rule.outlet_id, rule.action_on_trigger) {
                Ok(()) => {
                    command.executed = true;
                    command.execution_result = Some("success".to_string());
                    self.registry.mark_triggered(&rule.rule_id, now);
                    info!(
                        rule = %rule.rule_id,
                        outlet = %rule.outlet_id,
                        state = %command.desired_state,
                        value = reading.value,
                        "rule triggered"
                    );

                    let believed = OutletState {
                        outlet_id: rule.outlet_id.clone(),
                        power: rule.action_on_trigger,
                        last_changed: now,
                        mode: ControlMode::Automatic,
                        power_watts: None,
                    };
                    if let Err(e) = self.store.upsert_outlet_state(&believed).await {
                        error!(outlet = %rule.outlet_id, "failed to record outlet state: {e:#}");
                    }
                }
                Err(e) => {
                    command.execution_result = Some(format!("failed: {e}"));
                    error!(
                        rule = %rule.rule_id,
                        outlet = %rule.outlet_id,
                        "outlet actuation failed: {e}"
                    );
                }
            }

            if let Err(e) = self.store.insert_command(&command).await {
                error!(command = %command.command_id, "failed to persist command: {e:#}");
            }
            commands.push(command);
        }

        commands
    }

    /// Direct user control: bypasses rules and cooldowns entirely.
    pub async fn manual_control(
        &mut self,
        outlet_id: &str,
        desired: OutletPower,
        user: &str,
    ) -> OutletCommand {
        let now = self.clock.now();
        let mut command = OutletCommand {
            command_id: Uuid::new_v4().to_string(),
            outlet_id: outlet_id.to_string(),
            desired_state: desired,
            reason: "Manual control".to_string(),
            triggered_by_sensor: None,
            triggered_by_user: Some(user.to_string()),
            timestamp: now,
            executed: false,
            execution_result: None,
        };

        match self.actuate(outlet_id, desired) {
            Ok(()) => {
                command.executed = true;
                command.execution_result = Some("success".to_string());
                info!(outlet = %outlet_id, state = %desired, user = %user, "manual control");

                let believed = OutletState {
                    outlet_id: outlet_id.to_string(),
                    power: desired,
                    last_changed: now,
                    mode: ControlMode::Manual,
                    power_watts: None,
                };
                if let Err(e) = self.store.upsert_outlet_state(&believed).await {
                    error!(outlet = %outlet_id, "failed to record outlet state: {e:#}");
                }
            }
            Err(e) => {
                command.execution_result = Some(format!("failed: {e}"));
                error!(outlet = %outlet_id, "manual control failed: {e}");
            }
        }

        if let Err(e) = self.store.insert_command(&command).await {
            error!(command = %command.command_id, "failed to persist command: {e:#}");
        }
        command
    }

    fn actuate(&self, outlet_id: &str, desired: OutletPower) -> Result<(), crate::error::OutletError> {
        match desired {
            OutletPower::On => self.outlets.turn_on(outlet_id),
            OutletPower::Off => self.outlets.turn_off(outlet_id),
            other => Err(crate::error::OutletError::Actuation {
                outlet_id: outlet_id.to_string(),
                message: format!("'{other}' is not a commandable state"),
            }),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
