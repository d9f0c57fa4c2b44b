//! Outlet control port and the in-memory mock bank used when no real smart
//! strip is wired up. A Kasa (or similar) adapter implements the same trait.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::OutletError;
use crate::model::{ControlMode, OutletPower, OutletState};

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

pub trait OutletController: Send + Sync {
    fn turn_on(&self, outlet_id: &str) -> Result<(), OutletError>;
    fn turn_off(&self, outlet_id: &str) -> Result<(), OutletError>;

    /// Live state as the hardware reports it. Outlets never touched report
    /// `Unknown`.
    fn get_state(&self, outlet_id: &str) -> OutletState;

    fn toggle(&self, outlet_id: &str) -> Result<OutletState, OutletError>;
}

// ---------------------------------------------------------------------------
// Mock bank (development and tests — no hardware)
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BankInner {
    states: HashMap<String, OutletState>,
    failing: HashSet<String>,
}

/// Tracks per-outlet state in memory and logs actuations.
#[derive(Default)]
pub struct MockOutletBank {
    inner: Mutex<BankInner>,
}

impl MockOutletBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make future actuations of `outlet_id` fail (test hook for transient
    /// hardware errors).
    pub fn set_failing(&self, outlet_id: &str, failing: bool) {
        let mut inner = self.inner.lock().expect("outlet bank lock poisoned");
        if failing {
            inner.failing.insert(outlet_id.to_string());
        } else {
            inner.failing.remove(outlet_id);
        }
    }

    pub fn all_states(&self) -> Vec<OutletState> {
        let inner = self.inner.lock().expect("outlet bank lock poisoned");
        inner.states.values().cloned().collect()
    }

    fn set(&self, outlet_id: &str, power: OutletPower) -> Result<(), OutletError> {
        let mut inner = self.inner.lock().expect("outlet bank lock poisoned");
        if inner.failing.contains(outlet_id) {
            return Err(OutletError::Actuation {
                outlet_id: outlet_id.to_string(),
                message: "simulated hardware failure".to_string(),
            });
        }

        tracing::debug!(outlet = %outlet_id, state = %power, "mock outlet set");
        inner.states.insert(
            outlet_id.to_string(),
            OutletState {
                outlet_id: outlet_id.to_string(),
                power,
                last_changed: Utc::now(),
                mode: ControlMode::Automatic,
                power_watts: None,
            },
        );
        Ok(())
    }
}

impl OutletController for MockOutletBank {
    fn turn_on(&self, outlet_id: &str) -> Result<(), OutletError> {
        self.set(outlet_id, OutletPower::On)
    }

    fn turn_off(&self, outlet_id: &str) -> Result<(), OutletError> {
        self.set(outlet_id, OutletPower::Off)
    }

    fn get_state(&self, outlet_id: &str) -> OutletState {
        let inner = self.inner.lock().expect("outlet bank lock poisoned");
        inner.states.get(outlet_id).cloned().unwrap_or(OutletState {
            outlet_id: outlet_id.to_string(),
            power: OutletPower::Unknown,
            last_changed: Utc::now(),
            mode: ControlMode::Automatic,
            power_watts: None,
        })
    }

    fn toggle(&self, outlet_id: &str) -> Result<OutletState, OutletError> {
        let current = self.get_state(outlet_id);
        match current.power {
            OutletPower::On => self.turn_off(outlet_id)?,
            _ => self.turn_on(outlet_id)?,
        }
        Ok(self.get_state(outlet_id))
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_outlet_reports_unknown_state() {
        let bank = MockOutletBank::new();
        assert_eq!(bank.get_state("never-touched").power, OutletPower::Unknown);
    }

    #[test]
    fn turn_on_then_off() {
        let bank = MockOutletBank::new();
        bank.turn_on("o1").unwrap();
        assert_eq!(bank.get_state("o1").power, OutletPower::On);

        bank.turn_off("o1").unwrap();
        assert_eq!(bank.get_state("o1").power, OutletPower::Off);
    }

    #[test]
    fn toggle_from_unknown_turns_on() {
        let bank = MockOutletBank::new();
        let state = bank.toggle("o1").unwrap();
        assert_eq!(state.power, OutletPower::On);
    }

    #[test]
    fn toggle_flips_on_to_off() {
        let bank = MockOutletBank::new();
        bank.turn_on("o1").unwrap();
        let state = bank.toggle("o1").unwrap();
        assert_eq!(state.power, OutletPower::Off);
    }

    #[test]
    fn failing_outlet_errors_without_changing_state() {
        let bank = MockOutletBank::new();
        bank.turn_on("o1").unwrap();

        bank.set_failing("o1", true);
        assert!(bank.turn_off("o1").is_err());
        assert_eq!(bank.get_state("o1").power, OutletPower::On);

        bank.set_failing("o1", false);
        bank.turn_off("o1").unwrap();
        assert_eq!(bank.get_state("o1").power, OutletPower::Off);
    }

    #[test]
    fn failure_is_isolated_per_outlet() {
        let bank = MockOutletBank::new();
        bank.set_failing("broken", true);

        assert!(bank.turn_on("broken").is_err());
        bank.turn_on("healthy").unwrap();
        assert_eq!(bank.get_state("healthy").power, OutletPower::On);
    }
}
