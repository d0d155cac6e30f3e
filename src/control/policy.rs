//! Fan policy: maps CPU temperatures to a cooling profile.
//!
//! CPU sensors report package temperature, which sits 10-20°C below the
//! junction temperature the threshold protects, so comparisons are made
//! against `threshold - junction_offset`.

use crate::config::types::{ControllerConfig, HotAction};
use crate::control::profile::CoolingProfile;
use crate::hardware::types::TemperatureReading;

/// Stateless decision. Both CPUs missing → vendor automatic; any CPU strictly
/// above the adjusted threshold → hot profile; otherwise the target duty.
pub fn decide(temps: &TemperatureReading, cfg: &ControllerConfig) -> CoolingProfile {
    evaluate(temps, cfg, cfg.thermal.adjusted_threshold()).0
}

/// Profile used while a CPU is running hot.
pub fn hot_profile(cfg: &ControllerConfig) -> CoolingProfile {
    match cfg.thermal.hot_action {
        HotAction::MaxDuty => CoolingProfile::manual(cfg.fan.max_duty_percent),
        HotAction::VendorAutomatic => CoolingProfile::VendorAutomatic,
    }
}

/// Returns the profile and whether the hot branch was taken.
fn evaluate(temps: &TemperatureReading, cfg: &ControllerConfig, limit: i32) -> (CoolingProfile, bool) {
    if !temps.has_cpu() {
        return (CoolingProfile::VendorAutomatic, false);
    }

    let hot = cfg.thermal.dynamic_updates && temps.cpu_temps().any(|t| t > limit);
    if hot {
        (hot_profile(cfg), true)
    } else {
        (CoolingProfile::manual(cfg.fan.target_duty_percent), false)
    }
}

/// `decide` with a deadband: once hot, stay hot until every CPU is at or
/// below `adjusted_threshold - hysteresis`.
#[derive(Debug, Default)]
pub struct PolicyEngine {
    hot: bool,
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_hot(&self) -> bool {
        self.hot
    }

    pub fn next(&mut self, temps: &TemperatureReading, cfg: &ControllerConfig) -> CoolingProfile {
        let mut limit = cfg.thermal.adjusted_threshold();
        if self.hot {
            limit = limit.saturating_sub(cfg.thermal.hysteresis);
        }
        let (profile, hot) = evaluate(temps, cfg, limit);
        self.hot = hot;
        profile
    }
}
