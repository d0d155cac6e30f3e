//! Cooling profile (who owns the fans) and the RPM range used for percentages.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "duty_percent", rename_all = "snake_case")]
pub enum CoolingProfile {
    /// Static duty chosen by this controller, 0-100
    Manual(u8),
    /// iDRAC firmware decides
    VendorAutomatic,
}

impl CoolingProfile {
    /// Manual profile with the duty clamped into 0-100.
    pub fn manual(percent: u8) -> Self {
        CoolingProfile::Manual(percent.min(100))
    }
}

impl fmt::Display for CoolingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoolingProfile::Manual(duty) => write!(f, "User {}%", duty),
            CoolingProfile::VendorAutomatic => write!(f, "Dell"),
        }
    }
}

/// Observed fan RPM at 0% and 100% duty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanRange {
    pub min_rpm: u32,
    pub max_rpm: u32,
}

impl FanRange {
    pub fn new(min_rpm: u32, max_rpm: u32) -> Self {
        Self { min_rpm, max_rpm }
    }

    /// Position of `rpm` inside the range as a whole percentage, clamped to 0-100.
    /// A degenerate range (min == max) reports 0.
    pub fn to_percent(&self, rpm: u32) -> u8 {
        if self.max_rpm == self.min_rpm {
            return 0;
        }
        let span = self.max_rpm as f64 - self.min_rpm as f64;
        let percent = (rpm as f64 - self.min_rpm as f64) / span * 100.0;
        percent.round().clamp(0.0, 100.0) as u8
    }
}
