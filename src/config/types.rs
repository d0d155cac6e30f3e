//! Controller configuration structs, defaults, and validation.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Accepted °C range for threshold, junction offset and hysteresis.
pub const TEMPERATURE_SETTING_RANGE: RangeInclusive<i32> = -50..=150;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub connection: ConnectionSettings,
    pub thermal: ThermalSettings,
    pub fan: FanSettings,
    pub pcie: PcieSettings,
    pub runtime: RuntimeSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub host: String, // "local" uses the in-band /dev/ipmi0 interface
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl ConnectionSettings {
    pub fn is_local(&self) -> bool {
        self.host.eq_ignore_ascii_case("local")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalSettings {
    pub temperature_threshold: i32, // junction limit, °C
    pub junction_offset: i32,       // package reads this much below junction
    pub hysteresis: i32,            // °C below the adjusted threshold before leaving the hot profile
    pub hot_action: HotAction,
    pub dynamic_updates: bool,
}

impl ThermalSettings {
    pub fn adjusted_threshold(&self) -> i32 {
        self.temperature_threshold.saturating_sub(self.junction_offset)
    }
}

/// What to do once a CPU runs above the adjusted threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HotAction {
    /// Stay in manual mode at the configured maximum duty
    MaxDuty,
    /// Hand fan control back to the iDRAC firmware
    VendorAutomatic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanSettings {
    pub target_duty_percent: u8,
    pub max_duty_percent: u8,
    pub rpm_min: u32,
    pub rpm_max: u32,
    pub calibrate: bool,
    pub calibration_wait_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcieSettings {
    pub disable_default_cooling: bool,
    pub keep_state_on_exit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    pub check_interval_secs: u64,
    pub dry_run: bool,
    pub status_format: StatusFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StatusFormat {
    /// One human-readable log line per tick
    Log,
    /// One JSON object per tick on stdout
    Json,
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fan = &self.fan;
        for (field, value) in [
            ("FAN_SPEED", fan.target_duty_percent),
            ("FAN_SPEED_MAX", fan.max_duty_percent),
        ] {
            if value > 100 {
                return Err(ConfigError::DutyOutOfRange { field, value });
            }
        }
        if fan.target_duty_percent > fan.max_duty_percent {
            return Err(ConfigError::TargetAboveMax {
                target: fan.target_duty_percent,
                max: fan.max_duty_percent,
            });
        }
        let thermal = &self.thermal;
        for (field, value) in [
            ("CPU_TEMPERATURE_THRESHOLD", thermal.temperature_threshold),
            ("JUNCTION_OFFSET", thermal.junction_offset),
            ("HYSTERESIS", thermal.hysteresis),
        ] {
            if !TEMPERATURE_SETTING_RANGE.contains(&value) {
                return Err(ConfigError::TemperatureOutOfRange { field, value });
            }
        }
        if self.thermal.junction_offset >= self.thermal.temperature_threshold {
            return Err(ConfigError::OffsetNotBelowThreshold {
                offset: self.thermal.junction_offset,
                threshold: self.thermal.temperature_threshold,
            });
        }
        if self.runtime.check_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if fan.rpm_max <= fan.rpm_min {
            return Err(ConfigError::InvertedRpmRange {
                min: fan.rpm_min,
                max: fan.rpm_max,
            });
        }
        Ok(())
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings {
                host: "local".to_string(),
                username: "root".to_string(),
                password: "calvin".to_string(),
            },
            thermal: ThermalSettings {
                temperature_threshold: 60,
                junction_offset: 15,
                hysteresis: 0,
                hot_action: HotAction::MaxDuty,
                dynamic_updates: true,
            },
            fan: FanSettings {
                target_duty_percent: 25,
                max_duty_percent: 100,
                rpm_min: 2500,
                rpm_max: 12000,
                calibrate: false,
                calibration_wait_secs: 20,
            },
            pcie: PcieSettings {
                disable_default_cooling: false,
                keep_state_on_exit: false,
            },
            runtime: RuntimeSettings {
                check_interval_secs: 15,
                dry_run: false,
                status_format: StatusFormat::Log,
            },
        }
    }
}
