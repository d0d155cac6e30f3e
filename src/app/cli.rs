//! Command-line argument definitions (clap). Every setting can also come from
//! the environment, using the variable names container deployments already set.

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};

use crate::config::types::{
    ConnectionSettings, ControllerConfig, FanSettings, HotAction, PcieSettings, RuntimeSettings,
    StatusFormat, ThermalSettings,
};

#[derive(Parser, Debug)]
#[command(name = "idrac-fan-controller")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Thermal-adaptive fan control for Dell PowerEdge servers via iDRAC", long_about = None)]
pub struct Args {
    // === Connection ===
    /// iDRAC address, or "local" for the in-band interface
    #[arg(long, env = "IDRAC_HOST", default_value = "local", help_heading = "Connection")]
    pub idrac_host: String,

    /// iDRAC user name (ignored for local)
    #[arg(long, env = "IDRAC_USERNAME", default_value = "root", help_heading = "Connection")]
    pub idrac_username: String,

    /// iDRAC password (ignored for local)
    #[arg(long, env = "IDRAC_PASSWORD", default_value = "calvin", hide_env_values = true, hide_default_value = true, help_heading = "Connection")]
    pub idrac_password: String,

    // === Thermal policy ===
    /// CPU junction temperature limit in °C
    #[arg(long, env = "CPU_TEMPERATURE_THRESHOLD", default_value_t = 60, help_heading = "Thermal Policy")]
    pub cpu_temperature_threshold: i32,

    /// Degrees the package sensor reads below junction temperature
    #[arg(long, env = "JUNCTION_OFFSET", default_value_t = 15, help_heading = "Thermal Policy")]
    pub junction_offset: i32,

    /// Degrees below the adjusted threshold required to leave the hot profile
    #[arg(long, env = "HYSTERESIS", default_value_t = 0, help_heading = "Thermal Policy")]
    pub hysteresis: i32,

    /// Profile used while a CPU is above the adjusted threshold
    #[arg(long, env = "HOT_ACTION", value_enum, default_value_t = HotAction::MaxDuty, help_heading = "Thermal Policy")]
    pub hot_action: HotAction,

    /// React to temperature (false pins fans at FAN_SPEED)
    #[arg(long, env = "ENABLE_DYNAMIC_UPDATES", default_value_t = true, action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new(),
          help_heading = "Thermal Policy")]
    pub enable_dynamic_updates: bool,

    // === Fans ===
    /// Manual duty (%) while temperatures are normal
    #[arg(long, env = "FAN_SPEED", default_value_t = 25, help_heading = "Fans")]
    pub fan_speed: u8,

    /// Manual duty (%) while a CPU is hot
    #[arg(long, env = "FAN_SPEED_MAX", default_value_t = 100, help_heading = "Fans")]
    pub fan_speed_max: u8,

    /// Fan RPM treated as 0% when not calibrating
    #[arg(long, env = "FAN_RPM_MIN", default_value_t = 2500, help_heading = "Fans")]
    pub fan_rpm_min: u32,

    /// Fan RPM treated as 100% when not calibrating
    #[arg(long, env = "FAN_RPM_MAX", default_value_t = 12000, help_heading = "Fans")]
    pub fan_rpm_max: u32,

    /// Measure the fan RPM range at startup
    #[arg(long, env = "CALIBRATE_FANS", default_value_t = false, action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new(),
          help_heading = "Fans")]
    pub calibrate_fans: bool,

    /// Seconds to let fans settle before each calibration probe
    #[arg(long, env = "CALIBRATION_WAIT", default_value_t = 20, help_heading = "Fans")]
    pub calibration_wait: u64,

    // === PCIe cooling ===
    /// Disable Dell's default cooling response to third-party PCIe cards
    #[arg(long, env = "DISABLE_THIRD_PARTY_PCIE_CARD_DELL_DEFAULT_COOLING_RESPONSE", default_value_t = false,
          action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true",
          value_parser = BoolishValueParser::new(), help_heading = "PCIe Cooling")]
    pub disable_pcie_cooling: bool,

    /// Leave the PCIe cooling response as-is on exit
    #[arg(long, env = "KEEP_THIRD_PARTY_PCIE_CARD_COOLING_RESPONSE_STATE_ON_EXIT", default_value_t = false,
          action = ArgAction::Set, num_args = 0..=1, default_missing_value = "true",
          value_parser = BoolishValueParser::new(), help_heading = "PCIe Cooling")]
    pub keep_pcie_state: bool,

    // === Runtime ===
    /// Seconds between control ticks
    #[arg(long, env = "CHECK_INTERVAL", default_value_t = 15, help_heading = "Runtime")]
    pub check_interval: u64,

    /// How each tick's status is reported
    #[arg(long, env = "STATUS_FORMAT", value_enum, default_value_t = StatusFormat::Log, help_heading = "Runtime")]
    pub status_format: StatusFormat,

    /// Log raw sensor output and estimated junction temperatures
    #[arg(long, env = "ENABLE_DEBUG_OUTPUT", default_value_t = false, action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new(),
          help_heading = "Runtime")]
    pub enable_debug_output: bool,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL)
    #[arg(long = "log-level", env = "LOG_LEVEL", help_heading = "Runtime")]
    pub log_level: Option<String>,

    /// Log raw commands instead of sending them to the BMC
    #[arg(long, help_heading = "Runtime")]
    pub dry_run: bool,

    // === Commands ===
    /// Run a one-shot health check and exit (0 = healthy)
    #[arg(long, help_heading = "Commands")]
    pub check: bool,

    /// Print the resolved configuration as JSON and exit
    #[arg(long, help_heading = "Commands")]
    pub show_config: bool,
}

impl Args {
    /// Build the controller configuration. Validation is left to the caller.
    pub fn to_config(&self) -> ControllerConfig {
        ControllerConfig {
            connection: ConnectionSettings {
                host: self.idrac_host.clone(),
                username: self.idrac_username.clone(),
                password: self.idrac_password.clone(),
            },
            thermal: ThermalSettings {
                temperature_threshold: self.cpu_temperature_threshold,
                junction_offset: self.junction_offset,
                hysteresis: self.hysteresis.max(0),
                hot_action: self.hot_action,
                dynamic_updates: self.enable_dynamic_updates,
            },
            fan: FanSettings {
                target_duty_percent: self.fan_speed,
                max_duty_percent: self.fan_speed_max,
                rpm_min: self.fan_rpm_min,
                rpm_max: self.fan_rpm_max,
                calibrate: self.calibrate_fans,
                calibration_wait_secs: self.calibration_wait,
            },
            pcie: PcieSettings {
                disable_default_cooling: self.disable_pcie_cooling,
                keep_state_on_exit: self.keep_pcie_state,
            },
            runtime: RuntimeSettings {
                check_interval_secs: self.check_interval,
                dry_run: self.dry_run,
                status_format: self.status_format,
            },
        }
    }

    /// Resolve the tracing filter. Priority: --log-level / LOG_LEVEL,
    /// then ENABLE_DEBUG_OUTPUT, then info.
    pub fn log_filter(&self) -> &'static str {
        let level = match self.log_level.as_ref() {
            Some(level) => level.to_lowercase(),
            None if self.enable_debug_output => "debug".to_string(),
            None => "info".to_string(),
        };

        // CRITICAL maps to ERROR level (most severe)
        match level.as_str() {
            "critical" | "error" => "error",
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            _ => {
                eprintln!("Invalid log level '{}'. Using INFO. Valid levels: TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL", level);
                "info"
            }
        }
    }
}
