//! Error taxonomy: transport failures, configuration, calibration, and fatal startup.

use thiserror::Error;

/// Failure of a single management-controller interaction.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
        /// Whatever was printed before the failure
        stdout: String,
    },

    #[error("could not parse {what}: {detail}")]
    Parse { what: &'static str, detail: String },
}

/// Rejected configuration values.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be between 0 and 100, got {value}")]
    DutyOutOfRange { field: &'static str, value: u8 },

    #[error("{field} must be between -50 and 150 °C, got {value}")]
    TemperatureOutOfRange { field: &'static str, value: i32 },

    #[error("target duty ({target}%) must not exceed max duty ({max}%)")]
    TargetAboveMax { target: u8, max: u8 },

    #[error("junction offset ({offset}°C) must be lower than the temperature threshold ({threshold}°C)")]
    OffsetNotBelowThreshold { offset: i32, threshold: i32 },

    #[error("check interval must be at least 1 second")]
    ZeroInterval,

    #[error("FAN_RPM_MAX ({max}) must be greater than FAN_RPM_MIN ({min})")]
    InvertedRpmRange { min: u32, max: u32 },
}

/// Reasons a calibration run ends in the `Failed` state.
#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("no fan reported a reading")]
    NoReading,

    #[error("only {got} of {wanted} readings were obtained")]
    InsufficientReadings { got: usize, wanted: usize },

    #[error("readings {readings:?} are not stable around mean {mean:.0} RPM")]
    Unstable { readings: Vec<u32>, mean: f64 },

    #[error("measured max ({max} RPM) is not above measured min ({min} RPM)")]
    InvertedRange { min: u32, max: u32 },

    #[error("calibration cancelled by shutdown request")]
    Cancelled,

    #[error("could not set probe duty: {0}")]
    Actuator(#[from] GatewayError),
}

/// Errors that escape the controller. Only startup connectivity is fatal;
/// everything else is recovered inside the loop.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("cannot reach the management controller: {0}")]
    Startup(#[source] GatewayError),
}
