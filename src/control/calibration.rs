//! Fan calibration: drive the fans to 0% and 100% duty, wait for them to
//! settle, and record the reference fan's RPM at each extreme.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::types::ControllerConfig;
use crate::control::profile::FanRange;
use crate::control::sleep_or_shutdown;
use crate::error::CalibrationError;
use crate::hardware::types::FanReading;
use crate::hardware::{ActuatorGateway, SensorGateway};

/// Allowed relative deviation of each sample from the probe mean.
pub const STABILITY_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Idle,
    ProbingMin,
    ProbingMax,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub stabilize_wait: Duration,
    pub samples: usize,
    pub sample_interval: Duration,
    pub tolerance: f64,
}

impl ProbeSettings {
    pub fn from_config(cfg: &ControllerConfig) -> Self {
        Self {
            stabilize_wait: Duration::from_secs(cfg.fan.calibration_wait_secs),
            ..Self::default()
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            stabilize_wait: Duration::from_secs(20),
            samples: 3,
            sample_interval: Duration::from_secs(1),
            tolerance: STABILITY_TOLERANCE,
        }
    }
}

#[derive(Debug)]
pub struct CalibrationOutcome {
    /// Calibrated range on success, configured defaults otherwise
    pub range: FanRange,
    pub phase: CalibrationPhase,
    pub error: Option<CalibrationError>,
}

/// Mean of `readings` if every sample lies within `tolerance` of it.
pub fn stable_mean(readings: &[u32], tolerance: f64) -> Option<f64> {
    if readings.is_empty() {
        return None;
    }
    let mean = readings.iter().map(|&r| r as f64).sum::<f64>() / readings.len() as f64;
    if mean <= 0.0 {
        return None;
    }
    readings
        .iter()
        .all(|&r| (r as f64 - mean).abs() / mean < tolerance)
        .then_some(mean)
}

pub struct Calibrator<'a> {
    sensors: &'a dyn SensorGateway,
    actuator: &'a dyn ActuatorGateway,
    settings: ProbeSettings,
    phase: CalibrationPhase,
}

impl<'a> Calibrator<'a> {
    pub fn new(
        sensors: &'a dyn SensorGateway,
        actuator: &'a dyn ActuatorGateway,
        settings: ProbeSettings,
    ) -> Self {
        Self {
            sensors,
            actuator,
            settings,
            phase: CalibrationPhase::Idle,
        }
    }

    /// Run both probes. Never fails: on any error the configured default range
    /// is returned. Fan duty is restored to the target before returning.
    pub async fn run(
        &mut self,
        cfg: &ControllerConfig,
        shutdown: &mut watch::Receiver<bool>,
    ) -> CalibrationOutcome {
        info!("Starting fan calibration...");
        let result = self.probe_range(shutdown).await;

        info!("Restoring fan duty to {}%", cfg.fan.target_duty_percent);
        if let Err(e) = self.actuator.set_manual_duty(cfg.fan.target_duty_percent).await {
            error!("Failed to restore fan duty after calibration: {}", e);
        }

        match result {
            Ok(range) => {
                self.phase = CalibrationPhase::Done;
                info!(
                    "Fan calibration complete: {} - {} RPM (reference fan)",
                    range.min_rpm, range.max_rpm
                );
                CalibrationOutcome { range, phase: self.phase, error: None }
            }
            Err(e) => {
                self.phase = CalibrationPhase::Failed;
                let range = FanRange::new(cfg.fan.rpm_min, cfg.fan.rpm_max);
                warn!(
                    "Fan calibration failed: {}. Using default range {} - {} RPM",
                    e, range.min_rpm, range.max_rpm
                );
                CalibrationOutcome { range, phase: self.phase, error: Some(e) }
            }
        }
    }

    async fn probe_range(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<FanRange, CalibrationError> {
        self.phase = CalibrationPhase::ProbingMin;
        let min = self.probe(0, shutdown).await?;
        info!("Minimum reading acquired: {} RPM", min);

        self.phase = CalibrationPhase::ProbingMax;
        let max = self.probe(100, shutdown).await?;
        info!("Maximum reading acquired: {} RPM", max);

        if max <= min {
            return Err(CalibrationError::InvertedRange { min, max });
        }
        Ok(FanRange::new(min, max))
    }

    /// Set `duty`, wait for the fans to settle, then sample the reference fan.
    async fn probe(
        &self,
        duty: u8,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<u32, CalibrationError> {
        info!("Probing fans at {}% duty", duty);
        self.actuator.set_manual_duty(duty).await?;

        debug!("Waiting {:?} for fans to stabilize...", self.settings.stabilize_wait);
        if sleep_or_shutdown(self.settings.stabilize_wait, shutdown).await {
            return Err(CalibrationError::Cancelled);
        }

        let wanted = self.settings.samples;
        let mut reference: Option<u32> = None;
        let mut readings = Vec::with_capacity(wanted);

        for i in 0..wanted {
            match self.sensors.read_fan_speeds().await {
                Ok(fans) => match reference_rpm(&fans, &mut reference) {
                    Some(rpm) => {
                        debug!("Reading {}: Fan{} = {} RPM", i + 1, reference.unwrap_or_default(), rpm);
                        readings.push(rpm);
                    }
                    None => debug!("Reading {}: reference fan did not report", i + 1),
                },
                Err(e) => warn!("Reading {}: fan speed query failed: {}", i + 1, e),
            }

            if i + 1 < wanted && sleep_or_shutdown(self.settings.sample_interval, shutdown).await {
                return Err(CalibrationError::Cancelled);
            }
        }

        if reference.is_none() {
            return Err(CalibrationError::NoReading);
        }
        if readings.len() < wanted {
            return Err(CalibrationError::InsufficientReadings { got: readings.len(), wanted });
        }

        match stable_mean(&readings, self.settings.tolerance) {
            Some(mean) => {
                debug!("Readings are stable (average: {:.0} RPM)", mean);
                Ok(mean.round() as u32)
            }
            None => {
                let mean = readings.iter().map(|&r| r as f64).sum::<f64>() / readings.len() as f64;
                Err(CalibrationError::Unstable { readings, mean })
            }
        }
    }
}

/// RPM of the reference fan. The first reading designates the lowest-indexed
/// reporting fan; later readings must come from the same fan.
fn reference_rpm(fans: &FanReading, reference: &mut Option<u32>) -> Option<u32> {
    match *reference {
        Some(index) => fans.get(&index).copied(),
        None => {
            let (&index, &rpm) = fans.iter().next()?;
            *reference = Some(index);
            Some(rpm)
        }
    }
}
