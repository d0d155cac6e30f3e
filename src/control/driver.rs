//! Control loop driver: startup, the per-tick read → decide → apply → publish
//! cycle, and the guaranteed restore-to-Dell-automatic shutdown sequence.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::types::ControllerConfig;
use crate::control::calibration::{Calibrator, ProbeSettings};
use crate::control::policy::PolicyEngine;
use crate::control::profile::{CoolingProfile, FanRange};
use crate::control::sleep_or_shutdown;
use crate::daemon::status::{StatusRecord, StatusSink};
use crate::error::ControllerError;
use crate::hardware::types::{FanReading, ServerIdentity, TemperatureReading};
use crate::hardware::{ActuatorGateway, IdentityGateway, SensorGateway};

pub struct ControlLoop {
    config: ControllerConfig,
    sensors: Arc<dyn SensorGateway>,
    actuator: Arc<dyn ActuatorGateway>,
    identity: Arc<dyn IdentityGateway>,
    sink: Box<dyn StatusSink>,
    policy: PolicyEngine,
    fan_range: FanRange,
    /// Last profile the BMC accepted. `None` when unknown (startup, or after
    /// a failed command), which forces the next tick to re-apply.
    last_applied: Option<CoolingProfile>,
}

impl ControlLoop {
    pub fn new(
        config: ControllerConfig,
        sensors: Arc<dyn SensorGateway>,
        actuator: Arc<dyn ActuatorGateway>,
        identity: Arc<dyn IdentityGateway>,
        sink: Box<dyn StatusSink>,
    ) -> Self {
        let fan_range = FanRange::new(config.fan.rpm_min, config.fan.rpm_max);
        Self {
            config,
            sensors,
            actuator,
            identity,
            sink,
            policy: PolicyEngine::new(),
            fan_range,
            last_applied: None,
        }
    }

    /// Resolve the server identity, apply the PCIe cooling preference, and
    /// calibrate if requested. Only an unreachable BMC is an error.
    pub async fn startup(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<ServerIdentity, ControllerError> {
        let info = self
            .identity
            .get_board_info()
            .await
            .map_err(ControllerError::Startup)?;
        let server = ServerIdentity::from(info);
        info!(
            "Server: {} {} ({})",
            server.manufacturer,
            server.model,
            if server.is_modern_generation { "14th generation or newer" } else { "13th generation or older" }
        );

        if self.config.pcie.disable_default_cooling {
            info!("Disabling third-party PCIe card Dell default cooling response");
            if let Err(e) = self.actuator.set_third_party_cooling_override(false).await {
                error!("Failed to disable third-party PCIe cooling response: {}", e);
            }
        }

        if self.config.fan.calibrate {
            let settings = ProbeSettings::from_config(&self.config);
            let outcome = Calibrator::new(self.sensors.as_ref(), self.actuator.as_ref(), settings)
                .run(&self.config, shutdown)
                .await;
            debug!("Calibration ended in phase {:?}", outcome.phase);
            self.fan_range = outcome.range;
        }
        info!("Fan range: {} - {} RPM", self.fan_range.min_rpm, self.fan_range.max_rpm);

        Ok(server)
    }

    /// One control iteration. Sensor and actuator failures are logged and
    /// absorbed; the tick always completes.
    pub async fn tick(&mut self) -> StatusRecord {
        let temps = self.read_temperatures().await;
        let fans = self.read_fan_speeds().await;

        for (n, package) in [(1, temps.cpu1), (2, temps.cpu2)] {
            if let Some(package) = package {
                debug!(
                    "CPU{} estimated junction temperature: {}°C",
                    n,
                    package.saturating_add(self.config.thermal.junction_offset)
                );
            }
        }

        if !temps.has_cpu() {
            warn!("No CPU temperature available, falling back to Dell automatic cooling (degraded mode)");
        }
        let was_hot = self.policy.is_hot();
        let profile = self.policy.next(&temps, &self.config);
        if self.policy.is_hot() != was_hot {
            if self.policy.is_hot() {
                warn!(
                    "CPU temperature above {}°C (package), switching to {}",
                    self.config.thermal.adjusted_threshold(),
                    profile
                );
            } else {
                info!("CPU temperatures back under control");
            }
        }
        self.apply(profile).await;

        let record = StatusRecord::new(
            temps,
            &fans,
            profile,
            self.last_applied == Some(profile),
            self.fan_range,
        );
        self.sink.publish(&record);
        record
    }

    /// Run until shutdown is requested, then restore vendor cooling.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ControllerError> {
        self.startup(&mut shutdown).await?;

        let interval = Duration::from_secs(self.config.runtime.check_interval_secs);
        info!(
            "Control loop started: interval {}s, threshold {}°C (adjusted {}°C for junction offset {}°C)",
            interval.as_secs(),
            self.config.thermal.temperature_threshold,
            self.config.thermal.adjusted_threshold(),
            self.config.thermal.junction_offset
        );

        while !*shutdown.borrow() {
            self.tick().await;
            if sleep_or_shutdown(interval, &mut shutdown).await {
                break;
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Hand the fans back to the iDRAC and, unless asked to keep it, restore
    /// the PCIe cooling response. Each step runs even if the previous failed.
    pub async fn shutdown(&mut self) {
        info!("Shutting down, restoring Dell automatic fan control");
        match self.actuator.enable_vendor_automatic().await {
            Ok(()) => self.last_applied = Some(CoolingProfile::VendorAutomatic),
            Err(e) => {
                self.last_applied = None;
                error!("Failed to restore Dell automatic fan control: {}", e);
            }
        }

        if !self.config.pcie.keep_state_on_exit {
            info!("Restoring third-party PCIe card Dell default cooling response");
            if let Err(e) = self.actuator.set_third_party_cooling_override(true).await {
                error!("Failed to restore third-party PCIe cooling response: {}", e);
            }
        }
    }

    async fn apply(&mut self, profile: CoolingProfile) {
        if self.last_applied == Some(profile) {
            return;
        }

        let result = match profile {
            CoolingProfile::Manual(duty) => self.actuator.set_manual_duty(duty).await,
            CoolingProfile::VendorAutomatic => self.actuator.enable_vendor_automatic().await,
        };

        match result {
            Ok(()) => {
                info!(
                    "Fan profile: {} -> {}",
                    self.last_applied.map(|p| p.to_string()).unwrap_or_else(|| "Initializing".to_string()),
                    profile
                );
                self.last_applied = Some(profile);
            }
            Err(e) => {
                // A half-applied command leaves the chassis mode unknown
                self.last_applied = None;
                error!("Failed to apply fan profile {}: {} (retrying next tick)", profile, e);
            }
        }
    }

    async fn read_temperatures(&self) -> TemperatureReading {
        self.sensors.read_temperatures().await.unwrap_or_else(|e| {
            warn!("Could not get temperature readings: {}", e);
            TemperatureReading::default()
        })
    }

    async fn read_fan_speeds(&self) -> FanReading {
        self.sensors.read_fan_speeds().await.unwrap_or_else(|e| {
            warn!("Could not get fan speeds: {}", e);
            FanReading::new()
        })
    }
}
