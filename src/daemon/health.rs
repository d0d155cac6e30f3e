//! One-shot health probe for container/orchestrator health checks.

use tracing::{info, warn};

use crate::hardware::{ActuatorGateway, SensorGateway};

/// Healthy when temperatures are readable, at least one CPU reports, and the
/// BMC answers a liveness query. Never changes the cooling profile.
pub async fn run_health_probe(sensors: &dyn SensorGateway, actuator: &dyn ActuatorGateway) -> bool {
    let temps = match sensors.read_temperatures().await {
        Ok(temps) => temps,
        Err(e) => {
            warn!("Health check failed: temperature read error: {}", e);
            return false;
        }
    };

    if !temps.has_cpu() {
        warn!("Health check failed: no CPU temperature reported");
        return false;
    }

    if let Err(e) = actuator.ping().await {
        warn!("Health check failed: BMC not responding: {}", e);
        return false;
    }

    info!(
        "Health check passed (CPU1: {:?}, CPU2: {:?})",
        temps.cpu1, temps.cpu2
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::types::TemperatureReading;
    use crate::test_utils::FakeBmc;

    fn cpu_temps() -> TemperatureReading {
        TemperatureReading { cpu1: Some(41), ..Default::default() }
    }

    #[tokio::test]
    async fn test_healthy() {
        let bmc = FakeBmc::new().with_temps(cpu_temps());
        assert!(run_health_probe(&bmc, &bmc).await);
        assert!(bmc.calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_cpu_readings_is_unhealthy() {
        let bmc = FakeBmc::new().with_temps(TemperatureReading {
            inlet: Some(20),
            ..Default::default()
        });
        assert!(!run_health_probe(&bmc, &bmc).await);
    }

    #[tokio::test]
    async fn test_read_error_is_unhealthy() {
        let bmc = FakeBmc::new().with_temps(cpu_temps());
        bmc.push_temps(None);
        assert!(!run_health_probe(&bmc, &bmc).await);
    }

    #[tokio::test]
    async fn test_dead_bmc_is_unhealthy() {
        let bmc = FakeBmc::new().with_temps(cpu_temps());
        bmc.fail_ping();
        assert!(!run_health_probe(&bmc, &bmc).await);
    }
}
