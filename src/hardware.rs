//! Gateway traits the control loop talks to, and the Dell iDRAC implementation.

use async_trait::async_trait;

pub mod ipmi;
pub mod types;

pub use ipmi::dell_bmc::DellBmc;

use crate::error::GatewayError;
use types::{BoardInfo, FanReading, TemperatureReading};

/// Read-only view of the chassis sensors.
#[async_trait]
pub trait SensorGateway: Send + Sync {
    /// Inlet, CPU and exhaust temperatures for this tick
    async fn read_temperatures(&self) -> Result<TemperatureReading, GatewayError>;

    /// Current RPM of every fan that reports one
    async fn read_fan_speeds(&self) -> Result<FanReading, GatewayError>;
}

/// Cooling commands. Every method is idempotent.
#[async_trait]
pub trait ActuatorGateway: Send + Sync {
    /// Take manual control and set all fans to `percent` (clamped to 100)
    async fn set_manual_duty(&self, percent: u8) -> Result<(), GatewayError>;

    /// Hand fan control back to the iDRAC firmware
    async fn enable_vendor_automatic(&self) -> Result<(), GatewayError>;

    /// Toggle Dell's default cooling response to third-party PCIe cards.
    /// No-op on generations that do not support it.
    async fn set_third_party_cooling_override(&self, enabled: bool) -> Result<(), GatewayError>;

    /// Cheap liveness check against the BMC
    async fn ping(&self) -> Result<(), GatewayError>;
}

#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Board manufacturer and product name
    async fn get_board_info(&self) -> Result<BoardInfo, GatewayError>;
}
