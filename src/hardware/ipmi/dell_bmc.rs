//! Dell iDRAC gateway: implements the sensor, actuator and identity traits
//! with `ipmitool sdr`/`fru` queries and Dell OEM raw commands.

use std::sync::OnceLock;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::hardware::types::{BoardInfo, FanReading, ServerIdentity, TemperatureReading};
use crate::hardware::{ActuatorGateway, IdentityGateway, SensorGateway};
use crate::system::executor::Ipmitool;
use crate::system::parser;

const FAN_CONTROL_MANUAL: [u8; 4] = [0x30, 0x30, 0x01, 0x00];
const FAN_CONTROL_AUTOMATIC: [u8; 4] = [0x30, 0x30, 0x01, 0x01];
const SET_FAN_DUTY_ALL: [u8; 4] = [0x30, 0x30, 0x02, 0xff]; // + duty byte
const PCIE_COOLING_PREFIX: [u8; 10] = [0x30, 0xce, 0x00, 0x16, 0x05, 0x00, 0x00, 0x00, 0x05, 0x00];

/// Manual mode first, then the duty for all fans (clamped to 100).
fn duty_commands(percent: u8) -> [Vec<u8>; 2] {
    let mut duty = SET_FAN_DUTY_ALL.to_vec();
    duty.push(percent.min(100));
    [FAN_CONTROL_MANUAL.to_vec(), duty]
}

fn automatic_command() -> Vec<u8> {
    FAN_CONTROL_AUTOMATIC.to_vec()
}

/// Third-party PCIe cooling response toggle. The flag byte is inverted:
/// 0x00 enables Dell's default response, 0x01 disables it.
fn pcie_command(enabled: bool) -> Vec<u8> {
    let mut cmd = PCIE_COOLING_PREFIX.to_vec();
    cmd.extend_from_slice(&[if enabled { 0x00 } else { 0x01 }, 0x00, 0x00]);
    cmd
}

/// `fru print` exits non-zero when a secondary FRU (PSU, backplane) is not
/// present, even though the builtin board record was printed. Only output
/// without any board line is treated as a failed identity query.
fn board_info_from_fru(result: Result<String, GatewayError>) -> Result<BoardInfo, GatewayError> {
    match result {
        Ok(output) => Ok(parser::parse_board_info(&output)),
        Err(GatewayError::CommandFailed { command, status, stderr, stdout })
            if parser::has_board_record(&stdout) =>
        {
            warn!(
                "`{}` exited with {} ({}), using the board record it printed",
                command, status, stderr
            );
            Ok(parser::parse_board_info(&stdout))
        }
        Err(e) => Err(e),
    }
}

pub struct DellBmc {
    ipmitool: Ipmitool,
    dry_run: bool,
    /// Set once the FRU has been read; gates the PCIe cooling command
    modern_generation: OnceLock<bool>,
}

impl DellBmc {
    pub fn new(ipmitool: Ipmitool, dry_run: bool) -> Self {
        Self {
            ipmitool,
            dry_run,
            modern_generation: OnceLock::new(),
        }
    }

    async fn send_raw(&self, name: &str, bytes: &[u8]) -> Result<(), GatewayError> {
        if self.dry_run {
            info!(
                "[DRY RUN] Would execute {}: ipmitool raw {}",
                name,
                crate::system::executor::format_raw(bytes).join(" ")
            );
            return Ok(());
        }
        self.ipmitool.raw(bytes).await?;
        debug!("{} succeeded", name);
        Ok(())
    }

    async fn is_modern_generation(&self) -> Result<bool, GatewayError> {
        if let Some(modern) = self.modern_generation.get() {
            return Ok(*modern);
        }
        let info = self.get_board_info().await?;
        Ok(ServerIdentity::from(info).is_modern_generation)
    }
}

/// An SDR listing without a single `|` row is not something we can read from.
fn ensure_sdr_rows(what: &'static str, output: &str) -> Result<(), GatewayError> {
    if output.lines().any(|line| line.contains('|')) {
        return Ok(());
    }
    Err(GatewayError::Parse {
        what,
        detail: format!("no sensor rows in {:?}", output.trim()),
    })
}

#[async_trait]
impl SensorGateway for DellBmc {
    async fn read_temperatures(&self) -> Result<TemperatureReading, GatewayError> {
        let output = self.ipmitool.sdr_type("temperature").await?;
        ensure_sdr_rows("temperature SDR", &output)?;
        Ok(parser::parse_temperatures(&output))
    }

    async fn read_fan_speeds(&self) -> Result<FanReading, GatewayError> {
        let output = self.ipmitool.sdr_type("fan").await?;
        ensure_sdr_rows("fan SDR", &output)?;
        let fans = parser::parse_fan_speeds(&output);
        if fans.is_empty() {
            debug!("No fan speeds found in SDR output:\n{}", output.trim_end());
        }
        Ok(fans)
    }
}

#[async_trait]
impl ActuatorGateway for DellBmc {
    async fn set_manual_duty(&self, percent: u8) -> Result<(), GatewayError> {
        let [manual, duty] = duty_commands(percent);
        self.send_raw("manual fan control", &manual).await?;
        self.send_raw("set fan duty", &duty).await
    }

    async fn enable_vendor_automatic(&self) -> Result<(), GatewayError> {
        self.send_raw("automatic fan control", &automatic_command()).await
    }

    async fn set_third_party_cooling_override(&self, enabled: bool) -> Result<(), GatewayError> {
        if self.is_modern_generation().await? {
            info!(
                "Third-party PCIe cooling response is not controllable on this generation, skipping ({})",
                if enabled { "enable" } else { "disable" }
            );
            return Ok(());
        }

        let name = if enabled {
            "enable third-party PCIe cooling response"
        } else {
            "disable third-party PCIe cooling response"
        };
        self.send_raw(name, &pcie_command(enabled)).await
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        self.ipmitool.mc_info().await.map(|_| ())
    }
}

#[async_trait]
impl IdentityGateway for DellBmc {
    async fn get_board_info(&self) -> Result<BoardInfo, GatewayError> {
        let info = board_info_from_fru(self.ipmitool.fru().await)?;
        let _ = self
            .modern_generation
            .set(crate::hardware::types::is_modern_generation(&info.model));
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ConnectionSettings;

    fn dry_run_bmc() -> DellBmc {
        let ipmitool = Ipmitool::new(ConnectionSettings {
            host: "local".to_string(),
            username: "root".to_string(),
            password: "calvin".to_string(),
        });
        DellBmc::new(ipmitool, true)
    }

    fn fru_exit_1(stdout: &str) -> Result<String, GatewayError> {
        Err(GatewayError::CommandFailed {
            command: "ipmitool fru print".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "Device not present (Requested sensor, data, or record not found)".to_string(),
            stdout: stdout.to_string(),
        })
    }

    #[test]
    fn test_duty_commands_bytes() {
        assert_eq!(
            duty_commands(25),
            [vec![0x30, 0x30, 0x01, 0x00], vec![0x30, 0x30, 0x02, 0xff, 0x19]]
        );
        assert_eq!(duty_commands(0)[1], vec![0x30, 0x30, 0x02, 0xff, 0x00]);
        assert_eq!(duty_commands(250)[1], vec![0x30, 0x30, 0x02, 0xff, 0x64]);
        // absolute commands: repeating them leaves the chassis unchanged
        assert_eq!(duty_commands(40), duty_commands(40));
    }

    #[test]
    fn test_automatic_command_bytes() {
        assert_eq!(automatic_command(), vec![0x30, 0x30, 0x01, 0x01]);
    }

    #[test]
    fn test_pcie_command_bytes() {
        assert_eq!(
            pcie_command(true),
            vec![0x30, 0xce, 0x00, 0x16, 0x05, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            pcie_command(false),
            vec![0x30, 0xce, 0x00, 0x16, 0x05, 0x00, 0x00, 0x00, 0x05, 0x00, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn test_fru_exit_status_with_board_record_is_accepted() {
        let stdout = "\
FRU Device Description : Builtin FRU Device (ID 0)
 Board Mfg             : DELL
 Board Product         : PowerEdge R720

FRU Device Description : PS1 (ID 1)
 Device not present (Requested sensor, data, or record not found)
";
        let info = board_info_from_fru(fru_exit_1(stdout)).unwrap();
        assert_eq!(info.model, "PowerEdge R720");
        assert_eq!(info.manufacturer, "DELL");
    }

    #[test]
    fn test_fru_failure_without_board_record_is_an_error() {
        assert!(matches!(
            board_info_from_fru(fru_exit_1("")),
            Err(GatewayError::CommandFailed { .. })
        ));
        assert!(board_info_from_fru(fru_exit_1("Error: Unable to establish IPMI v2 session\n")).is_err());

        let spawn = Err(GatewayError::Spawn {
            command: "ipmitool fru print".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "ipmitool not found"),
        });
        assert!(matches!(board_info_from_fru(spawn), Err(GatewayError::Spawn { .. })));
    }

    #[test]
    fn test_fru_success_without_board_falls_back_to_unknown() {
        let info = board_info_from_fru(Ok("FRU Device Description : Builtin FRU Device (ID 0)\n".to_string())).unwrap();
        assert_eq!(info, BoardInfo::default());
    }

    #[test]
    fn test_sdr_output_without_rows_is_a_parse_error() {
        assert!(ensure_sdr_rows("fan SDR", "Fan1 | 30h | ok | 7.1 | 3600 RPM\n").is_ok());
        assert!(matches!(
            ensure_sdr_rows("fan SDR", "Error: unable to establish session\n"),
            Err(GatewayError::Parse { what: "fan SDR", .. })
        ));
        assert!(ensure_sdr_rows("temperature SDR", "").is_err());
    }

    #[tokio::test]
    async fn test_dry_run_commands_do_not_touch_the_bmc() {
        let bmc = dry_run_bmc();
        assert!(bmc.set_manual_duty(25).await.is_ok());
        assert!(bmc.set_manual_duty(25).await.is_ok());
        assert!(bmc.set_manual_duty(250).await.is_ok());
        assert!(bmc.enable_vendor_automatic().await.is_ok());
    }

    #[tokio::test]
    async fn test_pcie_override_is_noop_on_modern_generation() {
        let bmc = dry_run_bmc();
        bmc.modern_generation.set(true).unwrap();
        assert!(bmc.set_third_party_cooling_override(false).await.is_ok());
        assert!(bmc.set_third_party_cooling_override(true).await.is_ok());
    }

    #[tokio::test]
    async fn test_pcie_override_dry_run_on_older_generation() {
        let bmc = dry_run_bmc();
        bmc.modern_generation.set(false).unwrap();
        assert!(bmc.set_third_party_cooling_override(false).await.is_ok());
    }
}
