//! ipmitool subprocess executor.
//! Builds ipmitool invocations for the local interface or a remote iDRAC.

use tracing::{debug, trace};

use crate::config::types::ConnectionSettings;
use crate::error::GatewayError;

/// Thin wrapper that knows how to reach one BMC.
#[derive(Debug, Clone)]
pub struct Ipmitool {
    connection: ConnectionSettings,
}

impl Ipmitool {
    pub fn new(connection: ConnectionSettings) -> Self {
        Self { connection }
    }

    /// Build an ipmitool Command with the correct interface flags.
    /// "local" uses /dev/ipmi0 through the open interface, anything else goes over LAN.
    pub fn build_command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new("ipmitool");

        if self.connection.is_local() {
            cmd.args(["-I", "open"]);
        } else {
            cmd.args([
                "-I", "lanplus",
                "-H", &self.connection.host,
                "-U", &self.connection.username,
                "-P", &self.connection.password,
            ]);
        }

        cmd
    }

    /// Run ipmitool with the given trailing arguments and return stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String, GatewayError> {
        let mut cmd = self.build_command();
        cmd.args(args);

        let label = format!("ipmitool {}", args.join(" "));
        trace!("Executing: {} (host: {})", label, self.connection.host);

        let output = tokio::process::Command::from(cmd)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| GatewayError::Spawn { command: label.clone(), source })?;

        if !output.status.success() {
            return Err(GatewayError::CommandFailed {
                command: label,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Execute `ipmitool sdr type <kind>` (e.g. "temperature", "fan").
    pub async fn sdr_type(&self, kind: &str) -> Result<String, GatewayError> {
        self.run(&["sdr", "type", kind]).await
    }

    /// Execute `ipmitool raw <bytes>` for Dell OEM commands.
    pub async fn raw(&self, bytes: &[u8]) -> Result<String, GatewayError> {
        let hex = format_raw(bytes);
        debug!("Executing: ipmitool raw {}", hex.join(" "));
        let mut args = vec!["raw"];
        args.extend(hex.iter().map(String::as_str));
        self.run(&args).await
    }

    /// Execute `ipmitool fru print` to get board inventory.
    pub async fn fru(&self) -> Result<String, GatewayError> {
        debug!("Executing: ipmitool fru print");
        self.run(&["fru", "print"]).await
    }

    /// Execute `ipmitool mc info` to verify BMC connectivity.
    pub async fn mc_info(&self) -> Result<String, GatewayError> {
        debug!("Executing: ipmitool mc info");
        self.run(&["mc", "info"]).await
    }
}

/// Render raw command bytes the way ipmitool expects them: "0x30 0x30 0x02 ...".
pub fn format_raw(bytes: &[u8]) -> Vec<String> {
    bytes.iter().map(|b| format!("0x{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(host: &str) -> ConnectionSettings {
        ConnectionSettings {
            host: host.to_string(),
            username: "root".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn test_local_uses_open_interface() {
        let cmd = Ipmitool::new(settings("local")).build_command();
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(args, vec!["-I", "open"]);
    }

    #[test]
    fn test_remote_uses_lanplus_with_credentials() {
        let cmd = Ipmitool::new(settings("192.168.1.120")).build_command();
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(
            args,
            vec!["-I", "lanplus", "-H", "192.168.1.120", "-U", "root", "-P", "secret"]
        );
    }

    #[test]
    fn test_format_raw() {
        assert_eq!(format_raw(&[0x30, 0x30, 0x02, 0xff, 25]), vec!["0x30", "0x30", "0x02", "0xff", "0x19"]);
    }
}
