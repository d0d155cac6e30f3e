//! Per-tick status records and the sinks that publish them.

use std::io::Write;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{info, warn};

use crate::control::profile::{CoolingProfile, FanRange};
use crate::hardware::types::{FanReading, TemperatureReading};

#[derive(Debug, Clone, Serialize)]
pub struct FanStatus {
    pub index: u32,
    pub rpm: u32,
    pub percent: u8,
}

/// Immutable snapshot of one control tick.
#[derive(Debug, Clone, Serialize)]
pub struct StatusRecord {
    pub timestamp: DateTime<Local>,
    pub temperatures: TemperatureReading,
    pub fans: Vec<FanStatus>,
    /// Profile chosen by the policy this tick
    pub profile: CoolingProfile,
    /// Whether the chassis is actually running `profile`
    pub applied: bool,
    pub fan_range: FanRange,
}

impl StatusRecord {
    pub fn new(
        temperatures: TemperatureReading,
        fans: &FanReading,
        profile: CoolingProfile,
        applied: bool,
        fan_range: FanRange,
    ) -> Self {
        let fans = fans
            .iter()
            .map(|(&index, &rpm)| FanStatus { index, rpm, percent: fan_range.to_percent(rpm) })
            .collect();
        Self {
            timestamp: Local::now(),
            temperatures,
            fans,
            profile,
            applied,
            fan_range,
        }
    }

    /// "Inlet 22°C | CPU1 40°C | CPU2 - | Exhaust 31°C | Profile: User 25% | Fan1: 3600 RPM (12%) ..."
    pub fn summary(&self) -> String {
        let t = &self.temperatures;
        let fans = if self.fans.is_empty() {
            "No data".to_string()
        } else {
            self.fans
                .iter()
                .map(|f| format!("Fan{}: {} RPM ({}%)", f.index, f.rpm, f.percent))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "Inlet {} | CPU1 {} | CPU2 {} | Exhaust {} | Profile: {}{} | {}",
            fmt_temp(t.inlet),
            fmt_temp(t.cpu1),
            fmt_temp(t.cpu2),
            fmt_temp(t.exhaust),
            self.profile,
            if self.applied { "" } else { " (pending)" },
            fans
        )
    }
}

fn fmt_temp(temp: Option<i32>) -> String {
    temp.map(|t| format!("{}°C", t)).unwrap_or_else(|| "-".to_string())
}

/// Receives one record per tick. Must not block the control loop.
pub trait StatusSink: Send + Sync {
    fn publish(&mut self, record: &StatusRecord);
}

/// Human-readable status through the regular log stream.
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn publish(&mut self, record: &StatusRecord) {
        info!("{}", record.summary());
    }
}

/// One JSON document per line, for log shippers and scripts.
pub struct JsonStatusSink<W: Write + Send + Sync> {
    writer: W,
}

impl<W: Write + Send + Sync> JsonStatusSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send + Sync> StatusSink for JsonStatusSink<W> {
    fn publish(&mut self, record: &StatusRecord) {
        let result = serde_json::to_writer(&mut self.writer, record)
            .map_err(std::io::Error::from)
            .and_then(|_| writeln!(self.writer))
            .and_then(|_| self.writer.flush());
        if let Err(e) = result {
            warn!("Failed to write status record: {}", e);
        }
    }
}
