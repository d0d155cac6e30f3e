//! Reading and identity types exchanged between the gateways and the control loop.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One tick's chassis temperatures in °C. `None` means the sensor did not report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub inlet: Option<i32>,
    pub cpu1: Option<i32>,
    pub cpu2: Option<i32>,
    pub exhaust: Option<i32>,
}

impl TemperatureReading {
    /// CPU package temperatures that actually reported this tick.
    pub fn cpu_temps(&self) -> impl Iterator<Item = i32> {
        [self.cpu1, self.cpu2].into_iter().flatten()
    }

    pub fn has_cpu(&self) -> bool {
        self.cpu1.is_some() || self.cpu2.is_some()
    }
}

/// Fan index (as numbered by the chassis) to RPM, ordered by index.
pub type FanReading = BTreeMap<u32, u32>;

/// Raw board inventory as reported by the FRU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInfo {
    pub model: String,
    pub manufacturer: String,
}

impl Default for BoardInfo {
    fn default() -> Self {
        Self {
            model: "Unknown Model".to_string(),
            manufacturer: "Unknown Manufacturer".to_string(),
        }
    }
}

/// Board inventory plus the derived generation flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    pub model: String,
    pub manufacturer: String,
    pub is_modern_generation: bool,
}

impl From<BoardInfo> for ServerIdentity {
    fn from(info: BoardInfo) -> Self {
        let is_modern_generation = is_modern_generation(&info.model);
        Self {
            model: info.model,
            manufacturer: info.manufacturer,
            is_modern_generation,
        }
    }
}

/// True for 14th-generation-or-newer PowerEdge model names: an `R` or `T`,
/// an optional space, then three digits where the second is 4-9 and the
/// third is 0 (R740, R640xd, T 640). R720/R730 are older.
pub fn is_modern_generation(model: &str) -> bool {
    let chars: Vec<char> = model.chars().collect();

    (0..chars.len()).any(|i| {
        if chars[i] != 'R' && chars[i] != 'T' {
            return false;
        }
        let mut j = i + 1;
        if chars.get(j).is_some_and(|c| c.is_whitespace()) {
            j += 1;
        }
        matches!(
            (chars.get(j), chars.get(j + 1), chars.get(j + 2)),
            (Some(a), Some(b), Some('0')) if a.is_ascii_digit() && ('4'..='9').contains(b)
        )
    })
}
