//! Parsers for ipmitool's pipe-separated SDR listing and `fru print` output.
//!
//! SDR rows look like `name | id | status | entity | reading`:
//!
//! ```text
//! Inlet Temp       | 04h | ok  |  7.1 | 23 degrees C
//! Temp             | 0Eh | ok  |  3.1 | 40 degrees C
//! Fan1 RPM         | 30h | ok  |  7.1 | 3600 RPM
//! ```
//!
//! Entity `3.x` is a processor; CPU temperatures are assigned to cpu1/cpu2 in
//! listing order.

use tracing::debug;

use crate::hardware::types::{BoardInfo, FanReading, TemperatureReading};

const PROCESSOR_ENTITY: &str = "3.";

struct SdrRow<'a> {
    name: &'a str,
    entity: &'a str,
    reading: &'a str,
}

fn split_sdr_row(line: &str) -> Option<SdrRow<'_>> {
    let cols: Vec<&str> = line.split('|').map(str::trim).collect();
    if cols.len() < 5 {
        return None;
    }
    Some(SdrRow {
        name: cols[0],
        entity: cols[3],
        reading: cols[4],
    })
}

/// Leading number of a reading column with the given unit, e.g. "40 degrees C".
/// "No Reading", "Disabled" and friends yield None.
fn reading_value(reading: &str, unit: &str) -> Option<f64> {
    if !reading.contains(unit) {
        return None;
    }
    reading.split_whitespace().next()?.parse().ok()
}

/// Parse `ipmitool sdr type temperature` output.
pub fn parse_temperatures(output: &str) -> TemperatureReading {
    let mut temps = TemperatureReading::default();
    let mut cpu_temps = Vec::new();

    for row in output.lines().filter_map(split_sdr_row) {
        let Some(value) = reading_value(row.reading, "degrees") else {
            continue;
        };
        let value = value.round() as i32;
        let name = row.name.to_lowercase();

        if row.entity.starts_with(PROCESSOR_ENTITY) {
            cpu_temps.push(value);
        } else if name.contains("inlet") {
            temps.inlet.get_or_insert(value);
        } else if name.contains("exhaust") {
            temps.exhaust.get_or_insert(value);
        }
        debug!("SDR temperature: {} [{}] = {}°C", row.name, row.entity, value);
    }

    temps.cpu1 = cpu_temps.first().copied();
    temps.cpu2 = cpu_temps.get(1).copied();
    temps
}

/// Parse `ipmitool sdr type fan` output. Fan indexes come from the sensor
/// name ("Fan1 RPM", "Fan2A"); redundancy rows and unreadable fans are skipped.
pub fn parse_fan_speeds(output: &str) -> FanReading {
    let mut fans = FanReading::new();

    for row in output.lines().filter_map(split_sdr_row) {
        let Some(rpm) = reading_value(row.reading, "RPM") else {
            continue;
        };
        let Some(index) = fan_index(row.name) else {
            continue;
        };
        fans.entry(index).or_insert(rpm.max(0.0).round() as u32);
    }

    fans
}

fn fan_index(name: &str) -> Option<u32> {
    let rest = name.strip_prefix("Fan")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// First non-empty `Board Mfg` and `Board Product` values, in that order.
fn board_fields(output: &str) -> (Option<String>, Option<String>) {
    let mut manufacturer = None;
    let mut model = None;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "Board Mfg" if manufacturer.is_none() => manufacturer = Some(value.to_string()),
            "Board Product" if model.is_none() => model = Some(value.to_string()),
            _ => {}
        }
    }

    (manufacturer, model)
}

/// Parse `ipmitool fru print`, taking the first board manufacturer and product.
/// Missing fields fall back to "Unknown ...".
pub fn parse_board_info(output: &str) -> BoardInfo {
    let (manufacturer, model) = board_fields(output);
    let fallback = BoardInfo::default();
    BoardInfo {
        model: model.unwrap_or(fallback.model),
        manufacturer: manufacturer.unwrap_or(fallback.manufacturer),
    }
}

/// True if `output` carries at least one board manufacturer or product line.
pub fn has_board_record(output: &str) -> bool {
    let (manufacturer, model) = board_fields(output);
    manufacturer.is_some() || model.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const R720_TEMPS: &str = "\
Inlet Temp       | 04h | ok  |  7.1 | 23 degrees C
Exhaust Temp     | 01h | ok  |  7.1 | 32 degrees C
Temp             | 0Eh | ok  |  3.1 | 40 degrees C
Temp             | 0Fh | ok  |  3.2 | 43 degrees C
";

    const R740_FANS: &str = "\
Fan1 RPM         | 30h | ok  |  7.1 | 3600 RPM
Fan2 RPM         | 31h | ok  |  7.1 | 3480 RPM
Fan3 RPM         | 32h | ns  |  7.1 | No Reading
Fan Redundancy   | 75h | ok  |  7.1 | Fully Redundant
";

    const FRU: &str = "\
FRU Device Description : Builtin FRU Device (ID 0)
 Board Mfg Date        : Mon Jan  1 00:00:00 2018
 Board Mfg             : DELL
 Board Product         : PowerEdge R740
 Board Serial          : CN7016383J00DX
";

    #[test]
    fn test_parse_temperatures() {
        let temps = parse_temperatures(R720_TEMPS);
        assert_eq!(
            temps,
            TemperatureReading { inlet: Some(23), cpu1: Some(40), cpu2: Some(43), exhaust: Some(32) }
        );
    }

    #[test]
    fn test_parse_temperatures_single_socket_and_missing() {
        let output = "\
Inlet Temp       | 04h | ok  |  7.1 | 21 degrees C
Exhaust Temp     | 01h | ns  |  7.1 | Disabled
Temp             | 0Eh | ok  |  3.1 | 51 degrees C
Temp             | 0Fh | ns  |  3.2 | Disabled
";
        let temps = parse_temperatures(output);
        assert_eq!(temps.cpu1, Some(51));
        assert_eq!(temps.cpu2, None);
        assert_eq!(temps.exhaust, None);
        assert_eq!(temps.inlet, Some(21));
    }

    #[test]
    fn test_parse_temperatures_garbage() {
        assert_eq!(parse_temperatures(""), TemperatureReading::default());
        assert_eq!(parse_temperatures("Error: Unable to establish IPMI v2 session"), TemperatureReading::default());
    }

    #[test]
    fn test_parse_fan_speeds() {
        let fans = parse_fan_speeds(R740_FANS);
        assert_eq!(fans.len(), 2);
        assert_eq!(fans.get(&1), Some(&3600));
        assert_eq!(fans.get(&2), Some(&3480));
        assert!(!fans.contains_key(&3));
    }

    #[test]
    fn test_fan_index_variants() {
        assert_eq!(fan_index("Fan1 RPM"), Some(1));
        assert_eq!(fan_index("Fan12A"), Some(12));
        assert_eq!(fan_index("Fan Redundancy"), None);
        assert_eq!(fan_index("Temp"), None);
    }

    #[test]
    fn test_parse_board_info_ignores_mfg_date() {
        let info = parse_board_info(FRU);
        assert_eq!(info.manufacturer, "DELL");
        assert_eq!(info.model, "PowerEdge R740");
    }

    #[test]
    fn test_parse_board_info_missing_fields() {
        assert_eq!(parse_board_info("Product Name : Foo"), BoardInfo::default());
    }

    #[test]
    fn test_has_board_record() {
        assert!(has_board_record(FRU));
        assert!(has_board_record(" Board Product : PowerEdge R720\n"));
        assert!(!has_board_record(" Board Mfg Date : Mon Jan  1 00:00:00 2018\n"));
        assert!(!has_board_record(" Board Mfg :\n"));
        assert!(!has_board_record(""));
    }
}
