//! Scriptable in-memory BMC used by the controller tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::hardware::types::{BoardInfo, FanReading, TemperatureReading};
use crate::hardware::{ActuatorGateway, IdentityGateway, SensorGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    ManualDuty(u8),
    VendorAutomatic,
    CoolingOverride(bool),
}

fn injected(command: &str) -> GatewayError {
    GatewayError::CommandFailed {
        command: command.to_string(),
        status: "exit status: 1".to_string(),
        stderr: "injected failure".to_string(),
        stdout: String::new(),
    }
}

#[derive(Default)]
pub struct FakeBmc {
    calls: Mutex<Vec<Call>>,
    /// Queued temperature results; the last default is used once drained
    temps: Mutex<VecDeque<Option<TemperatureReading>>>,
    default_temps: Mutex<TemperatureReading>,
    /// Fan readings queued per manual duty (calibration probes)
    fans_by_duty: Mutex<HashMap<u8, VecDeque<Option<FanReading>>>>,
    default_fans: Mutex<FanReading>,
    current_duty: Mutex<Option<u8>>,
    fail_actuator_calls: AtomicUsize,
    fail_identity: AtomicBool,
    fail_ping: AtomicBool,
    model: Mutex<String>,
}

impl FakeBmc {
    pub fn new() -> Self {
        let fake = Self::default();
        *fake.model.lock().unwrap() = "PowerEdge R720".to_string();
        fake
    }

    pub fn with_temps(self, temps: TemperatureReading) -> Self {
        *self.default_temps.lock().unwrap() = temps;
        self
    }

    pub fn with_fans(self, fans: FanReading) -> Self {
        *self.default_fans.lock().unwrap() = fans;
        self
    }

    /// Queue one tick's temperatures; `None` makes that read fail.
    pub fn push_temps(&self, temps: Option<TemperatureReading>) {
        self.temps.lock().unwrap().push_back(temps);
    }

    /// Queue a fan reading returned while the fans are at `duty`; `None` fails the read.
    pub fn push_fans_at(&self, duty: u8, fans: Option<FanReading>) {
        self.fans_by_duty
            .lock()
            .unwrap()
            .entry(duty)
            .or_default()
            .push_back(fans);
    }

    pub fn fail_next_actuator_calls(&self, count: usize) {
        self.fail_actuator_calls.store(count, Ordering::SeqCst);
    }

    pub fn fail_identity(&self) {
        self.fail_identity.store(true, Ordering::SeqCst);
    }

    pub fn fail_ping(&self) {
        self.fail_ping.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn actuate(&self, call: Call) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(call);
        let remaining = self.fail_actuator_calls.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_actuator_calls.store(remaining - 1, Ordering::SeqCst);
            return Err(injected("ipmitool raw"));
        }
        if let Call::ManualDuty(duty) = call {
            *self.current_duty.lock().unwrap() = Some(duty);
        }
        Ok(())
    }
}

#[async_trait]
impl SensorGateway for FakeBmc {
    async fn read_temperatures(&self) -> Result<TemperatureReading, GatewayError> {
        match self.temps.lock().unwrap().pop_front() {
            Some(Some(temps)) => Ok(temps),
            Some(None) => Err(injected("ipmitool sdr type temperature")),
            None => Ok(*self.default_temps.lock().unwrap()),
        }
    }

    async fn read_fan_speeds(&self) -> Result<FanReading, GatewayError> {
        let duty = *self.current_duty.lock().unwrap();
        let queued = duty.and_then(|d| {
            self.fans_by_duty
                .lock()
                .unwrap()
                .get_mut(&d)
                .and_then(|q| q.pop_front())
        });
        match queued {
            Some(Some(fans)) => Ok(fans),
            Some(None) => Err(injected("ipmitool sdr type fan")),
            None => Ok(self.default_fans.lock().unwrap().clone()),
        }
    }
}

#[async_trait]
impl ActuatorGateway for FakeBmc {
    async fn set_manual_duty(&self, percent: u8) -> Result<(), GatewayError> {
        self.actuate(Call::ManualDuty(percent.min(100)))
    }

    async fn enable_vendor_automatic(&self) -> Result<(), GatewayError> {
        self.actuate(Call::VendorAutomatic)
    }

    async fn set_third_party_cooling_override(&self, enabled: bool) -> Result<(), GatewayError> {
        self.actuate(Call::CoolingOverride(enabled))
    }

    async fn ping(&self) -> Result<(), GatewayError> {
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(injected("ipmitool mc info"));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityGateway for FakeBmc {
    async fn get_board_info(&self) -> Result<BoardInfo, GatewayError> {
        if self.fail_identity.load(Ordering::SeqCst) {
            return Err(injected("ipmitool fru print"));
        }
        Ok(BoardInfo {
            model: self.model.lock().unwrap().clone(),
            manufacturer: "DELL".to_string(),
        })
    }
}

/// Fan reading with Fan1 at `rpm` and Fan2 slightly faster.
pub fn fans(rpm: u32) -> FanReading {
    FanReading::from([(1, rpm), (2, rpm + 120)])
}
