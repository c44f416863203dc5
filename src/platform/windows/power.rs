// Battery saver state from GetSystemPowerStatus

use windows::Win32::System::Power::{GetSystemPowerStatus, SYSTEM_POWER_STATUS};

use crate::power::{PowerMonitor, PowerReceiver};

fn battery_saver_on() -> bool {
    let mut status = SYSTEM_POWER_STATUS::default();
    match unsafe { GetSystemPowerStatus(&mut status) } {
        Ok(()) => status.SystemStatusFlag == 1,
        Err(e) => {
            tracing::debug!(error = %e, "GetSystemPowerStatus failed");
            false
        }
    }
}

/// Power-save is Windows battery saver. Monitor on/off, sleep and wake arrive
/// as host window messages (`HostEvent::DisplayInteractive`), so this
/// monitor itself always reads as interactive.
pub struct Win32Power {
    power_save: bool,
    receiver: PowerReceiver,
}

impl Win32Power {
    pub fn new() -> Self {
        let power_save = battery_saver_on();
        Self {
            power_save,
            receiver: PowerReceiver::new(power_save),
        }
    }
}

impl Default for Win32Power {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerMonitor for Win32Power {
    fn is_power_save_mode(&self) -> bool {
        self.power_save
    }

    fn is_interactive(&self) -> bool {
        true
    }

    fn register_receiver(&mut self) {
        self.receiver.set_registered(true);
    }

    fn unregister_receiver(&mut self) {
        self.receiver.set_registered(false);
    }

    fn is_receiver_registered(&self) -> bool {
        self.receiver.is_registered()
    }

    fn poll(&mut self) -> bool {
        self.power_save = battery_saver_on();
        self.receiver.observe(self.power_save)
    }
}
