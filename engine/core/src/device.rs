//! Ambient Device Controller
//!
//! Ambient steps drive a playback device as a side effect. Commands are
//! fire-and-forget: the interpreter never waits on them and never learns
//! whether they succeeded.

use parking_lot::Mutex;

use crate::step::DeviceAction;

/// Receiver of ambient device commands
pub trait AmbientDevice: Send + Sync {
    /// Issue a command; must not block
    fn command(&self, action: DeviceAction, value: Option<f64>);
}

/// Device that only records commands in the log
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingDevice;

impl AmbientDevice for LoggingDevice {
    fn command(&self, action: DeviceAction, value: Option<f64>) {
        tracing::debug!(?action, ?value, "Ambient device command");
    }
}

/// Device that keeps every command, for inspection
#[derive(Debug, Default)]
pub struct RecordingDevice {
    commands: Mutex<Vec<(DeviceAction, Option<f64>)>>,
}

impl RecordingDevice {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands received so far
    #[must_use]
    pub fn commands(&self) -> Vec<(DeviceAction, Option<f64>)> {
        self.commands.lock().clone()
    }
}

impl AmbientDevice for RecordingDevice {
    fn command(&self, action: DeviceAction, value: Option<f64>) {
        self.commands.lock().push((action, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_device_keeps_order() {
        let device = RecordingDevice::new();
        device.command(DeviceAction::Play, None);
        device.command(DeviceAction::Volume, Some(0.3));
        assert_eq!(
            device.commands(),
            vec![(DeviceAction::Play, None), (DeviceAction::Volume, Some(0.3))]
        );
    }
}
