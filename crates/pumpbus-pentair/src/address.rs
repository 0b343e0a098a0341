//! Bus address ranges and classification.
//!
//! Every device on the Pentair RS-485 bus has an 8-bit address drawn from a
//! fixed partition:
//!
//! | Range         | Devices                                        |
//! |---------------|------------------------------------------------|
//! | `0x0F`        | Broadcast (controllers use it for status)      |
//! | `0x10`–`0x1F` | Main controllers (IntelliTouch, EasyTouch)     |
//! | `0x20`–`0x2F` | Remote controllers — this engine's identity    |
//! | `0x60`–`0x6F` | Pumps (`0x60` = pump 1, `0x61` = pump 2, …)    |
//!
//! The engine only acts on frames addressed to its own remote-controller
//! address or the broadcast address, and only trusts status data sourced
//! from its configured pump address. Everything else on the shared bus is
//! other devices' conversation and is ignored without error.

/// The broadcast address.
pub const BROADCAST: u8 = 0x0F;

/// First main-controller address.
pub const MAIN_CONTROLLER_FIRST: u8 = 0x10;
/// Last main-controller address.
pub const MAIN_CONTROLLER_LAST: u8 = 0x1F;

/// First remote-controller address.
pub const REMOTE_CONTROLLER_FIRST: u8 = 0x20;
/// Last remote-controller address.
pub const REMOTE_CONTROLLER_LAST: u8 = 0x2F;

/// Default address this engine claims on the bus.
pub const DEFAULT_CONTROLLER: u8 = 0x20;

/// First pump address (pump 1).
pub const PUMP_FIRST: u8 = 0x60;
/// Last pump address (pump 16).
pub const PUMP_LAST: u8 = 0x6F;

/// Default target pump (pump 1).
pub const DEFAULT_PUMP: u8 = 0x60;

/// What kind of device an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Broadcast,
    MainController,
    RemoteController,
    Pump,
    /// Outside every assigned range.
    Unassigned,
}

/// Classify a bus address into its device range.
pub fn classify(address: u8) -> DeviceClass {
    match address {
        BROADCAST => DeviceClass::Broadcast,
        MAIN_CONTROLLER_FIRST..=MAIN_CONTROLLER_LAST => DeviceClass::MainController,
        REMOTE_CONTROLLER_FIRST..=REMOTE_CONTROLLER_LAST => DeviceClass::RemoteController,
        PUMP_FIRST..=PUMP_LAST => DeviceClass::Pump,
        _ => DeviceClass::Unassigned,
    }
}

/// Returns `true` if `address` is in the pump range.
pub fn is_pump(address: u8) -> bool {
    classify(address) == DeviceClass::Pump
}

/// Returns `true` if `address` is in the remote-controller range.
pub fn is_remote_controller(address: u8) -> bool {
    classify(address) == DeviceClass::RemoteController
}
