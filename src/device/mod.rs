pub mod adb;
pub mod process;
pub mod types;

pub use adb::{AdbConfig, AdbDevice, encode_input_text};
pub use types::{DeviceControl, DeviceError, DeviceResult, has_online_device, parse_device_list};
