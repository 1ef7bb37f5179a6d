// Core types for device control

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Error types for device operations
#[derive(Debug)]
pub enum DeviceError {
    /// No usable device is attached
    Unreachable(String),

    /// A dispatched command failed (non-zero exit, timeout, spawn failure)
    Transport { command: String, detail: String },

    /// I/O error
    Io(std::io::Error),
}

impl DeviceError {
    pub fn transport(command: impl Into<String>, detail: impl Into<String>) -> Self {
        DeviceError::Transport {
            command: command.into(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::Unreachable(msg) => write!(f, "Device unreachable: {}", msg),
            DeviceError::Transport { command, detail } => {
                write!(f, "Transport failure in '{}': {}", command, detail)
            }
            DeviceError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeviceError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DeviceError {
    fn from(err: std::io::Error) -> Self {
        DeviceError::Io(err)
    }
}

/// Discrete device actions plus a connectivity check.
///
/// Every action either takes full effect or returns an error; implementations
/// hold no state that outlives a call.
pub trait DeviceControl {
    /// Raw device listing as reported by the transport
    fn list_devices(&self) -> DeviceResult<String>;

    /// Whether a usable device is attached
    fn is_connected(&self) -> DeviceResult<bool>;

    fn tap(&self, x: i32, y: i32) -> DeviceResult<()>;

    fn type_text(&self, text: &str) -> DeviceResult<()>;

    fn keyevent(&self, code: u32) -> DeviceResult<()>;

    fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u32) -> DeviceResult<()>;

    fn launch(&self, package_id: &str) -> DeviceResult<()>;
}

impl<T: DeviceControl + ?Sized> DeviceControl for &T {
    fn list_devices(&self) -> DeviceResult<String> {
        (**self).list_devices()
    }

    fn is_connected(&self) -> DeviceResult<bool> {
        (**self).is_connected()
    }

    fn tap(&self, x: i32, y: i32) -> DeviceResult<()> {
        (**self).tap(x, y)
    }

    fn type_text(&self, text: &str) -> DeviceResult<()> {
        (**self).type_text(text)
    }

    fn keyevent(&self, code: u32) -> DeviceResult<()> {
        (**self).keyevent(code)
    }

    fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, duration_ms: u32) -> DeviceResult<()> {
        (**self).swipe(x1, y1, x2, y2, duration_ms)
    }

    fn launch(&self, package_id: &str) -> DeviceResult<()> {
        (**self).launch(package_id)
    }
}

/// Parse `adb devices` output into `(serial, state)` pairs.
pub fn parse_device_list(listing: &str) -> Vec<(String, String)> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            Some((serial.to_string(), state.to_string()))
        })
        .collect()
}

/// Whether the listing contains an online device whose serial contains `pattern`.
pub fn has_online_device(listing: &str, pattern: &str) -> bool {
    parse_device_list(listing)
        .iter()
        .any(|(serial, state)| state == "device" && serial.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "List of devices attached\nemulator-5554\tdevice\nR58M12345\tunauthorized\n\n";

    #[test]
    fn test_parse_device_list() {
        let devices = parse_device_list(LISTING);
        assert_eq!(
            devices,
            vec![
                ("emulator-5554".to_string(), "device".to_string()),
                ("R58M12345".to_string(), "unauthorized".to_string()),
            ]
        );
    }

    #[test]
    fn test_has_online_device_matches_pattern() {
        assert!(has_online_device(LISTING, "emulator"));
        assert!(has_online_device(LISTING, ""));
        assert!(!has_online_device(LISTING, "R58M"));
    }

    #[test]
    fn test_empty_listing_has_no_device() {
        assert!(!has_online_device("List of devices attached\n", ""));
        assert!(!has_online_device("* daemon started successfully\nList of devices attached\n", ""));
    }

    #[test]
    fn test_transport_error_display() {
        let err = DeviceError::transport("shell input tap 1 2", "exit status 1");
        assert_eq!(
            err.to_string(),
            "Transport failure in 'shell input tap 1 2': exit status 1"
        );
    }
}
