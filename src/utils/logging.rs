//! Conditional logging macros that check a module-level `ENABLE_LOGS` flag.
//!
//! Usage:
//! ```ignore
//! // In your module, define the flag first:
//! const ENABLE_LOGS: bool = true;
//!
//! // Then use the macros (they're exported at the crate root):
//! use crate::{log_debug, log_info, log_warn};
//!
//! log_info!("This will log if ENABLE_LOGS is true");
//! ```

/// Initialize the `env_logger` backend (reads `RUST_LOG`, defaults to info).
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

/// Render milliseconds as `H:MM:SS.mmm` for log lines. Negative values keep their sign.
pub fn format_hms(ms: i64) -> String {
    let sign = if ms < 0 { "-" } else { "" };
    let abs = ms.unsigned_abs();
    let hours = abs / 3_600_000;
    let minutes = (abs / 60_000) % 60;
    let seconds = (abs / 1_000) % 60;
    let millis = abs % 1_000;
    format!("{sign}{hours}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Macro for conditional debug logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Macro for conditional info logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
///
/// Each module that uses this macro must define:
/// ```ignore
/// const ENABLE_LOGS: bool = true; // or false
/// ```
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Macro for conditional warn logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Macro for conditional error logging.
/// Checks the `ENABLE_LOGS` const in the calling module.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::format_hms;

    #[test]
    fn formats_break_lengths() {
        assert_eq!(format_hms(0), "0:00:00.000");
        assert_eq!(format_hms(180_000), "0:03:00.000");
        assert_eq!(format_hms(3_723_004), "1:02:03.004");
    }

    #[test]
    fn keeps_overrun_sign() {
        assert_eq!(format_hms(-1_500), "-0:00:01.500");
    }
}
