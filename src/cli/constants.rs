//! Compile-time defaults and display infrastructure shared by
//! `ts-load` and `ts-compact`.

use std::sync::atomic::{AtomicU32, Ordering};

pub const PROGRAM_NAME_LOAD: &str = "ts-load";
pub const PROGRAM_NAME_COMPACT: &str = "ts-compact";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `--delimiter` default.
pub const DEFAULT_DELIMITER: char = ',';
/// `--date-format` default.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// `--interval` default, in seconds.
pub const DEFAULT_INTERVAL: u32 = 1;

pub const DATA_FILE_NAME: &str = "input.data";
pub const INDEX_FILE_NAME: &str = "input.index";

/// 0 = no output; 1 = errors only; 2 = normal; 3 = verbose.
pub static DISPLAY_LEVEL: AtomicU32 = AtomicU32::new(2);

#[inline]
pub fn display_level() -> u32 {
    DISPLAY_LEVEL.load(Ordering::Relaxed)
}

#[inline]
pub fn set_display_level(level: u32) {
    DISPLAY_LEVEL.store(level, Ordering::Relaxed);
}

/// Print to stdout.
#[macro_export]
macro_rules! displayout {
    ($($arg:tt)*) => { print!($($arg)*) };
}

/// Print to stderr.
#[macro_export]
macro_rules! display {
    ($($arg:tt)*) => { eprint!($($arg)*) };
}

/// Conditionally print to stderr at or above `level`.
#[macro_export]
macro_rules! displaylevel {
    ($level:expr, $($arg:tt)*) => {
        if $crate::cli::constants::display_level() >= $level {
            eprint!($($arg)*);
        }
    };
}

/// Print debug output — active only in debug builds.
#[macro_export]
macro_rules! debugoutput {
    ($($arg:tt)*) => {
        #[cfg(debug_assertions)]
        eprint!($($arg)*);
    };
}

/// Prints a diagnostic then terminates the process with `$error` as the
/// exit code — the single exit point `main()` funnels fatal errors
/// through.
///
/// Usage: `end_process!(exit_code, "message {}", arg)`
#[macro_export]
macro_rules! end_process {
    ($error:expr, $($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        eprint!("Error in {}, line {} : \n", file!(), line!());
        if $crate::cli::constants::display_level() >= 1 {
            eprint!("Error {} : ", $error);
            eprint!($($arg)*);
            eprint!("\n");
        }
        std::process::exit($error as i32);
    }};
}
