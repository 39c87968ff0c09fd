//! CLI argument parsing shared by the `ts-load` and `ts-compact`
//! binaries: compile-time defaults, small string helpers, and a
//! per-binary flag parser built on top of them.

pub mod arg_utils;
pub mod args_compact;
pub mod args_load;
pub mod constants;
pub mod date;
