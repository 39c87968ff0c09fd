//! Flag parsing for `ts-load`.

use std::path::PathBuf;

use super::arg_utils::long_command_w_arg;
use super::constants::{DEFAULT_DATE_FORMAT, DEFAULT_DELIMITER, DEFAULT_INTERVAL};

#[derive(Debug, Clone, PartialEq)]
pub struct LoadArgs {
    pub datadir: PathBuf,
    pub delimiter: u8,
    pub date_format: String,
    pub date: Option<String>,
    pub date_from_path: Option<PathBuf>,
    pub key: Option<String>,
    pub interval: u32,
}

impl Default for LoadArgs {
    fn default() -> Self {
        LoadArgs {
            datadir: PathBuf::new(),
            delimiter: DEFAULT_DELIMITER as u8,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            date: None,
            date_from_path: None,
            key: None,
            interval: DEFAULT_INTERVAL,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum LoadAction {
    Run(LoadArgs),
    Help,
    Version,
}

/// Parses `ts-load`'s argument list (excluding argv[0]). A bad flag or
/// an empty `--delimiter` value is a usage error, per the error
/// handling design's `Usage` → exit 64 policy.
pub fn parse(args: &[String]) -> Result<LoadAction, String> {
    let mut result = LoadArgs::default();
    let mut datadir: Option<PathBuf> = None;

    for arg in args {
        if arg == "--help" {
            return Ok(LoadAction::Help);
        }
        if arg == "--version" {
            return Ok(LoadAction::Version);
        }
        if let Some(v) = long_command_w_arg(arg, "--delimiter=") {
            let mut bytes = v.bytes();
            let first = bytes.next().ok_or_else(|| "--delimiter requires a single byte value".to_string())?;
            if bytes.next().is_some() {
                return Err("--delimiter must be exactly one byte".to_string());
            }
            result.delimiter = first;
        } else if let Some(v) = long_command_w_arg(arg, "--date-format=") {
            result.date_format = v.to_string();
        } else if let Some(v) = long_command_w_arg(arg, "--date-from-path=") {
            result.date_from_path = Some(PathBuf::from(v));
        } else if let Some(v) = long_command_w_arg(arg, "--date=") {
            result.date = Some(v.to_string());
        } else if let Some(v) = long_command_w_arg(arg, "--key=") {
            result.key = Some(v.to_string());
        } else if let Some(v) = long_command_w_arg(arg, "--interval=") {
            result.interval = v.parse::<u32>().map_err(|_| format!("invalid --interval value {v}"))?;
        } else if arg.starts_with("--") {
            return Err(format!("unrecognized flag {arg}"));
        } else if datadir.is_some() {
            return Err("too many positional arguments".to_string());
        } else {
            datadir = Some(PathBuf::from(arg));
        }
    }

    result.datadir = datadir.ok_or_else(|| "missing required <datadir> argument".to_string())?;
    if result.date.is_some() && result.date_from_path.is_some() {
        return Err("--date and --date-from-path are mutually exclusive".to_string());
    }
    Ok(LoadAction::Run(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_datadir_with_defaults() {
        let action = parse(&["/tmp/data".to_string()]).unwrap();
        assert_eq!(
            action,
            LoadAction::Run(LoadArgs {
                datadir: PathBuf::from("/tmp/data"),
                ..LoadArgs::default()
            })
        );
    }

    #[test]
    fn parses_all_flags() {
        let args = vec![
            "--delimiter=;".to_string(),
            "--date-format=%Y/%m/%d".to_string(),
            "--key=cpu.load".to_string(),
            "--interval=5".to_string(),
            "/tmp/data".to_string(),
        ];
        let action = parse(&args).unwrap();
        match action {
            LoadAction::Run(a) => {
                assert_eq!(a.delimiter, b';');
                assert_eq!(a.date_format, "%Y/%m/%d");
                assert_eq!(a.key, Some("cpu.load".to_string()));
                assert_eq!(a.interval, 5);
            }
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn help_short_circuits_before_datadir_is_required() {
        assert_eq!(parse(&["--help".to_string()]).unwrap(), LoadAction::Help);
    }

    #[test]
    fn version_short_circuits() {
        assert_eq!(parse(&["--version".to_string()]).unwrap(), LoadAction::Version);
    }

    #[test]
    fn missing_datadir_is_a_usage_error() {
        assert!(parse(&["--key=x".to_string()]).is_err());
    }

    #[test]
    fn empty_delimiter_is_a_usage_error() {
        assert!(parse(&["--delimiter=".to_string(), "/tmp".to_string()]).is_err());
    }

    #[test]
    fn multi_byte_delimiter_is_a_usage_error() {
        assert!(parse(&["--delimiter=ab".to_string(), "/tmp".to_string()]).is_err());
    }

    #[test]
    fn date_and_date_from_path_are_mutually_exclusive() {
        let args = vec![
            "--date=2020-01-01 00:00:00".to_string(),
            "--date-from-path=/tmp/x".to_string(),
            "/tmp/data".to_string(),
        ];
        assert!(parse(&args).is_err());
    }

    #[test]
    fn unknown_flag_is_a_usage_error() {
        assert!(parse(&["--bogus".to_string(), "/tmp".to_string()]).is_err());
    }
}
