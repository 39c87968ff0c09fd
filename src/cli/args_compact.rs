//! Flag parsing for `ts-compact`.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct CompactArgs {
    pub datadir: PathBuf,
}

#[derive(Debug, PartialEq)]
pub enum CompactAction {
    Run(CompactArgs),
    Help,
    Version,
}

/// Parses `ts-compact`'s argument list (excluding argv[0]): a single
/// positional `<datadir>`, plus `--help`/`--version`.
pub fn parse(args: &[String]) -> Result<CompactAction, String> {
    let mut datadir: Option<PathBuf> = None;

    for arg in args {
        if arg == "--help" {
            return Ok(CompactAction::Help);
        }
        if arg == "--version" {
            return Ok(CompactAction::Version);
        }
        if arg.starts_with("--") {
            return Err(format!("unrecognized flag {arg}"));
        }
        if datadir.is_some() {
            return Err("too many positional arguments".to_string());
        }
        datadir = Some(PathBuf::from(arg));
    }

    let datadir = datadir.ok_or_else(|| "missing required <datadir> argument".to_string())?;
    Ok(CompactAction::Run(CompactArgs { datadir }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_datadir() {
        assert_eq!(
            parse(&["/tmp/data".to_string()]).unwrap(),
            CompactAction::Run(CompactArgs {
                datadir: PathBuf::from("/tmp/data"),
            })
        );
    }

    #[test]
    fn help_short_circuits() {
        assert_eq!(parse(&["--help".to_string()]).unwrap(), CompactAction::Help);
    }

    #[test]
    fn missing_datadir_is_a_usage_error() {
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn unknown_flag_is_a_usage_error() {
        assert!(parse(&["--bogus".to_string(), "/tmp".to_string()]).is_err());
    }
}
