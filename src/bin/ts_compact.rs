//! `ts-compact`: opens a journal-managed datadir, re-registers the two
//! named data files, and commits — a manual checkpoint that rewrites
//! the journal file without changing any data.

use ca_table::cli::args_compact::{self, CompactAction, CompactArgs};
use ca_table::cli::constants::{DATA_FILE_NAME, INDEX_FILE_NAME, PROGRAM_NAME_COMPACT, VERSION};
use ca_table::error::CliError;
use ca_table::{end_process, displayout};
use ca_table::Journal;

fn print_help() {
    displayout!(
        "Usage: {} <datadir>\n\n\
         Opens the journal at <datadir>, replays it, and commits — a\n\
         checkpoint that rewrites the journal file without touching the\n\
         data it describes.\n\n\
         \x20 --help     print this message and exit\n\
         \x20 --version  print the version and exit\n",
        PROGRAM_NAME_COMPACT
    );
}

fn print_version() {
    displayout!("{} {}\n", PROGRAM_NAME_COMPACT, VERSION);
}

fn run(args: CompactArgs) -> Result<(), CliError> {
    let mut journal = Journal::open(args.datadir)?;
    journal.create_file(DATA_FILE_NAME)?;
    journal.create_file(INDEX_FILE_NAME)?;
    journal.commit()?;
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let action = match args_compact::parse(&args) {
        Ok(action) => action,
        Err(msg) => {
            let err = CliError::usage(msg);
            end_process!(err.exit_code(), "{}", err);
        }
    };

    match action {
        CompactAction::Help => print_help(),
        CompactAction::Version => print_version(),
        CompactAction::Run(args) => {
            if let Err(err) = run(args) {
                end_process!(err.exit_code(), "{}", err);
            }
        }
    }
}
