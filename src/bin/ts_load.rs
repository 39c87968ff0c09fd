//! `ts-load`: reads CSV-like `key,date,value` records on stdin and
//! appends them to a journal-managed data/index file pair.

use std::io::{self, BufRead};
use std::time::UNIX_EPOCH;

use ca_table::cli::args_load::{self, LoadAction, LoadArgs};
use ca_table::cli::constants::{DATA_FILE_NAME, INDEX_FILE_NAME, PROGRAM_NAME_LOAD, VERSION};
use ca_table::cli::date::parse_date;
use ca_table::error::CliError;
use ca_table::varint::VarintMsbFirst;
use ca_table::{displayout, displaylevel, end_process};
use ca_table::Journal;

fn print_help() {
    displayout!(
        "Usage: {} [OPTION]... <datadir>\n\n\
         Reads key,date,value records from standard input and appends\n\
         them to the journal-managed data files in <datadir>.\n\n\
         \x20 --delimiter=C          field separator (default ',')\n\
         \x20 --date-format=FMT      strptime-style format (default '%Y-%m-%d %H:%M:%S')\n\
         \x20 --date=STR             fixed timestamp for every record\n\
         \x20 --date-from-path=PATH  use mtime(PATH) as the timestamp\n\
         \x20 --key=KEY              fixed key for every record\n\
         \x20 --interval=N           step the fixed timestamp by N per record (default 1)\n\
         \x20 --help                 print this message and exit\n\
         \x20 --version              print the version and exit\n",
        PROGRAM_NAME_LOAD
    );
}

fn print_version() {
    displayout!("{} {}\n", PROGRAM_NAME_LOAD, VERSION);
}

struct Record {
    key: String,
    time: u64,
    value: f32,
}

/// Splits one input line into a `Record`, consuming as many leading
/// fields as are still undetermined by `args`. Field order is always
/// `key,date,value`, with `key`/`date` dropped from the line when fixed
/// by a flag.
fn parse_line(args: &LoadArgs, line: &str, fixed_time: Option<&mut u64>) -> Result<Record, CliError> {
    let mut fields = line.split(args.delimiter as char);

    let key = match &args.key {
        Some(k) => k.clone(),
        None => fields
            .next()
            .ok_or_else(|| CliError::usage("missing key field"))?
            .to_string(),
    };

    let time = match fixed_time {
        Some(t) => {
            let current = *t;
            *t += args.interval as u64;
            current
        }
        None => {
            let date_field = fields
                .next()
                .ok_or_else(|| CliError::usage("missing date field"))?;
            parse_date(&args.date_format, date_field)
                .map_err(CliError::usage)?
                .max(0) as u64
        }
    };

    let value_field = fields
        .next()
        .ok_or_else(|| CliError::usage("missing value field"))?;
    let value: f32 = value_field
        .trim()
        .parse()
        .map_err(|_| CliError::usage(format!("invalid value {value_field:?}")))?;

    Ok(Record { key, time, value })
}

fn fixed_time_from_args(args: &LoadArgs) -> Result<Option<u64>, CliError> {
    if let Some(date) = &args.date {
        let t = parse_date(&args.date_format, date).map_err(CliError::usage)?;
        return Ok(Some(t.max(0) as u64));
    }
    if let Some(path) = &args.date_from_path {
        let meta = std::fs::metadata(path)?;
        let mtime = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map_err(|_| CliError::usage("file mtime predates the Unix epoch"))?
            .as_secs();
        return Ok(Some(mtime));
    }
    Ok(None)
}

fn run(args: LoadArgs) -> Result<(), CliError> {
    let mut journal = Journal::open(args.datadir.clone())?;
    let data_idx = journal.create_file(DATA_FILE_NAME)?;
    let index_idx = journal.create_file(INDEX_FILE_NAME)?;

    let mut fixed_time = fixed_time_from_args(&args)?;
    let stdin = io::stdin();
    let mut loaded = 0u64;

    for line in stdin.lock().lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let record = parse_line(&args, &line, fixed_time.as_mut())?;

        let offset = journal.logical_len(data_idx);

        let mut data_bytes = Vec::with_capacity(record.key.len() + 1 + 9 + 4);
        data_bytes.extend_from_slice(record.key.as_bytes());
        data_bytes.push(0);
        VarintMsbFirst::encode(&mut data_bytes, record.time);
        data_bytes.extend_from_slice(&record.value.to_le_bytes());
        journal.append(data_idx, &data_bytes)?;

        journal.append(index_idx, &offset.to_le_bytes())?;
        loaded += 1;
    }

    journal.commit()?;
    displaylevel!(2, "{}: loaded {} record(s)\n", PROGRAM_NAME_LOAD, loaded);
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let action = match args_load::parse(&args) {
        Ok(action) => action,
        Err(msg) => {
            let err = CliError::usage(msg);
            end_process!(err.exit_code(), "{}", err);
        }
    };

    match action {
        LoadAction::Help => print_help(),
        LoadAction::Version => print_version(),
        LoadAction::Run(args) => {
            if let Err(err) = run(args) {
                end_process!(err.exit_code(), "{}", err);
            }
        }
    }
}
