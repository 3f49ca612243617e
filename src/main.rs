use compute::Ledger;
use data::{BranchCode, Code, CommodityCode, Error, Mode};
use read::{load_dictionary, read_records, select_record_files};
use std::{path::PathBuf, process::ExitCode};
use write::write_summaries;

mod compute;
mod data;
mod read;
mod write;

/// What a run works on: the sales directory, and whether it also aggregates by
/// commodity (it does when the directory holds a commodity definition file).
///
/// Since the mode comes from `commodity.lst` being there, a missing commodity
/// definition file is never reported as such: the run goes branch-only and the
/// first three-line sales file fails as an invalid format.
#[derive(Debug)]
struct Config {
    directory: PathBuf,
    mode: Mode,
}

impl Config {
    fn from_args(args: &[String]) -> Result<Self, Error> {
        if args.len() != 2 {
            return Err(Error::Invocation {
                program: args
                    .first()
                    .cloned()
                    .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_owned()),
            });
        }
        let directory = PathBuf::from(&args[1]);
        let mode = if directory.join(CommodityCode::LIST_FILE).exists() {
            Mode::BranchAndCommodity
        } else {
            Mode::Branch
        };
        Ok(Self { directory, mode })
    }
}

/// Load, select, fold, write. Nothing is written unless every record was valid.
fn run(config: &Config) -> Result<Ledger, Error> {
    let dir = &config.directory;
    let branches = load_dictionary::<BranchCode>(dir)?;
    let commodities = match config.mode {
        Mode::BranchAndCommodity => Some(load_dictionary::<CommodityCode>(dir)?),
        Mode::Branch => None,
    };
    let mut ledger = Ledger::new(branches, commodities);
    let files = select_record_files(dir)?;
    read_records(&files, ledger.mode(), &mut ledger)?;
    write_summaries(dir, &ledger)?;
    Ok(ledger)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args: Vec<String> = std::env::args().collect();
    match Config::from_args(&args).and_then(|config| run(&config)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("aborted: {e:?}");
            println!("{e}");
            ExitCode::FAILURE
        }
    }
}
