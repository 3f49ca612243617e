use crate::data::{Code, Dictionary, Error, Mode, SaleRecord, RECORD_EXTENSION};
use log::{debug, info};
use regex::Regex;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::LazyLock,
};

static RECORD_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^[0-9]{{8}}\.{RECORD_EXTENSION}$")).expect("static record file pattern")
});

/// Trait for doing something with a `SaleRecord` read from a sales file. Used by the
/// `Ledger` to fold amounts into its dictionaries, and by tests to check what the
/// reader hands over.
pub(crate) trait RecordUser {
    fn use_record(&mut self, record: SaleRecord) -> Result<(), Error>;
}

/// Loads `C::LIST_FILE` from `dir`.
pub(crate) fn load_dictionary<C: Code>(dir: &Path) -> Result<Dictionary<C>, Error> {
    let path = dir.join(C::LIST_FILE);
    if !path.exists() {
        return Err(Error::MissingFile { kind: C::KIND });
    }
    let dictionary = parse_dictionary(BufReader::new(File::open(&path)?))?;
    info!(
        "loaded {} {} definitions from {}",
        dictionary.len(),
        C::KIND,
        path.display()
    );
    Ok(dictionary)
}

/// Parses `code,name` lines. One bad line rejects the whole file.
pub(crate) fn parse_dictionary<C: Code, R: BufRead>(reader: R) -> Result<Dictionary<C>, Error> {
    let mut dictionary = Dictionary::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let invalid = || Error::InvalidDictionaryFormat {
            kind: C::KIND,
            line: n + 1,
        };
        let mut fields = line.trim_end_matches('\r').split(',');
        let (Some(code), Some(name), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(invalid());
        };
        let code = C::parse(code).ok_or_else(invalid)?;
        dictionary.insert(code, name.to_owned());
    }
    Ok(dictionary)
}

/// A sales file chosen for processing; `ordinal` is its numeric file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordFile {
    pub ordinal: u32,
    pub name: String,
    pub path: PathBuf,
}

/// A directory entry as far as selection cares.
#[derive(Debug, Clone)]
pub(crate) struct Listed {
    pub name: String,
    pub path: PathBuf,
    pub is_file: bool,
}

fn list_directory(dir: &Path) -> Result<Vec<Listed>, Error> {
    let mut listed = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        // names that aren't UTF-8 can't be sales files anyway
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let path = entry.path();
        listed.push(Listed {
            name,
            is_file: path.is_file(),
            path,
        });
    }
    Ok(listed)
}

/// Lists `dir` and returns its sales files sorted by ordinal.
pub(crate) fn select_record_files(dir: &Path) -> Result<Vec<RecordFile>, Error> {
    let files = select(list_directory(dir)?)?;
    info!("selected {} sales files in {}", files.len(), dir.display());
    Ok(files)
}

/// Keeps the entries named like a sales file, refusing any such entry that isn't a
/// regular file, and checks the ordinals run without gaps.
pub(crate) fn select(listed: impl IntoIterator<Item = Listed>) -> Result<Vec<RecordFile>, Error> {
    let mut files = Vec::new();
    for entry in listed {
        if !RECORD_FILE_NAME.is_match(&entry.name) {
            continue;
        }
        if !entry.is_file {
            return Err(Error::UnexpectedEntry(entry.name));
        }
        // 8 ASCII digits always fit
        let ordinal = entry.name[..8].parse().unwrap_or(u32::MAX);
        files.push(RecordFile {
            ordinal,
            name: entry.name,
            path: entry.path,
        });
    }
    files.sort_by_key(|f| f.ordinal);
    if let Some(pair) = files.windows(2).find(|w| w[1].ordinal - w[0].ordinal != 1) {
        return Err(Error::NonSequentialRecordFiles {
            previous: pair[0].name.clone(),
            next: pair[1].name.clone(),
        });
    }
    Ok(files)
}

/// Reads one sales file and checks it has exactly one line per field of `mode`.
pub(crate) fn read_record(file: &RecordFile, mode: Mode) -> Result<SaleRecord, Error> {
    let content = std::fs::read_to_string(&file.path)?;
    parse_record(&file.name, &content, mode)
}

pub(crate) fn parse_record(name: &str, content: &str, mode: Mode) -> Result<SaleRecord, Error> {
    // a lone trailing '\r' ends a line too
    let lines: Vec<&str> = content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .collect();
    if lines.len() != mode.record_arity() {
        return Err(Error::InvalidRecordFormat(name.to_owned()));
    }
    // branch first, amount last, commodity in between when there is one
    Ok(SaleRecord {
        file: name.to_owned(),
        branch: lines[0].to_owned(),
        commodity: (mode == Mode::BranchAndCommodity).then(|| lines[1].to_owned()),
        amount: lines[lines.len() - 1].to_owned(),
    })
}

/// Feeds every file, in order, to `user`; stops at the first failure.
pub(crate) fn read_records<U: RecordUser>(
    files: &[RecordFile],
    mode: Mode,
    user: &mut U,
) -> Result<(), Error> {
    for file in files {
        let record = read_record(file, mode)?;
        debug!("read {record:?}");
        user.use_record(record)?;
    }
    Ok(())
}
