use regex::Regex;
use std::{collections::HashMap, fmt, hash::Hash, sync::LazyLock};
use thiserror::Error;

/// Sale amounts and running totals. Amounts are digit strings in the record files, so
/// they can never be negative.
pub type Amount = u64;

/// Every running total must stay strictly below this (10 digits at most).
pub const AMOUNT_CEILING: Amount = 10_000_000_000;

pub const RECORD_EXTENSION: &str = "rcd";

static BRANCH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{3}$").expect("static branch pattern"));
static COMMODITY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{8}$").expect("static commodity pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Branch,
    Commodity,
}

impl fmt::Display for CodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeKind::Branch => f.write_str("branch"),
            CodeKind::Commodity => f.write_str("commodity"),
        }
    }
}

/// A dictionary key. Each kind of code knows its own shape and the files it is
/// loaded from and summarized into, so the loader and writer are written once and
/// instantiated per kind. A value of a `Code` type always matches its pattern.
pub(crate) trait Code: Clone + Eq + Hash + fmt::Debug + fmt::Display {
    const KIND: CodeKind;
    /// Definition file, e.g. `branch.lst`
    const LIST_FILE: &'static str;
    /// Summary file, e.g. `branch.out`
    const OUT_FILE: &'static str;

    fn pattern() -> &'static Regex;
    fn as_str(&self) -> &str;
    /// Only called with strings that fully matched `pattern()`.
    fn from_matched(code: &str) -> Self;

    fn parse(code: &str) -> Option<Self> {
        Self::pattern()
            .is_match(code)
            .then(|| Self::from_matched(code))
    }
}

/// Three decimal digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct BranchCode(String);

/// Eight ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct CommodityCode(String);

impl Code for BranchCode {
    const KIND: CodeKind = CodeKind::Branch;
    const LIST_FILE: &'static str = "branch.lst";
    const OUT_FILE: &'static str = "branch.out";

    fn pattern() -> &'static Regex {
        &BRANCH_PATTERN
    }
    fn as_str(&self) -> &str {
        &self.0
    }
    fn from_matched(code: &str) -> Self {
        Self(code.to_owned())
    }
}

impl Code for CommodityCode {
    const KIND: CodeKind = CodeKind::Commodity;
    const LIST_FILE: &'static str = "commodity.lst";
    const OUT_FILE: &'static str = "commodity.out";

    fn pattern() -> &'static Regex {
        &COMMODITY_PATTERN
    }
    fn as_str(&self) -> &str {
        &self.0
    }
    fn from_matched(code: &str) -> Self {
        Self(code.to_owned())
    }
}

impl fmt::Display for BranchCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CommodityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry<C> {
    pub code: C,
    pub name: String,
    pub total: Amount,
}

/// Code → (name, running total), iterated in the order codes were first defined.
/// Redefining a code keeps its original position but takes the new name and starts
/// its total over at zero.
#[derive(Debug, Clone)]
pub(crate) struct Dictionary<C: Code> {
    entries: Vec<Entry<C>>,
    index: HashMap<C, usize>,
}

impl<C: Code> Dictionary<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn insert(&mut self, code: C, name: String) {
        match self.index.get(&code) {
            Some(&i) => {
                let entry = &mut self.entries[i];
                entry.name = name;
                entry.total = 0;
            }
            None => {
                self.index.insert(code.clone(), self.entries.len());
                self.entries.push(Entry {
                    code,
                    name,
                    total: 0,
                });
            }
        }
    }

    /// Position of a raw record field in the dictionary, if it is a known code.
    pub fn position(&self, raw: &str) -> Option<usize> {
        C::parse(raw).and_then(|code| self.index.get(&code).copied())
    }

    pub fn entries(&self) -> &[Entry<C>] {
        &self.entries
    }

    pub fn entry_mut(&mut self, position: usize) -> &mut Entry<C> {
        &mut self.entries[position]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Which dictionaries a run aggregates into. Record files carry one code line per
/// dictionary followed by the amount line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Branch,
    BranchAndCommodity,
}

impl Mode {
    pub fn dictionaries(self) -> usize {
        match self {
            Mode::Branch => 1,
            Mode::BranchAndCommodity => 2,
        }
    }

    /// One code line per dictionary, then the amount.
    pub fn record_arity(self) -> usize {
        self.dictionaries() + 1
    }
}

/// A record file's lines once the line count has been checked; nothing else about
/// the fields is known yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SaleRecord {
    pub file: String,
    pub branch: String,
    pub commodity: Option<String>,
    pub amount: String,
}

/// Anything that aborts a run. Each variant's message is what gets printed to the
/// console, so keep them short.
#[derive(Error, Debug)]
pub enum Error {
    #[error("an unexpected error occurred (usage: {program} <sales directory>)")]
    Invocation { program: String },
    #[error("{kind} definition file does not exist")]
    MissingFile { kind: CodeKind },
    #[error("{kind} definition file has an invalid format (line {line})")]
    InvalidDictionaryFormat { kind: CodeKind, line: usize },
    #[error("<{0}> matches the sales file name pattern but is not a regular file")]
    UnexpectedEntry(String),
    #[error("sales file names are not sequential (<{previous}> is followed by <{next}>)")]
    NonSequentialRecordFiles { previous: String, next: String },
    #[error("<{0}> has an invalid format")]
    InvalidRecordFormat(String),
    #[error("<{0}> has an invalid branch code")]
    UnknownBranchCode(String),
    #[error("<{0}> has an invalid commodity code")]
    UnknownCommodityCode(String),
    #[error("total sales amount exceeded 10 digits ({kind} {code} in <{file}>)")]
    AmountOverflow {
        file: String,
        kind: CodeKind,
        code: String,
    },
    #[error("could not write {file}")]
    Write {
        file: &'static str,
        #[source]
        source: csv::Error,
    },
    #[error("an unexpected error occurred")]
    Unclassified(#[from] Unclassified),
}

/// Failures that are reported with the generic message only; the detail is kept for
/// logging and tests.
#[derive(Error, Debug)]
pub enum Unclassified {
    #[error("<{file}> has a non-numeric amount {amount:?}")]
    NonNumericAmount { file: String, amount: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Unclassified(Unclassified::Io(e))
    }
}
