use crate::{
    data::{
        Amount, BranchCode, Code, CommodityCode, Dictionary, Error, Mode, SaleRecord,
        Unclassified, AMOUNT_CEILING,
    },
    read::RecordUser,
};
use log::debug;

/// Running totals for one run. Built from the loaded dictionaries and only ever
/// mutated by `use_record`.
#[derive(Debug)]
pub(crate) struct Ledger {
    pub branches: Dictionary<BranchCode>,
    pub commodities: Option<Dictionary<CommodityCode>>,
}

impl Ledger {
    pub fn new(
        branches: Dictionary<BranchCode>,
        commodities: Option<Dictionary<CommodityCode>>,
    ) -> Self {
        Self {
            branches,
            commodities,
        }
    }

    pub fn mode(&self) -> Mode {
        match self.commodities {
            Some(_) => Mode::BranchAndCommodity,
            None => Mode::Branch,
        }
    }
}

/// Digits only, at least one of them. A digit string too long for `Amount` is
/// certainly over the ceiling.
fn parse_amount(record: &SaleRecord) -> Result<Amount, Error> {
    let raw = &record.amount;
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Unclassified::NonNumericAmount {
            file: record.file.clone(),
            amount: raw.clone(),
        }
        .into());
    }
    Ok(raw.parse().unwrap_or(Amount::MAX))
}

/// What `position`'s total would become after adding `amount`, or the overflow error.
fn next_total<C: Code>(
    dictionary: &Dictionary<C>,
    position: usize,
    amount: Amount,
    file: &str,
) -> Result<Amount, Error> {
    let entry = &dictionary.entries()[position];
    match entry.total.checked_add(amount) {
        Some(total) if total < AMOUNT_CEILING => Ok(total),
        _ => Err(Error::AmountOverflow {
            file: file.to_owned(),
            kind: C::KIND,
            code: entry.code.to_string(),
        }),
    }
}

/// Checks run in record order: branch, commodity, then amount. Every new total is
/// computed and checked before any of them is stored, so a failing record leaves
/// the ledger untouched.
impl RecordUser for Ledger {
    fn use_record(&mut self, record: SaleRecord) -> Result<(), Error> {
        let branch = self
            .branches
            .position(&record.branch)
            .ok_or_else(|| Error::UnknownBranchCode(record.file.clone()))?;
        // a record without a commodity line can't name a known commodity
        let commodity = match &self.commodities {
            Some(commodities) => Some(
                commodities
                    .position(record.commodity.as_deref().unwrap_or_default())
                    .ok_or_else(|| Error::UnknownCommodityCode(record.file.clone()))?,
            ),
            None => None,
        };
        let amount = parse_amount(&record)?;

        let branch_total = next_total(&self.branches, branch, amount, &record.file)?;
        let commodity_total = match (&self.commodities, commodity) {
            (Some(commodities), Some(position)) => Some((
                position,
                next_total(commodities, position, amount, &record.file)?,
            )),
            _ => None,
        };

        self.branches.entry_mut(branch).total = branch_total;
        if let (Some(commodities), Some((position, total))) =
            (&mut self.commodities, commodity_total)
        {
            commodities.entry_mut(position).total = total;
        }
        debug!("{}: +{amount}", record.file);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Ledger;
    use crate::{
        data::{BranchCode, Code, CodeKind, CommodityCode, Dictionary, Error, SaleRecord, Unclassified},
        read::RecordUser,
    };

    fn branches() -> Dictionary<BranchCode> {
        let mut dict = Dictionary::new();
        for (code, name) in [("001", "Sapporo"), ("002", "Sendai"), ("123", "Tokyo")] {
            dict.insert(BranchCode::parse(code).unwrap(), name.into());
        }
        dict
    }

    fn commodities() -> Dictionary<CommodityCode> {
        let mut dict = Dictionary::new();
        for (code, name) in [("SFT00001", "OS"), ("SFT00002", "Office")] {
            dict.insert(CommodityCode::parse(code).unwrap(), name.into());
        }
        dict
    }

    fn record(file: &str, branch: &str, amount: &str) -> SaleRecord {
        SaleRecord {
            file: file.into(),
            branch: branch.into(),
            commodity: None,
            amount: amount.into(),
        }
    }

    fn dual(file: &str, branch: &str, commodity: &str, amount: &str) -> SaleRecord {
        SaleRecord {
            commodity: Some(commodity.into()),
            ..record(file, branch, amount)
        }
    }

    fn totals<C: Code>(dict: &Dictionary<C>) -> Vec<u64> {
        dict.entries().iter().map(|e| e.total).collect()
    }

    #[test]
    fn test_fold() {
        let mut ledger = Ledger::new(branches(), None);
        ledger.use_record(record("00000001.rcd", "001", "100")).unwrap();
        ledger.use_record(record("00000002.rcd", "123", "7")).unwrap();
        ledger.use_record(record("00000003.rcd", "001", "0")).unwrap();
        ledger.use_record(record("00000004.rcd", "001", "0050")).unwrap();
        assert_eq!(totals(&ledger.branches), [150, 0, 7]);
    }

    #[test]
    fn test_fold_dual() {
        let mut ledger = Ledger::new(branches(), Some(commodities()));
        ledger
            .use_record(dual("00000001.rcd", "001", "SFT00002", "100"))
            .unwrap();
        ledger
            .use_record(dual("00000002.rcd", "002", "SFT00002", "5"))
            .unwrap();
        assert_eq!(totals(&ledger.branches), [100, 5, 0]);
        assert_eq!(totals(ledger.commodities.as_ref().unwrap()), [0, 105]);
    }

    #[test]
    fn test_unknown_branch() {
        let mut ledger = Ledger::new(branches(), None);
        for bad in ["999", "01", "1", ""] {
            assert!(matches!(
                ledger.use_record(record("00000001.rcd", bad, "100")),
                Err(Error::UnknownBranchCode(f)) if f == "00000001.rcd"
            ));
        }
        // reported even when the amount is garbage too
        assert!(matches!(
            ledger.use_record(record("00000001.rcd", "999", "abc")),
            Err(Error::UnknownBranchCode(_))
        ));
    }

    #[test]
    fn test_unknown_commodity() {
        let mut ledger = Ledger::new(branches(), Some(commodities()));
        assert!(matches!(
            ledger.use_record(dual("00000003.rcd", "001", "SFT99999", "100")),
            Err(Error::UnknownCommodityCode(f)) if f == "00000003.rcd"
        ));
        assert!(matches!(
            ledger.use_record(dual("00000003.rcd", "999", "SFT99999", "100")),
            Err(Error::UnknownBranchCode(_))
        ));
        assert_eq!(totals(&ledger.branches), [0, 0, 0]);
    }

    #[test]
    fn test_non_numeric_amount() {
        let mut ledger = Ledger::new(branches(), None);
        for bad in ["12a", "-5", "1,000", " 5", "1.5", ""] {
            assert!(
                matches!(
                    ledger.use_record(record("00000001.rcd", "001", bad)),
                    Err(Error::Unclassified(Unclassified::NonNumericAmount { .. }))
                ),
                "{bad:?} accepted"
            );
        }
        assert_eq!(totals(&ledger.branches), [0, 0, 0]);
    }

    #[test]
    fn test_overflow_at_ceiling() {
        let mut ledger = Ledger::new(branches(), None);
        ledger
            .use_record(record("00000001.rcd", "123", "4000000000"))
            .unwrap();
        ledger
            .use_record(record("00000002.rcd", "123", "4000000000"))
            .unwrap();
        match ledger.use_record(record("00000003.rcd", "123", "2000000000")) {
            Err(Error::AmountOverflow { file, kind, code }) => {
                assert_eq!(file, "00000003.rcd");
                assert_eq!(kind, CodeKind::Branch);
                assert_eq!(code, "123");
            }
            other => panic!("unexpected {other:?}"),
        }
        // the failing addition was never stored
        assert_eq!(totals(&ledger.branches), [0, 0, 8_000_000_000]);
    }

    #[test]
    fn test_just_below_ceiling() {
        let mut ledger = Ledger::new(branches(), None);
        ledger
            .use_record(record("00000001.rcd", "001", "9999999999"))
            .unwrap();
        assert_eq!(totals(&ledger.branches), [9_999_999_999, 0, 0]);
    }

    #[test]
    fn test_huge_amount() {
        let mut ledger = Ledger::new(branches(), None);
        assert!(matches!(
            ledger.use_record(record("00000001.rcd", "001", "123456789012345678901234567890")),
            Err(Error::AmountOverflow { .. })
        ));
    }

    #[test]
    fn test_commodity_overflow_commits_nothing() {
        let mut ledger = Ledger::new(branches(), Some(commodities()));
        ledger
            .use_record(dual("00000001.rcd", "001", "SFT00001", "6000000000"))
            .unwrap();
        assert!(matches!(
            ledger.use_record(dual("00000002.rcd", "002", "SFT00001", "6000000000")),
            Err(Error::AmountOverflow {
                kind: CodeKind::Commodity,
                ..
            })
        ));
        // branch 002 had room, but its addition must not survive either
        assert_eq!(totals(&ledger.branches), [6_000_000_000, 0, 0]);
        assert_eq!(
            totals(ledger.commodities.as_ref().unwrap()),
            [6_000_000_000, 0]
        );
    }

    #[test]
    fn test_missing_commodity_line() {
        let mut ledger = Ledger::new(branches(), Some(commodities()));
        assert!(matches!(
            ledger.use_record(record("00000001.rcd", "001", "5")),
            Err(Error::UnknownCommodityCode(f)) if f == "00000001.rcd"
        ));
        assert_eq!(totals(&ledger.branches), [0, 0, 0]);
    }

    #[test]
    fn test_commodity_line_ignored_without_commodities() {
        let mut ledger = Ledger::new(branches(), None);
        ledger
            .use_record(dual("00000001.rcd", "002", "SFT99999", "5"))
            .unwrap();
        assert_eq!(totals(&ledger.branches), [0, 5, 0]);
    }

    #[test]
    fn test_arity_follows_dictionaries() {
        let single = Ledger::new(branches(), None).mode();
        let dual = Ledger::new(branches(), Some(commodities())).mode();
        assert_eq!(single.record_arity(), single.dictionaries() + 1);
        assert_eq!((single.record_arity(), dual.record_arity()), (2, 3));
    }
}
