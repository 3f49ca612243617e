use crate::{
    compute::Ledger,
    data::{Amount, Code, Dictionary, Error},
};
use log::info;
use serde::Serialize;
use std::path::Path;

/// One summary line: `code,name,total`.
#[derive(Serialize)]
struct SummaryLine<'a> {
    code: &'a str,
    name: &'a str,
    total: Amount,
}

/// Basic CSV exporter for a `Dictionary`, in definition order, without header or
/// quoting.
pub(crate) fn write_summary<W: std::io::Write, C: Code>(
    writer: W,
    dictionary: &Dictionary<C>,
) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(writer);
    for entry in dictionary.entries() {
        wtr.serialize(SummaryLine {
            code: entry.code.as_str(),
            name: &entry.name,
            total: entry.total,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Creates (or truncates) `C::OUT_FILE` in `dir`. A failure part way through leaves
/// whatever was written.
pub(crate) fn write_summary_file<C: Code>(
    dir: &Path,
    dictionary: &Dictionary<C>,
) -> Result<(), Error> {
    let path = dir.join(C::OUT_FILE);
    let wrap = |source: csv::Error| Error::Write {
        file: C::OUT_FILE,
        source,
    };
    let file = std::fs::File::create(&path).map_err(|e| wrap(e.into()))?;
    write_summary(file, dictionary).map_err(wrap)?;
    info!("wrote {} {} totals to {}", dictionary.len(), C::KIND, path.display());
    Ok(())
}

/// Branch summary first; the commodity summary is only attempted once that succeeded.
pub(crate) fn write_summaries(dir: &Path, ledger: &Ledger) -> Result<(), Error> {
    write_summary_file(dir, &ledger.branches)?;
    if let Some(commodities) = &ledger.commodities {
        write_summary_file(dir, commodities)?;
    }
    Ok(())
}
