use marketpipe_core::{InstrumentCatalog, InstrumentRef, SourceKind};
use serde::Serialize;

use crate::cli::{InstrumentsArgs, SourceFilter};
use crate::error::CliError;

use super::{CommandResult, Table};

#[derive(Debug, Serialize)]
struct InstrumentsResponseData<'a> {
    instruments: Vec<&'a InstrumentRef>,
}

pub fn run(args: &InstrumentsArgs, catalog: &InstrumentCatalog) -> Result<CommandResult, CliError> {
    let wanted = args.source.map(|filter| match filter {
        SourceFilter::Scrape => SourceKind::Scrape,
        SourceFilter::Rest => SourceKind::Rest,
    });

    let instruments = catalog
        .all()
        .filter(|instrument| wanted.map_or(true, |source| instrument.source == source))
        .collect::<Vec<_>>();

    let rows = instruments
        .iter()
        .map(|instrument| {
            vec![
                instrument.logical_key.clone(),
                instrument.display_name.clone(),
                instrument.source.to_string(),
                instrument.asset_class.to_string(),
            ]
        })
        .collect();

    let data = serde_json::to_value(InstrumentsResponseData { instruments })?;
    Ok(CommandResult::ok(
        data,
        Table {
            headers: vec!["key", "name", "source", "class"],
            rows,
        },
    ))
}
