use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use tracing::info;

use casefinder::bus::{JsonLinesSink, ResultBus};
use casefinder::cli;
use casefinder::discovery::{Discoverer, DiscoveryRequest, SourceMap, UnitLoader};
use casefinder::logging::{self, Verbosity};
use casefinder::CancellationToken;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    args.validate().context("Invalid arguments")?;
    logging::init(Verbosity::from_flags(args.verbose, args.quiet));

    let options = args.options()?;
    let assemblies = UnitLoader::new()
        .load(&args.path)
        .with_context(|| format!("Failed to load units from {}", args.path.display()))?;

    let mut builder = Discoverer::builder();
    if let Some(ref path) = args.source_map {
        let map = SourceMap::load(path)
            .with_context(|| format!("Failed to load source map: {}", path.display()))?;
        builder = builder.with_source_provider(Arc::new(map));
    }
    let discoverer = builder.build();

    let writer: Box<dyn Write + Send> = match args.output_file {
        Some(ref path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Cannot create output file: {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let mut request = DiscoveryRequest::new(options);
    request.type_name = args.type_name.clone();

    let bus = ResultBus::acquire(JsonLinesSink::new(writer).with_stop_after(args.stop_after));
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    ctrlc::set_handler(move || interrupt.cancel()).context("Failed to install interrupt handler")?;
    let mut total = 0;
    for assembly in assemblies {
        let summary = discoverer.find(Arc::new(assembly), &request, &bus, &cancel);
        total += summary.case_count;
        if summary.stopped {
            break;
        }
    }
    bus.shutdown();

    info!(cases = total, "done");
    Ok(())
}
