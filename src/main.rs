use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hashlookup_importer::cli::{Cli, Output, EXIT_CONFIG, EXIT_SINK};
use hashlookup_importer::import::{FileFailure, FileOutcome, ImportEvent};
use hashlookup_importer::{
    ImportOptions, ImportSession, JsonLinesSink, MemorySink, RecordSink, SessionConfig,
};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(Cli::parse_error_status(&err));
        }
    };
    init_tracing(cli.verbose);

    // Nothing under the root is touched before this succeeds
    let (options, output) = match cli.resolve() {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Error: {e}\n");
            if e.is_config() {
                eprint!("{}", Cli::usage());
            }
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match run(options, output) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(options: ImportOptions, output: Output) -> Result<ExitCode> {
    let session = SessionConfig::from_options(&options);
    match output {
        Output::DryRun => {
            tracing::warn!("dry run: records are kept in memory and discarded at exit");
            execute(options, MemorySink::new(session))
        }
        Output::JsonLines(path) => {
            let sink = JsonLinesSink::open(&path, session)
                .with_context(|| format!("opening output {}", path.display()))?;
            execute(options, sink)
        }
    }
}

fn execute<S: RecordSink>(options: ImportOptions, sink: S) -> Result<ExitCode> {
    let verbose = options.verbose;
    if verbose {
        println!("{}", sink.version());
    }

    let mut session = ImportSession::new(options, sink)?;
    let summary = session.run_with(|event| match event {
        ImportEvent::Importing(path) => println!("{}", path.display()),
        ImportEvent::Finished(_, FileOutcome::Submitted(result)) if verbose => {
            println!("{result}");
        }
        ImportEvent::Finished(_, FileOutcome::Failed(FileFailure::Sink(err))) if verbose => {
            println!("{err}");
        }
        ImportEvent::Finished(..) => {}
    });

    if verbose {
        println!(
            "Imported {} file(s), {} skipped, {} unreadable, {} rejected by sink ({} bytes in {:.2}s)",
            summary.submitted,
            summary.skipped,
            summary.access_failures,
            summary.sink_failures,
            summary.total_bytes,
            summary.duration.as_secs_f64()
        );
    }

    if summary.has_sink_failures() {
        eprintln!(
            "Error: {} record(s) were not accepted by the sink",
            summary.sink_failures
        );
        return Ok(ExitCode::from(EXIT_SINK));
    }
    Ok(ExitCode::SUCCESS)
}
