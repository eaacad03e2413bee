use anyhow::Result;
use clap::Parser;
use indicatif::ProgressBar;
use photokepler::photokepler_core::export::progress_style;
use photokepler::photokepler_core::{
    Cli, ExportError, ExportSummary, PhotoSource, PhotosLibrary, export_records,
};
use simplelog::{CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, WriteLogger};
use std::fs::File;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: could not initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(summary) => {
            println!(
                "Metadata extracted and reformatted to {}",
                summary.output.display()
            );
            println!(
                "  {} of {} photos written, {} skipped (missing date or location)",
                summary.rows_written, summary.photos_found, summary.skipped
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            report_failure(&cli, &e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Warn,
        Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )];

    if cli.log {
        loggers.push(WriteLogger::new(
            cli.log_level,
            Config::default(),
            File::create("photokepler.log")?,
        ));
    }

    CombinedLogger::init(loggers)?;
    Ok(())
}

fn run(cli: &Cli) -> Result<ExportSummary, ExportError> {
    println!("Accessing photos db...");
    let mut library = PhotosLibrary::open(&cli.library_path, cli.library_options())?;
    let records = library.photos()?;
    println!("{} photos found...", records.len());

    println!("Processing...");
    let bar = ProgressBar::new(0).with_style(progress_style());
    export_records(records, &cli.export_options(), &bar)
}

fn report_failure(cli: &Cli, error: &ExportError) {
    match error {
        ExportError::Write { path, .. } => {
            eprintln!("Error: Could not write metadata to '{}'.", path.display());
        }
        _ => {
            let path = error.path().unwrap_or(&cli.library_path);
            eprintln!("Error: Could not access Photos library at '{}'.", path.display());
        }
    }
    eprintln!("Details: {}", error.details());
    eprintln!();
    eprintln!("Usage: photokepler [--extended] <path_to_photos_library>");
    eprintln!("Example: photokepler ~/Pictures/\"Photos Library.photoslibrary\"");
    eprintln!("Example: photokepler --extended ~/Pictures/\"Photos Library.photoslibrary\"");
}
