use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use leo_visibility::tle::{self, TleLoader};
use leo_visibility::{Pipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "leo-visibility")]
#[command(about = "LEO satellite visibility from TLEs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a TLE file (text or JSON) or a folder of them
    Validate { tles: PathBuf },
    /// Print the epoch of a TLE line 1
    Epoch { line1: String },
    /// Propagate a TLE batch and classify visibility from the observer
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        tles: PathBuf,
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { tles } => validate(tles),
        Commands::Epoch { line1 } => epoch(&line1),
        Commands::Run {
            config,
            tles,
            output,
        } => run(config, tles, output),
    }
}

fn validate(path: PathBuf) -> ExitCode {
    let report = match TleLoader::new(path).load() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error reading TLEs: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!(
        "{} valid, {} dropped",
        report.records.len(),
        report.dropped.len()
    );
    for record in &report.records {
        println!(
            "  {} {:<24} epoch {}",
            record.satellite_id, record.name, record.epoch
        );
    }
    for dropped in &report.dropped {
        println!(
            "  dropped {} ({}): {}",
            dropped.identifier, dropped.source, dropped.reason
        );
    }

    if report.dropped.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn epoch(line1: &str) -> ExitCode {
    match tle::resolve(line1) {
        Ok(epoch) => {
            println!("{}", epoch);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: PathBuf, tles: PathBuf, output: Option<PathBuf>) -> ExitCode {
    let config = match PipelineConfig::from_file(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let pipeline = match Pipeline::new(config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match pipeline.run_path(tles) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Run failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let written = match output {
        Some(path) => result.write(&path).map(|_| log::info!("Wrote {}", path.display())),
        None => result.to_json().map(|json| println!("{}", json)),
    };
    if let Err(e) = written {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
