//! phptaint — static XSS taint scanner for PHP source trees.
//!
//! Scans a directory for `.php` files, runs the taint analysis pipeline on
//! each, and writes a JSON report of every unsanitized source-to-sink flow.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use phptaint_ir::{find_php_files, scan};

/// Static XSS taint analyzer for PHP.
#[derive(Parser)]
#[command(name = "phptaint", about = "Detect XSS taint flows in PHP sources")]
struct Cli {
    /// Directory to scan.
    dir: PathBuf,

    /// Output file path (default: results-<dirname>.json).
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("phptaint: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let out_path = match &cli.output {
        Some(path) => path.clone(),
        None => {
            let base = cli
                .dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "scan".to_string());
            PathBuf::from(format!("results-{base}.json"))
        }
    };

    let start = Instant::now();
    let files = find_php_files(&cli.dir)?;
    println!("Scanning {} files...", files.len());

    let report = scan(&cli.dir, &files)?;
    let elapsed = start.elapsed();
    println!(
        "Detected {} XSS vulnerabilities in {:.2} seconds.",
        report.total_finding,
        elapsed.as_secs_f64()
    );

    let out = std::fs::File::create(&out_path)?;
    serde_json::to_writer(out, &report)?;
    Ok(())
}
