//! Load a PDF and save it again.
//!
//! Usage:
//!   cargo run --release --bin resave -- in.pdf out.pdf
//!   cargo run --release --bin resave -- in.pdf out.pdf --incremental --subset-fonts
//!   cargo run --release --bin resave -- in.pdf out.pdf --version 17 --report

use pdf_creator::document::PdfDocument;
use pdf_creator::io::FileStream;
use pdf_creator::writer::{save_with_options, CreatorOptions, SaveFlags};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

struct ResaveConfig {
    input: PathBuf,
    output: PathBuf,
    flags: SaveFlags,
    version: u32,
    compress: bool,
    report: bool,
}

impl ResaveConfig {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut paths = Vec::new();
        let mut flags = SaveFlags::empty();
        let mut version = 0;
        let mut compress = false;
        let mut report = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--incremental" => flags |= SaveFlags::INCREMENTAL,
                "--no-incremental" => flags |= SaveFlags::NO_INCREMENTAL,
                "--remove-security" => flags |= SaveFlags::REMOVE_SECURITY,
                "--subset-fonts" => flags |= SaveFlags::SUBSET_NEW_FONTS,
                "--compress" => compress = true,
                "--report" => report = true,
                "--version" => {
                    i += 1;
                    version = args
                        .get(i)
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| "--version needs a number such as 17".to_string())?;
                },
                other if other.starts_with("--") => return Err(format!("unknown option {}", other)),
                path => paths.push(PathBuf::from(path)),
            }
            i += 1;
        }

        match <[PathBuf; 2]>::try_from(paths) {
            Ok([input, output]) => Ok(Self {
                input,
                output,
                flags,
                version,
                compress,
                report,
            }),
            Err(_) => Err("expected an input and an output path".to_string()),
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let config = match ResaveConfig::from_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!(
                "Usage: resave <in.pdf> <out.pdf> [--incremental] [--no-incremental] \
                 [--remove-security] [--subset-fonts] [--compress] [--version NN] [--report]"
            );
            return ExitCode::from(2);
        },
    };

    let start = Instant::now();
    let doc = match PdfDocument::open(&config.input) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error opening {}: {}", config.input.display(), e);
            return ExitCode::FAILURE;
        },
    };
    let mut out = match FileStream::create(&config.output) {
        Ok(out) => out,
        Err(e) => {
            eprintln!("Error creating {}: {}", config.output.display(), e);
            return ExitCode::FAILURE;
        },
    };

    let options = CreatorOptions::default()
        .with_version(config.version)
        .with_compress_new_streams(config.compress);
    match save_with_options(&doc, &mut out, config.flags, options) {
        Ok(report) => {
            if config.report {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("Error formatting report: {}", e),
                }
            }
            println!(
                "Saved {} ({} bytes) in {:.1}ms",
                config.output.display(),
                report.file_size,
                start.elapsed().as_secs_f64() * 1000.0
            );
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("Error saving {}: {}", config.output.display(), e);
            ExitCode::FAILURE
        },
    }
}
