use std::fs;
use std::path::{Path, PathBuf};

use anima::writer::Writer;
use anima::{log_error, log_info, Anima, DecodeOptions, Logger};
use clap::Parser;
use glob::glob;
use log::LevelFilter;

#[derive(Parser, Debug)]
#[clap(name = "anima")]
struct Cli {
    #[arg(required = true, help = "Input file or glob pattern")]
    path: String,

    #[arg(short, long, value_parser = ["pam", "ppm"], help = "Output format")]
    format: Option<String>,

    #[arg(short = 'o', long = "output-dir", help = "Output directory for converted files")]
    output_dir: Option<String>,

    #[arg(long, help = "Print container metadata as JSON")]
    info: bool,

    #[arg(long, help = "Decode the image without writing to a file")]
    void: bool,

    #[arg(long, help = "Verify CRCs and treat corrupt image data as an error")]
    strict: bool,

    #[arg(short, long, help = "Print debug diagnostics")]
    verbose: bool,
}

fn get_files(path: &str) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let absolute_pattern = if Path::new(path).is_relative() {
        base_dir.join(path).to_string_lossy().into_owned()
    } else {
        path.to_string()
    };

    for entry in glob(&absolute_pattern)? {
        match entry {
            Ok(path) => {
                if !path.is_file() {
                    continue;
                }

                files.push(path);
            }
            Err(e) => log_error!("{}", e),
        }
    }

    Ok(files)
}

fn get_output_path(file: &Path, output_dir: Option<&str>, format: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let file_stem = file
        .file_stem()
        .ok_or("Invalid file name")?
        .to_str()
        .ok_or("Invalid file stem")?;

    let output_path = if let Some(dir) = output_dir {
        let output_dir = Path::new(dir);

        if !output_dir.exists() {
            fs::create_dir_all(output_dir)?;
        }

        let output_dir = if output_dir.is_relative() {
            std::env::current_dir()?.join(output_dir)
        } else {
            output_dir.to_path_buf()
        };

        output_dir.join(format!("{}.{}", file_stem, format))
    } else {
        // Next to the input file
        file.parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{}.{}", file_stem, format))
    };

    Ok(output_path)
}

fn process_file(file: &Path, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    log_info!("File: {}", file.display());

    let options = if cli.strict {
        DecodeOptions::strict()
    } else {
        DecodeOptions::lenient()
    };

    let decoder = Anima::open(file)?.with_options(options);

    if cli.info {
        let info = decoder.get_info()?;
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let animation = decoder.decode()?;

    log_info!(
        "Decoded {:?} {}x{}, {} frame(s), {} ms",
        decoder.get_format(),
        animation.width(),
        animation.height(),
        animation.num_frames(),
        animation.duration_ms()
    );

    if cli.void {
        return Ok(());
    }

    let format = cli.format.as_deref().unwrap_or("pam");
    let output_path = get_output_path(file, cli.output_dir.as_deref(), format)?;

    if let Some(parent) = output_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    for path in Writer::write_frames(&output_path, &animation)? {
        log_info!("Written: {}", path.display());
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    Logger::init(level)?;

    let files = get_files(&cli.path)?;

    if files.is_empty() {
        log_error!("No files found matching: {}", cli.path);
        std::process::exit(1);
    }

    for file in &files {
        if let Err(e) = process_file(file, &cli) {
            log_error!("Error processing {}: {}", file.display(), e);
        }
    }

    Ok(())
}
