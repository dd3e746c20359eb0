//! isdb-si-dump: print the PSI/SI tables of an ISDB-T transport stream.
//!
//! Reads a TS file (or stdin) until every table needed to describe the
//! channel has arrived, then prints PAT/PMT/CAT/NIT/SDT/EIT/TOT.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use isdb_si::{HeaderCheck, ServiceInformation, SiConfig};
use log::{debug, info, warn};

mod error;
mod reader;
mod report;

use error::DumpError;
use reader::PacketReader;

const DEFAULT_CONFIG_FILE: &str = "isdb-si-dump.toml";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// isdb-si-dump - Dump ISDB-T PSI/SI tables from a transport stream
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input TS file ("-" or omitted reads stdin)
    input: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Keep reading to the end of input even after all tables are complete
    #[arg(short, long)]
    all: bool,

    /// Give up after this many seconds (0 disables the timeout)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Also wait for a CAT with at least one EMM entry
    #[arg(short = 'c', long)]
    wait_cat: bool,

    /// Skip CRC-32 verification
    #[arg(long)]
    no_crc: bool,

    /// Accept sections whose fixed header bits are wrong
    #[arg(long)]
    permissive: bool,

    /// Configuration file path
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Configuration file format.
#[derive(Debug, serde::Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    decoder: SiConfig,
    #[serde(default)]
    dump: DumpSection,
}

#[derive(Debug, serde::Deserialize, Default)]
struct DumpSection {
    timeout: Option<u64>,
    json: Option<bool>,
    all: Option<bool>,
}

/// Why reading stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Complete,
    EndOfInput,
    Timeout,
    Interrupted,
}

impl StopReason {
    fn name(self) -> &'static str {
        match self {
            StopReason::Complete => "complete",
            StopReason::EndOfInput => "end of input",
            StopReason::Timeout => "timed out",
            StopReason::Interrupted => "interrupted",
        }
    }
}

fn load_config(path: &Path) -> Result<ConfigFile, DumpError> {
    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents).map_err(|source| DumpError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Decoder settings: config file first, command line on top.
fn decoder_config(args: &Args, file: &ConfigFile) -> SiConfig {
    let mut config = file.decoder.clone();
    if args.no_crc {
        config.verify_crc = false;
    }
    if args.permissive {
        config.header_check = HeaderCheck::Permissive;
    }
    if args.wait_cat {
        config.require_cat = true;
    }
    config
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>, DumpError> {
    match path {
        Some(path) if path != Path::new("-") => {
            debug!("Reading {}", path.display());
            Ok(Box::new(File::open(path)?))
        }
        _ => {
            debug!("Reading stdin");
            Ok(Box::new(io::stdin().lock()))
        }
    }
}

fn collect<R: Read>(
    reader: &mut PacketReader<R>,
    si: &mut ServiceInformation,
    until_eof: bool,
    deadline: Option<Instant>,
    stop: &AtomicBool,
) -> Result<StopReason, DumpError> {
    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(StopReason::Interrupted);
        }
        if deadline.map_or(false, |d| Instant::now() >= d) {
            return Ok(StopReason::Timeout);
        }
        let Some(packet) = reader.read_packet()? else {
            return Ok(StopReason::EndOfInput);
        };
        si.feed(&packet);
        if !until_eof && si.is_complete() {
            return Ok(StopReason::Complete);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "warn" }),
    )
    .init();

    // Load config file: explicit path > auto-detect > default
    let config_path = args.config.clone().or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Some(default_path)
        } else {
            None
        }
    });
    let file_config = if let Some(config_path) = &config_path {
        match load_config(config_path) {
            Ok(c) => {
                eprintln!("Loaded config from: {}", config_path.display());
                c
            }
            Err(e) => {
                eprintln!("Failed to load config file: {}", e);
                return Err(e.into());
            }
        }
    } else {
        ConfigFile::default()
    };

    let config = decoder_config(&args, &file_config);
    let json = args.json || file_config.dump.json.unwrap_or(false);
    let until_eof = args.all || file_config.dump.all.unwrap_or(false);
    let timeout = args
        .timeout
        .or(file_config.dump.timeout)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    debug!("{:?} timeout={}s", config, timeout);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)) {
            warn!("Failed to install Ctrl-C handler: {}", e);
        }
    }

    let deadline = (timeout > 0).then(|| Instant::now() + Duration::from_secs(timeout));
    let mut reader = PacketReader::new(open_input(args.input.as_deref())?);
    let mut si = ServiceInformation::new(config);
    let reason = collect(&mut reader, &mut si, until_eof, deadline, &stop)?;
    info!(
        "Stopped ({}): {} packets, {} bytes skipped",
        reason.name(),
        reader.packets(),
        reader.skipped()
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        report::write_json(&mut out, &si)?;
    } else {
        report::write_text(&mut out, &si)?;
    }
    out.flush()?;

    if !si.is_complete() {
        return Err(DumpError::Incomplete(reason.name()).into());
    }
    Ok(())
}
