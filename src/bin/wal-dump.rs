//! WAL dump tool
//!
//! Prints the header and every instruction of a single log file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mapwal::volume::{FileVolume, Volume};
use mapwal::wal::{FileHeader, Instruction, WalReader};
use tracing_subscriber::{fmt, EnvFilter};

/// Inspect a mapwal log file
#[derive(Parser, Debug)]
#[command(name = "wal-dump")]
#[command(about = "Print the instructions stored in a WAL file")]
#[command(version)]
struct Args {
    /// Log file to read, e.g. store.wal.0
    path: PathBuf,

    /// Index reported in corruption errors
    #[arg(short, long, default_value = "0")]
    file_index: usize,

    /// Only print the file header
    #[arg(long)]
    header_only: bool,

    /// Print payload bytes of byte arrays and records
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mapwal=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match dump(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn dump(args: &Args) -> mapwal::Result<()> {
    let volume = FileVolume::open_read_only(&args.path)?;

    let Some(header) = FileHeader::read(&volume)? else {
        println!("{}: {} bytes, too short for a header", args.path.display(), volume.length());
        return Ok(());
    };

    println!("file:     {}", args.path.display());
    println!("length:   {}", volume.length());
    println!(
        "header:   {:#010x} (magic {}, version {})",
        header.header,
        if header.has_valid_magic() { "ok" } else { "BAD" },
        header.version()
    );
    if header.is_sealed() {
        println!("state:    sealed");
    } else {
        println!("state:    open (features {:#x})", header.slot);
    }

    if args.header_only {
        return Ok(());
    }

    for entry in WalReader::new(&volume, args.file_index) {
        let entry = entry?;
        let detail = match &entry.instruction {
            Instruction::Eof => "EOF".to_string(),
            Instruction::Long { offset, value } => format!("LONG offset={} value={}", offset, value),
            Instruction::ByteArray { offset, data } => {
                format!("BYTE_ARRAY offset={} len={}{}", offset, data.len(), payload(args, data))
            }
            Instruction::SkipMany { len } => format!("SKIP_MANY len={}", len),
            Instruction::SkipSingle => "SKIP_SINGLE".to_string(),
            Instruction::Record { record_id, data: None } => {
                format!("RECORD id={} null", record_id)
            }
            Instruction::Record { record_id, data: Some(data) } => {
                format!("RECORD id={} len={}{}", record_id, data.len(), payload(args, data))
            }
            Instruction::Tombstone { record_id } => format!("TOMBSTONE id={}", record_id),
        };
        println!("{:>10} +{:<6} {}", entry.offset, entry.len, detail);
    }
    Ok(())
}

fn payload(args: &Args, data: &[u8]) -> String {
    if args.verbose {
        format!(" data={:02x?}", data)
    } else {
        String::new()
    }
}
