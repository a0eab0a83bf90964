//! ts2mpa - extracts the MPEG audio elementary stream carried in a transport stream file.

use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::process;
use ts2mpa::demultiplex::{CancellationToken, Demultiplex, DemuxOptions, StopReason};
use ts2mpa::packet::Pid;
use ts2mpa::pes::PesHeader;

/// Extract an MPEG audio elementary stream from an MPEG Transport Stream
#[derive(Parser, Debug)]
#[command(name = "ts2mpa", version, about)]
struct Cli {
    /// Transport stream file to read
    infile: PathBuf,

    /// File to write the MPEG audio elementary stream to
    outfile: PathBuf,

    /// Extract from this PID (decimal, or hex with 0x prefix) instead of the first audio PID found
    #[arg(short, long, value_parser = parse_pid)]
    pid: Option<Pid>,

    /// Extract this PES stream id (0xc0 to 0xdf) instead of the first one found
    #[arg(short, long, value_parser = parse_stream_id)]
    stream_id: Option<u8>,

    /// Only report errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Report sniffing decisions and timestamps as well
    #[arg(short, long)]
    verbose: bool,
}

fn parse_number(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("'{}' is not a number: {}", s, e))
}

fn parse_pid(s: &str) -> Result<Pid, String> {
    let value = parse_number(s)?;
    match u16::try_from(value).ok().and_then(|v| Pid::try_from(v).ok()) {
        Some(pid) if !pid.is_stuffing() => Ok(pid),
        _ => Err(format!("PID must be in the range 0 to {:#x}", Pid::MAX_VALUE - 1)),
    }
}

fn parse_stream_id(s: &str) -> Result<u8, String> {
    let value = parse_number(s)?;
    match u8::try_from(value) {
        Ok(id) if PesHeader::is_mpeg_audio(id) => Ok(id),
        _ => Err("stream id must be in the range 0xc0 to 0xdf".to_string()),
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.quiet {
        "off"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let input = match File::open(&cli.infile) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Could not open {}: {}", cli.infile.display(), e);
            process::exit(1);
        }
    };
    let output = match File::create(&cli.outfile) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Could not create {}: {}", cli.outfile.display(), e);
            process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    let handler = move || {
        log::warn!("received signal, aborting");
        handler_token.cancel();
    };
    if let Err(e) = ctrlc::set_handler(handler) {
        log::warn!("Could not install signal handler: {}", e);
    }

    let options = DemuxOptions {
        pid: cli.pid,
        stream_id: cli.stream_id,
    };
    let mut demux = Demultiplex::new(options);
    let report = match demux.run(input, output, &cancel) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if !cli.quiet {
        if report.reason == StopReason::Cancelled {
            eprintln!("Interrupted");
        }
        eprintln!("Packets processed: {}", report.packets);
        eprintln!("Total written: {} bytes", report.bytes_written);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pid_arguments() {
        assert_eq!(parse_pid("100"), Ok(Pid::new(100)));
        assert_eq!(parse_pid("0x1b4"), Ok(Pid::new(0x1b4)));
        assert_eq!(parse_pid("0x1ffe"), Ok(Pid::new(0x1ffe)));
        assert!(parse_pid("0x1fff").is_err());
        assert!(parse_pid("70000").is_err());
        assert!(parse_pid("audio").is_err());
    }

    #[test]
    fn stream_id_arguments() {
        assert_eq!(parse_stream_id("0xc0"), Ok(0xc0));
        assert_eq!(parse_stream_id("223"), Ok(0xdf));
        assert!(parse_stream_id("0xe0").is_err());
        assert!(parse_stream_id("0x1c0").is_err());
    }

    #[test]
    fn command_line() {
        let cli = Cli::try_parse_from(["ts2mpa", "-p", "0x44", "-q", "in.ts", "out.mp2"]).unwrap();
        assert_eq!(cli.pid, Some(Pid::new(0x44)));
        assert!(cli.quiet);
        assert_eq!(cli.outfile, PathBuf::from("out.mp2"));
        assert!(Cli::try_parse_from(["ts2mpa", "-q", "-v", "in.ts", "out.mp2"]).is_err());
        assert!(Cli::try_parse_from(["ts2mpa", "in.ts"]).is_err());
    }
}
