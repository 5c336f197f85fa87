use std::{
    io::{self, BufWriter, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::Context;
use clap::Parser;
use env_logger::{Builder, Target};
use log::{LevelFilter, debug};
use pktsniffer::{AnyCaptureReader, FilterExpression, Session, SessionError};

#[derive(Parser, Debug)]
#[clap(
    name = "pktsniffer",
    version,
    about = "Prints the decoded headers of the packets in a pcap or pcapng file"
)]
struct SnifferArgs {
    /// The pcap or pcapng file to read
    #[arg(short = 'r', value_name = "FILE")]
    read_file: PathBuf,
    /// Stop after this many matching packets. 0 prints all of them
    #[arg(short = 'c', value_name = "COUNT", default_value_t = 0)]
    count: u64,
    /// Log level for diagnostics on stderr. RUST_LOG takes precedence
    #[arg(long, default_value = "warn")]
    log_level: LevelFilter,
    /// Filter expression, for example `tcp and dst port 80`
    #[arg(value_name = "FILTER", trailing_var_arg = true, allow_hyphen_values = true)]
    filter: Vec<String>,
}

fn setup_logger(level: LevelFilter) {
    Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(Target::Stderr)
        .init();
}

fn run(args: SnifferArgs) -> anyhow::Result<()> {
    let reader = AnyCaptureReader::open(&args.read_file)?;
    let filter = FilterExpression::compile(&args.filter)?;
    debug!("Filter {:?}, count {}", args.filter, args.count);

    let mut out = BufWriter::new(io::stdout().lock());
    let result = Session::new(filter, args.count).run(reader, &mut out);
    match result {
        Ok(_) => Ok(()),
        // The reader of our output went away, e.g. `pktsniffer -r x | head`
        Err(SessionError::Output(err)) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => {
            out.flush().context("failed to write report")?;
            Err(err.into())
        }
    }
}

fn main() -> ExitCode {
    let args = SnifferArgs::parse();
    setup_logger(args.log_level);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
