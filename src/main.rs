//! Command line front end: inspect, convert and decode SUMP capture files
//!
//! Usage:
//!   sump-decode info capture.sla
//!   sump-decode convert legacy.sla compressed.sla
//!   sump-decode spi capture.sla --sck 0 --miso 1 --mosi 2 --cs 3 --mode 0 --bits 8
//!   sump-decode uart capture.sla --rxd 0 --txd unused --parity even --csv out.csv
//!
//! Set RUST_LOG=debug for decoder diagnostics.

use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use sump::report::{self, Cell, Report};
use sump::{
    BitOrder, Capture, Decoder, LineRole, Parity, ProtocolDecoder, Scheduler, SpiConfig,
    SpiDecoder, SpiMode, StopBits, SumpFile, UartConfig, UartDecoder,
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the header, size and cursor measurement of a capture
    Info {
        /// Capture file
        file: PathBuf,
    },
    /// Re-save a capture in the compressed format
    Convert { input: PathBuf, output: PathBuf },
    /// Decode SPI traffic
    Spi(SpiArgs),
    /// Decode UART traffic
    Uart(UartArgs),
}

/// Decode region and output options shared by the decoders
#[derive(Args, Debug)]
struct DecodeArgs {
    /// Capture file
    file: PathBuf,

    /// Cursor A position; with --cursor-b restricts decoding to the cursors
    #[arg(long, allow_negative_numbers = true)]
    cursor_a: Option<i64>,

    /// Cursor B position
    #[arg(long, allow_negative_numbers = true)]
    cursor_b: Option<i64>,

    /// Ignore cursors stored in the capture file
    #[arg(long)]
    ignore_cursors: bool,

    /// Number of decoded rows to print (0 = all)
    #[arg(short, long, default_value = "50")]
    n: usize,

    /// CSV output file path
    #[arg(long)]
    csv: Option<PathBuf>,

    /// HTML output file path
    #[arg(long)]
    html: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SpiArgs {
    #[command(flatten)]
    decode: DecodeArgs,

    /// SPI clock channel
    #[arg(long, default_value = "0")]
    sck: u8,

    #[arg(long, default_value = "1")]
    miso: u8,

    #[arg(long, default_value = "2")]
    mosi: u8,

    /// Chip select channel (active low)
    #[arg(long, default_value = "3")]
    cs: u8,

    /// Clock mode 0-3
    #[arg(long, default_value = "0")]
    mode: SpiMode,

    /// Bits per word (4-16)
    #[arg(long, default_value = "8")]
    bits: u8,

    /// Bit order: msb or lsb
    #[arg(long, default_value = "msb")]
    order: BitOrder,
}

/// Channel index or `unused`
#[derive(Debug, Clone, Copy)]
struct LineArg(Option<u8>);

impl FromStr for LineArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        sump::decoders::parse_channel(s).map(LineArg)
    }
}

#[derive(Args, Debug)]
struct UartArgs {
    #[command(flatten)]
    decode: DecodeArgs,

    #[arg(long, default_value = "0")]
    rxd: LineArg,

    #[arg(long, default_value = "1")]
    txd: LineArg,

    #[arg(long, default_value = "unused")]
    cts: LineArg,

    #[arg(long, default_value = "unused")]
    rts: LineArg,

    #[arg(long, default_value = "unused")]
    dtr: LineArg,

    #[arg(long, default_value = "unused")]
    dsr: LineArg,

    #[arg(long, default_value = "unused")]
    dcd: LineArg,

    #[arg(long, default_value = "unused")]
    ri: LineArg,

    /// none, odd or even
    #[arg(long, default_value = "none")]
    parity: Parity,

    /// Data bits (5-9)
    #[arg(long, default_value = "8")]
    bits: u8,

    /// Stop bits: 1, 1.5 or 2
    #[arg(long, default_value = "1")]
    stop: StopBits,

    /// Idle-low (inverted) signalling
    #[arg(long)]
    inverted: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Info { file } => show_info(&file),
        Command::Convert { input, output } => {
            let capture = SumpFile::open(&input)?;
            SumpFile::save(&capture, &output)?;
            info!(
                "Wrote {} transitions to {}",
                capture.transition_count(),
                output.display()
            );
            Ok(())
        }
        Command::Spi(args) => {
            let config = SpiConfig::new(args.sck, args.miso, args.mosi, args.cs)
                .with_mode(args.mode)
                .with_bits(args.bits)
                .with_order(args.order);
            info!(
                "SPI: SCK={}, MISO={}, MOSI={}, CS={}",
                config.sck, config.miso, config.mosi, config.cs
            );
            run_decode(&args.decode, SpiDecoder::new(config).into())
        }
        Command::Uart(args) => {
            let config = UartConfig::new(args.rxd.0, args.txd.0)
                .with_line(LineRole::Cts, args.cts.0)
                .with_line(LineRole::Rts, args.rts.0)
                .with_line(LineRole::Dtr, args.dtr.0)
                .with_line(LineRole::Dsr, args.dsr.0)
                .with_line(LineRole::Dcd, args.dcd.0)
                .with_line(LineRole::Ri, args.ri.0)
                .with_parity(args.parity)
                .with_bits(args.bits)
                .with_stop(args.stop)
                .with_inverted(args.inverted);
            info!("UART: RxD={:?}, TxD={:?}", config.rxd, config.txd);
            run_decode(&args.decode, UartDecoder::new(config).into())
        }
    }
}

fn show_info(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let capture = SumpFile::open(file)?;
    let header = capture.header();

    println!("File:              {}", file.display());
    println!("Channels:          {}", header.channels);
    println!("Enabled channels:  {:#010x}", header.enabled_channels);
    match header.sample_rate {
        Some(rate) => println!("Sample rate:       {} Hz", rate),
        None => println!("Sample rate:       unknown"),
    }
    match header.trigger_position {
        Some(trigger) => println!("Trigger position:  {}", trigger),
        None => println!("Trigger position:  none"),
    }
    println!("Samples:           {}", capture.absolute_length());
    println!("Transitions:       {}", capture.transition_count());
    if header.has_timing_data() {
        println!(
            "Duration:          {}",
            report::format_time(capture.absolute_length(), header.sample_rate)
        );
    }

    if capture.cursor_enabled() {
        let m = capture.cursor_measurement();
        println!("Cursor A:          {}", m.a);
        println!("Cursor B:          {}", m.b);
        println!("Distance:          {} samples", m.distance);
        if let Some(duration) = m.duration {
            println!("Duration A-B:      {:.9} s", duration);
        }
        if let Some(frequency) = m.frequency {
            println!("Frequency:         {:.3} Hz", frequency);
        }
    }
    Ok(())
}

fn apply_cursors(capture: &mut Capture, args: &DecodeArgs) {
    if args.ignore_cursors {
        capture.set_cursor_enabled(false);
    }
    match (args.cursor_a, args.cursor_b) {
        (Some(a), Some(b)) => {
            capture.set_cursor_a(a);
            capture.set_cursor_b(b);
            capture.set_cursor_enabled(true);
            info!("Decoding between cursors {} and {}", capture.cursor_a(), capture.cursor_b());
        }
        (None, None) => {}
        _ => warn!("Both --cursor-a and --cursor-b are needed to bound the decode, ignoring"),
    }
}

fn cell_text(cell: &Cell, bits: u8) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Value(value) => format!("0x{:0width$X}", value, width = usize::from(bits).div_ceil(4)),
        Cell::Event(label) => label.clone(),
    }
}

fn run_decode(args: &DecodeArgs, decoder: Decoder) -> Result<(), Box<dyn std::error::Error>> {
    let mut capture = SumpFile::open(&args.file)?;
    apply_cursors(&mut capture, args);
    let sample_rate = capture.sample_rate();
    info!(
        "Loaded {}: {} samples, {} transitions",
        args.file.display(),
        capture.absolute_length(),
        capture.transition_count()
    );

    let capture = Arc::new(RwLock::new(capture));
    let mut scheduler = Scheduler::new();
    let name = decoder.name().to_string();
    let progress = scheduler.start(name, decoder, Arc::clone(&capture));

    let mut logged = 0;
    for percent in progress.iter() {
        if percent / 10 > logged / 10 {
            info!("Progress: {}%", percent);
            logged = percent;
        }
    }

    for (name, result) in scheduler.wait() {
        let decoded = result?;
        let report = Report::new(&decoded, sample_rate);
        let (primary, secondary) = report.columns();

        info!(
            "[{}] {} events, {} symbols, {} errors",
            name,
            decoded.events.len(),
            decoded.stats.symbols,
            decoded.stats.errors
        );
        if let Some(baud) = decoded.stats.baud_rate(sample_rate) {
            info!("[{}] Estimated baud rate: {}", name, baud);
        }

        println!("{:>6}  {:>12}  {:<12}  {:<12}", "index", "time", primary, secondary);
        let rows = report.rows();
        let limit = if args.n == 0 { rows.len() } else { args.n };
        for row in rows.iter().take(limit) {
            println!(
                "{:>6}  {:>12}  {:<12}  {:<12}",
                row.index,
                row.time,
                cell_text(&row.primary, decoded.word_bits),
                cell_text(&row.secondary, decoded.word_bits)
            );
        }
        if rows.len() > limit {
            println!("... {} more", rows.len() - limit);
        }

        if let Some(path) = &args.csv {
            let mut writer = BufWriter::new(File::create(path)?);
            report::write_csv(&report, &mut writer)?;
            info!("CSV output: {}", path.display());
        }
        if let Some(path) = &args.html {
            let mut writer = BufWriter::new(File::create(path)?);
            report::write_html(&report, &mut writer)?;
            info!("HTML output: {}", path.display());
        }
    }

    Ok(())
}
