use clap::{Parser, ValueEnum};
use grf_storage::encoding::NameEncoding;
use grf_storage::validator::{self, ValidationReport, ValidatorOptions};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "grf-validate",
    about = "Deep filename-encoding validator for GRF archives",
    version,
    long_about = "Walks every decoded filename across a set of GRF archives, classifies \
                  encoding damage (replacement characters, C1 controls, mojibake, roundtrip \
                  failures), reports per-archive health, and emits the path repair mapping \
                  the storage server merges at boot."
)]
struct Cli {
    /// Directory of .grf files, or a DATA.INI manifest
    input: PathBuf,

    /// Cap on entries inspected per archive (0 = all)
    #[arg(long, value_name = "N", default_value_t = 0)]
    read: usize,

    /// Example paths printed per defect category
    #[arg(long, value_name = "N", default_value_t = 5)]
    examples: usize,

    /// Override filename encoding detection
    #[arg(long, value_enum, default_value = "auto")]
    encoding: EncodingArg,

    /// Report output path (default: grf-validation-<timestamp>.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the path repair mapping to this file
    #[arg(short, long)]
    mapping: Option<PathBuf>,

    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "info")]
    log_level: LogLevel,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EncodingArg {
    Auto,
    Utf8,
    Cp949,
    Euckr,
    Latin1,
}

impl EncodingArg {
    fn as_override(self) -> Option<NameEncoding> {
        match self {
            EncodingArg::Auto => None,
            EncodingArg::Utf8 => Some(NameEncoding::Utf8),
            EncodingArg::Cp949 => Some(NameEncoding::Cp949),
            EncodingArg::Euckr => Some(NameEncoding::EucKr),
            EncodingArg::Latin1 => Some(NameEncoding::Latin1),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .init();

    let options = ValidatorOptions {
        read_limit: cli.read,
        examples_limit: cli.examples,
        encoding_override: cli.encoding.as_override(),
        ..ValidatorOptions::default()
    };

    let run = validator::validate(&cli.input, &options)?;

    let output = cli.output.unwrap_or_else(|| {
        let stamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        PathBuf::from(format!("grf-validation-{stamp}.json"))
    });
    let file = std::fs::File::create(&output)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &run.report)?;

    if let Some(mapping) = &cli.mapping {
        run.repair_map.save(mapping)?;
    }

    print_summary(&run.report, &output);
    std::process::exit(run.report.exit_code());
}

fn print_summary(report: &ValidationReport, output: &std::path::Path) {
    for archive in &report.archives {
        println!(
            "{}: {} files, encoding {}, health {:.1}%",
            archive.file,
            archive.total_files,
            archive.detected_encoding,
            archive.health * 100.0
        );
        println!(
            "  U+FFFD {}  C1 {}  mojibake {}  roundtrip: {} raw-fail / {} repairable / {} final-fail",
            archive.bad_ufffd,
            archive.bad_c1,
            archive.mojibake,
            archive.roundtrip_raw_fail,
            archive.roundtrip_repairable,
            archive.roundtrip_final_fail
        );
        for example in &archive.examples.bad_ufffd {
            println!("  U+FFFD   {example}");
        }
        for example in &archive.examples.bad_c1 {
            println!("  C1       {example}");
        }
        for example in &archive.examples.mojibake {
            println!("  mojibake {example}");
        }
        for example in &archive.examples.roundtrip_final_fail {
            println!("  final    {example}");
        }
    }

    for failure in &report.load_failures {
        println!("{}: failed to load: {}", failure.file, failure.error);
    }

    let totals = &report.totals;
    println!(
        "total: {} files across {} archives, health {:.1}%",
        totals.total_files,
        report.archives.len(),
        totals.health * 100.0
    );
    println!("report written to {}", output.display());
}
