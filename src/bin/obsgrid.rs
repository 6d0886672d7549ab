//! obsgrid CLI - Command-line interface for the alignment engine
//!
//! Commands:
//! - transform: Align events into the per-second table (batch mode)
//! - validate: Run the pipeline and print the consistency report
//! - doctor: Diagnose pipeline health and configuration
//! - schema: Print input/output schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use obsgrid::ingest::EventAdapter;
use obsgrid::merge::LabelPrecedence;
use obsgrid::pipeline::{AlignedOutput, GridProcessor};
use obsgrid::types::{RawEvent, SecondRecord, SessionLogEntry};
use obsgrid::{CodingScheme, TrackTaxonomy, OBSGRID_VERSION, PRODUCER_NAME};

/// obsgrid - Per-second alignment engine for dual-track observation logs
#[derive(Parser)]
#[command(name = "obsgrid")]
#[command(author = "Motus Observation Lab")]
#[command(version = OBSGRID_VERSION)]
#[command(about = "Align behavioral observation logs into per-second tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align events into the per-second table (batch mode)
    Transform {
        /// Event file path (use - for stdin)
        #[arg(short, long)]
        events: PathBuf,

        /// Session log file path
        #[arg(short, long)]
        log: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "csv")]
        output_format: OutputFormat,

        /// Prefer the posture-track label when both tracks are present
        #[arg(long)]
        posture_first: bool,

        /// Write the consistency report JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run the pipeline and print the consistency report
    Validate {
        /// Event file path (use - for stdin)
        #[arg(short, long)]
        events: PathBuf,

        /// Session log file path
        #[arg(short, long)]
        log: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose pipeline health and configuration
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (events, log, or output)
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one row per line)
    Ndjson,
    /// JSON array of rows
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-delimited table with a header row
    Csv,
    /// Tab-delimited table with a header row
    Tsv,
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Event dataset schema
    Events,
    /// Session log schema
    Log,
    /// Output row schema
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ObsgridCliError> {
    match cli.command {
        Commands::Transform {
            events,
            log,
            output,
            input_format,
            output_format,
            posture_first,
            report,
        } => cmd_transform(
            &events,
            &log,
            &output,
            input_format,
            output_format,
            posture_first,
            report.as_deref(),
        ),

        Commands::Validate {
            events,
            log,
            input_format,
            json,
        } => cmd_validate(&events, &log, input_format, json),

        Commands::Doctor { json } => cmd_doctor(json),

        Commands::Schema { schema_type } => cmd_schema(schema_type),
    }
}

fn cmd_transform(
    events_path: &PathBuf,
    log_path: &PathBuf,
    output: &PathBuf,
    input_format: InputFormat,
    output_format: OutputFormat,
    posture_first: bool,
    report_path: Option<&std::path::Path>,
) -> Result<(), ObsgridCliError> {
    let (events, log) = read_inputs(events_path, log_path, &input_format)?;

    if events.is_empty() {
        return Err(ObsgridCliError::NoEvents);
    }

    let precedence = if posture_first {
        LabelPrecedence::PostureFirst
    } else {
        LabelPrecedence::ActivityFirst
    };
    let processor = GridProcessor::with_precedence(precedence);
    let aligned = processor.process(&events, &log)?;

    if let Some(path) = report_path {
        fs::write(path, serde_json::to_string_pretty(&aligned.report)?)?;
    }

    let output_data = format_records(&aligned.records, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(
    events_path: &PathBuf,
    log_path: &PathBuf,
    input_format: InputFormat,
    json: bool,
) -> Result<(), ObsgridCliError> {
    let (events, log) = read_inputs(events_path, log_path, &input_format)?;

    let aligned = GridProcessor::new().process(&events, &log)?;
    let report = &aligned.report;

    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_report_text(&aligned);
    }

    let findings =
        report.duplicate_seconds.len() + report.gaps.len() + report.span_mismatches.len();
    if findings > 0 {
        Err(ObsgridCliError::ValidationFailed(findings))
    } else {
        Ok(())
    }
}

fn print_report_text(aligned: &AlignedOutput) {
    let report = &aligned.report;
    println!("Consistency Report");
    println!("==================");
    println!("Report id:       {}", report.report_id);
    println!("Sessions:        {}", report.sessions);
    println!("Grid records:    {}", report.records);
    println!("Events in:       {}", aligned.events_in);
    println!("Events unkeyed:  {}", aligned.events_unkeyed);
    println!("Non-codable out: {}", aligned.non_codable_removed);
    println!();
    println!("Duplicate seconds: {}", report.duplicate_seconds.len());
    for dup in &report.duplicate_seconds {
        println!("  - session {} second {} ({}x)", dup.key, dup.second, dup.count);
    }
    println!("Contiguity gaps:   {}", report.gaps.len());
    for gap in &report.gaps {
        println!(
            "  - session {}: {} -> {}",
            gap.key, gap.from_second, gap.to_second
        );
    }
    println!("Span mismatches:   {}", report.span_mismatches.len());
    for span in &report.span_mismatches {
        println!(
            "  - session {}: {} slots, expected {}",
            span.key, span.slots, span.expected
        );
    }
    if let Some(coverage) = &report.coverage {
        println!();
        println!(
            "Coverage min/median/max: {:.4} / {:.4} / {:.4}",
            coverage.min, coverage.median, coverage.max
        );
        println!("Worst-covered sessions:");
        for session in &coverage.worst {
            println!("  - {}: {:.4}", session.key, session.coverage);
        }
    }
}

fn cmd_doctor(json: bool) -> Result<(), ObsgridCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "obsgrid_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("obsgrid version {}", OBSGRID_VERSION),
    });

    let taxonomy = TrackTaxonomy::default();
    checks.push(DoctorCheck {
        name: "taxonomy".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "{} activity prefixes, {} posture prefixes",
            taxonomy.activity_prefixes.len(),
            taxonomy.posture_prefixes.len()
        ),
    });

    let scheme = CodingScheme::default();
    let scheme_status = if scheme.activity_meta.is_empty() || scheme.posture_meta.is_empty() {
        CheckStatus::Error
    } else if scheme.non_codable_behaviors.is_empty() {
        CheckStatus::Warning
    } else {
        CheckStatus::Ok
    };
    checks.push(DoctorCheck {
        name: "coding_scheme".to_string(),
        status: scheme_status,
        message: format!(
            "{} activity labels, {} posture rules, {} posture classes",
            scheme.activity_meta.len(),
            scheme.posture_rules.len(),
            scheme.posture_meta.len()
        ),
    });

    let parallel = cfg!(feature = "parallel");
    checks.push(DoctorCheck {
        name: "parallel".to_string(),
        status: CheckStatus::Ok,
        message: if parallel {
            "session fan-out enabled".to_string()
        } else {
            "sequential session processing".to_string()
        },
    });

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (batch mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: OBSGRID_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("obsgrid Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ObsgridCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType) -> Result<(), ObsgridCliError> {
    match schema_type {
        SchemaType::Events => {
            println!("Event dataset (one row per coded event):");
            println!();
            println!("- observation: structured identifier, e.g. \"AM_3_2_J_FINAL\"");
            println!("  (second segment: subject id, third segment: session index)");
            println!("- behavior: coded behavior label");
            println!("- modifier_1 .. modifier_4: coded modifier labels (optional)");
            println!("- time_relative: session-relative time");
            println!("  (\"H:MM:SS.f\", \"MM:SS.f\", bare seconds; blank/nan/none = missing)");
            println!("- event_kind: \"State start\" | \"State stop\" | \"Point\"");
            println!("  (only state starts are expanded)");
        }
        SchemaType::Log => {
            println!("Session log (one row per observation session):");
            println!();
            println!("- subject: subject id");
            println!("- session: observation session index");
            println!("- start_time: wall-clock start, \"6:43:57 PM\" or \"4:43 PM\" (optional)");
            println!();
            println!("The (subject, session) key must be unique; duplicates abort the run.");
        }
        SchemaType::Output => {
            println!("Output table (one row per session-second after non-codable removal):");
            println!();
            println!("- subject, session: session key");
            println!("- rel_time: relative-time display label");
            println!("- activity_type: coded activity category");
            println!("- posture_waves: coded posture category");
            println!("- intensity: coded intensity category");
            println!("- start_clock: wall-clock display time");
        }
    }

    Ok(())
}

// Helper functions

fn read_inputs(
    events_path: &PathBuf,
    log_path: &PathBuf,
    input_format: &InputFormat,
) -> Result<(Vec<RawEvent>, Vec<SessionLogEntry>), ObsgridCliError> {
    let events_data = read_path(events_path)?;
    let log_data = read_path(log_path)?;

    let events = match input_format {
        InputFormat::Ndjson => EventAdapter::parse_events_ndjson(&events_data)?,
        InputFormat::Json => EventAdapter::parse_events_array(&events_data)?,
    };
    let log = match input_format {
        InputFormat::Ndjson => EventAdapter::parse_log_ndjson(&log_data)?,
        InputFormat::Json => EventAdapter::parse_log_array(&log_data)?,
    };

    Ok((events, log))
}

fn read_path(path: &PathBuf) -> Result<String, ObsgridCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

const TABLE_COLUMNS: [&str; 7] = [
    "subject",
    "session",
    "rel_time",
    "activity_type",
    "posture_waves",
    "intensity",
    "start_clock",
];

fn format_records(
    records: &[SecondRecord],
    format: &OutputFormat,
) -> Result<String, ObsgridCliError> {
    match format {
        OutputFormat::Csv => Ok(format_delimited(records, ',')),
        OutputFormat::Tsv => Ok(format_delimited(records, '\t')),
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::with_capacity(records.len());
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(records)?),
    }
}

fn format_delimited(records: &[SecondRecord], delimiter: char) -> String {
    let mut out = String::new();
    out.push_str(&TABLE_COLUMNS.join(&delimiter.to_string()));
    out.push('\n');

    for record in records {
        let fields = [
            record.subject.to_string(),
            record.session.to_string(),
            record.rel_time.clone().unwrap_or_default(),
            record.activity_type.clone().unwrap_or_default(),
            record.posture_waves.clone().unwrap_or_default(),
            record.intensity.clone().unwrap_or_default(),
            record.start_clock.clone().unwrap_or_default(),
        ];
        let escaped: Vec<String> = fields
            .iter()
            .map(|f| escape_field(f, delimiter))
            .collect();
        out.push_str(&escaped.join(&delimiter.to_string()));
        out.push('\n');
    }

    out
}

fn escape_field(field: &str, delimiter: char) -> String {
    if field.contains(delimiter) || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// Error types

#[derive(Debug)]
enum ObsgridCliError {
    Io(io::Error),
    Pipeline(obsgrid::PipelineError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for ObsgridCliError {
    fn from(e: io::Error) -> Self {
        ObsgridCliError::Io(e)
    }
}

impl From<obsgrid::PipelineError> for ObsgridCliError {
    fn from(e: obsgrid::PipelineError) -> Self {
        ObsgridCliError::Pipeline(e)
    }
}

impl From<serde_json::Error> for ObsgridCliError {
    fn from(e: serde_json::Error) -> Self {
        ObsgridCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ObsgridCliError> for CliError {
    fn from(e: ObsgridCliError) -> Self {
        match e {
            ObsgridCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ObsgridCliError::Pipeline(e) => CliError {
                code: "PIPELINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'obsgrid schema events' for the input shape".to_string()),
            },
            ObsgridCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ObsgridCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure the event file is not empty".to_string()),
            },
            ObsgridCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} consistency findings", count),
                hint: Some("Review the report for affected sessions".to_string()),
            },
            ObsgridCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
