//! Cadastro CLI - validate customer intake spreadsheets
//!
//! # Main Commands
//!
//! ```bash
//! cadastro run dados.xlsx sistema.xlsx    # Full pipeline, writes dados-*.json and dados_descartados-*.xlsx
//! cadastro serve                          # Start HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! cadastro validate dados.xlsx            # Field checks only, failing rows listed
//! cadastro parse dados.csv                # Dump raw rows as JSON
//! ```

use cadastro::{
    check_file, process_files, read_table, Check, FieldValidator, ProcessOptions, RejectedFormat,
    ViaCepClient,
};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cadastro")]
#[command(about = "Validate and reconcile customer intake spreadsheets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: validate, reconcile, write payload and rejected sheet
    Run {
        /// Intake spreadsheet (xlsx, xls, ods or csv)
        incoming: PathBuf,

        /// System-of-record export
        system: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Run date, YYYY-MM-DD (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        /// Write rejected records as CSV instead of XLSX
        #[arg(long)]
        csv: bool,

        /// Skip the payload schema self-check
        #[arg(long)]
        no_schema_check: bool,
    },

    /// Run the field checks only
    Validate {
        /// Intake spreadsheet
        input: PathBuf,

        /// Reference date for the age check, YYYY-MM-DD (default: today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// Parse a spreadsheet and output its rows as JSON
    Parse {
        /// Input file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| format!("{} (expected YYYY-MM-DD)", e))
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            incoming,
            system,
            output_dir,
            date,
            csv,
            no_schema_check,
        } => {
            let options = ProcessOptions {
                output_dir,
                run_date: date,
                rejected_format: if csv { RejectedFormat::Csv } else { RejectedFormat::Xlsx },
                skip_schema_check: no_schema_check,
            };
            cmd_run(&incoming, &system, &options).await
        }

        Commands::Validate { input, date } => cmd_validate(&input, date).await,

        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn cmd_run(
    incoming: &Path,
    system: &Path,
    options: &ProcessOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {} against {}", incoming.display(), system.display());
    eprintln!("   Run date: {}", options.run_date());

    let report = process_files(incoming, system, options).await?;
    let stats = &report.stats;

    eprintln!("\n📊 Summary:");
    eprintln!("   Incoming rows:       {}", stats.incoming_rows);
    eprintln!("   Registered:          {}", stats.system_rows);
    eprintln!("   ✅ Inserts (I):      {}", stats.inserts);
    eprintln!("   ✅ Alterations (A):  {}", stats.alterations);
    eprintln!("   ❌ Failed checks:    {}", stats.failed_validation);
    eprintln!("   ❌ Unchanged:        {}", stats.already_registered);
    eprintln!("   ❌ Duplicate CPF:    {}", stats.duplicate_cpf);
    if stats.schema_violations > 0 {
        eprintln!("   ⚠️  Schema warnings: {}", stats.schema_violations);
    }

    if let Some(path) = &report.payload_path {
        eprintln!("\n💾 Payload: {}", path.display());
    }
    if let Some(path) = &report.rejected_path {
        eprintln!("💾 Rejected: {}", path.display());
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

async fn cmd_validate(input: &Path, date: Option<NaiveDate>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", input.display());

    let today = date.unwrap_or_else(|| Local::now().date_naive());
    let validator = FieldValidator::new(ViaCepClient::from_env()).with_today(today);
    let results = check_file(input, &validator).await?;

    let mut invalid = 0;
    for (i, result) in results.iter().enumerate() {
        let failed: Vec<Check> = result.failed();
        if failed.is_empty() {
            continue;
        }
        invalid += 1;
        let names: Vec<&str> = failed.iter().map(Check::name).collect();
        // +2: header row and 1-based numbering
        eprintln!("❌ Row {}: {}", i + 2, names.join(", "));
    }

    eprintln!(
        "\n📊 Results: {} valid, {} invalid",
        results.len() - invalid,
        invalid
    );

    if invalid > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing: {}", input.display());

    let table = read_table(input)?;

    if let Some(encoding) = &table.encoding {
        eprintln!("   Encoding: {}", encoding);
    }
    if let Some(delimiter) = table.delimiter {
        eprintln!("   Delimiter: '{}'", format_delimiter(delimiter));
    }
    eprintln!("   Columns: {}", table.headers.join(", "));
    eprintln!("✅ Parsed {} records", table.records.len());

    let json = serde_json::to_string_pretty(&table.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

async fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    cadastro::server::start_server(port).await?;
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
