//! Pivotload CLI - Turn survey response workbooks into report tables
//!
//! # Main Commands
//!
//! ```bash
//! pivotload convert anket.xlsx              # Write anket_rapor.xlsx
//! pivotload convert anket.csv --template rapor.xlsx -o out.xlsx
//! pivotload serve                           # Start HTTP server (port 3000)
//! ```
//!
//! # Inspection Commands
//!
//! ```bash
//! pivotload preview anket.xlsx --rows 5     # First rows of each table as JSON
//! pivotload resolve anket.xlsx "Ad Soyad"   # Which header a name resolves to
//! pivotload scenarios                       # Scenario catalog and apps
//! ```

use clap::{Parser, Subcommand};
use pivotload::config::{CONFIG_ENV, PORT_ENV};
use pivotload::{
    convert_file, read_input_file, render, App, ColumnResolver, ConvertOptions, Profile,
    SCENARIOS,
};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pivotload")]
#[command(about = "Turn wide survey response workbooks into long-form report tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by the commands that run a conversion.
#[derive(clap::Args)]
struct OptionArgs {
    /// Phase label written to every row
    #[arg(long)]
    phase: Option<String>,

    /// Minimum score counted as continuity OK (1-5)
    #[arg(long)]
    threshold: Option<i64>,

    /// Output variant: legacy or report
    #[arg(long)]
    profile: Option<Profile>,

    /// JSON options file
    #[arg(long, env = CONFIG_ENV)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a survey file to the report workbook
    Convert {
        /// Input xlsx/xls/ods/csv file
        input: PathBuf,

        /// Output file (default: <input>_rapor.xlsx, or stdout with --json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Workbook to write the tables into
        #[arg(short, long)]
        template: Option<PathBuf>,

        #[command(flatten)]
        options: OptionArgs,

        /// Write the tables as JSON instead of xlsx
        #[arg(long)]
        json: bool,
    },

    /// Show the first rows of each output table as JSON
    Preview {
        /// Input xlsx/xls/ods/csv file
        input: PathBuf,

        /// Rows per table
        #[arg(long, default_value = "10")]
        rows: usize,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Show which header each name resolves to on every sheet
    Resolve {
        /// Input xlsx/xls/ods/csv file
        input: PathBuf,

        /// Column names to look up
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Print the scenario catalog and the known apps
    Scenarios,

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = PORT_ENV, default_value = "3000")]
        port: u16,

        #[command(flatten)]
        options: OptionArgs,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            template,
            options,
            json,
        } => cmd_convert(&input, output.as_deref(), template.as_deref(), &options, json),

        Commands::Preview {
            input,
            rows,
            options,
        } => cmd_preview(&input, rows, &options),

        Commands::Resolve { input, names } => cmd_resolve(&input, &names),

        Commands::Scenarios => cmd_scenarios(),

        Commands::Serve { port, options } => cmd_serve(port, &options).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Options file (if any) with the command-line flags on top.
fn build_options(args: &OptionArgs) -> Result<ConvertOptions, Box<dyn std::error::Error>> {
    let mut options = match &args.config {
        Some(path) => {
            eprintln!("⚙️  Options: {}", path.display());
            ConvertOptions::from_file(path)?
        }
        None => ConvertOptions::default(),
    };

    if let Some(phase) = &args.phase {
        options.phase = phase.clone();
    }
    if let Some(threshold) = args.threshold {
        options.continuity_threshold = threshold;
    }
    if let Some(profile) = args.profile {
        options.profile = profile;
    }
    Ok(options)
}

fn cmd_convert(
    input: &Path,
    output: Option<&Path>,
    template: Option<&Path>,
    args: &OptionArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let mut options = build_options(args)?;
    let template = template.map(fs::read).transpose()?;
    if let Some(bytes) = &template {
        pivotload::apply_template_columns(&mut options, bytes);
    }

    let result = convert_file(input, &options)?;

    if json {
        let tables = json!({
            "functions": result.functions.to_json_records(result.functions.len()),
            "transfers": result
                .transfers
                .as_ref()
                .map(|t| t.to_json_records(t.len())),
            "stats": result.stats,
        });
        write_output(&serde_json::to_string_pretty(&tables)?, output)?;
        return Ok(());
    }

    let bytes = render(&result, template.as_deref())?;
    let path = match output {
        Some(p) => p.to_path_buf(),
        None => input.with_file_name(pivotload::output_file_name(
            &input.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
        )),
    };
    fs::write(&path, bytes)?;
    eprintln!("💾 Output written to: {}", path.display());

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_preview(
    input: &Path,
    rows: usize,
    args: &OptionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = build_options(args)?;
    let result = convert_file(input, &options)?;

    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let preview = pivotload::PreviewResponse::new(&name, &result, rows);
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}

fn cmd_resolve(input: &Path, names: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let workbook = read_input_file(input)?;

    for sheet in &workbook.sheets {
        println!("📋 {} ({} columns)", sheet.name, sheet.headers.len());
        let resolver = ColumnResolver::new(&sheet.headers);
        for name in names {
            match resolver.resolve_scored(name, &[]) {
                Some((header, score)) => println!("   {} → {} ({:.2})", name, header, score),
                None => println!("   {} → (none)", name),
            }
        }
    }
    Ok(())
}

fn cmd_scenarios() -> Result<(), Box<dyn std::error::Error>> {
    println!("Apps:");
    for app in App::ALL {
        println!("   {} → {}", app.display_name(), app.value());
    }
    println!("\nScenarios:");
    for (code, label) in SCENARIOS {
        println!("   {:<6} {}", code, label);
    }
    Ok(())
}

async fn cmd_serve(port: u16, args: &OptionArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = build_options(args)?;
    pivotload::server::start_server(port, options).await
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
