use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use oasnorm_core::config::{self, CONFIG_FILE_NAME, NormalizeConfig};
use oasnorm_core::normalize::{self, NormalizeReport};
use oasnorm_core::parse;
use oasnorm_core::parse::spec::OpenApiSpec;

#[derive(Parser)]
#[command(name = "oasnorm", about = "OpenAPI 3.x schema-graph normalizer", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize an OpenAPI spec and write the result
    Normalize {
        /// Path to the OpenAPI spec file (YAML or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the normalized spec (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (defaults to the input's format)
        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// Normalize in memory and report diagnostics
    Check {
        /// Path to the OpenAPI spec file
        #[arg(short, long)]
        input: PathBuf,

        /// Print the full report to stdout in this format
        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// Initialize a new oasnorm configuration
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize {
            input,
            output,
            format,
        } => cmd_normalize(input, output, format),

        Commands::Check { input, format } => cmd_check(input, format),

        Commands::Init { force } => cmd_init(force),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "oasnorm", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Try to load the project config file from the current directory.
fn try_load_config() -> Result<Option<NormalizeConfig>> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);
    let loaded = config::load_config(&config_path).map_err(|e| anyhow::anyhow!(e))?;
    if loaded.is_some() {
        log::debug!("using config {}", config_path.display());
    }
    Ok(loaded)
}

fn input_format(path: &Path) -> OutputFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => OutputFormat::Json,
        _ => OutputFormat::Yaml,
    }
}

fn load_spec(path: &Path) -> Result<OpenApiSpec> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let parsed = match input_format(path) {
        OutputFormat::Json => parse::from_json(&content)?,
        OutputFormat::Yaml => parse::from_yaml(&content)?,
    };
    Ok(parsed)
}

fn run_pipeline(input: &Path) -> Result<(OpenApiSpec, NormalizeReport)> {
    let cfg = try_load_config()?.unwrap_or_default();
    let mut spec = load_spec(input)?;
    let report = normalize::normalize(&mut spec, &cfg)
        .with_context(|| format!("failed to normalize {}", input.display()))?;
    Ok((spec, report))
}

fn print_diagnostics(report: &NormalizeReport) {
    for diagnostic in &report.diagnostics {
        eprintln!("  {}", diagnostic);
    }
}

fn cmd_normalize(
    input: PathBuf,
    output: Option<PathBuf>,
    format: Option<OutputFormat>,
) -> Result<()> {
    let (spec, report) = run_pipeline(&input)?;

    let format = format
        .or_else(|| output.as_deref().map(input_format))
        .unwrap_or_else(|| input_format(&input));
    let rendered = match format {
        OutputFormat::Yaml => parse::to_yaml(&spec)?,
        OutputFormat::Json => parse::to_json(&spec)? + "\n",
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
            fs::write(&path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("  wrote {}", path.display());
        }
        None => print!("{}", rendered),
    }

    print_diagnostics(&report);
    eprintln!(
        "Normalized {}: {} schemas extracted, {} renamed, {} diagnostics",
        input.display(),
        report.extracted,
        report.schema_renames.len() + report.parameter_renames.len(),
        report.diagnostics.len()
    );
    Ok(())
}

fn cmd_check(input: PathBuf, format: Option<OutputFormat>) -> Result<()> {
    let (spec, report) = run_pipeline(&input)?;

    match format {
        Some(OutputFormat::Yaml) => print!("{}", serde_yaml_ng::to_string(&report)?),
        Some(OutputFormat::Json) => println!("{}", serde_json::to_string_pretty(&report)?),
        None => {}
    }

    eprintln!(
        "Normalized OpenAPI {} spec: {}",
        spec.openapi, spec.info.title
    );
    eprintln!("  Paths: {}", spec.paths.len());
    if let Some(ref components) = spec.components {
        eprintln!("  Schemas: {}", components.schemas.len());
    }
    eprintln!("  Extracted: {}", report.extracted);
    for (from, to) in &report.schema_renames {
        eprintln!("  schema {} -> {}", from, to);
    }
    for (from, to) in &report.parameter_renames {
        eprintln!("  path parameter {} -> {}", from, to);
    }
    eprintln!("  Records resolved: {}", report.records);

    if report.diagnostics.is_empty() {
        eprintln!("No diagnostics.");
    } else {
        eprintln!("Diagnostics ({}):", report.diagnostics.len());
        print_diagnostics(&report);
    }
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, config::default_config_content())?;
    eprintln!("Created {}", config_path.display());
    Ok(())
}
