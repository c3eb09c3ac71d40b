//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use ctxgen_core::{
    DocumentStatus, GenerateConfig, ProgressReporter, RunReport, SilentProgress,
    cancel_pair, generate, load_registry,
};
use ctxgen_shared::{AppConfig, init_config, load_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ctxgen — compile context documents for AI assistants.
#[derive(Parser)]
#[command(
    name = "ctxgen",
    version,
    about = "Compile AI context documents from declarative, importable configs.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Where the root config comes from.
#[derive(Args, Clone, Debug)]
pub(crate) struct ConfigSource {
    /// Root config file (defaults to context.{yaml,yml,json,toml} in the work dir).
    #[arg(short = 'c', long)]
    pub config_file: Option<PathBuf>,

    /// Root config as inline JSON or YAML text.
    #[arg(long, conflicts_with = "config_file")]
    pub inline: Option<String>,

    /// Directory relative paths resolve against (defaults to the current dir).
    #[arg(short = 'w', long)]
    pub work_dir: Option<PathBuf>,

    /// Env file layered over the process environment for `${KEY}` tokens.
    #[arg(long = "env")]
    pub env_file: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Resolve the config and write every document.
    #[command(visible_aliases = ["build", "compile"])]
    Generate {
        #[command(flatten)]
        source: ConfigSource,

        /// Print the run report as JSON on stdout.
        #[arg(long)]
        json: bool,

        /// Output root (defaults to `.context` under the work dir).
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Documents compiled concurrently.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// List the prompts left after template flattening.
    Prompts {
        #[command(flatten)]
        source: ConfigSource,

        /// Print full prompts as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Render one prompt with arguments.
    Prompt {
        /// Prompt id.
        id: String,

        /// Argument as key=value (repeatable).
        #[arg(long = "arg", value_parser = parse_key_val)]
        args: Vec<(String, String)>,

        #[command(flatten)]
        source: ConfigSource,

        /// Print messages as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List resolved tool declarations.
    Tools {
        #[command(flatten)]
        source: ConfigSource,

        /// Print full tools as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

fn parse_key_val(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "ctxgen=info",
        1 => "ctxgen=debug",
        _ => "ctxgen=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            source,
            json,
            output_dir,
            concurrency,
        } => cmd_generate(&source, json, output_dir, concurrency).await,
        Command::Prompts { source, json } => cmd_prompts(&source, json).await,
        Command::Prompt {
            id,
            args,
            source,
            json,
        } => cmd_prompt(&id, args, &source, json).await,
        Command::Tools { source, json } => cmd_tools(&source, json).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// App config plus CLI overrides.
fn generate_config(source: &ConfigSource) -> Result<GenerateConfig> {
    let app: AppConfig = load_config()?;
    let work_dir = match &source.work_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()
            .map_err(|e| eyre!("cannot determine working directory: {e}"))?,
    };
    if !work_dir.is_dir() {
        return Err(eyre!("work dir '{}' is not a directory", work_dir.display()));
    }

    let mut config = GenerateConfig::from_app_config(&app, work_dir);
    config.config_file = source.config_file.clone();
    config.inline = source.inline.clone();
    config.env_file = source.env_file.clone();
    Ok(config)
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

async fn cmd_generate(
    source: &ConfigSource,
    json: bool,
    output_dir: Option<PathBuf>,
    concurrency: Option<usize>,
) -> Result<()> {
    let mut config = generate_config(source)?;
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    if let Some(n) = concurrency {
        config.concurrency = n.max(1);
    }

    info!(
        work_dir = %config.work_dir.display(),
        output = %config.output_root().display(),
        concurrency = config.concurrency,
        "generating documents"
    );

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight fetches");
            handle.cancel();
        }
    });

    let result = if json {
        generate(&config, &SilentProgress, signal).await
    } else {
        let reporter = CliProgress::new();
        generate(&config, &reporter, signal).await
    };

    let report = match result {
        Ok(report) => report,
        Err(e) if json => {
            let failure = serde_json::json!({
                "status": "error",
                "message": e.to_string(),
                "result": [],
            });
            println!("{}", serde_json::to_string_pretty(&failure)?);
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    print_summary(&report);
    if report.has_errors() {
        return Err(eyre!("{}", report.message));
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!();
    for doc in &report.result {
        match doc.status {
            DocumentStatus::Success => println!("  ✓ {}", doc.output_path),
            DocumentStatus::Skipped => println!("  - {} (kept existing file)", doc.output_path),
            DocumentStatus::Error => {
                println!("  ✗ {}", doc.output_path);
                for error in &doc.errors {
                    println!("      {error}");
                }
            }
        }
    }
    for warning in &report.warnings {
        println!("  ! [{}] {}", warning.scope, warning.message);
    }
    if let Some(first) = report.result.first() {
        println!("  Output: {}", first.context_path);
    }
    println!("  {}", report.message);
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn document_compiled(&self, output_path: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Compiled [{current}/{total}] {output_path}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// prompts / prompt / tools
// ---------------------------------------------------------------------------

async fn cmd_prompts(source: &ConfigSource, json: bool) -> Result<()> {
    let loaded = load_registry(&generate_config(source)?).await?;
    let (prompts, warnings) = ctxgen_prompts::flatten(&loaded.registry.prompts);
    for warning in &warnings {
        warn!(scope = %warning.scope, "{}", warning.message);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&prompts)?);
        return Ok(());
    }
    if prompts.is_empty() {
        println!("No prompts found in configuration.");
        return Ok(());
    }
    for prompt in &prompts {
        let args = ctxgen_prompts::required_arguments(prompt);
        let args = if args.is_empty() {
            String::new()
        } else {
            format!(" (args: {})", args.join(", "))
        };
        println!("{}{args}", prompt.id);
        if !prompt.description.is_empty() {
            println!("    {}", prompt.description);
        }
    }
    Ok(())
}

async fn cmd_prompt(
    id: &str,
    args: Vec<(String, String)>,
    source: &ConfigSource,
    json: bool,
) -> Result<()> {
    let loaded = load_registry(&generate_config(source)?).await?;
    let (prompts, _) = ctxgen_prompts::flatten(&loaded.registry.prompts);
    let prompt = prompts
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| eyre!("no prompt with id '{id}'"))?;

    let arguments: BTreeMap<String, String> = args.into_iter().collect();
    let messages = ctxgen_prompts::render(prompt, &arguments)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }
    for message in &messages {
        println!("[{}]", message.role);
        println!("{}", message.content);
        println!();
    }
    Ok(())
}

async fn cmd_tools(source: &ConfigSource, json: bool) -> Result<()> {
    let loaded = load_registry(&generate_config(source)?).await?;
    let tools = &loaded.registry.tools;

    if json {
        println!("{}", serde_json::to_string_pretty(tools)?);
        return Ok(());
    }
    if tools.is_empty() {
        println!("No tools found in configuration.");
        return Ok(());
    }
    for tool in tools {
        println!("{} [{}]", tool.id, tool.kind);
        if !tool.description.is_empty() {
            println!("    {}", tool.description);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
