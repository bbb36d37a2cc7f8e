//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use pagedigest_core::{
    PipelineConfig, PipelineEvent, PipelineReporter, Summary, chunk_with, count_tokens,
    normalize_lines, summarize_url,
};
use pagedigest_fetcher::{HttpPageFetcher, clean_url};
use pagedigest_llm::OpenAiProvider;
use pagedigest_shared::{
    AppConfig, FailurePolicy, Tokenizer, init_config, load_config, load_config_from,
    resolve_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// PageDigest: summarize any web page with an LLM.
#[derive(Parser)]
#[command(
    name = "pagedigest",
    version,
    about = "Fetch a web page and summarize it with an LLM.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.pagedigest/pagedigest.toml.
    #[arg(long, env = "PAGEDIGEST_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch a page and print its summary.
    Summarize(SummarizeArgs),

    /// Show the token estimate and chunk plan for a local text file.
    Tokens {
        /// Text file to analyze.
        file: PathBuf,

        /// Token budget per chunk (defaults to the configured value).
        #[arg(long)]
        chunk_budget: Option<usize>,

        /// Token counting scheme: cl100k or heuristic.
        #[arg(long)]
        tokenizer: Option<Tokenizer>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options for `pagedigest summarize`. Each flag overrides the config file.
#[derive(Args)]
pub(crate) struct SummarizeArgs {
    /// Page URL to summarize.
    pub url: String,

    /// Model for chunk extraction (and the final request unless --summary-model is set).
    #[arg(long)]
    pub model: Option<String>,

    /// Model for the final summarization request.
    #[arg(long)]
    pub summary_model: Option<String>,

    /// Maximum tokens per chunk.
    #[arg(long)]
    pub chunk_budget: Option<usize>,

    /// Token counting scheme for the budget: cl100k or heuristic.
    #[arg(long)]
    pub tokenizer: Option<Tokenizer>,

    /// Instruction placed before each chunk.
    #[arg(long)]
    pub chunk_prompt: Option<String>,

    /// Instruction (or `{url}`/`{facts}` template) for the final request.
    #[arg(long)]
    pub summary_prompt: Option<String>,

    /// Token limit for the final response.
    #[arg(long)]
    pub summary_max_tokens: Option<u32>,

    /// Chunk requests in flight per window.
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Delay before each chunk request, in milliseconds.
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Keep going when a chunk request fails instead of aborting.
    #[arg(long)]
    pub skip_failed: bool,

    /// Attempts per chunk request, including the first (1 disables retry).
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Give up on the whole run after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print the page's links after the summary.
    #[arg(long)]
    pub links: bool,

    /// Print the full result as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SummarizeArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(model) = &self.model {
            config.chunking.model = model.clone();
            config.summary.model = model.clone();
        }
        if let Some(model) = &self.summary_model {
            config.summary.model = model.clone();
        }
        if let Some(budget) = self.chunk_budget {
            config.chunking.token_budget = budget;
        }
        if let Some(tokenizer) = self.tokenizer {
            config.chunking.tokenizer = tokenizer;
        }
        if let Some(prompt) = &self.chunk_prompt {
            config.chunking.chunk_prompt = prompt.clone();
        }
        if let Some(prompt) = &self.summary_prompt {
            config.summary.prompt = prompt.clone();
        }
        if let Some(max_tokens) = self.summary_max_tokens {
            config.summary.max_tokens = max_tokens;
        }
        if let Some(concurrency) = self.concurrency {
            config.dispatch.concurrency = concurrency;
        }
        if let Some(delay) = self.delay_ms {
            config.dispatch.inter_request_delay_ms = delay;
        }
        if self.skip_failed {
            config.dispatch.failure_policy = FailurePolicy::Skip;
        }
        if let Some(attempts) = self.max_attempts {
            config.dispatch.max_attempts = attempts;
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr; stdout carries
/// only command output.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pagedigest=warn",
        1 => "pagedigest=info",
        2 => "pagedigest=debug",
        _ => "pagedigest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

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
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Summarize(args) => cmd_summarize(&args, config_path).await,
        Command::Tokens {
            file,
            chunk_budget,
            tokenizer,
        } => cmd_tokens(&file, chunk_budget, tokenizer, config_path),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_summarize(args: &SummarizeArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    args.apply(&mut config);

    // Validate API key before doing anything
    let api_key = resolve_api_key(&config)?;

    let raw_url = clean_url(&args.url);
    let url = Url::parse(raw_url).map_err(|e| eyre!("invalid URL '{raw_url}': {e}"))?;

    let mut pipeline = PipelineConfig::from_app_config(&config)?;
    pipeline.timeout = args.timeout_secs.map(Duration::from_secs);

    let fetcher = HttpPageFetcher::new(&config.fetch)?;
    let provider = OpenAiProvider::new(&api_key, &config.provider)?;

    info!(
        %url,
        model = %config.summary.model,
        token_budget = config.chunking.token_budget,
        concurrency = config.dispatch.concurrency,
        failure_policy = %config.dispatch.failure_policy,
        "summarizing page"
    );

    let reporter = CliProgress::new();
    let result = summarize_url(&url, &fetcher, &provider, &pipeline, &reporter).await;
    reporter.finish();
    let summary = result?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, args.links);
    }

    Ok(())
}

fn print_summary(summary: &Summary, links: bool) {
    println!("{}", summary.text.trim_end());

    if !summary.failed_chunks.is_empty() {
        eprintln!();
        eprintln!(
            "  Note: {} of {} chunks failed and were left out: {:?}",
            summary.failed_chunks.len(),
            summary.dispatched,
            summary.failed_chunks
        );
    }

    if links && !summary.links.is_empty() {
        println!();
        println!("Links:");
        for link in &summary.links {
            if link.text.is_empty() {
                println!("  {}", link.href);
            } else {
                println!("  {} <{}>", link.text, link.href);
            }
        }
    }
}

fn cmd_tokens(
    file: &Path,
    chunk_budget: Option<usize>,
    tokenizer: Option<Tokenizer>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let budget = chunk_budget.unwrap_or(config.chunking.token_budget);
    let tokenizer = tokenizer.unwrap_or(config.chunking.tokenizer);
    if budget == 0 {
        return Err(eyre!("chunk budget must be greater than zero"));
    }

    let raw = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;
    let text = normalize_lines(&raw);
    let chunks = chunk_with(&text, budget, tokenizer);

    println!("File:    {}", file.display());
    println!("Tokens:  {} ({tokenizer})", count_tokens(&text, tokenizer));
    println!("Budget:  {budget}");
    println!("Chunks:  {}", chunks.len());
    for c in &chunks {
        let lines = c.content.lines().count();
        let marker = if c.estimated_tokens > budget { "  (oversized line)" } else { "" };
        println!("  [{:>3}] {:>6} tokens, {lines} lines{marker}", c.index, c.estimated_tokens);
    }

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Renders pipeline events on an indicatif spinner (stderr).
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid progress template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl PipelineReporter for CliProgress {
    fn event(&self, event: &PipelineEvent<'_>) {
        match event {
            // Failures that will be retried or skipped are worth keeping on screen.
            PipelineEvent::ChunkFailed { .. } => self.spinner.println(format!("  {event}")),
            PipelineEvent::Finished { .. } => self.spinner.finish_and_clear(),
            _ => self.spinner.set_message(event.to_string()),
        }
    }
}
