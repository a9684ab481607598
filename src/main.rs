// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tomeport::app_config::{Config, LogLevel, TranslationProvider};
use tomeport::workflow::RunOutcome;
use tomeport::Controller;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    OpenAI,
    Anthropic,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Segment a source file into chapter drafts for a novel
    Import {
        /// Novel the chapters belong to
        #[arg(short, long)]
        novel: i64,

        /// Operator recorded on the batch
        #[arg(short, long)]
        admin: Option<String>,

        /// UTF-8 source text
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Review titles and flag issues for a batch's novel
    Precheck {
        #[arg(value_name = "BATCH_ID")]
        batch_id: String,
    },

    /// Confirm a batch and create (or show) its translation task
    Confirm {
        #[arg(value_name = "BATCH_ID")]
        batch_id: String,
    },

    /// Run or resume a translation task
    Run {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
    },

    /// Show a task and its per-chapter progress
    Status {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
    },

    /// Pause a task
    Pause {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
    },

    /// Make a paused task runnable again
    Resume {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
    },

    /// Generate shell completions for tomeport
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// tomeport - batch AI translation and import of web novels
#[derive(Parser, Debug)]
#[command(name = "tomeport")]
#[command(version)]
#[command(about = "AI-powered novel translation and chapter import")]
#[command(long_about = "tomeport cuts raw novel text into chapters, translates them with an AI provider \
and publishes them into the chapter catalog.

EXAMPLES:
    tomeport import --novel 42 novel.txt        # Create chapter drafts
    tomeport precheck <BATCH_ID>                # Review titles, flag ads and odd lengths
    tomeport confirm <BATCH_ID>                 # Create the translation task
    tomeport run <TASK_ID>                      # Run or resume the workflow
    tomeport --log-level debug status <TASK_ID> # Inspect progress
    tomeport completions bash > tomeport.bash   # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config: PathBuf,

    /// Database file (overrides the configured location)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// Translation provider to use
    #[arg(short, long, value_enum, global = true)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long, global = true)]
    model: Option<String>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour for a level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let _ = writeln!(
            std::io::stderr(),
            "\x1B[{}m{} {:<5} {}\x1B[0m",
            Self::color_for_level(record.level()),
            now,
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Level is lowered or raised once the config is known
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "tomeport", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli)?;
    log::set_max_level(config.log_level.to_level_filter());

    let controller = Controller::from_config(config, cli.db.clone())?;

    if let Err(e) = run_command(&controller, cli.command).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

// @loads: Config file with CLI overrides applied
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let mut config = Config::load_or_create(&cli.config)?;

    if let Some(provider) = &cli.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &cli.model {
        config.translation.active_provider_config_mut().model = model.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone().into();
    }

    Ok(config)
}

async fn run_command(controller: &Controller, command: Commands) -> Result<()> {
    match command {
        Commands::Import { novel, admin, file } => {
            let outcome = controller.import_source_file(novel, &file, admin).await?;
            info!(
                "Batch {}: {} created, {} already imported, {} corrected",
                outcome.batch.id, outcome.report.created, outcome.report.duplicates, outcome.report.corrected
            );
            for draft in outcome.drafts.iter().filter(|d| d.has_issue()) {
                warn!("Chapter {}: {}", draft.chapter_number, draft.issue_summary);
            }
            print_json(&outcome.batch)
        }
        Commands::Precheck { batch_id } => {
            let summary = controller.run_import_chapter_precheck(&batch_id).await?;
            print_json(&summary)
        }
        Commands::Confirm { batch_id } => {
            let task = controller.mark_batch_ready_for_translation(&batch_id).await?;
            info!("Task {} is ready, next step {}", task.id, task.current_step);
            print_json(&task)
        }
        Commands::Run { task_id } => run_task(controller, &task_id).await,
        Commands::Status { task_id } => print_json(&controller.task_status(&task_id).await?),
        Commands::Pause { task_id } => print_json(&controller.pause_task(&task_id).await?),
        Commands::Resume { task_id } => print_json(&controller.resume_task(&task_id).await?),
        Commands::Completions { .. } => Ok(()),
    }
}

async fn run_task(controller: &Controller, task_id: &str) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(format!("Running task {}", task_id));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let outcome = controller.run_novel_translation_workflow(task_id).await;
    spinner.finish_and_clear();

    match outcome? {
        RunOutcome::Completed => {
            let report = controller.task_status(task_id).await?;
            info!(
                "Task {} completed: {}/{} chapters done, {} failed",
                task_id, report.task.completed_chapters, report.task.total_chapters, report.task.failed_chapters
            );
            Ok(())
        }
        RunOutcome::AlreadyRunning => Err(anyhow!("Task {} is already running", task_id)),
        RunOutcome::Skipped(status) => {
            warn!("Task {} is {}, nothing to do", task_id, status);
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
