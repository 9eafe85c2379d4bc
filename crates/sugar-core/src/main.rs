//! `dbt-sugar` command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use sugar_core::collector::{AnswersFile, AnswersFileCollector, CollectOptions};
use sugar_core::config::{ProjectSettings, SugarConfig, DEFAULT_CONFIG_FILE};
use sugar_core::connectors::sqlite::SqliteConnector;
use sugar_core::document::verification::VerificationState;
use sugar_core::logging::init_logging;
use sugar_core::runner::{CommandTestRunner, TestRunner};
use sugar_core::task::audit::{run_audit, AuditOutcome};
use sugar_core::task::bootstrap::run_bootstrap;
use sugar_core::task::doc::DocumentationTask;
use sugar_core::{SugarError, SugarResult};

/// Keeps dbt model documentation in step with the warehouse.
#[derive(Parser)]
#[command(name = "dbt-sugar", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config_path: PathBuf,

    /// Syrup to use instead of the config's default
    #[arg(long, global = true)]
    syrup: Option<String>,

    /// Log filter, e.g. `debug` or `sugar_core=trace` (falls back to SUGAR_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Document one model
    Doc {
        /// Model to document
        #[arg(short, long)]
        model: String,

        /// YAML file with prepared answers
        #[arg(long)]
        answers: Option<PathBuf>,

        /// Do not add or verify tests
        #[arg(long)]
        no_ask_tests: bool,

        /// Do not add tags
        #[arg(long)]
        no_ask_tags: bool,

        /// Write proposed tests without running them
        #[arg(long)]
        skip_verification: bool,
    },
    /// Report documentation and test coverage
    Audit {
        /// Model to audit; the whole project when omitted
        #[arg(short, long)]
        model: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create placeholder documentation for every model
    Bootstrap,
}

fn connector(settings: &ProjectSettings) -> SugarResult<SqliteConnector> {
    let database = settings.database.as_deref().ok_or_else(|| {
        SugarError::Config(format!(
            "dbt project '{}' has no `database` configured",
            settings.project_name
        ))
    })?;
    SqliteConnector::new(database)
}

fn run(cli: Cli) -> SugarResult<u8> {
    let config = SugarConfig::load(&cli.config_path)?;
    let mut settings = config.select(cli.syrup.as_deref())?;

    match cli.command {
        Commands::Doc {
            model,
            answers,
            no_ask_tests,
            no_ask_tags,
            skip_verification,
        } => {
            settings.apply_cli_overrides(no_ask_tests, no_ask_tags);
            let options = CollectOptions {
                ask_tests: settings.always_enforce_tests,
                ask_tags: settings.always_add_tags,
            };
            let mut collector = match &answers {
                Some(path) => AnswersFileCollector::load(path, options)?,
                None => AnswersFileCollector::new(PathBuf::new(), AnswersFile::default(), options),
            };
            let connector = connector(&settings)?;
            let runner = CommandTestRunner::new(
                &settings.test_command,
                settings.project_dir.clone(),
                settings.test_timeout,
            )?;
            let runner = (!skip_verification).then_some(&runner as &dyn TestRunner);

            let report = DocumentationTask::new(&settings, &connector, &mut collector, runner).run(&model)?;
            println!("{} documented in {}", report.model, report.descriptor.display());
            if let Some(outcome) = &report.verification {
                if outcome.state == VerificationState::PartiallyRolledBack {
                    for (column, tests) in &outcome.deleted {
                        println!("  removed failing tests on {column}: {}", tests.join(", "));
                    }
                }
            }
            Ok(0)
        }
        Commands::Audit { model, json } => {
            let outcome = run_audit(&settings, model.as_deref())?;
            match &outcome {
                AuditOutcome::Model(audit) if json => println!("{}", serde_json::to_string_pretty(audit)?),
                AuditOutcome::Project(audit) if json => println!("{}", serde_json::to_string_pretty(audit)?),
                AuditOutcome::Model(audit) => print!("{}", audit.render()),
                AuditOutcome::Project(audit) => print!("{}", audit.render()),
                AuditOutcome::ModelNotFound(model) => {
                    println!("Could not find {model} in the project at {}", settings.project_dir.display())
                }
                AuditOutcome::ModelNotDocumented(model) => println!("The model {model} is not documented."),
            }
            Ok(outcome.exit_code())
        }
        Commands::Bootstrap => {
            let connector = connector(&settings)?;
            let report = run_bootstrap(&settings, &connector)?;
            for (model, path) in &report.written {
                println!("{model}: {}", path.display());
            }
            Ok(0)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}
