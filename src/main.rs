//! Lifecycle CLI entrypoint.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use lifecycle_engine::cli::{Cli, Commands, DiffCommands, HandleCommands, OutputFormat, OutputFormatter};
use lifecycle_engine::config::{ConfigParser, ConfigValidator, EngineConfig, find_config_file};
use lifecycle_engine::differ::{PatchDiffer, TagPolicy, Tags, diff_attribute_updates};
use lifecycle_engine::error::{ConfigError, EngineError, Result};
use lifecycle_engine::identity::{IdentifierCodec, ResourceHandle, decode_from_arn};
use lifecycle_engine::model::{AttributeMap, LifecycleStatus};
use lifecycle_engine::reconciler::{ReconcileController, ReconcileOutcome, WaitOverrides};
use lifecycle_engine::remote::{RetryPolicy, SimulatedCloud, SimulationScript};
use lifecycle_engine::resource::{JsonResource, JsonResourceConfig};
use lifecycle_engine::waiter::PollSchedule;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let formatter = OutputFormatter::new(cli.output);
    match runtime.block_on(run(cli, &formatter)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprint!("{}", formatter.format_error(&e));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<()> {
    match cli.command {
        Commands::Handle { command } => cmd_handle(command, formatter),
        Commands::Diff { command } => cmd_diff(cli.config.as_deref(), command, formatter),
        Commands::Simulate {
            desired,
            update,
            keep,
            transition_polls,
            fail_create,
            poll_ms,
        } => {
            let options = SimulateOptions {
                desired,
                update,
                keep,
                transition_polls,
                fail_create,
                poll: Duration::from_millis(poll_ms),
            };
            cmd_simulate(cli.config.as_deref(), options, formatter).await
        }
        Commands::Validate { warnings } => cmd_validate(cli.config.as_deref(), warnings, formatter),
    }
}

/// Encode, decode or unwrap a handle.
fn cmd_handle(command: HandleCommands, formatter: &OutputFormatter) -> Result<()> {
    match command {
        HandleCommands::Encode {
            names,
            separator,
            array_literal,
            parts,
        } => {
            let codec = codec_for(names, separator, array_literal, parts.len());
            let handle = codec.encode(&parts)?;
            emit(&formatter.format_handle(handle.as_str()))
        }
        HandleCommands::Decode {
            names,
            separator,
            array_literal,
            handle,
        } => {
            let count = if names.is_empty() {
                handle.split(separator).count()
            } else {
                names.len()
            };
            let codec = codec_for(names, separator, array_literal, count);
            let parts = codec.decode_str(&handle)?;
            let labels: Vec<String> = codec.part_names().into_iter().map(String::from).collect();
            emit(&formatter.format_parts(&labels, &parts))
        }
        HandleCommands::Arn { arn, prefix } => {
            let name = decode_from_arn(&ResourceHandle::from_raw(arn), &prefix)?;
            emit(&formatter.format_handle(&name))
        }
    }
}

fn codec_for(names: Vec<String>, separator: char, array_literal: bool, count: usize) -> IdentifierCodec {
    let names = if names.is_empty() {
        (1..=count).map(|i| format!("PART-{i}")).collect()
    } else {
        names
    };
    let codec = IdentifierCodec::with_part_names(separator, names);
    if array_literal { codec.with_array_literal() } else { codec }
}

/// Diff two files.
fn cmd_diff(config_path: Option<&Path>, command: DiffCommands, formatter: &OutputFormatter) -> Result<()> {
    match command {
        DiffCommands::Tags { old, new } => {
            let config = load_config(config_path)?;
            let policy = TagPolicy::from(&config.tags);
            let old: Tags = read_document(&old)?;
            let new: Tags = read_document(&new)?;
            let diff = policy.diff(&old, &policy.merge_defaults(&new));
            emit(&formatter.format_tag_diff(&diff))
        }
        DiffCommands::Patch { old, new, prefix } => {
            let old = read_attributes(&old)?;
            let new = read_attributes(&new)?;
            let plan = PatchDiffer::new(prefix).diff(&old, &new);
            emit(&formatter.format_plan(&plan))
        }
        DiffCommands::Attributes { old, new } => {
            let old = read_attributes(&old)?;
            let new = read_attributes(&new)?;
            emit(&formatter.format_attribute_updates(&diff_attribute_updates(&old, &new)))
        }
    }
}

struct SimulateOptions {
    desired: PathBuf,
    update: Option<PathBuf>,
    keep: bool,
    transition_polls: usize,
    fail_create: bool,
    poll: Duration,
}

/// Run a resource through its lifecycle on the simulated remote.
async fn cmd_simulate(config_path: Option<&Path>, options: SimulateOptions, formatter: &OutputFormatter) -> Result<()> {
    let config = load_config(config_path)?;
    let desired = read_attributes(&options.desired)?;
    let update = options.update.as_deref().map(read_attributes).transpose()?;

    let script = SimulationScript {
        create: vec![LifecycleStatus::Creating; options.transition_polls],
        create_settles: if options.fail_create {
            LifecycleStatus::Failed
        } else {
            LifecycleStatus::Available
        },
        create_reason: options.fail_create.then(|| String::from("simulated create failure")),
        update: vec![LifecycleStatus::Updating; options.transition_polls],
        delete: vec![LifecycleStatus::Deleting; options.transition_polls],
        ..SimulationScript::default()
    };
    let cloud = Arc::new(SimulatedCloud::new(script));
    let kind = JsonResource::new(JsonResourceConfig::simulated("resource"), cloud)
        .with_retry(RetryPolicy::from(&config.retry));

    let overrides = WaitOverrides {
        poll: Some(PollSchedule::Fixed(options.poll)),
        ..WaitOverrides::from(&config.waits)
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling waits");
            ctrl_c.cancel();
        }
    });

    let mut controller = ReconcileController::new(Arc::new(kind))
        .with_overrides(overrides)
        .with_cancellation(cancel);

    let result = drive(&mut controller, &desired, update.as_ref(), options.keep, formatter).await;
    emit(&formatter.format_history(controller.history()))?;
    result
}

async fn drive(
    controller: &mut ReconcileController<JsonResource>,
    desired: &AttributeMap,
    update: Option<&AttributeMap>,
    keep: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let state = controller.create(desired).await?;
    if formatter_is_text(formatter) {
        emit(&formatter.format_state(&state.snapshot()))?;
    }

    if let Some(update) = update {
        match controller.update(update).await? {
            ReconcileOutcome::Updated(plan) => {
                info!("Applied {} patch operation(s)", plan.len());
                if formatter_is_text(formatter) {
                    emit(&formatter.format_plan(&plan))?;
                }
            }
            ReconcileOutcome::Unchanged | ReconcileOutcome::Created => info!("Nothing to update"),
        }
        if let (Some(state), true) = (controller.observed(), formatter_is_text(formatter)) {
            emit(&formatter.format_state(&state.snapshot()))?;
        }
    }

    if keep {
        if let Some(handle) = controller.handle() {
            info!("Keeping {handle}");
        }
        return Ok(());
    }
    controller.delete().await
}

const fn formatter_is_text(formatter: &OutputFormatter) -> bool {
    matches!(formatter.format(), OutputFormat::Text)
}

/// Validate configuration.
fn cmd_validate(config_path: Option<&Path>, show_warnings: bool, formatter: &OutputFormatter) -> Result<()> {
    let config = load_config(config_path)?;
    let result = ConfigValidator::new().check(&config);
    emit(&formatter.format_validation(&result, show_warnings))?;

    match result.errors.first() {
        None => Ok(()),
        Some(first) => Err(EngineError::Config(ConfigError::validation(
            first.message.clone(),
            first.field.clone(),
        ))),
    }
}

/// Loads the configuration file, or the defaults when none is found.
fn load_config(config_path: Option<&Path>) -> Result<EngineConfig> {
    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => match find_config_file(".") {
            Ok(path) => Some(path),
            Err(_) => {
                debug!("No configuration file found, using defaults");
                None
            }
        },
    };

    let base = path
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let parser = ConfigParser::new().with_base_path(base);
    parser.load_dotenv()?;
    parser.load_with_env(path.as_deref())
}

fn read_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| {
        EngineError::Config(ConfigError::ParseError {
            message: e.to_string(),
            location: Some(path.display().to_string()),
        })
    })
}

fn read_attributes(path: &Path) -> Result<AttributeMap> {
    let value: serde_json::Value = read_document(path)?;
    AttributeMap::from_json(&value).ok_or_else(|| {
        EngineError::Config(ConfigError::ParseError {
            message: String::from("expected a mapping of attributes"),
            location: Some(path.display().to_string()),
        })
    })
}

fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    Ok(())
}
