//! Schemaplan CLI entrypoint.
//!
//! This is the main entrypoint for the schemaplan command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use schemaplan::cli::{Cli, Commands, OutputFormat, OutputFormatter, StateCommands};
use schemaplan::config::{ConfigParser, SchemaLoader, ToolConfig};
use schemaplan::error::{PlanError, Result, SchemaPlanError};
use schemaplan::planner::{ResourcePlan, proposed_new_object};
use schemaplan::reconciler::Reconciler;
use schemaplan::schema::{Block, SchemaValidator};
use schemaplan::state::{LocalStateStore, StateStore};
use schemaplan::value::Value;
use schemaplan::wire::schema_to_proto;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.output);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// Logs go to stderr so command output on stdout stays parseable.
fn init_logging(verbose: bool, output: OutputFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match output {
        OutputFormat::Json => builder.json().init(),
        OutputFormat::Text => builder.init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config = load_config(cli.config.as_deref())?;
    let loader = SchemaLoader::new();

    match cli.command {
        Commands::Validate { schema } => cmd_validate(&loader, &schema, &formatter),
        Commands::ImpliedType { schema } => {
            let block = load_schema(&loader, &schema)?;
            emit(&formatter.format_type(&block.implied_type()))
        }
        Commands::Coerce { schema, value } => cmd_coerce(&loader, &schema, &value, &formatter),
        Commands::Propose {
            schema,
            config_value,
            prior,
        } => cmd_propose(&loader, &schema, &config_value, prior.as_deref(), &formatter),
        Commands::Plan {
            schema,
            config_value,
            resource,
            out,
        } => {
            cmd_plan(
                &config,
                &loader,
                &schema,
                config_value.as_deref(),
                &resource,
                out,
                &formatter,
            )
            .await
        }
        Commands::Apply {
            schema,
            plan,
            resource,
            yes,
        } => cmd_apply(&config, &loader, &schema, plan, resource.as_deref(), yes, &formatter).await,
        Commands::Wire {
            schema,
            schema_version,
        } => {
            let block = load_schema(&loader, &schema)?;
            emit(&formatter.format_wire(&schema_to_proto(&block, schema_version)))
        }
        Commands::State { command } => cmd_state(&config, command, &formatter).await,
    }
}

/// Validate a schema.
fn cmd_validate(loader: &SchemaLoader, schema: &Path, formatter: &OutputFormatter) -> Result<()> {
    let block = loader.load_schema(schema)?;
    let result = SchemaValidator::new().validate(&block)?;
    emit(&formatter.format_validation(&result))
}

/// Coerce a value document.
fn cmd_coerce(
    loader: &SchemaLoader,
    schema: &Path,
    value: &Path,
    formatter: &OutputFormatter,
) -> Result<()> {
    let block = load_schema(loader, schema)?;
    let value = loader.load_value(value, &block.implied_type())?;
    let coerced = block.coerce_value(&value)?;
    emit(&formatter.format_value(&coerced))
}

/// Compute a proposed new object.
fn cmd_propose(
    loader: &SchemaLoader,
    schema: &Path,
    config_value: &Path,
    prior: Option<&Path>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let block = load_schema(loader, schema)?;
    let ty = block.implied_type();

    let config = block.coerce_value(&loader.load_value(config_value, &ty)?)?;
    let prior = match prior {
        Some(path) => loader.load_value(path, &ty)?,
        None => Value::Null(ty),
    };

    let proposed = proposed_new_object(&block, &prior, &config);
    emit(&formatter.format_value(&proposed))
}

/// Plan a resource instance and write the plan file.
async fn cmd_plan(
    config: &ToolConfig,
    loader: &SchemaLoader,
    schema: &Path,
    config_value: Option<&Path>,
    resource: &str,
    out: Option<PathBuf>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let block = load_schema(loader, schema)?;
    let value = match config_value {
        Some(path) => loader.load_value(path, &block.implied_type())?,
        None => Value::Null(block.implied_type()),
    };

    let store = LocalStateStore::with_base_dir(&config.state.dir);
    let reconciler = reconciler(config, &block, &store);
    let plan = reconciler.plan(resource, &value).await?;

    let out = out.unwrap_or_else(|| config.plan.out.clone());
    let content = serde_json::to_string_pretty(&plan)
        .map_err(|e| SchemaPlanError::internal(format!("Failed to serialize plan: {e}")))?;
    std::fs::write(&out, content)?;
    info!("Plan written to: {}", out.display());

    emit(&formatter.format_plan(&plan))
}

/// Apply a saved plan.
async fn cmd_apply(
    config: &ToolConfig,
    loader: &SchemaLoader,
    schema: &Path,
    plan_path: Option<PathBuf>,
    resource: Option<&str>,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let block = load_schema(loader, schema)?;
    let plan_path = plan_path.unwrap_or_else(|| config.plan.out.clone());
    let plan: ResourcePlan = loader.load_document(&plan_path)?;

    if let Some(resource) = resource {
        if resource != plan.addr {
            return Err(PlanError::ResourceNotFound {
                addr: format!("{resource} (plan {} is for {})", plan_path.display(), plan.addr),
            }
            .into());
        }
    }

    if !plan.has_changes() {
        eprintln!("No changes to apply.");
        return Ok(());
    }

    // Show plan
    eprintln!("{}", OutputFormatter::new(OutputFormat::Text).format_plan(&plan));

    // Confirm
    if !auto_approve {
        eprint!("Do you want to apply this plan? [y/N]: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            eprintln!("Apply cancelled.");
            return Ok(());
        }
    }

    let store = LocalStateStore::with_base_dir(&config.state.dir);
    let result = reconciler(config, &block, &store).apply(&plan).await?;

    emit(&formatter.format_apply(&result))
}

/// State management commands.
async fn cmd_state(config: &ToolConfig, command: StateCommands, formatter: &OutputFormatter) -> Result<()> {
    let store = LocalStateStore::with_base_dir(&config.state.dir);

    match command {
        StateCommands::List => match store.load().await? {
            Some(state) => emit(&formatter.format_state(&state)),
            None => {
                eprintln!("No state found at {}.", store.state_path().display());
                Ok(())
            }
        },
        StateCommands::Show { resource } => {
            let state = store.load_or_new().await?;
            let record = state
                .resources
                .get(&resource)
                .ok_or_else(|| PlanError::ResourceNotFound {
                    addr: resource.clone(),
                })?;
            emit(&formatter.format_record(&resource, record))
        }
        StateCommands::Rm { resource } => {
            let block = Block::new();
            if reconciler(config, &block, &store).forget(&resource).await? {
                eprintln!("Removed {resource} from state.");
            } else {
                eprintln!("{resource} is not in state.");
            }
            Ok(())
        }
        StateCommands::Unlock => {
            let removed = store.force_unlock().await?;
            emit(&formatter.format_unlock(removed.as_ref()))
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Loads the tool configuration and the `.env` next to it.
fn load_config(config_path: Option<&Path>) -> Result<ToolConfig> {
    let base = config_path
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    let parser = ConfigParser::new().with_base_path(base);
    parser.load_dotenv()?;
    let config = parser.load(config_path)?;
    debug!("State directory: {}", config.state.dir.display());
    Ok(config)
}

/// Loads and validates a schema.
fn load_schema(loader: &SchemaLoader, path: &Path) -> Result<Block> {
    let block = loader.load_schema(path)?;
    SchemaValidator::new().validate(&block)?;
    Ok(block)
}

/// Builds a reconciler from the tool configuration.
fn reconciler<'a, S: StateStore>(config: &ToolConfig, block: &'a Block, store: &'a S) -> Reconciler<'a, S> {
    Reconciler::new(block, store)
        .with_schema_version(config.plan.schema_version)
        .with_lock_holder(config.state.lock_holder.clone().unwrap_or_default())
        .with_lock(config.state.lock)
        .with_allow_schema_change(config.plan.allow_schema_change)
}

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(())
}
