//! Flotilla - declarative fleet orchestrator
//!
//! Usage:
//!   flotilla apply <projects..>     # Create, start and sync instances
//!   flotilla destroy <projects..>   # Delete instances
//!   flotilla compile <project>      # Render config templates only
//!   flotilla validate               # Check loaded environments
//!   flotilla run <command>          # Apply a named command from an environment

mod prompt;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flotilla_core::config::{FlotillaConfig, load_config};
use flotilla_core::deploy::{ApplyOptions, AssumeYes, Confirmer, DestroyOptions, Orchestrator};
use flotilla_core::error::ComposeError;
use flotilla_core::executor::LxcExecutorFactory;
use flotilla_core::loader::{Inventory, ValidationReport};
use flotilla_core::specs::VarLayer;
use flotilla_core::template::{BuiltinEngines, compile_project};

use crate::prompt::TerminalConfirmer;

#[derive(Parser)]
#[command(name = "flotilla")]
#[command(about = "Declarative orchestrator for LXD fleets", long_about = None)]
struct Cli {
    /// Config file (defaults to ./.flotilla.toml, then the user config dir)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, start and sync the instances of one or more projects
    #[command(alias = "a")]
    Apply(ApplyArgs),

    /// Delete the instances of one or more projects
    #[command(alias = "d")]
    Destroy(DestroyArgs),

    /// Compile the config templates of a project without touching instances
    Compile {
        /// Project to compile
        project: String,

        /// Compile only these template sources
        #[arg(long = "source", short = 's', value_name = "SOURCE")]
        sources: Vec<String>,
    },

    /// Check loaded environments for duplicates and invalid hooks
    Validate {
        /// Report every problem instead of stopping at the first
        #[arg(long, short)]
        ignore_errors: bool,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Run a command declared in an environment file
    Run {
        /// Command name
        command: String,

        /// Extra project variable (KEY=VALUE), added after the command's own
        #[arg(long = "env", short = 'e', value_name = "KEY=VALUE")]
        envs: Vec<String>,

        /// Destroy the project once the apply is done
        #[arg(long)]
        destroy: bool,

        /// Skip upgrade confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

/// Flag, group and prefix selection shared by apply and destroy.
#[derive(Args)]
struct SelectionArgs {
    /// Run only hooks carrying one of these flags
    #[arg(long = "enable-flag", value_name = "FLAG")]
    enable_flags: Vec<String>,

    /// Never run hooks carrying one of these flags
    #[arg(long = "disable-flag", value_name = "FLAG")]
    disable_flags: Vec<String>,

    /// Process only these groups
    #[arg(long = "enable-group", value_name = "GROUP")]
    enable_groups: Vec<String>,

    /// Skip these groups
    #[arg(long = "disable-group", value_name = "GROUP")]
    disable_groups: Vec<String>,

    /// Prefix for instance names of groups and nodes without one
    #[arg(long, short = 'p')]
    nodes_prefix: Option<String>,
}

#[derive(Args)]
struct ApplyArgs {
    /// Projects to apply
    #[arg(required = true)]
    projects: Vec<String>,

    #[command(flatten)]
    selection: SelectionArgs,

    /// Extra project variable (KEY=VALUE), added after the vars files
    #[arg(long = "env", short = 'e', value_name = "KEY=VALUE")]
    envs: Vec<String>,

    /// Extra variables file added to each project
    #[arg(long = "vars-file", value_name = "FILE")]
    vars_files: Vec<PathBuf>,

    /// Do not push sync resources
    #[arg(long)]
    skip_sync: bool,

    /// Recreate instances that already exist
    #[arg(long, short)]
    upgrade: bool,

    /// Skip upgrade confirmation prompts
    #[arg(short = 'y', long)]
    yes: bool,
}

#[derive(Args)]
struct DestroyArgs {
    /// Projects to destroy
    #[arg(required = true)]
    projects: Vec<String>,

    #[command(flatten)]
    selection: SelectionArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    config.validate()?;

    let default_filter = if cli.debug || config.general.debug {
        "flotilla=debug,info"
    } else {
        "flotilla=info,warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut inventory = Inventory::load_dirs(config.env_dirs.as_slice())?;
    let factory = LxcExecutorFactory::new(
        config.general.lxd_confdir.clone(),
        config.logging.cmds_output,
    );

    match cli.command {
        Commands::Apply(args) => run_apply(&factory, &mut inventory, args),
        Commands::Destroy(args) => run_destroy(&factory, &mut inventory, args),
        Commands::Compile { project, sources } => run_compile(&inventory, &project, &sources),
        Commands::Validate {
            ignore_errors,
            format,
        } => run_validate(&config, &inventory, ignore_errors, format),
        Commands::Run {
            command,
            envs,
            destroy,
            yes,
        } => run_command(&factory, &mut inventory, &command, &envs, destroy, yes),
    }
}

fn run_apply(factory: &LxcExecutorFactory, inventory: &mut Inventory, args: ApplyArgs) -> Result<()> {
    let sel = args.selection;
    let mut opts = ApplyOptions::default()
        .with_flags_enabled(sel.enable_flags)
        .with_flags_disabled(sel.disable_flags)
        .with_groups_enabled(sel.enable_groups)
        .with_groups_disabled(sel.disable_groups)
        .with_skip_sync(args.skip_sync)
        .with_upgrade(args.upgrade)
        .with_ask(!args.yes);
    if let Some(prefix) = sel.nodes_prefix {
        opts = opts.with_nodes_prefix(prefix);
    }

    let mut extra = Vec::new();
    for file in &args.vars_files {
        extra.push(VarLayer::from_file(file)?);
    }
    if let Some(layer) = env_layer(&args.envs)? {
        extra.push(layer);
    }

    let terminal = TerminalConfirmer::new();
    let confirmer: &dyn Confirmer = if args.yes { &AssumeYes } else { &terminal };
    let orchestrator = Orchestrator::new(factory, &BuiltinEngines, confirmer);

    for name in &args.projects {
        let project = inventory
            .project_mut(name)
            .ok_or_else(|| ComposeError::ProjectNotFound(name.clone()))?;
        for layer in &extra {
            project.add_vars(layer.clone());
        }
        orchestrator.apply(inventory, name, &opts)?;
        println!("{} {}", style("Applied").green().bold(), name);
    }
    Ok(())
}

fn run_destroy(factory: &LxcExecutorFactory, inventory: &mut Inventory, args: DestroyArgs) -> Result<()> {
    let sel = args.selection;
    let mut opts = DestroyOptions::default()
        .with_flags_enabled(sel.enable_flags)
        .with_flags_disabled(sel.disable_flags)
        .with_groups_enabled(sel.enable_groups)
        .with_groups_disabled(sel.disable_groups);
    if let Some(prefix) = sel.nodes_prefix {
        opts = opts.with_nodes_prefix(prefix);
    }

    let orchestrator = Orchestrator::new(factory, &BuiltinEngines, &AssumeYes);
    for name in &args.projects {
        orchestrator.destroy(inventory, name, &opts)?;
        println!("{} {}", style("Destroyed").red().bold(), name);
    }
    Ok(())
}

fn run_compile(inventory: &Inventory, project: &str, sources: &[String]) -> Result<()> {
    let compiled = compile_project(inventory, project, sources)?;
    info!("Compiled {compiled} templates of project {project}");
    Ok(())
}

fn run_validate(
    config: &FlotillaConfig,
    inventory: &Inventory,
    ignore_errors: bool,
    format: OutputFormat,
) -> Result<()> {
    let report = inventory.validate(ignore_errors)?;
    match format {
        OutputFormat::Table => print_report(config, inventory, &report),
        OutputFormat::Json => print_report_json(inventory, &report)?,
    }

    if !report.is_clean() {
        anyhow::bail!("{} problems found", report.messages.len());
    }
    Ok(())
}

fn run_command(
    factory: &LxcExecutorFactory,
    inventory: &mut Inventory,
    name: &str,
    envs: &[String],
    destroy: bool,
    yes: bool,
) -> Result<()> {
    let (env, cmd) = inventory
        .find_command(name)
        .ok_or_else(|| anyhow::anyhow!("No command found with name {name}"))?;
    let mut cmd = cmd.clone();
    let base_dir = env.base_dir()?;
    cmd.destroy |= destroy;

    let project = inventory
        .project_mut(&cmd.project)
        .ok_or_else(|| ComposeError::ProjectNotFound(cmd.project.clone()))?;
    cmd.prepare_project(project, &base_dir)?;
    if let Some(layer) = env_layer(envs)? {
        project.add_vars(layer);
    }

    let terminal = TerminalConfirmer::new();
    let confirmer: &dyn Confirmer = if yes { &AssumeYes } else { &terminal };
    Orchestrator::new(factory, &BuiltinEngines, confirmer).run_command(inventory, &cmd, !yes)?;
    println!("{} {}", style("Completed").green().bold(), cmd.name);
    Ok(())
}

/// One variable layer from `KEY=VALUE` pairs, if any were given.
fn env_layer(pairs: &[String]) -> Result<Option<VarLayer>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut layer = VarLayer::new();
    for pair in pairs {
        layer.add_kv(pair)?;
    }
    Ok(Some(layer))
}

// =============================================================================
// Output
// =============================================================================

fn print_report(config: &FlotillaConfig, inventory: &Inventory, report: &ValidationReport) {
    println!("{}", style("Environments").bold());
    for dir in &config.env_dirs {
        println!("  dir: {}", dir.display());
    }
    println!("  Loaded environments: {}", inventory.environments().len());
    println!("  Projects:            {}", inventory.project_names().len());
    println!();

    let rows = [
        ("Duplicated projects", report.duplicated_projects),
        ("Duplicated groups", report.duplicated_groups),
        ("Duplicated nodes", report.duplicated_nodes),
        ("Duplicated commands", report.duplicated_commands),
        ("Invalid hooks", report.invalid_hooks),
        ("Invalid commands", report.invalid_commands),
    ];
    for (label, count) in rows {
        if count > 0 {
            println!("  {:<20} {}", label, style(count).red());
        }
    }

    if report.is_clean() {
        println!("{}", style("Validation OK").green());
    } else {
        for message in &report.messages {
            println!("  - {message}");
        }
    }
}

fn print_report_json(inventory: &Inventory, report: &ValidationReport) -> Result<()> {
    let output = serde_json::json!({
        "schema_version": 1,
        "environments": inventory.environments().len(),
        "projects": inventory.project_names(),
        "duplicated_projects": report.duplicated_projects,
        "duplicated_groups": report.duplicated_groups,
        "duplicated_nodes": report.duplicated_nodes,
        "duplicated_commands": report.duplicated_commands,
        "invalid_hooks": report.invalid_hooks,
        "invalid_commands": report.invalid_commands,
        "messages": report.messages,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
