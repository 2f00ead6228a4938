//! The command line interface for powermatch.
use crate::dispatch::dispatch;
use crate::input::load_model;
use crate::log;
use crate::metrics::summarise;
use crate::model::Model;
use crate::optimisation::{LogProgress, optimise};
use crate::output::{DataWriter, create_output_directory, get_output_dir};
use crate::settings::Settings;
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for powermatch.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for commands which write output files
#[derive(Args)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Whether to write the hourly dispatch of every facility
    #[arg(long)]
    pub debug_model: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Dispatch a fleet over a year and calculate its costs.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Search for the facility capacities which best meet the model's objective.
    Optimise {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Seed for the random number generator (overrides the model file)
        #[arg(long)]
        seed: Option<u64>,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Validate a model.
    Validate {
        /// The path to the model directory.
        model_dir: PathBuf,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => handle_run_command(&model_dir, &opts, None),
            Self::Optimise {
                model_dir,
                seed,
                opts,
            } => handle_optimise_command(&model_dir, &opts, seed, None),
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and start powermatch
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ powermatch --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load settings if the caller didn't provide them, applying command-line overrides
fn resolve_settings(settings: Option<Settings>, opts: &RunOpts) -> Result<Settings> {
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    Ok(settings.with_run_options(opts.overwrite, opts.debug_model))
}

/// Initialise the logger unless an earlier command in this process already has
fn init_logger(settings: &Settings, log_file_path: Option<&Path>) -> Result<()> {
    if log::is_logger_initialised() {
        return Ok(());
    }

    log::init(Some(&settings.log_level), log_file_path).context("Failed to initialise logging.")
}

/// Create the output folder, start logging and load the model
fn prepare(
    model_path: &Path,
    opts: &RunOpts,
    settings: &Settings,
) -> Result<(Model, PathBuf)> {
    let output_path = match &opts.output_dir {
        Some(path) => path.clone(),
        None => get_output_dir(model_path)?,
    };

    let overwrite =
        create_output_directory(&output_path, settings.overwrite).with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    init_logger(settings, Some(&output_path))?;

    let model = load_model(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    Ok((model, output_path))
}

/// Dispatch a model and write its summary
fn dispatch_and_write(model: &Model, writer: &mut DataWriter) -> Result<()> {
    let result = dispatch(model);
    let summary = summarise(model, &result);
    if let Some(lcoe) = summary.totals.lcoe_with_carbon {
        info!("Fleet LCOE including carbon: {lcoe}");
    }
    if let Some(load_met_pct) = summary.analysis.load_met_pct {
        info!("Load met: {load_met_pct:.2}%");
    }

    writer.write_summary(&summary)?;
    writer.write_debug_info(model, &result)?;

    Ok(())
}

/// Handle the `run` command.
pub fn handle_run_command(
    model_path: &Path,
    opts: &RunOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = resolve_settings(settings, opts)?;
    let (model, output_path) = prepare(model_path, opts, &settings)?;

    let mut writer = DataWriter::create(&output_path, settings.debug_model)?;
    dispatch_and_write(&model, &mut writer)?;
    writer.flush()?;
    info!("Dispatch complete!");

    Ok(())
}

/// Handle the `optimise` command.
///
/// The summary written is that of the fleet with the best LCOE score.
pub fn handle_optimise_command(
    model_path: &Path,
    opts: &RunOpts,
    seed: Option<u64>,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = resolve_settings(settings, opts)?;
    let (mut model, output_path) = prepare(model_path, opts, &settings)?;
    if seed.is_some() {
        model.parameters.optimisation.seed = seed;
    }

    let cancel = AtomicBool::new(false);
    let result = optimise(&model, &cancel, &mut LogProgress)?;

    let mut writer = DataWriter::create(&output_path, settings.debug_model)?;
    writer.write_optimisation(&result)?;
    if let Some(best) = &result.best_lcoe {
        for (id, capacity) in &best.capacities {
            info!("Best LCOE fleet: {id} = {capacity}");
        }

        let sized = result.apply(&model, best)?;
        dispatch_and_write(&sized, &mut writer)?;
    } else {
        warn!("No fleet was evaluated");
    }
    writer.flush()?;
    info!(
        "Optimisation complete after {} generations (seed {})",
        result.generations_run, result.seed
    );

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    // Load program settings, if not provided
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // We won't save log files when running the validate command
    init_logger(&settings, None)?;

    // Load/validate the model
    load_model(model_path).context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}
