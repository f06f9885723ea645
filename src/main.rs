use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use onboard_tools::commands::{self, BuildingName};
use onboard_tools::export::UpdateExportOptions;
use onboard_tools::export::update::DEFAULT_MAX_ITEMS;
use onboard_tools::{Result, Status, ToolError, pipeline};
use serde::Serialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::ExportUpdate(args) => {
            let options = UpdateExportOptions {
                use_change_flags: args.use_change_flags,
                subset: (!args.ids.is_empty())
                    .then(|| args.ids.into_iter().collect::<BTreeSet<_>>()),
                max_items: args.max_items,
            };
            let status =
                pipeline::export_update(&args.building, &args.changes, &options, &args.output)?;
            print_status(&status)
        }
        Command::ExportAdd(args) => {
            let status = pipeline::export_add(
                &args.building,
                &args.changes,
                args.use_change_flags,
                &args.output,
            )?;
            print_status(&status)
        }
        Command::UpdateEtags(args) => {
            let status = pipeline::update_etags(&args.building, &args.existing, &args.output)?;
            print_status(&status)
        }
        Command::Reconcile(args) => {
            let reconciliation = pipeline::reconcile(&args.existing, &args.new, &args.output)?;
            print_status(&reconciliation.plan.status)
        }
        Command::Extract(args) => {
            let table = pipeline::extract(&args.input, &args.ids, args.output.as_deref())?;
            if args.output.is_none() {
                print_json(&table)?;
            }
            Ok(())
        }
        Command::Remote(command) => {
            println!("{}", render_command(command)?);
            Ok(())
        }
    }
}

fn render_command(command: RemoteCommand) -> Result<String> {
    Ok(match command {
        RemoteCommand::ExportBuildingConfig { building, ids } => {
            let building = BuildingName::parse(&building)?;
            let ids = ids
                .as_deref()
                .map(commands::parse_id_list)
                .unwrap_or_default();
            commands::export_building_config(&building, &ids)
        }
        RemoteCommand::OnboardBuilding { building, config } => {
            commands::onboard_building(&BuildingName::parse(&building)?, &config)
        }
        RemoteCommand::GetOperation {
            building,
            operation,
            outfile,
        } => commands::get_operation(
            &BuildingName::parse(&building)?,
            &operation,
            outfile.as_deref(),
        ),
    })
}

fn print_status(status: &Status) -> Result<()> {
    if status.has_errors() {
        warn!(
            errors = status.errors.len(),
            "completed with errors to reconcile by hand"
        );
    }
    print_json(status)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Prepare building onboarding configs from building and change exports."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export chunked translation updates for reporting entities.
    ExportUpdate(ExportUpdateArgs),
    /// Export virtual entities split into add and update bundles.
    ExportAdd(ExportAddArgs),
    /// Refresh the etags of an existing bundle from a new building export.
    UpdateEtags(UpdateEtagsArgs),
    /// Reconcile a regenerated config with the onboarded one.
    Reconcile(ReconcileArgs),
    /// Flatten translations and links of selected entities into a table.
    Extract(ExtractArgs),
    /// Print a remote service invocation.
    #[command(subcommand)]
    Remote(RemoteCommand),
}

#[derive(clap::Args)]
struct ExportUpdateArgs {
    /// Building config export.
    #[arg(long)]
    building: PathBuf,

    /// Change document with the desired translations.
    #[arg(long)]
    changes: PathBuf,

    /// Output path ending in .yaml; chunks are written as <name>_pt<N>.yaml.
    #[arg(long)]
    output: PathBuf,

    /// Keep operation and update_mask from the change document.
    #[arg(long)]
    use_change_flags: bool,

    /// Only export these identifiers.
    #[arg(long, num_args = 1..)]
    ids: Vec<String>,

    /// Maximum number of entities per file.
    #[arg(long, default_value_t = DEFAULT_MAX_ITEMS)]
    max_items: NonZeroUsize,
}

#[derive(clap::Args)]
struct ExportAddArgs {
    /// Building config export, taken after the update bundles were onboarded.
    #[arg(long)]
    building: PathBuf,

    /// Change document with the virtual entities.
    #[arg(long)]
    changes: PathBuf,

    /// Output path ending in .yaml.
    #[arg(long)]
    output: PathBuf,

    /// Keep the operation from the change document instead of forcing ADD.
    #[arg(long)]
    use_change_flags: bool,
}

#[derive(clap::Args)]
struct UpdateEtagsArgs {
    /// Fresh building config export.
    #[arg(long)]
    building: PathBuf,

    /// Previously exported bundle.
    #[arg(long)]
    existing: PathBuf,

    /// Output path ending in .yaml; written as <name>_upd.yaml.
    #[arg(long)]
    output: PathBuf,
}

#[derive(clap::Args)]
struct ReconcileArgs {
    /// Onboarded config.
    #[arg(long)]
    existing: PathBuf,

    /// Regenerated config.
    #[arg(long)]
    new: PathBuf,

    /// Output path ending in .yaml.
    #[arg(long)]
    output: PathBuf,
}

#[derive(clap::Args)]
struct ExtractArgs {
    /// Documents to read.
    #[arg(long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    /// Entities to report.
    #[arg(long, required = true, num_args = 1..)]
    ids: Vec<String>,

    /// Excel workbook to write; rows are printed as JSON otherwise.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum RemoteCommand {
    /// Export the building config, optionally for selected entities.
    ExportBuildingConfig {
        /// Building code such as US-MTV-1234.
        #[arg(long)]
        building: String,

        /// Identifiers separated by commas, spaces or newlines.
        #[arg(long)]
        ids: Option<String>,
    },
    /// Onboard a config file.
    OnboardBuilding {
        #[arg(long)]
        building: String,

        /// Config file to upload as the topology.
        #[arg(long)]
        config: PathBuf,
    },
    /// Poll a long-running operation.
    GetOperation {
        #[arg(long)]
        building: String,

        #[arg(long)]
        operation: String,

        /// File receiving the binary response.
        #[arg(long)]
        outfile: Option<PathBuf>,
    },
}
