mod config;
mod wizard;

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use component_vv::Component;
use serde_json::{Map, Value};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use vv_spec::{
    FileStore, HandlebarsRenderer, JsonRenderer, MemoryStore, Renderer, SpeciesCatalog,
    WizardController, WizardService, catalog_schema,
};

use config::Settings;
use wizard::{Verbosity, WizardPresenter};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Register animals for vet visits",
    long_about = "Runs the species and headcount wizard interactively, or one step at a time against flows kept on disk"
)]
struct Cli {
    /// TOML settings file (defaults to ./vetvisits.toml when present).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log debug events to stderr.
    #[arg(long, global = true, alias = "debug")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the whole registration in a text shell.
    Wizard {
        /// Render pages as text or as the JSON view data.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// List species and their count fields.
    Species,
    /// Print the JSON Schema for catalog files.
    Schema,
    /// Start a flow and print its id.
    Begin,
    /// Choose species for a flow.
    Select {
        #[arg(long, value_name = "FLOW")]
        flow: String,
        /// Species keys, e.g. `cattle sheep`.
        #[arg(value_name = "KEY")]
        species: Vec<String>,
    },
    /// Submit animal counts for a flow.
    Counts {
        #[arg(long, value_name = "FLOW")]
        flow: String,
        /// Count fields, e.g. `cattle_bulls=2`.
        #[arg(value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        fields: Vec<(String, String)>,
    },
    /// Issue the reference number and clear the flow.
    Complete {
        #[arg(long, value_name = "FLOW")]
        flow: String,
    },
    /// Print the stored state of a flow.
    Show {
        #[arg(long, value_name = "FLOW")]
        flow: String,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let settings = Settings::load(cli.config.as_deref())?;
    debug!(state_dir = %settings.state_dir.display(), "settings loaded");

    match cli.command {
        Command::Wizard { format } => run_wizard(&settings, format, cli.verbose),
        Command::Species => run_species(&settings),
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&catalog_schema())?);
            Ok(())
        }
        Command::Begin => print_envelope(&step_component(&settings)?.begin()),
        Command::Select { flow, species } => {
            let keys = serde_json::to_string(&species)?;
            print_envelope(&step_component(&settings)?.select_species(&flow, &keys))
        }
        Command::Counts { flow, fields } => {
            let fields: Map<String, Value> = fields
                .into_iter()
                .map(|(field, value)| (field, Value::String(value)))
                .collect();
            let fields_json = Value::Object(fields).to_string();
            print_envelope(&step_component(&settings)?.submit_counts(&flow, &fields_json))
        }
        Command::Complete { flow } => print_envelope(&step_component(&settings)?.complete(&flow)),
        Command::Show { flow } => print_envelope(&step_component(&settings)?.describe_flow(&flow)),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
    {
        eprintln!("failed to install logger: {}", err);
    }
}

fn load_catalog(settings: &Settings) -> CliResult<SpeciesCatalog> {
    match &settings.catalog_path {
        Some(path) => {
            let catalog = SpeciesCatalog::from_path(path)?;
            info!(path = %path.display(), species = catalog.species().len(), "catalog loaded");
            Ok(catalog)
        }
        None => Ok(SpeciesCatalog::default()),
    }
}

fn step_component(settings: &Settings) -> CliResult<Component<FileStore>> {
    let catalog = load_catalog(settings)?;
    let mut store = FileStore::open(settings.state_dir.clone())?;
    if let Some(ttl) = settings.flow_ttl() {
        store = store.with_ttl(ttl);
    }
    Ok(Component::from_controller(WizardController::new(
        catalog,
        store,
        settings.wizard.clone(),
    )))
}

/// Pretty-prints a component envelope; an unsuccessful one fails the command.
fn print_envelope(response: &str) -> CliResult<()> {
    let value: Value = serde_json::from_str(response)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    if value["success"].as_bool() == Some(true) {
        Ok(())
    } else {
        let message = value["error"].as_str().unwrap_or("request failed");
        Err(message.into())
    }
}

fn run_species(settings: &Settings) -> CliResult<()> {
    let catalog = load_catalog(settings)?;
    for species in catalog.species() {
        println!("{} ({})", species.name, species.key);
        for (sub, key) in species.subcategories.iter().zip(species.count_keys()) {
            println!("  {:<28} {}", key.field_name(), sub.name);
        }
    }
    Ok(())
}

fn run_wizard(settings: &Settings, format: RenderMode, verbose: bool) -> CliResult<()> {
    let catalog = load_catalog(settings)?;
    let store = match settings.flow_ttl() {
        Some(ttl) => MemoryStore::with_ttl(ttl),
        None => MemoryStore::new(),
    };
    let renderer: Box<dyn Renderer> = match format {
        RenderMode::Text => {
            let mut renderer = HandlebarsRenderer::new()?;
            if let Some(dir) = &settings.templates_dir {
                renderer = renderer.with_template_dir(dir)?;
            }
            Box::new(renderer)
        }
        RenderMode::Json => Box::new(JsonRenderer),
    };

    let controller = WizardController::new(catalog, store, settings.wizard.clone());
    let service = WizardService::new(controller, renderer);
    let presenter = WizardPresenter::new(Verbosity::from_verbose(verbose));
    wizard::run(&service, &presenter)
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{}'", raw))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{}'", raw));
    }
    Ok((field.to_string(), value.to_string()))
}
