//! CLI Entry Point for wdi-autofocus
//!
//! Drives the WDI autofocus driver against the simulated transport described by
//! the `[simulation]` configuration section:
//! - List and read properties
//! - Run single-shot focus, read the focus score
//! - Toggle continuous focusing and report status
//!
//! # Usage
//!
//! ```bash
//! wdi-autofocus --config config/autofocus.toml properties
//! wdi-autofocus --set "WDI Hostname/IP=10.0.0.5" focus --incremental
//! wdi-autofocus --log-format json continuous on
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use wdi_autofocus::config::AutofocusConfig;
use wdi_autofocus::hardware::mock::MockAutofocusTransport;
use wdi_autofocus::hardware::{AutoFocus, Device, WdiAutofocus};
use wdi_autofocus::logging::{self, OutputFormat, TracingConfig};
use wdi_autofocus::properties::{self, PropertyValue, PROPERTIES};

#[derive(Parser)]
#[command(name = "wdi-autofocus")]
#[command(about = "Drive a WDI autofocus against the simulated transport", long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/autofocus.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, default_value = "pretty")]
    log_format: String,

    /// Property assignment applied before the command, as NAME=VALUE
    #[arg(long = "set", value_name = "NAME=VALUE", global = true)]
    set: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every property with its current value
    Properties,

    /// Print one property value
    Get {
        /// Property name, e.g. "WDI Port"
        name: String,
    },

    /// Focus once and print the resulting score
    Focus {
        /// Focus from the current position instead of scanning the full range
        #[arg(long)]
        incremental: bool,
    },

    /// Print the current focus score
    Score,

    /// Print connection and focus status
    Status,

    /// Start or stop continuous focusing
    Continuous {
        /// Desired state
        #[arg(value_enum)]
        state: Toggle,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AutofocusConfig::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AutofocusConfig::load().context("loading configuration")?,
    };
    config.validate()?;

    let format: OutputFormat = cli.log_format.parse()?;
    logging::init(TracingConfig::from_config(&config)?.with_format(format))?;
    info!(application = %config.application.name, "Starting");

    let transport = Arc::new(MockAutofocusTransport::from_simulation(&config.simulation));
    let mut autofocus = WdiAutofocus::from_config(&config, transport)?;

    let assignments = cli
        .set
        .iter()
        .map(|text| Assignment::parse(text))
        .collect::<Result<Vec<_>>>()?;
    let (pre_init, post_init): (Vec<_>, Vec<_>) =
        assignments.into_iter().partition(|a| a.pre_init);

    let outcome = run(&mut autofocus, cli.command, pre_init, post_init).await;
    autofocus.shutdown().await?;
    outcome
}

/// A `--set NAME=VALUE` argument, parsed by the property's kind.
struct Assignment {
    name: &'static str,
    value: PropertyValue,
    pre_init: bool,
}

impl Assignment {
    fn parse(text: &str) -> Result<Self> {
        let (name, raw) = text
            .split_once('=')
            .with_context(|| format!("expected NAME=VALUE, got '{}'", text))?;
        let descriptor = properties::descriptor(name.trim())?;
        Ok(Self {
            name: descriptor.name,
            value: PropertyValue::parse(descriptor.name, descriptor.kind, raw)?,
            pre_init: descriptor.pre_init,
        })
    }
}

async fn apply(autofocus: &mut WdiAutofocus, assignments: Vec<Assignment>) -> Result<()> {
    for assignment in assignments {
        let name = assignment.name;
        autofocus
            .set_property(name, assignment.value)
            .await
            .with_context(|| format!("setting '{}'", name))?;
    }
    Ok(())
}

/// Apply connection settings, initialize, then apply the settings that only
/// exist on an initialized device (the initial device read would overwrite them).
async fn prepare(
    autofocus: &mut WdiAutofocus,
    pre_init: Vec<Assignment>,
    post_init: Vec<Assignment>,
    initialize: bool,
) -> Result<()> {
    apply(autofocus, pre_init).await?;
    if initialize {
        autofocus.initialize().await?;
    }
    apply(autofocus, post_init).await
}

async fn run(
    autofocus: &mut WdiAutofocus,
    command: Commands,
    pre_init: Vec<Assignment>,
    post_init: Vec<Assignment>,
) -> Result<()> {
    let needs_device = !matches!(command, Commands::Properties | Commands::Get { .. });
    prepare(autofocus, pre_init, post_init, needs_device).await?;

    match command {
        Commands::Properties => {
            for descriptor in PROPERTIES.iter() {
                let access = if descriptor.read_only { "ro" } else { "rw" };
                println!(
                    "{:<32} {}  {}",
                    descriptor.name,
                    access,
                    autofocus.get_config(descriptor.field)
                );
            }
        }
        Commands::Get { name } => {
            println!("{}", autofocus.get_property(&name)?);
        }
        Commands::Focus { incremental } => {
            if incremental {
                autofocus.incremental_focus().await?;
            } else {
                autofocus.full_focus().await?;
            }
            println!("Focus score: {:.4}", autofocus.current_focus_score().await?);
        }
        Commands::Score => {
            println!("{:.4}", autofocus.current_focus_score().await?);
        }
        Commands::Status => {
            let busy = autofocus.is_busy().await;
            let locked = autofocus.is_focus_locked().await;
            let config = autofocus.config();
            println!("Connection:  {:?}", autofocus.connection_state());
            println!("Endpoint:    {}:{}", config.wdi_host, config.wdi_port);
            println!("Limits [mm]: {} .. {}", config.limit_min, config.limit_max);
            println!("Busy:        {}", busy);
            println!("In focus:    {}", locked);
        }
        Commands::Continuous { state } => {
            autofocus
                .set_continuous_focusing(matches!(state, Toggle::On))
                .await?;
            println!(
                "Continuous focusing: {}",
                if autofocus.continuous_focusing().await {
                    "running"
                } else {
                    "stopped"
                }
            );
        }
    }
    Ok(())
}
