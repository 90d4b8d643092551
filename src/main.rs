use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gadgetswitch::config::ConfigStore;
use gadgetswitch::controller::ModeController;
use gadgetswitch::events::EventBus;
use gadgetswitch::gadget::{configfs, GadgetDescriptor, GadgetShell, UdcPort};
use gadgetswitch::profile::ConfigfsProfileFactory;
use gadgetswitch::registry::{Template, TemplateRegistry};
use gadgetswitch::trigger::{ControlSocket, GpioTrigger};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// gadgetswitch command line arguments
#[derive(Parser, Debug)]
#[command(name = "gadgetswitch")]
#[command(version, about = "Dynamic USB gadget mode switching service", long_about = None)]
struct CliArgs {
    /// Configuration file path
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        default_value = "/etc/gadgetswitch/gadgetswitch.toml"
    )]
    config: PathBuf,

    /// Control socket path (overrides config file)
    #[arg(short = 's', long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Mode to apply at startup (overrides config file)
    #[arg(short = 'm', long, value_name = "MODE")]
    initial_mode: Option<String>,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting gadgetswitch v{}", env!("CARGO_PKG_VERSION"));

    let config_store = ConfigStore::load(&args.config)?;
    let mut config = (*config_store.get()).clone();

    // Apply CLI argument overrides (only if explicitly specified)
    if let Some(socket) = args.socket {
        config.triggers.control.socket = socket;
    }
    if let Some(mode) = args.initial_mode {
        config.initial_mode = Some(mode);
    }

    if !configfs::is_configfs_available() {
        anyhow::bail!(
            "configfs usb_gadget support not available at {} (libcomposite loaded?)",
            configfs::CONFIGFS_PATH
        );
    }

    // Build the template registry from the configuration file.
    let mut registry = TemplateRegistry::new();
    for entry in &config.templates {
        registry.register(Template::new(&entry.name, entry.profile.clone()))?;
    }
    if registry.is_empty() {
        tracing::warn!("no templates configured, only detached operation possible");
    }
    let registry = Arc::new(registry);

    // Gadget skeleton shared by all modes.
    let descriptor = GadgetDescriptor {
        vendor_id: config.gadget.vendor_id,
        product_id: config.gadget.product_id,
        device_version: config.gadget.device_version,
        manufacturer: config.gadget.manufacturer.clone(),
        product: config.gadget.product.clone(),
        serial_number: config.gadget.serial_number.clone(),
    };
    let mut shell = GadgetShell::new(
        Path::new(configfs::CONFIGFS_PATH),
        &config.gadget.name,
        descriptor,
    );
    shell.create()?;

    let transport = Arc::new(
        UdcPort::new(shell.gadget_path(), config.gadget.udc.clone()).with_timing(
            Duration::from_millis(config.transport.settle_delay_ms),
            Duration::from_millis(config.transport.op_timeout_ms),
        ),
    );
    let factory = Arc::new(ConfigfsProfileFactory::new(
        shell.gadget_path(),
        shell.config_path(),
    ));

    let events = Arc::new(EventBus::new());
    let controller = Arc::new(ModeController::new(
        registry,
        transport,
        factory,
        events.clone(),
    ));

    // Log everything the controller publishes.
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            tracing::debug!(?event, "mode event");
        }
    });

    // Apply the startup mode before any trigger can race it.
    if let Some(mode) = &config.initial_mode {
        if let Err(e) = controller.switch_to(mode).await {
            tracing::error!("initial mode '{}' failed: {}", mode, e);
        }
    }

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    if config.triggers.control.enabled {
        let socket = ControlSocket::new(controller.clone(), &config.triggers.control.socket);
        let serve_cancel = cancel.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = socket.serve(serve_cancel).await {
                tracing::error!("control socket failed: {}", e);
            }
        }));
    }
    if config.triggers.gpio.enabled {
        match GpioTrigger::new(controller.clone(), config.triggers.gpio.clone())
            .spawn(cancel.clone())
        {
            Ok(handle) => tasks.push(handle),
            Err(e) => tracing::error!("gpio trigger unavailable: {}", e),
        }
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal");

    // Ordered shutdown: stop triggers, detach and tear down the active
    // mode, then remove the skeleton.
    cancel.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!("trigger task failed: {}", e);
        }
    }
    controller.shutdown().await;
    if let Err(e) = shell.remove() {
        tracing::warn!("failed to remove gadget skeleton: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    // Build filter string based on effective level
    let filter = match effective_level {
        LogLevel::Error => "gadgetswitch=error",
        LogLevel::Warn => "gadgetswitch=warn",
        LogLevel::Info => "gadgetswitch=info",
        LogLevel::Verbose => "gadgetswitch=debug",
        LogLevel::Debug => "gadgetswitch=debug,tokio=debug",
        LogLevel::Trace => "gadgetswitch=trace,tokio=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("Failed to initialize logging: {}", err);
    }
}
