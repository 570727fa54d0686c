//! boxctl CLI - Main entry point

mod cli;
mod style;

use boxctl_exec::ExecError;
use boxctl_foundation::BoxConfig;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// boxctl - drive a local development VM and its containers
#[derive(Parser, Debug)]
#[command(name = "boxctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// App name (overrides config and the current directory name)
    #[arg(long, global = true)]
    app: Option<String>,

    /// Vagrant provider (virtualbox, vmware_fusion, ...)
    #[arg(long, global = true)]
    provider: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the state of the app's VM
    Status,
    /// Run a vagrant command from the app directory
    Vagrant {
        /// Arguments passed to vagrant
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
    /// Run a hook inside a container
    Exec {
        /// Container id or name
        container: String,
        /// Hook name under the hook root
        hook: String,
        /// Payload passed as the hook's single argument
        payload: Option<String>,
    },
    /// Print the merged configuration
    Config {
        /// Also write it to the project store (./.boxctl/config.json)
        #[arg(long)]
        save: bool,
        /// With --save, write to the global store instead
        #[arg(long, requires = "save")]
        global: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Load configuration
    let mut config = BoxConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        BoxConfig::new()
    });
    if let Some(app) = &args.app {
        config = config.with_app_name(app.clone());
    }
    if let Some(provider) = &args.provider {
        config = config.with_provider(provider.clone());
    }

    let result = match &args.command {
        Command::Status => cli::status(&config).await,
        Command::Vagrant { args } => cli::vagrant(&config, args).await,
        Command::Exec {
            container,
            hook,
            payload,
        } => cli::exec_hook(&config, container, hook, payload.clone()).await,
        Command::Config { save, global } => {
            let target = match (*save, *global) {
                (false, _) => None,
                (true, false) => Some(cli::SaveTarget::Project),
                (true, true) => Some(cli::SaveTarget::Global),
            };
            cli::show_config(&config, target)
        }
    };

    if let Err(e) = result {
        eprint!("{}", style::error(&format!("{:#}", e)));
        std::process::exit(exit_code(&e));
    }

    Ok(())
}

/// Mirror a failed command's exit code; 1 for everything else
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ExecError>())
        .and_then(ExecError::exit_code)
        .and_then(|code| i32::try_from(code).ok())
        .filter(|code| *code > 0)
        .unwrap_or(1)
}
