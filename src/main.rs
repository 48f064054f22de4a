//! EchoLog Server Binary
//!
//! Durable append-and-echo TCP message board service.

use clap::Parser;
use echolog::config::ServerConfig;
use echolog::server::EchoServer;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "echolog-server")]
#[command(about = "Durable append-and-echo TCP message board")]
#[command(version)]
struct Args {
    /// Run detached from the controlling terminal
    #[arg(short, long)]
    daemon: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "config/echolog.toml")]
    config: PathBuf,

    /// TCP port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Data file backing the shared board
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    // Detach before the runtime exists; forking live runtime threads is
    // not supported
    #[cfg(unix)]
    if args.daemon {
        if let Err(e) = echolog::daemon::daemonize() {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
    #[cfg(not(unix))]
    if args.daemon {
        eprintln!("Detached mode is only supported on Unix");
        process::exit(1);
    }

    init_tracing(args.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            process::exit(1);
        }
    };

    process::exit(runtime.block_on(run(args)));
}

async fn run(args: Args) -> i32 {
    info!("Starting EchoLog Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = if args.config.exists() {
        match ServerConfig::from_file(&args.config) {
            Ok(config) => config,
            Err(e) => {
                error!("{}", e);
                return 1;
            }
        }
    } else {
        info!("Config file not found, using defaults");
        ServerConfig::default()
    };

    // Override config with CLI arguments
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(data_file) = args.data_file {
        config.storage.data_file = data_file;
    }

    info!(
        "Listening on {}:{}",
        config.server.bind_address, config.server.port
    );
    info!("Data file: {}", config.storage.data_file.display());

    // Any socket, bind, or listen failure is fatal before serving starts
    let mut server = match EchoServer::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let exit_code = tokio::select! {
        result = server.serve() => match result {
            Ok(()) => 0,
            Err(e) => {
                error!("Server error: {}", e);
                1
            }
        },
        _ = shutdown_signal() => {
            info!("Caught signal, exiting");
            0
        }
    };

    server.shutdown().await;
    exit_code
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "echolog=debug,info"
    } else {
        "echolog=info,warn,error"
    };

    #[cfg(feature = "journald")]
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        match tracing_journald::layer() {
            Ok(journald) => {
                tracing_subscriber::registry()
                    .with(tracing_subscriber::EnvFilter::new(filter))
                    .with(journald)
                    .init();
                return;
            }
            Err(e) => eprintln!("Journal unavailable, logging to stderr: {}", e),
        }
    }

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Completes when either of the two termination signals arrives
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt =
        signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");
    let mut terminate =
        signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
}
