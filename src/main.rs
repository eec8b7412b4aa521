use std::{error::Error, net::SocketAddr, path::PathBuf, process, sync::Arc, time::Duration};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, LevelFilter};
use url::Url;

use ynison_bridge::{
    catalog,
    config::{self, Config},
    server::{self, AppState},
    session::Session,
    signal,
    token::Token,
    transport,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when built in release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, PartialEq, Eq, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// OAuth token
    ///
    /// Takes precedence over the secrets file. Required by `now-playing` and
    /// `play`; the server takes tokens from request headers instead.
    #[arg(short, long, env = "YNISON_TOKEN", hide_env_values = true)]
    token: Option<Token>,

    /// Secrets file
    ///
    /// TOML file with a `token` key. Ensure that this file is kept secure
    /// and not shared publicly, as it grants access to your account.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value = "secrets.toml")]
    secrets_file: PathBuf,

    /// Discovery endpoint
    #[arg(long, value_name = "URL", env = "YNISON_DISCOVERY_URL", default_value = config::DISCOVERY_URL)]
    discovery_url: Url,

    /// Catalog API base URL
    #[arg(long, value_name = "URL", env = "YNISON_CATALOG_URL", default_value = config::CATALOG_URL)]
    catalog_url: Url,

    /// Seconds to wait for each handshake and reply
    #[arg(long, value_name = "SECONDS", default_value_t = 10)]
    handshake_timeout: u64,

    /// Seconds the server allows for each request
    #[arg(long, value_name = "SECONDS", default_value_t = 30)]
    request_timeout: u64,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Serve the HTTP interface
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "YNISON_BIND", default_value = "0.0.0.0:8000")]
        bind: SocketAddr,

        /// Directory with static files
        #[arg(long, value_hint = ValueHint::DirPath, default_value = "./static")]
        static_dir: PathBuf,
    },

    /// Print the current session state as JSON
    NowPlaying,

    /// Start playing a track on the active device
    Play {
        /// Catalog track id
        track_id: u64,
    },
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(args: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if args.quiet || args.verbose > 0 {
        let level = match args.verbose {
            // Quiet and verbose are mutually exclusive, and `verbose` is 0
            // by default. So this arm means: quiet mode.
            0 => LevelFilter::Warn,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Loads the token from the command line or the secrets file.
fn load_token(args: &Args) -> ynison_bridge::error::Result<Token> {
    if let Some(token) = &args.token {
        return Ok(token.clone());
    }

    let token = Token::from_file(&args.secrets_file);
    if let Err(ref e) = token {
        if e.kind == ynison_bridge::error::ErrorKind::NotFound {
            info!(
                "pass --token or set the token in {}",
                args.secrets_file.display()
            );
        }
    }
    token
}

fn config(args: &Args) -> Config {
    let mut config = Config {
        discovery_url: args.discovery_url.clone(),
        catalog_url: args.catalog_url.clone(),
        handshake_timeout: Duration::from_secs(args.handshake_timeout),
        request_timeout: Duration::from_secs(args.request_timeout),
        ..Config::default()
    };

    if let Command::Serve { bind, static_dir } = &args.command {
        config.bind = *bind;
        config.static_dir.clone_from(static_dir);
    }

    config
}

/// Runs the selected command.
///
/// # Errors
///
/// Returns an error when the token cannot be loaded, a protocol operation
/// fails, or the server cannot be started.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = config(&args);
    let session = Session::new(config.clone())?;

    match &args.command {
        Command::Serve { .. } => {
            let catalog =
                catalog::Client::new(transport::shared(&config)?, config.catalog_url.clone());
            let state = AppState::new(session, Arc::new(catalog));

            let shutdown = signal::on_shutdown(transport::shutdown)?;
            server::serve(state, async move {
                shutdown.await;
            })
            .await?;
        }

        Command::NowPlaying => {
            let token = load_token(&args)?;
            let state = session.current_state(&token).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }

        Command::Play { track_id } => {
            let token = load_token(&args)?;
            let pushed = session.push_track(&token, *track_id).await?;
            println!("{pushed}");
        }
    }

    transport::shutdown();
    Ok(())
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and runs the selected command.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {args:#?}");

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();
    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        transport::shutdown();
        process::exit(1);
    }
}
