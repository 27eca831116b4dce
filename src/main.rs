use std::{error::Error, path::Path, process};

use clap::{command, Parser, Subcommand, ValueHint};
use log::{debug, error, info, warn, LevelFilter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use veil::Redact;

use mirrorsrc::{
    config::Config,
    events::Event,
    http::Client,
    mirror::MirrorResolver,
    resolver::Resolver,
    retry::RetryPolicy,
    source::Providers,
    track::ResolvedItem,
    track_state,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Configuration file read when none is given and it exists.
const DEFAULT_CONFIG_FILE: &str = "mirrorsrc.toml";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, PartialEq, Eq, Parser, Redact)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    ///
    /// [default: mirrorsrc.toml, if it exists]
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    config: Option<String>,

    /// Last.fm API key
    ///
    /// Overrides the key from the configuration file.
    #[arg(long, env = "LASTFM_API_KEY", hide_env_values = true)]
    #[redact]
    lastfm_api_key: Option<String>,

    /// Tidal API token
    ///
    /// Overrides the token from the configuration file.
    #[arg(long, env = "TIDAL_TOKEN", hide_env_values = true)]
    #[redact]
    tidal_token: Option<String>,

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
    /// Resolve an identifier and print the result
    Resolve {
        /// Provider URL or `<prefix>:<query>` search
        identifier: String,
    },

    /// Resolve an identifier and print a playable stream for its first track
    ///
    /// Tracks without a stream of their own are looked up on the configured
    /// mirror providers. Press Ctrl-C to abort the search.
    Play {
        /// Provider URL or `<prefix>:<query>` search
        identifier: String,
    },

    /// Resolve an identifier and print each track as a base64 record
    Encode {
        /// Provider URL or `<prefix>:<query>` search
        identifier: String,
    },

    /// Print a track from a base64 record
    Decode {
        /// Record as printed by `encode`
        record: String,
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
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Loads the configuration and applies command line overrides.
///
/// An explicitly given file must exist. The default file is optional.
fn load_config(args: &Args) -> mirrorsrc::error::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Config::from_file(DEFAULT_CONFIG_FILE)?,
        None => {
            info!("no {DEFAULT_CONFIG_FILE} found, using defaults");
            Config::default()
        }
    };

    if let Some(api_key) = &args.lastfm_api_key {
        config.lastfm.api_key.clone_from(api_key);
    }
    if let Some(token) = &args.tidal_token {
        config.tidal.token.clone_from(token);
    }

    config.validate()?;
    Ok(config)
}

/// Resolves `identifier`, treating an unhandled identifier or an error
/// item as failure.
async fn resolve(
    resolver: &Resolver<Client>,
    identifier: &str,
    cancel: &CancellationToken,
) -> Result<ResolvedItem, Box<dyn Error>> {
    match resolver.resolve_with_cancel(identifier, cancel).await {
        Some(ResolvedItem::Error(e)) => Err(e.into()),
        Some(item) => Ok(item),
        None => Err(format!("no provider handles {identifier}").into()),
    }
}

/// Runs the command.
///
/// # Errors
///
/// This function returns an error when the configuration is invalid, the
/// identifier is not supported, or resolution fails with something other
/// than a missing result.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args)?;
    debug!("{config:#?}");

    let (events, mut receiver) = mpsc::unbounded_channel::<Event>();
    tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            debug!("{event:?}");
        }
    });

    let resolver = Resolver::new(
        Client::new(&config)?,
        Providers::from_config(&config)?,
        RetryPolicy::from_config(&config),
    )
    .with_events(events);

    // Ctrl-C abandons whatever is in flight.
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("cancelling");
                cancel.cancel();
            }
        }
    });

    match args.command {
        Command::Resolve { identifier } => {
            let item = resolve(&resolver, &identifier, &cancel).await?;
            println!("{item}");
            for track in item.tracks() {
                println!("  {track} ({}s) {}", track.duration().as_secs(), track.canonical_url());
            }
        }

        Command::Play { identifier } => {
            let item = resolve(&resolver, &identifier, &cancel).await?;
            let Some(track) = item.tracks().first().cloned() else {
                warn!("{identifier}: {item}");
                return Ok(());
            };

            let mirror = MirrorResolver::new(resolver, &config)?;
            let session = mirror.session(track);
            tokio::spawn({
                let cancel = cancel.clone();
                let session_cancel = session.cancellation_token();
                async move {
                    cancel.cancelled().await;
                    session_cancel.cancel();
                }
            });

            match session.stream_url().await? {
                Some(url) => {
                    if let Some(binding) = session.binding() {
                        info!("{binding}");
                    }
                    println!("{url}");
                }
                None => warn!("no playable stream for {}", session.track()),
            }
        }

        Command::Encode { identifier } => {
            let item = resolve(&resolver, &identifier, &cancel).await?;
            if item.is_not_found() {
                warn!("{identifier}: {item}");
            }
            for track in item.tracks() {
                println!("{}", track_state::encode_base64(track)?);
            }
        }

        Command::Decode { record } => {
            let track = track_state::decode_base64(&record)?;
            println!("{track}");
            println!("{:#?}", track);
        }
    }

    Ok(())
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and runs the command.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
