use anyhow::Result;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use streamdock_core::{Config, EventSink, OutputMode, SessionEvent, StreamRequest};
use streamdock_docker::{ContainerDriver, DockerDriver};
use streamdock_tui::{DashboardOptions, LOG_TAIL_LINES, SessionManager};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "streamdock")]
#[command(author, version, about = "Launch and supervise streamlink + Tor capture containers")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args, Debug, Clone)]
struct StreamArgs {
    /// Stream URL
    #[arg(long, default_value = "https://kick.com/")]
    url: String,
    /// Stream quality (best, worst, 1080p, 720p, 480p, 360p, 240p, ...)
    #[arg(long)]
    quality: Option<String>,
    /// Write to the container's stdout or to a file in the output directory
    #[arg(long, default_value_t = OutputMode::Stdout)]
    output: OutputMode,
    /// Host directory for file output
    #[arg(long)]
    output_dir: Option<String>,
    /// Number of containers to start
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,
}

impl Default for StreamArgs {
    fn default() -> Self {
        Self {
            url: "https://kick.com/".to_string(),
            quality: None,
            output: OutputMode::Stdout,
            output_dir: None,
            count: 1,
        }
    }
}

impl StreamArgs {
    fn into_request(self, config: &Config) -> StreamRequest {
        StreamRequest {
            url: self.url,
            quality: self
                .quality
                .unwrap_or_else(|| config.default_quality.clone()),
            output_mode: self.output,
            output_dir: self
                .output_dir
                .or_else(|| config.output_dir().map(str::to_string)),
            count: self.count,
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Launch the interactive dashboard
    Tui {
        #[command(flatten)]
        stream: StreamArgs,
        /// File exported logs are written to
        #[arg(long, default_value = "streamdock.log")]
        export_path: PathBuf,
    },
    /// Check that Docker is reachable and the image exists
    Check,
    /// Write the image build context
    InitBuildContext {
        /// Target directory (defaults to the configured build directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Build the image from the build context
    Build {
        /// Build context directory (defaults to the configured build directory)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Image tag (defaults to the configured image)
        #[arg(long)]
        tag: Option<String>,
        /// Regenerate the build context first
        #[arg(long)]
        write_files: bool,
    },
    /// Pull the image from its registry
    Pull {
        /// Image tag (defaults to the configured image)
        #[arg(long)]
        tag: Option<String>,
    },
    /// List local images
    Images,
    /// Start containers and supervise them until interrupted
    Start {
        #[command(flatten)]
        stream: StreamArgs,
        /// Seconds between status refreshes
        #[arg(long, default_value_t = 30)]
        refresh_secs: u64,
    },
    /// Show the output of a container
    Logs {
        /// Container id or name
        container: String,
        /// Number of lines from the end
        #[arg(long, default_value_t = LOG_TAIL_LINES)]
        tail: usize,
        /// Keep streaming new output
        #[arg(short, long)]
        follow: bool,
    },
    /// Show or change configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Change values and save
    Set {
        #[arg(long)]
        docker_image: Option<String>,
        #[arg(long)]
        default_quality: Option<String>,
        #[arg(long)]
        output_directory: Option<String>,
        #[arg(long)]
        auto_remove: Option<bool>,
        #[arg(long)]
        container_prefix: Option<String>,
        #[arg(long)]
        build_directory: Option<PathBuf>,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::new(filter))
        .init();
}

/// Print log events with a timestamp until the sink is dropped.
fn print_events(mut rx: mpsc::UnboundedReceiver<SessionEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let SessionEvent::Log(message) = event {
                println!("[{}] {message}", Local::now().format("%Y-%m-%d %H:%M:%S"));
            }
        }
    })
}

/// Save configuration on shutdown only when there is somewhere to save it.
fn with_config_path(manager: SessionManager, path: Option<PathBuf>) -> SessionManager {
    match path {
        Some(path) => manager.with_config_path(path),
        None => manager,
    }
}

fn connect(config: &Config) -> Result<Arc<DockerDriver>> {
    Ok(Arc::new(DockerDriver::connect(config.docker_socket.as_deref())?))
}

async fn supervise(manager: &SessionManager, stream: StreamArgs, refresh_secs: u64) -> Result<()> {
    let request = stream.into_request(manager.config());
    let report = manager.start_batch(&request).await?;

    if report.started.is_empty() {
        anyhow::bail!("no containers could be started");
    }

    let mut refresh = tokio::time::interval(Duration::from_secs(refresh_secs.max(1)));
    refresh.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            _ = refresh.tick() => {
                let _ = manager.reconcile().await;
                if manager.registry().is_empty() {
                    manager.sink().log("All sessions have ended");
                    break;
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let (config, config_path) = Config::locate(cli.config);

    match cli.command.unwrap_or(Commands::Tui {
        stream: StreamArgs::default(),
        export_path: PathBuf::from("streamdock.log"),
    }) {
        Commands::Tui {
            stream,
            export_path,
        } => {
            tracing::info!("Launching dashboard...");
            let options = DashboardOptions {
                request: stream.into_request(&config),
                build_dir: config.build_directory.clone(),
                export_path,
            };
            let driver = connect(&config)?;
            let (sink, events) = EventSink::channel();
            let manager = with_config_path(SessionManager::new(driver, config, sink), config_path);
            streamdock_tui::run(Arc::new(manager), events, options).await?;
        }
        Commands::Check => {
            let (sink, events) = EventSink::channel();
            let printer = print_events(events);
            let manager = SessionManager::new(connect(&config)?, config, sink);
            let result = manager.check_runtime().await;
            drop(manager);
            printer.await?;
            result?;
        }
        Commands::InitBuildContext { dir } => {
            let dir = dir.unwrap_or_else(|| config.build_directory.clone());
            for path in streamdock_assets::write_build_context(&dir)? {
                println!("{}", path.display());
            }
        }
        Commands::Build {
            dir,
            tag,
            write_files,
        } => {
            let dir = dir.unwrap_or_else(|| config.build_directory.clone());
            let tag = tag.unwrap_or_else(|| config.docker_image.clone());
            let (sink, events) = EventSink::channel();
            let printer = print_events(events);
            let manager = SessionManager::new(connect(&config)?, config, sink);

            let result: streamdock_core::Result<()> = async {
                if write_files || !dir.exists() {
                    manager.create_build_context(&dir)?;
                }
                manager.build_image(&dir, &tag).await
            }
            .await;

            drop(manager);
            printer.await?;
            result?;
        }
        Commands::Pull { tag } => {
            let tag = tag.unwrap_or_else(|| config.docker_image.clone());
            let (sink, events) = EventSink::channel();
            let printer = print_events(events);
            let manager = SessionManager::new(connect(&config)?, config, sink);
            let result = manager.pull_image(&tag).await;
            drop(manager);
            printer.await?;
            result?;
        }
        Commands::Images => {
            let driver = connect(&config)?;
            for image in driver.list_images().await? {
                for tag in image.display_tags() {
                    println!("{tag} ({:.1} MB)", image.size_mb());
                }
            }
        }
        Commands::Start {
            stream,
            refresh_secs,
        } => {
            let (sink, events) = EventSink::channel();
            let printer = print_events(events);
            let manager =
                with_config_path(SessionManager::new(connect(&config)?, config, sink), config_path);

            let result = supervise(&manager, stream, refresh_secs).await;
            let report = manager.shutdown().await;
            for (id, e) in &report.errors {
                tracing::warn!(container = %id, "not stopped: {e}");
            }

            drop(manager);
            printer.await?;
            result?;
        }
        Commands::Logs {
            container,
            tail,
            follow,
        } => {
            let driver = connect(&config)?;
            if follow {
                let mut stream = driver.follow_logs(&container, tail);
                while let Some(chunk) = stream.rx.recv().await {
                    print!("{}", chunk?);
                }
            } else {
                print!("{}", driver.fetch_logs(&container, tail).await?);
            }
        }
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Path => match config_path {
                Some(path) => println!("{}", path.display()),
                None => anyhow::bail!("no configuration directory is available; pass --config"),
            },
            ConfigAction::Set {
                docker_image,
                default_quality,
                output_directory,
                auto_remove,
                container_prefix,
                build_directory,
            } => {
                let Some(config_path) = config_path else {
                    anyhow::bail!("no configuration directory is available; pass --config");
                };
                let mut config = config;
                if let Some(value) = docker_image {
                    config.docker_image = value;
                }
                if let Some(value) = default_quality {
                    config.default_quality = value;
                }
                if let Some(value) = output_directory {
                    config.output_directory = value;
                }
                if let Some(value) = auto_remove {
                    config.auto_remove_containers = value;
                }
                if let Some(value) = container_prefix {
                    config.container_prefix = value;
                }
                if let Some(value) = build_directory {
                    config.build_directory = value;
                }
                config.save_to(&config_path)?;
                println!("Configuration saved to {}", config_path.display());
            }
        },
    }

    Ok(())
}
