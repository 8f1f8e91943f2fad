//! tablelink - Token positions to Mumble positional audio
//!
//! Runs the relay that feeds the Mumble Link structure, or a demo session
//! that walks a token around an in-memory scene.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tablelink_core::{
    CharacterInfo, EventBus, MemoryHost, SceneInfo, Session, SessionSnapshot, Settings, TokenInfo,
    TransportKind, UserInfo, WideEncoding,
};
use tablelink_relay::{LinkSink, LogSink, NativeSink, Relay, RelayConfig, DEFAULT_HOST, DEFAULT_PORT};

/// Step between two demo token moves.
const DEMO_STEP: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "tablelink")]
#[command(author, version, about = "Virtual tabletop token positions for Mumble positional audio", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay that writes updates into the Mumble Link structure
    Relay {
        /// Host to bind to
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        /// Port to bind to
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Where link frames are written
        #[arg(long, value_enum, default_value_t = SinkKind::Log)]
        sink: SinkKind,
    },
    /// Walk a token around a scene and forward it to the relay
    Demo {
        /// Settings file (default: the user config file)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// TOML scene file (default: a built-in scene)
        #[arg(long)]
        scene: Option<PathBuf>,

        /// Relay endpoint, overrides the settings
        #[arg(long)]
        url: Option<String>,

        /// Update period in milliseconds, overrides the settings
        #[arg(long)]
        rate: Option<u64>,

        /// How long to walk before signing out
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
    /// Create a default configuration file
    Init,
    /// Show the configuration file path
    ConfigPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    /// Log frames instead of writing shared memory
    Log,
    /// Write the shared-memory link structure
    Native,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.debug);

    match cli.command {
        Commands::Relay { host, port, sink } => run_relay(RelayConfig { host, port }, sink),
        Commands::Demo {
            config,
            scene,
            url,
            rate,
            seconds,
        } => run_demo(config, scene, url, rate, Duration::from_secs(seconds)),
        Commands::Init => {
            let path = Settings::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            Ok(())
        }
        Commands::ConfigPath => {
            let path = Settings::config_path()?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn init_logger(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run_relay(config: RelayConfig, sink: SinkKind) -> Result<()> {
    let sink: Box<dyn LinkSink> = match sink {
        SinkKind::Log => Box::new(LogSink),
        SinkKind::Native => Box::new(NativeSink),
    };
    let relay = Relay::new(sink, WideEncoding::native())
        .context("Failed to connect to Mumble Link. Make sure Mumble is running with the Link plugin enabled")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async {
        tokio::select! {
            result = relay.serve(&config) => result.context("Relay server failed"),
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down...");
                Ok(())
            }
        }
    })
}

fn run_demo(
    config: Option<PathBuf>,
    scene: Option<PathBuf>,
    url: Option<String>,
    rate: Option<u64>,
    duration: Duration,
) -> Result<()> {
    let mut settings = match config {
        Some(path) => Settings::load_from(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::load_or_default(),
    };
    if let Some(url) = url {
        settings.relay_url = url;
        settings.transport = TransportKind::Relay;
    }
    if let Some(rate) = rate {
        settings.update_rate_ms = rate;
    }

    let snapshot = match scene {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read scene file {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Invalid scene file {}", path.display()))?
        }
        None => demo_snapshot(),
    };

    let bus = EventBus::new();
    let host = MemoryHost::new(snapshot, bus.clone());
    let session = Session::start_with_settings(Arc::new(host.clone()), &bus, settings);
    let worker = std::thread::Builder::new()
        .name("tablelink-session".to_string())
        .spawn(move || session.run())
        .context("Failed to spawn session thread")?;

    walk_token(&host, duration);

    host.sign_out();
    worker
        .join()
        .map_err(|_| anyhow::anyhow!("Session thread panicked"))?;
    log::info!("Demo finished");
    Ok(())
}

/// Move the active token along a circle around the scene centre, facing
/// the direction of travel.
fn walk_token(host: &MemoryHost, duration: Duration) {
    let target = host.with_state_read(|s| {
        let token = s.active_token()?;
        let scene = s.scene.as_ref()?;
        Some((token.id.clone(), scene.clone()))
    });
    let Some((token_id, scene)) = target else {
        log::warn!("Scene has no token for the active character, nothing to walk");
        std::thread::sleep(duration);
        return;
    };

    let centre = (scene.width / 2.0, scene.height / 2.0);
    let radius = scene.width.min(scene.height) / 4.0;
    let lap = Duration::from_secs(8).as_secs_f32();
    log::info!(
        "Walking {} around {} for {:?}",
        token_id,
        scene.name,
        duration
    );

    let start = Instant::now();
    while start.elapsed() < duration {
        let angle = start.elapsed().as_secs_f32() / lap * TAU;
        let x = centre.0 + radius * angle.cos() - scene.grid_size / 2.0;
        let y = centre.1 + radius * angle.sin() - scene.grid_size / 2.0;
        // Front is (sin r, cos r), the tangent (-sin a, cos a) when r = -a.
        let rotation = (-angle.to_degrees()).rem_euclid(360.0);
        host.move_token(&token_id, x, y, rotation);
        std::thread::sleep(DEMO_STEP);
    }
}

fn demo_snapshot() -> SessionSnapshot {
    SessionSnapshot {
        world: Some("Demo World".to_string()),
        user: Some(UserInfo {
            id: "demo-user".to_string(),
            name: "Demo Player".to_string(),
            character: Some(CharacterInfo {
                id: "demo-actor".to_string(),
                name: "Wanderer".to_string(),
            }),
        }),
        scene: Some(SceneInfo {
            id: "demo-scene".to_string(),
            name: "Market Square".to_string(),
            grid_size: 100.0,
            width: 4000.0,
            height: 3000.0,
        }),
        tokens: vec![TokenInfo {
            id: "demo-token".to_string(),
            actor_id: "demo-actor".to_string(),
            x: 1950.0,
            y: 1450.0,
            width: 1.0,
            height: 1.0,
            rotation: 0.0,
        }],
    }
}
