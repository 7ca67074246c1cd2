//! wisp - scriptable object world console
//!
//! # Configuration
//!
//! Configuration is loaded from multiple sources with priority:
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`WISP_*`)
//! 3. Project config (`.wisp/config.toml` in the project directory)
//! 4. Global config (`~/.wisp/config.toml`, or `--config`)
//! 5. Default values (lowest priority)
//!
//! # Startup
//!
//! ```text
//! load config ─▶ restore snapshot (if any) ─▶ ensure avatar ─▶ timer driver
//!                                                                   │
//!                      save snapshot ◀── end of input ◀── console ◀─┘
//! ```

mod console;

use anyhow::{Context, Result};
use clap::Parser;
use console::{Console, StdoutSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wisp_lua::{LuaEngine, LuaEnv};
use wisp_runtime::{ConfigLoader, Dispatcher, OutputSink, TimerDriver, WispConfig, WorldSnapshot};
use wisp_source::FsSourceTree;
use wisp_types::{event, events, Object, ObjectId};

/// Written to the avatar's source path when the file does not exist yet.
const DEFAULT_AVATAR: &str = r#"-- The console avatar.
setDescriptions({ { Short = "a wizard", Long = "A figure in a star-spangled robe." } })

addCallback("say", "command", function(p)
  local words = string.sub(p.line, 5)
  emitToLocation(getLocation(), "said", { by = getId(), words = words })
  echo("You say: " .. words)
end)
"#;

/// wisp - scriptable object world console
#[derive(Parser, Debug)]
#[command(name = "wisp")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Project directory (defaults to current directory)
    #[arg(short = 'C', long)]
    project: Option<PathBuf>,

    /// Global config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Script source root (also: WISP_SOURCE_ROOT)
    #[arg(long, value_name = "DIR")]
    source_root: Option<PathBuf>,

    /// World snapshot file (also: WISP_SNAPSHOT)
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,

    /// Object id of the console avatar
    #[arg(long)]
    avatar: Option<String>,

    /// Do not write the snapshot on exit
    #[arg(long)]
    no_save: bool,
}

impl Args {
    fn project_root(&self) -> PathBuf {
        self.project.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|e| {
                warn!(error = %e, "failed to get current directory, using '.'");
                PathBuf::from(".")
            })
        })
    }

    /// Merges file and env config, then applies CLI overrides.
    fn resolve_config(&self, project_root: &Path) -> Result<WispConfig> {
        let mut loader = ConfigLoader::new().with_project_root(project_root);
        if let Some(path) = &self.config {
            loader = loader.with_global_config(path);
        }
        let mut config = loader.load().context("config error")?;

        if let Some(root) = &self.source_root {
            config.sources.root.clone_from(root);
        }
        if let Some(path) = &self.snapshot {
            config.persistence.snapshot.clone_from(path);
        }
        if let Some(avatar) = &self.avatar {
            config.console.avatar.clone_from(avatar);
        }

        // Relative paths are relative to the project.
        if config.sources.root.is_relative() {
            config.sources.root = project_root.join(&config.sources.root);
        }
        if config.persistence.snapshot.is_relative() {
            config.persistence.snapshot = project_root.join(&config.persistence.snapshot);
        }
        Ok(config)
    }
}

fn init_tracing(args: &Args) {
    // --debug > --verbose > RUST_LOG env > default "warn"
    let filter = if args.debug {
        EnvFilter::new("debug,tokio=warn")
    } else if args.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_dispatcher(config: &WispConfig) -> Result<Dispatcher> {
    let env = LuaEnv::new()
        .with_max_instructions(config.scripts.max_instructions)
        .with_memory_limit(config.scripts.memory_limit_mb.saturating_mul(1024 * 1024));
    let engine = Arc::new(LuaEngine::new(env));
    let sources = Arc::new(FsSourceTree::new(&config.sources.root));
    let dispatcher = Dispatcher::builder(engine, sources)
        .config(config.clone())
        .build()?;

    match WorldSnapshot::load(&config.persistence.snapshot)? {
        Some(snapshot) => {
            dispatcher.restore(snapshot)?;
            info!(path = %config.persistence.snapshot.display(), "world restored");
        }
        None => info!("starting a new world"),
    }
    Ok(dispatcher)
}

/// Makes sure the avatar exists, is a wizard and has a script to run.
fn ensure_avatar(dispatcher: &Dispatcher, config: &WispConfig) -> Result<ObjectId> {
    let avatar = ObjectId::new(config.console.avatar.as_str());
    if dispatcher.object(&avatar).is_ok() {
        dispatcher.grant_wizard(&avatar)?;
        return Ok(avatar);
    }

    let source = config.console.avatar_source.as_str();
    let file = config.sources.root.join(source.trim_start_matches('/'));
    if !file.exists() {
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        std::fs::write(&file, DEFAULT_AVATAR)
            .with_context(|| format!("cannot write {}", file.display()))?;
        info!(path = %file.display(), "wrote default avatar script");
    }

    dispatcher.containment().insert_object(Object::new(
        avatar.clone(),
        Some(ObjectId::root()),
        source,
    ))?;
    dispatcher.grant_wizard(&avatar)?;
    dispatcher.emit(&avatar, events::CREATED, event::created_payload(&avatar))?;
    info!(avatar = %avatar, "created console avatar");
    Ok(avatar)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let project_root = args.project_root();
    let config = args.resolve_config(&project_root)?;
    info!(
        project = %project_root.display(),
        sources = %config.sources.root.display(),
        "configuration loaded"
    );

    let dispatcher = build_dispatcher(&config)?;
    let avatar = ensure_avatar(&dispatcher, &config)?;

    let sink = Arc::new(StdoutSink::default());
    dispatcher.attach_session(&avatar, sink.clone())?;

    println!("wisp v{}", env!("CARGO_PKG_VERSION"));
    sink.print(&dispatcher.look(&avatar, None)?);

    let driver = TimerDriver::spawn(dispatcher.clone());
    let result = Console::new(dispatcher.clone(), avatar, sink)
        .run(config.console.history_file_or_default())
        .await;
    driver.shutdown().await;

    if args.no_save {
        info!("snapshot not saved (--no-save)");
    } else {
        dispatcher
            .save_snapshot(&config.persistence.snapshot)
            .with_context(|| {
                format!(
                    "cannot save snapshot to {}",
                    config.persistence.snapshot.display()
                )
            })?;
        info!(path = %config.persistence.snapshot.display(), "world saved");
    }
    result
}
