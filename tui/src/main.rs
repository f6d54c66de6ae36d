//! phantom entry point
//!
//! Opens a full-screen emulated SSH session.
//!
//! Usage:
//!   phantom [OPTIONS]
//!
//! Logs go to `~/.cache/phantom-shell/phantom.log` because the terminal
//! belongs to the UI. Set `RUST_LOG` for finer control.

use std::fs::{self, OpenOptions};
use std::io::{self, IsTerminal};
use std::panic;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use phantom_core::config::{default_config_path, load_config_from_path, StorageSettings};
use phantom_core::sequence::library::{motd, MotdStats};
use phantom_core::{
    ConfigOverrides, FileStore, HttpScanClient, Interpreter, KeyValueStore, LlmAgentChat,
    LlmAssistant, LlmFallback, LoggingDevice, MemoryStore, OllamaBackend, PhantomConfig,
    Scrollback, Services, Session, SharedScrollback, SystemClock,
};
use phantom_tui::App;

#[derive(Parser, Debug)]
#[command(name = "phantom")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "PHANTOM_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Host name shown in the prompt
    #[arg(long, value_name = "NAME")]
    hostname: Option<String>,

    /// Model used for the fallback, assistant and agents
    #[arg(short = 'm', long, value_name = "MODEL")]
    model: Option<String>,

    /// Remote fetch endpoint
    #[arg(long, value_name = "URL")]
    scan_endpoint: Option<String>,

    /// Session state file
    #[arg(long, value_name = "PATH")]
    state_file: Option<PathBuf>,

    /// Keep session state in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "PHANTOM_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref hostname) = self.hostname {
            overrides = overrides.with_hostname(hostname.clone());
        }
        if let Some(ref model) = self.model {
            overrides = overrides.with_model(model.clone());
        }
        if let Some(ref endpoint) = self.scan_endpoint {
            overrides = overrides.with_scan_endpoint(endpoint.clone());
        }
        if let Some(ref path) = self.state_file {
            overrides = overrides.with_state_file(path.clone());
        }
        if self.ephemeral {
            overrides = overrides.with_ephemeral(true);
        }
        overrides
    }
}

/// Log to a file under the cache directory
fn init_logging(level: &str) -> anyhow::Result<()> {
    let dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("phantom-shell");
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join("phantom.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "phantom={level},phantom_core={level},phantom_tui={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();

    Ok(())
}

fn open_store(storage: &StorageSettings) -> Arc<dyn KeyValueStore> {
    if storage.ephemeral {
        tracing::info!("Using in-memory session state");
        return Arc::new(MemoryStore::new());
    }
    let Some(path) = storage.path.clone().or_else(FileStore::default_path) else {
        tracing::warn!("No data directory; session state will not persist");
        return Arc::new(MemoryStore::new());
    };
    match FileStore::open(&path) {
        Ok(store) => {
            tracing::info!(path = %path.display(), "Session state file opened");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "State file unusable, using memory");
            Arc::new(MemoryStore::new())
        }
    }
}

fn build_session(config: &PhantomConfig) -> Session {
    let backend_settings = &config.backend;
    let backend = OllamaBackend::with_timeout(
        backend_settings.ollama_host.clone(),
        backend_settings.ollama_port,
        backend_settings.request_timeout,
    );
    let scanner = HttpScanClient::new(backend_settings.scan_endpoint.clone());
    let interpreter = Interpreter::new(
        Arc::new(SystemClock::new()),
        Arc::new(LoggingDevice),
        Arc::new(scanner),
    )
    .with_config(config.interpreter);

    let model = backend_settings.model.as_str();
    let services = Services {
        interpreter,
        store: open_store(&config.storage),
        fallback: Arc::new(LlmFallback::new(
            backend.clone(),
            model,
            config.session.hostname.clone(),
        )),
        assistant: Arc::new(LlmAssistant::new(
            backend.clone(),
            model,
            config.session.keywords.assistant.clone(),
        )),
        agents: Arc::new(LlmAgentChat::new(backend, model)),
    };
    Session::new(config.session.clone(), services)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("phantom: a terminal is required (try `ssh -t` or run interactively)");
        std::process::exit(1);
    }

    let mut config = load_config_from_path(args.config.clone().or_else(default_config_path))?;
    args.overrides().apply(&mut config);
    config.validate()?;
    tracing::info!(
        source = %config.source(),
        hostname = %config.session.hostname,
        model = %config.backend.model,
        "phantom starting"
    );

    let session = build_session(&config);
    let banner = motd(&MotdStats::random(chrono::Utc::now(), &mut rand::thread_rng()));
    let mut app = App::new(session, SharedScrollback::new(Scrollback::new()));

    // Restore the terminal before the panic message prints
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;

    let result = app.run(&mut terminal, banner).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if result.is_ok() {
        println!("Connection to {} closed.", app.hostname());
    }
    tracing::info!("phantom stopped");
    result
}
