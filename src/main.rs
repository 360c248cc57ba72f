//! entrascope - A TUI browser for Entra ID users
//!
//! This tool signs in to Microsoft Graph and lets you:
//! - Search, filter and sort the tenant's users
//! - Choose which user attributes are shown
//! - Inspect a user's groups, licenses and directory roles
//! - Export the current view to HTML, CSV or JSON

mod api;
mod auth;
mod config;
mod directory;
mod export;
mod models;
mod session;
mod ui;
mod view;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::GraphClient;
use crate::auth::{AuthSession, AzureCliProvider, DeviceCodeProvider, IdentityProvider, TokenStore};
use crate::config::{AuthMode, Config};
use crate::directory::DirectoryStore;
use crate::export::ExportFormat;
use crate::session::Session;
use crate::ui::{App, InputMode, KeyBindings};

/// entrascope - Entra ID user browser
#[derive(Parser, Debug)]
#[command(name = "entrascope")]
#[command(about = "A terminal UI for browsing Entra ID users through Microsoft Graph")]
#[command(version)]
struct Args {
    /// Directory (tenant) id or domain
    #[arg(short, long, env = "ENTRA_TENANT_ID")]
    tenant: Option<String>,

    /// Application (client) id of a public client app registration
    #[arg(long, env = "ENTRA_CLIENT_ID")]
    client_id: Option<String>,

    /// Sign-in method
    #[arg(long, value_enum)]
    auth: Option<AuthMode>,

    /// Graph root URL including the version
    #[arg(long)]
    graph_url: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Use vim-style keybindings (h/j/k/l navigation)
    #[arg(long, default_value = "false")]
    vim: bool,
}

/// Initialize logging (for debugging, set RUST_LOG=debug)
fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::from_default_env();

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
        return Ok(None);
    };

    let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path.file_name().context("Log file path has no file name")?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    Ok(Some(guard))
}

/// Merge command line overrides into the loaded config
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref()).context("Failed to load config")?;

    if let Some(tenant) = &args.tenant {
        config.tenant_id = Some(tenant.clone());
    }
    if let Some(client_id) = &args.client_id {
        config.client_id = Some(client_id.clone());
    }
    if let Some(mode) = args.auth {
        config.auth_mode = mode;
    }
    if let Some(url) = &args.graph_url {
        config.graph_base_url = url.clone();
    }

    // Remember the app registration on first use
    let path = match &args.config {
        Some(p) => p.clone(),
        None => Config::config_path()?,
    };
    if !path.exists() && config.tenant_id.is_some() && config.client_id.is_some() {
        config.save(&path).context("Failed to save config")?;
        debug!(path = %path.display(), "saved config");
    }

    Ok(config)
}

fn build_provider(
    config: &Config,
    config_path: Option<&Path>,
    prompt: watch::Sender<Option<String>>,
) -> Result<Arc<dyn IdentityProvider>> {
    match config.auth_mode {
        AuthMode::DeviceCode => {
            let (tenant, client_id) = config.app_registration()?;
            let store = TokenStore::open(Config::token_cache_path(config_path)?)
                .context("Failed to open token cache")?;
            debug!(path = %store.path().display(), "using token cache");
            let provider =
                DeviceCodeProvider::new(&config.authority_host, tenant, client_id, store, prompt)
                    .context("Failed to create device code provider")?;
            Ok(Arc::new(provider))
        }
        AuthMode::AzureCli => {
            let provider =
                AzureCliProvider::new(prompt).context("Failed to create Azure CLI provider")?;
            Ok(Arc::new(provider))
        }
    }
}

fn print_prompt(prompt: &mut watch::Receiver<Option<String>>) {
    if let Some(text) = prompt.borrow_and_update().clone() {
        eprintln!("{}", text);
    }
}

/// Echo sign-in instructions to stderr until `done` fires
async fn print_prompts(
    mut prompt: watch::Receiver<Option<String>>,
    mut done: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            changed = prompt.changed() => {
                if changed.is_err() {
                    break;
                }
                print_prompt(&mut prompt);
            }
            _ = &mut done => {
                if prompt.has_changed().unwrap_or(false) {
                    print_prompt(&mut prompt);
                }
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.log_file.as_deref())?;

    let config = resolve_config(&args)?;

    let (prompt_tx, mut prompt_rx) = watch::channel(None);
    let provider = build_provider(&config, args.config.as_deref(), prompt_tx)?;
    let auth = Arc::new(AuthSession::new(provider, config.scopes.clone()));

    // Sign in before starting TUI so device code instructions stay readable
    eprintln!("Signing in...");
    let (done_tx, done_rx) = oneshot::channel();
    let printer = tokio::spawn(print_prompts(prompt_rx.clone(), done_rx));
    let signed_in = auth.ensure_signed_in().await && auth.get_access_token().await.is_some();
    let _ = done_tx.send(());
    let _ = printer.await;
    let _ = prompt_rx.borrow_and_update();

    if !signed_in {
        eprintln!("Sign-in is in progress. Complete it, then run entrascope again.");
        return Ok(());
    }
    if let Some(account) = auth.active_account().await {
        eprintln!("Signed in as {}", account.username);
    }

    let graph = Arc::new(
        GraphClient::new(&config.graph_base_url, config.page_size)
            .context("Failed to create Graph client")?,
    );
    let store = DirectoryStore::new(config.default_columns.clone());
    let session = Session::new(auth, graph, store);

    // Set up key bindings
    let key_bindings = if args.vim {
        KeyBindings::Vim
    } else {
        KeyBindings::Arrows
    };

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app and run
    let mut app = App::new(session, key_bindings, prompt_rx);
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {:?}", e);
    }

    Ok(())
}

/// Main event loop
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    app.reload().await;

    loop {
        app.tick();

        terminal.draw(|f| ui::components::render(f, app))?;

        // Handle events with timeout
        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                match app.input_mode {
                    InputMode::Normal if key.code == KeyCode::Char('r') => app.reload().await,
                    InputMode::Normal => handle_normal_mode(app, key.code).await,
                    InputMode::Search => handle_search_mode(app, key.code).await,
                    InputMode::Filters => handle_filters_mode(app, key.code).await,
                    InputMode::FilterEditor => handle_editor_mode(app, key.code).await,
                    InputMode::Columns => handle_columns_mode(app, key.code).await,
                    InputMode::Alert => {
                        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                            app.dismiss_alert();
                        }
                    }
                }

                if app.should_quit {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Handle input on the table
async fn handle_normal_mode(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('/') => {
            app.start_search();
            return;
        }
        KeyCode::Char('f') => {
            app.open_filters();
            return;
        }
        KeyCode::Char('c') => {
            app.open_columns();
            return;
        }
        KeyCode::Char('x') => {
            app.reset_all().await;
            return;
        }
        KeyCode::Char('s') => {
            app.sort_selected().await;
            return;
        }
        KeyCode::Char('e') => {
            app.export(ExportFormat::Html).await;
            return;
        }
        KeyCode::Char('E') => {
            app.export(ExportFormat::Csv).await;
            return;
        }
        KeyCode::Char('J') => {
            app.export(ExportFormat::Json).await;
            return;
        }
        KeyCode::Enter => {
            app.open_selected().await;
            return;
        }
        KeyCode::Esc => {
            app.close_detail().await;
            return;
        }
        KeyCode::PageDown => {
            app.scroll_detail(10);
            return;
        }
        KeyCode::PageUp => {
            app.scroll_detail(-10);
            return;
        }
        _ => {}
    }

    // Navigation
    if app.key_bindings.is_up(key) {
        app.navigate_up();
    } else if app.key_bindings.is_down(key) {
        app.navigate_down();
    } else if app.key_bindings.is_left(key) {
        app.prev_header();
    } else if app.key_bindings.is_right(key) {
        app.next_header();
    }
}

/// Handle input in search mode; every keystroke re-applies the query
async fn handle_search_mode(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Enter => app.input_mode = InputMode::Normal,
        KeyCode::Esc => app.cancel_search().await,
        KeyCode::Backspace => app.search_backspace().await,
        KeyCode::Char(c) => app.search_push(c).await,
        _ => {}
    }
}

/// Handle input in the filter drawer
async fn handle_filters_mode(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Char('a') => app.start_add_filter(),
        KeyCode::Char('e') => app.start_edit_filter(),
        KeyCode::Char('d') => app.remove_selected_filter().await,
        KeyCode::Esc => app.close_drawer(),
        _ if app.key_bindings.is_up(key) => app.navigate_up(),
        _ if app.key_bindings.is_down(key) => app.navigate_down(),
        _ => {}
    }
}

/// Handle input in the add/edit filter form
async fn handle_editor_mode(app: &mut App, key: KeyCode) {
    if key == KeyCode::Enter {
        app.save_editor().await;
        return;
    }
    if key == KeyCode::Esc {
        app.cancel_editor();
        return;
    }

    let Some(editor) = app.editor.as_mut() else {
        return;
    };
    match key {
        KeyCode::Tab => editor.next_part(),
        KeyCode::Right | KeyCode::Down => editor.cycle(true),
        KeyCode::Left | KeyCode::Up => editor.cycle(false),
        KeyCode::Backspace => editor.backspace(),
        KeyCode::Char(c) => editor.push(c),
        _ => {}
    }
}

/// Handle input in the column drawer
async fn handle_columns_mode(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Char(' ') => app.toggle_selected_column().await,
        KeyCode::Esc => app.close_drawer(),
        _ if app.key_bindings.is_up(key) => app.navigate_up(),
        _ if app.key_bindings.is_down(key) => app.navigate_down(),
        _ => {}
    }
}
