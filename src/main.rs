// ============================================================================
// EconMirror - Dashboard d'indicateurs économiques
// ============================================================================
// Programme TUI : tableau des indicateurs, état du cache, alertes de seuil
//
// ARCHITECTURE :
// - Thread principal : event loop + rendering (synchrone)
// - Worker thread : runtime tokio qui possède le SnapshotCache
//   (fanout des fetchs, persistance SQLite, envoi des alertes)
// - Communication : AppCommand → worker, AppResult ← worker (mpsc)
// ============================================================================

use std::io;
use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, error, info, warn};

use econmirror::alert::{notify_breaches, LogNotifier, Notifier, WebhookNotifier};
use econmirror::api::{build_fetchers, client::SourceClient};
use econmirror::app::App;
use econmirror::cache::{SnapshotCache, SystemClock};
use econmirror::config::Config;
use econmirror::models::Snapshot;
use econmirror::store::SnapshotStore;
use econmirror::ui::{events::EventHandler, render};

// ============================================================================
// AppCommand / AppResult : protocole avec le worker thread
// ============================================================================

/// Commandes envoyées au worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppCommand {
    /// Lecture normale : snapshot stocké si frais, sinon fanout
    Load,

    /// Invalide le cache puis relit (touche 'r')
    Refresh,
}

/// Résultats renvoyés par le worker thread
#[derive(Debug)]
enum AppResult {
    SnapshotLoaded {
        snapshot: Snapshot,
        refreshed: bool,
    },

    /// Erreur du store : jamais masquée, affichée en rouge
    StoreFailed {
        error: String,
    },

    AlertSent {
        breaches: usize,
    },

    AlertFailed {
        error: String,
    },
}

// ============================================================================
// Initialisation du logging
// ============================================================================
// Les println! ne fonctionnent pas une fois le TUI lancé : on log vers
// ./logs/econmirror.log, rotation quotidienne
//
// RUST_LOG=econmirror=trace cargo run
// ============================================================================

fn init_logging() -> Result<()> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = std::path::PathBuf::from("./logs");
    std::fs::create_dir_all(&log_dir).context("Échec de la création du répertoire de logs")?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir.clone(), "econmirror.log");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "econmirror=debug,info".into()),
        )
        .init();

    info!(?log_dir, "Logging initialisé");
    Ok(())
}

// ============================================================================
// Point d'entrée
// ============================================================================

fn main() -> Result<()> {
    init_logging().unwrap_or_else(|e| {
        eprintln!("⚠️  Warning: Failed to initialize logging: {}", e);
        eprintln!("   Continuing without logging...");
    });

    info!("EconMirror starting up");

    let config = Config::load().context("Échec du chargement de la configuration")?;
    let registry = Arc::new(config.registry()?);
    info!(indicators = registry.len(), "Registry loaded");

    if config.sources.fred_api_key.is_none() {
        warn!("FRED_API_KEY not set, FRED indicators will be unavailable");
        println!("⚠️  FRED_API_KEY non défini : les indicateurs FRED seront indisponibles");
    }

    let db_path = config.db_path();
    let store = SnapshotStore::open(&db_path)
        .with_context(|| format!("Échec de l'ouverture de {}", db_path.display()))?;

    let client = Arc::new(SourceClient::new(
        config.sources.fred_api_key.clone(),
        config.sources.user_agent.as_deref(),
    )?);
    let fetchers = build_fetchers(&registry, client);

    let cache = Arc::new(SnapshotCache::new(
        registry.clone(),
        fetchers,
        store,
        config.fanout_options(),
        config.ttl(),
        Arc::new(SystemClock),
    )?);

    let notifier = build_notifier(&config);

    let (command_tx, command_rx) = mpsc::channel::<AppCommand>();
    let (result_tx, result_rx) = mpsc::channel::<AppResult>();

    info!("Spawning background worker thread");
    spawn_background_worker(command_rx, result_tx, cache, notifier)?;

    debug!("Setting up terminal");
    let mut terminal = setup_terminal()?;

    let mut app = App::new(registry, config.ttl());
    let events = EventHandler::new();

    // Première lecture : store si frais, sinon fanout
    send_command(&mut app, &command_tx, AppCommand::Load);

    info!("Starting event loop");
    let result = run(&mut terminal, &mut app, &events, &command_tx, &result_rx);

    debug!("Restoring terminal");
    restore_terminal(&mut terminal)?;

    match &result {
        Ok(_) => info!("Application exited normally"),
        Err(e) => error!(error = ?e, "Application exited with error"),
    }

    result
}

/// Webhook si configuré, sinon logs ; None si les alertes sont désactivées
fn build_notifier(config: &Config) -> Option<Arc<dyn Notifier>> {
    if !config.alerts.enabled {
        debug!("Alerts disabled");
        return None;
    }
    match &config.alerts.webhook_url {
        Some(url) => {
            info!(url = %url, "Alerts will be posted to webhook");
            Some(Arc::new(WebhookNotifier::new(url.clone())))
        }
        None => {
            info!("Alerts enabled without webhook, logging only");
            Some(Arc::new(LogNotifier))
        }
    }
}

// ============================================================================
// Background Worker Thread
// ============================================================================
// Le runtime est créé avant le thread : une erreur remonte dans main()
// ============================================================================

fn spawn_background_worker(
    command_rx: mpsc::Receiver<AppCommand>,
    result_tx: mpsc::Sender<AppResult>,
    cache: Arc<SnapshotCache>,
    notifier: Option<Arc<dyn Notifier>>,
) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Échec de la création du runtime tokio")?;

    std::thread::spawn(move || {
        while let Ok(command) = command_rx.recv() {
            info!(?command, "Worker received command");

            let read = runtime.block_on(async {
                match command {
                    AppCommand::Load => cache.read().await,
                    AppCommand::Refresh => cache.refresh().await,
                }
            });

            let read = match read {
                Ok(read) => read,
                Err(e) => {
                    error!(error = %e, "Snapshot read failed");
                    let _ = result_tx.send(AppResult::StoreFailed { error: e.to_string() });
                    continue;
                }
            };

            // Alertes seulement après une fanout (pas à chaque lecture du cache)
            let alert = match (&notifier, read.refreshed) {
                (Some(notifier), true) => Some(runtime.block_on(notify_breaches(
                    &read.snapshot,
                    cache.registry(),
                    notifier.as_ref(),
                ))),
                _ => None,
            };

            let _ = result_tx.send(AppResult::SnapshotLoaded {
                snapshot: read.snapshot,
                refreshed: read.refreshed,
            });

            match alert {
                Some(Ok(breaches)) => {
                    let _ = result_tx.send(AppResult::AlertSent { breaches });
                }
                Some(Err(e)) => {
                    error!(error = %e, "Failed to send alert");
                    let _ = result_tx.send(AppResult::AlertFailed { error: e.to_string() });
                }
                None => {}
            }
        }
        info!("Worker thread exiting (channel closed)");
    });

    Ok(())
}

fn send_command(app: &mut App, command_tx: &mpsc::Sender<AppCommand>, command: AppCommand) {
    let message = match command {
        AppCommand::Load => "Loading snapshot...",
        AppCommand::Refresh => "Refreshing indicators...",
    };
    if command_tx.send(command).is_ok() {
        app.start_loading(Some(message.to_string()));
    } else {
        error!("Worker thread disconnected!");
        app.set_error("background worker stopped");
    }
}

// ============================================================================
// Event loop
// ============================================================================

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &EventHandler,
    command_tx: &mpsc::Sender<AppCommand>,
    result_rx: &mpsc::Receiver<AppResult>,
) -> Result<()> {
    while app.is_running() {
        // Applique tous les résultats en attente
        loop {
            match result_rx.try_recv() {
                Ok(result) => apply_result(app, result),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    if app.is_loading_data() {
                        error!("Worker thread disconnected!");
                        app.stop_loading();
                        app.set_error("background worker stopped");
                    }
                    break;
                }
            }
        }

        terminal.draw(|frame| render(frame, app))?;

        match events.next() {
            Ok(event) => handle_event(app, event, command_tx),
            Err(e) => warn!(error = ?e, "Failed to read terminal event"),
        }

        // TTL expiré pendant que l'app tourne : relecture (donc fanout)
        if app.needs_reload(Utc::now()) {
            info!("Displayed snapshot expired, reloading");
            send_command(app, command_tx, AppCommand::Load);
        }
    }

    Ok(())
}

fn apply_result(app: &mut App, result: AppResult) {
    match result {
        AppResult::SnapshotLoaded { snapshot, refreshed } => {
            info!(
                refreshed,
                entries = snapshot.len(),
                unavailable = snapshot.unavailable_count(),
                "Snapshot received"
            );
            app.stop_loading();
            app.clear_status();
            app.set_snapshot(snapshot);
        }
        AppResult::StoreFailed { error } => {
            app.stop_loading();
            app.set_error(error);
        }
        AppResult::AlertSent { breaches } if breaches > 0 => {
            app.set_info(format!("Alert sent: {} indicator(s) over threshold", breaches));
        }
        AppResult::AlertSent { .. } => {}
        AppResult::AlertFailed { error } => {
            app.set_error(format!("alert not sent: {}", error));
        }
    }
}

fn handle_event(app: &mut App, event: econmirror::ui::events::Event, command_tx: &mpsc::Sender<AppCommand>) {
    use econmirror::ui::events::{
        is_down_event, is_enter_event, is_escape_event, is_quit_event, is_refresh_event, is_space_event,
        is_up_event, Event,
    };

    match event {
        Event::Key(_) if is_quit_event(&event) => {
            if app.is_awaiting_quit_confirmation() {
                info!("User confirmed quit");
                app.quit();
            } else {
                info!("User requested quit (awaiting confirmation)");
                app.request_quit();
            }
        }

        Event::Key(_) if is_refresh_event(&event) => {
            app.cancel_quit();
            if app.is_loading_data() {
                debug!("Refresh ignored, load already in progress");
            } else {
                info!("User requested refresh");
                send_command(app, command_tx, AppCommand::Refresh);
            }
        }

        Event::Key(_) if is_up_event(&event) && app.is_on_dashboard() => {
            app.cancel_quit();
            app.navigate_up();
        }
        Event::Key(_) if is_down_event(&event) && app.is_on_dashboard() => {
            app.cancel_quit();
            app.navigate_down();
        }

        Event::Key(_) if is_enter_event(&event) && app.is_on_dashboard() => {
            app.cancel_quit();
            if let Some(row) = app.selected_row() {
                info!(indicator = %row.name, "User opened detail view");
            }
            app.show_detail();
        }

        Event::Key(_) if (is_escape_event(&event) || is_space_event(&event)) && app.is_on_detail() => {
            app.cancel_quit();
            debug!("User returned to dashboard");
            app.show_dashboard();
        }

        Event::Key(_) => {
            app.cancel_quit();
        }

        Event::Tick => {}
    }
}

// ============================================================================
// Setup et restauration du terminal
// ============================================================================

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(|e| e.into())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    Ok(())
}
