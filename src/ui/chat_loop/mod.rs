//! The interactive event loop.
//!
//! One task owns the [`App`] and with it the orchestrator. Terminal input,
//! session stream events and background results all arrive on channels and are
//! applied here in arrival order; the renderer runs after each batch.

mod keybindings;
mod lifecycle;

use std::error::Error;
use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyEventKind};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::api::build_http_client;
use crate::api::models::{fetch_catalogue, ApiError};
use crate::core::app::{apply_action, App, AppAction, AppCommand};
use crate::core::assignment::SelectableModel;
use crate::core::chat_stream::ChatStreamService;
use crate::core::config::{Config, Host};
use crate::core::readiness::warm_sessions;
use crate::manage::{selectable_for, unload_all, OllamaHost};
use crate::ui::renderer::ui;

use keybindings::{handle_key, handle_paste};
use lifecycle::{restore_terminal, setup_terminal};

#[derive(Debug)]
pub enum UiEvent {
    Crossterm(Event),
}

fn spawn_event_reader(event_tx: mpsc::UnboundedSender<UiEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Ok(true) = event::poll(Duration::from_millis(10)) {
                match event::read() {
                    Ok(ev) => {
                        if event_tx.send(UiEvent::Crossterm(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => continue,
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    })
}

async fn load_models(
    client: &reqwest::Client,
    host: &Host,
    from_catalogue: bool,
) -> Result<Vec<SelectableModel>, ApiError> {
    let ollama = OllamaHost::new(host.clone(), client.clone());
    if from_catalogue {
        let catalogue = fetch_catalogue(client, &host.url).await?;
        selectable_for(&ollama, &catalogue).await
    } else {
        selectable_for(&ollama, &host.models).await
    }
}

fn run_command(
    command: AppCommand,
    client: &reqwest::Client,
    stream_service: &ChatStreamService,
    action_tx: &mpsc::UnboundedSender<AppAction>,
) {
    match command {
        AppCommand::SpawnStream(params) => stream_service.spawn_stream(params),
        AppCommand::LoadModels {
            host_index,
            host,
            from_catalogue,
        } => {
            let client = client.clone();
            let action_tx = action_tx.clone();
            tokio::spawn(async move {
                let result = load_models(&client, &host, from_catalogue)
                    .await
                    .map_err(|err| err.to_string());
                let _ = action_tx.send(AppAction::ModelsLoaded { host_index, result });
            });
        }
        AppCommand::WarmSessions(targets) => {
            let client = client.clone();
            let action_tx = action_tx.clone();
            tokio::spawn(async move {
                let results = warm_sessions(&client, &targets).await;
                let _ = action_tx.send(AppAction::ReadinessComplete(results));
            });
        }
    }
}

pub async fn run_chat(config: Config) -> Result<(), Box<dyn Error>> {
    let client = build_http_client(config.connect_timeout())?;
    let mut app = App::new(&config, client.clone());
    info!(
        hosts = config.hosts.len(),
        multimodel = config.multimodel,
        "starting chat"
    );

    let unload = app.hosts_to_unload_at_startup();
    if !unload.is_empty() {
        let hosts = OllamaHost::from_hosts(&unload, &client);
        for report in unload_all(&hosts).await {
            if report.outcome.is_err() {
                warn!("{}", report.describe());
            }
        }
    }

    let (stream_service, mut stream_rx) = ChatStreamService::new();
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<AppAction>();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<UiEvent>();

    let mut terminal = setup_terminal()?;
    let event_reader_handle = spawn_event_reader(event_tx);
    let mut tick = tokio::time::interval(Duration::from_millis(100));

    let result: Result<(), Box<dyn Error>> = loop {
        if let Err(err) = terminal.draw(|f| ui(f, &app)) {
            break Err(err.into());
        }

        let mut actions = Vec::new();
        tokio::select! {
            Some(UiEvent::Crossterm(ev)) = event_rx.recv() => match ev {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    actions.extend(handle_key(&mut app, key));
                }
                Event::Paste(text) => handle_paste(&mut app, &text),
                _ => {}
            },
            Some(envelope) = stream_rx.recv() => {
                app.orchestrator.dispatch(envelope);
                while let Ok(envelope) = stream_rx.try_recv() {
                    app.orchestrator.dispatch(envelope);
                }
            }
            Some(action) = action_rx.recv() => actions.push(action),
            _ = tick.tick() => {}
        }

        for action in actions {
            for command in apply_action(&mut app, action) {
                run_command(command, &client, &stream_service, &action_tx);
            }
        }

        if app.exit_requested {
            break Ok(());
        }
    };

    app.orchestrator.shutdown();
    event_reader_handle.abort();
    restore_terminal(&mut terminal)?;

    for entry in app.orchestrator.transcript() {
        println!(">>> {}", entry.prompt);
        println!("{}", entry.text());
        println!();
    }

    result
}
