//! Interactive application state and the actions that mutate it.
//!
//! Key presses and background results become [`AppAction`]s. Applying an
//! action may yield [`AppCommand`]s, which the event loop runs off-thread.

use std::time::Instant;

use tracing::debug;
use tui_textarea::TextArea;

use crate::core::assignment::{AssignmentRegistry, SelectableModel};
use crate::core::chat_stream::StreamParams;
use crate::core::config::{Config, Host};
use crate::core::orchestrator::{Orchestrator, OrchestratorState};
use crate::core::readiness::{ReadinessResult, ReadinessTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Assignment,
    Picker,
    Loading,
    Chat,
}

#[derive(Debug, Clone)]
pub struct PickerState {
    pub host_index: usize,
    pub models: Vec<SelectableModel>,
    pub selected: usize,
}

pub enum AppAction {
    CursorUp,
    CursorDown,
    OpenPicker,
    ClearAssignment,
    StartChat,
    PickerUp,
    PickerDown,
    PickerChoose,
    PickerCancel,
    ModelsLoaded {
        host_index: usize,
        result: Result<Vec<SelectableModel>, String>,
    },
    ReadinessComplete(Vec<ReadinessResult>),
    Submit { text: String },
    Reassign,
    Quit,
}

pub enum AppCommand {
    SpawnStream(StreamParams),
    /// Fetch picker candidates for one host.
    LoadModels {
        host_index: usize,
        host: Host,
        from_catalogue: bool,
    },
    WarmSessions(Vec<ReadinessTarget>),
}

pub struct App {
    pub orchestrator: Orchestrator,
    pub cursor: usize,
    pub picker: Option<PickerState>,
    pub picker_pending: bool,
    pub status: Option<String>,
    pub debug: bool,
    pub multimodel: bool,
    pub unload_on_start: bool,
    pub loading_since: Option<Instant>,
    pub textarea: TextArea<'static>,
    pub exit_requested: bool,
}

impl App {
    pub fn new(config: &Config, client: reqwest::Client) -> Self {
        let registry = AssignmentRegistry::for_mode(config.hosts.clone(), config.multimodel);
        Self {
            orchestrator: Orchestrator::new(registry, client),
            cursor: 0,
            picker: None,
            picker_pending: false,
            status: None,
            debug: config.debug,
            multimodel: config.multimodel,
            unload_on_start: config.unload_on_start,
            loading_since: None,
            textarea: TextArea::default(),
            exit_requested: false,
        }
    }

    pub fn screen(&self) -> Screen {
        if self.picker.is_some() {
            return Screen::Picker;
        }
        match self.orchestrator.state() {
            OrchestratorState::Idle => Screen::Assignment,
            OrchestratorState::AwaitingSessionReady => Screen::Loading,
            OrchestratorState::ChatActive => Screen::Chat,
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    fn host_count(&self) -> usize {
        self.orchestrator.registry().hosts().len()
    }

    fn begin_chat(&mut self) -> Vec<AppCommand> {
        let Some(targets) = self.orchestrator.begin_chat() else {
            self.set_status("Assign a model to at least one host first");
            return Vec::new();
        };
        self.status = None;
        self.loading_since = Some(Instant::now());
        vec![AppCommand::WarmSessions(targets)]
    }

    /// Hosts to clear of loaded models once, before the first frame.
    pub fn hosts_to_unload_at_startup(&self) -> Vec<Host> {
        if self.multimodel && self.unload_on_start {
            self.orchestrator.registry().hosts().to_vec()
        } else {
            Vec::new()
        }
    }
}

pub fn apply_actions(app: &mut App, actions: impl IntoIterator<Item = AppAction>) -> Vec<AppCommand> {
    actions
        .into_iter()
        .flat_map(|action| apply_action(app, action))
        .collect()
}

pub fn apply_action(app: &mut App, action: AppAction) -> Vec<AppCommand> {
    match action {
        AppAction::CursorUp => {
            app.cursor = app.cursor.saturating_sub(1);
            Vec::new()
        }
        AppAction::CursorDown => {
            if app.cursor + 1 < app.host_count() {
                app.cursor += 1;
            }
            Vec::new()
        }
        AppAction::OpenPicker => {
            let Some(host) = app.orchestrator.registry().host(app.cursor).cloned() else {
                return Vec::new();
            };
            app.picker_pending = true;
            app.set_status(format!("Loading models from {}...", host.name));
            vec![AppCommand::LoadModels {
                host_index: app.cursor,
                host,
                from_catalogue: !app.multimodel,
            }]
        }
        AppAction::ModelsLoaded { host_index, result } => {
            if !app.picker_pending {
                return Vec::new();
            }
            app.picker_pending = false;
            match result {
                Ok(models) if models.is_empty() => {
                    app.set_status("No models available on this host");
                }
                Ok(models) => {
                    app.status = None;
                    app.picker = Some(PickerState {
                        host_index,
                        models,
                        selected: 0,
                    });
                }
                Err(err) => app.set_status(format!("Could not load models: {err}")),
            }
            Vec::new()
        }
        AppAction::ClearAssignment => {
            let _ = app.orchestrator.registry_mut().clear(app.cursor);
            Vec::new()
        }
        AppAction::StartChat => app.begin_chat(),
        AppAction::PickerUp => {
            if let Some(picker) = app.picker.as_mut() {
                picker.selected = picker.selected.saturating_sub(1);
            }
            Vec::new()
        }
        AppAction::PickerDown => {
            if let Some(picker) = app.picker.as_mut() {
                if picker.selected + 1 < picker.models.len() {
                    picker.selected += 1;
                }
            }
            Vec::new()
        }
        AppAction::PickerCancel => {
            app.picker = None;
            Vec::new()
        }
        AppAction::PickerChoose => {
            let Some(picker) = app.picker.take() else {
                return Vec::new();
            };
            let Some(model) = picker.models.get(picker.selected) else {
                return Vec::new();
            };
            let selected = app
                .orchestrator
                .registry_mut()
                .select(picker.host_index, model.name.clone());
            match selected {
                Ok(()) => {
                    debug!(host_index = picker.host_index, model = %model.name, "model assigned");
                    if app.orchestrator.registry().is_single() {
                        return app.begin_chat();
                    }
                    Vec::new()
                }
                Err(err) => {
                    app.set_status(err.to_string());
                    Vec::new()
                }
            }
        }
        AppAction::ReadinessComplete(results) => {
            app.loading_since = None;
            app.orchestrator.complete_readiness(results);
            let errors = app.orchestrator.readiness_errors();
            if !errors.is_empty() {
                let summary = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.host_name, e.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                app.set_status(format!("Models not ready. {summary}"));
            }
            Vec::new()
        }
        AppAction::Submit { text } => app
            .orchestrator
            .submit(&text)
            .into_iter()
            .map(AppCommand::SpawnStream)
            .collect(),
        AppAction::Reassign => {
            app.orchestrator.reassign();
            app.picker = None;
            Vec::new()
        }
        AppAction::Quit => {
            app.exit_requested = true;
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat_stream::SessionIndex;

    fn config(hosts: usize, multimodel: bool) -> Config {
        Config {
            hosts: (0..hosts)
                .map(|i| Host {
                    name: format!("H{i}"),
                    url: format!("http://h{i}:11434"),
                    models: vec!["a".into(), "b".into()],
                })
                .collect(),
            multimodel,
            ..Config::default()
        }
    }

    fn app(hosts: usize, multimodel: bool) -> App {
        App::new(&config(hosts, multimodel), reqwest::Client::new())
    }

    fn models(names: &[&str]) -> Vec<SelectableModel> {
        names
            .iter()
            .map(|n| SelectableModel {
                name: n.to_string(),
                loaded: false,
            })
            .collect()
    }

    fn pick(app: &mut App, host: usize, index_in_list: usize) -> Vec<AppCommand> {
        app.cursor = host;
        apply_action(app, AppAction::OpenPicker);
        apply_action(
            app,
            AppAction::ModelsLoaded {
                host_index: host,
                result: Ok(models(&["a", "b"])),
            },
        );
        for _ in 0..index_in_list {
            apply_action(app, AppAction::PickerDown);
        }
        apply_action(app, AppAction::PickerChoose)
    }

    fn ready(app: &mut App, commands: Vec<AppCommand>) {
        let Some(AppCommand::WarmSessions(targets)) = commands.into_iter().next() else {
            panic!("expected warm-up command");
        };
        let results = targets
            .into_iter()
            .map(|t| ReadinessResult {
                index: t.index,
                host_name: t.host_name,
                outcome: Ok(()),
            })
            .collect();
        apply_action(app, AppAction::ReadinessComplete(results));
    }

    #[test]
    fn open_picker_requests_catalogue_only_in_single_mode() {
        let mut single = app(1, false);
        let cmds = apply_action(&mut single, AppAction::OpenPicker);
        assert!(matches!(
            cmds.as_slice(),
            [AppCommand::LoadModels { from_catalogue: true, .. }]
        ));

        let mut multi = app(2, true);
        let cmds = apply_action(&mut multi, AppAction::OpenPicker);
        assert!(matches!(
            cmds.as_slice(),
            [AppCommand::LoadModels { from_catalogue: false, .. }]
        ));
    }

    #[test]
    fn multimodel_flow_assigns_then_starts_on_request() {
        let mut app = app(3, true);
        assert!(pick(&mut app, 0, 1).is_empty());
        assert!(pick(&mut app, 2, 0).is_empty());
        assert_eq!(app.screen(), Screen::Assignment);

        let cmds = apply_action(&mut app, AppAction::StartChat);
        match cmds.as_slice() {
            [AppCommand::WarmSessions(targets)] => {
                assert_eq!(targets.len(), 2);
                assert_eq!(targets[0].model, "b");
                assert_eq!(targets[1].index, SessionIndex(2));
            }
            _ => panic!("expected a single warm-up command"),
        }
        assert_eq!(app.screen(), Screen::Loading);
        ready(&mut app, cmds);
        assert_eq!(app.screen(), Screen::Chat);

        let spawned = apply_action(
            &mut app,
            AppAction::Submit {
                text: "hello".into(),
            },
        );
        assert_eq!(spawned.len(), 2);
        assert!(app.orchestrator.is_loading());
    }

    #[test]
    fn single_mode_starts_chat_after_choosing_a_model() {
        let mut app = app(2, false);
        let cmds = pick(&mut app, 1, 0);
        assert!(matches!(cmds.as_slice(), [AppCommand::WarmSessions(_)]));
        assert_eq!(app.screen(), Screen::Loading);
        assert!(app.hosts_to_unload_at_startup().is_empty());
    }

    #[test]
    fn models_are_unloaded_only_at_startup() {
        let mut app = app(2, true);
        assert_eq!(app.hosts_to_unload_at_startup().len(), 2);

        pick(&mut app, 0, 0);
        let cmds = apply_action(&mut app, AppAction::StartChat);
        ready(&mut app, cmds);
        apply_action(&mut app, AppAction::Submit { text: "hi".into() });
        apply_action(&mut app, AppAction::Reassign);

        // Re-entering chat only warms; the kept session is still streaming.
        let cmds = apply_action(&mut app, AppAction::StartChat);
        assert!(matches!(cmds.as_slice(), [AppCommand::WarmSessions(t)] if t.len() == 1));
        assert!(app.orchestrator.sessions()[0].is_streaming());

        let mut keep_loaded = config(2, true);
        keep_loaded.unload_on_start = false;
        let app = App::new(&keep_loaded, reqwest::Client::new());
        assert!(app.hosts_to_unload_at_startup().is_empty());
    }

    #[test]
    fn start_chat_without_assignment_sets_status() {
        let mut app = app(2, true);
        assert!(apply_action(&mut app, AppAction::StartChat).is_empty());
        assert_eq!(app.screen(), Screen::Assignment);
        assert!(app.status.is_some());
    }

    #[test]
    fn failed_readiness_shows_errors_on_assignment_screen() {
        let mut app = app(1, true);
        pick(&mut app, 0, 0);
        let cmds = apply_action(&mut app, AppAction::StartChat);
        let Some(AppCommand::WarmSessions(targets)) = cmds.into_iter().next() else {
            panic!("expected warm-up");
        };
        let results = vec![ReadinessResult {
            index: targets[0].index,
            host_name: "H0".into(),
            outcome: Err("API returned non-200 status: 404 Not Found".into()),
        }];
        apply_action(&mut app, AppAction::ReadinessComplete(results));

        assert_eq!(app.screen(), Screen::Assignment);
        let status = app.status.clone().unwrap_or_default();
        assert!(status.contains("H0") && status.contains("404"), "{status}");
    }

    #[test]
    fn blank_submit_spawns_nothing_and_tab_returns_to_assignment() {
        let mut app = app(1, true);
        pick(&mut app, 0, 0);
        let cmds = apply_action(&mut app, AppAction::StartChat);
        ready(&mut app, cmds);

        assert!(apply_action(&mut app, AppAction::Submit { text: "  ".into() }).is_empty());
        apply_action(&mut app, AppAction::Reassign);
        assert_eq!(app.screen(), Screen::Assignment);
    }

    #[test]
    fn unrequested_model_list_is_ignored() {
        let mut app = app(1, true);
        apply_action(
            &mut app,
            AppAction::ModelsLoaded {
                host_index: 0,
                result: Ok(models(&["a"])),
            },
        );
        assert!(app.picker.is_none());
    }

    #[test]
    fn cursor_stays_within_hosts() {
        let mut app = app(2, true);
        apply_action(&mut app, AppAction::CursorUp);
        assert_eq!(app.cursor, 0);
        apply_actions(&mut app, [AppAction::CursorDown, AppAction::CursorDown]);
        assert_eq!(app.cursor, 1);
    }
}
