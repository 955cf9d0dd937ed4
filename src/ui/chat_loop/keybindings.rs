//! Mapping from key presses to app actions, per screen.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tui_textarea::TextArea;

use crate::core::app::{App, AppAction, Screen};

pub fn handle_key(app: &mut App, key: KeyEvent) -> Option<AppAction> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(AppAction::Quit);
    }

    match app.screen() {
        Screen::Assignment => match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some(AppAction::CursorUp),
            KeyCode::Down | KeyCode::Char('j') => Some(AppAction::CursorDown),
            KeyCode::Enter => Some(AppAction::OpenPicker),
            KeyCode::Backspace | KeyCode::Delete => Some(AppAction::ClearAssignment),
            KeyCode::Char('c') => Some(AppAction::StartChat),
            KeyCode::Char('q') | KeyCode::Esc => Some(AppAction::Quit),
            _ => None,
        },
        Screen::Picker => match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some(AppAction::PickerUp),
            KeyCode::Down | KeyCode::Char('j') => Some(AppAction::PickerDown),
            KeyCode::Enter => Some(AppAction::PickerChoose),
            KeyCode::Esc => Some(AppAction::PickerCancel),
            _ => None,
        },
        Screen::Loading => None,
        Screen::Chat => match key.code {
            KeyCode::Tab => Some(AppAction::Reassign),
            KeyCode::Enter if key.modifiers.is_empty() => {
                // Keep the draft while the previous round is still streaming.
                if app.orchestrator.is_loading() {
                    return None;
                }
                let text = app.textarea.lines().join("\n");
                app.textarea = TextArea::default();
                Some(AppAction::Submit { text })
            }
            _ => {
                app.textarea.input(tui_textarea::Input::from(key));
                None
            }
        },
    }
}

pub fn handle_paste(app: &mut App, text: &str) {
    if app.screen() == Screen::Chat {
        app.textarea.insert_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::apply_action;
    use crate::core::config::{Config, Host};
    use crate::core::readiness::ReadinessResult;

    fn chat_app() -> App {
        let config = Config {
            hosts: vec![Host {
                name: "H".into(),
                url: "http://h:11434".into(),
                models: vec!["m".into()],
            }],
            multimodel: true,
            ..Config::default()
        };
        let mut app = App::new(&config, reqwest::Client::new());
        app.orchestrator.registry_mut().select(0, "m").unwrap();
        let targets = app.orchestrator.begin_chat().unwrap();
        let results = targets
            .into_iter()
            .map(|t| ReadinessResult {
                index: t.index,
                host_name: t.host_name,
                outcome: Ok(()),
            })
            .collect();
        apply_action(&mut app, AppAction::ReadinessComplete(results));
        app
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn ctrl_c_quits_from_any_screen() {
        let mut app = chat_app();
        let action = handle_key(&mut app, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(matches!(action, Some(AppAction::Quit)));
    }

    #[test]
    fn typing_then_enter_submits_and_clears_input() {
        let mut app = chat_app();
        for ch in "hey".chars() {
            assert!(handle_key(&mut app, key(KeyCode::Char(ch))).is_none());
        }
        match handle_key(&mut app, key(KeyCode::Enter)) {
            Some(AppAction::Submit { text }) => assert_eq!(text, "hey"),
            _ => panic!("expected submit"),
        }
        assert_eq!(app.textarea.lines(), [""]);
    }

    #[test]
    fn enter_while_loading_keeps_the_draft() {
        let mut app = chat_app();
        apply_action(&mut app, AppAction::Submit { text: "first".into() });
        handle_paste(&mut app, "second");
        assert!(handle_key(&mut app, key(KeyCode::Enter)).is_none());
        assert_eq!(app.textarea.lines(), ["second"]);
    }

    #[test]
    fn tab_in_chat_returns_to_assignment() {
        let mut app = chat_app();
        assert!(matches!(
            handle_key(&mut app, key(KeyCode::Tab)),
            Some(AppAction::Reassign)
        ));
    }
}
