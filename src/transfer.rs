//! Moving sessions between projects as a flat JSON file.
//!
//! The file is `{ "savedSessions": [...], "globalVariables": {...} }`. Variable
//! values are blanked on export so a shared file never carries tokens; the keys
//! survive so the receiving project knows what to fill in.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::session::{ExtendedSession, ProjectState};
use crate::variables::Variables;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDocument {
    #[serde(default)]
    pub saved_sessions: Vec<ExtendedSession>,
    #[serde(default)]
    pub global_variables: Variables,
}

/// How imported sessions are combined with the ones already saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStrategy {
    /// Add sessions whose id and name are both new; skip the rest.
    Merge,
    /// Replace the saved list with the file's sessions.
    Override,
    /// Import only these ids, replacing saved sessions with the same id.
    Selected(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub replaced: usize,
    /// Names of sessions left out.
    pub skipped: Vec<String>,
    pub variables_added: usize,
}

fn scrub(variables: &Variables) -> Variables {
    variables.keys().map(|key| (key.clone(), String::new())).collect()
}

/// Saved sessions and global variable keys of `state`, with every variable
/// value blanked.
pub fn export_document(state: &ProjectState) -> TransferDocument {
    let saved_sessions = state
        .sessions
        .saved_sessions
        .iter()
        .map(|session| ExtendedSession {
            shared_variables: scrub(&session.shared_variables),
            segment_variables: scrub(&session.segment_variables),
            ..session.clone()
        })
        .collect();
    TransferDocument {
        saved_sessions,
        global_variables: scrub(&state.variables.global),
    }
}

/// Apply `document` to `state`. Global variables are only ever added, never
/// overwritten.
pub fn import_document(
    state: &mut ProjectState,
    document: TransferDocument,
    strategy: &ImportStrategy,
) -> ImportReport {
    let mut report = ImportReport::default();

    match strategy {
        ImportStrategy::Merge => {
            for session in document.saved_sessions {
                if state.saved(&session.id).is_some() || state.saved_by_name(&session.name).is_some() {
                    report.skipped.push(session.name);
                    continue;
                }
                add_category(state, &session.category);
                state.sessions.saved_sessions.push(session);
                report.imported += 1;
            }
        }
        ImportStrategy::Override => {
            report.replaced = state.sessions.saved_sessions.len();
            let mut names = HashSet::new();
            let mut sessions = Vec::new();
            for session in document.saved_sessions {
                if !names.insert(session.name.trim().to_lowercase()) {
                    report.skipped.push(session.name);
                    continue;
                }
                add_category(state, &session.category);
                sessions.push(session);
            }
            report.imported = sessions.len();
            state.sessions.saved_sessions = sessions;

            let active_survives = state
                .sessions
                .active_session
                .as_ref()
                .is_some_and(|active| state.saved(&active.id).is_some());
            if !active_survives {
                state.sessions.active_session = None;
            }
        }
        ImportStrategy::Selected(ids) => {
            for session in document.saved_sessions {
                if !ids.contains(&session.id) {
                    continue;
                }
                let clashes = state
                    .saved_by_name(&session.name)
                    .is_some_and(|existing| existing.id != session.id);
                if clashes {
                    report.skipped.push(session.name);
                    continue;
                }
                add_category(state, &session.category);
                let saved = &mut state.sessions.saved_sessions;
                match saved.iter_mut().find(|s| s.id == session.id) {
                    Some(slot) => {
                        *slot = session;
                        report.replaced += 1;
                    }
                    None => saved.push(session),
                }
                report.imported += 1;
            }
        }
    }

    for (key, value) in document.global_variables {
        if !state.variables.global.contains_key(&key) {
            state.variables.global.insert(key, value);
            report.variables_added += 1;
        }
    }

    info!(
        imported = report.imported,
        replaced = report.replaced,
        skipped = report.skipped.len(),
        "sessions imported"
    );
    report
}

fn add_category(state: &mut ProjectState, category: &str) {
    let category = category.trim();
    if !category.is_empty() && !state.categories.iter().any(|c| c == category) {
        state.categories.push(category.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, name: &str) -> ExtendedSession {
        ExtendedSession {
            id: id.to_string(),
            ..ExtendedSession::new(name)
        }
    }

    fn project(sessions: &[(&str, &str)]) -> ProjectState {
        let mut state = ProjectState::default();
        state.sessions.saved_sessions = sessions.iter().map(|(id, name)| session(id, name)).collect();
        state
    }

    fn document(sessions: &[(&str, &str)]) -> TransferDocument {
        TransferDocument {
            saved_sessions: sessions.iter().map(|(id, name)| session(id, name)).collect(),
            global_variables: Variables::new(),
        }
    }

    fn names(state: &ProjectState) -> Vec<&str> {
        state.sessions.saved_sessions.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_export_scrubs_values() {
        let mut state = project(&[("1", "Login")]);
        state.variables.global.insert("token".into(), "secret".into());
        state.sessions.saved_sessions[0]
            .shared_variables
            .insert("password".into(), "hunter2".into());
        state.sessions.saved_sessions[0]
            .segment_variables
            .insert("userId".into(), "secret-user-123".into());

        let exported = export_document(&state);
        assert_eq!(exported.global_variables.get("token").map(String::as_str), Some(""));
        assert_eq!(
            exported.saved_sessions[0].shared_variables.get("password").map(String::as_str),
            Some("")
        );
        assert_eq!(state.variables.global["token"], "secret");

        let json = serde_json::to_value(&exported).unwrap();
        assert!(json["savedSessions"].is_array());
        assert!(json["globalVariables"].is_object());
        assert_eq!(json["savedSessions"][0]["segmentVariables"]["userId"], "");
        assert!(!json.to_string().contains("hunter2"));
        assert!(!json.to_string().contains("secret-user-123"));
    }

    #[test]
    fn test_merge_skips_duplicate_ids_and_names() {
        let mut state = project(&[("1", "Login"), ("2", "Users")]);
        let report = import_document(
            &mut state,
            document(&[("1", "Renamed"), ("9", "users"), ("3", "Orders")]),
            &ImportStrategy::Merge,
        );
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, vec!["Renamed".to_string(), "users".to_string()]);
        assert_eq!(names(&state), vec!["Login", "Users", "Orders"]);
    }

    #[test]
    fn test_override_replaces_everything() {
        let mut state = project(&[("1", "Login"), ("2", "Users")]);
        state.sessions.active_session = Some(session("2", "Users"));
        let report = import_document(&mut state, document(&[("3", "Orders")]), &ImportStrategy::Override);

        assert_eq!(report.replaced, 2);
        assert_eq!(report.imported, 1);
        assert_eq!(names(&state), vec!["Orders"]);
        assert!(state.sessions.active_session.is_none());
    }

    #[test]
    fn test_selected_imports_only_chosen_ids() {
        let mut state = project(&[("1", "Login"), ("2", "Users")]);
        let mut incoming = document(&[("1", "Login v2"), ("3", "Orders"), ("4", "Users")]);
        incoming.saved_sessions[1].category = "Shop".into();
        let strategy = ImportStrategy::Selected(vec!["1".into(), "3".into(), "4".into()]);

        let report = import_document(&mut state, incoming, &strategy);
        assert_eq!(report.imported, 2);
        assert_eq!(report.replaced, 1);
        assert_eq!(report.skipped, vec!["Users".to_string()]);
        assert_eq!(names(&state), vec!["Login v2", "Users", "Orders"]);
        assert_eq!(state.categories, vec!["Shop".to_string()]);
    }

    #[test]
    fn test_global_variables_are_added_only_when_absent() {
        let mut state = project(&[]);
        state.variables.global.insert("host".into(), "prod".into());
        let mut incoming = document(&[]);
        incoming.global_variables.insert("host".into(), String::new());
        incoming.global_variables.insert("token".into(), String::new());

        let report = import_document(&mut state, incoming, &ImportStrategy::Merge);
        assert_eq!(report.variables_added, 1);
        assert_eq!(state.variables.global["host"], "prod");
        assert!(state.variables.global.contains_key("token"));
    }

    #[test]
    fn test_document_parses_sparse_json() {
        let doc: TransferDocument =
            serde_json::from_str(r#"{"savedSessions":[{"id":"a","name":"Ping"}]}"#).unwrap();
        assert_eq!(doc.saved_sessions[0].name, "Ping");
        assert_eq!(doc.saved_sessions[0].request_config.method, http::Method::GET);
        assert!(doc.global_variables.is_empty());
    }
}
