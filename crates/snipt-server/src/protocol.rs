//! Wire messages exchanged with the tree UI.
//!
//! One JSON object per line. Inbound messages carry a `type` and an optional
//! correlation `id`; every inbound message with an id gets exactly one
//! `response` carrying the same id.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Deserialize, PartialEq)]
pub struct Inbound {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub command: Command,
}

impl Inbound {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    Ready,
    Expand {
        path: String,
    },
    Rename {
        old_path: String,
        new_name: String,
    },
    Move {
        source_path: String,
        target_path: String,
        #[serde(default)]
        is_folder: bool,
        #[serde(default)]
        overwrite: bool,
    },
    Copy {
        source_path: String,
        target_path: String,
        #[serde(default)]
        is_folder: bool,
        #[serde(default)]
        overwrite: bool,
    },
    Remove {
        full_path: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        is_folder: bool,
    },
    CreateFolder {
        path: String,
    },
    CreateSnippet {
        path: String,
    },
    CheckDestination {
        path: String,
    },
    OpenFile {
        path: String,
    },
    OpenText {
        path: String,
    },
    SaveTreeState {
        expanded_paths: Vec<String>,
    },
    OpenConfig,
    ConfirmResponse {
        prompt_id: u64,
        accepted: bool,
    },
    ReloadChoice {
        reload: bool,
    },
    CloseFile,
    ReloadConfig,
    AppendSnippet {
        path: String,
        text: String,
        #[serde(default)]
        file_path: String,
        #[serde(default)]
        line: String,
    },
}

impl Command {
    /// Name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ready => "ready",
            Command::Expand { .. } => "expand",
            Command::Rename { .. } => "rename",
            Command::Move { .. } => "move",
            Command::Copy { .. } => "copy",
            Command::Remove { .. } => "remove",
            Command::CreateFolder { .. } => "createFolder",
            Command::CreateSnippet { .. } => "createSnippet",
            Command::CheckDestination { .. } => "checkDestination",
            Command::OpenFile { .. } => "openFile",
            Command::OpenText { .. } => "openText",
            Command::SaveTreeState { .. } => "saveTreeState",
            Command::OpenConfig => "openConfig",
            Command::ConfirmResponse { .. } => "confirmResponse",
            Command::ReloadChoice { .. } => "reloadChoice",
            Command::CloseFile => "closeFile",
            Command::ReloadConfig => "reloadConfig",
            Command::AppendSnippet { .. } => "appendSnippet",
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct WireError {
    pub kind: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Outbound {
    Response {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<WireError>,
    },
    /// Folders whose children changed.
    Refresh {
        paths: Vec<String>,
    },
    /// `None` when no document is open.
    ActiveDocument {
        path: Option<String>,
    },
    ForceClose {
        path: String,
        reason: String,
    },
    ReloadPrompt {
        path: String,
    },
    Confirm {
        prompt_id: u64,
        message: String,
    },
    Warning {
        message: String,
    },
    Log {
        level: String,
        message: String,
    },
}

impl Outbound {
    #[must_use]
    pub fn success(id: Option<u64>, result: Value) -> Self {
        Outbound::Response {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(id: Option<u64>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Outbound::Response {
            id,
            ok: false,
            result: None,
            error: Some(WireError {
                kind: kind.into(),
                message: message.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod inbound {
        use super::*;

        #[test]
        fn test_move_with_id() {
            let inbound = Inbound::parse(
                r#"{"id": 7, "type": "move", "sourcePath": "Drafts/x.snippet", "targetPath": "LocalSpace", "isFolder": false}"#,
            )
            .unwrap();

            assert_eq!(
                inbound,
                Inbound {
                    id: Some(7),
                    command: Command::Move {
                        source_path: "Drafts/x.snippet".to_string(),
                        target_path: "LocalSpace".to_string(),
                        is_folder: false,
                        overwrite: false,
                    },
                }
            );
        }

        #[test]
        fn test_unit_commands_without_id() {
            assert_eq!(
                Inbound::parse(r#"{"type": "ready"}"#).unwrap(),
                Inbound {
                    id: None,
                    command: Command::Ready,
                }
            );
            assert_eq!(
                Inbound::parse(r#"{"type": "closeFile"}"#).unwrap().command,
                Command::CloseFile
            );
        }

        #[test]
        fn test_confirm_response() {
            assert_eq!(
                Inbound::parse(r#"{"type": "confirmResponse", "promptId": 3, "accepted": true}"#)
                    .unwrap()
                    .command,
                Command::ConfirmResponse {
                    prompt_id: 3,
                    accepted: true,
                }
            );
        }

        #[test]
        fn test_save_tree_state() {
            assert_eq!(
                Inbound::parse(r#"{"type": "saveTreeState", "expandedPaths": ["Drafts"]}"#)
                    .unwrap()
                    .command,
                Command::SaveTreeState {
                    expanded_paths: vec!["Drafts".to_string()],
                }
            );
        }

        #[test]
        fn test_rejects_unknown_type_and_missing_fields() {
            assert!(Inbound::parse(r#"{"type": "explode"}"#).is_err());
            assert!(Inbound::parse(r#"{"type": "rename", "oldPath": "Drafts/a"}"#).is_err());
            assert!(Inbound::parse("not json").is_err());
        }
    }

    mod outbound {
        use super::*;

        #[test]
        fn test_success_response() {
            let message = Outbound::success(Some(4), json!({"exists": true, "isDirectory": false}));
            insta::assert_json_snapshot!(message, @r#"
            {
              "type": "response",
              "id": 4,
              "ok": true,
              "result": {
                "exists": true,
                "isDirectory": false
              }
            }
            "#);
        }

        #[test]
        fn test_failure_response_without_id() {
            let message = Outbound::failure(None, "validation", "cannot drop into the root");
            insta::assert_json_snapshot!(message, @r#"
            {
              "type": "response",
              "ok": false,
              "error": {
                "kind": "validation",
                "message": "cannot drop into the root"
              }
            }
            "#);
        }

        #[test]
        fn test_confirm_notification() {
            let message = Outbound::Confirm {
                prompt_id: 1,
                message: "Delete 'x.snippet'?".to_string(),
            };
            insta::assert_json_snapshot!(message, @r#"
            {
              "type": "confirm",
              "promptId": 1,
              "message": "Delete 'x.snippet'?"
            }
            "#);
        }

        #[test]
        fn test_closed_document() {
            let message = Outbound::ActiveDocument { path: None };
            insta::assert_json_snapshot!(message, @r#"
            {
              "type": "activeDocument",
              "path": null
            }
            "#);
        }
    }
}
