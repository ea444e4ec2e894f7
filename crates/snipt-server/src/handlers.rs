//! Command dispatch.
//!
//! Each handler takes the session lock only for synchronous work; the lock
//! is never held across an await. A remove therefore releases the session
//! while it waits for confirmation, and other commands keep flowing.

use std::fmt;

use serde::Serialize;
use serde_json::json;
use serde_json::Value;
use snipt_conf::ConfigError;
use snipt_workspace::MutationEvent;
use snipt_workspace::TrackerSignal;
use snipt_workspace::TransferRequest;
use snipt_workspace::VirtualPath;

use crate::protocol::Command;
use crate::protocol::Inbound;
use crate::protocol::Outbound;
use crate::server::SniptServer;

/// Error reported in a failed response.
#[derive(Debug)]
pub struct HandlerError {
    pub kind: &'static str,
    pub message: String,
}

impl HandlerError {
    fn protocol(message: impl fmt::Display) -> Self {
        Self {
            kind: "protocol",
            message: message.to_string(),
        }
    }
}

impl From<snipt_workspace::Error> for HandlerError {
    fn from(err: snipt_workspace::Error) -> Self {
        Self {
            kind: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<ConfigError> for HandlerError {
    fn from(err: ConfigError) -> Self {
        Self {
            kind: "io",
            message: err.chain(),
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::protocol(err)
    }
}

type HandlerResult = Result<Value, HandlerError>;

fn to_value(value: impl Serialize) -> HandlerResult {
    Ok(serde_json::to_value(value)?)
}

impl SniptServer {
    /// Parse one inbound line, run it, and send the response.
    pub async fn handle_line(&self, line: &str) {
        let inbound = match Inbound::parse(line) {
            Ok(inbound) => inbound,
            Err(err) => {
                tracing::warn!("malformed message: {err}");
                let id = serde_json::from_str::<Value>(line)
                    .ok()
                    .and_then(|value| value.get("id").and_then(Value::as_u64));
                self.client()
                    .send(Outbound::failure(id, "protocol", err.to_string()));
                return;
            }
        };

        let name = inbound.command.name();
        tracing::debug!("handling {name} (id {:?})", inbound.id);
        let response = match self.dispatch(inbound.command).await {
            Ok(result) => Outbound::success(inbound.id, result),
            Err(err) => {
                tracing::debug!("{name} failed: {}", err.message);
                Outbound::failure(inbound.id, err.kind, err.message)
            }
        };
        self.client().send(response);
    }

    async fn dispatch(&self, command: Command) -> HandlerResult {
        match command {
            Command::Ready => self.ready().await,
            Command::Expand { path } => {
                let nodes = self.with_session(|session| session.list(&path)).await?;
                to_value(nodes)
            }
            Command::Rename { old_path, new_name } => {
                self.mutate(|session| session.rename_node(&old_path, &new_name))
                    .await
            }
            Command::Move {
                source_path,
                target_path,
                is_folder,
                overwrite,
            } => {
                let request = TransferRequest {
                    source: source_path,
                    target: target_path,
                    is_folder,
                    overwrite,
                };
                self.mutate(|session| session.move_node(&request)).await
            }
            Command::Copy {
                source_path,
                target_path,
                is_folder,
                overwrite,
            } => {
                let request = TransferRequest {
                    source: source_path,
                    target: target_path,
                    is_folder,
                    overwrite,
                };
                self.mutate(|session| session.copy_node(&request)).await
            }
            Command::Remove {
                full_path,
                name: _,
                is_folder,
            } => self.remove(&full_path, is_folder).await,
            Command::CreateFolder { path } => {
                self.mutate(|session| session.create_folder(&path)).await
            }
            Command::CreateSnippet { path } => {
                self.mutate(|session| session.create_snippet(&path)).await
            }
            Command::CheckDestination { path } => {
                let status = self
                    .with_session(|session| session.check_destination(&path))
                    .await?;
                to_value(status)
            }
            Command::OpenFile { path } => {
                let document = self
                    .with_session_mut(|session| session.open_document(&path))
                    .await?;
                self.client().send(Outbound::ActiveDocument {
                    path: Some(path.clone()),
                });
                Ok(json!({ "path": path, "document": document }))
            }
            Command::OpenText { path } => {
                let content = self.with_session(|session| session.open_text(&path)).await?;
                Ok(json!({ "path": path, "content": content }))
            }
            Command::SaveTreeState { expanded_paths } => {
                self.with_session(|session| session.save_tree_state(expanded_paths))
                    .await?;
                Ok(Value::Null)
            }
            Command::OpenConfig => {
                let path = self.with_session(|session| session.open_config()).await?;
                Ok(json!({ "path": path }))
            }
            Command::ConfirmResponse {
                prompt_id,
                accepted,
            } => {
                let resolved = self.prompts().resolve(prompt_id, accepted);
                Ok(json!({ "resolved": resolved }))
            }
            Command::ReloadChoice { reload } => {
                let result = self
                    .with_session_mut(|session| session.resolve_reload(reload))
                    .await;
                self.flush_signals().await;
                result?;
                Ok(Value::Null)
            }
            Command::CloseFile => {
                let closed = self.with_session_mut(|session| session.close_document()).await;
                if closed.is_some() {
                    self.client()
                        .send(Outbound::ActiveDocument { path: None });
                }
                Ok(json!({ "closed": closed }))
            }
            Command::ReloadConfig => self.reload_config().await,
            Command::AppendSnippet {
                path,
                text,
                file_path,
                line,
            } => {
                let uid = self
                    .with_session_mut(|session| {
                        session.append_snippet(&path, &text, &file_path, &line)
                    })
                    .await?;
                Ok(json!({ "uid": uid }))
            }
        }
    }

    async fn ready(&self) -> HandlerResult {
        let (roots, state, warning) = self
            .with_session(|session| {
                (
                    session.list_roots(),
                    session.tree_state(),
                    session.roots_warning().map(ToString::to_string),
                )
            })
            .await;
        let roots = roots?;
        let state = state.unwrap_or_else(|err| {
            tracing::warn!("ignoring unreadable tree state: {err}");
            snipt_conf::TreeState::default()
        });
        Ok(json!({
            "roots": roots,
            "expanded": state.expanded,
            "warning": warning,
        }))
    }

    /// Re-read the root configuration, as for an explicit `reloadConfig`.
    pub async fn reload_config(&self) -> HandlerResult {
        let (roots, warning) = self
            .with_session_mut(|session| {
                let warning = session.reload_roots().map(ToString::to_string);
                (session.list_roots(), warning)
            })
            .await;
        if let Some(warning) = &warning {
            self.client().warning(warning.clone());
        }
        let roots = roots?;
        self.client().send(Outbound::Refresh {
            paths: roots.iter().map(|node| node.path.to_string()).collect(),
        });
        Ok(json!({ "roots": roots, "warning": warning }))
    }

    /// Gates, then confirmation with the session unlocked, then commit.
    async fn remove(&self, path: &str, is_folder: bool) -> HandlerResult {
        let pending = self
            .with_session(|session| session.prepare_remove(path, is_folder))
            .await?;

        let message = pending.confirmation_message();
        if !self.confirm().confirm(&message).await {
            tracing::debug!("remove of {} declined", pending.path());
            return Ok(json!({ "removed": false }));
        }

        let result = self
            .with_session_mut(|session| session.commit_remove(pending))
            .await;
        // The listener heard about the removal even if the delete failed.
        self.flush_signals().await;
        let event = result?;
        self.publish(&event);
        Ok(json!({ "removed": true, "event": event }))
    }

    async fn mutate<F>(&self, f: F) -> HandlerResult
    where
        F: FnOnce(&mut crate::session::Session) -> snipt_workspace::Result<MutationEvent>,
    {
        let event = self.with_session_mut(f).await?;
        self.publish(&event);
        self.flush_signals().await;
        to_value(event)
    }

    /// Tell the UI which folders to refresh.
    fn publish(&self, event: &MutationEvent) {
        let mut paths: Vec<String> = event
            .affected_paths()
            .into_iter()
            .map(|path| refresh_target(path).to_string())
            .collect();
        paths.sort();
        paths.dedup();
        self.client().send(Outbound::Refresh { paths });
    }

    async fn flush_signals(&self) {
        let signals = self
            .with_session_mut(crate::session::Session::drain_signals)
            .await;
        for signal in signals {
            let message = match signal {
                TrackerSignal::Retargeted { to, .. } | TrackerSignal::Reloaded { path: to } => {
                    Outbound::ActiveDocument {
                        path: Some(to.to_string()),
                    }
                }
                TrackerSignal::ForceClosed { path, reason } => {
                    self.client().warning(reason.clone());
                    Outbound::ForceClose {
                        path: path.to_string(),
                        reason,
                    }
                }
                TrackerSignal::ReloadPrompt { path } => Outbound::ReloadPrompt {
                    path: path.to_string(),
                },
            };
            self.client().send(message);
        }
    }
}

fn refresh_target(path: &VirtualPath) -> VirtualPath {
    path.parent().unwrap_or_else(|| path.clone())
}
