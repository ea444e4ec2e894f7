use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use serde_json::Value;
use snipt_server::protocol::WireError;
use snipt_server::Client;
use snipt_server::Confirm;
use snipt_server::Outbound;
use snipt_server::Session;
use snipt_server::SniptServer;
use snipt_workspace::InMemoryFileSystem;
use snipt_workspace::PathResolver;
use snipt_workspace::Root;
use snipt_workspace::Store;
use snipt_workspace::VirtualPath;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::LocalSet;

struct Answer(bool);

#[async_trait]
impl Confirm for Answer {
    async fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

struct Harness {
    server: SniptServer,
    receiver: UnboundedReceiver<Outbound>,
}

impl Harness {
    fn new(fs: InMemoryFileSystem) -> Self {
        fs.add_dir("/root/Drafts");
        fs.add_dir("/root/LocalSpace");
        let resolver = PathResolver::new(
            vec![
                Root::new("Drafts", "/root/Drafts"),
                Root::new("LocalSpace", "/root/LocalSpace"),
            ],
            "/root",
        );
        let store = Arc::new(Store::new(Arc::new(fs), resolver));
        let (client, receiver) = Client::channel();
        Self {
            server: SniptServer::new(Session::with_store(store), client),
            receiver,
        }
    }

    fn answering(mut self, accepted: bool) -> Self {
        self.server = self.server.with_confirm(Arc::new(Answer(accepted)));
        self
    }

    async fn send(&mut self, message: Value) -> Vec<Outbound> {
        self.server.handle_line(&message.to_string()).await;
        self.drain()
    }

    fn drain(&mut self) -> Vec<Outbound> {
        let mut messages = Vec::new();
        while let Ok(message) = self.receiver.try_recv() {
            messages.push(message);
        }
        messages
    }

    async fn exists(&self, path: &str) -> bool {
        let path = VirtualPath::parse(path).unwrap();
        self.server
            .with_session(|session| session.store().exists(&path))
            .await
            .unwrap()
    }
}

fn response(messages: &[Outbound]) -> &Outbound {
    messages
        .iter()
        .find(|message| matches!(message, Outbound::Response { .. }))
        .expect("no response")
}

fn result(messages: &[Outbound]) -> &Value {
    match response(messages) {
        Outbound::Response {
            ok: true,
            result: Some(result),
            ..
        } => result,
        other => panic!("expected success, got {other:?}"),
    }
}

fn error_kind(messages: &[Outbound]) -> &str {
    match response(messages) {
        Outbound::Response {
            ok: false,
            error: Some(WireError { kind, .. }),
            ..
        } => kind,
        other => panic!("expected failure, got {other:?}"),
    }
}

fn force_closes(messages: &[Outbound]) -> usize {
    messages
        .iter()
        .filter(|message| matches!(message, Outbound::ForceClose { .. }))
        .count()
}

#[tokio::test]
async fn test_rename_of_containing_folder_retargets_active_document() {
    let fs = InMemoryFileSystem::new();
    fs.add_file("/root/Drafts/proj/note.snippet", r#"{"title": "note"}"#);
    let mut harness = Harness::new(fs);

    let opened = harness
        .send(json!({"id": 1, "type": "openFile", "path": "Drafts/proj/note.snippet"}))
        .await;
    assert_eq!(result(&opened)["document"]["title"], "note");

    let messages = harness
        .send(json!({"id": 2, "type": "rename", "oldPath": "Drafts/proj", "newName": "work"}))
        .await;

    assert_eq!(
        messages,
        vec![
            Outbound::Refresh {
                paths: vec!["Drafts".to_string()],
            },
            Outbound::ActiveDocument {
                path: Some("Drafts/work/note.snippet".to_string()),
            },
            Outbound::success(
                Some(2),
                json!({
                    "kind": "renamed",
                    "from": "Drafts/proj",
                    "to": "Drafts/work",
                    "isDir": true,
                })
            ),
        ]
    );
    assert!(harness.exists("Drafts/work/note.snippet").await);
}

#[tokio::test]
async fn test_folder_onto_file_is_rejected_even_with_overwrite() {
    let fs = InMemoryFileSystem::new();
    fs.add_dir("/root/Drafts/x");
    fs.add_file("/root/LocalSpace/x", "{}");
    let mut harness = Harness::new(fs);

    let messages = harness
        .send(json!({
            "id": 3,
            "type": "move",
            "sourcePath": "Drafts/x",
            "targetPath": "LocalSpace",
            "isFolder": true,
            "overwrite": true,
        }))
        .await;

    assert_eq!(error_kind(&messages), "conflict");
    assert_eq!(messages.len(), 1);
    assert!(harness.exists("Drafts/x").await);
}

#[tokio::test]
async fn test_copy_folder_keeps_source() {
    let fs = InMemoryFileSystem::new();
    fs.add_file("/root/Drafts/proj/a.snippet", "{}");
    fs.add_file("/root/Drafts/proj/sub/b.snippet", "{}");
    let mut harness = Harness::new(fs);

    let messages = harness
        .send(json!({
            "id": 4,
            "type": "copy",
            "sourcePath": "Drafts/proj",
            "targetPath": "LocalSpace",
            "isFolder": true,
        }))
        .await;

    assert_eq!(result(&messages)["kind"], "copied");
    assert!(messages.contains(&Outbound::Refresh {
        paths: vec!["Drafts".to_string(), "LocalSpace".to_string()],
    }));
    assert!(harness.exists("LocalSpace/proj/sub/b.snippet").await);
    assert!(harness.exists("Drafts/proj/a.snippet").await);
}

#[tokio::test]
async fn test_remove_folder_with_active_document_after_confirmation() {
    let fs = InMemoryFileSystem::new();
    fs.add_file("/root/Drafts/proj/note.snippet", r#"{"title": "note"}"#);
    let mut harness = Harness::new(fs);

    LocalSet::new()
        .run_until(async {
            harness
                .send(json!({"type": "openFile", "path": "Drafts/proj/note.snippet"}))
                .await;

            let removing = tokio::task::spawn_local({
                let server = harness.server.clone();
                async move {
                    server
                        .handle_line(
                            r#"{"id": 5, "type": "remove", "fullPath": "Drafts/proj", "name": "proj", "isFolder": true}"#,
                        )
                        .await;
                }
            });

            let Some(Outbound::Confirm { prompt_id, message }) = harness.receiver.recv().await
            else {
                panic!("expected a confirmation prompt");
            };
            assert_eq!(message, "Delete folder 'proj' and everything in it?");
            assert!(harness.exists("Drafts/proj").await);

            let mut messages = harness
                .send(json!({"type": "confirmResponse", "promptId": prompt_id, "accepted": true}))
                .await;
            removing.await.unwrap();
            messages.extend(harness.drain());

            assert_eq!(force_closes(&messages), 1);
            assert!(messages.contains(&Outbound::Refresh {
                paths: vec!["Drafts".to_string()],
            }));
            let removed = messages.iter().find_map(|message| match message {
                Outbound::Response {
                    id: Some(5),
                    result: Some(result),
                    ..
                } => Some(result),
                _ => None,
            });
            assert_eq!(removed.map(|result| &result["removed"]), Some(&json!(true)));
            assert!(!harness.exists("Drafts/proj").await);
        })
        .await;
}

#[tokio::test]
async fn test_declined_remove_changes_nothing() {
    let fs = InMemoryFileSystem::new();
    fs.add_file("/root/Drafts/x.snippet", "{}");
    let mut harness = Harness::new(fs).answering(false);

    let messages = harness
        .send(json!({"id": 7, "type": "remove", "fullPath": "Drafts/x.snippet", "name": "x.snippet"}))
        .await;

    assert_eq!(messages, vec![Outbound::success(Some(7), json!({"removed": false}))]);
    assert!(harness.exists("Drafts/x.snippet").await);
}

#[tokio::test]
async fn test_root_folders_cannot_be_moved_or_renamed() {
    let mut harness = Harness::new(InMemoryFileSystem::new()).answering(true);

    let renamed = harness
        .send(json!({"id": 8, "type": "rename", "oldPath": "Drafts", "newName": "Other"}))
        .await;
    assert_eq!(error_kind(&renamed), "validation");

    let moved = harness
        .send(json!({"id": 9, "type": "move", "sourcePath": "Drafts", "targetPath": "LocalSpace", "isFolder": true}))
        .await;
    assert_eq!(error_kind(&moved), "validation");

    let removed = harness
        .send(json!({"id": 10, "type": "remove", "fullPath": "LocalSpace", "isFolder": true}))
        .await;
    assert_eq!(error_kind(&removed), "validation");

    assert!(harness.exists("Drafts").await);
    assert!(harness.exists("LocalSpace").await);
}

#[tokio::test]
async fn test_overwriting_the_active_document_prompts_for_reload() {
    let fs = InMemoryFileSystem::new();
    fs.add_file("/root/Drafts/x.snippet", r#"{"title": "incoming"}"#);
    fs.add_file("/root/LocalSpace/x.snippet", r#"{"title": "stale"}"#);
    let mut harness = Harness::new(fs);

    harness
        .send(json!({"type": "openFile", "path": "LocalSpace/x.snippet"}))
        .await;

    let refused = harness
        .send(json!({"id": 11, "type": "move", "sourcePath": "Drafts/x.snippet", "targetPath": "LocalSpace"}))
        .await;
    assert_eq!(error_kind(&refused), "conflict");

    let moved = harness
        .send(json!({
            "id": 12,
            "type": "move",
            "sourcePath": "Drafts/x.snippet",
            "targetPath": "LocalSpace",
            "overwrite": true,
        }))
        .await;
    assert_eq!(result(&moved)["replaced"], true);
    assert!(moved.contains(&Outbound::ReloadPrompt {
        path: "LocalSpace/x.snippet".to_string(),
    }));
    assert_eq!(force_closes(&moved), 0);

    let reloaded = harness
        .send(json!({"id": 13, "type": "reloadChoice", "reload": true}))
        .await;
    assert!(reloaded.contains(&Outbound::ActiveDocument {
        path: Some("LocalSpace/x.snippet".to_string()),
    }));
    let content = harness
        .server
        .with_session(|session| session.tracker().active().map(|doc| doc.content.clone()))
        .await;
    assert_eq!(content.as_deref(), Some(r#"{"title": "incoming"}"#));
}

#[tokio::test]
async fn test_malformed_message_gets_protocol_error() {
    let mut harness = Harness::new(InMemoryFileSystem::new());

    let messages = harness
        .send(json!({"id": 14, "type": "rename", "oldPath": "Drafts/a"}))
        .await;
    assert_eq!(error_kind(&messages), "protocol");
    assert!(matches!(
        response(&messages),
        Outbound::Response { id: Some(14), .. }
    ));
}

#[tokio::test]
async fn test_ready_lists_roots() {
    let mut harness = Harness::new(InMemoryFileSystem::new());

    let messages = harness.send(json!({"id": 15, "type": "ready"})).await;
    let names: Vec<_> = result(&messages)["roots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|node| node["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Drafts", "LocalSpace"]);
    assert_eq!(result(&messages)["expanded"], json!([]));
}
