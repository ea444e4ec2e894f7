use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use snipt_conf::Settings;
use snipt_workspace::OsFileSystem;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWrite;
use tokio::io::BufReader;
use tokio::sync::RwLock;
use tokio::task::LocalSet;

use crate::client::write_outbound;
use crate::client::Client;
use crate::logging;
use crate::prompts::ClientPrompts;
use crate::prompts::Confirm;
use crate::session::Session;
use crate::watcher::RootsWatcher;

const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct SniptServer {
    client: Client,
    session: Arc<RwLock<Session>>,
    prompts: Arc<ClientPrompts>,
    confirm: Arc<dyn Confirm>,
}

impl SniptServer {
    #[must_use]
    pub fn new(session: Session, client: Client) -> Self {
        let prompts = Arc::new(ClientPrompts::new(client.clone()));
        Self {
            client,
            session: Arc::new(RwLock::new(session)),
            confirm: prompts.clone(),
            prompts,
        }
    }

    /// Replace the confirmation source, e.g. to auto-answer prompts.
    #[must_use]
    pub fn with_confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn prompts(&self) -> &ClientPrompts {
        &self.prompts
    }

    pub(crate) fn confirm(&self) -> &dyn Confirm {
        self.confirm.as_ref()
    }

    pub async fn with_session<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        let session = self.session.read().await;
        f(&session)
    }

    pub async fn with_session_mut<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.session.write().await;
        f(&mut session)
    }

    /// Read commands from `reader` until it closes, handling each one in its
    /// own local task so a command waiting on the user does not hold up the
    /// next.
    ///
    /// Must be called inside a [`LocalSet`].
    pub async fn run<R>(&self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let server = self.clone();
            tokio::task::spawn_local(async move {
                server.handle_line(&line).await;
            });
        }
        tracing::info!("input closed");
        Ok(())
    }
}

/// Run the server over stdio until stdin closes.
pub fn serve(settings: Settings) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(LocalSet::new().run_until(serve_stdio(
        settings,
        tokio::io::stdin(),
        tokio::io::stdout(),
    )))
}

async fn serve_stdio<R, W>(settings: Settings, input: R, output: W) -> Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWrite + Unpin + 'static,
{
    let (client, receiver) = Client::channel();
    let _guard = logging::init_tracing(&settings, client.clone());
    tracing::info!("starting snipt server");

    let writer = tokio::task::spawn_local(async move {
        if let Err(err) = write_outbound(receiver, output).await {
            tracing::error!("writing to the client failed: {err}");
        }
    });

    let watch = settings.watch_roots_file();
    let session = Session::new(settings, Arc::new(OsFileSystem));
    if let Some(warning) = session.roots_warning() {
        client.warning(warning.to_string());
    }
    let roots_file = session.roots_file().map(camino::Utf8Path::to_path_buf);
    let server = SniptServer::new(session, client);

    let _watcher = match roots_file {
        Some(path) if watch => RootsWatcher::spawn(&path, server.clone())
            .inspect_err(|err| tracing::warn!("not watching {path}: {err}"))
            .ok(),
        _ => None,
    };

    let result = server.run(BufReader::new(input)).await;
    // Give queued responses a moment to reach the client.
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, writer).await;
    tracing::info!("snipt server stopped");
    result
}
