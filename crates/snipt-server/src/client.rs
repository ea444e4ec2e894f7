use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::protocol::Outbound;

/// Handle for sending messages to the UI.
///
/// Messages are queued and written by [`write_outbound`] in order. Sending
/// never blocks and never fails loudly: once the writer is gone there is
/// nobody left to tell.
#[derive(Clone, Debug)]
pub struct Client {
    sender: mpsc::UnboundedSender<Outbound>,
}

impl Client {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn send(&self, message: Outbound) {
        // A closed channel means the server is shutting down.
        let _ = self.sender.send(message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.send(Outbound::Warning {
            message: message.into(),
        });
    }

    pub fn log(&self, level: &str, message: impl Into<String>) {
        self.send(Outbound::Log {
            level: level.to_string(),
            message: message.into(),
        });
    }
}

/// Drain the outbound queue into `writer`, one JSON object per line.
pub async fn write_outbound<W>(
    mut receiver: mpsc::UnboundedReceiver<Outbound>,
    mut writer: W,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = receiver.recv().await {
        let mut line = match serde_json::to_vec(&message) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!("dropping unserializable message: {err}");
                continue;
            }
        };
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
