//! Tracing setup.
//!
//! Everything at the configured level goes to a daily log file. Warnings and
//! errors are also forwarded to the UI as `log` messages through
//! [`ClientLayer`], so a user notices trouble without opening the file.

use snipt_conf::Settings;
use tracing::field::Visit;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::Registry;

use crate::client::Client;

/// A tracing layer that forwards events to the UI.
pub struct ClientLayer {
    client: Client,
}

impl ClientLayer {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

struct MessageVisitor {
    message: Option<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        }
    }
}

impl<S> Layer<S> for ClientLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = match *event.metadata().level() {
            Level::ERROR => "error",
            Level::WARN => "warn",
            _ => return,
        };

        let mut visitor = MessageVisitor { message: None };
        event.record(&mut visitor);

        if let Some(message) = visitor.message {
            self.client.log(level, message);
        }
    }
}

/// Install the file and client layers.
///
/// `RUST_LOG` wins over the configured level. The returned guard flushes the
/// file writer on drop and must be held for the life of the server.
pub fn init_tracing(settings: &Settings, client: Client) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(settings.log_dir(), "snipt.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level()));
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    let client_layer =
        ClientLayer::new(client).with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    if let Err(err) = Registry::default()
        .with(file_layer)
        .with(client_layer)
        .try_init()
    {
        eprintln!("tracing already initialized: {err}");
    }

    guard
}
