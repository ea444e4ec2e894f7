mod resolve;
mod roots;
mod serve;

use std::process::ExitCode;

use anyhow::Context;
use anyhow::Result;
use clap::Subcommand;
use snipt_conf::default_roots;
use snipt_conf::RootsConfig;
use snipt_conf::RootsLoad;
use snipt_conf::Settings;
use snipt_server::to_roots;
use snipt_workspace::PathResolver;

use crate::args::Args;

pub trait Command {
    fn execute(&self, args: &Args) -> Result<ExitCode>;
}

#[derive(Debug, Subcommand)]
pub enum SniptCommand {
    /// Start the tree server on stdio
    Serve(self::serve::Serve),
    /// Show the configured root folders
    Roots(self::roots::Roots),
    /// Translate between virtual and physical paths
    Resolve(self::resolve::Resolve),
}

impl Command for SniptCommand {
    fn execute(&self, args: &Args) -> Result<ExitCode> {
        match self {
            SniptCommand::Serve(cmd) => cmd.execute(args),
            SniptCommand::Roots(cmd) => cmd.execute(args),
            SniptCommand::Resolve(cmd) => cmd.execute(args),
        }
    }
}

fn load_settings(args: &Args) -> Result<Settings> {
    Settings::new(args.global.config.as_deref()).context("Failed to load settings")
}

/// Load the roots the server would start with.
fn load_roots(settings: &Settings) -> (Option<RootsConfig>, RootsLoad) {
    let defaults = default_roots(snipt_conf::data_dir().as_deref());
    match settings.roots_file() {
        Some(path) => {
            let mut config = RootsConfig::new(path, defaults);
            let load = config.load();
            (Some(config), load)
        }
        None => (
            None,
            RootsLoad {
                roots: defaults,
                warning: None,
            },
        ),
    }
}

fn resolver(settings: &Settings, load: &RootsLoad) -> PathResolver {
    PathResolver::new(to_roots(&load.roots), settings.session_root())
}
