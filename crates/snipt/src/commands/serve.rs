use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::args::Args;
use crate::commands::load_settings;
use crate::commands::Command;

#[derive(Debug, Parser)]
pub struct Serve {
    /// Do not reload roots when the roots file changes.
    #[arg(long)]
    no_watch: bool,
}

impl Command for Serve {
    fn execute(&self, args: &Args) -> Result<ExitCode> {
        let mut settings = load_settings(args)?;
        if self.no_watch {
            settings = settings.with_watch_roots_file(false);
        }
        snipt_server::serve(settings)?;
        Ok(ExitCode::SUCCESS)
    }
}
