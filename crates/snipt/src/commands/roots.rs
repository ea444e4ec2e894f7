use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::args::Args;
use crate::commands::load_roots;
use crate::commands::load_settings;
use crate::commands::Command;

#[derive(Debug, Parser)]
pub struct Roots {
    /// Write the default roots file if there is none yet.
    #[arg(long)]
    init: bool,
}

impl Command for Roots {
    fn execute(&self, args: &Args) -> Result<ExitCode> {
        let settings = load_settings(args)?;
        let (config, load) = load_roots(&settings);
        let quiet = args.global.quiet;

        if let Some(config) = &config {
            if self.init && config.write_defaults_if_missing()? && !quiet {
                eprintln!("Wrote default roots to {}", config.path());
            }
            if args.global.verbose > 0 {
                eprintln!("Roots file: {}", config.path());
            }
        }
        if let Some(warning) = &load.warning {
            if !quiet {
                eprintln!("warning: {warning}");
            }
        }

        if load.roots.is_empty() {
            return Ok(ExitCode::FAILURE);
        }
        if !quiet {
            for entry in &load.roots {
                println!("{} -> {}", entry.mapping.trim(), entry.physical());
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}
