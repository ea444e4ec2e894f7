use std::process::ExitCode;

use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use clap::Parser;
use snipt_workspace::VirtualPath;

use crate::args::Args;
use crate::commands::load_roots;
use crate::commands::load_settings;
use crate::commands::resolver;
use crate::commands::Command;

#[derive(Debug, Parser)]
pub struct Resolve {
    /// A virtual path such as `Drafts/notes`, or an absolute physical path.
    path: String,
}

impl Command for Resolve {
    fn execute(&self, args: &Args) -> Result<ExitCode> {
        let settings = load_settings(args)?;
        let (_, load) = load_roots(&settings);
        if let Some(warning) = &load.warning {
            if args.global.verbose > 0 {
                eprintln!("warning: {warning}");
            }
        }
        let resolver = resolver(&settings, &load);

        if is_physical(&self.path) {
            let absolute = resolver.to_absolute(&self.path)?;
            return Ok(match resolver.to_virtual(&absolute) {
                Some(path) => {
                    println!("{path}");
                    ExitCode::SUCCESS
                }
                None => {
                    if !args.global.quiet {
                        eprintln!(
                            "{} is not inside any root folder",
                            resolver.to_relative(&absolute)
                        );
                    }
                    ExitCode::FAILURE
                }
            });
        }

        let path = VirtualPath::parse(&self.path)?;
        let physical: Utf8PathBuf = resolver.resolve(&path)?;
        println!("{physical}");
        Ok(ExitCode::SUCCESS)
    }
}

fn is_physical(input: &str) -> bool {
    let input = input.trim();
    input.starts_with(['/', '\\']) || Utf8Path::new(input).is_absolute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_physical() {
        assert!(is_physical("/home/me/Drafts/a"));
        assert!(is_physical("  /tmp"));
        assert!(!is_physical("Drafts/a"));
        assert!(!is_physical("Drafts\\a"));
    }
}
