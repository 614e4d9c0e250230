//! Minimal CLI parsing.
//!
//! `librarian-sync` with no arguments runs the full sync. Everything after a
//! subcommand is joined with spaces, so unquoted paths containing spaces work.

use std::env;
use std::path::PathBuf;

use anyhow::Result;

pub const USAGE: &[&str] = &[
    "Usage: librarian-sync {options}",
    "No options - Begin main sync",
    "move {path} - Moves media files in the given path into the library",
    "copy {path} - Copies media files in the given path into the library (expands archives first)",
    "movie {path} - Test renaming for a given movie path",
    "tv {path} - Test renaming for a given tv path",
    "sql {command text} - Execute the command text against the catalog database",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run,
    Help,
    Move(PathBuf),
    Copy(PathBuf),
    Movie(PathBuf),
    Tv(PathBuf),
    Sql(String),
}

impl Command {
    pub fn from_args() -> Result<Self> {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let Some(name) = args.next() else {
            return Ok(Command::Run);
        };
        let rest = args.collect::<Vec<_>>().join(" ");
        let rest = rest.trim();

        let require = |what: &str| -> Result<String> {
            if rest.is_empty() {
                anyhow::bail!("'{}' requires {}", name, what);
            }
            Ok(rest.to_string())
        };

        match name.as_str() {
            "help" | "-h" | "-?" | "?" => Ok(Command::Help),
            "move" => Ok(Command::Move(PathBuf::from(require("a path")?))),
            "copy" => Ok(Command::Copy(PathBuf::from(require("a path")?))),
            "movie" => Ok(Command::Movie(PathBuf::from(require("a path")?))),
            "tv" => Ok(Command::Tv(PathBuf::from(require("a path")?))),
            "sql" => Ok(Command::Sql(require("command text")?)),
            other => anyhow::bail!("Unknown command '{}'", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_args_runs_sync() {
        assert_eq!(Command::parse(Vec::<String>::new()).unwrap(), Command::Run);
    }

    #[test]
    fn test_help_aliases() {
        for alias in ["help", "-h", "-?", "?"] {
            assert_eq!(Command::parse([alias]).unwrap(), Command::Help);
        }
    }

    #[test]
    fn test_path_with_spaces_is_joined() {
        assert_eq!(
            Command::parse(["move", "/srv/My", "Shows"]).unwrap(),
            Command::Move(PathBuf::from("/srv/My Shows"))
        );
        assert_eq!(
            Command::parse(["sql", "DELETE", "FROM", "sync_files"]).unwrap(),
            Command::Sql("DELETE FROM sync_files".to_string())
        );
    }

    #[test]
    fn test_missing_argument_and_unknown() {
        assert!(Command::parse(["copy"]).is_err());
        assert!(Command::parse(["tv", "  "]).is_err());
        assert!(Command::parse(["frobnicate"]).is_err());
    }
}
