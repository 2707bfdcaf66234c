use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::keys::KeyMode;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Convert personnel CSV exports into bulk SQL INSERT scripts",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert a CSV export into a single multi-row INSERT statement
    Convert(ConvertArgs),
    /// List built-in profiles or export one as YAML
    Profiles(ProfilesArgs),
    /// Report values that occur more than once in a column of a generated SQL file
    Duplicates(DuplicatesArgs),
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Input CSV file ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output SQL file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Built-in profile to apply (defaults to 'users')
    #[arg(short = 'p', long = "profile", conflicts_with = "config")]
    pub profile: Option<String>,
    /// YAML profile file describing the destination table
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Override how missing and duplicate natural keys are handled
    #[arg(long = "key-mode", value_enum)]
    pub key_mode: Option<KeyMode>,
    /// Override the literal written to password columns
    #[arg(long = "default-password")]
    pub default_password: Option<String>,
    /// Override the destination table name
    #[arg(long)]
    pub table: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProfilesArgs {
    /// Print the named built-in profile as YAML
    #[arg(long)]
    pub show: Option<String>,
    /// Write the shown profile to this file instead of stdout
    #[arg(short = 'o', long = "output", requires = "show")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DuplicatesArgs {
    /// Generated SQL file to scan
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Column whose values should be unique (e.g. username, payroll_number)
    #[arg(short = 'c', long = "column")]
    pub column: String,
    /// Exit with an error when duplicates are found
    #[arg(long = "fail-on-duplicates")]
    pub fail_on_duplicates: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_single_characters() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("semicolon"), Ok(b';'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("§").is_err());
    }

    #[test]
    fn convert_rejects_profile_and_config_together() {
        let parsed = Cli::try_parse_from([
            "roster-sql",
            "convert",
            "-i",
            "in.csv",
            "-p",
            "users",
            "-c",
            "custom.yaml",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn convert_parses_key_mode_override() {
        let cli = Cli::try_parse_from([
            "roster-sql",
            "convert",
            "-i",
            "in.csv",
            "--key-mode",
            "disambiguate",
        ])
        .unwrap();
        match cli.command {
            Commands::Convert(args) => {
                assert_eq!(args.key_mode, Some(KeyMode::Disambiguate));
                assert!(args.profile.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
