pub mod batch;
pub mod cli;
pub mod convert;
pub mod data;
pub mod dates;
pub mod duplicates;
pub mod headers;
pub mod io_utils;
pub mod keys;
pub mod normalize;
pub mod policy;
pub mod profile;
pub mod sql;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands},
    profile::Profile,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("roster_sql", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Convert(args) => convert::execute(&args),
        Commands::Profiles(args) => handle_profiles(&args),
        Commands::Duplicates(args) => duplicates::execute(&args),
    }
}

fn handle_profiles(args: &cli::ProfilesArgs) -> Result<()> {
    let Some(name) = args.show.as_deref() else {
        let headers = ["profile", "table", "key mode", "columns", "description"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        let rows = Profile::builtins()?
            .into_iter()
            .map(|profile| {
                vec![
                    profile.name.clone(),
                    profile.table.clone(),
                    profile.key.mode.as_str().to_string(),
                    profile.columns.len().to_string(),
                    profile.description.clone().unwrap_or_default(),
                ]
            })
            .collect::<Vec<_>>();
        table::print_table(&headers, &rows);
        return Ok(());
    };

    let profile = Profile::builtin(name)?;
    match &args.output {
        Some(path) => {
            profile
                .save(path)
                .with_context(|| format!("Exporting profile '{}'", profile.name))?;
            info!("Profile '{}' written to {:?}", profile.name, path);
            Ok(())
        }
        None => {
            let yaml = profile.to_yaml()?;
            io_utils::write_document(None, &yaml)
        }
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
