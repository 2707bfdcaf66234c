//! The `convert` command: CSV export in, one INSERT script out.

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDateTime};
use encoding_rs::Encoding;
use log::{debug, info, warn};

use crate::{
    batch::{BatchHeader, SqlBatch},
    cli::ConvertArgs,
    headers::HeaderIndex,
    io_utils,
    keys::KeyMode,
    policy::{Correction, RowPlan, RowResolver},
    profile::{DEFAULT_PROFILE, Profile},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    pub rows_read: usize,
    pub rows_written: usize,
    pub blank_rows: usize,
    pub skipped: BTreeMap<&'static str, usize>,
    pub placeholder_keys: usize,
    pub disambiguated_keys: usize,
    pub date_fallbacks: usize,
    pub date_coercions: usize,
}

impl ConversionSummary {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    fn record_correction(&mut self, correction: &Correction) {
        match correction {
            Correction::PlaceholderKey(_) => self.placeholder_keys += 1,
            Correction::DisambiguatedKey { .. } => self.disambiguated_keys += 1,
            Correction::DateFallback { .. } => self.date_fallbacks += 1,
            Correction::DateCoerced { .. } => self.date_coercions += 1,
        }
    }
}

#[derive(Debug)]
pub struct Conversion {
    pub batch: SqlBatch,
    pub summary: ConversionSummary,
}

pub fn execute(args: &ConvertArgs) -> Result<()> {
    let profile = load_profile(args)?;
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output = args.output.as_deref();
    info!(
        "Converting '{}' with profile '{}' -> {} (delimiter '{}', key mode {})",
        args.input.display(),
        profile.name,
        io_utils::describe_destination(output),
        crate::printable_delimiter(delimiter),
        profile.key.mode.as_str()
    );

    let bytes = io_utils::read_input(&args.input)?;
    let conversion = convert_bytes(&bytes, &profile, delimiter, encoding)
        .with_context(|| format!("Converting {:?}", args.input))?;

    let header = build_header(
        &profile,
        &args.input,
        &io_utils::fingerprint(&bytes),
        Local::now().naive_local(),
    );
    let document = conversion.batch.render(&header);
    io_utils::write_document(output, &document)?;

    log_summary(&conversion.summary);
    info!(
        "Wrote {} row(s) to {}",
        conversion.summary.rows_written,
        io_utils::describe_destination(output)
    );
    Ok(())
}

/// Built-in or file profile with command-line overrides applied.
pub fn load_profile(args: &ConvertArgs) -> Result<Profile> {
    let mut profile = match &args.config {
        Some(path) => Profile::load(path)?,
        None => Profile::builtin(args.profile.as_deref().unwrap_or(DEFAULT_PROFILE))?,
    };
    if let Some(mode) = args.key_mode {
        profile.key.mode = mode;
    }
    if let Some(password) = &args.default_password {
        profile.default_password = password.clone();
    }
    if let Some(table) = &args.table {
        profile.table = table.trim().to_string();
    }
    profile.validate()?;
    Ok(profile)
}

pub fn convert_bytes(
    bytes: &[u8],
    profile: &Profile,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Conversion> {
    let mut reader = io_utils::open_csv_reader(bytes, delimiter);
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let index = HeaderIndex::new(&headers);
    if index.is_empty() {
        bail!("Input has no header row");
    }
    debug!("Input headers: {:?}", headers);
    let lines = io_utils::LineIndex::new(bytes);
    let header_end = reader.position().byte() as usize;
    let first_data_line = lines.line_of(header_end.saturating_sub(1)) + 1;

    let plan = RowPlan::compile(profile, &index)?;
    let mut batch = SqlBatch::new(profile.table.clone(), plan.column_names())?;
    let mut resolver = RowResolver::new(plan);
    let mut summary = ConversionSummary::default();

    for record in reader.byte_records() {
        let record = record
            .with_context(|| format!("Reading row after {} row(s)", summary.rows_read))?;
        // Numbered by input line so empty lines keep spreadsheet positions.
        let ordinal = match record.position() {
            Some(position) => {
                let start = io_utils::skip_line_breaks(bytes, position.byte() as usize);
                lines.line_of(start).saturating_sub(first_data_line) + 1
            }
            None => summary.rows_read + 1,
        };
        let values = io_utils::decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {ordinal}"))?;
        summary.rows_read += 1;

        if values.iter().all(|value| value.trim().is_empty()) {
            debug!("Row {ordinal} is blank; ignoring");
            summary.blank_rows += 1;
            continue;
        }

        match resolver.resolve(&values, ordinal) {
            Ok(row) => {
                for correction in &row.corrections {
                    warn_correction(ordinal, correction);
                    summary.record_correction(correction);
                }
                batch.push(row.literals)?;
                summary.rows_written += 1;
            }
            Err(defect) => {
                warn!("Skipping row {ordinal}: {defect}");
                *summary.skipped.entry(defect.kind()).or_insert(0) += 1;
            }
        }
    }

    Ok(Conversion { batch, summary })
}

fn warn_correction(ordinal: usize, correction: &Correction) {
    match correction {
        Correction::PlaceholderKey(key) => {
            warn!("Row {ordinal}: missing key replaced with placeholder '{key}'")
        }
        Correction::DisambiguatedKey { original, key } => {
            warn!("Row {ordinal}: duplicate key '{original}' rewritten as '{key}'")
        }
        Correction::DateFallback { column, reason } => {
            warn!("Row {ordinal}: {column} {reason}; using fallback date")
        }
        Correction::DateCoerced { column, raw } => {
            warn!("Row {ordinal}: {column} '{raw}' is February 29 of a non-leap year; using February 28")
        }
    }
}

pub fn build_header(
    profile: &Profile,
    source: &Path,
    fingerprint: &str,
    generated_at: NaiveDateTime,
) -> BatchHeader {
    let profile_label = match &profile.description {
        Some(description) => format!("{} ({description})", profile.name),
        None => profile.name.clone(),
    };
    let source_label = if io_utils::is_dash(source) {
        "stdin".to_string()
    } else {
        source.display().to_string()
    };
    let key_mode = match profile.key.mode {
        KeyMode::Skip => "skip (rows with a missing or duplicate key are dropped)".to_string(),
        KeyMode::Disambiguate => format!(
            "disambiguate (missing keys become {}<row>, duplicates become {}<key>_<row>)",
            profile.key.placeholder_prefix, profile.key.duplicate_prefix
        ),
    };

    BatchHeader::new(
        format!("Generated SQL INSERT statements for {} table", profile.table),
        generated_at,
    )
    .with_metadata("Profile", profile_label)
    .with_metadata("Source", source_label)
    .with_metadata("Source SHA-256", fingerprint)
    .with_metadata("Key mode", key_mode)
    .with_notes(profile.notes.iter().cloned())
}

fn log_summary(summary: &ConversionSummary) {
    info!(
        "Read {} row(s): {} written, {} skipped, {} blank",
        summary.rows_read,
        summary.rows_written,
        summary.skipped_total(),
        summary.blank_rows
    );
    for (reason, count) in &summary.skipped {
        info!("  skipped ({reason}): {count}");
    }
    if summary.placeholder_keys + summary.disambiguated_keys > 0 {
        info!(
            "  keys synthesized: {} placeholder(s), {} disambiguated",
            summary.placeholder_keys, summary.disambiguated_keys
        );
    }
    if summary.date_fallbacks + summary.date_coercions > 0 {
        info!(
            "  dates corrected: {} fallback(s), {} February 29 coercion(s)",
            summary.date_fallbacks, summary.date_coercions
        );
    }
}
