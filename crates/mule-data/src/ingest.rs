//! Transaction CSV ingestion.
//!
//! Reads the `transaction_id,sender_id,receiver_id,amount,timestamp` export
//! format into [`Transaction`] records. Columns may appear in any order and
//! extra columns are ignored. Malformed data rows are skipped and logged at
//! debug level; a header missing a required column is an error.
//!
//! Fields may be double-quoted. A quoted field can hold commas, line breaks,
//! and `""` for a literal quote. [`transactions_to_csv`] quotes any field
//! that needs it, so rendered output parses back to the same records.

use std::borrow::Cow;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use eyre::{eyre, Context, Result};
use tracing::{debug, info};

use crate::types::Transaction;

/// Columns every transaction export must carry.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    "transaction_id",
    "sender_id",
    "receiver_id",
    "amount",
    "timestamp",
];

/// Accepted naive timestamp layouts. RFC 3339 is tried separately.
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    transaction_id: usize,
    sender_id: usize,
    receiver_id: usize,
    amount: usize,
    timestamp: usize,
}

impl ColumnMap {
    fn from_header(header: &[String]) -> Result<Self> {
        let names: Vec<String> = header
            .iter()
            .map(|name| name.to_ascii_lowercase())
            .collect();
        let position = |column: &str| names.iter().position(|name| name == column);

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|column| position(column).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(eyre!(
                "CSV must contain columns {:?}; missing {:?}",
                REQUIRED_COLUMNS,
                missing
            ));
        }

        // All positions exist: checked above.
        let at = |column: &str| position(column).unwrap_or_default();
        Ok(Self {
            transaction_id: at("transaction_id"),
            sender_id: at("sender_id"),
            receiver_id: at("receiver_id"),
            amount: at("amount"),
            timestamp: at("timestamp"),
        })
    }

    fn width(&self) -> usize {
        [
            self.transaction_id,
            self.sender_id,
            self.receiver_id,
            self.amount,
            self.timestamp,
        ]
        .into_iter()
        .max()
        .unwrap_or_default()
            + 1
    }
}

/// Splits CSV text into records, each tagged with the line it starts on.
///
/// Unquoted fields are trimmed; quoted fields are kept verbatim. Blank lines
/// produce no record.
fn split_records(content: &str) -> Vec<(usize, Vec<String>)> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut was_quoted = false;
    let mut line = 0usize;
    let mut record_line = 0usize;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if !was_quoted && field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
                was_quoted = true;
            }
            ',' => fields.push(finish_field(&mut field, &mut was_quoted)),
            '\n' => {
                fields.push(finish_field(&mut field, &mut was_quoted));
                push_record(&mut records, record_line, std::mem::take(&mut fields));
                line += 1;
                record_line = line;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            // Whitespace between a closing quote and the delimiter.
            _ if was_quoted && c.is_whitespace() => {}
            _ => field.push(c),
        }
    }

    if was_quoted || !field.is_empty() || !fields.is_empty() {
        fields.push(finish_field(&mut field, &mut was_quoted));
        push_record(&mut records, record_line, fields);
    }
    records
}

fn finish_field(field: &mut String, was_quoted: &mut bool) -> String {
    let value = std::mem::take(field);
    if std::mem::take(was_quoted) {
        value
    } else {
        value.trim().to_string()
    }
}

fn push_record(records: &mut Vec<(usize, Vec<String>)>, line: usize, fields: Vec<String>) {
    let blank = fields.len() == 1 && fields[0].is_empty();
    if !blank {
        records.push((line, fields));
    }
}

/// Quotes `value` when a plain rendering would not parse back unchanged.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) || value.trim() != value {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Returns true if `raw` parses under any accepted timestamp layout.
pub fn is_valid_timestamp(raw: &str) -> bool {
    if DateTime::parse_from_rfc3339(raw).is_ok() {
        return true;
    }
    TIMESTAMP_FORMATS
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(raw, format).is_ok())
}

/// Parses CSV text into transactions, preserving row order.
///
/// # Errors
/// Returns error if the text has no header row or the header lacks a
/// required column. Bad data rows are skipped, not reported as errors.
pub fn parse_transactions_csv(content: &str) -> Result<Vec<Transaction>> {
    let mut records = split_records(content.trim_start_matches('\u{feff}')).into_iter();

    let (_, header) = records
        .next()
        .ok_or_else(|| eyre!("CSV is empty; expected a header row"))?;
    let columns = ColumnMap::from_header(&header)?;
    let width = columns.width();

    let mut transactions = Vec::new();
    let mut skipped = 0usize;

    for (line_number, parts) in records {
        if parts.len() < width {
            debug!(line_number, fields = parts.len(), "skipping short row");
            skipped += 1;
            continue;
        }

        let amount = match parts[columns.amount].parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                debug!(line_number, amount = %parts[columns.amount], "skipping row with bad amount");
                skipped += 1;
                continue;
            }
        };

        let timestamp = parts[columns.timestamp].as_str();
        if !is_valid_timestamp(timestamp) {
            debug!(line_number, timestamp, "skipping row with unparseable timestamp");
            skipped += 1;
            continue;
        }

        let sender_id = parts[columns.sender_id].as_str();
        let receiver_id = parts[columns.receiver_id].as_str();
        if sender_id.is_empty() || receiver_id.is_empty() {
            debug!(line_number, "skipping row with empty account id");
            skipped += 1;
            continue;
        }

        transactions.push(Transaction {
            transaction_id: parts[columns.transaction_id].clone(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            amount,
            timestamp: timestamp.to_string(),
        });
    }

    info!(rows = transactions.len(), skipped, "parsed transaction CSV");
    Ok(transactions)
}

/// Reads and parses a transaction CSV file.
///
/// # Errors
/// Returns error if the file cannot be read or its header is invalid.
pub fn read_transactions_csv(path: &Path) -> Result<Vec<Transaction>> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    parse_transactions_csv(&content)
        .wrap_err_with(|| format!("failed to parse {}", path.display()))
}

/// Renders transactions back to CSV with the canonical column order.
///
/// Fields holding a delimiter, quote, line break, or edge whitespace are
/// quoted, so [`parse_transactions_csv`] recovers every record.
pub fn transactions_to_csv(transactions: &[Transaction]) -> String {
    let mut out = REQUIRED_COLUMNS.join(",");
    out.push('\n');
    for tx in transactions {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_field(&tx.transaction_id),
            csv_field(&tx.sender_id),
            csv_field(&tx.receiver_id),
            tx.amount,
            csv_field(&tx.timestamp)
        ));
    }
    out
}
