//! Parsing of the exchange trade-history CSV export.

use crate::domain::{Decimal, RawTradeRow, Side, TimeMs};
use chrono::{DateTime, NaiveDateTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerReadError {
    #[error("csv parse error: {0}")]
    Csv(String),
    #[error("row {row}: invalid {field}: {message}")]
    InvalidField {
        row: usize,
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Row {
    #[serde(rename = "Date(UTC)")]
    date: String,
    #[serde(rename = "Market")]
    market: String,
    #[serde(rename = "Type")]
    side: String,
    #[serde(rename = "Price")]
    price: String,
    #[serde(rename = "Amount")]
    amount: String,
}

/// Parse `YYYY-MM-DD HH:MM:SS` (UTC) or RFC 3339.
pub fn parse_ledger_date(s: &str) -> Option<TimeMs> {
    let s = s.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(TimeMs::new(naive.and_utc().timestamp_millis()));
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| TimeMs::new(dt.timestamp_millis()))
}

/// Parse a trade-history export into raw rows, preserving file order.
///
/// Extra columns are ignored. Row numbers in errors are 1-based data rows.
pub fn parse_trade_history(csv_bytes: &[u8]) -> Result<Vec<RawTradeRow>, LedgerReadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_bytes);

    let mut rows = Vec::new();
    for (idx, record) in reader.deserialize::<Row>().enumerate() {
        let row_no = idx + 1;
        let row = record.map_err(|e| LedgerReadError::Csv(e.to_string()))?;
        let invalid = |field: &'static str, message: String| LedgerReadError::InvalidField {
            row: row_no,
            field,
            message,
        };

        let timestamp =
            parse_ledger_date(&row.date).ok_or_else(|| invalid("Date(UTC)", row.date.clone()))?;
        let side: Side = row.side.parse().map_err(|e: String| invalid("Type", e))?;
        let price = Decimal::from_str_canonical(&row.price)
            .map_err(|e| invalid("Price", e.to_string()))?;
        let amount = Decimal::from_str_canonical(&row.amount)
            .map_err(|e| invalid("Amount", e.to_string()))?;

        rows.push(RawTradeRow::new(timestamp, &row.market, side, amount, price));
    }

    Ok(rows)
}
