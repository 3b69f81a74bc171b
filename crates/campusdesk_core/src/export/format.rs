//! Shared field formatting for ledger files.
//!
//! # Invariants
//! - Amounts render as plain numbers with exactly two decimals.
//! - Dates render with one of the fixed `DateFormat` patterns and parse back
//!   to the same calendar date.
//! - CSV fields are quoted only when they contain the delimiter, a quote or a
//!   line break; IIF fields are never quoted and never contain tabs or breaks.

use super::ExportError;
use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

static CONTROL_CHARS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("valid control char regex")
});
static IIF_BREAKS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\t\r\n]+").expect("valid iif break regex"));

/// Date layouts accepted by the supported accounting packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFormat {
    /// `01/31/2025`
    #[serde(rename = "MDY")]
    MonthDayYear,
    /// `2025-01-31`
    #[serde(rename = "YMD")]
    YearMonthDay,
    /// `31/01/2025`
    #[serde(rename = "DMY")]
    DayMonthYear,
    /// `01/31/25`, the QuickBooks IIF convention.
    #[serde(rename = "MDYY")]
    ShortMonthDayYear,
}

impl DateFormat {
    pub fn pattern(self) -> &'static str {
        match self {
            Self::MonthDayYear => "%m/%d/%Y",
            Self::YearMonthDay => "%Y-%m-%d",
            Self::DayMonthYear => "%d/%m/%Y",
            Self::ShortMonthDayYear => "%m/%d/%y",
        }
    }

    pub fn format(self, date: NaiveDate) -> String {
        date.format(self.pattern()).to_string()
    }

    /// Parses a date rendered by [`DateFormat::format`].
    ///
    /// Two-digit years resolve to 1969..=2068.
    pub fn parse(self, value: &str) -> Result<NaiveDate, ExportError> {
        NaiveDate::parse_from_str(value.trim(), self.pattern()).map_err(|err| {
            ExportError::Format(format!(
                "`{value}` does not match date pattern {}: {err}",
                self.pattern()
            ))
        })
    }
}

/// Renders an amount as a fixed two-decimal plain number.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded.to_string()
}

/// Strips control characters (keeping tab and line breaks) and trims.
pub fn sanitize_text(value: &str) -> String {
    CONTROL_CHARS_RE.replace_all(value, "").trim().to_string()
}

/// Sanitizes a tab-delimited IIF field: tabs and line breaks become one space.
pub fn sanitize_iif_text(value: &str) -> String {
    let collapsed = IIF_BREAKS_RE.replace_all(value, " ");
    sanitize_text(&collapsed)
}

/// Row-oriented delimited file builder backed by the `csv` writer.
pub struct DelimitedWriter {
    inner: csv::Writer<Vec<u8>>,
}

impl DelimitedWriter {
    /// CSV with necessary-only quoting and CRLF line endings.
    pub fn csv(delimiter: u8) -> Self {
        let inner = WriterBuilder::new()
            .delimiter(delimiter)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::CRLF)
            .from_writer(Vec::new());
        Self { inner }
    }

    /// IIF: tab-delimited, unquoted, variable-width rows.
    pub fn iif() -> Self {
        let inner = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(QuoteStyle::Never)
            .flexible(true)
            .terminator(Terminator::CRLF)
            .from_writer(Vec::new());
        Self { inner }
    }

    pub fn row<I, T>(&mut self, cells: I) -> Result<(), ExportError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.inner.write_record(cells)?;
        Ok(())
    }

    pub fn finish(self) -> Result<Vec<u8>, ExportError> {
        self.inner
            .into_inner()
            .map_err(|err| ExportError::Format(format!("failed to flush rows: {}", err.error())))
    }
}
