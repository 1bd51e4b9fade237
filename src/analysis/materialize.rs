//! Turning grouped tallies into display tables.
//!
//! Every row is `[label, count per column..., total]`, where the total is
//! recomputed from the row's own cells.

use crate::analysis::grouper::{DayGroup, HourGroup};
use crate::analysis::tally::Tally;
use serde::Serialize;
use std::fmt;

/// Header of the trailing per-row sum column.
pub const TOTAL_COLUMN: &str = "TOTAL";
/// Label of the synthetic column-wise sum row.
pub const TOTAL_ROW_LABEL: &str = "Total";

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Count(usize),
}

impl Cell {
    /// Numeric value; text cells count as zero.
    pub fn count(&self) -> usize {
        match self {
            Cell::Count(n) => *n,
            Cell::Text(_) => 0,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Count(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<usize> for Cell {
    fn from(n: usize) -> Self {
        Cell::Count(n)
    }
}

/// A titled table of rows, optionally followed by a totals row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportTable {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals: Option<Vec<Cell>>,
}

impl ReportTable {
    pub fn new(title: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            title: title.into(),
            columns,
            rows: Vec::new(),
            totals: None,
        }
    }

    /// Sum of the trailing total cell across body rows.
    pub fn grand_total(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|row| row.last())
            .map(Cell::count)
            .sum()
    }
}

/// Union of labels across tallies, in first-seen order.
pub fn collect_columns<'a, I>(tallies: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Tally>,
{
    let mut seen = Tally::new();
    for tally in tallies {
        for label in tally.labels() {
            seen.add(label, 0);
        }
    }
    seen.labels().map(String::from).collect()
}

/// One row: the label, a count per known column (zero when absent) and the sum.
pub fn materialize_row(label: &str, tally: &Tally, columns: &[String]) -> Vec<Cell> {
    let counts: Vec<usize> = columns.iter().map(|c| tally.get(c)).collect();
    let total: usize = counts.iter().sum();

    let mut row = Vec::with_capacity(columns.len() + 2);
    row.push(Cell::from(label));
    row.extend(counts.into_iter().map(Cell::Count));
    row.push(Cell::Count(total));
    row
}

/// Day × collective table.
pub fn collective_table(days: &[DayGroup]) -> ReportTable {
    day_table(
        "Tabla por Colectivo",
        days,
        |day| &day.collectives,
    )
}

/// Day × source table.
pub fn source_table(days: &[DayGroup]) -> ReportTable {
    day_table("Tabla por Fuente", days, |day| &day.sources)
}

fn day_table<F>(title: &str, days: &[DayGroup], pick: F) -> ReportTable
where
    F: Fn(&DayGroup) -> &Tally,
{
    let categories = collect_columns(days.iter().map(&pick));
    let mut table = ReportTable::new(title, header("Fecha", &categories));

    table.rows = days
        .iter()
        .map(|day| materialize_row(&day.label, pick(day), &categories))
        .collect();

    table
}

/// Hour-of-today × collective table with a column-wise totals row.
///
/// With no events today the body is empty and the totals row is
/// `["Total", 0]`.
pub fn hourly_table(hours: &[HourGroup]) -> ReportTable {
    let categories = collect_columns(hours.iter().map(|h| &h.collectives));
    let mut table = ReportTable::new("Leads de hoy por hora", header("Hora", &categories));

    table.rows = hours
        .iter()
        .map(|hour| materialize_row(&hour.label, &hour.collectives, &categories))
        .collect();

    let mut sums = Tally::new();
    for hour in hours {
        for (label, count) in hour.collectives.iter() {
            sums.add(label, count);
        }
    }
    table.totals = Some(materialize_row(TOTAL_ROW_LABEL, &sums, &categories));

    table
}

/// Two-column `[label, count]` table from one tally, in first-seen order,
/// with a totals row.
pub fn tally_table(title: &str, label_header: &str, tally: &Tally) -> ReportTable {
    let mut table = ReportTable::new(title, vec![label_header.to_string(), "Leads".to_string()]);

    let mut rows = Vec::with_capacity(tally.len());
    for (label, count) in tally.iter() {
        rows.push(vec![Cell::from(label), Cell::Count(count)]);
    }
    table.rows = rows;
    table.totals = Some(vec![Cell::from(TOTAL_ROW_LABEL), Cell::Count(tally.total())]);

    table
}

fn header(first: &str, categories: &[String]) -> Vec<String> {
    let mut columns = Vec::with_capacity(categories.len() + 2);
    columns.push(first.to_string());
    columns.extend(categories.iter().cloned());
    columns.push(TOTAL_COLUMN.to_string());
    columns
}
