//! Lead and template table views.
//!
//! Projects events into display rows and applies the table controls:
//! accent-insensitive search, column sort and 1-based pagination.

use crate::analysis::{Cell, ReportTable};
use crate::models::{parse_timestamp, Event, Plantilla, NOT_AVAILABLE};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::cmp::Ordering;

/// Lead table header.
pub const LEAD_COLUMNS: [&str; 8] = [
    "Fecha y Hora",
    "Correo",
    "IcodCli",
    "Colectivo",
    "Asunto",
    "Fuente",
    "Sección",
    "Estado",
];

/// Template table header.
pub const TEMPLATE_COLUMNS: [&str; 3] = ["Fecha Envío", "Nombre Plantilla", "Número de Clicks"];

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Lead table column, in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Date,
    Email,
    ClientCode,
    Collective,
    Subject,
    Source,
    Section,
    Status,
}

impl SortColumn {
    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Search, sort and page selection for the lead table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub search: Option<String>,
    pub sort: Option<(SortColumn, SortDirection)>,
    /// 1-based page index.
    pub page: usize,
    pub page_size: usize,
}

impl Default for TableQuery {
    fn default() -> Self {
        Self {
            search: None,
            sort: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One projected lead row. The parsed timestamp is kept for date sorting.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadRow {
    pub timestamp: Option<DateTime<Utc>>,
    pub cells: Vec<String>,
}

/// A page of the lead table.
#[derive(Debug, Clone, PartialEq)]
pub struct TablePage {
    pub rows: Vec<Vec<String>>,
    pub page: usize,
    pub total_pages: usize,
    /// Rows matching the search, across all pages.
    pub matched: usize,
    /// Rows before searching.
    pub total: usize,
}

impl TablePage {
    pub fn to_table(&self, title: &str) -> ReportTable {
        let mut table = ReportTable::new(title, columns(&LEAD_COLUMNS));
        table.rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(|c| Cell::from(c.as_str())).collect())
            .collect();
        table
    }
}

/// Project an event into its display row; missing values become `N/A`.
pub fn lead_row<Tz>(event: &Event, tz: &Tz) -> LeadRow
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let timestamp = event.timestamp();
    let when = timestamp
        .map(|ts| ts.with_timezone(tz).format("%d/%m/%y %H:%M").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let text = |value: &Option<String>| match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    };

    LeadRow {
        timestamp,
        cells: vec![
            when,
            text(&event.email),
            text(&event.icodcli),
            text(&event.colectivo),
            text(&event.asunto),
            text(&event.fuente),
            text(&event.section),
            match event.lead_status() {
                Some(status) => status.label().to_string(),
                None => text(&event.status),
            },
        ],
    }
}

/// Lowercase and strip diacritics, so `Clínica` matches `clinica`.
pub fn fold_text(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

fn matches_search(row: &LeadRow, needle: &str) -> bool {
    row.cells.iter().any(|cell| fold_text(cell).contains(needle))
}

fn compare_rows(a: &LeadRow, b: &LeadRow, column: SortColumn) -> Ordering {
    match column {
        // Undated rows sort after dated ones.
        SortColumn::Date => match (a.timestamp, b.timestamp) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        _ => {
            let i = column.index();
            fold_text(&a.cells[i]).cmp(&fold_text(&b.cells[i]))
        }
    }
}

/// Number of pages for `len` rows; an empty table still has one page.
pub fn page_count(len: usize, page_size: usize) -> usize {
    len.div_ceil(page_size.max(1)).max(1)
}

/// Slice out 1-based `page`. Pages past the end are clamped to the last one.
pub fn paginate<T: Clone>(rows: &[T], page: usize, page_size: usize) -> (Vec<T>, usize) {
    let size = page_size.max(1);
    let page = page.clamp(1, page_count(rows.len(), size));
    let start = (page - 1) * size;
    let end = (start + size).min(rows.len());
    (rows[start..end].to_vec(), page)
}

/// Apply `query` to `events` and return the requested page.
pub fn query_leads<Tz>(events: &[Event], tz: &Tz, query: &TableQuery) -> TablePage
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut rows: Vec<LeadRow> = events.iter().map(|e| lead_row(e, tz)).collect();
    let total = rows.len();

    if let Some(needle) = query.search.as_deref().map(fold_text) {
        let needle = needle.trim().to_string();
        if !needle.is_empty() {
            rows.retain(|row| matches_search(row, &needle));
        }
    }

    if let Some((column, direction)) = query.sort {
        rows.sort_by(|a, b| {
            let ord = compare_rows(a, b, column);
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
    }

    let matched = rows.len();
    let (page_rows, page) = paginate(&rows, query.page, query.page_size);

    TablePage {
        rows: page_rows.into_iter().map(|r| r.cells).collect(),
        page,
        total_pages: page_count(matched, query.page_size),
        matched,
        total,
    }
}

/// Sort events newest first; undated events go last.
pub fn newest_first(mut events: Vec<Event>) -> Vec<Event> {
    events.sort_by(|a, b| match (a.timestamp(), b.timestamp()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    events
}

/// Every event of one client and subject, newest first.
pub fn detail_table<Tz>(events: Vec<Event>, tz: &Tz, icodcli: &str, asunto: &str) -> ReportTable
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut table = ReportTable::new(
        format!("Eventos de {} / {}", icodcli, asunto),
        columns(&LEAD_COLUMNS),
    );
    table.rows = newest_first(events)
        .iter()
        .map(|e| {
            lead_row(e, tz)
                .cells
                .into_iter()
                .map(Cell::from)
                .collect()
        })
        .collect();
    table
}

/// Templates sorted by send date, most recent first.
pub fn templates_table<Tz: TimeZone>(mut templates: Vec<Plantilla>, tz: &Tz) -> ReportTable {
    let start = |p: &Plantilla| p.start_date.as_deref().and_then(parse_timestamp);
    templates.sort_by(|a, b| match (start(a), start(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let mut table = ReportTable::new("Plantillas", columns(&TEMPLATE_COLUMNS));
    table.rows = templates
        .iter()
        .map(|p| {
            let sent = p
                .start_date
                .as_deref()
                .and_then(|raw| send_day(raw, tz))
                .map(|day| day.format("%d/%m/%Y").to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());
            let name = if p.template_name.trim().is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                p.template_name.clone()
            };
            vec![
                Cell::Text(sent),
                Cell::Text(name),
                Cell::Count(p.click_count as usize),
            ]
        })
        .collect();
    table
}

/// Calendar day of a template send date.
///
/// A bare `YYYY-MM-DD` is already a calendar day and is kept as is; full
/// timestamps are converted to `tz` first.
fn send_day<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<NaiveDate> {
    if let Ok(day) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        return Some(day);
    }
    parse_timestamp(raw).map(|ts| ts.with_timezone(tz).date_naive())
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::parse_events_body;
    use chrono::FixedOffset;

    fn fixture() -> Vec<Event> {
        parse_events_body(include_str!("../fixtures/events.json")).unwrap()
    }

    fn event(id: &str, created_at: &str, colectivo: &str) -> Event {
        Event {
            id: id.to_string(),
            created_at: Some(created_at.to_string()),
            colectivo: Some(colectivo.to_string()),
            ..Event::default()
        }
    }

    #[test]
    fn test_lead_row_fills_missing_values() {
        let e = Event {
            created_at: Some("2024-10-21T09:05:00Z".to_string()),
            email: Some("ana@empresa.es".to_string()),
            fuente: Some("  ".to_string()),
            status: Some("resuelto".to_string()),
            ..Event::default()
        };
        let row = lead_row(&e, &Utc);
        assert_eq!(row.cells[0], "21/10/24 09:05");
        assert_eq!(row.cells[1], "ana@empresa.es");
        assert_eq!(row.cells[2], NOT_AVAILABLE);
        assert_eq!(row.cells[5], NOT_AVAILABLE);
        assert_eq!(row.cells[7], "Gestionado");
        assert_eq!(row.cells.len(), LEAD_COLUMNS.len());

        let undated = lead_row(&Event::default(), &Utc);
        assert_eq!(undated.cells[0], NOT_AVAILABLE);
    }

    #[test]
    fn test_fold_text() {
        assert_eq!(fold_text("Clínicas"), "clinicas");
        assert_eq!(fold_text("ODONTÓLOGOS"), "odontologos");
        assert_eq!(fold_text("Añoranza"), "anoranza");
    }

    #[test]
    fn test_search_is_accent_and_case_insensitive() {
        let events = vec![
            event("1", "2024-10-21T09:00:00Z", "Clínicas"),
            event("2", "2024-10-21T10:00:00Z", "abogados"),
        ];
        let query = TableQuery {
            search: Some("CLINICA".to_string()),
            ..TableQuery::default()
        };
        let page = query_leads(&events, &Utc, &query);
        assert_eq!(page.matched, 1);
        assert_eq!(page.total, 2);
        assert_eq!(page.rows[0][3], "Clínicas");
    }

    #[test]
    fn test_sort_by_date_uses_timestamps() {
        let events = vec![
            event("1", "2024-10-21T09:00:00Z", "b"),
            event("2", "", "a"),
            event("3", "2024-10-19T23:00:00Z", "c"),
        ];
        let query = TableQuery {
            sort: Some((SortColumn::Date, SortDirection::Ascending)),
            ..TableQuery::default()
        };
        let page = query_leads(&events, &Utc, &query);
        let cols: Vec<&str> = page.rows.iter().map(|r| r[3].as_str()).collect();
        assert_eq!(cols, vec!["c", "b", "a"]);

        let query = TableQuery {
            sort: Some((SortColumn::Collective, SortDirection::Descending)),
            ..TableQuery::default()
        };
        let page = query_leads(&events, &Utc, &query);
        let cols: Vec<&str> = page.rows.iter().map(|r| r[3].as_str()).collect();
        assert_eq!(cols, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_paginate() {
        let rows: Vec<usize> = (0..120).collect();
        let (first, page) = paginate(&rows, 1, 50);
        assert_eq!(page, 1);
        assert_eq!(first.len(), 50);

        let (last, page) = paginate(&rows, 3, 50);
        assert_eq!(page, 3);
        assert_eq!(last, (100..120).collect::<Vec<_>>());

        let (clamped, page) = paginate(&rows, 9, 50);
        assert_eq!(page, 3);
        assert_eq!(clamped.len(), 20);

        let empty: Vec<usize> = Vec::new();
        let (none, page) = paginate(&empty, 1, 50);
        assert!(none.is_empty());
        assert_eq!(page, 1);
        assert_eq!(page_count(0, 50), 1);
        assert_eq!(page_count(120, 50), 3);
    }

    #[test]
    fn test_fixture_page_to_table() {
        let events = fixture();
        let query = TableQuery {
            page_size: 4,
            page: 2,
            ..TableQuery::default()
        };
        let page = query_leads(&events, &Utc, &query);
        assert_eq!(page.total_pages, page_count(events.len(), 4));
        assert_eq!(page.rows.len(), 4);

        let table = page.to_table("Leads pendientes");
        assert_eq!(table.columns.len(), 8);
        assert_eq!(table.rows.len(), 4);
        assert!(table.totals.is_none());
    }

    #[test]
    fn test_detail_is_newest_first() {
        let events = vec![
            event("old", "2024-10-19T08:00:00Z", "a"),
            event("undated", "???", "b"),
            event("new", "2024-10-21T08:00:00Z", "c"),
        ];
        let ordered: Vec<String> = newest_first(events.clone())
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ordered, vec!["new", "old", "undated"]);

        let table = detail_table(events, &Utc, "C1", "Visto");
        assert_eq!(table.rows[0][3], Cell::from("c"));
    }

    #[test]
    fn test_templates_sorted_by_start_date() {
        let plantilla = |name: &str, start: Option<&str>, clicks: u64| Plantilla {
            template_name: name.to_string(),
            start_date: start.map(String::from),
            click_count: clicks,
            ..Plantilla::default()
        };
        let templates = vec![
            plantilla("Septiembre", Some("2024-09-01T00:00:00Z"), 12),
            plantilla("Sin fecha", None, 0),
            plantilla("Octubre", Some("2024-10-01"), 37),
        ];

        let table = templates_table(templates, &Utc);
        assert_eq!(table.columns, columns(&TEMPLATE_COLUMNS));
        assert_eq!(
            table.rows[0],
            vec![
                Cell::from("01/10/2024"),
                Cell::from("Octubre"),
                Cell::Count(37)
            ]
        );
        assert_eq!(table.rows[1][1], Cell::from("Septiembre"));
        assert_eq!(table.rows[2][0], Cell::from(NOT_AVAILABLE));
    }

    #[test]
    fn test_template_date_only_keeps_its_day_west_of_utc() {
        let new_york = FixedOffset::west_opt(5 * 3600).unwrap();
        let templates = vec![
            Plantilla {
                template_name: "Octubre".to_string(),
                start_date: Some("2024-10-01".to_string()),
                ..Plantilla::default()
            },
            Plantilla {
                template_name: "Septiembre".to_string(),
                start_date: Some("2024-09-01T02:00:00Z".to_string()),
                ..Plantilla::default()
            },
        ];

        let table = templates_table(templates, &new_york);
        assert_eq!(table.rows[0][0], Cell::from("01/10/2024"));
        // A full timestamp still shifts into the local day.
        assert_eq!(table.rows[1][0], Cell::from("31/08/2024"));
    }
}
