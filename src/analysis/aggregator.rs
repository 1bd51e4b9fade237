//! Event aggregation into report tables.
//!
//! This module ties the grouper and the row materializer together. It is
//! a pure function of its input: every call recomputes all tables from
//! scratch and owns no state between calls.

use crate::analysis::grouper::{
    count_undated, filter_by_date_range, group_by_day, group_by_hour_of_today,
};
use crate::analysis::materialize::{
    collective_table, hourly_table, source_table, tally_table, ReportTable,
};
use crate::analysis::normalize::{normalize_collective, source_label};
use crate::analysis::tally::Tally;
use crate::models::{Event, Report, ReportMetadata, ReportScope};
use chrono::{NaiveDate, TimeZone, Utc};

/// The three report views built from one event list.
#[derive(Debug, Clone, PartialEq)]
pub struct Reports {
    /// Day × collective.
    pub by_collective: ReportTable,
    /// Day × source.
    pub by_source: ReportTable,
    /// Hour of `today` × collective, with a totals row.
    pub hourly: ReportTable,
}

impl Reports {
    pub fn into_tables(self) -> Vec<ReportTable> {
        vec![self.by_collective, self.by_source, self.hourly]
    }
}

/// Aggregate `events` into the collective, source and hourly tables.
pub fn aggregate<Tz: TimeZone>(events: &[Event], tz: &Tz, today: NaiveDate) -> Reports {
    let days = group_by_day(events, tz);
    let hours = group_by_hour_of_today(events, tz, today);

    Reports {
        by_collective: collective_table(&days),
        by_source: source_table(&days),
        hourly: hourly_table(&hours),
    }
}

/// Options for [`build_report`].
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub scope: ReportScope,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Filter, aggregate and wrap `events` in a [`Report`] with metadata.
pub fn build_report<Tz: TimeZone>(
    events: &[Event],
    options: ReportOptions,
    tz: &Tz,
    today: NaiveDate,
) -> Report {
    let included = filter_by_date_range(events, options.from, options.to, tz);
    let reports = aggregate(&included, tz, today);

    let date_range = match (options.from, options.to) {
        (Some(from), Some(to)) => Some((from, to)),
        _ => None,
    };

    Report {
        metadata: ReportMetadata {
            generated_at: Utc::now(),
            scope: options.scope,
            events_fetched: events.len(),
            events_included: included.len(),
            events_undated: count_undated(&included),
            date_range,
        },
        summaries: vec![
            tally_table(
                "Resumen por colectivo",
                "Colectivo",
                &totals_by_collective(&included),
            ),
            tally_table("Resumen por fuente", "Fuente", &totals_by_source(&included)),
        ],
        tables: reports.into_tables(),
    }
}

/// Overall counts per normalized collective, regardless of date.
pub fn totals_by_collective(events: &[Event]) -> Tally {
    let mut tally = Tally::new();
    for event in events {
        tally.increment(&normalize_collective(event.colectivo.as_deref()));
    }
    tally
}

/// Overall counts per source, regardless of date.
pub fn totals_by_source(events: &[Event]) -> Tally {
    let mut tally = Tally::new();
    for event in events {
        tally.increment(&source_label(event.fuente.as_deref()));
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::materialize::Cell;
    use chrono::FixedOffset;

    const FIXTURE: &str = include_str!("../../fixtures/events.json");

    fn fixture_events() -> Vec<Event> {
        crate::api::parse_events_body(FIXTURE).unwrap()
    }

    fn event(colectivo: Option<&str>, created_at: &str) -> Event {
        Event {
            id: format!("{}-{}", colectivo.unwrap_or("none"), created_at),
            created_at: Some(created_at.to_string()),
            colectivo: colectivo.map(String::from),
            fuente: Some("mail.video".to_string()),
            ..Event::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 21).unwrap()
    }

    #[test]
    fn test_synonym_variants_share_one_column() {
        let events = vec![
            event(Some("asesorias"), "2024-10-21T09:00:00Z"),
            event(Some("Asesorías"), "2024-10-21T09:30:00Z"),
        ];

        let reports = aggregate(&events, &Utc, today());
        assert_eq!(
            reports.by_collective.columns,
            vec!["Fecha", "Asesorías", "TOTAL"]
        );
        assert_eq!(reports.by_collective.rows[0][1], Cell::Count(2));

        assert_eq!(reports.hourly.columns, vec!["Hora", "Asesorías", "TOTAL"]);
        assert_eq!(reports.hourly.rows.len(), 1);
        assert_eq!(reports.hourly.rows[0][2], Cell::Count(2));
    }

    #[test]
    fn test_null_collective_counted_once_as_unknown() {
        let events = vec![
            event(None, "2024-10-21T09:00:00Z"),
            event(Some("abogados"), "2024-10-21T10:00:00Z"),
        ];

        let reports = aggregate(&events, &Utc, today());
        let table = &reports.by_collective;
        let unknown = table.columns.iter().position(|c| c == "Desconocido").unwrap();
        assert_eq!(table.rows[0][unknown], Cell::Count(1));
        assert_eq!(table.grand_total(), 2);
    }

    #[test]
    fn test_totals_match_dated_events() {
        let events = fixture_events();
        let undated = count_undated(&events);
        assert!(undated > 0, "fixture should include an undated event");

        let reports = aggregate(&events, &Utc, today());
        assert_eq!(reports.by_collective.grand_total(), events.len() - undated);
        assert_eq!(reports.by_source.grand_total(), events.len() - undated);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let events = fixture_events();
        let first = aggregate(&events, &Utc, today());
        let second = aggregate(&events, &Utc, today());
        assert_eq!(first, second);
    }

    #[test]
    fn test_hourly_uses_only_today() {
        let events = fixture_events();
        let reports = aggregate(&events, &Utc, today());
        let todays = events
            .iter()
            .filter_map(|e| e.timestamp())
            .filter(|ts| ts.date_naive() == today())
            .count();

        let totals = reports.hourly.totals.as_ref().unwrap();
        assert_eq!(totals.last(), Some(&Cell::Count(todays)));
        assert_eq!(reports.hourly.grand_total(), todays);
    }

    #[test]
    fn test_build_report_with_range_and_timezone() {
        let events = fixture_events();
        let madrid = FixedOffset::east_opt(2 * 3600).unwrap();
        let from = NaiveDate::from_ymd_opt(2024, 10, 20).unwrap();

        let report = build_report(
            &events,
            ReportOptions {
                scope: ReportScope::All,
                from: Some(from),
                to: Some(today()),
            },
            &madrid,
            today(),
        );

        assert_eq!(report.metadata.events_fetched, events.len());
        assert!(report.metadata.events_included < events.len());
        assert_eq!(report.metadata.events_undated, 0);
        assert_eq!(report.metadata.date_range, Some((from, today())));
        assert_eq!(report.tables.len(), 3);
        assert_eq!(report.summaries.len(), 2);
        assert_eq!(
            report.summaries[0].totals.as_ref().map(|t| t[1].count()),
            Some(report.metadata.events_included)
        );
        assert_eq!(
            report.tables[0].grand_total(),
            report.metadata.events_included
        );
    }

    #[test]
    fn test_overall_totals() {
        let events = fixture_events();
        let collectives = totals_by_collective(&events);
        let sources = totals_by_source(&events);
        assert_eq!(collectives.total(), events.len());
        assert_eq!(sources.total(), events.len());
        assert!(collectives.get("Desconocido") > 0);
    }
}
