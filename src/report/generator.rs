//! Report and table rendering.
//!
//! This module renders aggregate reports and single tables as Markdown,
//! JSON or CSV.

use crate::analysis::{Cell, ReportTable};
use crate::cli::OutputFormat;
use crate::models::{Report, ReportMetadata};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# Informe de leads\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));

    if !report.summaries.is_empty() {
        output.push_str("## Resumen\n\n");
        for table in &report.summaries {
            output.push_str(&format!("### {}\n\n", table.title));
            output.push_str(&render_markdown_table(table));
            output.push('\n');
        }
    }

    for table in &report.tables {
        output.push_str(&format!("## {}\n\n", table.title));
        output.push_str(&render_markdown_table(table));
        output.push('\n');
    }

    output.push_str(&generate_footer());
    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generado:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Estado:** {}\n", metadata.scope));
    if let Some((from, to)) = metadata.date_range {
        section.push_str(&format!(
            "- **Rango:** {} a {}\n",
            from.format("%d/%m/%Y"),
            to.format("%d/%m/%Y")
        ));
    }
    section.push_str(&format!(
        "- **Eventos recibidos:** {}\n",
        metadata.events_fetched
    ));
    section.push_str(&format!(
        "- **Eventos incluidos:** {}\n",
        metadata.events_included
    ));
    if metadata.events_undated > 0 {
        section.push_str(&format!(
            "- **Eventos sin fecha válida:** {}\n",
            metadata.events_undated
        ));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    "---\n\n*Generado por leadboard*\n".to_string()
}

fn escape_markdown(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// Render one table as a Markdown pipe table.
///
/// The totals row, when present, is rendered in bold after the body.
pub fn render_markdown_table(table: &ReportTable) -> String {
    let mut out = String::new();

    let header: Vec<String> = table.columns.iter().map(|c| escape_markdown(c)).collect();
    out.push_str(&format!("| {} |\n", header.join(" | ")));

    // Counts are right-aligned.
    let first = table.rows.first().or(table.totals.as_ref());
    let align: Vec<&str> = (0..table.columns.len())
        .map(|i| match first.and_then(|row| row.get(i)) {
            Some(Cell::Count(_)) => "---:",
            _ => ":---",
        })
        .collect();
    out.push_str(&format!("|{}|\n", align.join("|")));

    if table.rows.is_empty() && table.totals.is_none() {
        let blank = vec![""; table.columns.len().saturating_sub(1)];
        let mut cells = vec!["*Sin datos*"];
        cells.extend(blank);
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    for row in &table.rows {
        let cells: Vec<String> = row.iter().map(|c| escape_markdown(&c.to_string())).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    if let Some(totals) = &table.totals {
        let cells: Vec<String> = totals
            .iter()
            .map(|c| format!("**{}**", escape_markdown(&c.to_string())))
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    out
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Render one table as JSON `{ title, columns, rows, totals? }`.
pub fn render_json_table(table: &ReportTable) -> Result<String> {
    serde_json::to_string_pretty(table).map_err(Into::into)
}

/// Render one table as CSV, totals row last.
pub fn render_csv_table(table: &ReportTable) -> Result<String> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    write_csv_table(&mut writer, table)?;
    csv_into_string(writer)
}

/// Generate a CSV report: each table preceded by its title line.
pub fn generate_csv_report(report: &Report) -> Result<String> {
    // Tables differ in width, so records are allowed to vary in length.
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    let tables = report.summaries.iter().chain(report.tables.iter());
    for (i, table) in tables.enumerate() {
        if i > 0 {
            writer.write_record([""])?;
        }
        writer.write_record([table.title.as_str()])?;
        write_csv_table(&mut writer, table)?;
    }

    csv_into_string(writer)
}

fn write_csv_table<W: Write>(writer: &mut csv::Writer<W>, table: &ReportTable) -> Result<()> {
    writer.write_record(&table.columns)?;
    for row in table.rows.iter().chain(table.totals.iter()) {
        writer.write_record(row.iter().map(|c| c.to_string()))?;
    }
    Ok(())
}

fn csv_into_string(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Render a full report in `format`.
pub fn render_report(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(generate_markdown_report(report)),
        OutputFormat::Json => generate_json_report(report),
        OutputFormat::Csv => generate_csv_report(report),
    }
}

/// Render a single table in `format`.
pub fn render_table(table: &ReportTable, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(format!(
            "## {}\n\n{}",
            table.title,
            render_markdown_table(table)
        )),
        OutputFormat::Json => render_json_table(table),
        OutputFormat::Csv => render_csv_table(table),
    }
}

/// Write `content` to `path`, or to stdout when no path is given.
pub fn write_output(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            file.write_all(content.as_bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                handle.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportScope;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn sample_table() -> ReportTable {
        let mut table = ReportTable::new(
            "Tabla por Colectivo",
            vec![
                "Fecha".to_string(),
                "Asesorías".to_string(),
                "EESS".to_string(),
                "TOTAL".to_string(),
            ],
        );
        table.rows = vec![
            vec![
                Cell::from("sáb, 19/10/2024"),
                Cell::Count(2),
                Cell::Count(0),
                Cell::Count(2),
            ],
            vec![
                Cell::from("dom, 20/10/2024"),
                Cell::Count(1),
                Cell::Count(1),
                Cell::Count(2),
            ],
        ];
        table
    }

    fn hourly_table() -> ReportTable {
        let mut table = ReportTable::new(
            "Leads de hoy por hora",
            vec!["Hora".to_string(), "TOTAL".to_string()],
        );
        table.totals = Some(vec![Cell::from("Total"), Cell::Count(0)]);
        table
    }

    fn summary_table() -> ReportTable {
        let mut table = ReportTable::new(
            "Resumen por colectivo",
            vec!["Colectivo".to_string(), "Leads".to_string()],
        );
        table.rows = vec![vec![Cell::from("Asesorías"), Cell::Count(3)]];
        table.totals = Some(vec![Cell::from("Total"), Cell::Count(3)]);
        table
    }

    fn create_test_report() -> Report {
        Report {
            metadata: ReportMetadata {
                generated_at: Utc.with_ymd_and_hms(2024, 10, 21, 12, 0, 0).unwrap(),
                scope: ReportScope::All,
                events_fetched: 10,
                events_included: 4,
                events_undated: 1,
                date_range: Some((
                    NaiveDate::from_ymd_opt(2024, 10, 19).unwrap(),
                    NaiveDate::from_ymd_opt(2024, 10, 20).unwrap(),
                )),
            },
            summaries: vec![summary_table()],
            tables: vec![sample_table(), hourly_table()],
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&create_test_report());

        assert!(markdown.contains("# Informe de leads"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("- **Estado:** totales"));
        assert!(markdown.contains("- **Rango:** 19/10/2024 a 20/10/2024"));
        assert!(markdown.contains("- **Eventos sin fecha válida:** 1"));
        assert!(markdown.contains("## Resumen\n\n### Resumen por colectivo"));
        assert!(markdown.contains("| Asesorías | 3 |"));
        assert!(markdown.contains("## Tabla por Colectivo"));
        assert!(markdown.contains("| sáb, 19/10/2024 | 2 | 0 | 2 |"));
        assert!(markdown.contains("| **Total** | **0** |"));
    }

    #[test]
    fn test_markdown_table_alignment_and_escaping() {
        let mut table = ReportTable::new("t", vec!["Asunto".to_string(), "N".to_string()]);
        table.rows = vec![vec![Cell::from("a|b"), Cell::Count(3)]];

        let md = render_markdown_table(&table);
        assert!(md.starts_with("| Asunto | N |\n|:---|---:|\n"));
        assert!(md.contains("| a\\|b | 3 |"));
    }

    #[test]
    fn test_markdown_empty_table() {
        let table = ReportTable::new("t", vec!["Fecha".to_string(), "TOTAL".to_string()]);
        let md = render_markdown_table(&table);
        assert!(md.contains("*Sin datos*"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["scope"], "totales");
        assert_eq!(value["summaries"][0]["totals"][1], 3);
        assert_eq!(value["tables"][0]["columns"][1], "Asesorías");
        assert_eq!(value["tables"][0]["rows"][1][2], 1);
        assert_eq!(value["tables"][1]["totals"][1], 0);
        assert!(value["tables"][0].get("totals").is_none());
    }

    #[test]
    fn test_render_csv_table() {
        let csv = render_csv_table(&hourly_table()).unwrap();
        assert_eq!(csv, "Hora,TOTAL\nTotal,0\n");

        let csv = render_csv_table(&sample_table()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Fecha,Asesorías,EESS,TOTAL");
        assert_eq!(lines[1], "\"sáb, 19/10/2024\",2,0,2");
    }

    #[test]
    fn test_generate_csv_report_sections() {
        let csv = generate_csv_report(&create_test_report()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Resumen por colectivo");
        assert_eq!(lines[1], "Colectivo,Leads");
        assert!(lines.contains(&"Tabla por Colectivo"));
        assert!(lines.contains(&"Fecha,Asesorías,EESS,TOTAL"));
        assert!(lines.contains(&"Leads de hoy por hora"));
        assert_eq!(lines.last(), Some(&"Total,0"));
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("informe.md");
        write_output("contenido", Some(path.as_path())).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "contenido");
    }
}
