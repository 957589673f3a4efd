use super::{QueryArgs, ui};
use crate::core::instrument::PORTFOLIO_ID;
use crate::service::{BenchmarkService, ChartReport};
use anyhow::Result;
use chrono::Utc;
use comfy_table::Cell;
use tracing::info;

pub async fn run(service: &BenchmarkService, args: &QueryArgs) -> Result<()> {
    let window = args.window(Utc::now())?;
    let ids = args.ids(service.all_ids());
    info!("Aligning series for {} instruments...", ids.len());

    let report = service.chart(&ids, window, !args.no_portfolio).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render(&report));
    }
    Ok(())
}

/// Column order: instruments in first-seen order, portfolio last.
fn columns(report: &ChartReport) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for point in &report.points {
        for id in point.values.keys() {
            if id != PORTFOLIO_ID && !columns.contains(id) {
                columns.push(id.clone());
            }
        }
    }
    if report
        .points
        .iter()
        .any(|p| p.values.contains_key(PORTFOLIO_ID))
    {
        columns.push(PORTFOLIO_ID.to_string());
    }
    columns
}

/// Renders the aligned series as one row per date, then the axis range.
pub fn render(report: &ChartReport) -> String {
    if report.points.is_empty() {
        return ui::style_text("No aligned data in the requested window", ui::StyleType::Error);
    }

    let columns = columns(report);
    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("Date")];
    header.extend(columns.iter().map(|c| ui::header_cell(c)));
    table.set_header(header);

    for point in &report.points {
        let mut row = vec![Cell::new(point.timestamp.format("%Y-%m-%d"))];
        row.extend(
            columns
                .iter()
                .map(|c| ui::optional_return_cell(point.values.get(c).copied())),
        );
        table.add_row(row);
    }

    let ticks: Vec<String> = report.axis.ticks.iter().map(|t| format!("{t:.0}")).collect();
    let mut output = format!(
        "{table}\n{} {:.0}% to {:.0}% (ticks: {})",
        ui::style_text("Axis:", ui::StyleType::TotalLabel),
        report.axis.min,
        report.axis.max,
        ticks.join(", ")
    );
    for (id, reason) in &report.failures {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(&format!("{id}: {reason}"), ui::StyleType::Subtle)
        ));
    }
    output
}
