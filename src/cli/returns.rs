use super::{QueryArgs, ui};
use crate::core::portfolio::PortfolioReturn;
use crate::service::{BenchmarkService, ReturnsReport};
use anyhow::Result;
use chrono::Utc;
use comfy_table::Cell;
use tracing::info;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub async fn run(service: &BenchmarkService, args: &QueryArgs) -> Result<()> {
    let window = args.window(Utc::now())?;
    let ids = args.ids(service.all_ids());
    info!("Calculating returns for {} instruments...", ids.len());

    let report = service
        .window_returns(&ids, window, !args.no_portfolio)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render(&report, &service.portfolio().name));
    }
    Ok(())
}

/// Renders the returns table followed by any portfolio warning.
pub fn render(report: &ReturnsReport, portfolio_name: &str) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Instrument"),
        ui::header_cell("Kind"),
        ui::header_cell("From"),
        ui::header_cell("To"),
        ui::header_cell("Return"),
    ]);

    let mut errors = Vec::new();
    for row in &report.instruments {
        let kind = row.kind.map_or_else(String::new, |k| k.to_string());
        let mut cells = vec![Cell::new(&row.name), Cell::new(kind)];
        match &row.outcome {
            Ok(window_return) => {
                cells.push(Cell::new(window_return.first_date.format(DATE_FORMAT)));
                cells.push(Cell::new(window_return.last_date.format(DATE_FORMAT)));
                cells.push(ui::optional_return_cell(window_return.value));
            }
            Err(e) => {
                cells.push(Cell::new(""));
                cells.push(Cell::new(""));
                cells.push(ui::na_cell(true));
                errors.push(format!("{}: {}", row.id, e));
            }
        }
        table.add_row(cells);
    }

    let mut notes = Vec::new();
    if let Some(portfolio) = &report.portfolio {
        let label = Cell::new(ui::style_text(portfolio_name, ui::StyleType::TotalLabel));
        let value = match portfolio {
            PortfolioReturn::Complete { value } => ui::total_return_cell(*value),
            PortfolioReturn::Partial { value, warning, .. } => {
                notes.push(ui::style_text(warning, ui::StyleType::Warning));
                ui::total_return_cell(*value)
            }
            PortfolioReturn::Failed { error } => {
                notes.push(ui::style_text(&error.to_string(), ui::StyleType::Error));
                ui::na_cell(true)
            }
        };
        table.add_row(vec![
            label,
            Cell::new("portfolio"),
            Cell::new(""),
            Cell::new(""),
            value,
        ]);
    }

    let mut output = format!(
        "Returns from {} to {}\n\n{table}",
        ui::style_text(&report.window.start.format(DATE_FORMAT).to_string(), ui::StyleType::Title),
        ui::style_text(&report.window.end.format(DATE_FORMAT).to_string(), ui::StyleType::Title),
    );
    for note in notes {
        output.push_str(&format!("\n{note}"));
    }
    for error in errors {
        output.push_str(&format!("\n{}", ui::style_text(&error, ui::StyleType::Subtle)));
    }
    output
}
