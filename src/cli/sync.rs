use super::ui;
use crate::core::history::HistoryProvider;
use crate::core::instrument::Instrument;
use crate::core::store::PriceStore;
use crate::core::window::{Period, ReturnWindow};
use crate::sync::{SyncReport, sync_instruments};
use anyhow::{Result, bail};
use chrono::Utc;
use comfy_table::Cell;
use std::sync::Arc;

pub async fn run(
    instruments: &[Instrument],
    providers: &[Arc<dyn HistoryProvider>],
    store: &dyn PriceStore,
    period: Period,
) -> Result<()> {
    let window = ReturnWindow::from_period(period, Utc::now());

    let pb = ui::new_progress_bar(instruments.len() as u64, true);
    pb.set_message(format!("Syncing {period} of history"));
    let reports = sync_instruments(instruments, providers, store, window, &|id| {
        pb.set_message(format!("Synced {id}"));
        pb.inc(1);
    })
    .await;
    pb.finish_and_clear();

    println!("{}", render(&reports));

    if !reports.is_empty() && reports.iter().all(|r| r.error.is_some()) {
        bail!("Sync failed for every instrument");
    }
    Ok(())
}

pub fn render(reports: &[SyncReport]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Instrument"),
        ui::header_cell("Fetched"),
        ui::header_cell("New"),
        ui::header_cell("Status"),
    ]);

    for report in reports {
        let status = match &report.error {
            Some(e) => Cell::new(ui::style_text(e, ui::StyleType::Error)),
            None => Cell::new("ok"),
        };
        table.add_row(vec![
            Cell::new(&report.id),
            ui::number_cell(report.fetched.to_string()),
            ui::number_cell(report.inserted.to_string()),
            status,
        ]);
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_each_instrument() {
        let reports = vec![
            SyncReport {
                id: "BOVA11".to_string(),
                fetched: 250,
                inserted: 12,
                error: None,
            },
            SyncReport {
                id: "CDI".to_string(),
                fetched: 0,
                inserted: 0,
                error: Some("HTTP error: 503 Service Unavailable for SGS series: 12".to_string()),
            },
        ];
        let output = render(&reports);
        assert!(output.contains("BOVA11"));
        assert!(output.contains("250"));
        assert!(output.contains("503 Service Unavailable"));
    }
}
