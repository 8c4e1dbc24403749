pub mod report;

use crate::analyzer::report::{LeadReport, SavedReport};
use crate::store::LeadStore;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;

pub fn current_report(store: &dyn LeadStore) -> Result<LeadReport> {
    let leads = store.list_all().context("Failed to load leads")?;
    let now = Utc::now();

    Ok(report::build_report(&leads, now.date_naive(), now))
}

pub fn generate_and_store_report(
    store: &dyn LeadStore,
    report_dir: &Path,
) -> Result<(LeadReport, SavedReport)> {
    let report = current_report(store)?;
    let saved = report::save_report_files(&report, report_dir)?;

    Ok((report, saved))
}
