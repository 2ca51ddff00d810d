use crate::infra::Services;
use clap::Args;
use protest_desk::config::{AppConfig, StoreBackend};
use protest_desk::error::AppError;
use protest_desk::telemetry;
use protest_desk::workflows::intake::ImportSummary;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct IntakeImportArgs {
    /// CSV export with one intake form per row
    #[arg(long)]
    pub(crate) csv: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct CustomerDeleteArgs {
    /// Profile id of the customer to remove
    pub(crate) user_id: String,
    /// Name used in the deletion summary (defaults to the profile's name)
    #[arg(long)]
    pub(crate) display_name: Option<String>,
}

fn load_services() -> Result<(AppConfig, Services), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    if config.store.backend == StoreBackend::Memory {
        tracing::warn!("APP_STORE=memory: changes are discarded when the command exits");
    }
    let services = Services::build(&config)?;
    Ok((config, services))
}

pub(crate) fn run_intake_import(args: IntakeImportArgs) -> Result<(), AppError> {
    let (_, services) = load_services()?;
    let summary = services.intake.import_path(&args.csv)?;
    render_import_summary(&summary);
    Ok(())
}

pub(crate) fn render_import_summary(summary: &ImportSummary) {
    println!(
        "Imported {} of {} rows ({} rejected, {} failed)",
        summary.accepted.len(),
        summary.total(),
        summary.rejected.len(),
        summary.failed.len()
    );
    for receipt in &summary.accepted {
        println!(
            "  + profile {} property {} protest {}",
            receipt.profile_id, receipt.property_id, receipt.protest_id
        );
    }
    for issue in summary.rejected.iter().chain(&summary.failed) {
        println!(
            "  - row {} [{}] {}: {}",
            issue.row,
            issue.code,
            issue.email.as_deref().unwrap_or("-"),
            issue.message
        );
    }
}

pub(crate) fn run_customer_delete(args: CustomerDeleteArgs) -> Result<(), AppError> {
    let (_, services) = load_services()?;
    let report = services
        .deletion
        .delete_customer(&args.user_id, args.display_name.as_deref())?;

    println!("{}", report.summary());
    for count in &report.counts {
        println!("  {:<24} {}", count.table.to_string(), count.deleted);
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    Ok(())
}
