use crate::agents::update::PlanOptions;
use crate::agents::update::planner::PatchPlan;
use crate::agents::{MasterUpdater, PackageScannerAgent, PatchReport};
use crate::catalog::CatalogFactory;
use crate::cli::CatalogArgs;
use crate::config::{ConfigLoader, Settings};
use crate::error::{PatchError, Result};
use crate::utils::pattern::PatternMatcher;
use colored::Colorize;
use std::path::Path;

/// Execute the update workflow
pub fn execute_update(
    package_path: &Path,
    args: &CatalogArgs,
    interactive: bool,
    no_backup: bool,
) -> Result<()> {
    println!("{}", "Starting master retrofit...".cyan().bold());

    // Step 1: Validate package structure
    println!("\n{}", "1. Validating package structure...".yellow());
    let info = PackageScannerAgent::new(package_path).validate()?;
    println!("{}", format!("✓ Valid {} package", info.kind).green());

    // Step 2: Resolve configuration and catalog
    println!("\n{}", "2. Reading configuration...".yellow());
    let settings = resolve_settings(&info.package_path, args, no_backup)?;
    let catalog = CatalogFactory::create(&settings)?;
    println!("   Catalog: {}", catalog.describe().bright_cyan());
    println!("   Minimum status: {}", settings.min_status.to_string().bright_cyan());

    // Step 3: Plan and patch
    println!("\n{}", "3. Patching masters...".yellow());
    let updater = MasterUpdater::new(catalog);
    let options = plan_options(&settings)?;
    let report = match updater.update(&info.package_path, &options, interactive, settings.backup) {
        Ok(report) => report,
        Err(PatchError::UserCancelled) => {
            println!("\n{}", "Update cancelled by user. Package left untouched.".yellow());
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    println!("{}", "✓ Patch run completed".green());

    // Step 4: Display summary
    print_patch_report(&report);

    if report.is_empty() {
        println!("\n{}", "No masters were patched".yellow());
        return Ok(());
    }

    if report.is_partial() {
        println!(
            "\n{}",
            "⚠ Some masters could not be patched; see the skipped list above".red()
        );
    }

    println!(
        "\n{}",
        "✨ Package retrofitted successfully!".green().bold()
    );
    Ok(())
}

/// Execute the check workflow (dry-run)
pub fn execute_check(package_path: &Path, args: &CatalogArgs) -> Result<()> {
    println!("{}", "Checking for newer master snapshots...".cyan().bold());

    // Step 1: Validate package structure
    println!("\n{}", "1. Validating package structure...".yellow());
    let info = PackageScannerAgent::new(package_path).validate()?;
    println!("{}", format!("✓ Valid {} package", info.kind).green());

    // Step 2: Resolve configuration and catalog
    println!("\n{}", "2. Reading configuration...".yellow());
    let settings = resolve_settings(&info.package_path, args, false)?;
    let catalog = CatalogFactory::create(&settings)?;
    println!("   Catalog: {}", catalog.describe().bright_cyan());

    // Step 3: Plan without modifying the package
    println!("\n{}", "3. Checking for available updates...".yellow());
    let updater = MasterUpdater::new(catalog);
    let plan = updater.check(&info.package_path, &plan_options(&settings)?)?;
    println!("{}", "✓ Check completed".green());

    // Step 4: Display available updates
    print_available_updates(&plan);

    Ok(())
}

/// Execute the list workflow - display all masters
pub fn execute_list(package_path: &Path) -> Result<()> {
    println!("{}", "Listing masters in package...".cyan().bold());

    // Step 1: Validate package structure
    println!("\n{}", "1. Validating package structure...".yellow());
    let info = PackageScannerAgent::new(package_path).validate()?;
    println!("{}", format!("✓ Valid {} package", info.kind).green());

    // Step 2: Display masters
    println!("\n{}", "2. Reading masters...".yellow());
    if info.references.is_empty() {
        println!("{}", "   No masters found".dimmed());
    } else {
        println!("\n{}:", "Masters".cyan().bold());
        for reference in &info.references {
            println!(
                "  • {} {} {} {}",
                format!("[{}]", reference.local_id).dimmed(),
                reference.name.white().bold(),
                reference.template_id.as_str().bright_cyan(),
                format!("@ {}", reference.revision_id).dimmed()
            );
        }
    }

    println!(
        "\n{}",
        format!(
            "{} master(s) across {} page(s)",
            info.references.len(),
            info.page_count
        )
        .green()
    );
    Ok(())
}

fn resolve_settings(package_path: &Path, args: &CatalogArgs, no_backup: bool) -> Result<Settings> {
    let file = ConfigLoader::discover(package_path, args.config.as_deref())?;
    Settings::resolve(&file, &args.overrides(no_backup))
}

fn plan_options(settings: &Settings) -> Result<PlanOptions> {
    Ok(PlanOptions {
        min_status: settings.min_status,
        templates: settings.templates.clone(),
        filter: settings
            .filter
            .as_deref()
            .map(PatternMatcher::new)
            .transpose()?,
    })
}

fn print_available_updates(plan: &PatchPlan) {
    if !plan.skipped.is_empty() {
        println!("\n{}:", "Not updated".cyan().bold());
        for skipped in &plan.skipped {
            println!(
                "  • {} {}",
                skipped.name.white().bold(),
                format!("({})", skipped.reason).dimmed()
            );
        }
    }

    if plan.is_empty() {
        println!("\n{}", "✨ All masters are up to date!".green().bold());
        return;
    }

    println!("\n{}", "Available Updates:".cyan().bold());
    println!(
        "{}",
        format!("Found {} update(s)", plan.entries.len()).yellow()
    );
    for entry in &plan.entries {
        println!(
            "  • {} {} → {} ({}, #{})",
            entry.display_name().white().bold(),
            entry.old_revision().as_str().red(),
            entry.snapshot.revision_id.as_str().green().bold(),
            entry.snapshot.status,
            entry.snapshot.sequence
        );
    }

    println!("\n{}", "To apply these updates, run:".dimmed());
    println!("  {}", "masterpatch update <PACKAGE>".cyan());
}

fn print_patch_report(report: &PatchReport) {
    if !report.patched.is_empty() {
        println!("\n{}:", "Patched masters".cyan().bold());
        for change in &report.patched {
            println!(
                "  • {} {} {} {} → {}",
                change.name.white().bold(),
                format!("[{}]", change.local_id).dimmed(),
                change.template_id.as_str().bright_cyan(),
                change.old_revision.as_str().red(),
                change.new_revision.as_str().green().bold()
            );
        }
        println!(
            "   {} page(s), {} instance(s) reconciled, {} component stub(s) created",
            report.pages.pages_touched, report.pages.instances_updated, report.pages.stubs_created
        );
    }

    if !report.skipped.is_empty() {
        println!("\n{}:", "Skipped".cyan().bold());
        for skipped in &report.skipped {
            let reason = skipped.reason.to_string();
            let reason = if skipped.reason.is_failure() {
                reason.red()
            } else {
                reason.dimmed()
            };
            println!(
                "  • {} {} ({})",
                skipped.name.white().bold(),
                skipped.template_id.as_str().dimmed(),
                reason
            );
        }
    }

    if report.recalc_flagged {
        println!("{}", "✓ Package flagged for recalculation on next open".green());
    }
    if let Some(backup) = &report.backup {
        println!(
            "{}",
            format!("✓ Original saved as {}", backup.display()).green()
        );
    }
}
