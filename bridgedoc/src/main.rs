//! bridgedoc - bridge inspection document generator
//!
//! A CLI tool that fills technical passport and inspection report
//! templates from a project snapshot.

#![deny(unsafe_code)]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ProfileArg};

use bridgedoc::catalog::{CsvCatalog, DefectCatalog, DefectType};
use bridgedoc::docx::DocxPackage;
use bridgedoc::export::format::Profile;
use bridgedoc::export::{self, ExportMode, ExportOptions};
use bridgedoc::project::DefectRecord;
use bridgedoc::quantity::QuantityRule;
use bridgedoc::{storage, Config, Project};

/// Main entry point for the bridgedoc CLI application
fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

/// Run the CLI application
fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Info);
    }
    logger.init();

    let config = Config::discover(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Export {
            project,
            output,
            profile,
            template,
            indexed,
        } => {
            handle_export_command(&config, project, output, profile, template, indexed)?;
        }

        Commands::CheckTemplate { template } => {
            handle_check_template_command(&template)?;
        }

        Commands::New {
            path,
            spans,
            piers,
            force,
        } => {
            handle_new_command(&path, spans, piers, force)?;
        }

        Commands::Catalog { placement, catalog } => {
            handle_catalog_command(&config, placement, catalog)?;
        }

        Commands::Quantity { project, rule } => {
            handle_quantity_command(&project, &rule)?;
        }

        Commands::SyncPhotos { project } => {
            handle_sync_photos_command(&project)?;
        }
    }

    Ok(())
}

/// Load a snapshot, resolving a relative photo folder against the snapshot's directory
fn load_snapshot(path: &Path) -> Result<Project> {
    let mut project = storage::load_project(path)
        .with_context(|| format!("Failed to load project {}", path.display()))?;
    if project.photos.folder.is_relative() {
        if let Some(base) = path.parent() {
            project.photos.folder = base.join(&project.photos.folder);
        }
    }
    Ok(project)
}

/// Handle the export command
fn handle_export_command(
    config: &Config,
    project_path: PathBuf,
    mut output: PathBuf,
    profile: ProfileArg,
    template: Option<PathBuf>,
    indexed: bool,
) -> Result<()> {
    let profile = Profile::from(profile);
    let template = template
        .or_else(|| config.template_for(profile).map(Path::to_path_buf))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No {} template. Pass --template or set '{}_template' in bridgedoc.toml",
                profile,
                profile
            )
        })?;
    if output.extension().is_none() {
        output.set_extension("docx");
    }

    let project = load_snapshot(&project_path)?;

    println!("Exporting {}...", profile);
    println!("Project: {}", project_path.display());
    println!("Template: {}", template.display());

    let options = ExportOptions {
        profile,
        mode: if indexed {
            ExportMode::Indexed
        } else {
            ExportMode::Cloned
        },
        photos: config.photos.clone(),
    };
    let summary = export::export_project(&template, &output, &project, &options)
        .with_context(|| format!("Failed to export {}", output.display()))?;

    println!("✓ {} spans, {} piers", summary.spans, summary.piers);
    println!("✓ {} rows in the defects table", summary.defect_rows);
    if summary.cover_placed || summary.gallery > 0 {
        println!(
            "✓ {} photos",
            summary.gallery + usize::from(summary.cover_placed)
        );
    }
    println!("✓ Successfully wrote: {}", output.display());

    Ok(())
}

/// Handle the check-template command
fn handle_check_template_command(template: &Path) -> Result<()> {
    let mut package = DocxPackage::open(template)
        .with_context(|| format!("Failed to open template {}", template.display()))?;
    let report = export::check_template(&mut package)
        .with_context(|| format!("Failed to read template {}", template.display()))?;

    println!("Template: {}\n", template.display());
    for (marker, index) in &report.markers {
        match index {
            Some(index) => println!("  ✓ {} (block {})", marker, index),
            None => println!("  - {} (absent)", marker),
        }
    }
    if let Some(columns) = report.defects_columns {
        println!("\nDefects table: {} columns", columns);
    }

    if report.is_ok() {
        println!("\n✓ Template is usable");
        Ok(())
    } else {
        for problem in &report.problems {
            println!("  ✗ {}", problem);
        }
        anyhow::bail!("{} problems found in {}", report.problems.len(), template.display())
    }
}

/// Handle the new command
fn handle_new_command(path: &Path, spans: usize, piers: usize, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it",
            path.display()
        );
    }

    let mut project = Project::new();
    for _ in 0..spans {
        project.add_span();
    }
    for _ in 0..piers {
        project.add_pier();
    }

    storage::save_project(path, &project)
        .with_context(|| format!("Failed to write project {}", path.display()))?;
    println!(
        "✓ Created {} with {} spans and {} piers",
        path.display(),
        spans,
        piers
    );
    Ok(())
}

/// Handle the catalog command
fn handle_catalog_command(
    config: &Config,
    placement: Option<String>,
    catalog: Option<PathBuf>,
) -> Result<()> {
    let path = catalog.or_else(|| config.catalog.clone()).ok_or_else(|| {
        anyhow::anyhow!("No defect catalog. Pass --catalog or set 'catalog' in bridgedoc.toml")
    })?;
    let catalog = CsvCatalog::load(&path)
        .with_context(|| format!("Failed to load catalog {}", path.display()))?;

    match placement {
        None => {
            println!("Placements:\n");
            for placement in catalog.placements() {
                println!("  {}", placement);
            }
        }
        Some(placement) => {
            let types = catalog.defect_types(&placement);
            if types.is_empty() {
                anyhow::bail!("No defect types for placement '{}'", placement);
            }
            println!("{}:\n", placement);
            for defect in types {
                println!("  {} - {}", defect.code, defect.display_name());
                if !defect.option.is_empty() {
                    println!("    {}", defect.option);
                }
                println!("    Categories: {}", categories(&defect));
                if !defect.unit.is_empty() {
                    println!("    Unit: {} ({})", defect.unit, defect.quantity_rule());
                }
            }
        }
    }
    Ok(())
}

/// Severity codes of a catalog entry, as the defects table shows them
fn categories(defect: &DefectType) -> String {
    DefectRecord {
        safety: defect.safety.clone(),
        durability: defect.durability.clone(),
        repairability: defect.repairability.clone(),
        loadcap: defect.loadcap.clone(),
        ..DefectRecord::default()
    }
    .categories()
}

/// Handle the quantity command
fn handle_quantity_command(project_path: &Path, rule: &str) -> Result<()> {
    let project = load_snapshot(project_path)?;
    let rule: QuantityRule = rule.parse()?;

    match rule.display(&project.bridge)? {
        Some(value) => println!("{} = {}", rule, value),
        None => println!("{}: entered manually", rule),
    }
    Ok(())
}

/// Handle the sync-photos command
fn handle_sync_photos_command(project_path: &Path) -> Result<()> {
    let resolved = load_snapshot(project_path)?;
    let files = storage::discover_images(&resolved.photos.folder).with_context(|| {
        format!(
            "Failed to list photo folder {}",
            resolved.photos.folder.display()
        )
    })?;

    // Saved with the folder as written in the snapshot
    let mut project = storage::load_project(project_path)
        .with_context(|| format!("Failed to load project {}", project_path.display()))?;
    let added = project.photos.sync_gallery(&files);
    storage::save_project(project_path, &project)
        .with_context(|| format!("Failed to write project {}", project_path.display()))?;

    println!(
        "✓ Added {} photos ({} in gallery)",
        added,
        project.photos.gallery.len()
    );
    Ok(())
}
