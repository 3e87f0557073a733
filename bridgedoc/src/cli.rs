//! Command-line interface definitions for bridgedoc

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use bridgedoc::export::format::Profile;

/// Output document flavour
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ProfileArg {
    /// Technical passport
    #[default]
    Passport,
    /// Inspection report
    Report,
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Passport => Profile::Passport,
            ProfileArg::Report => Profile::Report,
        }
    }
}

/// CLI structure for the bridgedoc application
#[derive(Parser)]
#[command(name = "bridgedoc")]
#[command(version)]
#[command(about = "Bridge inspection passport and report generator", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./bridgedoc.toml when present)
    #[arg(long, global = true, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for bridgedoc
#[derive(Subcommand)]
pub enum Commands {
    /// Fill a template from a project snapshot
    Export {
        /// Project snapshot (JSON)
        project: PathBuf,

        /// Output document path
        #[arg(short, long, default_value = "output.docx")]
        output: PathBuf,

        /// Document profile
        #[arg(short, long, value_enum, default_value = "passport")]
        profile: ProfileArg,

        /// Template to fill (overrides the configured template)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Address spans and piers by position ({{span0.key}}) instead of cloning blocks
        #[arg(long)]
        indexed: bool,
    },

    /// Check a template for markers and the defects table
    CheckTemplate {
        /// Template to check
        template: PathBuf,
    },

    /// Create an empty project snapshot
    New {
        /// Snapshot to write
        path: PathBuf,

        /// Number of blank span records
        #[arg(long, default_value_t = 0)]
        spans: usize,

        /// Number of blank pier records
        #[arg(long, default_value_t = 0)]
        piers: usize,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// List catalog placements, or the defect types of one placement
    Catalog {
        /// Placement to list defect types for
        placement: Option<String>,

        /// Catalog CSV (overrides the configured catalog)
        #[arg(long, value_name = "CSV")]
        catalog: Option<PathBuf>,
    },

    /// Evaluate a quantity rule against the bridge attributes
    Quantity {
        /// Project snapshot (JSON)
        project: PathBuf,

        /// Rule name (DECK_AREA_G, SIDEWALK_AREA_T, MANUAL)
        rule: String,
    },

    /// Add new images from the photo folder to the gallery
    SyncPhotos {
        /// Project snapshot (JSON)
        project: PathBuf,
    },
}
