use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use suiyuan_core::models::{Appearance, BackgroundKind};
use suiyuan_core::MediaSlot;

#[derive(Parser)]
#[command(name = "suiyuan")]
#[command(about = "Inspect and manage SuiYuan start page settings and background media")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding sync.db and local.db
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show media storage usage
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all but the most recently updated media records
    Cleanup {
        /// Number of records to keep (defaults to SUIYUAN_CLEANUP_KEEP_COUNT or 5)
        #[arg(long)]
        keep: Option<usize>,
    },
    /// Store a file in a media slot
    Put {
        slot: SlotArg,
        /// Image or video file
        file: PathBuf,
        /// MIME type, guessed from the extension when omitted
        #[arg(long)]
        mime: Option<String>,
    },
    /// Read a media slot
    Get {
        slot: SlotArg,
        /// Write the payload here instead of printing metadata
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Delete a media slot
    Delete { slot: SlotArg },
    /// Delete every stored media record
    Clear,
    /// Print the resolved settings record
    Settings {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a settings record read from a JSON file
    Save {
        /// Settings JSON file, `-` for stdin
        file: PathBuf,
    },
    /// Show the background that would be rendered
    Resolve {
        /// Background kind (defaults to the saved one)
        #[arg(long, value_enum)]
        background: Option<BackgroundArg>,
        /// Appearance to resolve for
        #[arg(long, value_enum, default_value_t = AppearanceArg::Light)]
        theme: AppearanceArg,
    },
    /// Export the current background as a default-config document
    ExportConfig {
        /// Appearance whose image is exported
        #[arg(long, value_enum, default_value_t = AppearanceArg::Light)]
        theme: AppearanceArg,
        /// Write to file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Print the search URL for a query
    Search {
        /// Built-in or custom engine id
        engine: String,
        /// Search terms; empty opens the engine homepage
        query: Vec<String>,
    },
    /// Print settings whenever another device or page changes them
    Watch {
        /// Polling interval in milliseconds
        #[arg(long, default_value = "2000")]
        interval_ms: u64,
    },
    /// Pull remote settings changes now
    Sync,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Write completion script to file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SlotArg {
    #[value(name = "image_light", alias = "light")]
    ImageLight,
    #[value(name = "image_dark", alias = "dark")]
    ImageDark,
    #[value(name = "video_main", alias = "video")]
    Video,
}

impl From<SlotArg> for MediaSlot {
    fn from(slot: SlotArg) -> Self {
        match slot {
            SlotArg::ImageLight => Self::ImageLight,
            SlotArg::ImageDark => Self::ImageDark,
            SlotArg::Video => Self::Video,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackgroundArg {
    Default,
    Solid,
    Gradient,
    Image,
    Video,
}

impl From<BackgroundArg> for BackgroundKind {
    fn from(kind: BackgroundArg) -> Self {
        match kind {
            BackgroundArg::Default => Self::Default,
            BackgroundArg::Solid => Self::Solid,
            BackgroundArg::Gradient => Self::Gradient,
            BackgroundArg::Image => Self::Image,
            BackgroundArg::Video => Self::Video,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AppearanceArg {
    Light,
    Dark,
}

impl From<AppearanceArg> for Appearance {
    fn from(appearance: AppearanceArg) -> Self {
        match appearance {
            AppearanceArg::Light => Self::Light,
            AppearanceArg::Dark => Self::Dark,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
