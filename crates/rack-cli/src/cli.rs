use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rack_core::models::{Category, Condition, Gender, Size};
use rack_core::Resolution;

#[derive(Parser)]
#[command(name = "rack")]
#[command(about = "Offline-first clothing inventory with remote sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a clothing item
    #[command(alias = "new")]
    Add {
        /// Item name
        name: Vec<String>,
        #[command(flatten)]
        fields: ItemFields,
        /// Do not push the item to the remote store
        #[arg(long)]
        local_only: bool,
    },
    /// Edit an existing item
    Edit {
        /// Item ID or unique ID prefix
        id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: ItemFields,
        /// Do not push the change to the remote store
        #[arg(long)]
        local_only: bool,
    },
    /// Copy an item under a new ID
    Duplicate {
        /// Item ID or unique ID prefix
        id: String,
        /// Do not push the copy to the remote store
        #[arg(long)]
        local_only: bool,
    },
    /// List items, most recently edited first
    List {
        /// Number of items to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one item
    Show {
        /// Item ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an item
    #[command(alias = "rm")]
    Remove {
        /// Item ID or unique ID prefix
        id: String,
        /// Keep the remote copy
        #[arg(long)]
        local_only: bool,
    },
    /// Upload pending changes and compare with the remote store
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Settle one conflict found by a sync pass
    Resolve {
        /// Item ID or unique ID prefix
        id: String,
        /// Which side wins
        #[arg(value_enum)]
        resolution: ResolutionArg,
    },
    /// Show or retry writes waiting for a connection
    Pending {
        /// Retry every pending write now
        #[arg(long)]
        drain: bool,
    },
    /// Show local and remote sync status
    Status,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

/// Optional record fields shared by `add` and `edit`.
#[derive(Args, Debug, Default, Clone)]
pub struct ItemFields {
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub brand: Option<String>,
    #[arg(long)]
    pub color: Option<String>,
    #[arg(long)]
    pub material: Option<String>,
    /// Male, Female or Unisex
    #[arg(long)]
    pub gender: Option<Gender>,
    /// Tops, Bottoms, "Outer Wear" or "Inner Wear"
    #[arg(long)]
    pub category: Option<Category>,
    #[arg(long)]
    pub sub_category: Option<String>,
    /// New, Used or Refurbished
    #[arg(long)]
    pub condition: Option<Condition>,
    /// XS, S, M, L or XL
    #[arg(long)]
    pub size: Option<Size>,
    /// Purchase cost in whole currency units
    #[arg(long)]
    pub cost: Option<i64>,
    /// Selling price in whole currency units
    #[arg(long)]
    pub price: Option<i64>,
    #[arg(long)]
    pub quantity: Option<i64>,
    /// Seasons the item suits (repeatable)
    #[arg(long = "season", value_enum)]
    pub seasons: Vec<SeasonArg>,
    /// Occasions the item suits (repeatable)
    #[arg(long = "occasion", value_enum)]
    pub occasions: Vec<OccasionArg>,
    /// Link to a product image
    #[arg(long, value_name = "URL")]
    pub image_url: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SeasonArg {
    Spring,
    Summer,
    Fall,
    Winter,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OccasionArg {
    Formal,
    Casual,
    Active,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResolutionArg {
    KeepLocal,
    KeepRemote,
    DeleteRemote,
}

impl From<ResolutionArg> for Resolution {
    fn from(value: ResolutionArg) -> Self {
        match value {
            ResolutionArg::KeepLocal => Self::KeepLocal,
            ResolutionArg::KeepRemote => Self::KeepRemote,
            ResolutionArg::DeleteRemote => Self::DeleteFromServer,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
