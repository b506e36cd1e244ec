use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reprise - repair broken file references in m3u playlists
#[derive(Parser, Debug)]
#[command(name = "reprise", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory override (index, reports, exports)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan music roots and rebuild the library index
    Scan {
        /// Roots to scan (defaults to music_roots from config.toml)
        roots: Vec<PathBuf>,
    },

    /// Repair playlists against the index, writing one report each
    Repair {
        /// Playlist files to repair
        #[arg(required = true)]
        playlists: Vec<PathBuf>,

        /// Duration tolerance in seconds
        #[arg(long)]
        tolerance: Option<u32>,
    },

    /// Show rows that still need a decision (or the resolved audit view)
    Status {
        /// Playlist files to inspect
        #[arg(required = true)]
        playlists: Vec<PathBuf>,

        /// Show the resolved view instead of the unresolved one
        #[arg(long)]
        resolved: bool,
    },

    /// Record a manual selection for one report row and save it
    Select {
        /// The playlist the report row belongs to
        playlist: PathBuf,

        /// 0-based report row index
        row: u32,

        /// The audio file the row should resolve to
        file: PathBuf,
    },

    /// Write the final fixed_<key>_selected.m3u playlists
    Export {
        /// Playlist files to export
        #[arg(required = true)]
        playlists: Vec<PathBuf>,
    },
}
