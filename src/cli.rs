//! Command-line surface: a thin demonstration wrapper exercising the engine against
//! a fixture DOM. Clap derive style follows the teacher's `src/cli/*.rs` modules.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "selfheal",
    about = "Autonomous selector-healing engine for browser end-to-end tests",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a DOM fixture JSON file (an array of element descriptors), used in
    /// place of a live browser driver. Defaults to a small built-in demo page.
    #[arg(long, global = true)]
    pub fixture: Option<PathBuf>,

    /// Path to a YAML configuration file overriding defaults and environment
    /// variables (programmatic override is not exposed on the CLI surface).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Attempt to heal a broken selector against the fixture DOM.
    Heal {
        selector: String,
        /// Expected tag name of the target element, used for confidence bonuses.
        #[arg(long)]
        expected_type: Option<String>,
    },
    /// Report strategy availability and cache size.
    Health,
    /// List selectors ranked by flakiness score, descending.
    Flakiness,
    /// Clear the healing cache and flakiness tracker.
    ClearCache,
}
