//! Command-line interface, built on clap.
//!
//! Every subcommand runs against the demo plant: the sample batches seeded
//! at startup plus whatever the command itself creates.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::batch::{BatchFilter, BatchStatus};
use crate::catalog::Shift;

/// Oil-blending batch tracker: lifecycle, live blend readings and KPIs.
#[derive(Debug, Parser)]
#[command(name = "blendtrack", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file to read instead of ./blendtrack.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Fixed RNG seed for simulated readings.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Disable random noise on simulated readings.
    #[arg(long, global = true, default_value_t = false)]
    pub no_jitter: bool,

    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Planned,
    InProgress,
    ReadyForQc,
    ReadyForFilling,
    Filling,
    Dispatched,
}

impl From<StatusArg> for BatchStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Planned => BatchStatus::Planned,
            StatusArg::InProgress => BatchStatus::InProgress,
            StatusArg::ReadyForQc => BatchStatus::ReadyForQc,
            StatusArg::ReadyForFilling => BatchStatus::ReadyForFilling,
            StatusArg::Filling => BatchStatus::Filling,
            StatusArg::Dispatched => BatchStatus::Dispatched,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShiftArg {
    A,
    B,
    C,
}

impl From<ShiftArg> for Shift {
    fn from(arg: ShiftArg) -> Self {
        match arg {
            ShiftArg::A => Shift::A,
            ShiftArg::B => Shift::B,
            ShiftArg::C => Shift::C,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Walk a new batch through every stage, including a failed QC and rework.
    Demo,

    /// Print the KPI dashboard.
    Kpi {
        /// Emit JSON instead of the formatted dashboard.
        #[arg(long)]
        json: bool,
    },

    /// List batches, newest first.
    List {
        #[arg(long)]
        status: Option<StatusArg>,

        #[arg(long)]
        product: Option<String>,

        #[arg(long)]
        shift: Option<ShiftArg>,
    },

    /// Show the stage-by-stage history of one batch.
    Trace {
        /// Batch number, e.g. B-2026-002505.
        batch_number: String,
    },

    /// Follow live readings of a blending batch.
    Watch {
        /// Batch number; defaults to the first batch currently blending.
        batch_number: Option<String>,

        /// Stop after this many readings.
        #[arg(long)]
        ticks: Option<u32>,
    },

    /// Show filling lines and whether they can take a batch.
    Lines,
}

impl Command {
    /// The batch filter described by `list` flags; empty for other commands.
    pub fn filter(&self) -> BatchFilter {
        let mut filter = BatchFilter::default();
        if let Command::List {
            status,
            product,
            shift,
        } = self
        {
            if let Some(status) = status {
                filter = filter.status((*status).into());
            }
            if let Some(product) = product {
                filter = filter.product(product.clone());
            }
            if let Some(shift) = shift {
                filter = filter.shift((*shift).into());
            }
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_list_filters() {
        let cli = Cli::parse_from([
            "blendtrack",
            "list",
            "--status",
            "ready-for-qc",
            "--product",
            "prod_1",
            "--shift",
            "b",
        ]);
        let filter = cli.command.filter();
        assert_eq!(filter.status, Some(BatchStatus::ReadyForQc));
        assert_eq!(filter.product_id.as_deref(), Some("prod_1"));
        assert_eq!(filter.shift, Some(Shift::B));
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["blendtrack", "--seed", "7", "--no-jitter", "-v", "demo"]);
        assert!(cli.verbose);
        assert!(cli.no_jitter);
        assert_eq!(cli.seed, Some(7));
        assert!(matches!(cli.command, Command::Demo));
        assert_eq!(cli.command.filter(), BatchFilter::default());
    }

    #[test]
    fn cli_parses_watch_subcommand() {
        let cli = Cli::parse_from(["blendtrack", "watch", "B-2026-002502", "--ticks", "3"]);
        match cli.command {
            Command::Watch {
                batch_number,
                ticks,
            } => {
                assert_eq!(batch_number.as_deref(), Some("B-2026-002502"));
                assert_eq!(ticks, Some(3));
            }
            _ => panic!("expected Watch command"),
        }
    }

    #[test]
    fn cli_parses_kpi_json() {
        let cli = Cli::parse_from(["blendtrack", "kpi", "--json"]);
        assert!(matches!(cli.command, Command::Kpi { json: true }));
    }

    #[test]
    fn cli_rejects_unknown_status() {
        assert!(Cli::try_parse_from(["blendtrack", "list", "--status", "lost"]).is_err());
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
