pub mod check;
pub mod count;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use flowtag_core::ReportFormat;

use crate::prompt::{NoPrompt, Prompter, TermPrompter};
use crate::settings::{FileConfig, Overrides};

#[derive(Parser)]
#[command(
    name = "flowtag",
    about = "Tag VPC flow log records by destination port and protocol",
    long_about = "flowtag - classify flow log records against a (port, protocol) lookup table\n\
                  and count matches per tag and per port/protocol combination.\n\n\
                  Runs `count` when no subcommand is given.",
    version,
    propagate_version = true,
    args_conflicts_with_subcommands = true,
    styles = get_styles(),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Arguments for `count` when it runs without naming the subcommand
    #[command(flatten)]
    pub count: count::CountArgs,

    /// Show debug logging
    #[arg(short, long, global = true, default_value_t = false, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors (hides skipped-row warnings)
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,
}

impl Cli {
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "flowtag=debug,flowtag_core=debug"
        } else if self.quiet {
            "flowtag=error,flowtag_core=error"
        } else {
            "flowtag=info,flowtag_core=info"
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify a flow log and write tag and port/protocol count reports
    Count(count::CountArgs),

    /// Validate the reference tables and flow log header without counting
    Check(check::CheckArgs),
}

/// Input selection shared by every command.
#[derive(Args, Default)]
pub struct InputArgs {
    /// Flow log is in a custom format (a header row must be present)
    #[arg(short, long, default_value_t = false)]
    pub custom: bool,

    /// Column delimiter for custom-format flow logs
    #[arg(long, requires = "custom")]
    pub delimiter: Option<char>,

    /// Use these input files instead of prompting
    #[arg(
        short,
        long,
        num_args = 3,
        value_names = ["PROTOCOL_NUMBERS", "LOOKUP_TABLE", "FLOW_LOG"],
    )]
    pub input: Option<Vec<PathBuf>>,

    /// TOML config file supplying any paths not given as arguments
    #[arg(long, env = "FLOWTAG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Never prompt; fall back to built-in defaults
    #[arg(long, default_value_t = false)]
    pub no_prompt: bool,
}

impl InputArgs {
    pub fn overrides(
        &self,
        output: Option<&[PathBuf]>,
        report_format: Option<ReportFormat>,
    ) -> Overrides {
        Overrides {
            inputs: self.input.as_deref().and_then(|paths| match paths {
                [protocols, lookup, flow_log] => {
                    Some([protocols.clone(), lookup.clone(), flow_log.clone()])
                }
                _ => None,
            }),
            outputs: output.and_then(|paths| match paths {
                [tags, ports] => Some([tags.clone(), ports.clone()]),
                _ => None,
            }),
            custom: self.custom,
            delimiter: self.delimiter,
            report_format,
        }
    }

    pub fn file_config(&self) -> Result<FileConfig> {
        FileConfig::load(self.config.as_deref())
    }

    pub fn prompter(&self) -> Box<dyn Prompter> {
        match TermPrompter::attended() {
            Some(term) if !self.no_prompt => Box::new(term),
            _ => Box::new(NoPrompt),
        }
    }
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Count(args)) => count::run(args),
        Some(Commands::Check(args)) => check::run(args),
        None => count::run(cli.count),
    }
}

fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .header(
            clap::builder::styling::AnsiColor::BrightCyan
                .on_default()
                .bold(),
        )
        .usage(
            clap::builder::styling::AnsiColor::BrightCyan
                .on_default()
                .bold(),
        )
        .literal(
            clap::builder::styling::AnsiColor::BrightGreen
                .on_default()
                .bold(),
        )
        .placeholder(
            clap::builder::styling::AnsiColor::BrightWhite
                .on_default()
                .dimmed(),
        )
}
