use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use flowtag_core::{FlowLogFormat, Pipeline, ReportFormat, UNTAGGED};

use super::InputArgs;
use crate::settings;

#[derive(Args, Default)]
pub struct CountArgs {
    #[command(flatten)]
    pub inputs: InputArgs,

    /// Write the reports to these paths instead of prompting
    #[arg(
        short,
        long,
        num_args = 2,
        value_names = ["TAG_COUNTS", "PORT_PROTOCOL_COUNTS"],
    )]
    pub output: Option<Vec<PathBuf>>,

    /// Report file format
    #[arg(long)]
    pub format: Option<ReportFormat>,
}

pub fn run(args: CountArgs) -> Result<()> {
    let started = Instant::now();

    let overrides = args
        .inputs
        .overrides(args.output.as_deref(), args.format);
    let file = args.inputs.file_config()?;
    let mut prompter = args.inputs.prompter();
    let config = settings::resolve(&overrides, file, &mut *prompter, true)?;

    let pipeline = Pipeline::new(&config).context("cannot start run")?;

    // 1. Reference tables
    println!(
        "  {} {}, {}",
        console::style("[1/3] loading reference tables").cyan().bold(),
        config.protocol_numbers.display(),
        config.lookup_table.display(),
    );

    let tables = pipeline.load_tables()?;

    println!(
        "        {} protocols, {} lookup entries",
        console::style(tables.protocols.len()).green().bold(),
        console::style(tables.lookup.len()).green().bold(),
    );

    // 2. Classify
    let format_label = match config.flow_log_format {
        FlowLogFormat::Default => "default format".to_string(),
        FlowLogFormat::Custom { delimiter } => format!("custom format, delimiter {delimiter:?}"),
    };
    println!(
        "  {} {} ({})",
        console::style("[2/3] classifying").cyan().bold(),
        config.flow_log.display(),
        format_label,
    );

    let counts = pipeline.count(&tables)?;

    println!(
        "        {} records counted, {} skipped",
        console::style(counts.processed).green().bold(),
        if counts.skipped > 0 {
            console::style(counts.skipped).yellow().bold()
        } else {
            console::style(counts.skipped).white()
        },
    );
    println!(
        "        {} tags ({} untagged), {} port/protocol combinations",
        console::style(counts.tag_counts.len()).green(),
        counts.tag_counts.get(UNTAGGED),
        console::style(counts.port_protocol_counts.len()).green(),
    );

    // 3. Reports
    println!(
        "  {}",
        console::style(format!("[3/3] writing {} reports", config.report_format))
            .cyan()
            .bold(),
    );

    pipeline.write_reports(&counts)?;

    println!();
    let [tag_path, port_path] = pipeline.report_paths();
    println!(
        "  {} {}",
        console::style("tag counts ->").green().bold(),
        tag_path.display(),
    );
    println!(
        "  {} {}",
        console::style("port/protocol counts ->").green().bold(),
        port_path.display(),
    );
    println!(
        "  {} {:.1}ms",
        console::style("completed in").white().bold(),
        started.elapsed().as_secs_f64() * 1000.0,
    );

    Ok(())
}
