use anyhow::{Context, Result};
use clap::Args;

use flowtag_core::Pipeline;

use super::InputArgs;
use crate::settings;

#[derive(Args, Default)]
pub struct CheckArgs {
    #[command(flatten)]
    pub inputs: InputArgs,
}

/// Load both reference tables and open the flow log, then stop. Nothing is
/// classified and no report is written.
pub fn run(args: CheckArgs) -> Result<()> {
    let overrides = args.inputs.overrides(None, None);
    let file = args.inputs.file_config()?;
    let mut prompter = args.inputs.prompter();
    let config = settings::resolve(&overrides, file, &mut *prompter, false)?;

    let pipeline = Pipeline::new(&config).context("cannot start check")?;
    let tables = pipeline.load_tables()?;
    let reader = pipeline.open_flow_log()?;

    println!(
        "  {} {} ({} protocols)",
        console::style("ok").green().bold(),
        config.protocol_numbers.display(),
        tables.protocols.len(),
    );
    println!(
        "  {} {} ({} lookup entries)",
        console::style("ok").green().bold(),
        config.lookup_table.display(),
        tables.lookup.len(),
    );
    println!(
        "  {} {} (flow log header ok)",
        console::style("ok").green().bold(),
        reader.path().display(),
    );

    if tables.lookup.is_empty() {
        println!(
            "  {} lookup table has no entries; every record will be {}",
            console::style("warning:").yellow().bold(),
            flowtag_core::UNTAGGED,
        );
    }

    Ok(())
}
