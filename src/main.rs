use anyhow::{Context, Result};
use clap::Parser;

use relgate::cli::{self, Cli};
use relgate::{telemetry, ui};

fn main() {
    let args = Cli::parse();
    telemetry::init_tracing(
        args.global.json_logs,
        telemetry::level_for(args.global.debug, args.global.quiet),
    );

    if let Err(e) = run(args) {
        let chain: Vec<String> = e.chain().map(|cause| cause.to_string()).collect();
        ui::display_error(&chain.join(": "));
        std::process::exit(1);
    }
}

fn run(args: Cli) -> Result<()> {
    let name = args.command.name();
    cli::run(args).with_context(|| format!("relgate {} failed", name))
}
