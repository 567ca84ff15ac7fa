use clap::ArgMatches;
use clap_complete::{generate, Shell};
use enumworks::prelude::*;
use enumworks::{cli, ew_cfg, ew_unbox};
use std::io;

fn main() -> EwResult<()> {
    let args = cli::enumworks().get_matches();

    match &args.subcommand() {
        Some(("cfg", cmd_args)) => ew_cfg::run(cmd_args),
        Some(("unbox", cmd_args)) => ew_unbox::run(cmd_args),
        Some(("gen-completions", sub_args)) => subcommand_gen_completions(sub_args),
        Some((subcommand, _)) => Err(EwError::BadArguments(format!(
            "unknown subcommand '{subcommand}'"
        ))),
        None => Err(EwError::BadArguments("missing subcommand".to_string())),
    }
}

fn subcommand_gen_completions(sub_args: &ArgMatches) -> EwResult<()> {
    let generator = *sub_args
        .get_one::<Shell>("shell")
        .ok_or_else(|| EwError::BadArguments("--shell needed".to_string()))?;
    let mut cmd = cli::enumworks();
    let cmd_name = cmd.get_name().to_string();
    generate(generator, &mut cmd, cmd_name, &mut io::stdout());
    Ok(())
}
