//! Main `EnumWorks` binary command line arguments options.
//!
//! This module declares a function to build `clap` command line arguments
//! parser, so that it can be used from other places than the main binary,
//! such as from bash completion file generator.

use clap::{value_parser, Arg, ArgAction, Command};
use clap_complete::Shell;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn arg_debug() -> Arg {
    Arg::new("debug")
        .short('d')
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Activate debug mode")
}

fn arg_verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Activate verbose mode")
}

fn arg_ecslog() -> Arg {
    Arg::new("ecslog")
        .short('e')
        .long("ecslog")
        .action(ArgAction::SetTrue)
        .help("Output logs in ECS format")
}

fn arg_input() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .action(ArgAction::Append)
        .required(true)
        .help("Input assembly file (can be repeated)")
}

fn arg_output(help: &str) -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .action(ArgAction::Set)
        .help(help.to_string())
}

fn arg_filter_class() -> Arg {
    Arg::new("filter-class")
        .long("filter-class")
        .action(ArgAction::Set)
        .help("Class(es) regex filter")
}

fn arg_filter_method() -> Arg {
    Arg::new("filter-method")
        .long("filter-method")
        .action(ArgAction::Set)
        .help("Method(s) regex filter")
}

#[must_use]
pub fn enumworks() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .author(AUTHORS)
        .about(DESCRIPTION)
        .subcommand(cfg())
        .subcommand(unbox())
        .subcommand(
            Command::new("gen-completions")
                .about("Generates completions file")
                .arg(
                    Arg::new("shell")
                        .short('s')
                        .long("shell")
                        .action(ArgAction::Set)
                        .value_parser(value_parser!(Shell))
                        .required(true)
                        .help("Shell type for completion generation"),
                ),
        )
}

#[must_use]
pub fn cfg() -> Command {
    Command::new("cfg")
        .bin_name("ew-cfg")
        .version(VERSION)
        .author(AUTHORS)
        .about("Prints control flow graphs of methods in dot format")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_output("Output directory (one dot file per method)"))
        .arg(arg_filter_class())
        .arg(arg_filter_method())
}

#[must_use]
pub fn unbox() -> Command {
    Command::new("unbox")
        .bin_name("ew-unbox")
        .version(VERSION)
        .author(AUTHORS)
        .about("Checks which enums can be replaced by integers")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_output("Output file for the JSON report"))
        .arg(arg_filter_class())
        .arg(
            Arg::new("candidates")
                .short('c')
                .long("candidates")
                .action(ArgAction::Set)
                .help("File listing candidate enum descriptors (default: all eligible enums)"),
        )
        .arg(
            Arg::new("rounds")
                .long("rounds")
                .action(ArgAction::Set)
                .value_parser(value_parser!(usize))
                .help("Maximum number of rejection rounds (default: until stable)"),
        )
        .arg(
            Arg::new("threads")
                .short('j')
                .long("threads")
                .action(ArgAction::Set)
                .value_parser(value_parser!(usize))
                .help("Number of worker threads"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the report in JSON"),
        )
        .arg(
            Arg::new("reasons")
                .short('r')
                .long("reasons")
                .action(ArgAction::SetTrue)
                .help("Print why each enum was rejected"),
        )
}
