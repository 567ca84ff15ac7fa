use enumworks::prelude::EwResult;
use enumworks::{cli, ew_cfg};

fn main() -> EwResult<()> {
    let args = cli::cfg().get_matches();
    ew_cfg::run(&args)
}
