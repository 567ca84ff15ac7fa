use enumworks::prelude::EwResult;
use enumworks::{cli, ew_unbox};

fn main() -> EwResult<()> {
    let args = cli::unbox().get_matches();
    ew_unbox::run(&args)
}
