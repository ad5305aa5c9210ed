use IsoKin::cli::cli_main::{CliArgs, init_logger, run};
use clap::Parser;
use log::error;

pub fn main() {
    let cli = CliArgs::parse();
    init_logger(cli.verbose);
    if let Err(e) = run(&cli) {
        error!("{}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
