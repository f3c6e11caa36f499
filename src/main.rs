//! Provides the main entry point to the program.
use human_panic::setup_panic;

fn main() {
    setup_panic!();

    if let Err(err) = reservoir_supply::cli::run_cli() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
