//! lambdatune CLI entry point
//!
//! Parses arguments and delegates to `cli::run`. Errors go to stdout as a
//! JSON error object and to stderr as text, and the process exits with 1.

use lambdatune::cli;

fn main() {
    if let Err(e) = cli::run() {
        let _ = cli::write_error(e.code_str(), e.message());
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
