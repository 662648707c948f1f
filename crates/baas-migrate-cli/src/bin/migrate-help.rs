//! Prints usage guidance for `migrate`. Has no side effects.

#[path = "../usage.rs"]
mod usage;

use clap::Parser;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "migrate-help")]
#[command(about = "Print usage guidance for the migrate command")]
#[command(version)]
struct Cli {}

fn main() -> ExitCode {
    let _cli = Cli::parse();
    println!("migrate - move a project's schema, data and storage to another project\n");
    println!("{}", usage::GUIDE);
    println!("{}", usage::EXAMPLES);
    println!("Run `migrate --help` for the full flag reference.");
    ExitCode::SUCCESS
}
