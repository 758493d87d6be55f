//! Entry point for the `genboxd` dispatcher.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    genboxd::run(std::env::args_os(), &mut stdin, &mut stdout, &mut stderr)
}
