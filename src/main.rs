use std::process::ExitCode;

fn main() -> ExitCode {
    rom_harness::cli::run()
}
