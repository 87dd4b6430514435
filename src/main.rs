use std::process::ExitCode;

fn main() -> ExitCode {
    match wider2voc::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
