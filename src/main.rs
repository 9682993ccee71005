use resilient_move::ResilientFsError;
use resilient_move::cli;
use resilient_move::output as out;

mod app;
mod logging;

fn main() {
    let args = cli::parse();
    if let Err(e) = app::run(args) {
        out::print_error(&format!("{e:#}"));
        let code = e
            .downcast_ref::<ResilientFsError>()
            .map_or(1, ResilientFsError::code);
        std::process::exit(code);
    }
}
