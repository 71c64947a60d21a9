use backlight_manager::{
    CliAction, Log, ParsedArgs, RuntimePaths,
    commands::{control, kill, status},
    constants::{EXIT_FAILURE, EXIT_SUCCESS},
};

fn main() {
    let parsed = ParsedArgs::from_env();

    let paths = RuntimePaths::from_env();
    let result = match parsed.action {
        CliAction::ShowInfo(text) => {
            print!("{}", text);
            std::process::exit(EXIT_SUCCESS);
        }
        CliAction::ShowError(text) => {
            eprint!("{}", text);
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Kill => {
            Log::log_version();
            kill::handle_kill_command(&paths).map(|_| ())
        }
        CliAction::PrintStatus => {
            Log::log_version();
            status::handle_status_command(&paths)
        }
        CliAction::Run {
            ambient,
            daemon,
            adjustment,
        } => {
            Log::log_version();
            control::handle_run_command(ambient, daemon, adjustment, &paths)
        }
    };

    match result {
        Ok(()) => Log::log_end(),
        Err(e) => {
            Log::log_critical(&format!("{:#}", e));
            std::process::exit(EXIT_FAILURE);
        }
    }
}
