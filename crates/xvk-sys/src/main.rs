// Entry point for xvk-lights
//
// Startup runs in engine order:
//   1. `+set` commands from the command line
//   2. logging, honoring `developer`
//   3. filesystem and level load
//   4. light grid build and report
//
// Exit status is non-zero when the level or its lights fail to load.

use std::process::ExitCode;

use xvk_common::common::com_eprintf;
use xvk_sys::sys_main;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let (mut cvars, rest) = sys_main::sys_init_cvars(&args);
    sys_main::sys_init_developer(&cvars);
    sys_main::sys_init_logging();

    match sys_main::sys_load_lights(&mut cvars, &rest) {
        Ok(level) => {
            sys_main::sys_report(&level);
            ExitCode::SUCCESS
        }
        Err(e) => {
            com_eprintf(&format!("{}\n", e));
            ExitCode::FAILURE
        }
    }
}
