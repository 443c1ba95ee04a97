use std::process::ExitCode;

use log::error;
use mintas_installer::cli::{Action, Cli};
use mintas_installer::config::InstallerConfig;
use mintas_installer::install::Reporter;
use mintas_installer::install::runners::{run_install, run_uninstall};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let Some(action) = Cli::parse_action(std::env::args_os()) else {
        print!("{}", Cli::usage());
        return ExitCode::from(1);
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let result = InstallerConfig::load()
        .map_err(anyhow::Error::from)
        .and_then(|config| {
            rt.block_on(async {
                match action {
                    Action::Install => run_install(config).await,
                    Action::Uninstall => run_uninstall(config).await,
                }
            })
        });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            Reporter::stdout().error(&format!("{e:#}"));
            ExitCode::from(1)
        }
    }
}
