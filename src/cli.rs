use clap::{CommandFactory, Parser, ValueEnum};

/// Install or uninstall the Mintas runtime
#[derive(Parser, Debug)]
#[command(
    name = "mintas-install",
    about = "Install or uninstall the Mintas runtime",
    disable_help_flag = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// Workflow to run (defaults to install)
    #[arg(value_enum, value_name = "COMMAND")]
    pub command: Option<Action>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Download the latest release and install it
    Install,
    /// Remove the installed runtime and its PATH entry
    Uninstall,
}

impl Cli {
    /// Parse arguments (including the program name) into an action
    ///
    /// Anything other than nothing, `install` or `uninstall` yields `None`.
    pub fn parse_action<I, T>(args: I) -> Option<Action>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        match Self::try_parse_from(args) {
            Ok(cli) => Some(cli.command.unwrap_or(Action::Install)),
            Err(e) => {
                log::debug!("argument error: {e}");
                None
            }
        }
    }

    /// Usage text printed for invalid invocations
    pub fn usage() -> String {
        Self::command().render_help().to_string()
    }
}
