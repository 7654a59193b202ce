use std::path::PathBuf;

pub const USAGE: &str = "usage: carlink [--config <path>] <status|start-charging|stop-charging|vehicles|report|login|logout>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    StartCharging,
    StopCharging,
    Vehicles,
    Report,
    Login,
    Logout,
}

impl Command {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "status" => Some(Self::Status),
            "start-charging" => Some(Self::StartCharging),
            "stop-charging" => Some(Self::StopCharging),
            "vehicles" => Some(Self::Vehicles),
            "report" => Some(Self::Report),
            "login" => Some(Self::Login),
            "logout" => Some(Self::Logout),
            _ => None,
        }
    }

    pub fn needs_vin(&self) -> bool {
        matches!(self, Self::Status | Self::StartCharging | Self::StopCharging)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub config_path: Option<PathBuf>,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgsError {
    MissingCommand,
    MissingValue(&'static str),
    Unsupported(String),
}

impl ArgsError {
    /// Exit status for the process. A missing command exits with -1.
    pub fn exit_code(&self) -> i32 {
        match self {
            ArgsError::MissingCommand => -1,
            ArgsError::MissingValue(_) | ArgsError::Unsupported(_) => 2,
        }
    }
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "No command specified"),
            ArgsError::MissingValue(flag) => write!(f, "{} needs a value", flag),
            ArgsError::Unsupported(cmd) => write!(f, "Unsupported command: {}", cmd),
        }
    }
}

pub fn parse_args<I, S>(args: I) -> Result<Invocation, ArgsError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut config_path = None;
    let mut command = None;
    let mut args = args.into_iter().map(Into::into);

    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            let value = args.next().ok_or(ArgsError::MissingValue("--config"))?;
            config_path = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--config=") {
            config_path = Some(PathBuf::from(value));
        } else if command.is_none() {
            command = Some(Command::from_name(&arg).ok_or(ArgsError::Unsupported(arg))?);
        } else {
            return Err(ArgsError::Unsupported(arg));
        }
    }

    Ok(Invocation {
        config_path,
        command: command.ok_or(ArgsError::MissingCommand)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_command() {
        let inv = parse_args(["start-charging"]).expect("args");
        assert_eq!(inv.command, Command::StartCharging);
        assert!(inv.config_path.is_none());
    }

    #[test]
    fn config_flag_in_either_form() {
        let inv = parse_args(["--config", "my.toml", "status"]).expect("args");
        assert_eq!(inv.config_path, Some(PathBuf::from("my.toml")));
        let inv = parse_args(["report", "--config=other.toml"]).expect("args");
        assert_eq!(inv.config_path, Some(PathBuf::from("other.toml")));
        assert_eq!(inv.command, Command::Report);
    }

    #[test]
    fn missing_command_exits_minus_one() {
        let err = parse_args(Vec::<String>::new()).unwrap_err();
        assert_eq!(err, ArgsError::MissingCommand);
        assert_eq!(err.exit_code(), -1);
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = parse_args(["honk"]).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported command: honk");
        assert_ne!(err.exit_code(), 0);
    }

    #[test]
    fn dangling_config_flag() {
        assert_eq!(
            parse_args(["status", "--config"]).unwrap_err(),
            ArgsError::MissingValue("--config")
        );
    }

    #[test]
    fn vin_is_needed_only_for_vehicle_commands() {
        assert!(Command::Status.needs_vin());
        assert!(!Command::Vehicles.needs_vin());
        assert!(!Command::Report.needs_vin());
    }
}
