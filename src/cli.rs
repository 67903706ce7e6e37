use clap::Parser;

use devcontainer_launcher::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[command(
    name = "devcontainer-launcher",
    version,
    about = "Accept workspace paths over TCP and answer with the id of the dev container started for them."
)]
pub(crate) struct Cli {
    /// Port to listen on (all interfaces unless DEVCONTAINER_LAUNCHER_BIND is set)
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub(crate) port: u16,

    /// Print debug logs, including the exact devcontainer and exec command lines
    #[arg(long)]
    pub(crate) verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_defaults_to_9999() {
        let cli = Cli::parse_from(["devcontainer-launcher"]);
        assert_eq!(cli.port, 9999);
        assert!(!cli.verbose);
    }

    #[test]
    fn port_flag_is_parsed() {
        let cli = Cli::parse_from(["devcontainer-launcher", "--port", "8080", "--verbose"]);
        assert_eq!(cli.port, 8080);
        assert!(cli.verbose);
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        assert!(Cli::try_parse_from(["devcontainer-launcher", "--port", "http"]).is_err());
    }
}
