//! Command-line definition
//!
//! Flag values stay unvalidated here. Semantic checks (forward
//! specification shape, required APK) happen in [`crate::commands`] so
//! failures surface with run error kinds instead of parser exit codes.

use std::path::PathBuf;

use clap::Parser;

/// Deploy and run Android apps on connected devices and emulators.
#[derive(Parser, Debug)]
#[command(name = "droidrun")]
#[command(version)]
#[command(about = "Deploy and run Android apps on devices and emulators", long_about = None)]
pub struct Cli {
    /// APK to deploy
    #[arg(long, value_name = "PATH")]
    pub app: Option<PathBuf>,

    /// Device serial or AVD id to deploy to
    #[arg(long, value_name = "ID")]
    pub target: Option<String>,

    /// Prefer virtual devices over connected hardware
    #[arg(long = "virtual")]
    pub prefer_virtual: bool,

    /// Forward a device port to a host port (<device port>:<host port>)
    #[arg(long, value_name = "PORTS")]
    pub forward: Option<String>,

    /// Stay attached until the app closes, then clean up
    #[arg(long)]
    pub connect: bool,

    /// List connected devices and installed virtual devices, then exit
    #[arg(long)]
    pub list: bool,

    /// Print resolved SDK paths and installed packages, then exit
    #[arg(long)]
    pub sdk_info: bool,

    /// Emit --list and --sdk-info output as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug diagnostics on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_run_invocation() {
        let cli = Cli::parse_from([
            "droidrun",
            "--app",
            "app.apk",
            "--target",
            "emulator-5554",
            "--forward",
            "8080:9090",
            "--connect",
        ]);
        assert_eq!(cli.app.as_deref(), Some(std::path::Path::new("app.apk")));
        assert_eq!(cli.target.as_deref(), Some("emulator-5554"));
        assert_eq!(cli.forward.as_deref(), Some("8080:9090"));
        assert!(cli.connect);
        assert!(!cli.prefer_virtual);
    }

    #[test]
    fn virtual_flag_maps_to_prefer_virtual() {
        let cli = Cli::parse_from(["droidrun", "--virtual", "--list"]);
        assert!(cli.prefer_virtual);
        assert!(cli.list);
    }

    #[test]
    fn malformed_forward_value_is_accepted_by_the_parser() {
        // Shape validation is deferred so it reports a run error kind.
        let cli = Cli::parse_from(["droidrun", "--forward", "8080"]);
        assert_eq!(cli.forward.as_deref(), Some("8080"));
    }

    #[test]
    fn sdk_info_and_json_flags_parse() {
        let cli = Cli::parse_from(["droidrun", "--sdk-info", "--json", "-v"]);
        assert!(cli.sdk_info);
        assert!(cli.json);
        assert!(cli.verbose);
    }
}
