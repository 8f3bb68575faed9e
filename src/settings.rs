use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Measure internet connection speed.")]
pub struct Settings {
    /// Use HTTP instead of HTTPS when talking to the speed test service
    #[arg(long, env = "SPEEDCHECK_INSECURE", value_parser = clap::builder::FalseyValueParser::new())]
    pub insecure: bool,

    /// Generate and display a shareable image URL for the results
    #[arg(long, env = "SPEEDCHECK_SHARE", value_parser = clap::builder::FalseyValueParser::new())]
    pub share: bool,

    /// Timeout in seconds for server discovery and selection
    #[arg(
        long,
        env = "SPEEDCHECK_TIMEOUT",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Append the result to this CSV file
    #[arg(long, env = "SPEEDCHECK_CSV", value_name = "PATH")]
    pub csv: Option<PathBuf>,

    /// Log provider activity at debug level on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Settings {
    pub fn secure(&self) -> bool {
        !self.insecure
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

/// Serialises tests that parse settings, since parsing reads the process
/// environment.
#[cfg(test)]
static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) fn parse_args(args: &[&str]) -> Result<Settings, clap::Error> {
    let _env = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    Settings::try_parse_from(std::iter::once("speedcheck").chain(args.iter().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_env<T>(pairs: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _env = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for (key, value) in pairs {
            std::env::set_var(key, value);
        }
        let out = f();
        for (key, _) in pairs {
            std::env::remove_var(key);
        }
        out
    }

    #[test]
    fn defaults_match_documented_surface() {
        let settings = parse_args(&[]).unwrap();
        assert!(settings.secure());
        assert!(!settings.share);
        assert_eq!(settings.timeout(), Duration::from_secs(10));
        assert!(settings.csv.is_none());
    }

    #[test]
    fn flags_are_parsed() {
        let settings = parse_args(&[
            "--insecure",
            "--share",
            "--timeout",
            "30",
            "--csv",
            "runs.csv",
        ])
        .unwrap();
        assert!(!settings.secure());
        assert!(settings.share);
        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert_eq!(settings.csv, Some(PathBuf::from("runs.csv")));
    }

    #[test]
    fn zero_or_garbage_timeout_is_rejected() {
        assert!(parse_args(&["--timeout", "0"]).is_err());
        assert!(parse_args(&["--timeout", "soon"]).is_err());
    }

    #[test]
    fn switches_accept_common_truthy_env_values() {
        for value in ["1", "yes", "true", "on"] {
            let settings = with_env(
                &[("SPEEDCHECK_SHARE", value), ("SPEEDCHECK_INSECURE", value)],
                || Settings::try_parse_from(["speedcheck"]),
            )
            .unwrap();
            assert!(settings.share, "SPEEDCHECK_SHARE={value}");
            assert!(!settings.secure(), "SPEEDCHECK_INSECURE={value}");
        }
    }

    #[test]
    fn switches_treat_falsey_env_values_as_off() {
        for value in ["0", "no", "false", "off", ""] {
            let settings = with_env(&[("SPEEDCHECK_SHARE", value)], || {
                Settings::try_parse_from(["speedcheck"])
            })
            .unwrap();
            assert!(!settings.share, "SPEEDCHECK_SHARE={value}");
        }
    }

    #[test]
    fn timeout_can_come_from_env() {
        let settings = with_env(&[("SPEEDCHECK_TIMEOUT", "45")], || {
            Settings::try_parse_from(["speedcheck"])
        })
        .unwrap();
        assert_eq!(settings.timeout(), Duration::from_secs(45));
    }
}
