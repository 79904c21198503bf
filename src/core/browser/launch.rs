// src/core/browser/launch.rs

use std::path::PathBuf;
use tracing::debug;

/// Chromium pack used on serverless hosts, where no system Chrome exists.
/// The deployment downloads and unpacks it ahead of time and exposes the
/// binary through `CHROME_EXECUTABLE`.
pub const REMOTE_CHROMIUM_PACK: &str =
    "https://github.com/Sparticuz/chromium/releases/download/v133.0.0/chromium-v133.0.0-pack.tar";

const WINDOWS_CHROME: &str = r"C:\Program Files\Google\Chrome\Application\chrome.exe";
const LINUX_CHROME: &str = "/usr/bin/google-chrome";
const MACOS_CHROME: &str = "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployEnvironment {
    /// Serverless platform (detected through its marker env vars).
    Serverless,
    /// Developer machine or ordinary server with a system Chrome.
    Local,
}

impl DeployEnvironment {
    pub fn detect() -> Self {
        let serverless = std::env::var_os("VERCEL").is_some()
            || std::env::var_os("AWS_LAMBDA_FUNCTION_NAME").is_some();
        if serverless {
            DeployEnvironment::Serverless
        } else {
            DeployEnvironment::Local
        }
    }
}

/// Where the Chrome binary comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutableSource {
    /// Serverless: a pre-unpacked minimal Chromium build.
    RemotePack { pack_url: String },
    /// The stock install path for the host OS.
    Path(PathBuf),
}

/// Everything the engine needs to start a browser for one scan.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub executable: ExecutableSource,
    pub args: Vec<String>,
    pub headless: bool,
}

impl LaunchConfig {
    /// Builds the launch configuration for the current process environment.
    pub fn from_environment() -> Self {
        Self::for_environment(DeployEnvironment::detect(), std::env::consts::OS)
    }

    /// Hardened flags applied in every environment: no sandbox juggling in
    /// containers, no shared memory pressure, no GPU.
    fn hardened_args() -> Vec<String> {
        [
            "--no-sandbox",
            "--disable-setuid-sandbox",
            "--disable-dev-shm-usage",
            "--disable-gpu",
            "--disable-extensions",
            "--disable-background-networking",
            "--disable-default-apps",
            "--disable-sync",
            "--disable-translate",
            "--mute-audio",
            "--no-first-run",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn for_environment(env: DeployEnvironment, os: &str) -> Self {
        let executable = match env {
            DeployEnvironment::Serverless => ExecutableSource::RemotePack {
                pack_url: REMOTE_CHROMIUM_PACK.to_string(),
            },
            DeployEnvironment::Local => {
                let path = match os {
                    "windows" => WINDOWS_CHROME,
                    "macos" => MACOS_CHROME,
                    _ => LINUX_CHROME,
                };
                ExecutableSource::Path(PathBuf::from(path))
            }
        };
        debug!(?env, os, "Resolved browser launch configuration.");
        Self {
            executable,
            args: Self::hardened_args(),
            headless: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_config_uses_the_os_install_path() {
        let linux = LaunchConfig::for_environment(DeployEnvironment::Local, "linux");
        assert_eq!(
            linux.executable,
            ExecutableSource::Path(PathBuf::from("/usr/bin/google-chrome"))
        );
        let windows = LaunchConfig::for_environment(DeployEnvironment::Local, "windows");
        assert!(matches!(
            windows.executable,
            ExecutableSource::Path(ref p) if p.to_string_lossy().ends_with("chrome.exe")
        ));
        let macos = LaunchConfig::for_environment(DeployEnvironment::Local, "macos");
        assert!(matches!(
            macos.executable,
            ExecutableSource::Path(ref p) if p.starts_with("/Applications")
        ));
    }

    #[test]
    fn serverless_config_points_at_the_chromium_pack() {
        let config = LaunchConfig::for_environment(DeployEnvironment::Serverless, "linux");
        assert!(matches!(
            config.executable,
            ExecutableSource::RemotePack { ref pack_url } if pack_url.ends_with(".tar")
        ));
    }

    #[test]
    fn hardened_args_always_include_the_container_flags() {
        let config = LaunchConfig::for_environment(DeployEnvironment::Local, "linux");
        for flag in ["--no-sandbox", "--disable-dev-shm-usage", "--disable-gpu"] {
            assert!(config.args.iter().any(|a| a == flag), "missing {flag}");
        }
        assert!(config.headless);
    }
}
