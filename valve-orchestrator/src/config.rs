//! Orchestrator configuration
//!
//! Remote host settings, log storage location and server address.
//! Everything is read from environment variables at startup, with a `.env`
//! file in the working directory (or one of its parents) filling in any
//! variable the environment does not set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote user the ssh session logs in as
    pub ssh_user: String,

    /// Remote host running the valve controller
    pub ssh_host: String,

    /// Local ssh executable
    pub ssh_binary: String,

    /// Extra options passed to ssh before the destination (e.g. `-o BatchMode=yes`)
    pub ssh_options: Vec<String>,

    /// Interpreter used to run the remote scripts
    pub remote_interpreter: String,

    /// Remote path of the script that starts a valve operation
    pub start_script_path: String,

    /// Remote path of the script that stops the running operation
    pub stop_script_path: String,

    /// Directory holding one log file per operation
    pub log_dir: PathBuf,

    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Kill the remote invocation if it runs longer than this
    pub operation_timeout: Option<Duration>,
}

impl Config {
    /// Creates a configuration for the given remote host with defaults for the rest
    pub fn new(
        ssh_user: impl Into<String>,
        ssh_host: impl Into<String>,
        start_script_path: impl Into<String>,
        stop_script_path: impl Into<String>,
    ) -> Self {
        Self {
            ssh_user: ssh_user.into(),
            ssh_host: ssh_host.into(),
            ssh_binary: "ssh".to_string(),
            ssh_options: Vec::new(),
            remote_interpreter: "python3".to_string(),
            start_script_path: start_script_path.into(),
            stop_script_path: stop_script_path.into(),
            log_dir: PathBuf::from("logs"),
            bind_addr: "0.0.0.0:3000".to_string(),
            operation_timeout: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - SSH_USER (required)
    /// - SSH_HOST (required)
    /// - SCRIPT_PATH (required)
    /// - STOP_SCRIPT_PATH (required)
    /// - SSH_BINARY (optional, default: ssh)
    /// - SSH_OPTIONS (optional, whitespace separated)
    /// - REMOTE_INTERPRETER (optional, default: python3)
    /// - LOG_DIR (optional, default: logs)
    /// - ORCHESTRATOR_BIND_ADDR (optional, default: 0.0.0.0:3000)
    /// - OPERATION_TIMEOUT (optional, seconds, default: none)
    pub fn from_env() -> Result<Self> {
        let file_vars = match dotenv::from_filename_iter(".env") {
            Ok(vars) => collect_dotenv(vars).context("Failed to parse .env")?,
            Err(dotenv::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                HashMap::new()
            }
            Err(e) => return Err(e).context("Failed to read .env"),
        };

        Self::with_file_vars(file_vars)
    }

    /// Like [`Config::from_env`], reading the dotenv file at `path`
    pub fn from_env_file(path: &Path) -> Result<Self> {
        let vars = dotenv::from_path_iter(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_vars = collect_dotenv(vars)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Self::with_file_vars(file_vars)
    }

    fn with_file_vars(file_vars: HashMap<String, String>) -> Result<Self> {
        if !file_vars.is_empty() {
            tracing::info!("Loaded {} variable(s) from dotenv file", file_vars.len());
        }

        // the real environment wins over the file
        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .or_else(|| file_vars.get(key).cloned())
        })
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| anyhow::anyhow!("{} environment variable not set", key))
        };

        let mut config = Self::new(
            required("SSH_USER")?,
            required("SSH_HOST")?,
            required("SCRIPT_PATH")?,
            required("STOP_SCRIPT_PATH")?,
        );

        if let Some(binary) = lookup("SSH_BINARY") {
            config.ssh_binary = binary;
        }

        if let Some(options) = lookup("SSH_OPTIONS") {
            config.ssh_options = options.split_whitespace().map(str::to_string).collect();
        }

        if let Some(interpreter) = lookup("REMOTE_INTERPRETER") {
            config.remote_interpreter = interpreter;
        }

        if let Some(dir) = lookup("LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        if let Some(addr) = lookup("ORCHESTRATOR_BIND_ADDR") {
            config.bind_addr = addr;
        }

        if let Some(raw) = lookup("OPERATION_TIMEOUT") {
            let secs = raw.trim().parse::<u64>().with_context(|| {
                format!("OPERATION_TIMEOUT must be a number of seconds, got '{}'", raw)
            })?;
            config.operation_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Remote destination in `user@host` form
    pub fn destination(&self) -> String {
        format!("{}@{}", self.ssh_user, self.ssh_host)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ssh_user.trim().is_empty() {
            anyhow::bail!("ssh_user cannot be empty");
        }

        if self.ssh_host.trim().is_empty() {
            anyhow::bail!("ssh_host cannot be empty");
        }

        if self.start_script_path.trim().is_empty() {
            anyhow::bail!("start_script_path cannot be empty");
        }

        if self.stop_script_path.trim().is_empty() {
            anyhow::bail!("stop_script_path cannot be empty");
        }

        if self.ssh_binary.trim().is_empty() {
            anyhow::bail!("ssh_binary cannot be empty");
        }

        if self.operation_timeout.is_some_and(|t| t.is_zero()) {
            anyhow::bail!("operation_timeout must be greater than 0");
        }

        Ok(())
    }
}

fn collect_dotenv(
    vars: impl Iterator<Item = dotenv::Result<(String, String)>>,
) -> dotenv::Result<HashMap<String, String>> {
    vars.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("SSH_USER", "pi"),
        ("SSH_HOST", "garden.local"),
        ("SCRIPT_PATH", "/home/pi/controller.py"),
        ("STOP_SCRIPT_PATH", "/home/pi/stop_controller.py"),
    ];

    #[test]
    fn test_defaults_from_required_vars() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();

        assert_eq!(config.destination(), "pi@garden.local");
        assert_eq!(config.ssh_binary, "ssh");
        assert_eq!(config.remote_interpreter, "python3");
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert!(config.operation_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_required_var_fails() {
        let err = Config::from_lookup(lookup_from(&REQUIRED[..3])).unwrap_err();
        assert!(err.to_string().contains("STOP_SCRIPT_PATH"));
    }

    #[test]
    fn test_optional_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("SSH_OPTIONS", "-o BatchMode=yes  -p 2222"));
        vars.push(("OPERATION_TIMEOUT", "90"));
        vars.push(("LOG_DIR", "/var/log/valves"));

        let config = Config::from_lookup(lookup_from(&vars)).unwrap();
        assert_eq!(config.ssh_options, vec!["-o", "BatchMode=yes", "-p", "2222"]);
        assert_eq!(config.operation_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.log_dir, PathBuf::from("/var/log/valves"));
    }

    #[test]
    fn test_invalid_timeout() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("OPERATION_TIMEOUT", "soon"));
        assert!(Config::from_lookup(lookup_from(&vars)).is_err());

        let mut config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        config.operation_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_env_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "SSH_USER=valve-dotenv-user").unwrap();
        writeln!(file, "SSH_HOST=valve-dotenv-host.local").unwrap();
        writeln!(file, "SCRIPT_PATH=/opt/valves/controller.py").unwrap();
        writeln!(file, "STOP_SCRIPT_PATH=/opt/valves/stop_controller.py").unwrap();
        writeln!(file, "OPERATION_TIMEOUT=45").unwrap();

        let config = Config::from_env_file(file.path()).unwrap();
        assert_eq!(config.destination(), "valve-dotenv-user@valve-dotenv-host.local");
        assert_eq!(config.start_script_path, "/opt/valves/controller.py");
        assert_eq!(config.operation_timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_missing_env_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::from_env_file(&dir.path().join("absent.env")).is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::new("pi", "garden.local", "/a.py", "/b.py");
        assert!(config.validate().is_ok());

        config.ssh_host = String::new();
        assert!(config.validate().is_err());
    }
}
