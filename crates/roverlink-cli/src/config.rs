//! Server configuration – reads/writes `~/.roverlink/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use roverlink_gateway::{DEFAULT_HTTP_PORT, DEFAULT_REALTIME_PORT};
use roverlink_state::DEFAULT_CAPACITY;

/// Persisted server configuration stored in `~/.roverlink/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Interface both listeners bind to.
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Port of the HTTP API.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Port of the real-time WebSocket channel.
    #[serde(default = "default_realtime_port")]
    pub realtime_port: u16,

    /// Number of telemetry records retained in memory.
    #[serde(default = "default_telemetry_capacity")]
    pub telemetry_capacity: usize,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}
fn default_realtime_port() -> u16 {
    DEFAULT_REALTIME_PORT
}
fn default_telemetry_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            http_port: default_http_port(),
            realtime_port: default_realtime_port(),
            telemetry_capacity: default_telemetry_capacity(),
        }
    }
}

impl Config {
    /// Socket address of the HTTP API.
    pub fn http_addr(&self) -> Result<SocketAddr, String> {
        self.socket_addr(self.http_port)
    }

    /// Socket address of the real-time channel.
    pub fn realtime_addr(&self) -> Result<SocketAddr, String> {
        self.socket_addr(self.realtime_port)
    }

    fn socket_addr(&self, port: u16) -> Result<SocketAddr, String> {
        let ip: IpAddr = self
            .bind_host
            .parse()
            .map_err(|e| format!("Invalid bind_host {:?}: {}", self.bind_host, e))?;
        Ok(SocketAddr::new(ip, port))
    }
}

/// Return the path to `~/.roverlink/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".roverlink").join("config.toml")
}

/// Load the effective configuration: the config file (or defaults when it
/// does not exist) with `ROVERLINK_*` environment overrides applied.
pub fn load() -> Result<Config, String> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `ROVERLINK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROVERLINK_BIND_HOST` | `bind_host` |
/// | `ROVERLINK_HTTP_PORT` | `http_port` |
/// | `ROVERLINK_REALTIME_PORT` | `realtime_port` |
/// | `ROVERLINK_TELEMETRY_CAPACITY` | `telemetry_capacity` |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary key lookup, so tests need not mutate
/// the process environment.
pub(crate) fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("ROVERLINK_BIND_HOST")
        && !v.trim().is_empty()
    {
        cfg.bind_host = v.trim().to_string();
    }
    if let Some(v) = lookup("ROVERLINK_HTTP_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.http_port = port;
    }
    if let Some(v) = lookup("ROVERLINK_REALTIME_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.realtime_port = port;
    }
    if let Some(v) = lookup("ROVERLINK_TELEMETRY_CAPACITY")
        && let Ok(capacity) = v.parse::<usize>()
        && capacity > 0
    {
        cfg.telemetry_capacity = capacity;
    }
}

/// Save the config to disk, creating `~/.roverlink/` if necessary.
pub fn save(cfg: &Config) -> Result<PathBuf, String> {
    let path = config_path();
    save_to(cfg, &path)?;
    Ok(path)
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner-only directory (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_ports() {
        let cfg = Config::default();
        assert_eq!(cfg.bind_host, "0.0.0.0");
        assert_eq!(cfg.http_port, 5000);
        assert_eq!(cfg.realtime_port, 5001);
        assert_eq!(cfg.telemetry_capacity, 1000);
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");

        let dir_meta = std::fs::metadata(path.parent().unwrap()).expect("dir metadata");
        assert_eq!(dir_meta.permissions().mode() & 0o777, 0o700);
    }

    #[test]
    fn roundtrip_custom_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config {
            bind_host: "127.0.0.1".to_string(),
            http_port: 8000,
            realtime_port: 8001,
            telemetry_capacity: 250,
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "http_port = 9000\n").expect("write");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.http_port, 9000);
        assert_eq!(loaded.realtime_port, 5001);
        assert_eq!(loaded.telemetry_capacity, 1000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "http_port = \"not a number\"\n").expect("write");

        let err = load_from(&path).unwrap_err();
        assert!(err.contains("Failed to parse config"));
    }

    #[test]
    fn config_path_points_to_roverlink_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".roverlink"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn overrides_replace_every_field() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            lookup_from(&[
                ("ROVERLINK_BIND_HOST", "127.0.0.1"),
                ("ROVERLINK_HTTP_PORT", "8080"),
                ("ROVERLINK_REALTIME_PORT", "8081"),
                ("ROVERLINK_TELEMETRY_CAPACITY", "10"),
            ]),
        );
        assert_eq!(cfg.bind_host, "127.0.0.1");
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.realtime_port, 8081);
        assert_eq!(cfg.telemetry_capacity, 10);
    }

    #[test]
    fn overrides_ignore_invalid_values() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            lookup_from(&[
                ("ROVERLINK_HTTP_PORT", "not-a-port"),
                ("ROVERLINK_REALTIME_PORT", "70000"),
                ("ROVERLINK_TELEMETRY_CAPACITY", "0"),
                ("ROVERLINK_BIND_HOST", "  "),
            ]),
        );
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn socket_addrs_combine_host_and_ports() {
        let cfg = Config::default();
        assert_eq!(cfg.http_addr().unwrap().to_string(), "0.0.0.0:5000");
        assert_eq!(cfg.realtime_addr().unwrap().to_string(), "0.0.0.0:5001");
    }

    #[test]
    fn invalid_bind_host_is_reported() {
        let cfg = Config {
            bind_host: "not-an-ip".to_string(),
            ..Config::default()
        };
        assert!(cfg.http_addr().unwrap_err().contains("not-an-ip"));
    }
}
