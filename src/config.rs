use crate::error::{Result, YasspError};
use crate::panel::PanelFlavor;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use url::Url;

/// Agent configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Panel connection
    pub panel: PanelConfig,
    /// Sync thresholds and periods
    pub sync: SyncConfig,
    /// Shadowsocks manager connection
    pub manager: ManagerConfig,
    /// Push listener
    pub push: PushConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Base URL every request path is joined onto
    pub url: Url,
    /// Panel flavor (nico, moyu)
    pub flavor: PanelFlavor,
    /// Basic-auth user name (moyu)
    pub hostname: String,
    /// Shared secret
    pub psk: String,
    /// Timeout applied to every panel request
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Upload a port once its unsynced delta reaches this many bytes
    pub traffic_threshold: u64,
    /// Upload a port once its unsynced delta is older than this
    pub traffic_max_age: Duration,
    /// How often the ledger is evaluated
    pub traffic_check_period: Duration,
    /// How often profiles are pulled
    pub profile_refresh_period: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            traffic_threshold: 100 * 1024 * 1024, // 100 MiB
            traffic_max_age: Duration::from_secs(30 * 60),
            traffic_check_period: Duration::from_secs(30),
            profile_refresh_period: Duration::from_secs(60),
        }
    }
}

impl SyncConfig {
    /// Sleep between two traffic evaluations
    pub fn traffic_tick(&self) -> Duration {
        self.traffic_check_period.min(self.traffic_max_age)
    }
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Host written into every server descriptor
    pub bind_address: String,
    /// UDP address of the shadowsocks manager
    pub address: SocketAddr,
    /// How long to wait for a manager reply
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    pub enabled: bool,
    pub host: IpAddr,
    pub port: u16,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl PushConfig {
    /// Push listener bind address
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let flavor_raw = get_env_or("YASSP_TYPE", "nico");
        let flavor = PanelFlavor::from_str(&flavor_raw).ok_or_else(|| {
            YasspError::InvalidConfig(format!(
                "YASSP_TYPE \"{}\" is not \"nico\" or \"moyu\"",
                flavor_raw
            ))
        })?;

        let url = Url::parse(&require_env("YASSP_URL")?).map_err(|e| {
            YasspError::InvalidConfig(format!("YASSP_URL must be a valid URL: {}", e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(YasspError::InvalidConfig(
                "YASSP_URL must use http or https".into(),
            ));
        }

        let hostname = get_env_or("YASSP_HOSTNAME", "");
        if flavor == PanelFlavor::Moyu && hostname.is_empty() {
            return Err(YasspError::MissingEnvVar("YASSP_HOSTNAME".into()));
        }

        let push_enabled = parse_bool("PUSH_ENABLED", false)?;
        let push_token = get_env_or("PUSH_TOKEN", "");
        if push_enabled && push_token.is_empty() {
            return Err(YasspError::MissingEnvVar("PUSH_TOKEN".into()));
        }

        Ok(Config {
            panel: PanelConfig {
                url,
                flavor,
                hostname,
                psk: require_env("YASSP_PSK")?,
                request_timeout: parse_secs("YASSP_REQUEST_TIMEOUT", 10)?,
            },
            sync: SyncConfig {
                traffic_threshold: parse_nonzero("TRAFFIC_SYNC_THRESHOLD", 100 * 1024 * 1024)?,
                traffic_max_age: parse_secs("TRAFFIC_SYNC_TIMEOUT", 30 * 60)?,
                traffic_check_period: parse_secs("TRAFFIC_CHECK_PERIOD", 30)?,
                profile_refresh_period: parse_secs("PROFILE_REFRESH_PERIOD", 60)?,
            },
            manager: ManagerConfig {
                bind_address: get_env_or("SS_BIND_ADDRESS", "0.0.0.0"),
                address: get_env_or("SS_MANAGER_ADDRESS", "127.0.0.1:6001")
                    .parse()
                    .map_err(|_| {
                        YasspError::InvalidConfig(
                            "SS_MANAGER_ADDRESS must be a valid socket address".into(),
                        )
                    })?,
                timeout: parse_secs("SS_MANAGER_TIMEOUT", 5)?,
            },
            push: PushConfig {
                enabled: push_enabled,
                host: get_env_or("PUSH_HOST", "0.0.0.0").parse().map_err(|_| {
                    YasspError::InvalidConfig("PUSH_HOST must be an IP address".into())
                })?,
                port: get_env_or("PUSH_PORT", "8080").parse().map_err(|_| {
                    YasspError::InvalidConfig("PUSH_PORT must be a valid port number".into())
                })?,
                token: push_token,
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(YasspError::MissingEnvVar(key.to_string())),
    }
}

fn parse_nonzero(key: &str, default: u64) -> Result<u64> {
    match get_env_or(key, &default.to_string()).trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(YasspError::InvalidConfig(format!(
            "{} must be a positive integer",
            key
        ))),
        Ok(v) => Ok(v),
    }
}

fn parse_secs(key: &str, default: u64) -> Result<Duration> {
    parse_nonzero(key, default).map(Duration::from_secs)
}

fn parse_bool(key: &str, default: bool) -> Result<bool> {
    let raw = get_env_or(key, if default { "true" } else { "false" });
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(YasspError::InvalidConfig(format!(
            "{} must be a boolean",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const CONFIG_ENV_KEYS: &[&str] = &[
        "YASSP_URL",
        "YASSP_TYPE",
        "YASSP_HOSTNAME",
        "YASSP_PSK",
        "YASSP_REQUEST_TIMEOUT",
        "TRAFFIC_SYNC_THRESHOLD",
        "TRAFFIC_SYNC_TIMEOUT",
        "TRAFFIC_CHECK_PERIOD",
        "PROFILE_REFRESH_PERIOD",
        "SS_BIND_ADDRESS",
        "SS_MANAGER_ADDRESS",
        "SS_MANAGER_TIMEOUT",
        "PUSH_ENABLED",
        "PUSH_HOST",
        "PUSH_PORT",
        "PUSH_TOKEN",
        "LOG_LEVEL",
        "LOG_FORMAT",
    ];

    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(keys: &[&str]) -> Self {
            let saved = keys
                .iter()
                .map(|&key| {
                    let old = env::var(key).ok();
                    env::remove_var(key);
                    (key.to_string(), old)
                })
                .collect();

            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..) {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    fn set_required() {
        env::set_var("YASSP_URL", "https://panel.example/api/");
        env::set_var("YASSP_PSK", "s3cret");
    }

    #[test]
    fn test_config_from_env_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);
        set_required();

        let config = Config::from_env().unwrap();

        assert_eq!(config.panel.flavor, PanelFlavor::Nico);
        assert_eq!(config.panel.url.as_str(), "https://panel.example/api/");
        assert_eq!(config.panel.request_timeout, Duration::from_secs(10));
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.sync.traffic_threshold, 104_857_600);
        assert_eq!(config.manager.bind_address, "0.0.0.0");
        assert_eq!(
            config.manager.address,
            "127.0.0.1:6001".parse::<SocketAddr>().unwrap()
        );
        assert!(!config.push.enabled);
        assert_eq!(config.push.addr(), "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log.format, "pretty");
    }

    #[test]
    fn test_config_from_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);
        set_required();

        env::set_var("YASSP_TYPE", "moyu");
        env::set_var("YASSP_HOSTNAME", "node-1");
        env::set_var("TRAFFIC_SYNC_THRESHOLD", "1024");
        env::set_var("TRAFFIC_SYNC_TIMEOUT", "20");
        env::set_var("TRAFFIC_CHECK_PERIOD", "45");
        env::set_var("PUSH_ENABLED", "true");
        env::set_var("PUSH_TOKEN", "push-me");
        env::set_var("PUSH_PORT", "9090");

        let config = Config::from_env().unwrap();

        assert_eq!(config.panel.flavor, PanelFlavor::Moyu);
        assert_eq!(config.panel.hostname, "node-1");
        assert_eq!(config.sync.traffic_threshold, 1024);
        assert_eq!(config.sync.traffic_max_age, Duration::from_secs(20));
        // The tick never sleeps past the max age
        assert_eq!(config.sync.traffic_tick(), Duration::from_secs(20));
        assert!(config.push.enabled);
        assert_eq!(config.push.port, 9090);
        assert_eq!(config.push.token, "push-me");
    }

    #[test]
    fn test_config_requires_url_and_psk() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, YasspError::MissingEnvVar(ref k) if k == "YASSP_URL"));

        env::set_var("YASSP_URL", "https://panel.example/");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, YasspError::MissingEnvVar(ref k) if k == "YASSP_PSK"));
    }

    #[test]
    fn test_config_rejects_unknown_flavor() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);
        set_required();

        env::set_var("YASSP_TYPE", "sspanel");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, YasspError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_moyu_requires_hostname() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);
        set_required();

        env::set_var("YASSP_TYPE", "moyu");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, YasspError::MissingEnvVar(ref k) if k == "YASSP_HOSTNAME"));
    }

    #[test]
    fn test_config_rejects_zero_periods() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);
        set_required();

        env::set_var("TRAFFIC_CHECK_PERIOD", "0");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, YasspError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_push_requires_token() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);
        set_required();

        env::set_var("PUSH_ENABLED", "yes");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, YasspError::MissingEnvVar(ref k) if k == "PUSH_TOKEN"));
    }

    #[test]
    fn test_config_invalid_manager_address() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);
        set_required();

        env::set_var("SS_MANAGER_ADDRESS", "localhost");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, YasspError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_push_host_must_be_ip() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);
        set_required();

        env::set_var("PUSH_HOST", "localhost");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, YasspError::InvalidConfig(ref m) if m.contains("PUSH_HOST")));

        env::set_var("PUSH_HOST", "::1");
        env::set_var("PUSH_PORT", "9090");
        let config = Config::from_env().unwrap();
        assert_eq!(config.push.addr(), "[::1]:9090".parse::<SocketAddr>().unwrap());
    }
}
