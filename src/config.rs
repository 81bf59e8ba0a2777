use std::path::{Path, PathBuf};

use facet::Facet;

use crate::error::GateError;
use crate::paths;
use crate::whitelist::Whitelist;

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct Config {
    #[facet(default)]
    pub proxmox: ProxmoxConfig,
    #[facet(default)]
    pub access: AccessConfig,
    #[facet(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct ProxmoxConfig {
    /// API base, e.g. `https://pve.lan:8006/api2/json`
    #[facet(default)]
    pub url: String,
    /// Full token id, `user@realm!tokenname`
    #[facet(default)]
    pub token_id: String,
    #[facet(default)]
    pub secret: String,
    #[facet(default)]
    pub node: String,
    /// Skip TLS certificate validation. Proxmox ships a self-signed
    /// certificate, so this is on unless explicitly disabled.
    #[facet(default = true)]
    pub accept_invalid_certs: bool,
    #[facet(default = 30)]
    pub timeout_s: u64,
}

impl Default for ProxmoxConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token_id: String::new(),
            secret: String::new(),
            node: String::new(),
            accept_invalid_certs: true,
            timeout_s: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct AccessConfig {
    /// Comma-separated VM ids, e.g. `"100,101"`.
    #[facet(default)]
    pub allowed_vms: String,
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct LoggingConfig {
    #[facet(default)]
    pub to_file: bool,
    /// Setting a path also turns file logging on. With `to_file` alone
    /// the log goes to `paths::default_log_path()`.
    #[facet(default)]
    pub file: String,
}

// ── Settings ──────────────────────────────────────────────

/// Validated runtime settings built from the config file plus environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// The file the settings were read from, if any.
    pub config_path: Option<PathBuf>,
    pub proxmox: ProxmoxConfig,
    pub whitelist: Whitelist,
    pub log_file: Option<PathBuf>,
}

// ── environment ───────────────────────────────────────────

/// Environment variables that override config file values.
pub const ENV_URL: &str = "PROXMOX_URL";
pub const ENV_TOKEN_ID: &str = "PROXMOX_TOKEN_ID";
pub const ENV_SECRET: &str = "PROXMOX_SECRET";
pub const ENV_NODE: &str = "PROXMOX_NODE";
pub const ENV_ALLOWED_VMS: &str = "ALLOWED_VMS";

/// Overlay environment values onto `config`. `lookup` is `std::env::var`
/// in production; tests pass a map.
pub fn apply_env(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let targets: [(&str, &mut String); 5] = [
        (ENV_URL, &mut config.proxmox.url),
        (ENV_TOKEN_ID, &mut config.proxmox.token_id),
        (ENV_SECRET, &mut config.proxmox.secret),
        (ENV_NODE, &mut config.proxmox.node),
        (ENV_ALLOWED_VMS, &mut config.access.allowed_vms),
    ];
    for (key, slot) in targets {
        if let Some(value) = lookup(key) {
            tracing::debug!(key, "config value taken from environment");
            *slot = value;
        }
    }
}

// ── validation ────────────────────────────────────────────

fn validate_proxmox(p: &ProxmoxConfig) -> Result<(), GateError> {
    let required = [
        ("proxmox.url", &p.url, ENV_URL),
        ("proxmox.token_id", &p.token_id, ENV_TOKEN_ID),
        ("proxmox.secret", &p.secret, ENV_SECRET),
        ("proxmox.node", &p.node, ENV_NODE),
    ];
    for (field, value, env) in required {
        if value.trim().is_empty() {
            return Err(GateError::Validation {
                message: format!("{field} must be set (or provide {env})"),
            });
        }
    }

    if !p.url.starts_with("https://") && !p.url.starts_with("http://") {
        return Err(GateError::Validation {
            message: format!("proxmox.url must be an http(s) URL (got '{}')", p.url),
        });
    }

    if p.node.contains('/') {
        return Err(GateError::Validation {
            message: format!("proxmox.node must be a bare node name (got '{}')", p.node),
        });
    }

    if p.timeout_s < 1 {
        return Err(GateError::Validation {
            message: "proxmox.timeout_s must be at least 1".into(),
        });
    }

    Ok(())
}

/// Validate a parsed config and turn it into runtime settings.
pub fn resolve(config: Config, config_path: Option<PathBuf>) -> Result<Settings, GateError> {
    validate_proxmox(&config.proxmox)?;
    let whitelist = Whitelist::parse(&config.access.allowed_vms)?;

    let log_file = if !config.logging.file.is_empty() {
        Some(PathBuf::from(&config.logging.file))
    } else if config.logging.to_file {
        Some(paths::default_log_path())
    } else {
        None
    };

    let mut proxmox = config.proxmox;
    proxmox.url = proxmox.url.trim_end_matches('/').to_string();

    Ok(Settings {
        config_path,
        proxmox,
        whitelist,
        log_file,
    })
}

fn dotenv_error(e: dotenvy::Error) -> GateError {
    match e {
        dotenvy::Error::Io(source) => GateError::ConfigLoad {
            path: ".env".into(),
            source,
        },
        other => GateError::ConfigParse {
            path: ".env".into(),
            message: other.to_string(),
        },
    }
}

// ── public API ────────────────────────────────────────────

pub fn parse_config(contents: &str, path: &Path) -> Result<Config, GateError> {
    facet_toml::from_str(contents).map_err(|e| GateError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Load settings from `explicit` (which must exist) or the first config
/// file found by `paths::find_config`, then apply `.env` and environment
/// overrides.
///
/// Any error here is fatal to the process: a malformed whitelist must never
/// silently widen or narrow what the bot may touch.
pub fn load_config(explicit: Option<&Path>) -> Result<Settings, GateError> {
    // A missing .env is normal; variables may come from the service manager.
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => return Err(dotenv_error(e)),
    }

    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let cwd = std::env::current_dir().map_err(|source| GateError::Io {
                context: "reading working directory".into(),
                source,
            })?;
            paths::find_config(&cwd)
        }
    };

    let mut config = match &path {
        Some(p) => {
            let contents = std::fs::read_to_string(p).map_err(|source| GateError::ConfigLoad {
                path: p.display().to_string(),
                source,
            })?;
            parse_config(&contents, p)?
        }
        None => {
            tracing::debug!("no config file found, using defaults and environment");
            Config::default()
        }
    };

    apply_env(&mut config, |key| std::env::var(key).ok());
    resolve(config, path)
}

#[cfg(test)]
pub mod tests {
    use std::collections::HashMap;

    use super::*;

    fn valid_config() -> Config {
        Config {
            proxmox: ProxmoxConfig {
                url: "https://pve.example.lan:8006/api2/json".into(),
                token_id: "bot@pve!chat".into(),
                secret: "s3cret".into(),
                node: "pve".into(),
                ..ProxmoxConfig::default()
            },
            access: AccessConfig {
                allowed_vms: "100,101".into(),
            },
            logging: LoggingConfig::default(),
        }
    }

    /// Settings pointing at `url` with the given whitelist, for tests.
    pub fn test_settings(url: &str, allowed: &str) -> Settings {
        let mut config = valid_config();
        config.proxmox.url = url.into();
        config.access.allowed_vms = allowed.into();
        resolve(config, None).unwrap()
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[proxmox]
url = "https://pve.lan:8006/api2/json"
token_id = "bot@pve!chat"
secret = "abc"
node = "pve1"
accept_invalid_certs = false
timeout_s = 10

[access]
allowed_vms = "100, 101"

[logging]
to_file = true
file = "/var/log/proxgate.log"
"#;
        let config = parse_config(toml, Path::new("proxgate.toml")).unwrap();
        assert_eq!(config.proxmox.node, "pve1");
        assert!(!config.proxmox.accept_invalid_certs);
        assert_eq!(config.proxmox.timeout_s, 10);

        let settings = resolve(config, None).unwrap();
        assert_eq!(settings.whitelist.iter().collect::<Vec<_>>(), vec![100, 101]);
        assert_eq!(settings.log_file, Some(PathBuf::from("/var/log/proxgate.log")));
    }

    #[test]
    fn parse_defaults_when_sections_missing() {
        let config = parse_config("", Path::new("proxgate.toml")).unwrap();
        assert!(config.proxmox.accept_invalid_certs);
        assert_eq!(config.proxmox.timeout_s, 30);
        assert!(config.access.allowed_vms.is_empty());
        assert!(!config.logging.to_file);
    }

    #[test]
    fn parse_error_names_the_file() {
        let err = parse_config("[proxmox\nurl =", Path::new("/etc/proxgate.toml")).unwrap_err();
        assert!(err.to_string().contains("/etc/proxgate.toml"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = valid_config();
        let env: HashMap<&str, &str> = [(ENV_NODE, "pve2"), (ENV_ALLOWED_VMS, "200")].into();
        apply_env(&mut config, |k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.proxmox.node, "pve2");
        assert_eq!(config.access.allowed_vms, "200");
        assert_eq!(config.proxmox.token_id, "bot@pve!chat");
    }

    #[test]
    fn missing_secret_rejected() {
        let mut config = valid_config();
        config.proxmox.secret.clear();
        let err = resolve(config, None).unwrap_err();
        assert!(err.to_string().contains("proxmox.secret must be set"));
    }

    #[test]
    fn non_http_url_rejected() {
        let mut config = valid_config();
        config.proxmox.url = "pve.lan:8006".into();
        assert!(matches!(
            resolve(config, None),
            Err(GateError::Validation { .. })
        ));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = valid_config();
        config.proxmox.timeout_s = 0;
        assert!(resolve(config, None).is_err());
    }

    #[test]
    fn malformed_whitelist_is_fatal() {
        let mut config = valid_config();
        config.access.allowed_vms = "100,abc".into();
        assert!(matches!(
            resolve(config, None),
            Err(GateError::InvalidWhitelistEntry { .. })
        ));
    }

    #[test]
    fn trailing_slash_trimmed_from_url() {
        let settings = test_settings("https://pve.lan:8006/api2/json/", "100");
        assert_eq!(settings.proxmox.url, "https://pve.lan:8006/api2/json");
    }

    #[test]
    fn to_file_without_path_uses_default_log() {
        let mut config = valid_config();
        config.logging.to_file = true;
        let settings = resolve(config, None).unwrap();
        assert_eq!(settings.log_file, Some(paths::default_log_path()));
    }

    #[test]
    fn log_path_alone_enables_file_logging() {
        let toml = r#"
[logging]
file = "/var/log/proxgate.log"
"#;
        let mut config = parse_config(toml, Path::new("proxgate.toml")).unwrap();
        assert!(!config.logging.to_file);
        config.proxmox = valid_config().proxmox;
        config.access = valid_config().access;

        let settings = resolve(config, None).unwrap();
        assert_eq!(settings.log_file, Some(PathBuf::from("/var/log/proxgate.log")));
    }

    #[test]
    fn no_log_file_by_default() {
        let settings = resolve(valid_config(), None).unwrap();
        assert_eq!(settings.log_file, None);
    }

    #[test]
    fn load_config_missing_explicit_file() {
        let err = load_config(Some(Path::new("/nonexistent/proxgate.toml"))).unwrap_err();
        assert!(matches!(err, GateError::ConfigLoad { .. }));
    }
}
