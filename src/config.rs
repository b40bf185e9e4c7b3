use anyhow::bail;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Longest session lifetime accepted from config (one year).
pub const MAX_SESSION_HOURS: u64 = 24 * 366;

#[derive(Parser, Debug)]
#[command(name = "forum", about = "A small community forum backend")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    /// How long a writer waits on the store lock before failing.
    pub busy_timeout_ms: u64,
    pub max_connections: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    /// Where anonymous visitors are sent when a page needs a session.
    pub login_path: String,
    /// Where signed-in visitors are sent from the login and signup pages.
    pub landing_path: String,
    pub bcrypt_cost: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
            max_connections: 8,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session_token".to_string(),
            session_hours: 24,
            login_path: "/login".to_string(),
            landing_path: "/".to_string(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("forum.db"));
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would overflow session expiry math or that bcrypt
    /// refuses.
    pub fn validate(&self) -> anyhow::Result<()> {
        let hours = self.auth.session_hours;
        if hours == 0 || hours > MAX_SESSION_HOURS {
            bail!(
                "auth.session_hours must be between 1 and {}, got {}",
                MAX_SESSION_HOURS,
                hours
            );
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            bail!(
                "auth.bcrypt_cost must be between 4 and 31, got {}",
                self.auth.bcrypt_cost
            );
        }
        Ok(())
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".forum")
        })
    }

    /// Database file path. Falls back to `forum.db` in the working directory
    /// for configs that were not produced by [`Config::load`].
    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("forum.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with_dir(dir: PathBuf) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(dir),
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.auth.cookie_name, "session_token");
        assert_eq!(config.auth.session_hours, 24);
        assert_eq!(config.auth.login_path, "/login");
        assert_eq!(config.auth.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_with_dir(PathBuf::from("/tmp/test-forum"));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-forum"));
    }

    #[test]
    fn data_dir_defaults_to_dot_forum() {
        let cli = Cli {
            config: None,
            host: None,
            port: None,
            data_dir: None,
        };
        assert!(Config::data_dir(&cli).ends_with(".forum"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_with_dir(tmp.path().to_path_buf())).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.db_path(), tmp.path().join("forum.db"));
    }

    #[test]
    fn load_reads_toml_file_and_cli_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000

[database]
busy_timeout_ms = 250

[auth]
session_hours = 2
landing_path = "/post"
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: None,
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert_eq!(config.auth.session_hours, 2);
        assert_eq!(config.auth.landing_path, "/post");
        assert_eq!(config.auth.cookie_name, "session_token");
    }

    fn load_with_auth(tmp: &tempfile::TempDir, auth: &str) -> anyhow::Result<Config> {
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, format!("[auth]\n{}\n", auth)).unwrap();
        let cli = Cli {
            config: Some(config_path),
            host: None,
            port: None,
            data_dir: Some(tmp.path().to_path_buf()),
        };
        Config::load(&cli)
    }

    #[test]
    fn load_rejects_out_of_range_session_hours() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_with_auth(&tmp, "session_hours = 0").is_err());

        let err = load_with_auth(&tmp, "session_hours = 100000000").unwrap_err();
        assert!(err.to_string().contains("session_hours"), "{}", err);

        let ok = load_with_auth(&tmp, &format!("session_hours = {}", MAX_SESSION_HOURS)).unwrap();
        assert_eq!(ok.auth.session_hours, MAX_SESSION_HOURS);
    }

    #[test]
    fn load_rejects_out_of_range_bcrypt_cost() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(load_with_auth(&tmp, "bcrypt_cost = 3").is_err());
        assert!(load_with_auth(&tmp, "bcrypt_cost = 32").is_err());
        assert_eq!(load_with_auth(&tmp, "bcrypt_cost = 4").unwrap().auth.bcrypt_cost, 4);
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(Config::default().validate().is_ok());
    }
}
