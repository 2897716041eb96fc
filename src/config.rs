use clap::{Parser, ValueEnum};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;

/// Config file read when neither `--config` nor `CONFIG_FILE` is given.
const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Support number shown when a result needs manual help.
pub const DEFAULT_SUPPORT_PHONE: &str = "+359 88 000 0000";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Where fitment data comes from
    #[arg(long, env = "CATALOG_SOURCE", value_enum)]
    pub catalog_source: Option<CatalogSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CatalogSource {
    Postgres,
    Http,
    Memory,
}

impl CatalogSource {
    fn as_str(self) -> &'static str {
        match self {
            CatalogSource::Postgres => "postgres",
            CatalogSource::Http => "http",
            CatalogSource::Memory => "memory",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub links: LinksConfig,
    pub sessions: SessionsConfig,
    pub support: SupportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub source: CatalogSource,
    /// Remote catalog root, for `source = http`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// YAML rows, for `source = memory`.
    #[serde(default)]
    pub fixture_path: Option<String>,
    pub http_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LinksConfig {
    /// Extra `part: url` entries merged over the built-in table.
    #[serde(default)]
    pub table_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionsConfig {
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SupportConfig {
    pub phone: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("database.max_connections", 5)?
            .set_default("database.run_migrations", false)?
            .set_default("catalog.source", "postgres")?
            .set_default("catalog.http_timeout_secs", 10)?
            .set_default("sessions.idle_timeout_secs", 30 * 60)?
            .set_default("support.phone", DEFAULT_SUPPORT_PHONE)?;

        // An explicit path must exist; the default one is optional.
        builder = match &cli.config {
            Some(path) => builder.add_source(File::new(path, format_for(path))),
            None => builder.add_source(
                File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false),
            ),
        };

        // FITMENT_SERVER__PORT=8000, FITMENT_CATALOG__SOURCE=memory, ...
        builder = builder.add_source(
            Environment::with_prefix("FITMENT")
                .separator("__")
                .try_parsing(true),
        );

        // Bare DATABASE_URL only fills in when no other source sets the URL.
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                builder = builder.set_default("database.url", url)?;
            }
        }

        // CLI flags (and their env fallbacks) take priority over everything.
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(source) = cli.catalog_source {
            builder = builder.set_override("catalog.source", source.as_str())?;
        }

        let cfg = builder.build()?;
        let config: AppConfig = cfg.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that cannot start a catalog.
    fn validate(&self) -> Result<(), config::ConfigError> {
        let missing = match self.catalog.source {
            CatalogSource::Postgres if self.database.url.is_none() => Some("database.url"),
            CatalogSource::Http if self.catalog.base_url.is_none() => Some("catalog.base_url"),
            CatalogSource::Memory if self.catalog.fixture_path.is_none() => {
                Some("catalog.fixture_path")
            }
            _ => None,
        };
        match missing {
            Some(key) => Err(config::ConfigError::Message(format!(
                "catalog source '{}' requires {key}",
                self.catalog.source.as_str()
            ))),
            None => Ok(()),
        }
    }
}

fn format_for(path: &str) -> FileFormat {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("toml") => FileFormat::Toml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Yaml,
    }
}
