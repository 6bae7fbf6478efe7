use std::path::Path;

use serde::Deserialize;

use crate::characteristics::resolver::Locale;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    pub db_permits: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    pub locale: Locale,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Group name that can never be deleted, forced or not.
    pub protected_group: String,
    pub delete_preview_len: usize,
    pub delete_sample_len: usize,
    pub max_hierarchy_depth: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    pub max_rows: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub gate: GateConfig,
    pub display: DisplayConfig,
    pub catalog: CatalogConfig,
    pub export: ExportConfig,
    pub security: Option<SecurityConfig>,
}

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: protez-admin.toml (in CWD)
        .add_source(::config::File::with_name("protez-admin").required(false));

    if let Ok(custom_path) = std::env::var("PROTEZ_ADMIN_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder =
        builder.add_source(::config::Environment::with_prefix("PROTEZ_ADMIN").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!(
            "Using privileged port {} - may require elevated permissions",
            cfg.server.port
        );
    }

    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }

    if cfg.cache.enabled {
        if cfg.cache.ttl_secs == 0 {
            return Err(anyhow::anyhow!("cache.ttl_secs must be > 0 when the cache is enabled"));
        }
        if cfg.cache.max_entries == 0 {
            return Err(anyhow::anyhow!("cache.max_entries must be > 0 when the cache is enabled"));
        }
    }

    if cfg.gate.db_permits == 0 || cfg.gate.db_permits > 64 {
        return Err(anyhow::anyhow!("gate.db_permits must be in 1..=64"));
    }

    if cfg.catalog.protected_group.trim().is_empty() {
        return Err(anyhow::anyhow!("catalog.protected_group must not be empty"));
    }
    if cfg.catalog.delete_preview_len == 0 {
        return Err(anyhow::anyhow!("catalog.delete_preview_len must be > 0"));
    }
    if cfg.catalog.delete_sample_len < cfg.catalog.delete_preview_len {
        return Err(anyhow::anyhow!("catalog.delete_sample_len must be >= delete_preview_len"));
    }
    if cfg.catalog.max_hierarchy_depth == 0 || cfg.catalog.max_hierarchy_depth > 64 {
        return Err(anyhow::anyhow!("catalog.max_hierarchy_depth must be in 1..=64"));
    }

    if cfg.export.max_rows <= 0 {
        return Err(anyhow::anyhow!("export.max_rows must be > 0"));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
