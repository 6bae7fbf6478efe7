#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::characteristics::resolver::Locale;
    use crate::config::{self, AppConfig};

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.database.url, "sqlite://data/protez-admin.db");
        assert!(cfg.cache.enabled);
        assert_eq!(cfg.gate.db_permits, 2);
        assert_eq!(cfg.display.locale, Locale::Ru);
        assert_eq!(cfg.catalog.protected_group, "Общие параметры");
        assert_eq!(cfg.catalog.delete_preview_len, 5);
        assert_eq!(cfg.catalog.max_hierarchy_depth, 10);
        assert_eq!(cfg.export.max_rows, 25000);
        assert!(config::validate(&cfg).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        assert!(config::validate(&cfg).unwrap_err().to_string().contains("server.port"));

        let mut cfg = AppConfig::default();
        cfg.gate.db_permits = 65;
        assert!(config::validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.catalog.protected_group = "  ".to_string();
        assert!(config::validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.catalog.delete_sample_len = 2;
        assert!(config::validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.catalog.max_hierarchy_depth = 0;
        assert!(config::validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.export.max_rows = 0;
        assert!(config::validate(&cfg).is_err());
    }

    #[test]
    fn test_disabled_cache_skips_cache_checks() {
        let mut cfg = AppConfig::default();
        cfg.cache.enabled = false;
        cfg.cache.ttl_secs = 0;
        cfg.cache.max_entries = 0;
        assert!(config::validate(&cfg).is_ok());

        cfg.cache.enabled = true;
        assert!(config::validate(&cfg).is_err());
    }

    #[test]
    fn test_custom_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[display]\nlocale = \"en\"\n").unwrap();
        writeln!(file, "[catalog]\nprotected_group = \"Common\"").unwrap();

        std::env::set_var("PROTEZ_ADMIN_CONFIG", file.path());
        let loaded = config::load();
        std::env::remove_var("PROTEZ_ADMIN_CONFIG");

        let cfg = loaded.unwrap();
        assert_eq!(cfg.display.locale, Locale::En);
        assert_eq!(cfg.catalog.protected_group, "Common");
        // untouched keys keep their defaults
        assert_eq!(cfg.catalog.delete_preview_len, 5);
    }

    #[test]
    fn test_sqlite_parent_dir_created() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("admin.db");
        config::ensure_sqlite_parent_dir(&format!("sqlite://{}", db.display())).unwrap();
        assert!(dir.path().join("nested").is_dir());
        // non-file URLs are left alone
        assert!(config::ensure_sqlite_parent_dir("sqlite::memory:").is_ok());
    }
}
