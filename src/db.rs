use sqlx::{Row, SqlitePool};

use crate::error::{AppError, AppResult};

/// Every table the admin backend reads or writes, in creation order.
const TABLES: &[(&str, &str)] = &[
    (
        "product_categories",
        r#"CREATE TABLE IF NOT EXISTS product_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NULL,
            parent_id INTEGER NULL REFERENCES product_categories(id),
            type TEXT NOT NULL DEFAULT 'product',
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "manufacturers",
        r#"CREATE TABLE IF NOT EXISTS manufacturers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            country TEXT NULL,
            description TEXT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "model_series",
        r#"CREATE TABLE IF NOT EXISTS model_series (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NULL,
            manufacturer_id INTEGER NOT NULL REFERENCES manufacturers(id),
            category_id INTEGER NULL REFERENCES product_categories(id),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "products",
        r#"CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NULL,
            sku TEXT NULL UNIQUE,
            price REAL NULL,
            category_id INTEGER NULL REFERENCES product_categories(id),
            manufacturer_id INTEGER NULL REFERENCES manufacturers(id),
            model_line_id INTEGER NULL REFERENCES model_series(id),
            in_stock INTEGER NOT NULL DEFAULT 1,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "product_sizes",
        r#"CREATE TABLE IF NOT EXISTS product_sizes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            size_name TEXT NOT NULL,
            size_value TEXT NULL,
            sku TEXT NULL,
            price REAL NULL,
            stock_quantity INTEGER NULL,
            weight REAL NULL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_available INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "product_variants",
        r#"CREATE TABLE IF NOT EXISTS product_variants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES products(id),
            variant_sku TEXT NOT NULL UNIQUE,
            variant_name TEXT NOT NULL,
            price_modifier REAL NOT NULL DEFAULT 0,
            stock_quantity INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "characteristic_units",
        r#"CREATE TABLE IF NOT EXISTS characteristic_units (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL
        )"#,
    ),
    // Characteristic tables carry no ON DELETE CASCADE: deletion order is owned by
    // characteristics::cascade so a guarded delete can report what blocks it.
    (
        "characteristic_groups",
        r#"CREATE TABLE IF NOT EXISTS characteristic_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NULL,
            parent_id INTEGER NULL REFERENCES characteristic_groups(id),
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "characteristic_values",
        r#"CREATE TABLE IF NOT EXISTS characteristic_values (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id INTEGER NOT NULL REFERENCES characteristic_groups(id),
            value TEXT NOT NULL,
            display_name TEXT NULL,
            color_hex TEXT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "characteristic_templates",
        r#"CREATE TABLE IF NOT EXISTS characteristic_templates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id INTEGER NOT NULL REFERENCES characteristic_groups(id),
            name TEXT NOT NULL,
            description TEXT NULL,
            input_type TEXT NOT NULL DEFAULT 'text',
            unit_id INTEGER NULL REFERENCES characteristic_units(id),
            is_required INTEGER NOT NULL DEFAULT 0,
            sort_order INTEGER NOT NULL DEFAULT 0,
            validation_rules TEXT NOT NULL DEFAULT '{}',
            default_value TEXT NULL,
            placeholder_text TEXT NULL,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "product_characteristics",
        r#"CREATE TABLE IF NOT EXISTS product_characteristics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES products(id),
            group_id INTEGER NOT NULL REFERENCES characteristic_groups(id),
            template_id INTEGER NULL REFERENCES characteristic_templates(id),
            value_text TEXT NULL,
            value_numeric REAL NULL,
            value_color TEXT NULL,
            value_preset_id INTEGER NULL REFERENCES characteristic_values(id),
            label TEXT NULL,
            is_primary INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "media_files",
        r#"CREATE TABLE IF NOT EXISTS media_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NULL REFERENCES products(id) ON DELETE SET NULL,
            file_name TEXT NOT NULL,
            url TEXT NOT NULL UNIQUE,
            mime_type TEXT NULL,
            size_bytes INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "orders",
        r#"CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_name TEXT NOT NULL,
            customer_phone TEXT NULL,
            customer_email TEXT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            notes TEXT NULL,
            total_amount REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "order_items",
        r#"CREATE TABLE IF NOT EXISTS order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
            product_id INTEGER NULL REFERENCES products(id) ON DELETE SET NULL,
            product_name TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 1,
            price REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "site_settings",
        r#"CREATE TABLE IF NOT EXISTS site_settings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            site_name TEXT NOT NULL,
            site_description TEXT NULL,
            hero_title TEXT NULL,
            hero_subtitle TEXT NULL,
            contact_email TEXT NULL,
            contact_phone TEXT NULL,
            address TEXT NULL,
            social_media TEXT NOT NULL DEFAULT '{}',
            additional_contacts TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    (
        "warehouse_settings",
        r#"CREATE TABLE IF NOT EXISTS warehouse_settings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            setting_key TEXT NOT NULL UNIQUE,
            setting_value TEXT NULL,
            data_type TEXT NOT NULL DEFAULT 'string',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
    // entity_id is not a foreign key: it points into one of several tables by entity_type
    (
        "catalog_menu_settings",
        r#"CREATE TABLE IF NOT EXISTS catalog_menu_settings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_type TEXT NOT NULL,
            entity_id INTEGER NOT NULL,
            name TEXT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            is_visible INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            UNIQUE (entity_type, entity_id)
        )"#,
    ),
    (
        "catalog_files",
        r#"CREATE TABLE IF NOT EXISTS catalog_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NULL,
            file_url TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_size INTEGER NULL,
            file_type TEXT NULL,
            year INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ','now'))
        )"#,
    ),
];

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    if let Err(e) = sqlx::query("PRAGMA journal_mode=WAL;").execute(pool).await {
        tracing::warn!("Failed to set WAL journal mode: {}", e);
    }
    if let Err(e) = sqlx::query("PRAGMA synchronous=NORMAL;").execute(pool).await {
        tracing::warn!("Failed to set synchronous mode: {}", e);
    }
    // Foreign keys are critical - fail if this doesn't work
    sqlx::query("PRAGMA foreign_keys=ON;").execute(pool).await?;
    if let Err(e) = sqlx::query("PRAGMA busy_timeout=10000;").execute(pool).await {
        tracing::warn!("Failed to set busy_timeout: {}", e);
    }

    for (name, ddl) in TABLES {
        sqlx::query(ddl).execute(pool).await.map_err(|e| {
            tracing::error!("Failed to create table {}: {}", name, e);
            anyhow::anyhow!("Schema initialization failed for {}: {}", name, e)
        })?;
    }

    let indexes = [
        (
            "idx_categories_parent",
            "CREATE INDEX IF NOT EXISTS idx_categories_parent ON product_categories(parent_id)",
        ),
        (
            "idx_groups_parent",
            "CREATE INDEX IF NOT EXISTS idx_groups_parent ON characteristic_groups(parent_id)",
        ),
        (
            "idx_values_group",
            "CREATE INDEX IF NOT EXISTS idx_values_group \
             ON characteristic_values(group_id, sort_order)",
        ),
        (
            "idx_templates_group",
            "CREATE INDEX IF NOT EXISTS idx_templates_group \
             ON characteristic_templates(group_id, sort_order)",
        ),
        (
            "idx_pc_product",
            "CREATE INDEX IF NOT EXISTS idx_pc_product ON product_characteristics(product_id)",
        ),
        (
            "idx_pc_group",
            "CREATE INDEX IF NOT EXISTS idx_pc_group ON product_characteristics(group_id)",
        ),
        (
            "idx_pc_preset",
            "CREATE INDEX IF NOT EXISTS idx_pc_preset ON product_characteristics(value_preset_id)",
        ),
        (
            "idx_products_category",
            "CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id)",
        ),
        (
            "idx_products_model_line",
            "CREATE INDEX IF NOT EXISTS idx_products_model_line ON products(model_line_id)",
        ),
        (
            "idx_sizes_product",
            "CREATE INDEX IF NOT EXISTS idx_sizes_product ON product_sizes(product_id, sort_order)",
        ),
        (
            "idx_model_series_manufacturer",
            "CREATE INDEX IF NOT EXISTS idx_model_series_manufacturer \
             ON model_series(manufacturer_id)",
        ),
        (
            "idx_order_items_order",
            "CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id)",
        ),
        (
            "idx_media_product",
            "CREATE INDEX IF NOT EXISTS idx_media_product ON media_files(product_id)",
        ),
        (
            "idx_variants_live_product",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_variants_live_product \
             ON product_variants(product_id) WHERE is_deleted = 0",
        ),
    ];

    for (name, query) in indexes {
        if let Err(e) = sqlx::query(query).execute(pool).await {
            match &e {
                sqlx::Error::Database(db_err) => {
                    let msg = db_err.message().to_lowercase();
                    if msg.contains("already exists") || msg.contains("duplicate") {
                        tracing::debug!("Index {} already exists, skipping", name);
                    } else {
                        tracing::warn!("Failed to create index {}: {}", name, e);
                    }
                }
                _ => {
                    tracing::warn!("Failed to create index {}: {}", name, e);
                }
            }
        }
    }

    Ok(())
}

/// Names of all tables the schema is expected to provide.
pub fn expected_tables() -> impl Iterator<Item = &'static str> {
    TABLES.iter().map(|(name, _)| *name)
}

/// Returns the subset of `names` that exist in the database.
pub async fn existing_tables(
    pool: &SqlitePool,
    names: &[&str],
) -> Result<Vec<String>, sqlx::Error> {
    let rows =
        sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'").fetch_all(pool).await?;
    let present: Vec<String> = rows.iter().map(|r| r.get::<String, _>("name")).collect();
    Ok(names.iter().filter(|n| present.iter().any(|p| p == *n)).map(|n| n.to_string()).collect())
}

/// Fails with `SchemaUnavailable` unless every table in `names` exists.
pub async fn require_tables(pool: &SqlitePool, names: &[&str]) -> AppResult<()> {
    let present = existing_tables(pool, names).await?;
    let missing: Vec<&str> =
        names.iter().copied().filter(|n| !present.iter().any(|p| p == n)).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::SchemaUnavailable(format!(
            "Schema is not initialized: missing {}",
            missing.join(", ")
        )))
    }
}
