use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use sqlx::FromRow;

use super::ok;
use crate::db::{existing_tables, require_tables};
use crate::error::{validation::require_name, AppError, AppResult};
use crate::state::AppState;
use crate::types::{SiteSettings, SiteSettingsInput};

const TABLE: &str = "site_settings";

#[derive(FromRow)]
struct SettingsRecord {
    id: i64,
    site_name: String,
    site_description: Option<String>,
    hero_title: Option<String>,
    hero_subtitle: Option<String>,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    address: Option<String>,
    social_media: String,
    additional_contacts: String,
}

impl SettingsRecord {
    /// JSON columns that fail to parse fall back to the defaults.
    fn into_settings(self) -> SiteSettings {
        let defaults = SiteSettings::default();
        SiteSettings {
            site_name: self.site_name,
            site_description: self.site_description,
            hero_title: self.hero_title,
            hero_subtitle: self.hero_subtitle,
            contact_email: self.contact_email,
            contact_phone: self.contact_phone,
            address: self.address,
            social_media: serde_json::from_str(&self.social_media).unwrap_or(defaults.social_media),
            additional_contacts: serde_json::from_str(&self.additional_contacts)
                .unwrap_or(defaults.additional_contacts),
        }
    }
}

async fn load_record(state: &AppState) -> AppResult<Option<SettingsRecord>> {
    Ok(sqlx::query_as::<_, SettingsRecord>(
        "SELECT id, site_name, site_description, hero_title, hero_subtitle, contact_email, \
                contact_phone, address, social_media, additional_contacts \
         FROM site_settings ORDER BY id LIMIT 1",
    )
    .fetch_optional(&state.db)
    .await?)
}

/// Stored settings, or the defaults when none were saved. A missing table answers 503
/// but still carries the defaults so the storefront can render.
pub async fn get_settings(State(state): State<AppState>) -> AppResult<Response> {
    if existing_tables(&state.db, &[TABLE]).await?.is_empty() {
        tracing::warn!("site_settings table is missing; serving defaults");
        let body = json!({
            "success": false,
            "error": "Site settings table is not initialized",
            "code": "SCHEMA_UNAVAILABLE",
            "status": StatusCode::SERVICE_UNAVAILABLE.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "data": SiteSettings::default(),
        });
        return Ok((StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response());
    }

    let settings =
        load_record(&state).await?.map(SettingsRecord::into_settings).unwrap_or_default();
    Ok(ok(settings).into_response())
}

fn require_json(value: Option<Value>, field: &str, object: bool) -> AppResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(v) if (object && v.is_object()) || (!object && v.is_array()) => {
            Ok(Some(v.to_string()))
        }
        Some(_) => {
            let kind = if object { "object" } else { "array" };
            Err(AppError::ValidationError {
                field: field.to_string(),
                message: format!("{} must be a JSON {}", field, kind),
            })
        }
    }
}

/// Merges the given fields into the stored settings, creating the row on first save.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(req): Json<SiteSettingsInput>,
) -> AppResult<Json<Value>> {
    require_tables(&state.db, &[TABLE]).await?;

    let site_name = match req.site_name.as_deref() {
        Some(n) => Some(require_name(Some(n), "site_name")?),
        None => None,
    };
    let social_media = require_json(req.social_media, "social_media", true)?;
    let additional_contacts = require_json(req.additional_contacts, "additional_contacts", false)?;

    match load_record(&state).await? {
        Some(current) => {
            sqlx::query(
                "UPDATE site_settings SET \
                    site_name = COALESCE(?, site_name), \
                    site_description = COALESCE(?, site_description), \
                    hero_title = COALESCE(?, hero_title), \
                    hero_subtitle = COALESCE(?, hero_subtitle), \
                    contact_email = COALESCE(?, contact_email), \
                    contact_phone = COALESCE(?, contact_phone), \
                    address = COALESCE(?, address), \
                    social_media = COALESCE(?, social_media), \
                    additional_contacts = COALESCE(?, additional_contacts), \
                    updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now') \
                 WHERE id = ?",
            )
            .bind(site_name)
            .bind(req.site_description)
            .bind(req.hero_title)
            .bind(req.hero_subtitle)
            .bind(req.contact_email)
            .bind(req.contact_phone)
            .bind(req.address)
            .bind(social_media)
            .bind(additional_contacts)
            .bind(current.id)
            .execute(&state.db)
            .await?;
        }
        None => {
            let defaults = SiteSettings::default();
            sqlx::query(
                "INSERT INTO site_settings \
                 (site_name, site_description, hero_title, hero_subtitle, contact_email, \
                  contact_phone, address, social_media, additional_contacts) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(site_name.unwrap_or(defaults.site_name))
            .bind(req.site_description)
            .bind(req.hero_title)
            .bind(req.hero_subtitle)
            .bind(req.contact_email)
            .bind(req.contact_phone)
            .bind(req.address)
            .bind(social_media.unwrap_or_else(|| defaults.social_media.to_string()))
            .bind(additional_contacts.unwrap_or_else(|| defaults.additional_contacts.to_string()))
            .execute(&state.db)
            .await?;
        }
    }

    let saved = load_record(&state).await?.map(SettingsRecord::into_settings).unwrap_or_default();
    tracing::info!("Site settings updated");
    Ok(ok(saved))
}
