use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

// Query strings

#[derive(Debug, Default, Deserialize)]
pub struct GroupIdQuery {
    pub group_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpecValuesQuery {
    pub product_id: Option<i64>,
    pub group_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForceQuery {
    pub force: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ByCategoryQuery {
    pub category_id: Option<i64>,
    pub include_children: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelLineQuery {
    pub manufacturer_id: Option<i64>,
    pub include_products: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub category_id: Option<i64>,
    pub manufacturer_id: Option<i64>,
    pub model_line_id: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<String>,
}

// Characteristic groups, values and templates

#[derive(Debug, Default, Deserialize)]
pub struct GroupCreate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub sort_order: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GroupUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<i64>>,
    pub sort_order: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ValueCreate {
    pub group_id: Option<i64>,
    pub value: Option<String>,
    pub display_name: Option<String>,
    pub color_hex: Option<String>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ValueUpdate {
    pub value: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub display_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub color_hex: Option<Option<String>>,
    pub sort_order: Option<i64>,
    pub is_active: Option<bool>,
}

/// A preset supplied with a new template: either a bare string or a full value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PresetValueInput {
    Plain(String),
    Full {
        value: String,
        display_name: Option<String>,
        color_hex: Option<String>,
        sort_order: Option<i64>,
    },
}

impl PresetValueInput {
    pub fn value(&self) -> &str {
        match self {
            PresetValueInput::Plain(v) => v,
            PresetValueInput::Full { value, .. } => value,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplateCreate {
    pub group_id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub input_type: Option<String>,
    pub unit_id: Option<i64>,
    pub is_required: Option<bool>,
    pub sort_order: Option<i64>,
    pub validation_rules: Option<Value>,
    pub default_value: Option<String>,
    pub placeholder_text: Option<String>,
    #[serde(default)]
    pub preset_values: Vec<PresetValueInput>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplateUpdate {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub input_type: Option<String>,
    pub unit_id: Option<i64>,
    pub is_required: Option<bool>,
    pub sort_order: Option<i64>,
    pub validation_rules: Option<Value>,
    pub default_value: Option<String>,
    pub placeholder_text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplateBatchUpdate {
    #[serde(default)]
    pub templates: Vec<TemplateUpdate>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CharacteristicInput {
    pub group_id: Option<i64>,
    pub template_id: Option<i64>,
    pub value_text: Option<String>,
    pub value_numeric: Option<f64>,
    pub value_color: Option<String>,
    pub value_preset_id: Option<i64>,
    pub label: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveCharacteristics {
    #[serde(default)]
    pub characteristics: Vec<CharacteristicInput>,
}

// Catalog entities

#[derive(Debug, Default, Deserialize)]
pub struct CategoryCreate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub sort_order: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<i64>>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub sort_order: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ManufacturerRow {
    pub id: i64,
    pub name: String,
    pub country: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ManufacturerInput {
    pub name: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ModelLineRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub manufacturer_id: i64,
    pub manufacturer_name: Option<String>,
    pub category_id: Option<i64>,
    pub is_active: bool,
    pub products_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelLineInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub manufacturer_id: Option<i64>,
    pub category_id: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub manufacturer_id: Option<i64>,
    pub manufacturer_name: Option<String>,
    pub model_line_id: Option<i64>,
    pub model_line_name: Option<String>,
    pub in_stock: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub category_id: Option<i64>,
    pub manufacturer_id: Option<i64>,
    pub model_line_id: Option<i64>,
    pub in_stock: Option<bool>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SizeRow {
    pub id: i64,
    pub product_id: i64,
    pub size_name: String,
    pub size_value: Option<String>,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub stock_quantity: Option<i64>,
    pub weight: Option<f64>,
    pub sort_order: i64,
    pub is_available: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SizeInput {
    pub size_name: Option<String>,
    pub size_value: Option<String>,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub stock_quantity: Option<i64>,
    pub weight: Option<f64>,
    pub sort_order: Option<i64>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MediaRow {
    pub id: i64,
    pub product_id: Option<i64>,
    pub file_name: String,
    pub url: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaItem {
    #[serde(flatten)]
    pub media: MediaRow,
    pub product_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MediaInput {
    pub product_id: Option<i64>,
    pub file_name: Option<String>,
    pub url: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub status: String,
    pub notes: Option<String>,
    pub total_amount: f64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub product_id: Option<i64>,
    pub product_name: String,
    pub quantity: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemInput {
    pub product_id: Option<i64>,
    pub product_name: Option<String>,
    pub quantity: Option<i64>,
    pub price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderUpdate {
    pub status: Option<String>,
    pub notes: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub items: Option<Vec<OrderItemInput>>,
}

/// Order lifecycle states accepted on update.
pub const ORDER_STATUSES: &[&str] =
    &["pending", "confirmed", "processing", "shipped", "delivered", "cancelled"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteSettings {
    pub site_name: String,
    pub site_description: Option<String>,
    pub hero_title: Option<String>,
    pub hero_subtitle: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub social_media: Value,
    pub additional_contacts: Value,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: "Протезный центр".to_string(),
            site_description: None,
            hero_title: None,
            hero_subtitle: None,
            contact_email: None,
            contact_phone: None,
            address: None,
            social_media: Value::Object(Default::default()),
            additional_contacts: Value::Array(Vec::new()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SiteSettingsInput {
    pub site_name: Option<String>,
    pub site_description: Option<String>,
    pub hero_title: Option<String>,
    pub hero_subtitle: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub address: Option<String>,
    pub social_media: Option<Value>,
    pub additional_contacts: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    /// Comma-separated table names.
    pub tables: Option<String>,
    /// `csv` (default) or `json`.
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VariantRow {
    pub id: i64,
    pub product_id: i64,
    pub variant_sku: String,
    pub variant_name: String,
    pub price_modifier: f64,
    pub stock_quantity: i64,
    pub is_active: bool,
    pub product_name: Option<String>,
    pub product_sku: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Menu entries point at one of these entity kinds; `manufacturers_category` is the
/// virtual "all manufacturers" entry and always uses entity id 0.
pub const MENU_ENTITY_TYPES: &[&str] =
    &["spec_group", "category", "manufacturer", "model_line", "manufacturers_category"];

#[derive(Debug, Default, Deserialize)]
pub struct EntityTypeQuery {
    pub entity_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MenuSettingRow {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: i64,
    pub name: Option<String>,
    pub sort_order: i64,
    pub is_visible: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MenuSettingInput {
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub name: Option<String>,
    pub sort_order: Option<i64>,
    pub is_visible: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogFilesQuery {
    pub active: Option<bool>,
    pub year: Option<i64>,
    #[serde(default)]
    pub nocache: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CatalogFileRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub file_url: String,
    pub file_name: String,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub year: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogFileInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub year: Option<i64>,
}
