use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::try_join_all;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    error::{AppError, AppResult},
    state::AppState,
    types::ExportQuery,
};

/// A table that may be exported, with the columns that leave the server.
pub struct ExportTable {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    order_by: &'static str,
    select: String,
}

impl ExportTable {
    fn new(name: &'static str, columns: &'static [&'static str], order_by: &'static str) -> Self {
        // json_object keeps SQLite's own typing for each value
        let pairs: Vec<String> = columns.iter().map(|c| format!("'{0}', {0}", c)).collect();
        let select = format!(
            "SELECT json_object({}) FROM {} ORDER BY {} LIMIT ?",
            pairs.join(", "),
            name,
            order_by
        );
        Self { name, columns, order_by, select }
    }
}

lazy_static::lazy_static! {
    static ref EXPORT_TABLES: Vec<ExportTable> = vec![
        ExportTable::new(
            "products",
            &[
                "id", "name", "description", "sku", "price", "category_id", "manufacturer_id",
                "model_line_id", "in_stock", "is_deleted", "created_at", "updated_at",
            ],
            "id",
        ),
        ExportTable::new(
            "product_categories",
            &["id", "name", "description", "parent_id", "type", "sort_order", "is_active"],
            "id",
        ),
        ExportTable::new(
            "manufacturers",
            &["id", "name", "country", "description", "is_active"],
            "id",
        ),
        ExportTable::new(
            "model_series",
            &["id", "name", "description", "manufacturer_id", "category_id", "is_active"],
            "id",
        ),
        ExportTable::new(
            "product_sizes",
            &[
                "id", "product_id", "size_name", "size_value", "sku", "price", "stock_quantity",
                "weight", "sort_order", "is_available",
            ],
            "product_id, sort_order, id",
        ),
        ExportTable::new(
            "characteristic_groups",
            &["id", "name", "description", "parent_id", "sort_order", "is_active"],
            "id",
        ),
        ExportTable::new(
            "characteristic_values",
            &["id", "group_id", "value", "display_name", "color_hex", "sort_order", "is_active"],
            "group_id, sort_order, id",
        ),
        ExportTable::new(
            "characteristic_templates",
            &[
                "id", "group_id", "name", "input_type", "unit_id", "is_required", "sort_order",
                "default_value",
            ],
            "group_id, sort_order, id",
        ),
        ExportTable::new(
            "product_characteristics",
            &[
                "id", "product_id", "group_id", "template_id", "value_text", "value_numeric",
                "value_color", "value_preset_id", "label", "is_primary",
            ],
            "product_id, id",
        ),
        ExportTable::new(
            "media_files",
            &["id", "product_id", "file_name", "url", "mime_type", "size_bytes", "created_at"],
            "id",
        ),
        ExportTable::new(
            "orders",
            &[
                "id", "customer_name", "customer_phone", "customer_email", "status", "notes",
                "total_amount", "created_at",
            ],
            "id",
        ),
        ExportTable::new(
            "order_items",
            &["id", "order_id", "product_id", "product_name", "quantity", "price"],
            "order_id, id",
        ),
    ];
}

/// Names accepted by `?tables=`.
pub fn exportable_tables() -> impl Iterator<Item = &'static str> {
    EXPORT_TABLES.iter().map(|t| t.name)
}

fn lookup(name: &str) -> AppResult<&'static ExportTable> {
    EXPORT_TABLES.iter().find(|t| t.name == name).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Table '{}' cannot be exported. Allowed: {}",
            name,
            exportable_tables().collect::<Vec<_>>().join(", ")
        ))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Json,
}

#[derive(Debug, Serialize)]
struct TableDump {
    table: &'static str,
    columns: &'static [&'static str],
    row_count: usize,
    truncated: bool,
    rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
struct ExportData {
    exported_at: String,
    format: &'static str,
    tables: Vec<TableDump>,
}

/// Exports whitelisted tables. Without `?tables=` every table is exported. Each table is
/// read under a gate permit and capped at `export.max_rows` rows.
pub async fn export_tables(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> AppResult<Response> {
    let format = match query.format.as_deref().unwrap_or("csv") {
        "csv" => Format::Csv,
        "json" => Format::Json,
        other => {
            return Err(AppError::BadRequest(format!(
                "Invalid format '{}'. Use 'csv' or 'json'",
                other
            )))
        }
    };

    let requested = query.tables.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let tables: Vec<&'static ExportTable> = match requested {
        Some(list) => {
            let mut picked: Vec<&'static ExportTable> = Vec::new();
            for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let table = lookup(name)?;
                if !picked.iter().any(|t| t.name == table.name) {
                    picked.push(table);
                }
            }
            picked
        }
        None => EXPORT_TABLES.iter().collect(),
    };

    let max_rows = state.config.export.max_rows;
    let dumps = try_join_all(tables.iter().map(|t| fetch_table(&state, *t, max_rows))).await?;

    let exported: usize = dumps.iter().map(|d| d.row_count).sum();
    state.metrics.add_export(exported as u64);
    tracing::info!(tables = dumps.len(), rows = exported, "Export finished");

    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    match format {
        Format::Csv => {
            let mut response = render_csv(&dumps).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8"));
            attach(&mut response, &format!("export_{}.csv", stamp));
            Ok(response)
        }
        Format::Json => {
            let data = ExportData {
                exported_at: chrono::Utc::now().to_rfc3339(),
                format: "json",
                tables: dumps,
            };
            let mut response = Json(data).into_response();
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=utf-8"),
            );
            attach(&mut response, &format!("export_{}.json", stamp));
            Ok(response)
        }
    }
}

fn attach(response: &mut Response, file_name: &str) {
    let disposition = format!("attachment; filename=\"{}\"", file_name);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
}

async fn fetch_table(
    state: &AppState,
    table: &'static ExportTable,
    max_rows: i64,
) -> AppResult<TableDump> {
    // one extra row tells whether the cap cut the table short
    let raw: Vec<String> = state
        .gate
        .run(sqlx::query_scalar::<_, String>(&table.select).bind(max_rows + 1).fetch_all(&state.db))
        .await??;

    let truncated = raw.len() as i64 > max_rows;
    if truncated {
        tracing::warn!(
            "Export of {} capped at {} rows (order: {})",
            table.name,
            max_rows,
            table.order_by
        );
    }

    let mut rows = Vec::with_capacity(raw.len());
    for text in raw.into_iter().take(max_rows as usize) {
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => rows.push(map),
            _ => {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "Malformed export row in {}",
                    table.name
                )))
            }
        }
    }

    Ok(TableDump {
        table: table.name,
        columns: table.columns,
        row_count: rows.len(),
        truncated,
        rows,
    })
}

/// One section per table: a `# table` line, the header row, then data rows. Sections are
/// separated by a blank line.
fn render_csv(dumps: &[TableDump]) -> String {
    let mut out = String::new();
    for (i, dump) in dumps.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("# {}\n", dump.table));
        out.push_str(&dump.columns.join(","));
        out.push('\n');
        for row in &dump.rows {
            let cells: Vec<String> = dump
                .columns
                .iter()
                .map(|c| csv_cell(row.get(*c).unwrap_or(&Value::Null)))
                .collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
    }
    out
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{}\"", escape_csv(s)),
        other => format!("\"{}\"", escape_csv(&other.to_string())),
    }
}

pub(crate) fn escape_csv(s: &str) -> String {
    // quotes are doubled, line breaks and other control characters become spaces
    s.chars()
        .flat_map(|c| match c {
            '"' => vec!['"', '"'],
            '\n' | '\r' => vec![' '],
            c if c.is_control() => vec![' '],
            c => vec![c],
        })
        .collect()
}
