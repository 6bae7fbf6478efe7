//! Turns one product characteristic fact into a display string.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Display language for resolved values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Ru,
    En,
}

impl Locale {
    pub fn not_specified(self) -> &'static str {
        match self {
            Locale::Ru => "Не указано",
            Locale::En => "not specified",
        }
    }

    pub fn yes(self) -> &'static str {
        match self {
            Locale::Ru => "Да",
            Locale::En => "Yes",
        }
    }

    pub fn no(self) -> &'static str {
        match self {
            Locale::Ru => "Нет",
            Locale::En => "No",
        }
    }

    pub fn file_attached(self) -> &'static str {
        match self {
            Locale::Ru => "Файл прикреплен",
            Locale::En => "attached",
        }
    }

    pub fn file_missing(self) -> &'static str {
        match self {
            Locale::Ru => "Файл не прикреплен",
            Locale::En => "not attached",
        }
    }

    fn date_pattern(self) -> &'static str {
        match self {
            Locale::Ru => "%d.%m.%Y",
            Locale::En => "%m/%d/%Y",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Number,
    Boolean,
    Date,
    Enum,
    File,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown input type '{0}'")]
pub struct UnknownInputType(pub String);

impl FromStr for InputType {
    type Err = UnknownInputType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(InputType::Text),
            "number" => Ok(InputType::Number),
            "boolean" => Ok(InputType::Boolean),
            "date" => Ok(InputType::Date),
            "enum" => Ok(InputType::Enum),
            "file" => Ok(InputType::File),
            other => Err(UnknownInputType(other.to_string())),
        }
    }
}

impl InputType {
    /// Stored types outside the known set are displayed as text.
    pub fn lenient(s: &str) -> Self {
        s.parse().unwrap_or(InputType::Text)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Number => "number",
            InputType::Boolean => "boolean",
            InputType::Date => "date",
            InputType::Enum => "enum",
            InputType::File => "file",
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A product characteristic joined with its group, template, unit and preset value.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct FactRow {
    pub id: i64,
    pub product_id: i64,
    pub product_name: Option<String>,
    pub group_id: i64,
    pub group_name: String,
    pub group_sort_order: i64,
    pub template_id: Option<i64>,
    pub template_name: Option<String>,
    pub input_type: Option<String>,
    pub is_required: Option<bool>,
    pub unit_code: Option<String>,
    pub unit_name: Option<String>,
    pub value_text: Option<String>,
    pub value_numeric: Option<f64>,
    pub value_color: Option<String>,
    pub value_preset_id: Option<i64>,
    pub preset_value: Option<String>,
    pub preset_display_name: Option<String>,
    pub preset_color: Option<String>,
    pub label: Option<String>,
    pub is_primary: bool,
}

impl FactRow {
    /// The template's declared type; facts without a template are typed by the field
    /// they fill.
    pub fn input_type(&self) -> InputType {
        if let Some(t) = self.input_type.as_deref() {
            return InputType::lenient(t);
        }
        if self.value_preset_id.is_some() {
            InputType::Enum
        } else if self.value_numeric.is_some() && non_empty(self.value_text.as_deref()).is_none() {
            InputType::Number
        } else {
            InputType::Text
        }
    }
}

/// Typed companion to the display string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FormattedValue {
    Enum {
        enum_value_id: Option<i64>,
        value: Option<String>,
        display: Option<String>,
        color: Option<String>,
    },
    Boolean { value: bool },
    Number { value: Option<f64>, unit: Option<String>, unit_name: Option<String> },
    Date { value: Option<String> },
    File { url: Option<String> },
    Text { value: Option<String> },
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedCharacteristic {
    pub id: i64,
    pub product_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub group_id: i64,
    pub group_name: String,
    pub template_id: Option<i64>,
    pub template_name: Option<String>,
    pub input_type: InputType,
    pub label: String,
    pub display_value: String,
    pub formatted_value: FormattedValue,
    pub value_text: Option<String>,
    pub value_numeric: Option<f64>,
    pub value_color: Option<String>,
    pub value_preset_id: Option<i64>,
    pub unit_code: Option<String>,
    pub is_required: bool,
    pub is_primary: bool,
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

/// Whole numbers print without a fractional part.
pub fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Reformats an ISO-like date. Returns `None` when the text is not a recognizable date.
pub fn format_date(raw: &str, locale: Locale) -> Option<String> {
    let raw = raw.trim();
    let date = DateTime::parse_from_rfc3339(raw)
        .map(|d| d.date_naive())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|d| d.date()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|d| d.date()))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()?;
    Some(date.format(locale.date_pattern()).to_string())
}

pub fn display_value(fact: &FactRow, locale: Locale) -> String {
    let placeholder = locale.not_specified();
    let text = non_empty(fact.value_text.as_deref());
    match fact.input_type() {
        InputType::Enum => non_empty(fact.preset_display_name.as_deref())
            .or(non_empty(fact.preset_value.as_deref()))
            .unwrap_or(placeholder)
            .to_string(),
        InputType::Boolean => {
            if fact.value_text.as_deref().map(str::trim) == Some("true") {
                locale.yes().to_string()
            } else {
                locale.no().to_string()
            }
        }
        InputType::Number => match fact.value_numeric {
            Some(n) => match non_empty(fact.unit_code.as_deref()) {
                Some(unit) => format!("{} {}", format_number(n), unit),
                None => format_number(n),
            },
            None => placeholder.to_string(),
        },
        InputType::Date => match text {
            Some(raw) => format_date(raw, locale).unwrap_or_else(|| raw.to_string()),
            None => placeholder.to_string(),
        },
        InputType::File => {
            if text.is_some() {
                locale.file_attached().to_string()
            } else {
                locale.file_missing().to_string()
            }
        }
        InputType::Text => text.unwrap_or(placeholder).to_string(),
    }
}

pub fn formatted_value(fact: &FactRow) -> FormattedValue {
    match fact.input_type() {
        InputType::Enum => FormattedValue::Enum {
            enum_value_id: fact.value_preset_id,
            value: fact.preset_value.clone(),
            display: fact.preset_display_name.clone().or_else(|| fact.preset_value.clone()),
            color: fact.preset_color.clone().or_else(|| fact.value_color.clone()),
        },
        InputType::Boolean => FormattedValue::Boolean {
            value: fact.value_text.as_deref().map(str::trim) == Some("true"),
        },
        InputType::Number => FormattedValue::Number {
            value: fact.value_numeric,
            unit: fact.unit_code.clone(),
            unit_name: fact.unit_name.clone(),
        },
        InputType::Date => FormattedValue::Date { value: fact.value_text.clone() },
        InputType::File => FormattedValue::File { url: fact.value_text.clone() },
        InputType::Text => FormattedValue::Text { value: fact.value_text.clone() },
    }
}

pub fn resolve(fact: FactRow, locale: Locale) -> ResolvedCharacteristic {
    let input_type = fact.input_type();
    let display_value = display_value(&fact, locale);
    let formatted_value = formatted_value(&fact);
    let label = non_empty(fact.label.as_deref())
        .or(non_empty(fact.template_name.as_deref()))
        .unwrap_or(fact.group_name.as_str())
        .to_string();

    ResolvedCharacteristic {
        id: fact.id,
        product_id: fact.product_id,
        product_name: fact.product_name,
        group_id: fact.group_id,
        group_name: fact.group_name,
        template_id: fact.template_id,
        template_name: fact.template_name,
        input_type,
        label,
        display_value,
        formatted_value,
        value_text: fact.value_text,
        value_numeric: fact.value_numeric,
        value_color: fact.value_color,
        value_preset_id: fact.value_preset_id,
        unit_code: fact.unit_code,
        is_required: fact.is_required.unwrap_or(false),
        is_primary: fact.is_primary,
    }
}

pub fn resolve_all(facts: Vec<FactRow>, locale: Locale) -> Vec<ResolvedCharacteristic> {
    facts.into_iter().map(|f| resolve(f, locale)).collect()
}
