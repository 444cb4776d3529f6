//! Dynamic field definitions.
//!
//! Dynamic fields are admin-defined extra attributes attached to tickets, articles,
//! customer users or customer companies. Values live in `dynamic_field_value`, one row
//! per `(field, object)`.
//!
//! - [`filter`]: translating `df_*` query parameters into SQL predicates
//! - [`exchange`]: Znuny-compatible YAML export and import

pub mod exchange;
pub mod filter;

use crate::{StoreError, StoreFuture};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Widget and storage type of a dynamic field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Single line text.
    Text,
    /// Multi line text.
    TextArea,
    /// Boolean stored as 0/1.
    Checkbox,
    /// Single choice from `PossibleValues`.
    Dropdown,
    /// Multiple choices from `PossibleValues`.
    Multiselect,
    /// Calendar date.
    Date,
    /// Date and time.
    DateTime,
    /// Single choice fetched from a web service.
    WebserviceDropdown,
    /// Multiple choices fetched from a web service.
    WebserviceMultiselect,
}

impl FieldType {
    /// All known field types.
    pub const ALL: [Self; 9] = [
        Self::Text,
        Self::TextArea,
        Self::Checkbox,
        Self::Dropdown,
        Self::Multiselect,
        Self::Date,
        Self::DateTime,
        Self::WebserviceDropdown,
        Self::WebserviceMultiselect,
    ];

    /// Name as stored in `dynamic_field.field_type`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::TextArea => "TextArea",
            Self::Checkbox => "Checkbox",
            Self::Dropdown => "Dropdown",
            Self::Multiselect => "Multiselect",
            Self::Date => "Date",
            Self::DateTime => "DateTime",
            Self::WebserviceDropdown => "WebserviceDropdown",
            Self::WebserviceMultiselect => "WebserviceMultiselect",
        }
    }

    /// Whether the field offers a fixed list of options.
    #[must_use]
    pub const fn has_options(&self) -> bool {
        matches!(self, Self::Dropdown | Self::Multiselect)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StoreError::Validation(format!("invalid field type {s}")))
    }
}

/// Kind of object a dynamic field is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    /// Tickets.
    Ticket,
    /// Ticket articles.
    Article,
    /// Customer users.
    CustomerUser,
    /// Customer companies.
    CustomerCompany,
}

impl ObjectType {
    /// All known object types.
    pub const ALL: [Self; 4] = [
        Self::Ticket,
        Self::Article,
        Self::CustomerUser,
        Self::CustomerCompany,
    ];

    /// Name as stored in `dynamic_field.object_type`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ticket => "Ticket",
            Self::Article => "Article",
            Self::CustomerUser => "CustomerUser",
            Self::CustomerCompany => "CustomerCompany",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StoreError::Validation(format!("invalid object type {s}")))
    }
}

/// Type-specific field configuration.
///
/// Stored as YAML in `dynamic_field.config` and embedded in exports, so keys use the
/// Znuny spelling. Keys this type does not model are carried through in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DynamicFieldConfig {
    /// Option key to display label (dropdown and multiselect).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possible_values: Option<BTreeMap<String, String>>,
    /// Value preselected on new objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    /// Whether an empty option is offered (0/1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possible_none: Option<i32>,
    /// Whether option labels are translated (0/1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translatable_values: Option<i32>,
    /// Link template rendered around the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Text area height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    /// Text area width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<u32>,
    /// Years selectable before today (date fields).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_in_past: Option<u32>,
    /// Years selectable after today (date fields).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_in_future: Option<u32>,
    /// Unmodelled keys, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl DynamicFieldConfig {
    /// Serialize for the `dynamic_field.config` column.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if a preserved value cannot be rendered.
    pub fn to_yaml(&self) -> Result<String, StoreError> {
        serde_yaml::to_string(self)
            .map_err(|e| StoreError::Validation(format!("failed to serialize config: {e}")))
    }

    /// Parse the `dynamic_field.config` column. Blank input yields the default config.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] for malformed YAML.
    pub fn from_yaml(raw: &str) -> Result<Self, StoreError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
            .map_err(|e| StoreError::Database(format!("malformed dynamic field config: {e}")))
    }
}

/// A dynamic field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicField {
    /// Row id (0 before insertion).
    pub id: i64,
    /// Internal fields are shipped with the system and cannot be renamed.
    pub internal_field: bool,
    /// Unique name, referenced as `DynamicField_<name>`.
    pub name: String,
    /// Display label.
    pub label: String,
    /// Position in forms.
    pub field_order: i32,
    /// Widget and storage type.
    pub field_type: FieldType,
    /// Object the field is attached to.
    pub object_type: ObjectType,
    /// Type-specific configuration.
    pub config: Option<DynamicFieldConfig>,
    /// 1 = valid, anything else invalid.
    pub valid_id: i32,
}

/// Per-screen visibility of a field: 0 disabled, 1 enabled, 2 required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenConfig {
    /// Field the setting belongs to.
    pub field_id: i64,
    /// Screen identifier (e.g. `AgentTicketZoom`).
    pub screen_key: String,
    /// Visibility value.
    pub config_value: i32,
}

/// A field plus the options a search form offers for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchableDynamicField {
    /// The field definition.
    #[serde(flatten)]
    pub field: DynamicField,
    /// `(key, label)` pairs sorted by key; empty for free-form fields.
    pub options: Vec<(String, String)>,
}

impl SearchableDynamicField {
    /// Wrap a field, populating options from `PossibleValues` for choice fields.
    #[must_use]
    pub fn new(field: DynamicField) -> Self {
        let options = if field.field_type.has_options() {
            field
                .config
                .as_ref()
                .and_then(|c| c.possible_values.as_ref())
                .map(|values| {
                    values
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        Self { field, options }
    }
}

/// Storage for dynamic field definitions and their screen settings.
pub trait DynamicFieldRepository: Send + Sync {
    /// All fields, optionally restricted to one object type, ordered by `field_order`, name.
    fn list(&self, object_type: Option<ObjectType>) -> StoreFuture<'_, Vec<DynamicField>>;

    /// Look up a field by its unique name.
    fn get_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<DynamicField>>;

    /// Insert a new field and return its id.
    fn create<'a>(&'a self, field: &'a DynamicField, user_id: i64) -> StoreFuture<'a, i64>;

    /// Overwrite label, order, types, config and validity of the field with `field.id`.
    fn update<'a>(&'a self, field: &'a DynamicField, user_id: i64) -> StoreFuture<'a, ()>;

    /// Screen settings of one field.
    fn screen_configs(&self, field_id: i64) -> StoreFuture<'_, Vec<ScreenConfig>>;

    /// Upsert one screen setting.
    fn set_screen_config<'a>(
        &'a self,
        field_id: i64,
        screen_key: &'a str,
        value: i32,
        user_id: i64,
    ) -> StoreFuture<'a, ()>;
}

/// Load the fields of an object type prepared for a search form.
///
/// Only valid fields are returned.
///
/// # Errors
///
/// Propagates repository failures.
pub async fn searchable_fields(
    repo: &dyn DynamicFieldRepository,
    object_type: Option<ObjectType>,
) -> Result<Vec<SearchableDynamicField>, StoreError> {
    let fields = repo.list(object_type).await?;
    Ok(fields
        .into_iter()
        .filter(|f| f.valid_id == 1)
        .map(SearchableDynamicField::new)
        .collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dropdown() -> DynamicField {
        let mut values = BTreeMap::new();
        values.insert("low".to_string(), "Low Priority".to_string());
        values.insert("medium".to_string(), "Medium Priority".to_string());
        values.insert("high".to_string(), "High Priority".to_string());
        DynamicField {
            id: 1,
            internal_field: false,
            name: "Priority".to_string(),
            label: "Priority".to_string(),
            field_order: 1,
            field_type: FieldType::Dropdown,
            object_type: ObjectType::Ticket,
            config: Some(DynamicFieldConfig {
                possible_values: Some(values),
                ..DynamicFieldConfig::default()
            }),
            valid_id: 1,
        }
    }

    #[test]
    fn test_searchable_options_sorted_by_key() {
        let sdf = SearchableDynamicField::new(dropdown());
        let keys: Vec<_> = sdf.options.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["high", "low", "medium"]);
    }

    #[test]
    fn test_text_field_has_no_options() {
        let mut field = dropdown();
        field.field_type = FieldType::Text;
        assert!(SearchableDynamicField::new(field).options.is_empty());
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!("DateTime".parse::<FieldType>().unwrap(), FieldType::DateTime);
        assert!("Bogus".parse::<FieldType>().is_err());
        assert_eq!(
            "CustomerCompany".parse::<ObjectType>().unwrap(),
            ObjectType::CustomerCompany
        );
        assert!("FAQ".parse::<ObjectType>().is_err());
    }

    #[test]
    fn test_config_yaml_preserves_unknown_keys() {
        let raw = "PossibleValues:\n  a: A\nRegExList: []\nDefaultValue: a\n";
        let config = DynamicFieldConfig::from_yaml(raw).unwrap();
        assert_eq!(config.default_value.as_deref(), Some("a"));
        assert!(config.extra.contains_key("RegExList"));

        let back = DynamicFieldConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_blank_config_is_default() {
        assert_eq!(
            DynamicFieldConfig::from_yaml("  ").unwrap(),
            DynamicFieldConfig::default()
        );
    }
}
