//! Znuny-compatible YAML export and import of dynamic field definitions.
//!
//! The document has two top level sections:
//!
//! ```yaml
//! DynamicFields:
//!   Severity:
//!     Name: Severity
//!     Label: Severity
//!     FieldType: Dropdown
//!     ObjectType: Ticket
//!     FieldOrder: 3
//!     ValidID: 1
//!     Config:
//!       PossibleValues: { high: High, low: Low }
//! DynamicFieldScreens:
//!   Severity:
//!     AgentTicketZoom: 1
//! ```

use super::{DynamicField, DynamicFieldConfig, DynamicFieldRepository, FieldType, ObjectType};
use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

/// Errors from parsing or producing an export document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    /// The document is not valid YAML or has the wrong shape.
    #[error("failed to parse YAML: {0}")]
    Yaml(String),

    /// The document has no `DynamicFields` section.
    #[error("invalid file: no DynamicFields section found")]
    MissingSection,

    /// Repository failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One field definition inside an export.
///
/// Types are kept as strings so a document naming an unknown type still parses and
/// the import can report it per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportItem {
    /// Field name.
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Display label.
    #[serde(rename = "Label", default)]
    pub label: String,
    /// Field type name.
    #[serde(rename = "FieldType")]
    pub field_type: String,
    /// Object type name.
    #[serde(rename = "ObjectType")]
    pub object_type: String,
    /// Form position.
    #[serde(rename = "FieldOrder", default)]
    pub field_order: i32,
    /// Validity id.
    #[serde(rename = "ValidID", default)]
    pub valid_id: i32,
    /// Type-specific configuration.
    #[serde(rename = "Config", default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DynamicFieldConfig>,
}

impl From<&DynamicField> for ExportItem {
    fn from(field: &DynamicField) -> Self {
        Self {
            name: field.name.clone(),
            label: field.label.clone(),
            field_type: field.field_type.to_string(),
            object_type: field.object_type.to_string(),
            field_order: field.field_order,
            valid_id: field.valid_id,
            config: field.config.clone(),
        }
    }
}

/// A complete export document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DynamicFieldExport {
    /// Field definitions keyed by name.
    #[serde(rename = "DynamicFields")]
    pub dynamic_fields: BTreeMap<String, ExportItem>,
    /// Screen settings keyed by field name, then screen key.
    #[serde(rename = "DynamicFieldScreens", skip_serializing_if = "BTreeMap::is_empty")]
    pub dynamic_field_screens: BTreeMap<String, BTreeMap<String, i32>>,
}

#[derive(Deserialize)]
struct RawExport {
    #[serde(rename = "DynamicFields")]
    dynamic_fields: Option<BTreeMap<String, ExportItem>>,
    #[serde(rename = "DynamicFieldScreens", default)]
    dynamic_field_screens: Option<BTreeMap<String, BTreeMap<String, i32>>>,
}

impl DynamicFieldExport {
    /// Render as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Yaml`] if a preserved config value cannot be rendered.
    pub fn to_yaml(&self) -> Result<String, ExchangeError> {
        serde_yaml::to_string(self).map_err(|e| ExchangeError::Yaml(e.to_string()))
    }

    /// Parse an uploaded document.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Yaml`] for malformed input and
    /// [`ExchangeError::MissingSection`] when `DynamicFields` is absent.
    pub fn parse_yaml(raw: &str) -> Result<Self, ExchangeError> {
        let parsed: RawExport =
            serde_yaml::from_str(raw).map_err(|e| ExchangeError::Yaml(e.to_string()))?;
        let dynamic_fields = parsed
            .dynamic_fields
            .ok_or(ExchangeError::MissingSection)?;
        Ok(Self {
            dynamic_fields,
            dynamic_field_screens: parsed.dynamic_field_screens.unwrap_or_default(),
        })
    }
}

/// What importing one field would do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPreviewItem {
    /// Field name.
    pub name: String,
    /// Label from the document.
    pub label: String,
    /// Field type from the document.
    pub field_type: String,
    /// Object type from the document.
    pub object_type: String,
    /// A field with this name already exists.
    pub exists: bool,
    /// The document carries screen settings for the field.
    pub has_screens: bool,
    /// Number of screen settings in the document.
    pub screen_count: usize,
    /// Importing creates a new field.
    pub will_create: bool,
    /// Importing with overwrite replaces the existing field.
    pub will_overwrite: bool,
}

/// Outcome of [`import`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Newly created fields.
    pub created: Vec<String>,
    /// Overwritten fields.
    pub updated: Vec<String>,
    /// Existing fields left alone.
    pub skipped: Vec<String>,
    /// One message per failed field or screen setting.
    pub errors: Vec<String>,
    /// Screen settings written.
    pub screens_ok: usize,
}

/// Export field definitions, optionally with their screen settings.
///
/// An empty `names` exports every field. Names that do not exist are skipped.
///
/// # Errors
///
/// Propagates repository failures.
pub async fn export(
    repo: &dyn DynamicFieldRepository,
    names: &[String],
    include_screens: bool,
) -> Result<DynamicFieldExport, ExchangeError> {
    let fields = if names.is_empty() {
        repo.list(None).await?
    } else {
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            if let Some(field) = repo.get_by_name(name).await? {
                fields.push(field);
            }
        }
        fields
    };

    let mut out = DynamicFieldExport::default();
    for field in &fields {
        out.dynamic_fields
            .insert(field.name.clone(), ExportItem::from(field));

        if include_screens {
            let screens = repo.screen_configs(field.id).await?;
            if !screens.is_empty() {
                out.dynamic_field_screens.insert(
                    field.name.clone(),
                    screens
                        .into_iter()
                        .map(|s| (s.screen_key, s.config_value))
                        .collect(),
                );
            }
        }
    }

    tracing::debug!(
        fields = out.dynamic_fields.len(),
        screens = out.dynamic_field_screens.len(),
        "dynamic fields exported"
    );
    Ok(out)
}

/// Describe what importing `document` would do, sorted by field name.
///
/// # Errors
///
/// Propagates repository failures.
pub async fn preview(
    repo: &dyn DynamicFieldRepository,
    document: &DynamicFieldExport,
) -> Result<Vec<ImportPreviewItem>, ExchangeError> {
    let mut items = Vec::with_capacity(document.dynamic_fields.len());
    for (name, item) in &document.dynamic_fields {
        let exists = repo.get_by_name(name).await?.is_some();
        let screen_count = document
            .dynamic_field_screens
            .get(name)
            .map_or(0, BTreeMap::len);
        items.push(ImportPreviewItem {
            name: name.clone(),
            label: item.label.clone(),
            field_type: item.field_type.clone(),
            object_type: item.object_type.clone(),
            exists,
            has_screens: screen_count > 0,
            screen_count,
            will_create: !exists,
            will_overwrite: exists,
        });
    }
    Ok(items)
}

/// Import the selected fields and screen settings of `document`.
///
/// Per-field failures are collected in [`ImportResult::errors`] and do not stop the
/// import. Existing fields are only replaced when `overwrite` is set; the replacement
/// keeps the existing id and internal flag.
///
/// # Errors
///
/// Never fails as a whole; the `Result` is kept for symmetry with [`export`].
pub async fn import(
    repo: &dyn DynamicFieldRepository,
    document: &DynamicFieldExport,
    selected_fields: &[String],
    selected_screens: &[String],
    overwrite: bool,
    user_id: i64,
) -> Result<ImportResult, ExchangeError> {
    let selected_fields: HashSet<&str> = selected_fields.iter().map(String::as_str).collect();
    let selected_screens: HashSet<&str> = selected_screens.iter().map(String::as_str).collect();
    let mut result = ImportResult::default();

    for (name, item) in &document.dynamic_fields {
        if !selected_fields.contains(name.as_str()) {
            continue;
        }

        let Ok(field_type) = item.field_type.parse::<FieldType>() else {
            result
                .errors
                .push(format!("{name}: invalid field type {}", item.field_type));
            continue;
        };
        let Ok(object_type) = item.object_type.parse::<ObjectType>() else {
            result
                .errors
                .push(format!("{name}: invalid object type {}", item.object_type));
            continue;
        };

        let existing = match repo.get_by_name(name).await {
            Ok(existing) => existing,
            Err(e) => {
                result.errors.push(format!("{name}: {e}"));
                continue;
            }
        };

        if existing.is_some() && !overwrite {
            result.skipped.push(name.clone());
            continue;
        }

        let mut field = DynamicField {
            id: 0,
            internal_field: false,
            name: name.clone(),
            label: item.label.clone(),
            field_order: if item.field_order == 0 { 1 } else { item.field_order },
            field_type,
            object_type,
            config: item.config.clone(),
            valid_id: if item.valid_id == 0 { 1 } else { item.valid_id },
        };

        if let Some(existing) = existing {
            field.id = existing.id;
            field.internal_field = existing.internal_field;
            match repo.update(&field, user_id).await {
                Ok(()) => result.updated.push(name.clone()),
                Err(e) => result.errors.push(format!("{name}: failed to update: {e}")),
            }
        } else {
            match repo.create(&field, user_id).await {
                Ok(_) => result.created.push(name.clone()),
                Err(e) => result.errors.push(format!("{name}: failed to create: {e}")),
            }
        }
    }

    for (name, screens) in &document.dynamic_field_screens {
        if !selected_screens.contains(name.as_str()) {
            continue;
        }
        let Ok(Some(field)) = repo.get_by_name(name).await else {
            continue;
        };
        for (screen_key, value) in screens {
            match repo
                .set_screen_config(field.id, screen_key, *value, user_id)
                .await
            {
                Ok(()) => result.screens_ok += 1,
                Err(e) => result
                    .errors
                    .push(format!("{name} screen {screen_key}: {e}")),
            }
        }
    }

    result.created.sort();
    result.updated.sort();
    result.skipped.sort();
    result.errors.sort();

    tracing::info!(
        created = result.created.len(),
        updated = result.updated.len(),
        skipped = result.skipped.len(),
        errors = result.errors.len(),
        screens_ok = result.screens_ok,
        "dynamic field import finished"
    );
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r"
DynamicFields:
  Severity:
    Name: Severity
    Label: Severity
    FieldType: Dropdown
    ObjectType: Ticket
    FieldOrder: 3
    ValidID: 1
    Config:
      PossibleValues:
        high: High
        low: Low
  Broken:
    Name: Broken
    Label: Broken
    FieldType: Hologram
    ObjectType: Ticket
DynamicFieldScreens:
  Severity:
    AgentTicketZoom: 1
    AgentTicketCreate: 2
";

    #[test]
    fn test_parse_document() {
        let doc = DynamicFieldExport::parse_yaml(DOCUMENT).unwrap();
        assert_eq!(doc.dynamic_fields.len(), 2);
        let severity = &doc.dynamic_fields["Severity"];
        assert_eq!(severity.field_order, 3);
        assert_eq!(
            severity
                .config
                .as_ref()
                .and_then(|c| c.possible_values.as_ref())
                .map(BTreeMap::len),
            Some(2)
        );
        assert_eq!(doc.dynamic_field_screens["Severity"]["AgentTicketCreate"], 2);
        // Missing numeric keys default to zero.
        assert_eq!(doc.dynamic_fields["Broken"].valid_id, 0);
    }

    #[test]
    fn test_missing_section() {
        let err = DynamicFieldExport::parse_yaml("DynamicFieldScreens: {}\n").unwrap_err();
        assert_eq!(err, ExchangeError::MissingSection);
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            DynamicFieldExport::parse_yaml("DynamicFields: [unclosed"),
            Err(ExchangeError::Yaml(_))
        ));
    }

    #[test]
    fn test_yaml_omits_empty_screens() {
        let mut doc = DynamicFieldExport::parse_yaml(DOCUMENT).unwrap();
        doc.dynamic_field_screens.clear();
        let yaml = doc.to_yaml().unwrap();
        assert!(yaml.contains("DynamicFields:"));
        assert!(!yaml.contains("DynamicFieldScreens"));
        assert!(yaml.contains("ValidID: 1"));

        let back = DynamicFieldExport::parse_yaml(&yaml).unwrap();
        assert_eq!(back, doc);
    }
}
