//! Dynamic field definitions and screen settings.

use crate::{db_error, flag};
use helpdesk_core::dynamic_field::{
    DynamicField, DynamicFieldConfig, DynamicFieldRepository, ObjectType, ScreenConfig,
};
use helpdesk_core::{StoreError, StoreFuture};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const FIELD_COLUMNS: &str =
    "id, internal_field, name, label, field_order, field_type, object_type, config, valid_id";

/// Dynamic field store over `dynamic_field` and `dynamic_field_screen_config`.
///
/// The `config` column holds YAML.
#[derive(Clone, Debug)]
pub struct PostgresDynamicFieldStore {
    pool: PgPool,
}

impl PostgresDynamicFieldStore {
    /// Create a store over `pool`.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_field(row: &PgRow) -> Result<DynamicField, StoreError> {
        let internal: i16 = row.get("internal_field");
        let valid_id: i16 = row.get("valid_id");
        let field_type: String = row.get("field_type");
        let object_type: String = row.get("object_type");
        let config: Option<String> = row.get("config");
        Ok(DynamicField {
            id: row.get("id"),
            internal_field: internal != 0,
            name: row.get("name"),
            label: row.get("label"),
            field_order: row.get("field_order"),
            field_type: field_type
                .parse()
                .map_err(|_| StoreError::Database(format!("unknown field type {field_type}")))?,
            object_type: object_type
                .parse()
                .map_err(|_| StoreError::Database(format!("unknown object type {object_type}")))?,
            config: config
                .as_deref()
                .map(DynamicFieldConfig::from_yaml)
                .transpose()?,
            valid_id: i32::from(valid_id),
        })
    }
}

fn config_column(field: &DynamicField) -> Result<Option<String>, StoreError> {
    field.config.as_ref().map(DynamicFieldConfig::to_yaml).transpose()
}

fn valid_id(field: &DynamicField) -> Result<i16, StoreError> {
    i16::try_from(field.valid_id)
        .map_err(|_| StoreError::Validation(format!("invalid valid_id {}", field.valid_id)))
}

impl DynamicFieldRepository for PostgresDynamicFieldStore {
    fn list(&self, object_type: Option<ObjectType>) -> StoreFuture<'_, Vec<DynamicField>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "SELECT {FIELD_COLUMNS} FROM dynamic_field \
                 WHERE $1::TEXT IS NULL OR object_type = $1 \
                 ORDER BY field_order, name"
            ))
            .bind(object_type.map(|o| o.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
            rows.iter().map(Self::row_to_field).collect()
        })
    }

    fn get_by_name<'a>(&'a self, name: &'a str) -> StoreFuture<'a, Option<DynamicField>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {FIELD_COLUMNS} FROM dynamic_field WHERE name = $1"
            ))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
            row.as_ref().map(Self::row_to_field).transpose()
        })
    }

    fn create<'a>(&'a self, field: &'a DynamicField, user_id: i64) -> StoreFuture<'a, i64> {
        Box::pin(async move {
            let (id,): (i64,) = sqlx::query_as(
                r"
                INSERT INTO dynamic_field (
                    internal_field, name, label, field_order, field_type, object_type,
                    config, valid_id, create_time, create_by, change_time, change_by
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), $9, NOW(), $9)
                RETURNING id
                ",
            )
            .bind(flag(field.internal_field))
            .bind(&field.name)
            .bind(&field.label)
            .bind(field.field_order)
            .bind(field.field_type.as_str())
            .bind(field.object_type.as_str())
            .bind(config_column(field)?)
            .bind(valid_id(field)?)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

            tracing::info!(field_id = id, name = %field.name, field_type = %field.field_type, "dynamic field created");
            Ok(id)
        })
    }

    fn update<'a>(&'a self, field: &'a DynamicField, user_id: i64) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE dynamic_field
                SET label = $1, field_order = $2, field_type = $3, object_type = $4,
                    config = $5, valid_id = $6, change_time = NOW(), change_by = $7
                WHERE id = $8
                ",
            )
            .bind(&field.label)
            .bind(field.field_order)
            .bind(field.field_type.as_str())
            .bind(field.object_type.as_str())
            .bind(config_column(field)?)
            .bind(valid_id(field)?)
            .bind(user_id)
            .bind(field.id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::not_found("dynamic field", field.id));
            }
            tracing::info!(field_id = field.id, name = %field.name, "dynamic field updated");
            Ok(())
        })
    }

    fn screen_configs(&self, field_id: i64) -> StoreFuture<'_, Vec<ScreenConfig>> {
        Box::pin(async move {
            let rows: Vec<(String, i16)> = sqlx::query_as(
                r"
                SELECT screen_key, config_value
                FROM dynamic_field_screen_config
                WHERE field_id = $1
                ORDER BY screen_key
                ",
            )
            .bind(field_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
            Ok(rows
                .into_iter()
                .map(|(screen_key, value)| ScreenConfig {
                    field_id,
                    screen_key,
                    config_value: i32::from(value),
                })
                .collect())
        })
    }

    fn set_screen_config<'a>(
        &'a self,
        field_id: i64,
        screen_key: &'a str,
        value: i32,
        user_id: i64,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let value = i16::try_from(value)
                .map_err(|_| StoreError::Validation(format!("invalid screen value {value}")))?;
            sqlx::query(
                r"
                INSERT INTO dynamic_field_screen_config
                    (field_id, screen_key, config_value, create_time, create_by, change_time, change_by)
                VALUES ($1, $2, $3, NOW(), $4, NOW(), $4)
                ON CONFLICT (field_id, screen_key) DO UPDATE
                SET config_value = EXCLUDED.config_value, change_time = NOW(), change_by = EXCLUDED.change_by
                ",
            )
            .bind(field_id)
            .bind(screen_key)
            .bind(value)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
            Ok(())
        })
    }
}
