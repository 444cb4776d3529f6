//! `df_*` query parameter parsing and SQL predicate generation.
//!
//! Ticket search accepts dynamic field filters as query parameters:
//!
//! ```text
//! ?df_Customer=acme&df_Severity_in=high,critical&df_Budget_gte=1000
//! ```
//!
//! Each filter becomes an `EXISTS` sub-select against `dynamic_field_value`, keyed on
//! the outer query's `t.id`. Field names are restricted to ASCII alphanumerics and
//! every value is bound as a placeholder, never interpolated.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Prefix that marks a query parameter as a dynamic field filter.
pub const QUERY_PREFIX: &str = "df_";

/// Errors from building filter SQL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Field name contains characters other than ASCII letters and digits.
    #[error("invalid dynamic field name: {0:?}")]
    InvalidFieldName(String),

    /// An `in` filter with no values left after trimming.
    #[error("empty value list for dynamic field {0}")]
    EmptyList(String),
}

/// Comparison applied to a dynamic field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Exact text match.
    Eq,
    /// Text inequality.
    Ne,
    /// Case-insensitive substring match.
    Contains,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Membership in a comma-separated list.
    In,
}

impl FilterOperator {
    /// Query parameter suffix for this operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Contains => "contains",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
        }
    }

    /// Parse a query parameter suffix.
    #[must_use]
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "contains" => Some(Self::Contains),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            _ => None,
        }
    }

    const fn sql_comparison(self) -> Option<&'static str> {
        match self {
            Self::Gt => Some(">"),
            Self::Gte => Some(">="),
            Self::Lt => Some("<"),
            Self::Lte => Some("<="),
            _ => None,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed `df_*` filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicFieldFilter {
    /// Dynamic field name (without the `DynamicField_` prefix).
    pub field_name: String,
    /// Comparison operator.
    pub operator: FilterOperator,
    /// Raw value from the query string.
    pub value: String,
}

/// Bind value produced by [`build_filter_sql`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlArg {
    /// Bound as `TEXT`.
    Text(String),
    /// Bound as `TEXT[]`.
    TextList(Vec<String>),
}

/// Extract dynamic field filters from query parameter pairs.
///
/// `df_<Name>` filters with `eq`; `df_<Name>_<op>` uses the operator named by the
/// suffix. A suffix that is not an operator stays part of the name. Pairs without the
/// prefix and pairs with a blank value are ignored. The result is sorted by field name,
/// then operator, so the generated SQL is stable.
pub fn parse_filters_from_query<'a, I>(pairs: I) -> Vec<DynamicFieldFilter>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut filters: Vec<DynamicFieldFilter> = pairs
        .into_iter()
        .filter_map(|(key, value)| {
            let rest = key.strip_prefix(QUERY_PREFIX)?;
            if value.trim().is_empty() || rest.is_empty() {
                return None;
            }
            let (field_name, operator) = match rest.rsplit_once('_') {
                Some((name, suffix)) if !name.is_empty() => FilterOperator::from_suffix(suffix)
                    .map_or((rest, FilterOperator::Eq), |op| (name, op)),
                _ => (rest, FilterOperator::Eq),
            };
            Some(DynamicFieldFilter {
                field_name: field_name.to_string(),
                operator,
                value: value.to_string(),
            })
        })
        .collect();

    filters.sort_by(|a, b| {
        a.field_name
            .cmp(&b.field_name)
            .then(a.operator.cmp(&b.operator))
    });
    filters
}

/// Build an `AND`-joined SQL predicate for `filters`.
///
/// Placeholders are numbered from `first_placeholder`; the returned arguments are in
/// placeholder order. The predicate references the outer ticket alias `t`.
///
/// # Errors
///
/// Returns [`FilterError`] for a field name outside `[A-Za-z0-9]+` or an `in` filter
/// without values.
pub fn build_filter_sql(
    filters: &[DynamicFieldFilter],
    first_placeholder: usize,
) -> Result<(String, Vec<SqlArg>), FilterError> {
    let mut clauses = Vec::with_capacity(filters.len());
    let mut args = Vec::with_capacity(filters.len() * 2);
    let mut next = first_placeholder;

    for filter in filters {
        if !is_valid_field_name(&filter.field_name) {
            return Err(FilterError::InvalidFieldName(filter.field_name.clone()));
        }

        let name_ph = next;
        let value_ph = next + 1;
        next += 2;
        args.push(SqlArg::Text(filter.field_name.clone()));

        let condition = match filter.operator {
            FilterOperator::Eq => {
                args.push(SqlArg::Text(filter.value.clone()));
                format!("dfv.value_text = ${value_ph}")
            }
            FilterOperator::Ne => {
                args.push(SqlArg::Text(filter.value.clone()));
                format!("dfv.value_text <> ${value_ph}")
            }
            FilterOperator::Contains => {
                args.push(SqlArg::Text(format!("%{}%", escape_like(&filter.value))));
                format!("dfv.value_text ILIKE ${value_ph}")
            }
            FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
                let cmp = filter.operator.sql_comparison().unwrap_or("=");
                args.push(SqlArg::Text(filter.value.clone()));
                format!(
                    "COALESCE(dfv.value_int::text, dfv.value_date::text, dfv.value_text) {cmp} ${value_ph}"
                )
            }
            FilterOperator::In => {
                let values: Vec<String> = filter
                    .value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(ToString::to_string)
                    .collect();
                if values.is_empty() {
                    return Err(FilterError::EmptyList(filter.field_name.clone()));
                }
                args.push(SqlArg::TextList(values));
                format!("dfv.value_text = ANY(${value_ph})")
            }
        };

        clauses.push(format!(
            "EXISTS (SELECT 1 FROM dynamic_field_value dfv \
             JOIN dynamic_field df ON df.id = dfv.field_id \
             WHERE dfv.object_id = t.id AND df.name = ${name_ph} AND {condition})"
        ));
    }

    Ok((clauses.join(" AND "), args))
}

fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Escape `LIKE` metacharacters using PostgreSQL's default `\` escape.
///
/// Wrapping the result in `%...%` gives a literal substring pattern.
#[must_use]
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn filter(name: &str, operator: FilterOperator, value: &str) -> DynamicFieldFilter {
        DynamicFieldFilter {
            field_name: name.to_string(),
            operator,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_parse_operators_and_defaults() {
        let filters = parse_filters_from_query([
            ("df_Severity_in", "high,critical"),
            ("df_Customer", "acme"),
            ("df_Budget_gte", "1000"),
            ("queue_id", "3"),
            ("df_Empty", "  "),
        ]);

        assert_eq!(
            filters,
            vec![
                filter("Budget", FilterOperator::Gte, "1000"),
                filter("Customer", FilterOperator::Eq, "acme"),
                filter("Severity", FilterOperator::In, "high,critical"),
            ]
        );
    }

    #[test]
    fn test_unknown_suffix_stays_in_name() {
        let filters = parse_filters_from_query([("df_Due_Date", "2025-01-01")]);
        assert_eq!(filters[0].field_name, "Due_Date");
        assert_eq!(filters[0].operator, FilterOperator::Eq);
    }

    #[test]
    fn test_same_field_sorted_by_operator() {
        let filters = parse_filters_from_query([("df_Budget_lt", "10"), ("df_Budget_gt", "1")]);
        let ops: Vec<_> = filters.iter().map(|f| f.operator).collect();
        assert_eq!(ops, vec![FilterOperator::Gt, FilterOperator::Lt]);
    }

    #[test]
    fn test_empty_filters_build_nothing() {
        let (sql, args) = build_filter_sql(&[], 1).unwrap();
        assert!(sql.is_empty());
        assert!(args.is_empty());
    }

    #[test]
    fn test_eq_clause_and_placeholders() {
        let (sql, args) =
            build_filter_sql(&[filter("Customer", FilterOperator::Eq, "acme")], 3).unwrap();

        assert!(sql.starts_with("EXISTS (SELECT 1 FROM dynamic_field_value dfv"));
        assert!(sql.contains("dfv.object_id = t.id"));
        assert!(sql.contains("df.name = $3"));
        assert!(sql.contains("dfv.value_text = $4"));
        assert_eq!(
            args,
            vec![SqlArg::Text("Customer".into()), SqlArg::Text("acme".into())]
        );
    }

    #[test]
    fn test_multiple_filters_joined_with_and() {
        let (sql, args) = build_filter_sql(
            &[
                filter("A", FilterOperator::Ne, "x"),
                filter("B", FilterOperator::Lte, "5"),
            ],
            1,
        )
        .unwrap();

        assert_eq!(sql.matches("EXISTS").count(), 2);
        assert!(sql.contains(") AND EXISTS"));
        assert!(sql.contains("dfv.value_text <> $2"));
        assert!(sql.contains(
            "COALESCE(dfv.value_int::text, dfv.value_date::text, dfv.value_text) <= $4"
        ));
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn test_contains_escapes_wildcards() {
        let (sql, args) =
            build_filter_sql(&[filter("Note", FilterOperator::Contains, "50%_off")], 1).unwrap();
        assert!(sql.contains("dfv.value_text ILIKE $2"));
        assert_eq!(args[1], SqlArg::Text("%50\\%\\_off%".into()));
    }

    #[test]
    fn test_escape_like_is_literal() {
        assert_eq!(escape_like("s_x"), "s\\_x");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("support"), "support");
    }

    #[test]
    fn test_in_splits_and_trims() {
        let (sql, args) =
            build_filter_sql(&[filter("Severity", FilterOperator::In, " high, ,critical ")], 1)
                .unwrap();
        assert!(sql.contains("dfv.value_text = ANY($2)"));
        assert_eq!(
            args[1],
            SqlArg::TextList(vec!["high".into(), "critical".into()])
        );
    }

    #[test]
    fn test_in_with_only_separators_is_error() {
        let err = build_filter_sql(&[filter("Severity", FilterOperator::In, " , ")], 1);
        assert_eq!(err, Err(FilterError::EmptyList("Severity".into())));
    }

    #[test]
    fn test_injection_in_name_rejected() {
        let err = build_filter_sql(
            &[filter("x' OR 1=1 --", FilterOperator::Eq, "y")],
            1,
        );
        assert!(matches!(err, Err(FilterError::InvalidFieldName(_))));
    }

    #[test]
    fn test_underscore_name_rejected_at_build() {
        let filters = parse_filters_from_query([("df_Due_Date", "2025-01-01")]);
        assert!(matches!(
            build_filter_sql(&filters, 1),
            Err(FilterError::InvalidFieldName(_))
        ));
    }
}
