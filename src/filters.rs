//! Whitelisted equality filters and `ordering` for list endpoints.
//!
//! Parameters naming fields outside a resource's whitelist are ignored. A
//! whitelisted field with an unparseable value is a validation error.

use std::collections::BTreeMap;

use sea_orm::{
    ColumnTrait, EntityTrait, Iterable, Order, PrimaryKeyToColumn, QueryFilter, QueryOrder,
    Select, Value,
};
use serde_json::json;
use uuid::Uuid;

use crate::error::{ApiError, validation_error};

pub const ORDERING_PARAM: &str = "ordering";

/// How a query-string value is parsed for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Uuid,
    Integer,
    Boolean,
    Text,
}

/// A public query parameter name bound to a column.
#[derive(Debug, Clone, Copy)]
pub struct QueryField<C> {
    pub name: &'static str,
    pub column: C,
    pub kind: FieldKind,
}

impl<C> QueryField<C> {
    pub const fn new(name: &'static str, column: C, kind: FieldKind) -> Self {
        Self { name, column, kind }
    }
}

impl FieldKind {
    fn parse(self, raw: &str) -> Result<Value, &'static str> {
        match self {
            FieldKind::Uuid => Uuid::parse_str(raw.trim())
                .map(Value::from)
                .map_err(|_| "Enter a valid UUID."),
            FieldKind::Integer => raw
                .trim()
                .parse::<i32>()
                .map(Value::from)
                .map_err(|_| "Enter a whole number."),
            FieldKind::Boolean => match raw.trim() {
                "true" | "True" | "1" => Ok(Value::from(true)),
                "false" | "False" | "0" => Ok(Value::from(false)),
                _ => Err("Select a valid choice. Use true or false."),
            },
            FieldKind::Text => Ok(Value::from(raw.to_string())),
        }
    }
}

/// Apply every whitelisted `field=value` pair as an equality filter.
pub fn apply_filters<E>(
    mut select: Select<E>,
    params: &[(String, String)],
    fields: &[QueryField<E::Column>],
) -> Result<Select<E>, ApiError>
where
    E: EntityTrait,
    E::Column: Copy,
{
    let mut errors: BTreeMap<&'static str, Vec<&'static str>> = BTreeMap::new();

    for (key, raw) in params {
        let Some(field) = fields.iter().find(|field| field.name == key) else {
            continue;
        };
        match field.kind.parse(raw) {
            Ok(value) => select = select.filter(field.column.eq(value)),
            Err(message) => errors.entry(field.name).or_default().push(message),
        }
    }

    if errors.is_empty() {
        Ok(select)
    } else {
        Err(validation_error("Invalid filter value", json!(errors)))
    }
}

/// Apply `ordering=a,-b`, then the primary key as the final tiebreaker.
pub fn apply_ordering<E>(
    mut select: Select<E>,
    params: &[(String, String)],
    fields: &[QueryField<E::Column>],
) -> Select<E>
where
    E: EntityTrait,
    E::Column: Copy,
{
    let terms = params
        .iter()
        .filter(|(key, _)| key == ORDERING_PARAM)
        .flat_map(|(_, value)| value.split(','))
        .map(str::trim)
        .filter(|term| !term.is_empty());

    for term in terms {
        let (name, order) = match term.strip_prefix('-') {
            Some(name) => (name, Order::Desc),
            None => (term, Order::Asc),
        };
        if let Some(field) = fields.iter().find(|field| field.name == name) {
            select = select.order_by(field.column, order);
        }
    }

    for key in E::PrimaryKey::iter() {
        select = select.order_by(key.into_column(), Order::Asc);
    }

    select
}

/// Filters then ordering, the usual preparation for a list query.
pub fn filter_and_order<E>(
    select: Select<E>,
    params: &[(String, String)],
    fields: &[QueryField<E::Column>],
) -> Result<Select<E>, ApiError>
where
    E: EntityTrait,
    E::Column: Copy,
{
    let select = apply_filters(select, params, fields)?;
    Ok(apply_ordering(select, params, fields))
}
