//! Structural checks a table set must pass before it reaches a sink.

use std::collections::BTreeSet;

use crate::schema::Schema;
use crate::table::{Table, TableSet, ValueType};

/// Canonical success string.
pub const SUCCESS: &str = "all values validated!";

/// First structural violation found. `Display` yields the canonical
/// failure text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("number of values is not the same for each column in {table}")]
    UnevenColumns { table: String },

    #[error("table {table} has no values")]
    EmptyTable { table: String },

    #[error("table '{table}' is not declared")]
    UndeclaredTable { table: String },

    #[error("'{column}' in table '{table}' is not declared")]
    UndeclaredColumn { table: String, column: String },

    #[error("declared column '{column}' is missing from table '{table}'")]
    MissingColumn { table: String, column: String },

    #[error("'{column}' in table '{table}' is type {actual}, expected type {expected}")]
    WrongType {
        table: String,
        column: String,
        actual: String,
        expected: ValueType,
    },

    #[error("Value Error: '{column}' in table '{table}' has multiple types: {types}")]
    MixedTypes {
        table: String,
        column: String,
        types: String,
    },

    #[error("Value Error: '{column}' in table '{table}' has null values, but isn't in list of nullable columns")]
    UnexpectedNull { table: String, column: String },

    #[error("Value Error: '{column}' in table '{table}' has data types {types}, expected {expected}")]
    NullableMismatch {
        table: String,
        column: String,
        types: String,
        expected: ValueType,
    },
}

impl ValidationError {
    pub fn table(&self) -> &str {
        match self {
            ValidationError::UnevenColumns { table }
            | ValidationError::EmptyTable { table }
            | ValidationError::UndeclaredTable { table }
            | ValidationError::UndeclaredColumn { table, .. }
            | ValidationError::MissingColumn { table, .. }
            | ValidationError::WrongType { table, .. }
            | ValidationError::MixedTypes { table, .. }
            | ValidationError::UnexpectedNull { table, .. }
            | ValidationError::NullableMismatch { table, .. } => table,
        }
    }
}

/// Runtime types seen in a column; `None` stands for null.
type TypeSet = BTreeSet<Option<ValueType>>;

fn render_types(types: &TypeSet) -> String {
    // non-null types first, null last
    let mut names: Vec<&str> = types.iter().flatten().map(|t| t.as_str()).collect();
    if types.contains(&None) {
        names.push("null");
    }
    names.join(", ")
}

/// Check every table in set order; the first violation wins.
pub fn validate(tables: &TableSet, schema: &Schema) -> Result<(), ValidationError> {
    tables
        .tables()
        .iter()
        .try_for_each(|table| validate_table(table, schema))
}

/// The canonical success string, or the failure text.
pub fn validation_message(tables: &TableSet, schema: &Schema) -> String {
    match validate(tables, schema) {
        Ok(()) => SUCCESS.to_string(),
        Err(err) => err.to_string(),
    }
}

fn validate_table(table: &Table, schema: &Schema) -> Result<(), ValidationError> {
    let name = table.name().to_string();
    let lengths: BTreeSet<usize> = table.columns().iter().map(|c| c.values.len()).collect();
    if lengths.len() != 1 {
        return Err(ValidationError::UnevenColumns { table: name });
    }
    if table.n_rows() == 0 {
        return Err(ValidationError::EmptyTable { table: name });
    }

    let spec = schema
        .table(&name)
        .ok_or_else(|| ValidationError::UndeclaredTable {
            table: name.clone(),
        })?;
    for column in table.columns() {
        if spec.column(&column.name).is_none() {
            return Err(ValidationError::UndeclaredColumn {
                table: name,
                column: column.name.clone(),
            });
        }
    }
    for declared in &spec.columns {
        if table.column(&declared.name).is_none() {
            return Err(ValidationError::MissingColumn {
                table: name,
                column: declared.name.clone(),
            });
        }
    }

    for column in table.columns() {
        let Some(declared) = spec.column(&column.name) else {
            continue;
        };
        let types: TypeSet = column.values.iter().map(|v| v.value_type()).collect();
        let column_name = column.name.clone();

        if types.len() == 1 {
            let actual = types.iter().next().copied().flatten();
            match actual {
                Some(ty) if ty == declared.ty => {}
                None if declared.nullable => {}
                _ => {
                    return Err(ValidationError::WrongType {
                        table: name,
                        column: column_name,
                        actual: render_types(&types),
                        expected: declared.ty,
                    })
                }
            }
            continue;
        }

        if !types.contains(&None) {
            return Err(ValidationError::MixedTypes {
                table: name,
                column: column_name,
                types: render_types(&types),
            });
        }
        if !declared.nullable {
            return Err(ValidationError::UnexpectedNull {
                table: name,
                column: column_name,
            });
        }
        let expected: TypeSet = [Some(declared.ty), None].into_iter().collect();
        if types != expected {
            return Err(ValidationError::NullableMismatch {
                table: name,
                column: column_name,
                types: render_types(&types),
                expected: declared.ty,
            });
        }
    }
    Ok(())
}
