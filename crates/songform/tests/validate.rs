use std::path::PathBuf;

use pretty_assertions::assert_eq;
use songform::{
    process, validate, validation_message, Column, Mode, Schema, Table, TableSet, Timeline,
    ValidationError, Value, SUCCESS,
};

fn processed() -> TableSet {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/two_sections.json");
    let text = std::fs::read_to_string(path).unwrap();
    process(&Timeline::from_json(&text).unwrap(), Mode::Basic).unwrap()
}

/// Copy of `tables` with one table's columns passed through `edit`.
fn edited(tables: &TableSet, name: &str, edit: impl Fn(&mut Vec<Column>)) -> TableSet {
    tables
        .tables()
        .iter()
        .map(|table| {
            if table.name() != name {
                return table.clone();
            }
            let mut columns = table.columns().to_vec();
            edit(&mut columns);
            Table::with_columns(name, columns)
        })
        .collect()
}

fn floats(values: &[f64]) -> Vec<Value> {
    values.iter().map(|v| Value::Float(*v)).collect()
}

#[test]
fn uneven_columns_name_the_table() {
    let tables: TableSet = [Table::with_columns(
        "sections",
        vec![
            Column {
                name: "sec_start_offset".into(),
                values: floats(&[0.0, 1.0, 2.0, 3.0, 4.0]),
            },
            Column {
                name: "sec_end_offset".into(),
                values: floats(&[1.0, 2.0, 3.0, 4.0]),
            },
        ],
    )]
    .into_iter()
    .collect();

    let message = validation_message(&tables, Schema::standard());
    assert_ne!(message, SUCCESS);
    assert!(message.contains("sections"), "{message}");
    assert_eq!(
        validate(&tables, Schema::standard()),
        Err(ValidationError::UnevenColumns {
            table: "sections".into()
        })
    );
}

#[test]
fn undeclared_null_names_the_column() {
    let tables = edited(&processed(), "sections", |columns| {
        if let Some(column) = columns.iter_mut().find(|c| c.name == "sec_total_dur") {
            column.values[1] = Value::Null;
        }
    });
    let message = validation_message(&tables, Schema::standard());
    assert!(message.contains("sec_total_dur"), "{message}");
    assert!(message.contains("nullable"), "{message}");
}

#[test]
fn nulls_are_fine_in_whitelisted_columns() {
    let tables = processed();
    let mp_ids = tables
        .get("notes")
        .and_then(|t| t.column("mp_id"))
        .unwrap();
    assert!(mp_ids.iter().any(Value::is_null));
    assert_eq!(validation_message(&tables, Schema::standard()), SUCCESS);
}

#[test]
fn wrong_type_is_reported() {
    let tables = edited(&processed(), "tracks", |columns| {
        if let Some(column) = columns.iter_mut().find(|c| c.name == "bpm") {
            column.values = vec![Value::Str("fast".into())];
        }
    });
    let err = validate(&tables, Schema::standard()).unwrap_err();
    assert_eq!(err.table(), "tracks");
    assert!(err.to_string().contains("bpm"));
}

#[test]
fn empty_tables_fail() {
    let tables = edited(&processed(), "melodic_phrases", |columns| {
        for column in columns.iter_mut() {
            column.values.clear();
        }
    });
    assert_eq!(
        validate(&tables, Schema::standard()),
        Err(ValidationError::EmptyTable {
            table: "melodic_phrases".into()
        })
    );
}

#[test]
fn first_failing_table_wins() {
    let base = processed();
    let tables = edited(&base, "chords", |columns| {
        columns[0].values.pop();
    });
    let tables = edited(&tables, "notes", |columns| {
        columns[0].values.pop();
    });
    assert_eq!(
        validate(&tables, Schema::standard()).map_err(|e| e.table().to_string()),
        Err("notes".to_string())
    );
}
