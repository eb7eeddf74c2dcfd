//! Song form, melody and harmony tables from a symbolic-music timeline.
//!
//! A parsed [`Timeline`] (notes, rests, chord symbols and structural
//! markers) is normalized, walked once by the segmentation pass and
//! rendered into relational tables at four granularities: track, section,
//! phrase and note/chord. Comprehensive mode adds nine summary tables.
//! Every table set can be checked against the declared [`Schema`] before
//! it goes anywhere.
//!
//! ```
//! use songform::{process, validation_message, Mode, Schema, Timeline, SUCCESS};
//!
//! let timeline: Timeline = serde_json::from_str(r#"{
//!     "artist": "Test Band", "title": "Song", "duration": 4.0,
//!     "events": [
//!         { "offset": 0.0, "measure": 1, "beat": 1.0, "type": "phrase_start" },
//!         { "offset": 0.0, "measure": 1, "beat": 1.0, "type": "note", "name": "C",
//!           "octave": 4, "midi": 60, "pitch_class": 0, "duration": 4.0 },
//!         { "offset": 0.0, "measure": 1, "beat": 1.0, "type": "phrase_end" }
//!     ]
//! }"#).unwrap();
//!
//! let tables = process(&timeline, Mode::Basic).unwrap();
//! assert_eq!(validation_message(&tables, Schema::standard()), SUCCESS);
//! ```

pub mod aggregate;
pub mod boundaries;
pub mod features;
pub mod ids;
pub mod rows;
pub mod schema;
pub mod segment;
pub mod stats;
pub mod table;
pub mod timeline;
pub mod validate;

pub use aggregate::{find_chorus, summarize, Summary};
pub use schema::{ColumnSpec, Schema, TableSpec, BASIC_TABLES, EXTENDED_TABLES};
pub use segment::{segment, BaseTables};
pub use table::{Column, Table, TableSet, Value, ValueType};
pub use timeline::{NormalizedTimeline, Timeline, TimelineError};
pub use validate::{validate, validation_message, ValidationError, SUCCESS};

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid timeline: {0}")]
    Timeline(#[from] TimelineError),

    #[error("no chorus section could be designated")]
    ChorusNotFound,

    #[error("row refers to unknown section {0}")]
    UnknownSection(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Which tables a run produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// The six base tables.
    #[default]
    Basic,
    /// Base tables plus the nine summary tables.
    Comprehensive,
}

impl Mode {
    pub fn from_flag(comprehensive: bool) -> Self {
        if comprehensive {
            Mode::Comprehensive
        } else {
            Mode::Basic
        }
    }

    pub fn is_comprehensive(self) -> bool {
        self == Mode::Comprehensive
    }
}

/// Normalize, segment and render the tables for `mode`.
pub fn process(timeline: &Timeline, mode: Mode) -> Result<TableSet> {
    let normalized = timeline.normalize()?;
    let base = segment(&normalized);
    let mut tables = base.to_tables();
    if mode.is_comprehensive() {
        tables.extend(summarize(&base)?.to_tables());
    }
    info!(track = %base.track.id, tables = tables.len(), ?mode, "processed timeline");
    Ok(tables)
}

/// Result of the service surface: the tables, or the failure text.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Tables(TableSet),
    Failed { message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Tables(_))
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Outcome::Tables(tables) => tables.serialize(serializer),
            Outcome::Failed { message } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error message", message)?;
                map.end()
            }
        }
    }
}

/// Process and gate the result on the validator.
pub fn process_and_validate(timeline: &Timeline, mode: Mode) -> Outcome {
    let tables = match process(timeline, mode) {
        Ok(tables) => tables,
        Err(err) => {
            warn!(error = %err, "processing failed");
            return Outcome::Failed {
                message: err.to_string(),
            };
        }
    };
    match validate(&tables, Schema::standard()) {
        Ok(()) => Outcome::Tables(tables),
        Err(err) => {
            warn!(table = err.table(), error = %err, "validation failed");
            Outcome::Failed {
                message: err.to_string(),
            }
        }
    }
}
