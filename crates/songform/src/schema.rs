//! Declared tables: ordered columns, expected types and the nullable
//! whitelist.

use std::sync::OnceLock;

use serde::Serialize;

use crate::table::ValueType;
use crate::table::ValueType::{Bool, Float, Int, Str};

/// Tables produced by every run.
pub const BASIC_TABLES: [&str; 6] = [
    "tracks",
    "sections",
    "melodic_phrases",
    "harmonic_phrases",
    "notes",
    "chords",
];

/// Summary tables produced in comprehensive mode.
pub const EXTENDED_TABLES: [&str; 9] = [
    "tracks_form",
    "tracks_melody",
    "tracks_harmony",
    "sections_form",
    "sections_melody",
    "sections_harmony",
    "melodic_phrases_details",
    "harmonic_phrases_details",
    "notes_details",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub tables: Vec<TableSpec>,
}

impl Schema {
    /// The registry for every table this crate produces.
    pub fn standard() -> &'static Schema {
        static STANDARD: OnceLock<Schema> = OnceLock::new();
        STANDARD.get_or_init(build_standard)
    }

    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// The declarations for one processing mode, in output order.
    pub fn for_mode(&self, comprehensive: bool) -> Schema {
        let names: Vec<&str> = if comprehensive {
            BASIC_TABLES.iter().chain(EXTENDED_TABLES.iter()).copied().collect()
        } else {
            BASIC_TABLES.to_vec()
        };
        Schema {
            tables: names
                .into_iter()
                .filter_map(|name| self.table(name).cloned())
                .collect(),
        }
    }
}

/// Column list builder. `req` adds a non-null column, `opt` a whitelisted
/// nullable one.
#[derive(Default)]
struct Cols(Vec<ColumnSpec>);

impl Cols {
    fn push(mut self, name: impl Into<String>, ty: ValueType, nullable: bool) -> Self {
        self.0.push(ColumnSpec {
            name: name.into(),
            ty,
            nullable,
        });
        self
    }

    fn req(self, name: impl Into<String>, ty: ValueType) -> Self {
        self.push(name, ty, false)
    }

    fn opt(self, name: impl Into<String>, ty: ValueType) -> Self {
        self.push(name, ty, true)
    }

    fn req_all(self, names: &[&str], ty: ValueType) -> Self {
        names.iter().fold(self, |cols, name| cols.req(*name, ty))
    }

    fn opt_all(self, names: &[&str], ty: ValueType) -> Self {
        names.iter().fold(self, |cols, name| cols.opt(*name, ty))
    }

    fn table(self, name: &str) -> TableSpec {
        TableSpec {
            name: name.to_string(),
            columns: self.0,
        }
    }
}

fn build_standard() -> Schema {
    let mut tables = vec![
        tracks(),
        sections(),
        phrases("melodic_phrases", "mp"),
        phrases("harmonic_phrases", "hp"),
        notes(),
        chords(),
    ];
    for (f, name) in [("track", "tracks"), ("sec", "sections")] {
        tables.push(form(f).table(&format!("{name}_form")));
        tables.push(melody(f).table(&format!("{name}_melody")));
        tables.push(harmony(f).table(&format!("{name}_harmony")));
    }
    tables.push(melodic_details());
    tables.push(harmonic_details());
    tables.push(notes_details());
    Schema { tables }
}

fn tracks() -> TableSpec {
    Cols::default()
        .req_all(&["track_id", "artist", "track_name"], Str)
        .req("key_sig_n_sharps", Int)
        .req("time_sig", Str)
        .req_all(&["bpm", "bpm_ql", "track_total_dur"], Float)
        .table("tracks")
}

fn sections() -> TableSpec {
    Cols::default()
        .req_all(&["sec_id", "track_id", "sec_name"], Str)
        .req("sec_total_dur", Float)
        .req_all(&["sec_n_mp", "sec_n_hp"], Int)
        .req_all(
            &[
                "sec_start_offset",
                "sec_end_offset",
                "sec_start_m1b1_offset",
                "sec_end_m1b1_offset",
            ],
            Float,
        )
        .table("sections")
}

fn phrases(name: &str, p: &str) -> TableSpec {
    Cols::default()
        .req(format!("{p}_id"), Str)
        .req("sec_id", Str)
        .req(format!("{p}_num_in_sec"), Int)
        .req(format!("{p}_total_dur"), Float)
        .req(format!("{p}_start_offset"), Float)
        .req(format!("{p}_end_offset"), Float)
        .req(format!("{p}_start_m1b1_offset"), Float)
        .req(format!("{p}_end_m1b1_offset"), Float)
        .table(name)
}

fn notes() -> TableSpec {
    Cols::default()
        .req_all(&["note_id", "sec_id"], Str)
        .opt("mp_id", Str)
        .req_all(&["chord_id", "note_name"], Str)
        .req_all(&["octave", "midi_num", "pitch_class"], Int)
        .req("duration", Float)
        .req("measure", Int)
        .req("beat", Float)
        .req_all(
            &[
                "note_start_offset",
                "note_end_offset",
                "note_start_m1b1_offset",
                "note_end_m1b1_offset",
            ],
            Float,
        )
        .req_all(
            &[
                "nct",
                "dist_from_root",
                "mp_start_note",
                "mp_end_note",
                "sec_start_note",
                "sec_end_note",
                "prev_note_distance",
            ],
            Int,
        )
        .req_all(&["prev_note_direction", "prev_note_distance_type"], Str)
        .table("notes")
}

fn chords() -> TableSpec {
    Cols::default()
        .req_all(&["chord_id", "sec_id"], Str)
        .opt("hp_id", Str)
        .req_all(
            &["chord_name", "chord_kind", "chord_root_name", "chord_bass_name"],
            Str,
        )
        .req_all(&["chord_root_pc", "chord_bass_pc"], Int)
        .opt_all(&["pitches", "degrees"], Str)
        .req("chord_dur", Float)
        .req("measure", Int)
        .req("beat", Float)
        .req_all(
            &[
                "chord_start_offset",
                "chord_end_offset",
                "chord_start_m1b1_offset",
                "chord_end_m1b1_offset",
            ],
            Float,
        )
        .req_all(
            &[
                "n_pitches",
                "prev_chord_elongation",
                "prev_chord_root_dist",
                "prev_chord_bass_dist",
                "prev_chord_rb_same_qual_diff",
                "prev_chord_root_same_bass_diff",
                "prev_chord_bass_same_root_diff",
            ],
            Int,
        )
        .table("chords")
}

fn form(f: &str) -> Cols {
    let mut cols = Cols::default()
        .req(format!("{f}_id"), Str)
        .req(format!("{f}_start_note_id"), Str)
        .req(format!("{f}_end_note_id"), Str)
        .req(format!("{f}_start_chord_id"), Str)
        .req(format!("{f}_end_chord_id"), Str);
    for stat in ["note_dur", "rest_dur", "rest_dur_in_mps", "rest_dur_between_mps"] {
        cols = cols
            .req(format!("{f}_{stat}"), Float)
            .opt(format!("{f}_{stat}_pct"), Float);
    }
    cols = cols
        .opt(format!("{f}_avg_rest_dur_in_mps"), Float)
        .opt(format!("{f}_med_rest_dur_in_mps"), Float)
        .opt(format!("{f}_avg_rest_dur_between_mps"), Float)
        .opt(format!("{f}_med_rest_dur_between_mps"), Float)
        .req(format!("{f}_n_mps"), Int)
        .req(format!("{f}_n_hps"), Int)
        .req(format!("{f}_n_unique_mps"), Int)
        .req(format!("{f}_n_unique_hps"), Int);
    for stat in ["avg", "med", "std"] {
        cols = cols
            .opt(format!("{f}_{stat}_mp_dur"), Float)
            .opt(format!("{f}_{stat}_hp_dur"), Float);
    }
    cols = cols
        .req(format!("{f}_n_notes"), Int)
        .req(format!("{f}_n_chords"), Int);
    if f == "sec" {
        cols = cols
            .req_all(&["sec_start_mp_id", "sec_end_mp_id"], Str)
            .opt_all(
                &[
                    "sec_to_track_avg_mp_dur",
                    "sec_to_track_avg_hp_dur",
                    "sec_to_track_med_mp_dur",
                    "sec_to_track_med_hp_dur",
                    "sec_to_chorus_dur",
                    "sec_to_chorus_avg_mp_dur",
                    "sec_to_chorus_avg_hp_dur",
                    "sec_to_chorus_med_mp_dur",
                    "sec_to_chorus_med_hp_dur",
                    "rest_dur_before_sec_first_note",
                    "rest_dur_after_sec_last_note",
                ],
                Float,
            );
    }
    cols
}

/// Pitch-extreme and motion columns shared by group melody rows and
/// melodic phrase details.
fn extremes(cols: Cols, f: &str) -> Cols {
    let mut cols = cols;
    for side in ["highest", "lowest"] {
        cols = cols
            .req(format!("{f}_n_{side}_note"), Int)
            .req(format!("{f}_dur_on_{side}_note"), Float)
            .opt(format!("{f}_dur_on_{side}_note_pct"), Float)
            .opt(format!("{f}_n_notes_on_{side}_note_pct"), Float);
    }
    cols
}

fn pitch_and_duration(cols: Cols, f: &str) -> Cols {
    cols.opt(format!("{f}_avg_pitch"), Int)
        .opt(format!("{f}_most_common_pitch"), Str)
        .opt(format!("{f}_most_common_pitch_pct"), Float)
        .opt(format!("{f}_longest_note_dur"), Float)
}

fn common_durations(cols: Cols, f: &str) -> Cols {
    cols.opt(format!("{f}_most_common_note_dur"), Str)
        .opt(format!("{f}_most_common_note_dur_pct"), Float)
        .opt(format!("{f}_second_most_common_note_dur"), Str)
        .opt(format!("{f}_second_most_common_note_dur_pct"), Float)
}

fn nct_and_motion(cols: Cols, f: &str) -> Cols {
    let mut cols = cols
        .req(format!("{f}_n_nct_notes"), Int)
        .req(format!("{f}_dur_nct_notes"), Float)
        .opt(format!("{f}_n_nct_notes_pct"), Float)
        .opt(format!("{f}_dur_nct_notes_pct"), Float);
    for motion in MOTION_COLUMNS {
        cols = cols.opt(format!("{f}_{motion}_pct"), Float);
    }
    cols
}

/// Direction and direction-by-size flags, in column order.
pub const MOTION_COLUMNS: [&str; 9] = [
    "up",
    "down",
    "same",
    "up_step",
    "up_skip",
    "up_leap",
    "down_step",
    "down_skip",
    "down_leap",
];

fn melody(f: &str) -> Cols {
    let cols = Cols::default()
        .req(format!("{f}_id"), Str)
        .opt(format!("{f}_range_interval"), Str)
        .opt(format!("{f}_range_midi"), Int)
        .opt(format!("{f}_highest_note_midi"), Int)
        .opt(format!("{f}_lowest_note_midi"), Int)
        .req(format!("{f}_first_highest_note_id"), Str)
        .req(format!("{f}_first_lowest_note_id"), Str)
        .opt(format!("pct_into_{f}_first_highest_note"), Float)
        .opt(format!("pct_into_{f}_first_lowest_note"), Float)
        .opt(format!("{f}_med_mp_highest_note"), Float)
        .opt(format!("{f}_med_mp_lowest_note"), Float);
    let cols = extremes(cols, f);
    let cols = pitch_and_duration(cols, f);
    let cols = common_durations(cols, f);
    let mut cols = nct_and_motion(cols, f);
    if f == "sec" {
        cols = cols
            .req_all(
                &[
                    "sec_has_track_highest_note",
                    "sec_has_track_lowest_note",
                    "sec_has_track_longest_note",
                ],
                Bool,
            )
            .opt_all(
                &[
                    "sec_to_chorus_range_diff",
                    "sec_to_chorus_highest_note_dist",
                    "sec_to_chorus_lowest_note_dist",
                ],
                Int,
            )
            .req_all(
                &["sec_has_track_widest_range", "sec_has_track_narrowest_range"],
                Bool,
            );
    }
    cols
}

fn quality_columns(cols: Cols, f: &str) -> Cols {
    crate::features::ChordFamily::ALL
        .iter()
        .fold(cols, |cols, family| {
            cols.opt(format!("{f}_pct_{}", family.as_str()), Float)
        })
}

fn harmony(f: &str) -> Cols {
    let cols = Cols::default()
        .req(format!("{f}_id"), Str)
        .opt(format!("{f}_avg_chord_dur"), Float)
        .opt(format!("{f}_avg_chord_center_dur"), Float)
        .opt(format!("{f}_avg_hp_dur"), Float)
        .opt(format!("{f}_med_chord_dur"), Float)
        .opt(format!("{f}_med_chord_center_dur"), Float)
        .opt(format!("{f}_med_hp_dur"), Float)
        .req(format!("{f}_n_chords"), Int)
        .req(format!("{f}_n_unique_chords"), Int)
        .req(format!("{f}_n_chord_centers"), Int)
        .opt(format!("{f}_pct_3_note_chords_or_fewer"), Float)
        .opt(format!("{f}_pct_4_note_chords_or_more"), Float);
    let mut cols = quality_columns(cols, f);
    if f == "sec" {
        cols = cols.req_all(
            &[
                "sec_to_chorus_first_chord_root_dist",
                "sec_to_chorus_first_chord_bass_dist",
            ],
            Int,
        );
    }
    cols
}

fn melodic_details() -> TableSpec {
    let cols = Cols::default()
        .req_all(&["mp_id", "mp_start_note_id", "mp_end_note_id"], Str)
        .req("mp_note_dur", Float)
        .opt("mp_note_dur_pct", Float)
        .req("mp_rest_dur", Float)
        .opt("mp_rest_dur_pct", Float)
        .req("mp_start_section_offset", Float)
        .opt_all(&["mp_to_track_avg_mp_dur", "mp_to_track_med_mp_dur"], Float)
        .req("mp_n_notes", Int)
        .opt("mp_range_interval", Str)
        .opt_all(
            &["mp_range_midi", "mp_highest_note_midi", "mp_lowest_note_midi"],
            Int,
        )
        .req_all(&["mp_has_track_highest_note", "mp_has_track_lowest_note"], Bool)
        .opt_all(
            &["pct_into_mp_first_highest_note", "pct_into_mp_first_lowest_note"],
            Float,
        )
        .req_all(&["has_sec_highest_note", "has_sec_lowest_note"], Bool);
    let cols = extremes(cols, "mp");
    let cols = pitch_and_duration(cols, "mp")
        .req_all(&["has_track_longest_note", "has_sec_longest_note"], Bool);
    let cols = common_durations(cols, "mp");
    nct_and_motion(cols, "mp")
        .opt("mp_n_chords", Int)
        .opt_all(&["mp_avg_chord_dur", "mp_avg_chord_center_dur"], Float)
        .req_all(&["rest_dur_before_mp", "rest_dur_after_mp"], Float)
        .req_all(&["has_sec_widest_range", "has_sec_narrowest_range"], Bool)
        .table("melodic_phrases_details")
}

fn harmonic_details() -> TableSpec {
    let cols = Cols::default()
        .req_all(&["hp_id", "hp_start_chord_id", "hp_end_chord_id"], Str)
        .req("hp_start_section_offset", Float)
        .opt_all(
            &[
                "hp_to_track_avg_hp_dur",
                "hp_to_track_med_hp_dur",
                "hp_avg_chord_dur",
                "hp_avg_chord_center_dur",
                "hp_med_chord_dur",
                "hp_med_chord_center_dur",
            ],
            Float,
        )
        .req_all(&["hp_n_chords", "hp_n_unique_chords", "hp_n_chord_centers"], Int);
    quality_columns(cols, "hp")
        .opt_all(&["pct_repeated_chords", "pct_chord_center_elongation"], Float)
        .req_all(
            &[
                "chord_names",
                "chord_durs",
                "chord_center_durs",
                "chord_change_beats",
                "chord_center_change_beats",
                "root_motion",
                "bass_motion",
            ],
            Str,
        )
        .req_all(
            &[
                "n_chord_qualities",
                "n_2_note_chords",
                "n_3_note_chords",
                "n_4_note_chords",
                "n_5plus_note_chords",
            ],
            Int,
        )
        .req_all(
            &[
                "dur_2_note_chords",
                "dur_3_note_chords",
                "dur_4_note_chords",
                "dur_5plus_note_chords",
            ],
            Float,
        )
        .req_all(&["hp_overlaps_next_section", "all_chord_dur_are_same"], Bool)
        .opt_all(&["hp_to_track_avg_chord_dur", "hp_to_track_med_chord_dur"], Float)
        .req_all(
            &[
                "hp_to_chorus_first_chord_root_dist",
                "hp_to_chorus_first_chord_bass_dist",
            ],
            Int,
        )
        .table("harmonic_phrases_details")
}

fn notes_details() -> TableSpec {
    Cols::default()
        .req("note_id", Str)
        .req("note_start_section_offset", Float)
        .opt("note_start_mp_offset", Float)
        .req_all(
            &[
                "spans_multi_chords",
                "is_track_highest_note",
                "is_track_lowest_note",
                "is_track_longest_note",
                "is_sec_highest_note",
                "is_sec_lowest_note",
                "is_sec_longest_note",
                "is_phrase_longest_note",
            ],
            Bool,
        )
        .req_all(&MOTION_COLUMNS, Bool)
        .table("notes_details")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn declares_every_table_once() {
        let schema = Schema::standard();
        let names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        let expected: Vec<&str> = BASIC_TABLES.iter().chain(EXTENDED_TABLES.iter()).copied().collect();
        let mut sorted_names = names.clone();
        sorted_names.sort_unstable();
        let mut sorted_expected = expected.clone();
        sorted_expected.sort_unstable();
        assert_eq!(sorted_names, sorted_expected);
    }

    #[test]
    fn column_names_are_unique_per_table() {
        for table in &Schema::standard().tables {
            let mut names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
            names.sort_unstable();
            let before = names.len();
            names.dedup();
            assert_eq!(names.len(), before, "duplicate column in {}", table.name);
        }
    }

    #[test]
    fn nullable_whitelist_in_base_tables() {
        let schema = Schema::standard();
        let nullable = |table: &str| -> Vec<String> {
            schema
                .table(table)
                .map(|t| {
                    t.columns
                        .iter()
                        .filter(|c| c.nullable)
                        .map(|c| c.name.clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        assert_eq!(nullable("notes"), vec!["mp_id"]);
        assert_eq!(nullable("chords"), vec!["hp_id", "pitches", "degrees"]);
        assert!(nullable("tracks").is_empty());
    }

    #[test]
    fn extended_columns_use_scope_prefix() {
        let schema = Schema::standard();
        let sections_form = schema.table("sections_form").unwrap();
        assert_eq!(sections_form.columns[0].name, "sec_id");
        assert!(sections_form.column("sec_to_chorus_dur").is_some());
        let tracks_harmony = schema.table("tracks_harmony").unwrap();
        assert!(tracks_harmony.column("track_pct_other_quality").is_some());
        assert!(tracks_harmony.column("sec_to_chorus_first_chord_root_dist").is_none());
        assert_eq!(schema.for_mode(false).tables.len(), 6);
        assert_eq!(schema.for_mode(true).tables.len(), 15);
    }
}
