//! Typed rows of the base tables. Absent values stay `Option`/enum
//! variants here; the -1/-100 sentinels appear only when a row is written
//! into a table.

use crate::features::{ChordRelation, ChordTransition, Interval};
use crate::table::{Record, RowWriter};
use crate::timeline::Spelling;

pub const NO_CHORD_NAME: &str = "N.C.";
pub const NO_CHORD_KIND: &str = "none";
pub const REST_NAME: &str = "rest";

const MISSING_INT: i64 = -1;
const MISSING_STR: &str = "-1";
const NO_DISTANCE: i64 = -100;

fn flag(value: bool) -> i64 {
    i64::from(value)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackRow {
    pub id: String,
    pub artist: String,
    pub title: String,
    pub key_sharps: Option<i32>,
    pub time_signature: Option<String>,
    pub bpm: Option<f64>,
    /// Beat length of the tempo mark in duration units.
    pub bpm_referent: Option<f64>,
    pub duration: f64,
}

impl Record for TrackRow {
    fn write(&self, row: &mut RowWriter<'_>) {
        row.put("track_id", &self.id)
            .put("artist", &self.artist)
            .put("track_name", &self.title)
            .put(
                "key_sig_n_sharps",
                self.key_sharps.map_or(NO_DISTANCE, i64::from),
            )
            .put(
                "time_sig",
                self.time_signature.as_deref().unwrap_or(MISSING_STR),
            )
            .put("bpm", self.bpm.unwrap_or(0.0))
            .put("bpm_ql", self.bpm_referent.unwrap_or(0.0))
            .put("track_total_dur", self.duration);
    }
}

/// Start/end offsets of a span plus their m1b1 variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start: f64,
    pub end: f64,
    pub start_m1b1: f64,
    pub end_m1b1: f64,
}

impl Span {
    pub fn new(start: f64, end: f64, m1b1_factor: f64) -> Self {
        Self {
            start,
            end,
            start_m1b1: start - m1b1_factor,
            end_m1b1: end - m1b1_factor,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    fn write(&self, row: &mut RowWriter<'_>, prefix: &str) {
        row.put(&format!("{prefix}_start_offset"), self.start)
            .put(&format!("{prefix}_end_offset"), self.end)
            .put(&format!("{prefix}_start_m1b1_offset"), self.start_m1b1)
            .put(&format!("{prefix}_end_m1b1_offset"), self.end_m1b1);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionRow {
    pub id: String,
    pub track_id: String,
    pub name: String,
    pub span: Span,
    pub n_phrases: usize,
    pub n_harmonic_phrases: usize,
}

impl Record for SectionRow {
    fn write(&self, row: &mut RowWriter<'_>) {
        row.put("sec_id", &self.id)
            .put("track_id", &self.track_id)
            .put("sec_name", &self.name)
            .put("sec_total_dur", self.span.duration())
            .put("sec_n_mp", self.n_phrases)
            .put("sec_n_hp", self.n_harmonic_phrases);
        self.span.write(row, "sec");
    }
}

/// A melodic or harmonic phrase row; `kind` is the column prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseRow {
    pub kind: PhraseKind,
    pub id: String,
    pub section_id: String,
    /// 1-based position within its section.
    pub number_in_section: usize,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseKind {
    Melodic,
    Harmonic,
}

impl PhraseKind {
    pub fn prefix(self) -> &'static str {
        match self {
            PhraseKind::Melodic => "mp",
            PhraseKind::Harmonic => "hp",
        }
    }
}

impl Record for PhraseRow {
    fn write(&self, row: &mut RowWriter<'_>) {
        let p = self.kind.prefix();
        row.put(&format!("{p}_id"), &self.id)
            .put("sec_id", &self.section_id)
            .put(&format!("{p}_num_in_sec"), self.number_in_section)
            .put(&format!("{p}_total_dur"), self.span.duration());
        self.span.write(row, p);
    }
}

/// Pitch-only fields of a note row.
#[derive(Debug, Clone, PartialEq)]
pub struct Pitched {
    pub octave: i32,
    pub midi: i32,
    pub pitch_class: i32,
    pub relation: ChordRelation,
    /// Distance to the active chord's root; `None` under a no-chord.
    pub root_distance: Option<i32>,
    pub interval: Interval,
}

/// One note, or one merged run of rests (`pitch` is `None`).
#[derive(Debug, Clone, PartialEq)]
pub struct NoteRow {
    pub id: String,
    pub section_id: String,
    pub phrase_id: Option<String>,
    pub chord_id: String,
    pub name: String,
    pub pitch: Option<Pitched>,
    pub duration: f64,
    pub measure: i64,
    pub beat: f64,
    pub span: Span,
    pub phrase_start: bool,
    pub phrase_end: bool,
    pub section_start: bool,
    pub section_end: bool,
}

impl NoteRow {
    pub fn is_rest(&self) -> bool {
        self.pitch.is_none()
    }

    pub fn midi(&self) -> Option<i32> {
        self.pitch.as_ref().map(|p| p.midi)
    }

    /// Extend a merged rest by a following rest.
    pub fn extend(&mut self, duration: f64) {
        self.duration += duration;
        self.span.end += duration;
        self.span.end_m1b1 += duration;
    }
}

impl Record for NoteRow {
    fn write(&self, row: &mut RowWriter<'_>) {
        row.put("note_id", &self.id)
            .put("sec_id", &self.section_id)
            .put("mp_id", self.phrase_id.as_ref())
            .put("chord_id", &self.chord_id)
            .put("note_name", &self.name);
        let pitch = self.pitch.as_ref();
        row.put("octave", pitch.map_or(MISSING_INT, |p| i64::from(p.octave)))
            .put("midi_num", pitch.map_or(MISSING_INT, |p| i64::from(p.midi)))
            .put(
                "pitch_class",
                pitch.map_or(MISSING_INT, |p| i64::from(p.pitch_class)),
            )
            .put("duration", self.duration)
            .put("measure", self.measure)
            .put("beat", self.beat);
        self.span.write(row, "note");
        let interval = pitch.map_or(Interval::NotApplicable, |p| p.interval);
        row.put("nct", pitch.map_or(MISSING_INT, |p| p.relation.code()))
            .put(
                "dist_from_root",
                pitch
                    .and_then(|p| p.root_distance)
                    .map_or(MISSING_INT, i64::from),
            )
            .put("mp_start_note", flag(self.phrase_start))
            .put("mp_end_note", flag(self.phrase_end))
            .put("sec_start_note", flag(self.section_start))
            .put("sec_end_note", flag(self.section_end))
            .put(
                "prev_note_distance",
                interval.semitones().map_or(NO_DISTANCE, i64::from),
            )
            .put(
                "prev_note_direction",
                interval.direction().map_or(MISSING_STR, |d| d.as_str()),
            )
            .put(
                "prev_note_distance_type",
                interval.motion().map_or(MISSING_STR, |m| m.as_str()),
            );
    }
}

/// One chord-symbol event; its duration is derived once the next chord
/// is known.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordRow {
    pub id: String,
    pub section_id: String,
    pub harmonic_phrase_id: Option<String>,
    pub name: String,
    pub kind: String,
    pub no_chord: bool,
    pub root: Option<Spelling>,
    pub bass: Option<Spelling>,
    pub pitches: Vec<String>,
    pub degrees: Vec<String>,
    pub measure: i64,
    pub beat: f64,
    pub span: Span,
    pub transition: Option<ChordTransition>,
}

impl ChordRow {
    pub fn duration(&self) -> f64 {
        self.span.duration()
    }

    pub fn n_pitches(&self) -> usize {
        self.pitches.len()
    }

    pub fn is_elongation(&self) -> bool {
        self.transition.is_some_and(|t| t.is_elongation())
    }

    pub fn root_pc(&self) -> Option<i32> {
        self.root.as_ref().map(|s| s.pitch_class)
    }

    pub fn bass_pc(&self) -> Option<i32> {
        self.bass.as_ref().map(|s| s.pitch_class)
    }
}

impl Record for ChordRow {
    fn write(&self, row: &mut RowWriter<'_>) {
        let joined = |values: &[String]| {
            (!self.no_chord).then(|| {
                values
                    .iter()
                    .map(|v| v.to_lowercase())
                    .collect::<Vec<_>>()
                    .join(",")
            })
        };
        let name = |s: &Option<Spelling>| s.as_ref().map_or(MISSING_STR.to_string(), |s| s.name.clone());
        let pc = |s: &Option<Spelling>| s.as_ref().map_or(MISSING_INT, |s| i64::from(s.pitch_class));
        let t = self.transition;
        let t_flag = |test: fn(&ChordTransition) -> bool| flag(t.as_ref().is_some_and(test));

        row.put("chord_id", &self.id)
            .put("sec_id", &self.section_id)
            .put("hp_id", self.harmonic_phrase_id.as_ref())
            .put("chord_name", &self.name)
            .put("chord_kind", &self.kind)
            .put("chord_root_name", name(&self.root))
            .put("chord_bass_name", name(&self.bass))
            .put("chord_root_pc", pc(&self.root))
            .put("chord_bass_pc", pc(&self.bass))
            .put("pitches", joined(&self.pitches))
            .put("degrees", (!self.no_chord).then(|| self.degrees.join(",")))
            .put("chord_dur", self.duration())
            .put("measure", self.measure)
            .put("beat", self.beat);
        self.span.write(row, "chord");
        row.put("n_pitches", self.n_pitches())
            .put("prev_chord_elongation", t_flag(ChordTransition::is_elongation))
            .put(
                "prev_chord_root_dist",
                t.map_or(NO_DISTANCE, |t| i64::from(t.root_distance)),
            )
            .put(
                "prev_chord_bass_dist",
                t.map_or(NO_DISTANCE, |t| i64::from(t.bass_distance)),
            )
            .put(
                "prev_chord_rb_same_qual_diff",
                t_flag(ChordTransition::same_root_and_bass_new_quality),
            )
            .put(
                "prev_chord_root_same_bass_diff",
                t_flag(ChordTransition::same_root_new_bass),
            )
            .put(
                "prev_chord_bass_same_root_diff",
                t_flag(ChordTransition::same_bass_new_root),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Table, Value};
    use pretty_assertions::assert_eq;

    fn rest_row() -> NoteRow {
        NoteRow {
            id: "p-rest-0.0".into(),
            section_id: "p-sec-intro-0.0".into(),
            phrase_id: None,
            chord_id: "p-chord-n.c.-0.0".into(),
            name: REST_NAME.into(),
            pitch: None,
            duration: 1.0,
            measure: 1,
            beat: 1.0,
            span: Span::new(0.0, 1.0, 0.0),
            phrase_start: false,
            phrase_end: false,
            section_start: true,
            section_end: false,
        }
    }

    #[test]
    fn rests_render_sentinels() {
        let table = Table::render("notes", &[rest_row()]);
        let row = table.row(0).unwrap();
        let get = |name: &str| row.iter().find(|(n, _)| *n == name).map(|(_, v)| (*v).clone());
        assert_eq!(get("midi_num"), Some(Value::Int(-1)));
        assert_eq!(get("nct"), Some(Value::Int(-1)));
        assert_eq!(get("prev_note_distance"), Some(Value::Int(-100)));
        assert_eq!(get("prev_note_direction"), Some(Value::from("-1")));
        assert_eq!(get("mp_id"), Some(Value::Null));
        assert_eq!(get("sec_start_note"), Some(Value::Int(1)));
        assert_eq!(table.columns().len(), 24);
    }

    #[test]
    fn merged_rest_extends_end_offsets() {
        let mut row = rest_row();
        row.extend(2.0);
        assert_eq!(row.duration, 3.0);
        assert_eq!(row.span.end, 3.0);
        assert_eq!(row.span.end_m1b1, 3.0);
    }

    #[test]
    fn no_chord_renders_nulls_and_sentinels() {
        let chord = ChordRow {
            id: "p-chord-n.c.-0.0".into(),
            section_id: "s".into(),
            harmonic_phrase_id: Some("p-hp1-0.0".into()),
            name: NO_CHORD_NAME.into(),
            kind: NO_CHORD_KIND.into(),
            no_chord: true,
            root: None,
            bass: None,
            pitches: vec![],
            degrees: vec![],
            measure: 1,
            beat: 1.0,
            span: Span::new(0.0, 8.0, 0.0),
            transition: None,
        };
        let table = Table::render("chords", &[chord]);
        assert_eq!(table.column("pitches"), Some(&[Value::Null][..]));
        assert_eq!(table.column("chord_root_name"), Some(&[Value::from("-1")][..]));
        assert_eq!(table.column("chord_root_pc"), Some(&[Value::Int(-1)][..]));
        assert_eq!(table.column("prev_chord_root_dist"), Some(&[Value::Int(-100)][..]));
        assert_eq!(table.column("chord_dur"), Some(&[Value::Float(8.0)][..]));
        assert_eq!(table.columns().len(), 25);
    }
}
