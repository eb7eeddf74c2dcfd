//! Views over the base rows of one grouping (track, section, phrase) and
//! the melody/harmony profiles every summary table is built from.

use std::collections::BTreeSet;

use crate::features::{interval_name, root_bass_distance, ChordFamily, ChordRelation, Direction, Interval, Motion};
use crate::rows::{ChordRow, NoteRow, PhraseRow, SectionRow};
use crate::schema::MOTION_COLUMNS;
use crate::segment::BaseTables;
use crate::stats::{join_floats, join_ints, mean, median, modes, nonempty, ratio, round_even, sample_std, second_modes};
use crate::table::RowWriter;

pub(crate) const NO_ID: &str = "-1";
pub(crate) const NO_DISTANCE: i64 = -100;

/// Rows belonging to one track or section, in timeline order.
#[derive(Debug, Clone)]
pub(crate) struct Group<'a> {
    pub id: &'a str,
    pub start: f64,
    pub duration: f64,
    /// Note and merged-rest rows.
    pub rows: Vec<&'a NoteRow>,
    /// Every chord row, no-chords included.
    pub chords: Vec<&'a ChordRow>,
    pub melodic: Vec<&'a PhraseRow>,
    pub harmonic: Vec<&'a PhraseRow>,
}

impl<'a> Group<'a> {
    pub fn track(base: &'a BaseTables) -> Self {
        Self {
            id: &base.track.id,
            start: 0.0,
            duration: base.duration,
            rows: base.notes.iter().collect(),
            chords: base.chords.iter().collect(),
            melodic: base.melodic_phrases.iter().collect(),
            harmonic: base.harmonic_phrases.iter().collect(),
        }
    }

    pub fn section(base: &'a BaseTables, section: &'a SectionRow) -> Self {
        let id = section.id.as_str();
        Self {
            id,
            start: section.span.start,
            duration: section.span.duration(),
            rows: base.notes.iter().filter(|n| n.section_id == id).collect(),
            chords: base.chords.iter().filter(|c| c.section_id == id).collect(),
            melodic: base
                .melodic_phrases
                .iter()
                .filter(|p| p.section_id == id)
                .collect(),
            harmonic: base
                .harmonic_phrases
                .iter()
                .filter(|p| p.section_id == id)
                .collect(),
        }
    }

    pub fn melody(&self) -> MelodyProfile<'a> {
        MelodyProfile::new(self.rows.iter().copied())
    }

    pub fn harmony(&self) -> ChordProfile<'a> {
        ChordProfile::new(self.chords.iter().copied())
    }

    pub fn mp_durations(&self) -> Vec<f64> {
        self.melodic.iter().map(|p| p.span.duration()).collect()
    }

    pub fn hp_durations(&self) -> Vec<f64> {
        self.harmonic.iter().map(|p| p.span.duration()).collect()
    }
}

/// Mean, median and sample standard deviation of one duration list.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Spread {
    pub avg: Option<f64>,
    pub med: Option<f64>,
    pub std: Option<f64>,
}

impl Spread {
    pub fn of(values: &[f64]) -> Self {
        Self {
            avg: mean(values),
            med: median(values),
            std: sample_std(values),
        }
    }
}

/// Direction and direction-by-size flags in `MOTION_COLUMNS` order.
pub(crate) fn motion_flags(interval: Interval) -> [bool; 9] {
    let direction = interval.direction();
    let motion = interval.motion();
    let up = direction == Some(Direction::Up);
    let down = direction == Some(Direction::Down);
    let is = |m: Motion| motion == Some(m);
    [
        up,
        down,
        direction == Some(Direction::Same),
        up && is(Motion::Step),
        up && is(Motion::Skip),
        up && is(Motion::Leap),
        down && is(Motion::Step),
        down && is(Motion::Skip),
        down && is(Motion::Leap),
    ]
}

/// Sounding notes of a group, with the pitch extremes precomputed.
#[derive(Debug, Clone)]
pub(crate) struct MelodyProfile<'a> {
    pub notes: Vec<&'a NoteRow>,
    pub highest: Option<i32>,
    pub lowest: Option<i32>,
    pub longest: Option<f64>,
    pub note_dur: f64,
}

impl<'a> MelodyProfile<'a> {
    pub fn new(rows: impl IntoIterator<Item = &'a NoteRow>) -> Self {
        let notes: Vec<&NoteRow> = rows.into_iter().filter(|r| !r.is_rest()).collect();
        let midis = || notes.iter().filter_map(|n| n.midi());
        Self {
            highest: midis().max(),
            lowest: midis().min(),
            longest: notes.iter().map(|n| n.duration).reduce(f64::max),
            note_dur: notes.iter().map(|n| n.duration).sum(),
            notes,
        }
    }

    pub fn n(&self) -> usize {
        self.notes.len()
    }

    pub fn range(&self) -> Option<i32> {
        Some(self.highest? - self.lowest?)
    }

    fn first_at(&self, midi: Option<i32>) -> Option<&'a NoteRow> {
        let midi = midi?;
        self.notes.iter().copied().find(|n| n.midi() == Some(midi))
    }

    pub fn first_highest(&self) -> Option<&'a NoteRow> {
        self.first_at(self.highest)
    }

    pub fn first_lowest(&self) -> Option<&'a NoteRow> {
        self.first_at(self.lowest)
    }

    pub fn start_note_id(&self) -> &'a str {
        self.notes.first().map_or(NO_ID, |n| n.id.as_str())
    }

    pub fn end_note_id(&self) -> &'a str {
        self.notes.last().map_or(NO_ID, |n| n.id.as_str())
    }

    fn share(&self, count: usize) -> Option<f64> {
        ratio(count as f64, self.n() as f64)
    }

    pub fn write_range(&self, row: &mut RowWriter<'_>, f: &str) {
        row.put(&format!("{f}_range_interval"), self.range().map(interval_name))
            .put(&format!("{f}_range_midi"), self.range())
            .put(&format!("{f}_highest_note_midi"), self.highest)
            .put(&format!("{f}_lowest_note_midi"), self.lowest);
    }

    /// Offset of the first highest/lowest note into `[start, start + duration)`.
    pub fn write_pct_into(&self, row: &mut RowWriter<'_>, f: &str, start: f64, duration: f64) {
        let offset_into =
            |note: Option<&NoteRow>| note.and_then(|n| ratio(n.span.start - start, duration));
        row.put(
            &format!("pct_into_{f}_first_highest_note"),
            offset_into(self.first_highest()),
        )
        .put(
            &format!("pct_into_{f}_first_lowest_note"),
            offset_into(self.first_lowest()),
        );
    }

    pub fn write_extremes(&self, row: &mut RowWriter<'_>, f: &str) {
        for (side, extreme) in [("highest", self.highest), ("lowest", self.lowest)] {
            let on: Vec<&&NoteRow> = self
                .notes
                .iter()
                .filter(|n| extreme.is_some() && n.midi() == extreme)
                .collect();
            let dur: f64 = on.iter().map(|n| n.duration).sum();
            row.put(&format!("{f}_n_{side}_note"), on.len())
                .put(&format!("{f}_dur_on_{side}_note"), dur)
                .put(&format!("{f}_dur_on_{side}_note_pct"), ratio(dur, self.note_dur))
                .put(&format!("{f}_n_notes_on_{side}_note_pct"), self.share(on.len()));
        }
    }

    pub fn write_pitch_and_duration(&self, row: &mut RowWriter<'_>, f: &str) {
        let midis: Vec<i64> = self.notes.iter().filter_map(|n| n.midi()).map(i64::from).collect();
        let as_float: Vec<f64> = midis.iter().map(|m| *m as f64).collect();
        let (common, _) = modes(&midis);
        let in_common = midis.iter().filter(|m| common.contains(*m)).count();
        row.put(
            &format!("{f}_avg_pitch"),
            mean(&as_float).map(|m| round_even(m) as i64),
        )
        .put(&format!("{f}_most_common_pitch"), nonempty(join_ints(&common)))
        .put(&format!("{f}_most_common_pitch_pct"), self.share(in_common))
        .put(&format!("{f}_longest_note_dur"), self.longest);
    }

    pub fn write_common_durations(&self, row: &mut RowWriter<'_>, f: &str) {
        let durations: Vec<f64> = self.notes.iter().map(|n| n.duration).collect();
        let (first, _) = modes(&durations);
        let (second, _) = second_modes(&durations);
        let count = |list: &[f64]| durations.iter().filter(|d| list.contains(*d)).count();
        row.put(&format!("{f}_most_common_note_dur"), nonempty(join_floats(&first)))
            .put(&format!("{f}_most_common_note_dur_pct"), self.share(count(&first[..])))
            .put(&format!("{f}_second_most_common_note_dur"), nonempty(join_floats(&second)))
            .put(
                &format!("{f}_second_most_common_note_dur_pct"),
                self.share(count(&second[..])),
            );
    }

    pub fn write_nct_and_motion(&self, row: &mut RowWriter<'_>, f: &str) {
        let nct: Vec<&&NoteRow> = self
            .notes
            .iter()
            .filter(|n| {
                n.pitch
                    .as_ref()
                    .is_some_and(|p| p.relation == ChordRelation::NonChordTone)
            })
            .collect();
        let nct_dur: f64 = nct.iter().map(|n| n.duration).sum();
        row.put(&format!("{f}_n_nct_notes"), nct.len())
            .put(&format!("{f}_dur_nct_notes"), nct_dur)
            .put(&format!("{f}_n_nct_notes_pct"), self.share(nct.len()))
            .put(&format!("{f}_dur_nct_notes_pct"), ratio(nct_dur, self.note_dur));

        let mut counts = [0usize; 9];
        for note in &self.notes {
            let interval = note.pitch.as_ref().map_or(Interval::NotApplicable, |p| p.interval);
            for (count, hit) in counts.iter_mut().zip(motion_flags(interval)) {
                *count += usize::from(hit);
            }
        }
        for (motion, count) in MOTION_COLUMNS.iter().zip(counts) {
            row.put(&format!("{f}_{motion}_pct"), self.share(count));
        }
    }

    /// Median over melodic phrases of each phrase's highest and lowest pitch.
    pub fn phrase_extremes_median(&self) -> (Option<f64>, Option<f64>) {
        let ids: BTreeSet<&str> = self
            .notes
            .iter()
            .filter_map(|n| n.phrase_id.as_deref())
            .collect();
        let (mut highs, mut lows) = (Vec::new(), Vec::new());
        for id in ids {
            let midis = self
                .notes
                .iter()
                .filter(|n| n.phrase_id.as_deref() == Some(id))
                .filter_map(|n| n.midi());
            let (hi, lo) = midis.fold((None, None), |(hi, lo): (Option<i32>, Option<i32>), m| {
                (
                    Some(hi.map_or(m, |h| h.max(m))),
                    Some(lo.map_or(m, |l| l.min(m))),
                )
            });
            highs.extend(hi.map(f64::from));
            lows.extend(lo.map(f64::from));
        }
        (median(&highs), median(&lows))
    }
}

/// Sounding chords of a group and their chord centers.
#[derive(Debug, Clone)]
pub(crate) struct ChordProfile<'a> {
    pub chords: Vec<&'a ChordRow>,
    /// Summed duration of each chord center, in order.
    pub centers: Vec<f64>,
}

impl<'a> ChordProfile<'a> {
    pub fn new(rows: impl IntoIterator<Item = &'a ChordRow>) -> Self {
        let chords: Vec<&ChordRow> = rows.into_iter().filter(|c| !c.no_chord).collect();
        let mut centers: Vec<f64> = Vec::new();
        for chord in &chords {
            match centers.last_mut() {
                Some(total) if chord.is_elongation() => *total += chord.duration(),
                _ => centers.push(chord.duration()),
            }
        }
        Self { chords, centers }
    }

    pub fn n(&self) -> usize {
        self.chords.len()
    }

    pub fn durations(&self) -> Vec<f64> {
        self.chords.iter().map(|c| c.duration()).collect()
    }

    pub fn n_unique(&self) -> usize {
        self.chords
            .iter()
            .map(|c| c.name.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn start_chord_id(&self) -> &'a str {
        self.chords.first().map_or(NO_ID, |c| c.id.as_str())
    }

    pub fn end_chord_id(&self) -> &'a str {
        self.chords.last().map_or(NO_ID, |c| c.id.as_str())
    }

    pub fn share(&self, count: usize) -> Option<f64> {
        ratio(count as f64, self.n() as f64)
    }

    pub fn write_durations(&self, row: &mut RowWriter<'_>, f: &str) {
        let durations = self.durations();
        row.put(&format!("{f}_avg_chord_dur"), mean(&durations))
            .put(&format!("{f}_avg_chord_center_dur"), mean(&self.centers))
            .put(&format!("{f}_med_chord_dur"), median(&durations))
            .put(&format!("{f}_med_chord_center_dur"), median(&self.centers));
    }

    pub fn write_counts(&self, row: &mut RowWriter<'_>, f: &str) {
        row.put(&format!("{f}_n_chords"), self.n())
            .put(&format!("{f}_n_unique_chords"), self.n_unique())
            .put(&format!("{f}_n_chord_centers"), self.centers.len());
    }

    pub fn write_qualities(&self, row: &mut RowWriter<'_>, f: &str) {
        for family in ChordFamily::ALL {
            let count = self
                .chords
                .iter()
                .filter(|c| ChordFamily::from_kind(&c.kind) == family)
                .count();
            row.put(&format!("{f}_pct_{}", family.as_str()), self.share(count));
        }
    }
}

/// Root/bass distance between two chord rows, with the `-100` pair when
/// either is missing or a no-chord.
pub(crate) fn chord_distance(current: Option<&ChordRow>, reference: Option<&ChordRow>) -> (i64, i64) {
    current
        .zip(reference)
        .and_then(|(c, r)| root_bass_distance(c.root_pc(), c.bass_pc(), r.root_pc(), r.bass_pc()))
        .map_or((NO_DISTANCE, NO_DISTANCE), |(root, bass)| {
            (i64::from(root), i64::from(bass))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ChordTransition;
    use crate::rows::Span;
    use pretty_assertions::assert_eq;

    fn chord(name: &str, start: f64, end: f64, root_distance: Option<i32>) -> ChordRow {
        ChordRow {
            id: format!("c-{start}"),
            section_id: "s".into(),
            harmonic_phrase_id: None,
            name: name.into(),
            kind: "major".into(),
            no_chord: name == "N.C.",
            root: None,
            bass: None,
            pitches: vec![],
            degrees: vec![],
            measure: 1,
            beat: 1.0,
            span: Span::new(start, end, 0.0),
            transition: root_distance.map(|d| ChordTransition {
                root_distance: d,
                bass_distance: d,
                same_quality: true,
            }),
        }
    }

    #[test]
    fn chord_centers_grow_on_elongation() {
        let rows = vec![
            chord("N.C.", 0.0, 2.0, None),
            chord("C", 2.0, 4.0, None),
            chord("C7", 4.0, 6.0, Some(0)),
            chord("F", 6.0, 10.0, Some(5)),
            chord("F/C", 10.0, 11.0, Some(0)),
            chord("G", 11.0, 12.0, Some(2)),
        ];
        let profile = ChordProfile::new(&rows);
        assert_eq!(profile.n(), 5);
        assert_eq!(profile.centers, vec![4.0, 5.0, 1.0]);
        assert_eq!(profile.start_chord_id(), "c-2");
        assert_eq!(profile.n_unique(), 5);
    }

    #[test]
    fn empty_chord_profile_uses_sentinels() {
        let profile = ChordProfile::new(Vec::<&ChordRow>::new());
        assert_eq!(profile.n(), 0);
        assert!(profile.centers.is_empty());
        assert_eq!(profile.start_chord_id(), NO_ID);
        assert_eq!(profile.end_chord_id(), NO_ID);
        assert_eq!(profile.share(0), None);
        assert_eq!(chord_distance(None, None), (NO_DISTANCE, NO_DISTANCE));
    }

    #[test]
    fn motion_flags_cross_direction_and_size() {
        assert_eq!(
            motion_flags(Interval::Semitones(2)),
            [true, false, false, true, false, false, false, false, false]
        );
        assert_eq!(
            motion_flags(Interval::Semitones(-7)),
            [false, true, false, false, false, false, false, false, true]
        );
        assert_eq!(
            motion_flags(Interval::Semitones(0)),
            [false, false, true, false, false, false, false, false, false]
        );
        assert_eq!(motion_flags(Interval::NotApplicable), [false; 9]);
    }

    #[test]
    fn spread_of_short_lists() {
        assert_eq!(
            Spread::of(&[4.0]),
            Spread {
                avg: Some(4.0),
                med: Some(4.0),
                std: None,
            }
        );
        assert_eq!(Spread::of(&[]), Spread::default());
    }
}
