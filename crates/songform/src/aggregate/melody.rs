//! `tracks_melody` / `sections_melody`.

use super::group::{Group, MelodyProfile, NO_ID};
use super::Scope;
use crate::table::{Record, RowWriter};

#[derive(Debug, Clone)]
pub(crate) struct MelodyRow<'a> {
    pub scope: Scope,
    pub id: String,
    pub profile: MelodyProfile<'a>,
    pub start: f64,
    pub duration: f64,
    pub median_phrase_highest: Option<f64>,
    pub median_phrase_lowest: Option<f64>,
    pub section: Option<SectionMelody>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SectionMelody {
    pub has_track_highest: bool,
    pub has_track_lowest: bool,
    pub has_track_longest: bool,
    pub to_chorus_range_diff: Option<i32>,
    pub to_chorus_highest_dist: Option<i32>,
    pub to_chorus_lowest_dist: Option<i32>,
    pub has_widest_range: bool,
    pub has_narrowest_range: bool,
}

fn same<T: PartialEq>(value: Option<T>, reference: Option<T>) -> bool {
    value.is_some() && value == reference
}

fn difference(value: Option<i32>, reference: Option<i32>) -> Option<i32> {
    Some(value? - reference?)
}

impl<'a> MelodyRow<'a> {
    pub fn new(group: &Group<'a>, scope: Scope) -> Self {
        let profile = group.melody();
        let (median_phrase_highest, median_phrase_lowest) = profile.phrase_extremes_median();
        Self {
            scope,
            id: group.id.to_string(),
            profile,
            start: group.start,
            duration: group.duration,
            median_phrase_highest,
            median_phrase_lowest,
            section: (scope == Scope::Section).then(SectionMelody::default),
        }
    }

    /// Fill the track and chorus comparisons of a section row. `ranges`
    /// is the pitch range of every section.
    pub fn compare(&mut self, track: &MelodyProfile<'_>, chorus: &MelodyProfile<'_>, ranges: &[Option<i32>]) {
        let widest = ranges.iter().flatten().max().copied();
        let narrowest = ranges.iter().flatten().min().copied();
        let own = &self.profile;
        let range = own.range();
        let filled = SectionMelody {
            has_track_highest: same(own.highest, track.highest),
            has_track_lowest: same(own.lowest, track.lowest),
            has_track_longest: same(own.longest, track.longest),
            to_chorus_range_diff: difference(range, chorus.range()),
            to_chorus_highest_dist: difference(own.highest, chorus.highest),
            to_chorus_lowest_dist: difference(own.lowest, chorus.lowest),
            has_widest_range: same(range, widest),
            has_narrowest_range: same(range, narrowest),
        };
        if self.section.is_some() {
            self.section = Some(filled);
        }
    }
}

impl Record for MelodyRow<'_> {
    fn write(&self, row: &mut RowWriter<'_>) {
        let f = self.scope.field();
        let p = &self.profile;
        row.put(&format!("{f}_id"), &self.id)
            .put(
                &format!("{f}_first_highest_note_id"),
                p.first_highest().map_or(NO_ID, |n| n.id.as_str()),
            )
            .put(
                &format!("{f}_first_lowest_note_id"),
                p.first_lowest().map_or(NO_ID, |n| n.id.as_str()),
            )
            .put(&format!("{f}_med_mp_highest_note"), self.median_phrase_highest)
            .put(&format!("{f}_med_mp_lowest_note"), self.median_phrase_lowest);
        p.write_range(row, f);
        p.write_pct_into(row, f, self.start, self.duration);
        p.write_extremes(row, f);
        p.write_pitch_and_duration(row, f);
        p.write_common_durations(row, f);
        p.write_nct_and_motion(row, f);

        if let Some(s) = &self.section {
            row.put("sec_has_track_highest_note", s.has_track_highest)
                .put("sec_has_track_lowest_note", s.has_track_lowest)
                .put("sec_has_track_longest_note", s.has_track_longest)
                .put("sec_to_chorus_range_diff", s.to_chorus_range_diff)
                .put("sec_to_chorus_highest_note_dist", s.to_chorus_highest_dist)
                .put("sec_to_chorus_lowest_note_dist", s.to_chorus_lowest_dist)
                .put("sec_has_track_widest_range", s.has_widest_range)
                .put("sec_has_track_narrowest_range", s.has_narrowest_range);
        }
    }
}
