//! `melodic_phrases_details`: one row per melodic phrase.

use super::group::{ChordProfile, MelodyProfile};
use crate::rows::{ChordRow, NoteRow, PhraseRow};
use crate::stats::{mean, ratio, ratio_opt};
use crate::table::{Record, RowWriter};

/// Context a phrase row is compared against.
pub(crate) struct PhraseContext<'s, 'a> {
    pub track: &'s MelodyProfile<'a>,
    pub section: &'s MelodyProfile<'a>,
    pub section_start: f64,
    pub track_avg_mp_dur: Option<f64>,
    pub track_med_mp_dur: Option<f64>,
}

#[derive(Debug, Clone)]
pub(crate) struct MelodicDetailRow<'a> {
    pub phrase: &'a PhraseRow,
    pub profile: MelodyProfile<'a>,
    /// Summed duration of the phrase's note and rest rows.
    pub total_dur: f64,
    pub section_offset: f64,
    pub to_track_avg: Option<f64>,
    pub to_track_med: Option<f64>,
    pub has_track_highest: bool,
    pub has_track_lowest: bool,
    pub has_track_longest: bool,
    pub has_sec_highest: bool,
    pub has_sec_lowest: bool,
    pub has_sec_longest: bool,
    pub chords: ChordProfile<'a>,
    pub rest_before: f64,
    pub rest_after: f64,
    pub has_sec_widest_range: bool,
    pub has_sec_narrowest_range: bool,
}

fn same<T: PartialEq>(value: Option<T>, reference: Option<T>) -> bool {
    value.is_some() && value == reference
}

/// Chords starting inside `[start, end]`, preceded by the chord already
/// sounding at `start` when none starts exactly there.
pub(crate) fn chord_window(chords: &[ChordRow], start: f64, end: f64) -> Vec<&ChordRow> {
    let mut window: Vec<&ChordRow> = chords
        .iter()
        .filter(|c| c.span.start >= start && c.span.start <= end)
        .collect();
    if !chords.iter().any(|c| c.span.start == start) {
        if let Some(sounding) = chords.iter().rev().find(|c| c.span.start < start) {
            window.insert(0, sounding);
        }
    }
    window
}

impl<'a> MelodicDetailRow<'a> {
    pub fn new(
        phrase: &'a PhraseRow,
        notes: &'a [NoteRow],
        chords: &'a [ChordRow],
        context: &PhraseContext<'_, 'a>,
    ) -> Self {
        let rows: Vec<&NoteRow> = notes
            .iter()
            .filter(|n| n.phrase_id.as_deref() == Some(phrase.id.as_str()))
            .collect();
        let total_dur: f64 = rows.iter().map(|r| r.duration).sum();
        let profile = MelodyProfile::new(rows);

        Self {
            phrase,
            total_dur,
            section_offset: phrase.span.start - context.section_start,
            to_track_avg: ratio_opt(Some(total_dur), context.track_avg_mp_dur),
            to_track_med: ratio_opt(Some(total_dur), context.track_med_mp_dur),
            has_track_highest: same(profile.highest, context.track.highest),
            has_track_lowest: same(profile.lowest, context.track.lowest),
            has_track_longest: same(profile.longest, context.track.longest),
            has_sec_highest: same(profile.highest, context.section.highest),
            has_sec_lowest: same(profile.lowest, context.section.lowest),
            has_sec_longest: same(profile.longest, context.section.longest),
            chords: ChordProfile::new(chord_window(chords, phrase.span.start, phrase.span.end)),
            profile,
            rest_before: 0.0,
            rest_after: 0.0,
            has_sec_widest_range: false,
            has_sec_narrowest_range: false,
        }
    }
}

/// Gaps between consecutive phrases and the per-section range flags.
pub(crate) fn finish_melodic(rows: &mut [MelodicDetailRow<'_>], track_duration: f64) {
    let spans: Vec<(f64, f64)> = rows
        .iter()
        .map(|r| (r.phrase.span.start, r.phrase.span.end))
        .collect();
    for (index, row) in rows.iter_mut().enumerate() {
        let (start, end) = spans[index];
        row.rest_before = match index.checked_sub(1) {
            Some(previous) => start - spans[previous].1,
            None => start,
        };
        row.rest_after = spans.get(index + 1).map_or(track_duration, |next| next.0) - end;
    }

    let ranges: Vec<(String, Option<i32>)> = rows
        .iter()
        .map(|r| (r.phrase.section_id.clone(), r.profile.range()))
        .collect();
    for row in rows.iter_mut() {
        let in_section = ranges
            .iter()
            .filter(|(section, _)| *section == row.phrase.section_id)
            .filter_map(|(_, range)| *range);
        let (widest, narrowest) = in_section.fold((None, None), |(hi, lo): (Option<i32>, Option<i32>), r| {
            (Some(hi.map_or(r, |h| h.max(r))), Some(lo.map_or(r, |l| l.min(r))))
        });
        let range = row.profile.range();
        row.has_sec_widest_range = same(range, widest);
        row.has_sec_narrowest_range = same(range, narrowest);
    }
}

impl Record for MelodicDetailRow<'_> {
    fn write(&self, row: &mut RowWriter<'_>) {
        let p = &self.profile;
        let rest_dur = self.total_dur - p.note_dur;
        let chords = &self.chords;
        let sounding = chords.n() > 0;

        row.put("mp_id", &self.phrase.id)
            .put("mp_start_note_id", p.start_note_id())
            .put("mp_end_note_id", p.end_note_id())
            .put("mp_note_dur", p.note_dur)
            .put("mp_note_dur_pct", ratio(p.note_dur, self.total_dur))
            .put("mp_rest_dur", rest_dur)
            .put("mp_rest_dur_pct", ratio(rest_dur, self.total_dur))
            .put("mp_start_section_offset", self.section_offset)
            .put("mp_to_track_avg_mp_dur", self.to_track_avg)
            .put("mp_to_track_med_mp_dur", self.to_track_med)
            .put("mp_n_notes", p.n())
            .put("mp_has_track_highest_note", self.has_track_highest)
            .put("mp_has_track_lowest_note", self.has_track_lowest)
            .put("has_sec_highest_note", self.has_sec_highest)
            .put("has_sec_lowest_note", self.has_sec_lowest)
            .put("has_track_longest_note", self.has_track_longest)
            .put("has_sec_longest_note", self.has_sec_longest);
        p.write_range(row, "mp");
        p.write_pct_into(row, "mp", self.phrase.span.start, self.total_dur);
        p.write_extremes(row, "mp");
        p.write_pitch_and_duration(row, "mp");
        p.write_common_durations(row, "mp");
        p.write_nct_and_motion(row, "mp");

        row.put("mp_n_chords", sounding.then(|| chords.n()))
            .put("mp_avg_chord_dur", mean(&chords.durations()))
            .put("mp_avg_chord_center_dur", mean(&chords.centers))
            .put("rest_dur_before_mp", self.rest_before)
            .put("rest_dur_after_mp", self.rest_after)
            .put("has_sec_widest_range", self.has_sec_widest_range)
            .put("has_sec_narrowest_range", self.has_sec_narrowest_range);
    }
}
