//! `notes_details`: one row per note or merged rest.

use super::group::{motion_flags, MelodyProfile};
use crate::features::Interval;
use crate::rows::{ChordRow, NoteRow};
use crate::schema::MOTION_COLUMNS;
use crate::table::{Record, RowWriter};

/// Extremes a note is checked against.
pub(crate) struct NoteContext<'s, 'a> {
    pub track: &'s MelodyProfile<'a>,
    pub section: &'s MelodyProfile<'a>,
    pub section_start: f64,
    /// Start and longest note of the note's melodic phrase.
    pub phrase: Option<(f64, Option<f64>)>,
}

#[derive(Debug, Clone)]
pub(crate) struct NoteDetailRow<'a> {
    pub note: &'a NoteRow,
    pub section_offset: f64,
    pub phrase_offset: Option<f64>,
    pub spans_multi_chords: bool,
    pub is_track_highest: bool,
    pub is_track_lowest: bool,
    pub is_track_longest: bool,
    pub is_sec_highest: bool,
    pub is_sec_lowest: bool,
    pub is_sec_longest: bool,
    pub is_phrase_longest: bool,
    pub motion: [bool; 9],
}

/// Whether the note starts in one chord and ends in another. Every chord
/// the note touches is checked in order and the last one decides.
pub(crate) fn spans_multi_chords(note: &NoteRow, chords: &[ChordRow]) -> bool {
    let (start, end) = (note.span.start, note.span.end);
    chords
        .iter()
        .filter_map(|c| {
            let starts_in = start >= c.span.start && start < c.span.end;
            let ends_in = end > c.span.start && end <= c.span.end;
            (starts_in || ends_in).then_some(!(starts_in && ends_in))
        })
        .last()
        .unwrap_or(false)
}

fn hit<T: PartialEq>(value: Option<T>, reference: Option<T>) -> bool {
    value.is_some() && value == reference
}

impl<'a> NoteDetailRow<'a> {
    pub fn new(note: &'a NoteRow, chords: &[ChordRow], context: &NoteContext<'_, '_>) -> Self {
        let midi = note.midi();
        let duration = (!note.is_rest()).then_some(note.duration);
        let interval = note.pitch.as_ref().map_or(Interval::NotApplicable, |p| p.interval);
        Self {
            note,
            section_offset: note.span.start - context.section_start,
            phrase_offset: context.phrase.map(|(start, _)| note.span.start - start),
            spans_multi_chords: spans_multi_chords(note, chords),
            is_track_highest: hit(midi, context.track.highest),
            is_track_lowest: hit(midi, context.track.lowest),
            is_track_longest: hit(duration, context.track.longest),
            is_sec_highest: hit(midi, context.section.highest),
            is_sec_lowest: hit(midi, context.section.lowest),
            is_sec_longest: hit(duration, context.section.longest),
            is_phrase_longest: hit(duration, context.phrase.and_then(|(_, longest)| longest)),
            motion: motion_flags(interval),
        }
    }
}

impl Record for NoteDetailRow<'_> {
    fn write(&self, row: &mut RowWriter<'_>) {
        row.put("note_id", &self.note.id)
            .put("note_start_section_offset", self.section_offset)
            .put("note_start_mp_offset", self.phrase_offset)
            .put("spans_multi_chords", self.spans_multi_chords)
            .put("is_track_highest_note", self.is_track_highest)
            .put("is_track_lowest_note", self.is_track_lowest)
            .put("is_track_longest_note", self.is_track_longest)
            .put("is_sec_highest_note", self.is_sec_highest)
            .put("is_sec_lowest_note", self.is_sec_lowest)
            .put("is_sec_longest_note", self.is_sec_longest)
            .put("is_phrase_longest_note", self.is_phrase_longest);
        for (column, flag) in MOTION_COLUMNS.iter().zip(self.motion) {
            row.put(column, flag);
        }
    }
}
