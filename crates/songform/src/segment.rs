//! The single left-to-right pass over a normalized timeline. It keeps the
//! active section, melodic phrase, harmonic phrase and chord as explicit
//! state and emits one row per note/rest run and per chord event.

use tracing::{debug, info};

use crate::boundaries::Boundaries;
use crate::features::{root_distance, ChordRelation, ChordTransition, Interval};
use crate::ids::IdPrefix;
use crate::rows::{
    ChordRow, NoteRow, PhraseKind, PhraseRow, Pitched, SectionRow, Span, TrackRow, NO_CHORD_KIND,
    NO_CHORD_NAME, REST_NAME,
};
use crate::table::{Table, TableSet};
use crate::timeline::{ChordSymbol, Event, EventKind, NormalizedTimeline, TrackHeader};

/// The six base tables of one track, as typed rows.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseTables {
    pub prefix: IdPrefix,
    pub duration: f64,
    pub track: TrackRow,
    pub sections: Vec<SectionRow>,
    pub melodic_phrases: Vec<PhraseRow>,
    pub harmonic_phrases: Vec<PhraseRow>,
    pub notes: Vec<NoteRow>,
    pub chords: Vec<ChordRow>,
}

impl BaseTables {
    pub fn to_tables(&self) -> TableSet {
        [
            Table::render("tracks", std::iter::once(&self.track)),
            Table::render("sections", &self.sections),
            Table::render("melodic_phrases", &self.melodic_phrases),
            Table::render("harmonic_phrases", &self.harmonic_phrases),
            Table::render("notes", &self.notes),
            Table::render("chords", &self.chords),
        ]
        .into_iter()
        .collect()
    }
}

/// Chord in effect at the current position; `symbol` is `None` for a
/// no-chord.
#[derive(Debug, Clone)]
struct ActiveChord<'a> {
    id: String,
    symbol: Option<&'a ChordSymbol>,
}

struct Segmenter<'a> {
    header: &'a TrackHeader,
    boundaries: &'a Boundaries,
    prefix: IdPrefix,
    section_ids: Vec<String>,
    phrase_ids: Vec<String>,
    harmonic_ids: Vec<String>,

    section: usize,
    phrase: Option<usize>,
    harmonic: Option<usize>,
    chord: ActiveChord<'a>,
    previous_symbol: Option<&'a ChordSymbol>,
    last_midi: Option<i32>,

    notes: Vec<NoteRow>,
    chords: Vec<ChordRow>,
}

/// Run the pass and finish the derived fields.
pub fn segment(timeline: &NormalizedTimeline) -> BaseTables {
    let mut pass = Segmenter::new(timeline);
    for event in &timeline.events {
        pass.step(event);
    }
    pass.finish()
}

fn chord_symbol(kind: &EventKind) -> Option<&ChordSymbol> {
    match kind {
        EventKind::Chord(symbol) => Some(symbol),
        _ => None,
    }
}

fn straddles(row: &NoteRow, boundary: Option<f64>) -> bool {
    boundary.is_some_and(|b| row.span.start < b && row.span.end > b)
}

impl<'a> Segmenter<'a> {
    fn new(timeline: &'a NormalizedTimeline) -> Self {
        let header = &timeline.header;
        let boundaries = &timeline.boundaries;
        let prefix = IdPrefix::new(&header.artist, &header.title);

        let section_ids = boundaries
            .sections()
            .iter()
            .map(|s| prefix.section(&s.name, s.start))
            .collect();
        let phrase_ids = boundaries
            .phrases()
            .iter()
            .enumerate()
            .map(|(i, p)| prefix.melodic_phrase(i, p.start))
            .collect();
        let harmonic_ids = boundaries
            .harmonic_phrases()
            .iter()
            .enumerate()
            .map(|(i, h)| prefix.harmonic_phrase(i, h.start))
            .collect();

        // the chord at offset 0 is always present after normalization
        let opening = timeline.events.iter().find(|e| e.kind.is_chord());
        let chord = match opening {
            Some(event) => ActiveChord {
                id: chord_id(&prefix, &event.kind, event.offset),
                symbol: chord_symbol(&event.kind),
            },
            None => ActiveChord {
                id: prefix.chord(NO_CHORD_NAME, 0.0),
                symbol: None,
            },
        };

        Self {
            header,
            boundaries,
            section: boundaries.section_at(0.0),
            prefix,
            section_ids,
            phrase_ids,
            harmonic_ids,
            phrase: None,
            harmonic: None,
            chord,
            previous_symbol: None,
            last_midi: None,
            notes: Vec::new(),
            chords: Vec::new(),
        }
    }

    fn step(&mut self, event: &'a Event) {
        match &event.kind {
            EventKind::Note(_) | EventKind::Rest { .. } => self.note_or_rest(event),
            EventKind::Chord(_) | EventKind::NoChord => self.chord_event(event),
            _ => {}
        }
    }

    fn section_id(&self) -> String {
        self.section_ids
            .get(self.section)
            .cloned()
            .unwrap_or_default()
    }

    fn note_or_rest(&mut self, event: &'a Event) {
        let offset = event.offset;
        let duration = event.kind.duration().unwrap_or(0.0);
        let b = self.boundaries;

        if let Some(prev) = self.notes.last() {
            let crossed = straddles(prev, b.section_start_after(self.section));
            if b.is_section_start(offset) || crossed {
                self.section = b.section_at(offset);
            }
            if b.is_phrase_last_note(prev.span.start) {
                self.phrase = None;
            }
        } else if b.is_section_start(offset) {
            self.section = b.section_at(offset);
        }

        let phrase_crossed = self
            .notes
            .last()
            .is_some_and(|prev| straddles(prev, b.phrase_start_after(prev.span.start)));
        if b.is_phrase_start(offset) || phrase_crossed {
            self.phrase = b.phrase_at(offset);
        }

        let pitch = match &event.kind {
            EventKind::Note(note) => Some(note),
            _ => None,
        };

        if pitch.is_none() && offset > 0.0 {
            if let Some(last) = self.notes.last_mut().filter(|row| row.is_rest()) {
                last.extend(duration);
                if offset + duration == self.header.duration {
                    last.section_end = true;
                }
                return;
            }
        }

        let section_id = self.section_id();
        let section_start = if offset == 0.0 {
            true
        } else {
            match self.notes.last_mut() {
                Some(prev) if prev.is_rest() && prev.section_id != section_id => {
                    prev.section_end = true;
                    true
                }
                _ => b.is_section_start(offset),
            }
        };

        let pitched = pitch.map(|note| {
            let root = self.chord.symbol.and_then(|c| c.root.as_ref());
            let interval = Interval::between(self.last_midi, note.midi);
            self.last_midi = Some(note.midi);
            Pitched {
                octave: note.octave,
                midi: note.midi,
                pitch_class: note.pitch_class,
                relation: ChordRelation::of(&note.name, self.chord.symbol),
                root_distance: root.map(|r| root_distance(note.pitch_class, r.pitch_class)),
                interval,
            }
        });
        let name = pitch.map_or(REST_NAME, |note| note.name.as_str()).to_string();

        self.notes.push(NoteRow {
            id: self.prefix.note(&name, offset),
            section_id,
            phrase_id: self.phrase.and_then(|i| self.phrase_ids.get(i).cloned()),
            chord_id: self.chord.id.clone(),
            name,
            pitch: pitched,
            duration,
            measure: event.measure,
            beat: event.beat,
            span: Span::new(offset, offset + duration, self.header.m1b1_factor),
            phrase_start: b.is_phrase_start(offset),
            phrase_end: b.is_phrase_last_note(offset),
            section_start,
            section_end: b.is_section_end(offset + duration),
        });
    }

    fn chord_event(&mut self, event: &'a Event) {
        let offset = event.offset;
        let symbol = chord_symbol(&event.kind);
        self.chord = ActiveChord {
            id: chord_id(&self.prefix, &event.kind, offset),
            symbol,
        };

        if let Some(index) = self.boundaries.harmonic_starting_at(offset) {
            self.harmonic = Some(index);
        }

        // a chord sharing its offset with a section marker belongs to
        // that section whatever the running pointer says
        let section_id = match self.boundaries.section_starting_at(offset) {
            Some(index) => self.section_ids.get(index).cloned().unwrap_or_default(),
            None => self.section_id(),
        };

        let transition = ChordTransition::between(symbol, self.previous_symbol);
        self.previous_symbol = symbol;

        self.chords.push(ChordRow {
            id: self.chord.id.clone(),
            section_id,
            harmonic_phrase_id: self.harmonic.and_then(|i| self.harmonic_ids.get(i).cloned()),
            name: symbol.map_or(NO_CHORD_NAME, |c| c.figure.as_str()).to_string(),
            kind: symbol.map_or(NO_CHORD_KIND, |c| c.kind.as_str()).to_string(),
            no_chord: symbol.is_none(),
            root: symbol.and_then(|c| c.root.clone()),
            bass: symbol.and_then(|c| c.bass().cloned()),
            pitches: symbol.map(|c| c.pitches.clone()).unwrap_or_default(),
            degrees: symbol.map(|c| c.degrees.clone()).unwrap_or_default(),
            measure: event.measure,
            beat: event.beat,
            span: Span::new(offset, offset, self.header.m1b1_factor),
            transition,
        });
    }

    fn finish(mut self) -> BaseTables {
        let header = self.header;
        let b = self.boundaries;
        let factor = header.m1b1_factor;

        let next_starts: Vec<f64> = self
            .chords
            .iter()
            .skip(1)
            .map(|c| c.span.start)
            .chain(std::iter::once(header.duration))
            .collect();
        for (chord, end) in self.chords.iter_mut().zip(next_starts) {
            chord.span = Span::new(chord.span.start, end, factor);
        }

        let melodic_phrases = number_in_sections(
            b,
            PhraseKind::Melodic,
            b.phrases().iter().map(|p| (p.start, p.end)),
            &self.phrase_ids,
            &self.section_ids,
            factor,
        );
        let harmonic_phrases = number_in_sections(
            b,
            PhraseKind::Harmonic,
            b.harmonic_phrases().iter().map(|h| (h.start, h.end)),
            &self.harmonic_ids,
            &self.section_ids,
            factor,
        );

        let track_id = self.prefix.track();
        let sections: Vec<SectionRow> = b
            .sections()
            .iter()
            .zip(&self.section_ids)
            .map(|(span, id)| {
                let count = |rows: &[PhraseRow]| rows.iter().filter(|r| &r.section_id == id).count();
                SectionRow {
                    id: id.clone(),
                    track_id: track_id.clone(),
                    name: span.name.clone(),
                    span: Span::new(span.start, span.end, factor),
                    n_phrases: count(&melodic_phrases[..]),
                    n_harmonic_phrases: count(&harmonic_phrases[..]),
                }
            })
            .collect();

        let first = &header.first_measure;
        let track = TrackRow {
            id: track_id,
            artist: header.artist.clone(),
            title: header.title.clone(),
            key_sharps: first.key_sharps,
            time_signature: first.time_signature.clone(),
            bpm: first.tempo.map(|t| t.bpm),
            bpm_referent: first.tempo.map(|t| t.referent),
            duration: header.duration,
        };

        info!(
            track_id = %track.id,
            sections = sections.len(),
            notes = self.notes.len(),
            chords = self.chords.len(),
            "segmented timeline"
        );
        debug!(
            melodic_phrases = melodic_phrases.len(),
            harmonic_phrases = harmonic_phrases.len(),
            "phrase rows"
        );

        BaseTables {
            prefix: self.prefix,
            duration: header.duration,
            track,
            sections,
            melodic_phrases,
            harmonic_phrases,
            notes: self.notes,
            chords: self.chords,
        }
    }
}

fn chord_id(prefix: &IdPrefix, kind: &EventKind, offset: f64) -> String {
    match chord_symbol(kind) {
        Some(symbol) => prefix.chord(&symbol.figure, offset),
        None => prefix.chord(NO_CHORD_NAME, offset),
    }
}

/// Phrase rows assigned to the section holding their start, numbered
/// from 1 within each section.
fn number_in_sections(
    boundaries: &Boundaries,
    kind: PhraseKind,
    spans: impl Iterator<Item = (f64, f64)>,
    ids: &[String],
    section_ids: &[String],
    factor: f64,
) -> Vec<PhraseRow> {
    let mut counts = vec![0usize; section_ids.len()];
    spans
        .zip(ids)
        .map(|((start, end), id)| {
            let section = boundaries.section_at(start);
            let number = counts.get_mut(section).map_or(1, |n| {
                *n += 1;
                *n
            });
            PhraseRow {
                kind,
                id: id.clone(),
                section_id: section_ids.get(section).cloned().unwrap_or_default(),
                number_in_section: number,
                span: Span::new(start, end, factor),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{FirstMeasure, NoteEvent, Spelling, Timeline};
    use pretty_assertions::assert_eq;

    fn at(offset: f64, kind: EventKind) -> Event {
        Event {
            offset,
            measure: (offset / 4.0) as i64 + 1,
            beat: offset % 4.0 + 1.0,
            kind,
        }
    }

    fn note(offset: f64, name: &str, midi: i32, duration: f64) -> Event {
        at(
            offset,
            EventKind::Note(NoteEvent {
                name: name.into(),
                octave: midi / 12 - 1,
                midi,
                pitch_class: midi.rem_euclid(12),
                duration,
            }),
        )
    }

    fn rest(offset: f64, duration: f64) -> Event {
        at(offset, EventKind::Rest { duration })
    }

    fn chord(offset: f64, figure: &str, root: (&str, i32), pitches: &[&str]) -> Event {
        at(
            offset,
            EventKind::Chord(ChordSymbol {
                figure: figure.into(),
                kind: "major".into(),
                root: Some(Spelling {
                    name: root.0.into(),
                    pitch_class: root.1,
                }),
                bass: None,
                pitches: pitches.iter().map(|p| p.to_string()).collect(),
                degrees: vec!["1".into(), "3".into(), "5".into()],
            }),
        )
    }

    fn section(offset: f64, name: &str) -> Event {
        at(offset, EventKind::Section { name: name.into() })
    }

    fn run(duration: f64, events: Vec<Event>) -> BaseTables {
        let timeline = Timeline {
            artist: "Test Band".into(),
            title: "Song".into(),
            duration,
            first_measure: FirstMeasure::default(),
            events,
        };
        segment(&timeline.normalize().unwrap())
    }

    #[test]
    fn consecutive_rests_merge() {
        let base = run(
            4.0,
            vec![note(0.0, "C", 60, 1.0), rest(1.0, 1.0), rest(2.0, 2.0)],
        );
        assert_eq!(base.notes.len(), 2);
        let merged = &base.notes[1];
        assert_eq!(merged.span.start, 1.0);
        assert_eq!(merged.duration, 3.0);
        assert_eq!(merged.span.end, 4.0);
        assert!(merged.section_end);
    }

    #[test]
    fn interval_skips_over_rests() {
        let base = run(
            4.0,
            vec![note(0.0, "C", 60, 1.0), rest(1.0, 1.0), note(2.0, "D", 62, 2.0)],
        );
        let last = base.notes[2].pitch.as_ref().unwrap();
        assert_eq!(last.interval, Interval::Semitones(2));
        let first = base.notes[0].pitch.as_ref().unwrap();
        assert_eq!(first.interval, Interval::NotApplicable);
    }

    #[test]
    fn first_note_after_opening_rest_has_no_interval() {
        let base = run(4.0, vec![rest(0.0, 1.0), note(1.0, "C", 60, 3.0)]);
        let pitched = base.notes[1].pitch.as_ref().unwrap();
        assert_eq!(pitched.interval, Interval::NotApplicable);
    }

    #[test]
    fn rest_before_new_section_is_promoted_to_section_end() {
        let base = run(
            8.0,
            vec![
                section(0.0, "Verse"),
                note(0.0, "C", 60, 2.0),
                rest(2.0, 3.0),
                section(4.0, "Chorus"),
                note(5.0, "E", 64, 3.0),
            ],
        );
        let rest_row = &base.notes[1];
        assert!(rest_row.is_rest());
        assert_eq!(rest_row.section_id, "tebasng-sec-verse-0.0");
        assert!(rest_row.section_end);
        let chorus_note = &base.notes[2];
        assert_eq!(chorus_note.section_id, "tebasng-sec-chorus-4.0");
        assert!(chorus_note.section_start);
    }

    #[test]
    fn held_note_across_boundary_advances_section() {
        let base = run(
            8.0,
            vec![
                section(0.0, "A"),
                note(0.0, "C", 60, 6.0),
                section(4.0, "B"),
                note(6.0, "D", 62, 2.0),
            ],
        );
        assert_eq!(base.notes[0].section_id, "tebasng-sec-a-0.0");
        assert_eq!(base.notes[1].section_id, "tebasng-sec-b-4.0");
        // only rests are promoted retroactively
        assert!(!base.notes[0].section_end);
        assert!(!base.notes[1].section_start);
    }

    #[test]
    fn chord_relation_and_root_distance() {
        let base = run(
            4.0,
            vec![
                chord(0.0, "C", ("C", 0), &["C", "E", "G"]),
                note(0.0, "E", 64, 1.0),
                note(1.0, "F", 65, 1.0),
                note(2.0, "B", 71, 2.0),
            ],
        );
        let relations: Vec<(ChordRelation, Option<i32>)> = base
            .notes
            .iter()
            .filter_map(|n| n.pitch.as_ref())
            .map(|p| (p.relation, p.root_distance))
            .collect();
        assert_eq!(
            relations,
            vec![
                (ChordRelation::ChordTone, Some(4)),
                (ChordRelation::NonChordTone, Some(5)),
                (ChordRelation::NonChordTone, Some(1)),
            ]
        );
        assert!(base.notes.iter().all(|n| n.chord_id == "tebasng-chord-c-0.0"));
    }

    #[test]
    fn chords_take_duration_from_the_next_chord() {
        let base = run(
            12.0,
            vec![
                note(0.0, "C", 60, 12.0),
                chord(4.0, "F", ("F", 5), &["F", "A", "C"]),
                chord(10.0, "F", ("F", 5), &["F", "A", "C"]),
            ],
        );
        let durations: Vec<f64> = base.chords.iter().map(|c| c.duration()).collect();
        assert_eq!(durations, vec![4.0, 6.0, 2.0]);
        assert!(base.chords[0].no_chord);
        assert_eq!(base.chords[1].transition, None);
        let repeat = base.chords[2].transition.unwrap();
        assert!(repeat.is_elongation());
        assert!(!repeat.same_root_and_bass_new_quality());
    }

    #[test]
    fn chord_on_section_start_uses_the_new_section() {
        let base = run(
            8.0,
            vec![
                section(0.0, "A"),
                note(0.0, "C", 60, 4.0),
                section(4.0, "B"),
                chord(4.0, "G", ("G", 7), &["G", "B", "D"]),
                note(4.0, "D", 62, 4.0),
            ],
        );
        assert_eq!(base.chords[1].section_id, "tebasng-sec-b-4.0");
        assert_eq!(base.sections[1].n_harmonic_phrases, 0);
        assert_eq!(base.sections[0].n_harmonic_phrases, 1);
    }

    #[test]
    fn phrase_exit_runs_before_next_phrase_start() {
        let base = run(
            4.0,
            vec![
                at(0.0, EventKind::PhraseStart),
                note(0.0, "C", 60, 1.0),
                at(1.0, EventKind::PhraseEnd),
                note(1.0, "D", 62, 1.0),
                at(2.0, EventKind::PhraseStart),
                note(2.0, "E", 64, 1.0),
                at(3.0, EventKind::PhraseEnd),
                note(3.0, "F", 65, 1.0),
            ],
        );
        let phrases: Vec<Option<&str>> = base.notes.iter().map(|n| n.phrase_id.as_deref()).collect();
        assert_eq!(
            phrases,
            vec![
                Some("tebasng-mp1-0.0"),
                Some("tebasng-mp1-0.0"),
                Some("tebasng-mp2-2.0"),
                Some("tebasng-mp2-2.0"),
            ]
        );
        assert_eq!(base.melodic_phrases[1].number_in_section, 2);
        assert!(base.notes[1].phrase_end);
        assert!(base.notes[2].phrase_start);
    }
}
