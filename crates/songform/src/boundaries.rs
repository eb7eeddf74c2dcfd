//! Sorted boundary arrays for sections, melodic phrases and harmonic
//! phrases, with the binary-search lookups the segmentation pass uses.

use std::cmp::Ordering;

use tracing::debug;

use crate::timeline::{Event, EventKind, TimelineError};

#[derive(Debug, Clone, PartialEq)]
pub struct SectionSpan {
    pub name: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhraseSpan {
    pub start: f64,
    /// Start offset of the phrase's last note.
    pub last_note_start: f64,
    /// End offset of the phrase's last note.
    pub end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicSpan {
    pub start: f64,
    pub end: f64,
}

macro_rules! span_duration {
    ($($ty:ty),*) => {$(
        impl $ty {
            pub fn duration(&self) -> f64 {
                self.end - self.start
            }
        }
    )*};
}

span_duration!(SectionSpan, PhraseSpan, HarmonicSpan);

/// Boundary offsets of one normalized timeline. Every array is sorted by
/// start offset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Boundaries {
    sections: Vec<SectionSpan>,
    section_starts: Vec<f64>,
    section_ends: Vec<f64>,
    phrases: Vec<PhraseSpan>,
    phrase_starts: Vec<f64>,
    phrase_last_notes: Vec<f64>,
    harmonic: Vec<HarmonicSpan>,
    harmonic_starts: Vec<f64>,
}

fn sorted_contains(values: &[f64], offset: f64) -> bool {
    values
        .binary_search_by(|probe| probe.total_cmp(&offset))
        .is_ok()
}

/// Index of the last value `<= offset`.
fn last_at_or_before(values: &[f64], offset: f64) -> Option<usize> {
    values
        .partition_point(|probe| probe.total_cmp(&offset) != Ordering::Greater)
        .checked_sub(1)
}

/// First value strictly greater than `offset`.
fn first_after(values: &[f64], offset: f64) -> Option<f64> {
    let index = values.partition_point(|probe| probe.total_cmp(&offset) != Ordering::Greater);
    values.get(index).copied()
}

impl Boundaries {
    /// Extract the boundary arrays from an already sorted event list.
    pub fn from_events(events: &[Event], duration: f64) -> Result<Self, TimelineError> {
        let mut sections: Vec<SectionSpan> = Vec::new();
        let mut harmonic_starts: Vec<f64> = Vec::new();
        let mut phrase_markers: Vec<(f64, f64)> = Vec::new();
        let mut open_phrase: Option<f64> = None;

        for event in events {
            match &event.kind {
                EventKind::Section { name } => {
                    match sections.last_mut() {
                        Some(last) if last.start == event.offset => {
                            debug!(offset = event.offset, replaced = %last.name, "duplicate section marker");
                            last.name = name.clone();
                        }
                        _ => sections.push(SectionSpan {
                            name: name.clone(),
                            start: event.offset,
                            end: duration,
                        }),
                    }
                }
                EventKind::HarmonicPhrase => {
                    if harmonic_starts.last() != Some(&event.offset) {
                        harmonic_starts.push(event.offset);
                    }
                }
                EventKind::PhraseStart => {
                    if open_phrase.is_some() {
                        return Err(TimelineError::UnbalancedPhrase {
                            offset: event.offset,
                        });
                    }
                    open_phrase = Some(event.offset);
                }
                EventKind::PhraseEnd => match open_phrase.take() {
                    Some(start) => phrase_markers.push((start, event.offset)),
                    None => {
                        return Err(TimelineError::UnbalancedPhrase {
                            offset: event.offset,
                        })
                    }
                },
                _ => {}
            }
        }
        if let Some(offset) = open_phrase {
            return Err(TimelineError::UnbalancedPhrase { offset });
        }

        for index in 1..sections.len() {
            sections[index - 1].end = sections[index].start;
        }

        // note/rest spans, sorted by start, to close each phrase on its last note
        let sounding: Vec<(f64, f64)> = events
            .iter()
            .filter_map(|event| event.kind.duration().map(|d| (event.offset, d)))
            .collect();
        let phrases: Vec<PhraseSpan> = phrase_markers
            .into_iter()
            .map(|(start, last_note_start)| {
                let index = sounding.partition_point(|(offset, _)| {
                    offset.total_cmp(&last_note_start) == Ordering::Less
                });
                let end = match sounding.get(index) {
                    Some((offset, duration)) if *offset == last_note_start => offset + duration,
                    _ => last_note_start,
                };
                PhraseSpan {
                    start,
                    last_note_start,
                    end,
                }
            })
            .collect();

        let harmonic: Vec<HarmonicSpan> = harmonic_starts
            .iter()
            .enumerate()
            .map(|(index, start)| HarmonicSpan {
                start: *start,
                end: harmonic_starts.get(index + 1).copied().unwrap_or(duration),
            })
            .collect();

        let mut phrase_last_notes: Vec<f64> = phrases.iter().map(|p| p.last_note_start).collect();
        phrase_last_notes.sort_by(f64::total_cmp);

        Ok(Self {
            section_starts: sections.iter().map(|s| s.start).collect(),
            section_ends: sections.iter().map(|s| s.end).collect(),
            sections,
            phrase_starts: phrases.iter().map(|p| p.start).collect(),
            phrase_last_notes,
            phrases,
            harmonic_starts,
            harmonic,
        })
    }

    pub fn sections(&self) -> &[SectionSpan] {
        &self.sections
    }

    pub fn phrases(&self) -> &[PhraseSpan] {
        &self.phrases
    }

    pub fn harmonic_phrases(&self) -> &[HarmonicSpan] {
        &self.harmonic
    }

    pub fn is_section_start(&self, offset: f64) -> bool {
        sorted_contains(&self.section_starts, offset)
    }

    pub fn is_section_end(&self, offset: f64) -> bool {
        sorted_contains(&self.section_ends, offset)
    }

    /// Section whose `[start, end)` interval holds `offset`; the last
    /// section for the track end itself.
    pub fn section_at(&self, offset: f64) -> usize {
        last_at_or_before(&self.section_starts, offset).unwrap_or(0)
    }

    /// Section starting exactly at `offset`.
    pub fn section_starting_at(&self, offset: f64) -> Option<usize> {
        self.section_starts
            .binary_search_by(|probe| probe.total_cmp(&offset))
            .ok()
    }

    /// Start of the section after `index`, or the track end.
    pub fn section_start_after(&self, index: usize) -> Option<f64> {
        self.section_starts.get(index + 1).copied()
    }

    pub fn is_phrase_start(&self, offset: f64) -> bool {
        sorted_contains(&self.phrase_starts, offset)
    }

    pub fn is_phrase_last_note(&self, offset: f64) -> bool {
        sorted_contains(&self.phrase_last_notes, offset)
    }

    /// Phrase whose closed-open interval holds `offset`.
    pub fn phrase_at(&self, offset: f64) -> Option<usize> {
        let index = last_at_or_before(&self.phrase_starts, offset)?;
        let phrase = &self.phrases[index];
        (offset < phrase.end || offset == phrase.start).then_some(index)
    }

    /// Next phrase start strictly after `offset`.
    pub fn phrase_start_after(&self, offset: f64) -> Option<f64> {
        first_after(&self.phrase_starts, offset)
    }

    pub fn harmonic_starting_at(&self, offset: f64) -> Option<usize> {
        self.harmonic_starts
            .binary_search_by(|probe| probe.total_cmp(&offset))
            .ok()
    }

    /// Harmonic phrase whose interval holds `offset`.
    pub fn harmonic_at(&self, offset: f64) -> Option<usize> {
        last_at_or_before(&self.harmonic_starts, offset)
    }
}
