//! Input contract: the parsed timeline handed over by the notation parser,
//! and the normalization step that prepares it for the segmentation pass.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::boundaries::Boundaries;

/// Name given to the section synthesized when no marker sits at offset 0.
pub const IMPLICIT_SECTION: &str = "Intro";

/// Violations of the input contract. The pass never starts on such input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    #[error("track duration must be positive and finite, got {0}")]
    InvalidDuration(f64),

    #[error("event {index} at offset {offset} lies outside [0, {duration}]")]
    OffsetOutOfRange {
        index: usize,
        offset: f64,
        duration: f64,
    },

    #[error("event {index} at offset {offset} comes before the previous event at {previous}")]
    OffsetOutOfOrder {
        index: usize,
        offset: f64,
        previous: f64,
    },

    #[error("event {index} at offset {offset} has invalid duration {duration}")]
    InvalidEventDuration {
        index: usize,
        offset: f64,
        duration: f64,
    },

    #[error("unbalanced phrase marker at offset {offset}")]
    UnbalancedPhrase { offset: f64 },
}

/// A complete, ordered single-line timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub artist: String,
    pub title: String,
    /// Total length in duration units (quarter notes).
    pub duration: f64,
    #[serde(default)]
    pub first_measure: FirstMeasure,
    pub events: Vec<Event>,
}

/// Header information read from the first measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstMeasure {
    #[serde(default = "FirstMeasure::default_number")]
    pub number: i64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub is_pickup: bool,
    #[serde(default)]
    pub key_sharps: Option<i32>,
    #[serde(default)]
    pub time_signature: Option<String>,
    #[serde(default)]
    pub tempo: Option<Tempo>,
}

impl FirstMeasure {
    fn default_number() -> i64 {
        1
    }
}

impl Default for FirstMeasure {
    fn default() -> Self {
        Self {
            number: Self::default_number(),
            duration: 0.0,
            is_pickup: false,
            key_sharps: None,
            time_signature: None,
            tempo: None,
        }
    }
}

/// Metronome mark: beats per minute and the beat length in duration units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    pub bpm: f64,
    #[serde(default = "Tempo::default_referent")]
    pub referent: f64,
}

impl Tempo {
    fn default_referent() -> f64 {
        1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Absolute offset from the start of the track.
    pub offset: f64,
    #[serde(default)]
    pub measure: i64,
    #[serde(default)]
    pub beat: f64,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Note(NoteEvent),
    Rest { duration: f64 },
    Chord(ChordSymbol),
    NoChord,
    Section { name: String },
    PhraseStart,
    /// Sits at the offset of the phrase's last note.
    PhraseEnd,
    HarmonicPhrase,
}

impl EventKind {
    /// Duration of a note or rest.
    pub fn duration(&self) -> Option<f64> {
        match self {
            EventKind::Note(note) => Some(note.duration),
            EventKind::Rest { duration } => Some(*duration),
            _ => None,
        }
    }

    pub fn is_chord(&self) -> bool {
        matches!(self, EventKind::Chord(_) | EventKind::NoChord)
    }

    /// Processing order within one offset: markers, chords, then notes.
    /// Phrase markers keep their input order so a one-note phrase opens
    /// before it closes.
    fn rank(&self) -> u8 {
        match self {
            EventKind::Section { .. } => 0,
            EventKind::PhraseStart | EventKind::PhraseEnd | EventKind::HarmonicPhrase => 1,
            EventKind::Chord(_) | EventKind::NoChord => 2,
            EventKind::Note(_) | EventKind::Rest { .. } => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Pitch name with `#` for sharps and `-` for flats, e.g. `E-`.
    pub name: String,
    pub octave: i32,
    pub midi: i32,
    pub pitch_class: i32,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordSymbol {
    pub figure: String,
    /// MusicXML kind value, e.g. `major`, `dominant-seventh`.
    pub kind: String,
    #[serde(default)]
    pub root: Option<Spelling>,
    #[serde(default)]
    pub bass: Option<Spelling>,
    #[serde(default)]
    pub pitches: Vec<String>,
    #[serde(default)]
    pub degrees: Vec<String>,
}

impl ChordSymbol {
    /// The sounding bass; the root when no inversion is given.
    pub fn bass(&self) -> Option<&Spelling> {
        self.bass.as_ref().or(self.root.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spelling {
    pub name: String,
    pub pitch_class: i32,
}

/// Track-level facts the pass needs besides the events.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackHeader {
    pub artist: String,
    pub title: String,
    pub duration: f64,
    pub first_measure: FirstMeasure,
    /// Pickup-measure correction subtracted from every m1b1 offset.
    pub m1b1_factor: f64,
}

/// The augmented, immutable event list the segmentation pass walks.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTimeline {
    pub header: TrackHeader,
    pub events: Vec<Event>,
    pub boundaries: Boundaries,
}

impl Timeline {
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Check the input contract, synthesize the implicit markers and
    /// extract the boundary arrays.
    pub fn normalize(&self) -> Result<NormalizedTimeline, TimelineError> {
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(TimelineError::InvalidDuration(self.duration));
        }
        self.check_events()?;

        let opening = |kind: EventKind| Event {
            offset: 0.0,
            measure: self.first_measure.number,
            beat: 1.0,
            kind,
        };
        let at_start = |test: fn(&EventKind) -> bool| {
            self.events
                .iter()
                .any(|event| event.offset == 0.0 && test(&event.kind))
        };

        let mut events = Vec::with_capacity(self.events.len() + 3);
        if !at_start(|kind| matches!(kind, EventKind::Section { .. })) {
            warn!(title = %self.title, "no section marker at offset 0, adding implicit {IMPLICIT_SECTION}");
            events.push(opening(EventKind::Section {
                name: IMPLICIT_SECTION.to_string(),
            }));
        }
        if !at_start(EventKind::is_chord) {
            warn!(title = %self.title, "no chord symbol at offset 0, adding implicit no-chord");
            events.push(opening(EventKind::NoChord));
        }
        if !at_start(|kind| matches!(kind, EventKind::HarmonicPhrase)) {
            debug!(title = %self.title, "no harmonic phrase marker at offset 0, adding one");
            events.push(opening(EventKind::HarmonicPhrase));
        }
        events.extend(self.events.iter().cloned().map(|mut event| {
            // fold -0.0 into 0.0 so total ordering agrees with equality
            event.offset += 0.0;
            event
        }));
        events.sort_by(|a, b| {
            a.offset
                .total_cmp(&b.offset)
                .then(a.kind.rank().cmp(&b.kind.rank()))
        });

        let boundaries = Boundaries::from_events(&events, self.duration)?;
        let m1b1_factor = if self.first_measure.is_pickup {
            self.first_measure.duration
        } else {
            0.0
        };

        Ok(NormalizedTimeline {
            header: TrackHeader {
                artist: self.artist.clone(),
                title: self.title.clone(),
                duration: self.duration,
                first_measure: self.first_measure.clone(),
                m1b1_factor,
            },
            events,
            boundaries,
        })
    }

    fn check_events(&self) -> Result<(), TimelineError> {
        let mut previous = 0.0_f64;
        for (index, event) in self.events.iter().enumerate() {
            let offset = event.offset;
            if !offset.is_finite() || offset < 0.0 || offset > self.duration {
                return Err(TimelineError::OffsetOutOfRange {
                    index,
                    offset,
                    duration: self.duration,
                });
            }
            if offset < previous {
                return Err(TimelineError::OffsetOutOfOrder {
                    index,
                    offset,
                    previous,
                });
            }
            if let Some(duration) = event.kind.duration() {
                if !duration.is_finite() || duration < 0.0 {
                    return Err(TimelineError::InvalidEventDuration {
                        index,
                        offset,
                        duration,
                    });
                }
            }
            previous = offset;
        }
        Ok(())
    }
}
