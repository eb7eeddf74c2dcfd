//! Pure per-event musical features: chord-tone relation, melodic motion
//! and chord-to-chord root/bass movement.

use serde::{Deserialize, Serialize};

use crate::timeline::ChordSymbol;

/// How a note relates to the chord sounding at its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordRelation {
    NoChord,
    ChordTone,
    NonChordTone,
}

impl ChordRelation {
    pub fn of(note_name: &str, chord: Option<&ChordSymbol>) -> Self {
        match chord {
            None => ChordRelation::NoChord,
            Some(chord) => {
                let member = chord
                    .pitches
                    .iter()
                    .any(|pitch| pitch.eq_ignore_ascii_case(note_name));
                if member {
                    ChordRelation::ChordTone
                } else {
                    ChordRelation::NonChordTone
                }
            }
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ChordRelation::NoChord => -1,
            ChordRelation::ChordTone => 0,
            ChordRelation::NonChordTone => 1,
        }
    }
}

/// Pitch-class distance folded onto the shortest path around the circle,
/// so the result is always in `0..=6`.
pub fn root_distance(note_pc: i32, root_pc: i32) -> i32 {
    let (mut a, mut b) = (note_pc, root_pc);
    if (a - b).abs() > 6 {
        if a > b {
            a -= 12;
        } else {
            b -= 12;
        }
    }
    (a - b).abs()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Same,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Same => "same",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motion {
    Step,
    Skip,
    Leap,
    Same,
}

impl Motion {
    pub fn as_str(self) -> &'static str {
        match self {
            Motion::Step => "step",
            Motion::Skip => "skip",
            Motion::Leap => "leap",
            Motion::Same => "same",
        }
    }
}

/// Melodic interval to the previous sounding note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    /// First note of the track, or no earlier note before a rest.
    NotApplicable,
    Semitones(i32),
}

impl Interval {
    pub fn between(previous_midi: Option<i32>, midi: i32) -> Self {
        match previous_midi {
            Some(previous) => Interval::Semitones(midi - previous),
            None => Interval::NotApplicable,
        }
    }

    pub fn semitones(self) -> Option<i32> {
        match self {
            Interval::Semitones(value) => Some(value),
            Interval::NotApplicable => None,
        }
    }

    pub fn direction(self) -> Option<Direction> {
        self.semitones().map(|value| match value.signum() {
            1 => Direction::Up,
            -1 => Direction::Down,
            _ => Direction::Same,
        })
    }

    pub fn motion(self) -> Option<Motion> {
        self.semitones().map(|value| match value.abs() {
            0 => Motion::Same,
            1 | 2 => Motion::Step,
            3 | 4 => Motion::Skip,
            _ => Motion::Leap,
        })
    }
}

/// Signed shortest distance between two pitch classes, chosen among the
/// direct difference and the two octave-shifted ones. The first minimum
/// wins ties.
pub fn circle_distance(current: i32, previous: i32) -> i32 {
    let candidates = [
        current - previous,
        (current - 12) - previous,
        current - (previous - 12),
    ];
    let (index, distance) = candidates
        .iter()
        .map(|candidate| candidate.abs())
        .enumerate()
        .min_by_key(|(_, distance)| *distance)
        .unwrap_or((0, 0));
    let negative = if index == 0 {
        previous > current
    } else {
        current > previous
    };
    if negative {
        -distance
    } else {
        distance
    }
}

/// Root and bass movement between two chords; `None` when either chord
/// is missing a root or bass.
pub fn root_bass_distance(
    current_root: Option<i32>,
    current_bass: Option<i32>,
    previous_root: Option<i32>,
    previous_bass: Option<i32>,
) -> Option<(i32, i32)> {
    Some((
        circle_distance(current_root?, previous_root?),
        circle_distance(current_bass?, previous_bass?),
    ))
}

/// Comparison of a chord row against the chord row before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordTransition {
    pub root_distance: i32,
    pub bass_distance: i32,
    pub same_quality: bool,
}

impl ChordTransition {
    pub fn between(current: Option<&ChordSymbol>, previous: Option<&ChordSymbol>) -> Option<Self> {
        let (current, previous) = (current?, previous?);
        let pc = |chord: &ChordSymbol| chord.root.as_ref().map(|s| s.pitch_class);
        let bass = |chord: &ChordSymbol| chord.bass().map(|s| s.pitch_class);
        let (root_distance, bass_distance) =
            root_bass_distance(pc(current), bass(current), pc(previous), bass(previous))?;
        Some(Self {
            root_distance,
            bass_distance,
            same_quality: current.kind == previous.kind,
        })
    }

    /// Root or bass held over from the previous chord.
    pub fn is_elongation(&self) -> bool {
        self.root_distance == 0 || self.bass_distance == 0
    }

    pub fn same_root_and_bass_new_quality(&self) -> bool {
        self.root_distance == 0 && self.bass_distance == 0 && !self.same_quality
    }

    pub fn same_root_new_bass(&self) -> bool {
        self.root_distance == 0 && self.bass_distance != 0
    }

    pub fn same_bass_new_root(&self) -> bool {
        self.root_distance != 0 && self.bass_distance == 0
    }
}

/// Quality family of a chord kind, by third and seventh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordFamily {
    Maj3No7,
    Min3No7,
    Maj3Maj7,
    Min3Min7,
    Maj3Min7,
    Other,
}

impl ChordFamily {
    pub const ALL: [ChordFamily; 6] = [
        ChordFamily::Maj3No7,
        ChordFamily::Min3No7,
        ChordFamily::Maj3Maj7,
        ChordFamily::Min3Min7,
        ChordFamily::Maj3Min7,
        ChordFamily::Other,
    ];

    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "major" | "augmented" | "major-sixth" => ChordFamily::Maj3No7,
            "minor" | "diminished" | "minor-sixth" => ChordFamily::Min3No7,
            "major-seventh" | "major-ninth" | "major-11th" | "major-13th"
            | "augmented-major-seventh" => ChordFamily::Maj3Maj7,
            "minor-seventh" | "minor-ninth" | "minor-11th" | "minor-13th"
            | "half-diminished-seventh" => ChordFamily::Min3Min7,
            "dominant" | "dominant-seventh" | "dominant-ninth" | "dominant-11th"
            | "dominant-13th" | "augmented-seventh" => ChordFamily::Maj3Min7,
            _ => ChordFamily::Other,
        }
    }

    /// Column suffix after `pct_`.
    pub fn as_str(self) -> &'static str {
        match self {
            ChordFamily::Maj3No7 => "maj_3_no_7",
            ChordFamily::Min3No7 => "min_3_no_7",
            ChordFamily::Maj3Maj7 => "maj_3_maj_7",
            ChordFamily::Min3Min7 => "min_3_min_7",
            ChordFamily::Maj3Min7 => "maj_3_min_7",
            ChordFamily::Other => "other_quality",
        }
    }
}

const SIMPLE_INTERVALS: [(&str, i32); 12] = [
    ("P", 1),
    ("m", 2),
    ("M", 2),
    ("m", 3),
    ("M", 3),
    ("P", 4),
    ("A", 4),
    ("P", 5),
    ("m", 6),
    ("M", 6),
    ("m", 7),
    ("M", 7),
];

/// Interval name for a span in semitones: `P1`, `M3`, `P8`, `m10`.
pub fn interval_name(semitones: i32) -> String {
    let span = semitones.abs();
    let octaves = span / 12;
    let (quality, generic) = SIMPLE_INTERVALS[(span % 12) as usize];
    format!("{quality}{}", generic + 7 * octaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::Spelling;
    use pretty_assertions::assert_eq;

    fn chord(kind: &str, root: i32, bass: i32, pitches: &[&str]) -> ChordSymbol {
        ChordSymbol {
            figure: "X".into(),
            kind: kind.into(),
            root: Some(Spelling {
                name: "X".into(),
                pitch_class: root,
            }),
            bass: Some(Spelling {
                name: "X".into(),
                pitch_class: bass,
            }),
            pitches: pitches.iter().map(|p| p.to_string()).collect(),
            degrees: vec![],
        }
    }

    #[test]
    fn interval_direction_and_motion() {
        let cases = [
            (62, Direction::Up, Motion::Step),
            (65, Direction::Up, Motion::Skip),
            (71, Direction::Up, Motion::Leap),
            (60, Direction::Same, Motion::Same),
            (57, Direction::Down, Motion::Skip),
        ];
        for (midi, direction, motion) in cases {
            let interval = Interval::between(Some(60), midi);
            assert_eq!(interval.direction(), Some(direction), "midi {midi}");
            assert_eq!(interval.motion(), Some(motion), "midi {midi}");
        }
        assert_eq!(Interval::between(None, 60).direction(), None);
    }

    #[test]
    fn chord_relation_ignores_case() {
        let c = chord("major", 0, 0, &["c", "e", "g"]);
        assert_eq!(ChordRelation::of("E", Some(&c)), ChordRelation::ChordTone);
        assert_eq!(ChordRelation::of("F#", Some(&c)), ChordRelation::NonChordTone);
        assert_eq!(ChordRelation::of("F#", None).code(), -1);
    }

    #[test]
    fn root_distance_folds_to_six() {
        assert_eq!(root_distance(0, 0), 0);
        assert_eq!(root_distance(11, 0), 1);
        assert_eq!(root_distance(0, 7), 5);
        assert_eq!(root_distance(6, 0), 6);
        assert_eq!(root_distance(2, 9), 5);
    }

    #[test]
    fn circle_distance_is_signed_by_motion() {
        assert_eq!(circle_distance(7, 0), -5);
        assert_eq!(circle_distance(0, 7), 5);
        assert_eq!(circle_distance(2, 0), 2);
        assert_eq!(circle_distance(0, 2), -2);
        assert_eq!(circle_distance(11, 0), -1);
        assert_eq!(circle_distance(0, 11), 1);
        assert_eq!(circle_distance(6, 0), 6);
        assert_eq!(circle_distance(5, 5), 0);
    }

    #[test]
    fn transition_flags() {
        let c = chord("major", 0, 0, &[]);
        let c_over_e = chord("major", 0, 4, &[]);
        let cm = chord("minor", 0, 0, &[]);
        let am_over_c = chord("minor", 9, 0, &[]);

        let same = ChordTransition::between(Some(&cm), Some(&c)).unwrap();
        assert!(same.is_elongation());
        assert!(same.same_root_and_bass_new_quality());

        let inversion = ChordTransition::between(Some(&c_over_e), Some(&c)).unwrap();
        assert!(inversion.same_root_new_bass());
        assert!(!inversion.same_bass_new_root());

        let pedal = ChordTransition::between(Some(&am_over_c), Some(&c)).unwrap();
        assert!(pedal.same_bass_new_root());
        assert_eq!(pedal.root_distance, -3);

        assert_eq!(ChordTransition::between(Some(&c), None), None);
    }

    #[test]
    fn chord_families() {
        assert_eq!(ChordFamily::from_kind("dominant-seventh"), ChordFamily::Maj3Min7);
        assert_eq!(ChordFamily::from_kind("half-diminished-seventh"), ChordFamily::Min3Min7);
        assert_eq!(ChordFamily::from_kind("suspended-fourth"), ChordFamily::Other);
        assert_eq!(ChordFamily::Other.as_str(), "other_quality");
    }

    #[test]
    fn interval_names() {
        assert_eq!(interval_name(0), "P1");
        assert_eq!(interval_name(4), "M3");
        assert_eq!(interval_name(6), "A4");
        assert_eq!(interval_name(12), "P8");
        assert_eq!(interval_name(15), "m10");
        assert_eq!(interval_name(24), "P15");
    }
}
