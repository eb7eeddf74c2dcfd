//! `harmonic_phrases_details`: one row per harmonic phrase.

use std::collections::{BTreeMap, BTreeSet};

use super::group::{chord_distance, ChordProfile};
use crate::rows::{ChordRow, PhraseRow};
use crate::stats::{join_floats, join_ints, mean, median, ratio_opt};
use crate::table::{Record, RowWriter};

/// Track-level values every harmonic phrase is compared against.
pub(crate) struct HarmonicContext<'a> {
    pub track_avg_hp_dur: Option<f64>,
    pub track_med_hp_dur: Option<f64>,
    pub track_avg_chord_dur: Option<f64>,
    pub track_med_chord_dur: Option<f64>,
    /// First sounding chord of the chorus section.
    pub chorus_first_chord: Option<&'a ChordRow>,
}

#[derive(Debug, Clone)]
pub(crate) struct HarmonicDetailRow<'a> {
    pub phrase: &'a PhraseRow,
    pub profile: ChordProfile<'a>,
    pub section_offset: f64,
    pub overlaps_next_section: bool,
    pub to_track_avg_hp: Option<f64>,
    pub to_track_med_hp: Option<f64>,
    pub to_track_avg_chord: Option<f64>,
    pub to_track_med_chord: Option<f64>,
    pub to_chorus_first_chord: (i64, i64),
}

impl<'a> HarmonicDetailRow<'a> {
    /// `section_bounds` is the start of the phrase's section and the start
    /// of the section after it (the track end for the last one).
    pub fn new(
        phrase: &'a PhraseRow,
        chords: &'a [ChordRow],
        section_bounds: (f64, f64),
        context: &HarmonicContext<'a>,
    ) -> Self {
        let profile = ChordProfile::new(
            chords
                .iter()
                .filter(|c| c.harmonic_phrase_id.as_deref() == Some(phrase.id.as_str())),
        );
        let durations = profile.durations();
        let duration = Some(phrase.span.duration());
        let (section_start, next_section_start) = section_bounds;
        Self {
            phrase,
            section_offset: phrase.span.start - section_start,
            overlaps_next_section: phrase.span.end > next_section_start,
            to_track_avg_hp: ratio_opt(duration, context.track_avg_hp_dur),
            to_track_med_hp: ratio_opt(duration, context.track_med_hp_dur),
            to_track_avg_chord: ratio_opt(mean(&durations), context.track_avg_chord_dur),
            to_track_med_chord: ratio_opt(median(&durations), context.track_med_chord_dur),
            to_chorus_first_chord: chord_distance(profile.chords.first().copied(), context.chorus_first_chord),
            profile,
        }
    }
}

impl Record for HarmonicDetailRow<'_> {
    fn write(&self, row: &mut RowWriter<'_>) {
        let p = &self.profile;
        let chords = &p.chords;
        let durations = p.durations();
        let beats: Vec<f64> = chords.iter().map(|c| c.beat).collect();
        let center_beats: Vec<f64> = chords
            .iter()
            .filter(|c| !c.is_elongation())
            .map(|c| c.beat)
            .collect();
        let motion = |pick: fn(&ChordRow) -> i64| chords.iter().map(|c| pick(c)).collect::<Vec<_>>();
        let roots = motion(|c| c.transition.map_or(-100, |t| i64::from(t.root_distance)));
        let basses = motion(|c| c.transition.map_or(-100, |t| i64::from(t.bass_distance)));

        let mut name_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for chord in chords {
            *name_counts.entry(chord.name.as_str()).or_default() += 1;
        }
        let repeated = chords
            .iter()
            .filter(|c| name_counts.get(c.name.as_str()).is_some_and(|n| *n > 1))
            .count();
        let elongations = chords.iter().filter(|c| c.is_elongation()).count();
        let qualities: BTreeSet<&str> = chords.iter().map(|c| c.kind.as_str()).collect();
        let distinct_durations: BTreeSet<u64> = durations.iter().map(|d| d.to_bits()).collect();
        let names: Vec<&str> = chords.iter().map(|c| c.name.as_str()).collect();

        row.put("hp_id", &self.phrase.id)
            .put("hp_start_chord_id", p.start_chord_id())
            .put("hp_end_chord_id", p.end_chord_id())
            .put("hp_start_section_offset", self.section_offset)
            .put("hp_to_track_avg_hp_dur", self.to_track_avg_hp)
            .put("hp_to_track_med_hp_dur", self.to_track_med_hp);
        p.write_durations(row, "hp");
        p.write_counts(row, "hp");
        p.write_qualities(row, "hp");

        row.put("pct_repeated_chords", p.share(repeated))
            .put("pct_chord_center_elongation", p.share(elongations))
            .put("chord_names", names.join(", "))
            .put("chord_durs", join_floats(&durations))
            .put("chord_center_durs", join_floats(&p.centers))
            .put("chord_change_beats", join_floats(&beats))
            .put("chord_center_change_beats", join_floats(&center_beats))
            .put("root_motion", join_ints(&roots))
            .put("bass_motion", join_ints(&basses))
            .put("n_chord_qualities", qualities.len());

        for (label, lo, hi) in [("2", 2, 2), ("3", 3, 3), ("4", 4, 4), ("5plus", 5, usize::MAX)] {
            let sized: Vec<&&ChordRow> = chords
                .iter()
                .filter(|c| (lo..=hi).contains(&c.n_pitches()))
                .collect();
            let dur: f64 = sized.iter().map(|c| c.duration()).sum();
            row.put(&format!("n_{label}_note_chords"), sized.len())
                .put(&format!("dur_{label}_note_chords"), dur);
        }

        row.put("hp_overlaps_next_section", self.overlaps_next_section)
            .put("all_chord_dur_are_same", distinct_durations.len() == 1)
            .put("hp_to_track_avg_chord_dur", self.to_track_avg_chord)
            .put("hp_to_track_med_chord_dur", self.to_track_med_chord)
            .put("hp_to_chorus_first_chord_root_dist", self.to_chorus_first_chord.0)
            .put("hp_to_chorus_first_chord_bass_dist", self.to_chorus_first_chord.1);
    }
}
