//! `tracks_form` / `sections_form`: note vs rest time, phrase structure
//! and phrase duration statistics.

use std::collections::{BTreeMap, BTreeSet};

use super::group::{Group, MelodyProfile, Spread, NO_ID};
use super::Scope;
use crate::stats::{mean, median, ratio, ratio_opt};
use crate::table::{Record, RowWriter};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FormRow {
    pub scope: Scope,
    pub id: String,
    pub start_note_id: String,
    pub end_note_id: String,
    pub start_chord_id: String,
    pub end_chord_id: String,
    pub total_dur: f64,
    pub note_dur: f64,
    pub rest_dur: f64,
    pub rest_in_mps: f64,
    pub rest_in_mps_sums: Vec<f64>,
    pub rest_between_mps_sums: Vec<f64>,
    pub n_mps: usize,
    pub n_hps: usize,
    pub n_unique_mps: usize,
    pub n_unique_hps: usize,
    pub mp: Spread,
    pub hp: Spread,
    pub n_notes: usize,
    pub n_chords: usize,
    pub section: Option<SectionForm>,
}

/// Columns only section rows carry; they compare against the track and
/// the chorus.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SectionForm {
    pub start_mp_id: String,
    pub end_mp_id: String,
    pub to_track_avg_mp_dur: Option<f64>,
    pub to_track_avg_hp_dur: Option<f64>,
    pub to_track_med_mp_dur: Option<f64>,
    pub to_track_med_hp_dur: Option<f64>,
    pub to_chorus_dur: Option<f64>,
    pub to_chorus_avg_mp_dur: Option<f64>,
    pub to_chorus_avg_hp_dur: Option<f64>,
    pub to_chorus_med_mp_dur: Option<f64>,
    pub to_chorus_med_hp_dur: Option<f64>,
    pub rest_before_first_note: Option<f64>,
    pub rest_after_last_note: Option<f64>,
}

/// Rest sums per maximal run of rows outside any melodic phrase. Runs
/// without a rest contribute nothing.
fn rest_runs_between_phrases(group: &Group<'_>) -> Vec<f64> {
    let mut runs = Vec::new();
    let mut current: Option<f64> = None;
    for row in &group.rows {
        if row.phrase_id.is_some() {
            runs.extend(current.take());
            continue;
        }
        if row.is_rest() {
            *current.get_or_insert(0.0) += row.duration;
        }
    }
    runs.extend(current);
    runs
}

fn rest_sums_per_phrase(group: &Group<'_>) -> Vec<f64> {
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for row in group.rows.iter().filter(|r| r.is_rest()) {
        if let Some(id) = row.phrase_id.as_deref() {
            *sums.entry(id).or_default() += row.duration;
        }
    }
    sums.into_values().collect()
}

/// Distinct phrases by their pitch and duration sequence.
fn unique_melodic_phrases(group: &Group<'_>) -> usize {
    let mut phrases: BTreeMap<&str, Vec<(i32, u64)>> = BTreeMap::new();
    for row in &group.rows {
        if let Some(id) = row.phrase_id.as_deref() {
            phrases
                .entry(id)
                .or_default()
                .push((row.midi().unwrap_or(-1), row.duration.to_bits()));
        }
    }
    phrases.into_values().collect::<BTreeSet<_>>().len()
}

/// Distinct harmonic phrases by their chord name and duration sequence.
fn unique_harmonic_phrases(group: &Group<'_>) -> usize {
    let mut phrases: BTreeMap<&str, Vec<(&str, u64)>> = BTreeMap::new();
    for chord in &group.chords {
        if let Some(id) = chord.harmonic_phrase_id.as_deref() {
            phrases
                .entry(id)
                .or_default()
                .push((chord.name.as_str(), chord.duration().to_bits()));
        }
    }
    phrases.into_values().collect::<BTreeSet<_>>().len()
}

impl FormRow {
    pub fn new(group: &Group<'_>, scope: Scope) -> Self {
        let melody = group.melody();
        let harmony = group.harmony();
        let total_dur: f64 = group.rows.iter().map(|r| r.duration).sum();
        let rest_in_mps: f64 = group
            .rows
            .iter()
            .filter(|r| r.is_rest() && r.phrase_id.is_some())
            .map(|r| r.duration)
            .sum();
        let section = (scope == Scope::Section).then(|| SectionForm {
            start_mp_id: group
                .melodic
                .first()
                .map_or(NO_ID.to_string(), |p| p.id.clone()),
            end_mp_id: group
                .melodic
                .last()
                .map_or(NO_ID.to_string(), |p| p.id.clone()),
            ..SectionForm::default()
        });

        Self {
            scope,
            id: group.id.to_string(),
            start_note_id: melody.start_note_id().to_string(),
            end_note_id: melody.end_note_id().to_string(),
            start_chord_id: harmony.start_chord_id().to_string(),
            end_chord_id: harmony.end_chord_id().to_string(),
            total_dur,
            note_dur: melody.note_dur,
            rest_dur: total_dur - melody.note_dur,
            rest_in_mps,
            rest_in_mps_sums: rest_sums_per_phrase(group),
            rest_between_mps_sums: rest_runs_between_phrases(group),
            n_mps: group.melodic.len(),
            n_hps: group.harmonic.len(),
            n_unique_mps: unique_melodic_phrases(group),
            n_unique_hps: unique_harmonic_phrases(group),
            mp: Spread::of(&group.mp_durations()),
            hp: Spread::of(&group.hp_durations()),
            n_notes: melody.n(),
            n_chords: harmony.n(),
            section,
        }
    }

    pub fn rest_between_mps(&self) -> f64 {
        self.rest_dur - self.rest_in_mps
    }

    /// Fill the track and chorus comparisons of a section row.
    pub fn compare(&mut self, track: &FormRow, chorus: &FormRow, duration: f64, chorus_duration: f64) {
        let (mp, hp) = (self.mp, self.hp);
        if let Some(section) = self.section.as_mut() {
            section.to_track_avg_mp_dur = ratio_opt(mp.avg, track.mp.avg);
            section.to_track_avg_hp_dur = ratio_opt(hp.avg, track.hp.avg);
            section.to_track_med_mp_dur = ratio_opt(mp.med, track.mp.med);
            section.to_track_med_hp_dur = ratio_opt(hp.med, track.hp.med);
            section.to_chorus_dur = ratio(duration, chorus_duration);
            section.to_chorus_avg_mp_dur = ratio_opt(mp.avg, chorus.mp.avg);
            section.to_chorus_avg_hp_dur = ratio_opt(hp.avg, chorus.hp.avg);
            section.to_chorus_med_mp_dur = ratio_opt(mp.med, chorus.mp.med);
            section.to_chorus_med_hp_dur = ratio_opt(hp.med, chorus.hp.med);
        }
    }

    pub fn set_note_gaps(&mut self, before: Option<f64>, after: Option<f64>) {
        if let Some(section) = self.section.as_mut() {
            section.rest_before_first_note = before;
            section.rest_after_last_note = after;
        }
    }
}

/// Rest before the first and after the last note of each group, measured
/// to the neighbouring group that has notes or to the track bounds.
/// Groups without notes get `None` on both sides.
pub(crate) fn note_gaps(groups: &[MelodyProfile<'_>], track_duration: f64) -> Vec<(Option<f64>, Option<f64>)> {
    let bounds: Vec<Option<(f64, f64)>> = groups
        .iter()
        .map(|g| {
            let first = g.notes.first()?;
            let last = g.notes.last()?;
            Some((first.span.start, last.span.end))
        })
        .collect();
    let noted: Vec<usize> = (0..bounds.len()).filter(|i| bounds[*i].is_some()).collect();

    let mut gaps = vec![(None, None); groups.len()];
    for (k, index) in noted.iter().enumerate() {
        let Some((first_start, last_end)) = bounds[*index] else {
            continue;
        };
        let previous_end = k
            .checked_sub(1)
            .and_then(|p| noted.get(p))
            .and_then(|p| bounds[*p])
            .map_or(0.0, |(_, end)| end);
        let next_start = noted
            .get(k + 1)
            .and_then(|n| bounds[*n])
            .map_or(track_duration, |(start, _)| start);
        gaps[*index] = (Some(first_start - previous_end), Some(next_start - last_end));
    }
    gaps
}

impl Record for FormRow {
    fn write(&self, row: &mut RowWriter<'_>) {
        let f = self.scope.field();
        row.put(&format!("{f}_id"), &self.id)
            .put(&format!("{f}_start_note_id"), &self.start_note_id)
            .put(&format!("{f}_end_note_id"), &self.end_note_id)
            .put(&format!("{f}_start_chord_id"), &self.start_chord_id)
            .put(&format!("{f}_end_chord_id"), &self.end_chord_id);

        for (stat, value, whole) in [
            ("note_dur", self.note_dur, self.total_dur),
            ("rest_dur", self.rest_dur, self.total_dur),
            ("rest_dur_in_mps", self.rest_in_mps, self.rest_dur),
            ("rest_dur_between_mps", self.rest_between_mps(), self.rest_dur),
        ] {
            row.put(&format!("{f}_{stat}"), value)
                .put(&format!("{f}_{stat}_pct"), ratio(value, whole));
        }

        row.put(&format!("{f}_avg_rest_dur_in_mps"), mean(&self.rest_in_mps_sums))
            .put(&format!("{f}_med_rest_dur_in_mps"), median(&self.rest_in_mps_sums))
            .put(
                &format!("{f}_avg_rest_dur_between_mps"),
                mean(&self.rest_between_mps_sums),
            )
            .put(
                &format!("{f}_med_rest_dur_between_mps"),
                median(&self.rest_between_mps_sums),
            )
            .put(&format!("{f}_n_mps"), self.n_mps)
            .put(&format!("{f}_n_hps"), self.n_hps)
            .put(&format!("{f}_n_unique_mps"), self.n_unique_mps)
            .put(&format!("{f}_n_unique_hps"), self.n_unique_hps)
            .put(&format!("{f}_avg_mp_dur"), self.mp.avg)
            .put(&format!("{f}_avg_hp_dur"), self.hp.avg)
            .put(&format!("{f}_med_mp_dur"), self.mp.med)
            .put(&format!("{f}_med_hp_dur"), self.hp.med)
            .put(&format!("{f}_std_mp_dur"), self.mp.std)
            .put(&format!("{f}_std_hp_dur"), self.hp.std)
            .put(&format!("{f}_n_notes"), self.n_notes)
            .put(&format!("{f}_n_chords"), self.n_chords);

        if let Some(s) = &self.section {
            row.put("sec_start_mp_id", &s.start_mp_id)
                .put("sec_end_mp_id", &s.end_mp_id)
                .put("sec_to_track_avg_mp_dur", s.to_track_avg_mp_dur)
                .put("sec_to_track_avg_hp_dur", s.to_track_avg_hp_dur)
                .put("sec_to_track_med_mp_dur", s.to_track_med_mp_dur)
                .put("sec_to_track_med_hp_dur", s.to_track_med_hp_dur)
                .put("sec_to_chorus_dur", s.to_chorus_dur)
                .put("sec_to_chorus_avg_mp_dur", s.to_chorus_avg_mp_dur)
                .put("sec_to_chorus_avg_hp_dur", s.to_chorus_avg_hp_dur)
                .put("sec_to_chorus_med_mp_dur", s.to_chorus_med_mp_dur)
                .put("sec_to_chorus_med_hp_dur", s.to_chorus_med_hp_dur)
                .put("rest_dur_before_sec_first_note", s.rest_before_first_note)
                .put("rest_dur_after_sec_last_note", s.rest_after_last_note);
        }
    }
}
