//! Second pass over the finished base tables: track, section, phrase and
//! note summaries.
//!
//! Every summary table is built from typed rows that borrow the base rows
//! they describe. Sections are compared against a designated chorus (see
//! [`find_chorus`]); phrases against their section and the whole track.

mod form;
mod group;
mod harmonic;
mod harmony;
mod melodic;
mod melody;
mod notes;

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::rows::SectionRow;
use crate::segment::BaseTables;
use crate::stats::{mean, median};
use crate::table::{Table, TableSet};
use crate::{Error, Result};

use form::{note_gaps, FormRow};
use group::{Group, MelodyProfile};
use harmonic::{HarmonicContext, HarmonicDetailRow};
use harmony::HarmonyRow;
use melodic::{finish_melodic, MelodicDetailRow, PhraseContext};
use melody::MelodyRow;
use notes::{NoteContext, NoteDetailRow};

/// Grouping level of a form/melody/harmony row; also its column prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    Track,
    Section,
}

impl Scope {
    pub fn field(self) -> &'static str {
        match self {
            Scope::Track => "track",
            Scope::Section => "sec",
        }
    }
}

/// Index of the section every other section is compared against: the
/// first named like a chorus (but not a pre- or post-chorus), else the
/// first that is not an intro.
pub fn find_chorus(sections: &[SectionRow]) -> Result<usize> {
    let names: Vec<String> = sections.iter().map(|s| s.name.to_lowercase()).collect();
    names
        .iter()
        .position(|n| n.contains("chorus") && !n.contains("pre") && !n.contains("post"))
        .or_else(|| names.iter().position(|n| !n.contains("intro")))
        .ok_or(Error::ChorusNotFound)
}

/// The nine summary tables of one track, as typed rows.
#[derive(Debug, Clone)]
pub struct Summary<'a> {
    chorus: usize,
    track_form: FormRow,
    track_melody: MelodyRow<'a>,
    track_harmony: HarmonyRow<'a>,
    section_forms: Vec<FormRow>,
    section_melodies: Vec<MelodyRow<'a>>,
    section_harmonies: Vec<HarmonyRow<'a>>,
    melodic: Vec<MelodicDetailRow<'a>>,
    harmonic: Vec<HarmonicDetailRow<'a>>,
    notes: Vec<NoteDetailRow<'a>>,
}

/// Section id to position in the section table.
struct SectionIndex<'a>(BTreeMap<&'a str, usize>);

impl<'a> SectionIndex<'a> {
    fn new(sections: &'a [SectionRow]) -> Self {
        Self(sections.iter().enumerate().map(|(i, s)| (s.id.as_str(), i)).collect())
    }

    fn get(&self, id: &str) -> Result<usize> {
        self.0
            .get(id)
            .copied()
            .ok_or_else(|| Error::UnknownSection(id.to_string()))
    }
}

/// Build every summary row. Fails when no chorus can be designated or a
/// phrase or note names a section the track does not have; the base
/// tables are left untouched either way.
pub fn summarize(base: &BaseTables) -> Result<Summary<'_>> {
    let section_index = SectionIndex::new(&base.sections);
    let track = Group::track(base);
    let sections: Vec<Group<'_>> = base.sections.iter().map(|s| Group::section(base, s)).collect();

    let track_form = FormRow::new(&track, Scope::Track);
    let track_melody = MelodyRow::new(&track, Scope::Track);
    let track_harmony = HarmonyRow::new(&track, Scope::Track);
    let mut section_forms: Vec<FormRow> = sections.iter().map(|g| FormRow::new(g, Scope::Section)).collect();
    let mut section_melodies: Vec<MelodyRow<'_>> = sections
        .iter()
        .map(|g| MelodyRow::new(g, Scope::Section))
        .collect();
    let mut section_harmonies: Vec<HarmonyRow<'_>> = sections
        .iter()
        .map(|g| HarmonyRow::new(g, Scope::Section))
        .collect();

    let chorus = find_chorus(&base.sections)?;
    debug!(chorus = %base.sections[chorus].id, "designated chorus section");

    let chorus_form = section_forms[chorus].clone();
    let chorus_duration = sections[chorus].duration;
    let profiles: Vec<MelodyProfile<'_>> = sections.iter().map(Group::melody).collect();
    let gaps = note_gaps(&profiles, base.duration);
    for ((form, group), (before, after)) in section_forms.iter_mut().zip(&sections).zip(gaps) {
        form.compare(&track_form, &chorus_form, group.duration, chorus_duration);
        form.set_note_gaps(before, after);
    }

    let chorus_melody = section_melodies[chorus].profile.clone();
    let ranges: Vec<Option<i32>> = section_melodies.iter().map(|m| m.profile.range()).collect();
    for melody in &mut section_melodies {
        melody.compare(&track_melody.profile, &chorus_melody, &ranges);
    }

    let chorus_first_row = sections[chorus].chords.first().copied();
    for harmony in &mut section_harmonies {
        harmony.compare(chorus_first_row);
    }

    let mut melodic: Vec<MelodicDetailRow<'_>> = base
        .melodic_phrases
        .iter()
        .map(|phrase| {
            let index = section_index.get(&phrase.section_id)?;
            let context = PhraseContext {
                track: &track_melody.profile,
                section: &section_melodies[index].profile,
                section_start: base.sections[index].span.start,
                track_avg_mp_dur: track_form.mp.avg,
                track_med_mp_dur: track_form.mp.med,
            };
            Ok(MelodicDetailRow::new(phrase, &base.notes, &base.chords, &context))
        })
        .collect::<Result<_>>()?;
    finish_melodic(&mut melodic, base.duration);

    let track_chord_durs = track_harmony.profile.durations();
    let harmonic_context = HarmonicContext {
        track_avg_hp_dur: track_form.hp.avg,
        track_med_hp_dur: track_form.hp.med,
        track_avg_chord_dur: mean(&track_chord_durs),
        track_med_chord_dur: median(&track_chord_durs),
        chorus_first_chord: sections[chorus].chords.iter().copied().find(|c| !c.no_chord),
    };
    let harmonic: Vec<HarmonicDetailRow<'_>> = base
        .harmonic_phrases
        .iter()
        .map(|phrase| {
            let section = &base.sections[section_index.get(&phrase.section_id)?];
            let bounds = (section.span.start, section.span.end);
            Ok(HarmonicDetailRow::new(phrase, &base.chords, bounds, &harmonic_context))
        })
        .collect::<Result<_>>()?;

    let notes: Vec<NoteDetailRow<'_>> = base
        .notes
        .iter()
        .map(|note| {
            let index = section_index.get(&note.section_id)?;
            let phrase = note.phrase_id.as_deref().and_then(|id| {
                melodic
                    .iter()
                    .find(|m| m.phrase.id == id)
                    .map(|m| (m.phrase.span.start, m.profile.longest))
            });
            let context = NoteContext {
                track: &track_melody.profile,
                section: &section_melodies[index].profile,
                section_start: base.sections[index].span.start,
                phrase,
            };
            Ok(NoteDetailRow::new(note, &base.chords, &context))
        })
        .collect::<Result<_>>()?;

    info!(
        track = %base.track.id,
        sections = section_forms.len(),
        melodic_phrases = melodic.len(),
        harmonic_phrases = harmonic.len(),
        notes = notes.len(),
        "summarized track"
    );

    Ok(Summary {
        chorus,
        track_form,
        track_melody,
        track_harmony,
        section_forms,
        section_melodies,
        section_harmonies,
        melodic,
        harmonic,
        notes,
    })
}

impl Summary<'_> {
    /// Index of the designated chorus in the sections table.
    pub fn chorus(&self) -> usize {
        self.chorus
    }

    pub fn to_tables(&self) -> TableSet {
        [
            Table::render("tracks_form", std::iter::once(&self.track_form)),
            Table::render("tracks_melody", std::iter::once(&self.track_melody)),
            Table::render("tracks_harmony", std::iter::once(&self.track_harmony)),
            Table::render("sections_form", &self.section_forms),
            Table::render("sections_melody", &self.section_melodies),
            Table::render("sections_harmony", &self.section_harmonies),
            Table::render("melodic_phrases_details", &self.melodic),
            Table::render("harmonic_phrases_details", &self.harmonic),
            Table::render("notes_details", &self.notes),
        ]
        .into_iter()
        .collect()
    }
}
