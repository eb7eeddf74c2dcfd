//! `tracks_harmony` / `sections_harmony`.

use super::group::{chord_distance, ChordProfile, Group, Spread};
use super::Scope;
use crate::rows::ChordRow;
use crate::table::{Record, RowWriter};

#[derive(Debug, Clone)]
pub(crate) struct HarmonyRow<'a> {
    pub scope: Scope,
    pub id: String,
    pub profile: ChordProfile<'a>,
    pub hp: Spread,
    /// First chord row of the group, no-chords included.
    pub first_chord: Option<&'a ChordRow>,
    pub to_chorus_first_chord: Option<(i64, i64)>,
}

impl<'a> HarmonyRow<'a> {
    pub fn new(group: &Group<'a>, scope: Scope) -> Self {
        Self {
            scope,
            id: group.id.to_string(),
            profile: group.harmony(),
            hp: Spread::of(&group.hp_durations()),
            first_chord: group.chords.first().copied(),
            to_chorus_first_chord: None,
        }
    }

    pub fn compare(&mut self, chorus_first_chord: Option<&ChordRow>) {
        if self.scope == Scope::Section {
            self.to_chorus_first_chord = Some(chord_distance(self.first_chord, chorus_first_chord));
        }
    }
}

impl Record for HarmonyRow<'_> {
    fn write(&self, row: &mut RowWriter<'_>) {
        let f = self.scope.field();
        let p = &self.profile;
        let small = p.chords.iter().filter(|c| c.n_pitches() <= 3).count();
        row.put(&format!("{f}_id"), &self.id)
            .put(&format!("{f}_avg_hp_dur"), self.hp.avg)
            .put(&format!("{f}_med_hp_dur"), self.hp.med)
            .put(&format!("{f}_pct_3_note_chords_or_fewer"), p.share(small))
            .put(&format!("{f}_pct_4_note_chords_or_more"), p.share(p.n() - small));
        p.write_durations(row, f);
        p.write_counts(row, f);
        p.write_qualities(row, f);

        if let Some((root, bass)) = self.to_chorus_first_chord {
            row.put("sec_to_chorus_first_chord_root_dist", root)
                .put("sec_to_chorus_first_chord_bass_dist", bass);
        }
    }
}
