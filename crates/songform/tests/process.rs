use std::path::PathBuf;

use pretty_assertions::assert_eq;
use songform::{
    process, process_and_validate, segment, summarize, validation_message, Error, Mode, Outcome,
    Schema, TableSet, Timeline, BASIC_TABLES, EXTENDED_TABLES, SUCCESS,
};

fn fixture(name: &str) -> Timeline {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("reading {}: {err}", path.display()));
    Timeline::from_json(&text).unwrap()
}

fn column<'t>(tables: &'t TableSet, table: &str, column: &str) -> &'t [songform::Value] {
    tables
        .get(table)
        .and_then(|t| t.column(column))
        .unwrap_or_else(|| panic!("missing {table}.{column}"))
}

fn floats(tables: &TableSet, table: &str, name: &str) -> Vec<f64> {
    column(tables, table, name)
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect()
}

fn ints(tables: &TableSet, table: &str, name: &str) -> Vec<i64> {
    column(tables, table, name)
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect()
}

fn strings(tables: &TableSet, table: &str, name: &str) -> Vec<Option<String>> {
    column(tables, table, name)
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[test]
fn two_sections_with_one_phrase_and_one_chord() {
    let tables = process(&fixture("two_sections.json"), Mode::Basic).unwrap();

    assert_eq!(tables.names(), BASIC_TABLES.to_vec());
    assert_eq!(floats(&tables, "sections", "sec_start_offset"), vec![0.0, 16.0]);
    assert_eq!(floats(&tables, "chords", "chord_dur"), vec![8.0, 24.0]);
    assert_eq!(
        strings(&tables, "chords", "chord_name"),
        vec![Some("N.C.".to_string()), Some("C".to_string())]
    );

    let phrase = Some("tebasng-mp1-2.0".to_string());
    assert_eq!(
        strings(&tables, "notes", "mp_id"),
        vec![None, phrase.clone(), phrase, None, None, None]
    );
    assert_eq!(floats(&tables, "melodic_phrases", "mp_end_offset"), vec![6.0]);
}

#[test]
fn rests_before_a_section_close_the_previous_one() {
    let tables = process(&fixture("two_sections.json"), Mode::Basic).unwrap();

    assert_eq!(floats(&tables, "notes", "duration"), vec![2.0, 2.0, 2.0, 10.0, 8.0, 8.0]);
    assert_eq!(ints(&tables, "notes", "sec_start_note"), vec![1, 0, 0, 0, 1, 0]);
    assert_eq!(ints(&tables, "notes", "sec_end_note"), vec![0, 0, 0, 1, 0, 1]);
}

#[test]
fn intervals_are_classified_by_size() {
    let tables = process(&fixture("verse_chorus.json"), Mode::Basic).unwrap();
    let types: Vec<String> = strings(&tables, "notes", "prev_note_distance_type")
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(
        types,
        vec![
            "-1", "step", "step", "skip", "-1", "step", "step", "step", "skip", "step", "skip",
            "skip", "leap", "-1", "step", "leap",
        ]
    );
    assert_eq!(&ints(&tables, "notes", "prev_note_distance")[..4], &[-100, 2, 2, 3]);
}

#[test]
fn chord_durations_sum_to_the_track() {
    let tables = process(&fixture("verse_chorus.json"), Mode::Basic).unwrap();
    let durations = floats(&tables, "chords", "chord_dur");
    assert_eq!(durations.len(), 8);
    assert_eq!(durations.iter().sum::<f64>(), 32.0);
    assert_eq!(
        strings(&tables, "chords", "hp_id")
            .into_iter()
            .flatten()
            .collect::<std::collections::BTreeSet<_>>()
            .len(),
        4
    );
}

#[test]
fn basic_and_comprehensive_output_validates() {
    for name in ["two_sections.json", "verse_chorus.json"] {
        let timeline = fixture(name);
        for mode in [Mode::Basic, Mode::Comprehensive] {
            let tables = process(&timeline, mode).unwrap();
            assert_eq!(
                validation_message(&tables, Schema::standard()),
                SUCCESS,
                "{name} in {mode:?}"
            );
        }
    }
}

#[test]
fn comprehensive_adds_the_summary_tables() {
    let tables = process(&fixture("verse_chorus.json"), Mode::Comprehensive).unwrap();
    let expected: Vec<&str> = BASIC_TABLES.iter().chain(EXTENDED_TABLES.iter()).copied().collect();
    assert_eq!(tables.names(), expected);

    let rows = |name: &str| tables.get(name).map(|t| t.n_rows());
    assert_eq!(rows("tracks_form"), Some(1));
    assert_eq!(rows("sections_melody"), Some(2));
    assert_eq!(rows("melodic_phrases_details"), Some(4));
    assert_eq!(rows("harmonic_phrases_details"), Some(4));
    assert_eq!(rows("notes_details"), rows("notes"));
}

#[test]
fn summary_statistics_for_verse_and_chorus() {
    let timeline = fixture("verse_chorus.json");
    let base = segment(&timeline.normalize().unwrap());
    let summary = summarize(&base).unwrap();
    assert_eq!(summary.chorus(), 1);

    let tables = summary.to_tables();
    assert_eq!(ints(&tables, "tracks_melody", "track_highest_note_midi"), vec![74]);
    assert_eq!(ints(&tables, "tracks_melody", "track_lowest_note_midi"), vec![64]);
    assert_eq!(
        strings(&tables, "tracks_melody", "track_most_common_pitch"),
        vec![Some("67".to_string())]
    );
    assert_eq!(ints(&tables, "sections_form", "sec_n_mps"), vec![2, 2]);
    assert_eq!(floats(&tables, "sections_form", "sec_to_chorus_dur"), vec![1.0, 1.0]);
    assert_eq!(
        strings(&tables, "harmonic_phrases_details", "chord_names"),
        vec![
            Some("G, C".to_string()),
            Some("G/B, D7".to_string()),
            Some("G, Em".to_string()),
            Some("C, D".to_string()),
        ]
    );
    assert_eq!(ints(&tables, "notes_details", "is_track_highest_note").iter().sum::<i64>(), 2);
}

#[test]
fn a_section_without_notes_or_chords_gets_sentinel_rows() {
    let tables = process(&fixture("intro_rest_chorus.json"), Mode::Comprehensive).unwrap();
    assert_eq!(validation_message(&tables, Schema::standard()), SUCCESS);
    let chorus_is_null = |table: &str, name: &str| column(&tables, table, name)[1].is_null();

    assert_eq!(ints(&tables, "sections_form", "sec_n_notes"), vec![2, 0]);
    assert_eq!(ints(&tables, "sections_form", "sec_n_chords"), vec![1, 0]);
    assert_eq!(ints(&tables, "sections_form", "sec_n_mps"), vec![1, 0]);
    assert_eq!(ints(&tables, "sections_form", "sec_n_hps"), vec![1, 0]);
    for id in ["sec_start_note_id", "sec_start_chord_id", "sec_start_mp_id"] {
        assert_eq!(strings(&tables, "sections_form", id)[1], Some("-1".to_string()), "{id}");
    }
    assert_eq!(floats(&tables, "sections_form", "sec_rest_dur"), vec![0.0, 8.0]);
    assert!(chorus_is_null("sections_form", "rest_dur_before_sec_first_note"));
    assert_eq!(
        column(&tables, "sections_form", "rest_dur_after_sec_last_note")[0].as_f64(),
        Some(8.0)
    );

    assert!(chorus_is_null("sections_melody", "sec_highest_note_midi"));
    assert_eq!(
        strings(&tables, "sections_melody", "sec_first_highest_note_id")[1],
        Some("-1".to_string())
    );
    assert_eq!(ints(&tables, "sections_melody", "sec_has_track_highest_note"), vec![1, 0]);

    assert_eq!(ints(&tables, "sections_harmony", "sec_n_chords"), vec![1, 0]);
    assert!(chorus_is_null("sections_harmony", "sec_avg_chord_dur"));
    assert_eq!(
        ints(&tables, "sections_harmony", "sec_to_chorus_first_chord_root_dist"),
        vec![-100, -100]
    );
}

#[test]
fn rows_naming_an_unknown_section_fail_the_summary() {
    let base = segment(&fixture("two_sections.json").normalize().unwrap());
    assert!(summarize(&base).is_ok());

    let mut phrase_moved = base.clone();
    phrase_moved.melodic_phrases[0].section_id = "tebasng-sec-Bridge-8.0".into();
    assert!(matches!(
        summarize(&phrase_moved),
        Err(Error::UnknownSection(id)) if id == "tebasng-sec-Bridge-8.0"
    ));

    let mut note_moved = base.clone();
    let last = note_moved.notes.len() - 1;
    note_moved.notes[last].section_id = "elsewhere".into();
    assert!(matches!(summarize(&note_moved), Err(Error::UnknownSection(_))));
}

#[test]
fn missing_chorus_fails_only_the_summary() {
    let timeline = fixture("intro_only.json");
    assert!(process(&timeline, Mode::Basic).is_ok());
    assert!(matches!(
        process(&timeline, Mode::Comprehensive),
        Err(Error::ChorusNotFound)
    ));

    let outcome = process_and_validate(&timeline, Mode::Comprehensive);
    assert!(!outcome.is_success());
    let json = serde_json::to_value(&outcome).unwrap();
    assert!(json.get("error message").is_some());
}

#[test]
fn reprocessing_is_deterministic() {
    let timeline = fixture("verse_chorus.json");
    let first = process(&timeline, Mode::Comprehensive).unwrap();
    let second = process(&timeline, Mode::Comprehensive).unwrap();
    assert_eq!(first, second);
}

#[test]
fn reread_tables_still_validate() {
    let tables = process(&fixture("two_sections.json"), Mode::Comprehensive).unwrap();
    let reread = TableSet::from_json(&tables.to_json().unwrap()).unwrap();
    assert_eq!(reread.names(), tables.names());
    assert_eq!(validation_message(&reread, Schema::standard()), SUCCESS);

    match process_and_validate(&fixture("two_sections.json"), Mode::Basic) {
        Outcome::Tables(basic) => assert_eq!(basic.len(), BASIC_TABLES.len()),
        Outcome::Failed { message } => panic!("unexpected failure: {message}"),
    }
}
