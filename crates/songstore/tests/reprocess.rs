use std::path::PathBuf;

use pretty_assertions::assert_eq;
use songform::{process, Mode, Schema, Timeline};
use songstore::TableStore;

fn fixture(name: &str) -> Timeline {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../songform/tests/fixtures")
        .join(name);
    Timeline::from_json(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn basic_then_comprehensive_run_replaces_the_track() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("songform.db");
    let timeline = fixture("verse_chorus.json");

    {
        let store = TableStore::open(&db).unwrap();
        store
            .put(&process(&timeline, Mode::Basic).unwrap(), Schema::standard())
            .unwrap();
        assert_eq!(store.row_count("notes").unwrap(), 16);
        assert_eq!(store.row_count("notes_details").unwrap(), 0);
    }

    let store = TableStore::open(&db).unwrap();
    store
        .put(&process(&timeline, Mode::Comprehensive).unwrap(), Schema::standard())
        .unwrap();
    assert_eq!(store.row_count("notes").unwrap(), 16);
    assert_eq!(store.row_count("notes_details").unwrap(), 16);
    assert_eq!(store.row_count("sections").unwrap(), 2);

    let runs = store.runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].comprehensive);
    assert!(runs[0].track_id.ends_with("-track"));
}

fn titled(title: &str) -> Timeline {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../songform/tests/fixtures/two_sections.json");
    let mut doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    doc["title"] = title.into();
    serde_json::from_value(doc).unwrap()
}

#[test]
fn tracks_whose_ids_share_a_stem_keep_their_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = TableStore::open(&dir.path().join("songform.db")).unwrap();

    let live = process(&titled("Song - Live"), Mode::Basic).unwrap();
    let studio = process(&titled("Song"), Mode::Basic).unwrap();
    store.put(&live, Schema::standard()).unwrap();
    store.put(&studio, Schema::standard()).unwrap();

    assert_eq!(store.row_count("tracks").unwrap(), 2);
    assert_eq!(store.row_count("notes").unwrap(), 12);
    assert_eq!(store.runs().unwrap().len(), 2);

    store.put(&studio, Schema::standard()).unwrap();
    assert_eq!(store.row_count("tracks").unwrap(), 2);
    assert_eq!(store.row_count("notes").unwrap(), 12);
}

#[test]
fn basic_rerun_drops_the_old_summary_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = TableStore::open(&dir.path().join("songform.db")).unwrap();
    let timeline = fixture("verse_chorus.json");

    store
        .put(&process(&timeline, Mode::Comprehensive).unwrap(), Schema::standard())
        .unwrap();
    assert_eq!(store.row_count("notes_details").unwrap(), 16);

    store
        .put(&process(&timeline, Mode::Basic).unwrap(), Schema::standard())
        .unwrap();
    assert_eq!(store.row_count("notes_details").unwrap(), 0);
    assert_eq!(store.row_count("notes").unwrap(), 16);
    assert!(!store.runs().unwrap()[0].comprehensive);
}
