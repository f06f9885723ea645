use std::collections::BTreeSet;
use std::fs;
use std::num::NonZeroUsize;

use onboard_tools::ToolError;
use onboard_tools::export::{UpdateExportOptions, export_update_config, update::plan_update_chunks};
use onboard_tools::io::yaml::{parse_document, read_document};
use onboard_tools::model::Document;
use serde_yaml::Value;
use tempfile::tempdir;

fn document(source: &str) -> Document {
    parse_document(source).expect("fixture parsed")
}

fn building_fixture() -> Document {
    document(
        r#"
B1:
  type: FACILITIES/BUILDING
  code: US-MTV-1
E1:
  type: HVAC/VAV
  etag: "5"
"#,
    )
}

fn options(max_items: usize) -> UpdateExportOptions {
    UpdateExportOptions {
        max_items: NonZeroUsize::new(max_items).expect("non-zero"),
        ..UpdateExportOptions::default()
    }
}

#[test]
fn single_entity_is_written_with_etag_and_forced_mask() {
    let building = building_fixture();
    let changes = document(
        r#"
E1:
  translation:
    f:
      present_value: v
"#,
    );
    let temp_dir = tempdir().expect("temporary directory");
    let output = temp_dir.path().join("site.yaml");

    let status =
        export_update_config(&building, &changes, &options(50), &output).expect("export succeeds");

    let chunk_path = temp_dir.path().join("site_pt1.yaml");
    assert_eq!(status.errors, Vec::<String>::new());
    assert_eq!(status.added_entities, vec!["E1".to_string()]);
    assert_eq!(
        status.saved_files,
        vec![format!("1 entities saved in {}.", chunk_path.display())]
    );

    let written = read_document(&chunk_path).expect("chunk read");
    assert_eq!(
        written.ids().collect::<Vec<_>>(),
        vec!["CONFIG_METADATA", "B1", "E1"]
    );
    let metadata = written.get("CONFIG_METADATA").expect("metadata");
    assert_eq!(metadata.get("operation"), Some(&Value::from("UPDATE")));

    let entity = written.get("E1").expect("E1 written");
    let fields: Vec<&str> = entity.iter().filter_map(|(key, _)| key.as_str()).collect();
    assert_eq!(fields, vec!["etag", "translation", "operation", "update_mask"]);
    assert_eq!(entity.get("etag"), Some(&Value::from("5")));
    assert_eq!(entity.get("operation"), Some(&Value::from("UPDATE")));
    let mask: Value = serde_yaml::from_str("[type, translation]").expect("mask literal");
    assert_eq!(entity.get("update_mask"), Some(&mask));
}

#[test]
fn entities_missing_from_building_are_reported_and_skipped() {
    let building = building_fixture();
    let changes = document(
        r#"
E1:
  translation:
    f: MISSING
E2:
  translation:
    g: MISSING
"#,
    );

    let (chunks, status) = plan_update_chunks(&building, &changes, &options(50)).expect("planned");

    assert_eq!(status.errors, vec!["Not in building config: E2".to_string()]);
    assert_eq!(status.added_entities, vec!["E1".to_string()]);
    assert_eq!(chunks.len(), 1);
    assert!(!chunks[0].document.contains("E2"));
}

#[test]
fn chunk_count_is_ceiling_of_qualifying_entities() {
    let mut building_source = String::from("B1:\n  type: FACILITIES/BUILDING\n");
    let mut changes_source = String::new();
    for index in 0..7 {
        building_source.push_str(&format!("E{index}:\n  type: X\n  etag: {index}\n"));
        changes_source.push_str(&format!("E{index}:\n  translation:\n    f: MISSING\n"));
        // Entries without a translation never count towards a chunk.
        changes_source.push_str(&format!("N{index}:\n  code: none\n"));
    }
    changes_source.push_str("GHOST:\n  translation:\n    f: MISSING\n");
    let building = document(&building_source);
    let changes = document(&changes_source);

    let temp_dir = tempdir().expect("temporary directory");
    let output = temp_dir.path().join("bulk.yaml");
    let status =
        export_update_config(&building, &changes, &options(3), &output).expect("export succeeds");

    assert_eq!(status.saved_files.len(), 3);
    assert_eq!(status.errors, vec!["Not in building config: GHOST".to_string()]);

    let mut seen = Vec::new();
    let mut sizes = Vec::new();
    for part in 1..=3 {
        let path = temp_dir.path().join(format!("bulk_pt{part}.yaml"));
        let written = read_document(&path).expect("chunk read");
        let ids: Vec<String> = written
            .ids()
            .filter(|id| id.starts_with('E'))
            .map(str::to_string)
            .collect();
        sizes.push(ids.len());
        seen.extend(ids);
    }
    assert!(!temp_dir.path().join("bulk_pt4.yaml").exists());
    assert_eq!(sizes, vec![3, 3, 1]);

    let unique: BTreeSet<&String> = seen.iter().collect();
    assert_eq!(seen.len(), 7);
    assert_eq!(unique.len(), 7);
}

#[test]
fn evenly_divided_entities_leave_no_trailing_chunk() {
    let mut building_source = String::from("B1:\n  type: FACILITIES/BUILDING\n");
    let mut changes_source = String::new();
    for index in 0..6 {
        building_source.push_str(&format!("E{index}:\n  type: X\n  etag: {index}\n"));
        changes_source.push_str(&format!("E{index}:\n  translation:\n    f: MISSING\n"));
    }
    for index in 0..2 {
        changes_source.push_str(&format!("N{index}:\n  code: none\n"));
    }
    let building = document(&building_source);
    let changes = document(&changes_source);

    let temp_dir = tempdir().expect("temporary directory");
    let output = temp_dir.path().join("even.yaml");
    let status =
        export_update_config(&building, &changes, &options(3), &output).expect("export succeeds");

    assert_eq!(status.saved_files.len(), 2);
    assert_eq!(status.added_entities.len(), 6);
    for part in 1..=2 {
        let path = temp_dir.path().join(format!("even_pt{part}.yaml"));
        let written = read_document(&path).expect("chunk read");
        assert_eq!(written.ids().filter(|id| id.starts_with('E')).count(), 3);
    }
    assert!(!temp_dir.path().join("even_pt3.yaml").exists());
}

#[test]
fn no_qualifying_entities_writes_no_files() {
    let building = building_fixture();
    let changes = document("E1:\n  code: US-MTV-1:E1\n");
    let temp_dir = tempdir().expect("temporary directory");
    let output = temp_dir.path().join("empty.yaml");

    let status =
        export_update_config(&building, &changes, &options(50), &output).expect("export succeeds");

    assert!(status.saved_files.is_empty());
    assert_eq!(fs::read_dir(temp_dir.path()).expect("dir listed").count(), 0);
}

#[test]
fn numeric_and_missing_etags_are_stringified() {
    let building = document(
        r#"
B1:
  type: FACILITIES/BUILDING
E1:
  type: X
  etag: 12345
E2:
  type: X
"#,
    );
    let changes = document(
        r#"
E1:
  translation:
    f: MISSING
E2:
  translation:
    f: MISSING
"#,
    );

    let (chunks, _) = plan_update_chunks(&building, &changes, &options(50)).expect("planned");
    let bundle = &chunks[0].document;

    assert_eq!(
        bundle.get("E1").and_then(|entity| entity.get("etag")),
        Some(&Value::from("12345"))
    );
    assert_eq!(
        bundle.get("E2").and_then(|entity| entity.get("etag")),
        Some(&Value::from("MISSING ETAG"))
    );
}

#[test]
fn change_flags_are_kept_when_requested() {
    let building = building_fixture();
    let changes = document(
        r#"
E1:
  operation: ADD
  update_mask: [translation]
  translation:
    f: MISSING
"#,
    );
    let options = UpdateExportOptions {
        use_change_flags: true,
        ..options(50)
    };

    let (chunks, _) = plan_update_chunks(&building, &changes, &options).expect("planned");
    let entity = chunks[0].document.get("E1").expect("E1 planned");

    assert_eq!(entity.get("operation"), Some(&Value::from("ADD")));
    let mask: Value = serde_yaml::from_str("[translation]").expect("mask literal");
    assert_eq!(entity.get("update_mask"), Some(&mask));
}

#[test]
fn subset_restricts_exported_entities() {
    let building = document(
        r#"
B1:
  type: FACILITIES/BUILDING
E1:
  etag: "1"
E2:
  etag: "2"
"#,
    );
    let changes = document(
        r#"
E1:
  translation:
    f: MISSING
E2:
  translation:
    f: MISSING
E3:
  translation:
    f: MISSING
"#,
    );
    let options = UpdateExportOptions {
        subset: Some(["E2".to_string()].into_iter().collect()),
        ..options(50)
    };

    let (chunks, status) = plan_update_chunks(&building, &changes, &options).expect("planned");

    assert_eq!(status.added_entities, vec!["E2".to_string()]);
    assert!(status.errors.is_empty());
    assert_eq!(
        chunks[0].document.ids().collect::<Vec<_>>(),
        vec!["CONFIG_METADATA", "B1", "E2"]
    );
}

#[test]
fn missing_building_root_is_fatal() {
    let building = document("E1:\n  type: X\n");
    let changes = document("E1:\n  translation:\n    f: MISSING\n");

    let result = plan_update_chunks(&building, &changes, &options(50));

    assert!(matches!(result, Err(ToolError::MissingBuildingRoot)));
}

#[test]
fn output_path_must_end_in_yaml() {
    let building = building_fixture();
    let changes = document("E1:\n  translation:\n    f: MISSING\n");
    let temp_dir = tempdir().expect("temporary directory");
    let output = temp_dir.path().join("site.yml");

    let result = export_update_config(&building, &changes, &options(50), &output);

    assert!(matches!(result, Err(ToolError::InvalidOutputPath(_))));
}

#[test]
fn entities_are_written_one_block_at_a_time() {
    let building = building_fixture();
    let changes = document("E1:\n  translation:\n    f: MISSING\n");
    let temp_dir = tempdir().expect("temporary directory");
    let output = temp_dir.path().join("site.yaml");

    export_update_config(&building, &changes, &options(50), &output).expect("export succeeds");

    let text = fs::read_to_string(temp_dir.path().join("site_pt1.yaml")).expect("chunk text");
    assert!(text.starts_with("CONFIG_METADATA:\n  operation: UPDATE\n\nB1:\n"));
    assert!(text.ends_with("\n\n"));
    assert_eq!(text.matches("\n\n").count(), 3);
}
