use onboard_tools::export::{refresh_etags, update_etags};
use onboard_tools::io::yaml::{parse_document, read_document, write_document};
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
R1:
  type: HVAC/VAV
  etag: 11
V1:
  type: HVAC/ZONE
  etag: "22"
R3:
  type: HVAC/VAV
"#,
    )
}

fn existing_fixture() -> Document {
    document(
        r#"
CONFIG_METADATA:
  operation: UPDATE
B1:
  type: FACILITIES/BUILDING
R1:
  type: HVAC/VAV
  etag: "1"
  translation:
    run_status: MISSING
V1:
  code: US-MTV-1:V1
  operation: update
  etag: "2"
  links:
    R1:
      run_status: run_status
V2:
  operation: add
  links:
    R1:
      run_status: run_status
R3:
  code: US-MTV-1:R3
  translation:
    run_status: MISSING
"#,
    )
}

#[test]
fn etags_are_replaced_for_updates_and_translations() {
    let (refreshed, status) = refresh_etags(&building_fixture(), &existing_fixture());

    assert_eq!(
        refreshed.ids().collect::<Vec<_>>(),
        vec!["CONFIG_METADATA", "B1", "R1", "V1", "V2", "R3"]
    );
    let r1 = refreshed.get("R1").expect("R1 kept");
    assert_eq!(r1.get("etag"), Some(&Value::from("11")));
    let fields: Vec<&str> = r1.iter().filter_map(|(key, _)| key.as_str()).collect();
    assert_eq!(fields, vec!["type", "etag", "translation"]);

    assert_eq!(
        refreshed.get("V1").and_then(|entity| entity.get("etag")),
        Some(&Value::from("22"))
    );
    assert!(refreshed.get("V2").expect("V2 kept").get("etag").is_none());
    assert_eq!(status.errors, vec!["No etag for: R3, US-MTV-1:R3".to_string()]);
    assert_eq!(refreshed.get("R3"), existing_fixture().get("R3"));
}

#[test]
fn refreshed_document_is_written_next_to_output() {
    let temp_dir = tempdir().expect("temporary directory");
    let output = temp_dir.path().join("onboard.yaml");

    let status =
        update_etags(&building_fixture(), &existing_fixture(), &output).expect("etags updated");

    let written_path = temp_dir.path().join("onboard_upd.yaml");
    assert_eq!(
        status.saved_files,
        vec![format!("Saved file: {}", written_path.display())]
    );
    let written = read_document(&written_path).expect("refreshed read");
    assert_eq!(written.len(), existing_fixture().len());
}

#[test]
fn refreshing_twice_is_idempotent() {
    let temp_dir = tempdir().expect("temporary directory");
    let existing_path = temp_dir.path().join("onboard.yaml");
    write_document(&existing_path, &existing_fixture()).expect("existing written");
    let building = building_fixture();

    update_etags(
        &building,
        &read_document(&existing_path).expect("existing read"),
        &existing_path,
    )
    .expect("first refresh");
    let first_path = temp_dir.path().join("onboard_upd.yaml");
    let first = read_document(&first_path).expect("first read");

    update_etags(&building, &first, &first_path).expect("second refresh");
    let second = read_document(&temp_dir.path().join("onboard_upd_upd.yaml")).expect("second read");

    assert_eq!(first, second);
}
