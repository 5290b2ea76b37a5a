use std::collections::HashSet;
use std::io::Write;

use marketpipe_core::{
    AssetClass, CoreError, ErrorKind, InstrumentCatalog, SourceKind, ValidationError,
    FOREIGN_FLOW_PATH,
};

#[test]
fn builtin_catalog_entries_are_complete_and_unique() {
    let catalog = InstrumentCatalog::builtin();
    assert_eq!(catalog.len(), 12);

    let mut keys = HashSet::new();
    for instrument in catalog.all() {
        assert!(
            keys.insert(instrument.logical_key.clone()),
            "duplicate key {}",
            instrument.logical_key
        );
        assert!(!instrument.display_name.trim().is_empty());
        assert!(!instrument.source_key.trim().is_empty());

        match instrument.source {
            SourceKind::Scrape => {
                assert!(
                    !instrument.external_id.trim().is_empty(),
                    "{} needs a pair id",
                    instrument.logical_key
                );
                assert_ne!(instrument.asset_class, AssetClass::Flow);
            }
            SourceKind::Rest => {
                assert!(instrument.source_key.starts_with('/'));
                assert_eq!(instrument.asset_class, AssetClass::Flow);
            }
        }
    }
    assert_eq!(keys.len(), catalog.len());
}

#[test]
fn builtin_catalog_covers_overview_and_flow_widgets() {
    let catalog = InstrumentCatalog::builtin();

    let usd_vnd = catalog.resolve("currencies/usd-vnd").expect("usd-vnd present");
    assert_eq!(usd_vnd.source, SourceKind::Scrape);
    assert_eq!(usd_vnd.asset_class, AssetClass::Currency);

    let flow = catalog.resolve("flows/foreign-trade").expect("flow present");
    assert_eq!(flow.source, SourceKind::Rest);
    assert_eq!(flow.source_key, FOREIGN_FLOW_PATH);

    for class in [AssetClass::Currency, AssetClass::Index, AssetClass::Commodity] {
        assert!(
            catalog.all().any(|instrument| instrument.asset_class == class),
            "no {class} instrument"
        );
    }
}

#[test]
fn resolve_is_whitespace_tolerant_and_rejects_unknown_keys() {
    let catalog = InstrumentCatalog::builtin();

    assert!(catalog.resolve("  indices/vn ").is_ok());

    let error = catalog
        .resolve("currencies/not-a-pair")
        .expect_err("unknown key");
    assert_eq!(error.kind(), ErrorKind::UnknownInstrument);
    assert!(!error.retryable());
}

#[test]
fn catalog_loads_from_json_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        r#"[
            {{"logical_key": "indices/vn", "source_key": "indices/vn", "external_id": "41064",
              "display_name": "VN-Index", "source": "scrape", "asset_class": "index"}},
            {{"logical_key": "flows/hnx", "source_key": "/api/v1/market/foreign-trade?exchange=HNX",
              "external_id": "", "display_name": "HNX foreign flow", "source": "rest", "asset_class": "flow"}}
        ]"#
    )
    .expect("write catalog");

    let catalog = InstrumentCatalog::from_json_file(file.path()).expect("valid catalog file");

    assert_eq!(catalog.len(), 2);
    let keys = catalog
        .all()
        .map(|instrument| instrument.logical_key.as_str())
        .collect::<Vec<_>>();
    assert_eq!(keys, ["indices/vn", "flows/hnx"]);
}

#[test]
fn catalog_file_with_duplicate_keys_is_rejected() {
    let input = r#"[
        {"logical_key": "indices/vn", "source_key": "indices/vn", "external_id": "41064",
         "display_name": "VN-Index", "source": "scrape", "asset_class": "index"},
        {"logical_key": "indices/vn", "source_key": "indices/vn", "external_id": "41064",
         "display_name": "VN-Index again", "source": "scrape", "asset_class": "index"}
    ]"#;

    let error = InstrumentCatalog::from_json_str(input).expect_err("duplicate must fail");

    assert!(matches!(
        error,
        CoreError::Validation(ValidationError::DuplicateInstrument { ref key }) if key == "indices/vn"
    ));
}

#[test]
fn catalog_file_keys_with_surrounding_whitespace_are_resolvable() {
    // Given: A hand-edited catalog whose key carries stray spaces
    let input = r#"[
        {"logical_key": " indices/vn ", "source_key": "indices/vn", "external_id": "41064",
         "display_name": "VN-Index", "source": "scrape", "asset_class": "index"}
    ]"#;

    // When: It is loaded
    let catalog = InstrumentCatalog::from_json_str(input).expect("valid catalog");

    // Then: The stored key is trimmed and resolves however it is spelled
    let instrument = catalog.resolve(" indices/vn").expect("padded lookup");
    assert_eq!(instrument.logical_key, "indices/vn");
    assert!(catalog.resolve("indices/vn").is_ok());
}

#[test]
fn catalog_file_keys_differing_only_in_whitespace_are_duplicates() {
    let input = r#"[
        {"logical_key": "indices/vn", "source_key": "indices/vn", "external_id": "41064",
         "display_name": "VN-Index", "source": "scrape", "asset_class": "index"},
        {"logical_key": "indices/vn  ", "source_key": "indices/vn", "external_id": "41064",
         "display_name": "VN-Index again", "source": "scrape", "asset_class": "index"}
    ]"#;

    let error = InstrumentCatalog::from_json_str(input).expect_err("duplicate must fail");

    assert!(matches!(
        error,
        CoreError::Validation(ValidationError::DuplicateInstrument { ref key }) if key == "indices/vn"
    ));
}

#[test]
fn catalog_file_missing_external_id_for_scrape_entry_is_rejected() {
    let input = r#"[
        {"logical_key": "indices/vn", "source_key": "indices/vn", "external_id": "",
         "display_name": "VN-Index", "source": "scrape", "asset_class": "index"}
    ]"#;

    let error = InstrumentCatalog::from_json_str(input).expect_err("missing id must fail");

    assert!(matches!(
        error,
        CoreError::Validation(ValidationError::EmptyField {
            field: "external_id"
        })
    ));
}

#[test]
fn missing_catalog_file_is_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");

    let error = InstrumentCatalog::from_json_file(dir.path().join("absent.json"))
        .expect_err("missing file");

    assert!(matches!(error, CoreError::Io(_)));
}
