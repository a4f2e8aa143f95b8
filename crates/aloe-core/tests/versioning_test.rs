//! Version registry tests
//!
//! Retention, restore, cleanup, and integrity behaviour of `VersioningSystem`.

use aloe_core::hash::fingerprint;
use aloe_core::{VersioningConfig, VersioningError, VersioningSystem};
use serde_json::{json, Value};

fn system_with_cap(max_versions: usize) -> VersioningSystem {
    let config = VersioningConfig {
        max_versions,
        ..VersioningConfig::default()
    };
    VersioningSystem::in_memory(config).expect("Failed to create versioning system")
}

fn seed_domain(system: &VersioningSystem) {
    system.with_store(|store| {
        assert!(store.set(
            "users",
            &json!([{"id": "u1", "username": "admin", "role": "admin"}])
        ));
        assert!(store.set(
            "insurance_types",
            &json!([{"id": "it1", "name": "Auto", "commission": 12.5}])
        ));
        assert!(store.set(
            "sales",
            &json!([{"id": "s1", "clientName": "Dupont", "insuranceTypeId": "it1", "amount": 420}])
        ));
        assert!(store.set(
            "objectives",
            &json!([{"id": "o1", "month": "2024-03", "target": 20}])
        ));
        assert!(store.set("settings", &json!({"currency": "EUR"})));
        assert!(store.set("passwords", &json!({"admin": "correct horse"})));
    });
}

fn stored_versions(system: &VersioningSystem) -> Vec<Value> {
    system.with_store(|store| store.get("versions").expect("versions key should exist"))
}

// =============================================================================
// Retention
// =============================================================================

#[test]
fn test_oldest_version_is_evicted_first() {
    let system = system_with_cap(2);

    system.create_version("v1", vec![], None).expect("v1");
    system.create_version("v2", vec![], None).expect("v2");
    system.create_version("v3", vec![], None).expect("v3");

    let versions = system.versions().expect("Failed to list versions");
    let descriptions: Vec<&str> = versions.iter().map(|v| v.description.as_str()).collect();
    assert_eq!(descriptions, vec!["v2", "v3"]);
    assert_eq!(system.metadata().unwrap().total_versions, 2);
}

#[test]
fn test_registry_never_exceeds_cap() {
    let system = system_with_cap(5);

    for i in 0..12 {
        system
            .create_version(&format!("change {i}"), vec![format!("line {i}")], Some("admin"))
            .expect("Failed to create version");
        let versions = system.versions().unwrap();
        assert!(versions.len() <= 5);
        assert_eq!(versions.last().unwrap().description, format!("change {i}"));
    }

    let versions = system.versions().unwrap();
    let descriptions: Vec<String> = versions.iter().map(|v| v.description.clone()).collect();
    assert_eq!(
        descriptions,
        (7..12).map(|i| format!("change {i}")).collect::<Vec<_>>()
    );
}

#[test]
fn test_labels_follow_registry_length() {
    let system = system_with_cap(50);
    let labels: Vec<String> = (0..12)
        .map(|i| system.create_version(&format!("{i}"), vec![], None).unwrap().version)
        .collect();

    assert_eq!(labels[0], "1.0.0");
    assert_eq!(labels[9], "1.0.9");
    assert_eq!(labels[10], "1.1.0");
    assert_eq!(labels[11], "1.1.1");
}

#[test]
fn test_set_max_versions_applies_immediately() {
    let system = system_with_cap(50);
    for i in 0..6 {
        system.create_version(&format!("{i}"), vec![], None).unwrap();
    }

    let evicted = system.set_max_versions(4).expect("Failed to set cap");
    assert_eq!(evicted, 2);
    assert_eq!(system.versions().unwrap().len(), 4);
    assert_eq!(system.metadata().unwrap().max_versions, 4);
}

// =============================================================================
// Cleanup and deletion
// =============================================================================

#[test]
fn test_cleanup_zero_removes_everything() {
    let system = system_with_cap(50);
    for i in 0..3 {
        system.create_version(&format!("{i}"), vec![], None).unwrap();
    }

    assert_eq!(system.cleanup_old_versions(0).unwrap(), 3);
    assert!(system.versions().unwrap().is_empty());
    assert_eq!(system.metadata().unwrap().total_versions, 0);
}

#[test]
fn test_cleanup_with_large_keep_is_noop() {
    let system = system_with_cap(50);
    for i in 0..3 {
        system.create_version(&format!("{i}"), vec![], None).unwrap();
    }

    assert_eq!(system.cleanup_old_versions(3).unwrap(), 0);
    assert_eq!(system.cleanup_old_versions(10).unwrap(), 0);
    assert_eq!(system.versions().unwrap().len(), 3);
}

#[test]
fn test_cleanup_keeps_newest() {
    let system = system_with_cap(50);
    for i in 0..5 {
        system.create_version(&format!("v{i}"), vec![], None).unwrap();
    }

    assert_eq!(system.cleanup_old_versions(2).unwrap(), 3);
    let versions = system.versions().unwrap();
    assert_eq!(versions[0].description, "v3");
    assert_eq!(versions[1].description, "v4");
}

#[test]
fn test_delete_version() {
    let system = system_with_cap(50);
    system.create_version("a", vec![], None).unwrap();
    let b = system.create_version("b", vec![], None).unwrap();

    let removed = system.delete_version(&b.version).expect("Failed to delete");
    assert_eq!(removed.description, "b");
    assert_eq!(system.metadata().unwrap().total_versions, 1);

    assert!(matches!(
        system.delete_version("9.9.9"),
        Err(VersioningError::NotFound { .. })
    ));
}

// =============================================================================
// Restore
// =============================================================================

#[test]
fn test_restore_brings_back_sales_and_adds_one_safety_version() {
    let system = system_with_cap(50);
    seed_domain(&system);

    let initial = system
        .create_version("initial", vec![], Some("admin"))
        .expect("Failed to create version");
    let original_sales: Value = system.with_store(|store| store.get("sales").unwrap());

    system.with_store(|store| {
        store.set("sales", &json!([{"id": "s2", "clientName": "Martin", "amount": 99}]))
    });

    let outcome = system
        .restore_version(&initial.version)
        .expect("Failed to restore");

    let restored_sales: Value = system.with_store(|store| store.get("sales").unwrap());
    assert_eq!(restored_sales, original_sales);

    let versions = system.versions().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(outcome.safety.version, versions[1].version);
    assert!(versions[1].description.contains(&initial.version));
    assert_eq!(
        versions[1].data.sales,
        vec![json!({"id": "s2", "clientName": "Martin", "amount": 99})]
    );
    assert_eq!(system.current_version().as_deref(), Some(initial.version.as_str()));
}

#[test]
fn test_restore_round_trip_matches_captured_snapshot() {
    let system = system_with_cap(50);
    seed_domain(&system);

    let captured = system.capture_snapshot();
    let version = system.create_version("before edits", vec![], None).unwrap();
    assert_eq!(version.data, captured);
    assert_eq!(version.hash, fingerprint(&captured).unwrap());

    system.with_store(|store| {
        store.set("users", &json!([]));
        store.set("objectives", &json!([{"id": "o9"}]));
        store.set("settings", &json!({"currency": "USD", "theme": "dark"}));
    });
    assert_ne!(system.capture_snapshot(), captured);

    system.restore_version(&version.version).unwrap();
    assert_eq!(system.capture_snapshot(), captured);
}

#[test]
fn test_restore_unknown_label_changes_nothing() {
    let system = system_with_cap(50);
    system.create_version("only", vec![], None).unwrap();

    let result = system.restore_version("4.2.0");
    assert!(matches!(result, Err(VersioningError::NotFound { .. })));
    assert_eq!(system.versions().unwrap().len(), 1);
}

#[test]
fn test_restore_never_writes_passwords() {
    let system = system_with_cap(50);
    seed_domain(&system);
    let version = system.create_version("with creds", vec![], None).unwrap();

    system.with_store(|store| store.set("passwords", &json!({"admin": "new secret"})));
    system.restore_version(&version.version).unwrap();

    let passwords: Value = system.with_store(|store| store.get("passwords").unwrap());
    assert_eq!(passwords, json!({"admin": "new secret"}));
}

#[test]
fn test_versions_never_contain_plaintext_passwords() {
    let system = system_with_cap(50);
    seed_domain(&system);
    system.create_version("creds", vec![], None).unwrap();

    let raw: String = system.with_store(|store| store.get_raw("versions").unwrap().unwrap());
    assert!(!raw.contains("correct horse"));
    assert!(system.export_versions().map(|json| !json.contains("correct horse")).unwrap());
}

// =============================================================================
// Integrity
// =============================================================================

#[test]
fn test_corrupted_hash_is_detected_and_repaired() {
    let system = system_with_cap(50);
    seed_domain(&system);
    let version = system.create_version("to corrupt", vec![], None).unwrap();

    let mut versions = stored_versions(&system);
    versions[0]["hash"] = json!("not-the-hash");
    system.with_store(|store| assert!(store.set("versions", &versions)));

    let report = system.check_integrity().expect("Failed to check");
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains(&version.version)));

    assert!(system.repair_data().expect("Failed to repair"));
    assert!(system.check_integrity().unwrap().valid);
}

#[test]
fn test_repair_is_idempotent() {
    let system = system_with_cap(50);
    system.create_version("one", vec![], None).unwrap();

    assert!(system.repair_data().unwrap());
    let before = stored_versions(&system);
    assert!(system.repair_data().unwrap());
    assert_eq!(stored_versions(&system), before);
    assert!(system.check_integrity().unwrap().valid);
}

#[test]
fn test_repair_cannot_restore_missing_data() {
    let system = system_with_cap(50);
    system.create_version("one", vec![], None).unwrap();
    system.create_version("two", vec![], None).unwrap();

    let mut versions = stored_versions(&system);
    versions[1].as_object_mut().unwrap().remove("data");
    system.with_store(|store| assert!(store.set("versions", &versions)));

    let report = system.check_integrity().unwrap();
    assert!(report.errors.iter().any(|e| e.contains("1.0.1") && e.contains("data")));

    assert!(!system.repair_data().unwrap());
    assert!(!system.check_integrity().unwrap().valid);
}

#[test]
fn test_metadata_count_mismatch_is_repaired() {
    let system = system_with_cap(50);
    system.create_version("one", vec![], None).unwrap();

    system.with_store(|store| {
        let mut metadata: Value = store.get("backup_metadata").unwrap();
        metadata["totalVersions"] = json!(7);
        store.set("backup_metadata", &metadata);
    });
    assert!(!system.check_integrity().unwrap().valid);

    assert!(system.repair_data().unwrap());
    assert_eq!(system.metadata().unwrap().total_versions, 1);
}

#[test]
fn test_missing_metadata_is_flagged_and_rewritten() {
    let system = system_with_cap(50);
    system.with_store(|store| store.remove("backup_metadata").unwrap());

    let report = system.check_integrity().unwrap();
    assert!(!report.valid);
    assert!(report.errors[0].contains("metadata"));

    assert!(system.repair_data().unwrap());
    assert_eq!(system.metadata().unwrap().max_versions, 50);
}

// =============================================================================
// Comparison and stats
// =============================================================================

#[test]
fn test_compare_versions() {
    let system = system_with_cap(50);
    seed_domain(&system);
    let a = system.create_version("a", vec![], None).unwrap();

    system.with_store(|store| {
        store.set(
            "sales",
            &json!([{"id": "s1"}, {"id": "s2"}]),
        )
    });
    let b = system.create_version("b", vec![], None).unwrap();

    let diff = system.compare_versions(&a.version, &b.version).unwrap();
    let sales = diff.collections.iter().find(|c| c.key == "sales").unwrap();
    assert_eq!((sales.before, sales.after), (1, 2));
    assert!(!diff.is_empty());

    assert!(system.compare_versions(&a.version, "8.8.8").is_err());
}

#[test]
fn test_stats() {
    let system = system_with_cap(50);
    system.create_version("Sauvegarde automatique", vec![], None).unwrap();
    system.create_version("Création vente", vec![], Some("admin")).unwrap();

    let stats = system.stats().unwrap();
    assert_eq!(stats.total_versions, 2);
    assert_eq!(stats.automatic_backups, 1);
    assert_eq!(stats.manual_versions, 1);
    assert!(stats.oldest <= stats.newest);
}

#[test]
fn test_state_survives_reopen() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    {
        let system = VersioningSystem::open(dir.path(), VersioningConfig::default()).unwrap();
        seed_domain(&system);
        system.create_version("persisted", vec![], None).unwrap();
    }

    let system = VersioningSystem::open(dir.path(), VersioningConfig::default()).unwrap();
    let versions = system.versions().unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].description, "persisted");
    assert_eq!(system.current_version().as_deref(), Some("1.0.0"));
}
