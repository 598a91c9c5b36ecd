// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{catalog, config, labels, scripts_dir};
use ghr_core::catalog::{Arch, ImageKind};

#[test]
fn defaults_fill_absent_categories() {
    let scripts = scripts_dir();
    let config = config(scripts.path());
    let spec = derive_spec(&labels(&["self-hosted"]), &config, &catalog(), "kh").unwrap();

    assert_eq!(spec.server_type, "cx22");
    assert_eq!(spec.location, None);
    assert_eq!(spec.image, ImageRef::new(Arch::X86, ImageKind::System, "ubuntu-22.04"));
    assert_eq!(spec.image_id, 10);
    assert!(spec.setup_script.ends_with("setup.sh"));
    assert!(spec.startup_script.ends_with("startup-x86.sh"));
    assert!(spec.labels.contains("self-hosted"));
}

#[test]
fn reserved_labels_override_defaults() {
    let scripts = scripts_dir();
    let config = config(scripts.path());
    let spec = derive_spec(
        &labels(&["self-hosted", "type-cax21", "in-fsn1"]),
        &config,
        &catalog(),
        "kh",
    )
    .unwrap();

    assert_eq!(spec.server_type, "cax21");
    assert_eq!(spec.location.as_deref(), Some("fsn1"));
    // ARM server type selects the ARM image and startup script.
    assert_eq!(spec.image_id, 11);
    assert!(spec.startup_script.ends_with("startup-arm.sh"));
}

#[test]
fn image_label_parses_dash_form() {
    let scripts = scripts_dir();
    let config = config(scripts.path());
    let spec = derive_spec(
        &labels(&["self-hosted", "image-x86-snapshot-ci-base"]),
        &config,
        &catalog(),
        "kh",
    )
    .unwrap();

    assert_eq!(spec.image, ImageRef::new(Arch::X86, ImageKind::Snapshot, "ci-base"));
    assert_eq!(spec.image_id, 12);
}

#[test]
fn setup_label_selects_script_file() {
    let scripts = scripts_dir();
    let config = config(scripts.path());
    let spec = derive_spec(
        &labels(&["self-hosted", "setup-docker"]),
        &config,
        &catalog(),
        "kh",
    )
    .unwrap();
    assert!(spec.setup_script.ends_with("setup-docker.sh"));
}

#[test]
fn label_prefix_gates_reserved_labels() {
    let scripts = scripts_dir();
    let mut config = config(scripts.path());
    config.label_prefix = "acme".to_string();

    // Unprefixed type label is just an extra label now.
    let spec = derive_spec(
        &labels(&["self-hosted", "type-cpx21", "acme-type-cax21"]),
        &config,
        &catalog(),
        "kh",
    )
    .unwrap();
    assert_eq!(spec.server_type, "cax21");
    assert!(spec.labels.contains("type-cpx21"));
}

#[test]
fn meta_labels_expand_one_level() {
    let scripts = scripts_dir();
    let mut config = config(scripts.path());
    config
        .meta_label
        .insert("big".to_string(), vec!["type-cpx21".to_string(), "in-ash".to_string()]);

    let spec = derive_spec(&labels(&["self-hosted", "big"]), &config, &catalog(), "kh").unwrap();
    assert_eq!(spec.server_type, "cpx21");
    assert_eq!(spec.location.as_deref(), Some("ash"));
    assert!(spec.labels.contains("big"));
    assert!(spec.labels.contains("type-cpx21"));
}

#[test]
fn meta_label_expansion_is_not_transitive() {
    let mut meta = std::collections::HashMap::new();
    meta.insert("a".to_string(), vec!["b".to_string()]);
    meta.insert("b".to_string(), vec!["type-cpx21".to_string()]);

    let expanded = expand_meta_labels(&labels(&["a"]), &meta, "");
    // "b" arrives via expansion but is not itself expanded.
    assert!(expanded.contains(&"b".to_string()));
    assert!(!expanded.contains(&"type-cpx21".to_string()));
}

#[test]
fn meta_label_collisions_keep_first_occurrence() {
    let mut meta = std::collections::HashMap::new();
    meta.insert("a".to_string(), vec!["shared".to_string(), "only-a".to_string()]);
    meta.insert("b".to_string(), vec!["shared".to_string(), "only-b".to_string()]);

    let expanded = expand_meta_labels(&labels(&["a", "b"]), &meta, "");
    let shared_count = expanded.iter().filter(|l| *l == "shared").count();
    assert_eq!(shared_count, 1);
    assert!(expanded.contains(&"only-a".to_string()));
    assert!(expanded.contains(&"only-b".to_string()));
}

#[test]
fn conflicting_type_labels_are_rejected() {
    let scripts = scripts_dir();
    let config = config(scripts.path());
    let err = derive_spec(
        &labels(&["self-hosted", "type-cx22", "type-cpx21"]),
        &config,
        &catalog(),
        "kh",
    )
    .unwrap_err();
    assert!(matches!(err, SpecError::DuplicateCategory { category: "type", .. }));
}

#[test]
fn unknown_server_type_is_rejected() {
    let scripts = scripts_dir();
    let config = config(scripts.path());
    let err = derive_spec(&labels(&["type-cx999"]), &config, &catalog(), "kh").unwrap_err();
    assert_eq!(err, SpecError::UnknownServerType("cx999".to_string()));
}

#[test]
fn unknown_location_is_rejected() {
    let scripts = scripts_dir();
    let config = config(scripts.path());
    let err = derive_spec(&labels(&["in-mars"]), &config, &catalog(), "kh").unwrap_err();
    assert_eq!(err, SpecError::UnknownLocation("mars".to_string()));
}

#[test]
fn unknown_image_is_rejected() {
    let scripts = scripts_dir();
    let config = config(scripts.path());
    let err = derive_spec(
        &labels(&["image-x86-system-debian-99"]),
        &config,
        &catalog(),
        "kh",
    )
    .unwrap_err();
    assert!(matches!(err, SpecError::UnknownImage(_)));
}

#[test]
fn malformed_image_label_is_rejected() {
    let scripts = scripts_dir();
    let config = config(scripts.path());
    let err = derive_spec(&labels(&["image-weird"]), &config, &catalog(), "kh").unwrap_err();
    assert!(matches!(err, SpecError::InvalidImageRef(_)));
}

#[test]
fn missing_script_is_rejected() {
    let scripts = scripts_dir();
    let config = config(scripts.path());
    let err = derive_spec(&labels(&["setup-nonexistent"]), &config, &catalog(), "kh").unwrap_err();
    assert!(matches!(err, SpecError::ScriptNotFound(_)));
}

#[test]
fn derivation_is_deterministic() {
    let scripts = scripts_dir();
    let config = config(scripts.path());
    let input = labels(&["self-hosted", "type-cpx21", "in-fsn1"]);

    let a = derive_spec(&input, &config, &catalog(), "kh").unwrap();
    let b = derive_spec(&input, &config, &catalog(), "kh").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn labels_are_lowercased() {
    let scripts = scripts_dir();
    let config = config(scripts.path());
    let mixed_case: BTreeSet<String> = ["Self-Hosted", "TYPE-CPX21"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let spec = derive_spec(&mixed_case, &config, &catalog(), "kh").unwrap();
    assert_eq!(spec.server_type, "cpx21");
    assert!(spec.labels.contains("self-hosted"));
    assert!(spec.labels.contains("type-cpx21"));
}
