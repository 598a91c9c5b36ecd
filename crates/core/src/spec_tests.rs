// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::catalog::{Arch, ImageKind};

fn spec(location: Option<&str>) -> RunnerSpec {
    RunnerSpec {
        server_type: "cpx21".to_string(),
        location: location.map(|s| s.to_string()),
        image: ImageRef::new(Arch::X86, ImageKind::System, "ubuntu-22.04"),
        image_id: 10,
        setup_script: PathBuf::from("/etc/ghr/scripts/setup.sh"),
        startup_script: PathBuf::from("/etc/ghr/scripts/startup-x86.sh"),
        labels: ["self-hosted", "type-cpx21"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ssh_keys_hash: ssh_keys_hash(&[3, 1, 2]),
    }
}

#[test]
fn fingerprint_is_deterministic() {
    assert_eq!(spec(None).fingerprint(), spec(None).fingerprint());
    assert_eq!(spec(Some("fsn1")).fingerprint(), spec(Some("fsn1")).fingerprint());
}

#[test]
fn fingerprint_distinguishes_every_matching_attribute() {
    let base = spec(Some("fsn1"));
    let fp = base.fingerprint();

    let mut other = base.clone();
    other.server_type = "cx22".to_string();
    assert_ne!(other.fingerprint(), fp);

    let mut other = base.clone();
    other.location = Some("ash".to_string());
    assert_ne!(other.fingerprint(), fp);

    let mut other = base.clone();
    other.image = ImageRef::new(Arch::X86, ImageKind::System, "debian-12");
    assert_ne!(other.fingerprint(), fp);

    let mut other = base.clone();
    other.ssh_keys_hash = ssh_keys_hash(&[9]);
    assert_ne!(other.fingerprint(), fp);
}

#[test]
fn fingerprint_ignores_labels_and_scripts() {
    let base = spec(None);
    let fp = base.fingerprint();

    let mut other = base.clone();
    other.labels.insert("extra".to_string());
    other.setup_script = PathBuf::from("/elsewhere/setup.sh");
    assert_eq!(other.fingerprint(), fp);
}

#[test]
fn fingerprint_is_case_insensitive() {
    assert_eq!(
        Fingerprint::compute("CPX21", Some("FSN1"), "x86:system:Ubuntu-22.04", "abc"),
        Fingerprint::compute("cpx21", Some("fsn1"), "x86:system:ubuntu-22.04", "abc"),
    );
}

#[test]
fn ssh_keys_hash_is_order_independent() {
    assert_eq!(ssh_keys_hash(&[1, 2, 3]), ssh_keys_hash(&[3, 2, 1]));
    assert_ne!(ssh_keys_hash(&[1, 2]), ssh_keys_hash(&[1, 2, 3]));
}

#[test]
fn labels_hash_is_stable_and_case_insensitive() {
    let a: BTreeSet<String> = ["Self-Hosted", "type-cx22"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let b: BTreeSet<String> = ["type-cx22", "self-hosted"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(labels_hash(&a), labels_hash(&b));
}

#[test]
fn fingerprint_fits_in_a_cloud_label() {
    let fp = spec(None).fingerprint();
    assert_eq!(fp.as_str().len(), 16);
}
