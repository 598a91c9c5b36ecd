// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn active_name_round_trips() {
    let name = ServerName::active(7117741000, 19650052);
    let text = name.to_string();
    assert_eq!(text, "github-hetzner-runner-7117741000-19650052");
    assert_eq!(ServerName::parse(&text), Some(name));
}

#[test]
fn recycle_name_round_trips() {
    let name = ServerName::recycle("00001700000000000");
    let text = name.to_string();
    assert_eq!(text, "github-hetzner-runner-recycle-00001700000000000");
    assert_eq!(ServerName::parse(&text), Some(name));
}

#[test]
fn standby_name_round_trips() {
    let name = ServerName::standby("g0", "00001700000000001");
    let text = name.to_string();
    assert_eq!(text, "github-hetzner-runner-standby-g0-00001700000000001");
    assert_eq!(ServerName::parse(&text), Some(name));
}

#[test]
fn foreign_names_are_not_owned() {
    assert!(!ServerName::is_owned("my-database"));
    assert!(!ServerName::is_owned("github-hetzner-runners-1-2"));
    assert!(!ServerName::is_owned("github-hetzner-runner"));
    assert!(ServerName::parse("build-agent-42").is_none());
}

#[test]
fn owned_names_carry_prefix() {
    assert!(ServerName::is_owned("github-hetzner-runner-1-2"));
    assert!(ServerName::is_owned("github-hetzner-runner-recycle-1"));
    assert!(ServerName::is_owned("github-hetzner-runner-standby-g1-2"));
}

#[test]
fn malformed_owned_names_do_not_parse() {
    assert!(ServerName::parse("github-hetzner-runner-abc-def").is_none());
    assert!(ServerName::parse("github-hetzner-runner-recycle-").is_none());
    assert!(ServerName::parse("github-hetzner-runner-recycle-12x").is_none());
    assert!(ServerName::parse("github-hetzner-runner-standby-g0").is_none());
    assert!(ServerName::parse("github-hetzner-runner-standby--1").is_none());
    assert!(ServerName::parse("github-hetzner-runner-42").is_none());
}

#[test]
fn role_follows_name_shape() {
    assert_eq!(
        ServerName::parse("github-hetzner-runner-1-2").unwrap().role(),
        ServerRole::Active
    );
    assert_eq!(
        ServerName::parse("github-hetzner-runner-recycle-3")
            .unwrap()
            .role(),
        ServerRole::Recycle
    );
    assert_eq!(
        ServerName::parse("github-hetzner-runner-standby-g0-4")
            .unwrap()
            .role(),
        ServerRole::Standby
    );
}

#[test]
fn job_identity_only_for_active() {
    assert_eq!(
        ServerName::active(10, 20).job_identity(),
        Some((10, 20))
    );
    assert_eq!(ServerName::recycle("1").job_identity(), None);
    assert_eq!(ServerName::standby("g0", "1").job_identity(), None);
}

#[test]
fn run_prefix_groups_servers_of_one_run() {
    let name = ServerName::active(555, 1).to_string();
    let other_run = ServerName::active(5555, 1).to_string();

    assert!(name.starts_with(&ServerName::run_prefix(555)));
    assert!(!other_run.starts_with(&ServerName::run_prefix(555)));
}

#[test]
fn server_role_parses_from_label_value() {
    assert_eq!(ServerRole::parse("active"), Some(ServerRole::Active));
    assert_eq!(ServerRole::parse("recycle"), Some(ServerRole::Recycle));
    assert_eq!(ServerRole::parse("standby"), Some(ServerRole::Standby));
    assert_eq!(ServerRole::parse("zombie"), None);
}
