// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn quotes_plain_values() {
    assert_eq!(sh_quote("hello"), "'hello'");
    assert_eq!(sh_quote(""), "''");
}

#[test]
fn quotes_values_with_shell_metacharacters() {
    assert_eq!(sh_quote("a b;rm -rf /"), "'a b;rm -rf /'");
    assert_eq!(sh_quote("$HOME `id`"), "'$HOME `id`'");
}

#[test]
fn quotes_embedded_single_quotes() {
    assert_eq!(sh_quote("it's"), r"'it'\''s'");
}

#[test]
fn root_command_has_no_sudo() {
    let cmd = remote_script_command("root", &env(&[("CACHE_DIR", "/var/cache/ghr")]));
    assert_eq!(cmd, "CACHE_DIR='/var/cache/ghr' bash -s");
}

#[test]
fn non_root_command_uses_sudo() {
    let cmd = remote_script_command(
        "ubuntu",
        &env(&[
            ("GITHUB_REPOSITORY", "acme/widgets"),
            ("GITHUB_RUNNER_TOKEN", "tok"),
        ]),
    );
    assert_eq!(
        cmd,
        "sudo -u ubuntu GITHUB_REPOSITORY='acme/widgets' GITHUB_RUNNER_TOKEN='tok' bash -s"
    );
}

#[test]
fn empty_env_still_runs_bash() {
    assert_eq!(remote_script_command("root", &[]), "bash -s");
    assert_eq!(remote_script_command("ubuntu", &[]), "sudo -u ubuntu bash -s");
}

#[test]
fn ssh_command_disables_host_key_checking() {
    let cmd = SshBootstrap::ssh_command("203.0.113.5".parse().unwrap(), "hostname");
    let args: Vec<String> = cmd
        .as_std()
        .get_args()
        .map(|a| a.to_string_lossy().to_string())
        .collect();

    assert!(args.contains(&"StrictHostKeyChecking no".to_string()));
    assert!(args.contains(&"root@203.0.113.5".to_string()));
    assert!(args.contains(&"hostname".to_string()));
}
