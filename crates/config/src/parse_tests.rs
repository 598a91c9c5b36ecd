// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn interpolates_defined_variables() {
    std::env::set_var("GHR_TEST_TOKEN", "tok123");
    let out = interpolate_env("token: ${GHR_TEST_TOKEN}\n").unwrap();
    assert_eq!(out, "token: tok123\n");
}

#[test]
fn interpolates_multiple_occurrences() {
    std::env::set_var("GHR_TEST_A", "a");
    std::env::set_var("GHR_TEST_B", "b");
    let out = interpolate_env("${GHR_TEST_A}-${GHR_TEST_B}-${GHR_TEST_A}").unwrap();
    assert_eq!(out, "a-b-a");
}

#[test]
fn undefined_variable_is_an_error() {
    std::env::remove_var("GHR_TEST_MISSING");
    let err = interpolate_env("x: ${GHR_TEST_MISSING}").unwrap_err();
    assert!(err.to_string().contains("GHR_TEST_MISSING"));
}

#[test]
fn text_without_placeholders_is_untouched() {
    let raw = "config:\n  max_runners: 10\n";
    assert_eq!(interpolate_env(raw).unwrap(), raw);
}

#[test]
fn dollar_without_braces_is_untouched() {
    let raw = "password: pa$$word";
    assert_eq!(interpolate_env(raw).unwrap(), raw);
}
