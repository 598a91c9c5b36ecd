// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `${ENV_VAR}` interpolation for configuration files.

use crate::config::ConfigError;
use regex::Regex;
use std::sync::OnceLock;

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        let pattern =
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static pattern is valid");
        pattern
    })
}

/// Replace every `${VAR}` in the raw configuration text with the value of
/// the environment variable. An undefined variable is a load error, not a
/// silent empty string.
pub fn interpolate_env(raw: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut last = 0;

    for caps in env_pattern().captures_iter(raw) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

        let value = std::env::var(name)
            .map_err(|_| ConfigError::UndefinedEnvVar(name.to_string()))?;

        out.push_str(&raw[last..whole.0]);
        out.push_str(&value);
        last = whole.1;
    }
    out.push_str(&raw[last..]);
    Ok(out)
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
