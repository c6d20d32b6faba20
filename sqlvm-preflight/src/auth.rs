//! Bearer-token acquisition.
//!
//! Tokens come from the environment when supplied (useful for CI and tests),
//! otherwise from `az account get-access-token` for the requested resource.

use std::env;
use std::process::Command;

use eyre::{bail, Result, WrapErr};
use log::debug;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzAccessToken {
    access_token: String,
}

/// Token for the given resource, preferring the named environment variable.
pub fn token_for_resource(env_var: &str, resource: &str) -> Result<String> {
    if let Ok(token) = env::var(env_var) {
        if !token.is_empty() {
            debug!("using {env_var} for {resource}");
            return Ok(token);
        }
    }

    debug!("{env_var} not set; running az account get-access-token for {resource}");
    let output = Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--resource",
            resource,
            "--output",
            "json",
        ])
        .output()
        .wrap_err("failed to run `az account get-access-token`")?;

    if !output.status.success() {
        bail!(
            "az account get-access-token exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let token: AzAccessToken = serde_json::from_slice(&output.stdout)
        .wrap_err("unexpected output from az account get-access-token")?;
    Ok(token.access_token)
}
