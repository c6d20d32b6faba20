//! Configuration for sqlvm-preflight
//!
//! Resolves the ambient context (subscription, cloud endpoints) that the
//! validators and remote checks need. CLI arguments win over environment
//! variables.

use std::env;

use eyre::{bail, Result};

use crate::cli::Cli;

/// The one cloud where Azure AD authentication on SQL VMs is available.
pub const AZURE_PUBLIC_CLOUD: &str = "AzureCloud";

const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";
const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com";

/// Active cloud environment: a name plus the two service endpoints we talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cloud {
    pub name: String,
    pub arm_endpoint: String,
    pub graph_endpoint: String,
}

impl Cloud {
    pub fn public() -> Self {
        Self {
            name: AZURE_PUBLIC_CLOUD.to_string(),
            arm_endpoint: DEFAULT_ARM_ENDPOINT.to_string(),
            graph_endpoint: DEFAULT_GRAPH_ENDPOINT.to_string(),
        }
    }

    /// Cloud selection from the environment; defaults to the public cloud.
    pub fn from_env() -> Self {
        Self {
            name: env::var("AZURE_CLOUD_NAME").unwrap_or_else(|_| AZURE_PUBLIC_CLOUD.to_string()),
            arm_endpoint: env::var("AZURE_ARM_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ARM_ENDPOINT.to_string()),
            graph_endpoint: env::var("AZURE_GRAPH_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_GRAPH_ENDPOINT.to_string()),
        }
    }
}

impl Default for Cloud {
    fn default() -> Self {
        Self::public()
    }
}

/// Validated configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub subscription_id: String,
    pub resource_group: String,
    pub cloud: Cloud,
}

impl TryFrom<&Cli> for Config {
    type Error = eyre::Error;

    fn try_from(cli: &Cli) -> Result<Self> {
        let subscription_id = match cli.subscription.as_deref() {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => match env::var("AZURE_SUBSCRIPTION_ID") {
                Ok(s) if !s.is_empty() => s,
                _ => bail!("no subscription: pass --subscription or set AZURE_SUBSCRIPTION_ID"),
            },
        };

        if cli.resource_group.is_empty() {
            bail!("--resource-group must not be empty");
        }

        Ok(Config {
            subscription_id,
            resource_group: cli.resource_group.clone(),
            cloud: Cloud::from_env(),
        })
    }
}
