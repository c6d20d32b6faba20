//! sqlvm-preflight library
//!
//! Validates and normalizes the argument surface of a SQL VM command before
//! any control-plane request is made: bare names become full resource IDs,
//! cross-field rules are enforced, and enabling Azure AD authentication runs
//! a staged identity-and-permission check against ARM and Microsoft Graph.
//! This module separates the pipeline from the CLI shell.

pub mod aad;
pub mod arm;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod resource_id;
pub mod validators;

pub use aad::AadGate;
pub use arm::ArmClient;
pub use cli::Cli;
pub use config::{Cloud, Config};
pub use error::{ValidationError, ValidationResult};
pub use graph::GraphClient;
pub use resource_id::{is_valid_resource_id, ResourceId};
pub use validators::ArgumentNamespace;

use log::info;

/// Run every local normalizer and combination rule, stopping at the first
/// failure. Mutates the namespace in place. No network.
pub fn validate_arguments(ns: &mut ArgumentNamespace, subscription: &str) -> ValidationResult {
    validators::validate_sqlvm_group(ns, subscription);
    validators::validate_sqlvm_list(ns, subscription);
    validators::validate_load_balancer(ns, subscription);
    validators::validate_public_ip_address(ns, subscription);
    if ns.subnet_resource_id.is_some() || ns.vnet_name.is_some() {
        validators::validate_subnet(ns, subscription)?;
    }
    validators::validate_sqlmanagement(ns)?;
    validators::validate_least_privilege_mode(ns)?;
    validators::validate_expand(ns);
    validators::validate_assessment(ns)?;
    validators::validate_assessment_start_time_local(ns)?;
    Ok(())
}

/// Full preflight: local rules, then the Azure AD authentication check when
/// the flag was supplied. Remote stages run strictly in order.
pub async fn run(config: &Config, ns: &mut ArgumentNamespace) -> eyre::Result<()> {
    validate_arguments(ns, &config.subscription_id)?;

    if ns.enable_azure_ad_auth.is_some() {
        match aad::validate_azure_ad_auth_request(ns, &config.cloud)? {
            AadGate::Skip => {
                info!("--skip-msi-validation set; skipping managed-identity checks");
            }
            AadGate::Validate => {
                let arm_token =
                    auth::token_for_resource("AZURE_ACCESS_TOKEN", &config.cloud.arm_endpoint)?;
                let graph_token = auth::token_for_resource(
                    "AZURE_GRAPH_ACCESS_TOKEN",
                    &config.cloud.graph_endpoint,
                )?;
                let arm = ArmClient::new(
                    &config.cloud.arm_endpoint,
                    &config.subscription_id,
                    &arm_token,
                );
                let graph = GraphClient::new(&config.cloud.graph_endpoint, &graph_token);
                aad::validate_azure_ad_authentication(ns, &arm, &graph).await?;
                info!("Azure AD authentication preflight passed");
            }
        }
    }

    Ok(())
}
