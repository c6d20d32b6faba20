//! Azure AD authentication preflight.
//!
//! Staged check behind `--enable-azure-ad-auth`: feature/cloud gates first
//! (no network), then three strictly-ordered remote lookups — the SQL VM's
//! image offer, the VM's managed identity, and the identity's Graph
//! permissions. Every remote failure is translated to a fixed user-facing
//! error at the call site; the transport error itself is only logged.

use std::collections::HashMap;

use log::{debug, warn};

use crate::arm::ArmClient;
use crate::config::{Cloud, AZURE_PUBLIC_CLOUD};
use crate::error::{ValidationError, ValidationResult};
use crate::graph::GraphClient;
use crate::validators::ArgumentNamespace;

pub const USER_READ_ALL: &str = "User.Read.All";
pub const APPLICATION_READ_ALL: &str = "Application.Read.All";
pub const GROUP_MEMBER_READ_ALL: &str = "GroupMember.Read.All";

// Fallback app-role IDs, used when the live lookup cannot resolve them.
// Stable in practice; the programmatic lookup exists for safety.
const USER_READ_ALL_ROLE_ID: &str = "a154be20-db9c-4678-8ab7-66f6cc099a59";
const APPLICATION_READ_ALL_ROLE_ID: &str = "9a5d68dd-52b0-4cc2-bd40-abcf44ac3a30";
const GROUP_MEMBER_READ_ALL_ROLE_ID: &str = "98830695-27a2-44f7-8c18-0c3ebc9698f6";

const DIRECTORY_READERS_ROLE: &str = "Directory Readers";

/// Outcome of the non-network gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AadGate {
    /// `--skip-msi-validation` was set; nothing further to check.
    Skip,
    /// Proceed with the remote validation stages.
    Validate,
}

/// Feature and cloud gates. Runs before any token or network work.
pub fn validate_azure_ad_auth_request(
    ns: &ArgumentNamespace,
    cloud: &Cloud,
) -> ValidationResult<AadGate> {
    if ns.enable_azure_ad_auth == Some(false) {
        return Err(ValidationError::InvalidArgumentValue(
            "Disable Azure AD authentication is not supported".into(),
        ));
    }

    if ns.skip_msi_validation {
        return Ok(AadGate::Skip);
    }

    // SQL VM Azure AD authentication is currently only supported on Azure Public Cloud
    if cloud.name != AZURE_PUBLIC_CLOUD {
        return Err(ValidationError::InvalidArgumentValue(format!(
            "Azure AD authentication is not supported in {}",
            cloud.name
        )));
    }

    Ok(AadGate::Validate)
}

/// The remote stages: SQL VM capability, managed identity, Graph permissions.
pub async fn validate_azure_ad_authentication(
    ns: &ArgumentNamespace,
    arm: &ArmClient,
    graph: &GraphClient,
) -> ValidationResult {
    validate_supported_on_sqlvm(ns, arm).await?;
    let principal_id = validate_msi_on_vm(ns, arm).await?;
    validate_msi_permissions(graph, &principal_id).await
}

fn unsupported_offer(offer: Option<&str>) -> ValidationError {
    ValidationError::InvalidArgumentValue(format!(
        "Azure AD authentication requires SQL Server 2022 on Windows platform but the SQL Image Offer of this SQL VM is {}",
        offer.unwrap_or("None")
    ))
}

/// The SQL VM must run SQL Server 2022 or later on Windows; the image offer
/// encodes both, e.g. `SQL2022-WS2022`.
async fn validate_supported_on_sqlvm(ns: &ArgumentNamespace, arm: &ArmClient) -> ValidationResult {
    let sqlvm = match arm
        .get_sql_vm(&ns.resource_group_name, &ns.sql_virtual_machine_name)
        .await
    {
        Ok(sqlvm) => sqlvm,
        Err(e) => {
            debug!("SQL VM lookup failed: {e:#}");
            return Err(ValidationError::InvalidArgumentValue(
                "Unable to validate Azure AD authentication due to retrieving SQL VM instance encountering an error".into(),
            ));
        }
    };

    let offer = match sqlvm.sql_image_offer() {
        Some(offer) => offer,
        None => return Err(unsupported_offer(None)),
    };

    let version_platform: Vec<&str> = offer.split('-').collect();
    if version_platform.len() < 2 {
        return Err(unsupported_offer(Some(offer)));
    }

    let version = version_platform[0];
    let platform = version_platform[1];

    // version looks like SQL2022; the year follows the 3-char product prefix
    let year: i32 = match version.get(3..).and_then(|v| v.parse().ok()) {
        Some(year) => year,
        None => return Err(unsupported_offer(Some(offer))),
    };

    if year < 2022 || !platform.starts_with("WS") {
        return Err(unsupported_offer(Some(offer)));
    }
    Ok(())
}

/// Resolve the principal ID of the managed identity to validate. The Azure VM
/// shares its name with the SQL VM.
async fn validate_msi_on_vm(
    ns: &ArgumentNamespace,
    arm: &ArmClient,
) -> ValidationResult<String> {
    let vm = match arm
        .get_virtual_machine(&ns.resource_group_name, &ns.sql_virtual_machine_name)
        .await
    {
        Ok(vm) => vm,
        Err(e) => {
            debug!("Azure VM lookup failed: {e:#}");
            return Err(ValidationError::InvalidArgumentValue(
                "Unable to validate Azure AD authentication due to retrieving the Azure VM instance encountering an error".into(),
            ));
        }
    };

    let Some(client_id) = ns.msi_client_id.as_deref() else {
        // system-assigned identity
        return vm
            .identity
            .and_then(|identity| identity.principal_id)
            .ok_or_else(|| {
                ValidationError::InvalidArgumentValue(
                    "Enable Azure AD authentication with system-assigned managed identity but the system-assgined managed identity is not enabled on this Azure VM".into(),
                )
            });
    };

    let not_attached = || {
        ValidationError::InvalidArgumentValue(format!(
            "Enable Azure AD authentication with user-assigned managed identity {client_id}, but the managed identity is not attached to this Azure VM"
        ))
    };

    let identities = vm
        .identity
        .and_then(|identity| identity.user_assigned_identities)
        .ok_or_else(not_attached)?;

    for umi in identities.values() {
        if umi.client_id.as_deref() == Some(client_id) {
            return umi.principal_id.clone().ok_or_else(not_attached);
        }
    }
    Err(not_attached())
}

/// The identity needs Graph read permissions: either the Directory Readers
/// role outright, or all three app-role assignments.
async fn validate_msi_permissions(graph: &GraphClient, principal_id: &str) -> ValidationResult {
    let graph_error = |e: eyre::Report| {
        debug!("Microsoft Graph query failed: {e:#}");
        ValidationError::InvalidArgumentValue(
            "Unable to validate the permission of MSI due to querying Microsoft Graph API encountered error".into(),
        )
    };

    let directory_roles = graph
        .directory_roles(principal_id)
        .await
        .map_err(graph_error)?;
    if directory_roles
        .iter()
        .any(|role| role.display_name == DIRECTORY_READERS_ROLE)
    {
        return Ok(());
    }

    let mut app_role_ids = find_role_ids(graph).await;
    app_role_ids
        .entry(USER_READ_ALL)
        .or_insert_with(|| USER_READ_ALL_ROLE_ID.to_owned());
    app_role_ids
        .entry(APPLICATION_READ_ALL)
        .or_insert_with(|| APPLICATION_READ_ALL_ROLE_ID.to_owned());
    app_role_ids
        .entry(GROUP_MEMBER_READ_ALL)
        .or_insert_with(|| GROUP_MEMBER_READ_ALL_ROLE_ID.to_owned());

    let mut missing_roles = vec![USER_READ_ALL, APPLICATION_READ_ALL, GROUP_MEMBER_READ_ALL];
    let assignments = graph
        .app_role_assignments(principal_id)
        .await
        .map_err(graph_error)?;
    for assignment in &assignments {
        missing_roles.retain(|role| app_role_ids[role] != assignment.app_role_id);
        if missing_roles.is_empty() {
            break;
        }
    }

    if !missing_roles.is_empty() {
        return Err(ValidationError::InvalidArgumentValue(format!(
            "The managed identity is lack of the following roles for Azure AD authentication: {}",
            missing_roles.join(", ")
        )));
    }
    Ok(())
}

/// Best-effort lookup of the three app-role IDs from the Microsoft Graph
/// service principal. Any failure degrades to a warning; the caller backfills
/// the hardcoded IDs for whatever is unresolved.
async fn find_role_ids(graph: &GraphClient) -> HashMap<&'static str, String> {
    let mut app_role_ids = HashMap::new();

    let service_principals = match graph
        .service_principals_by_display_name("Microsoft Graph")
        .await
    {
        Ok(sps) => sps,
        Err(e) => {
            warn!("Unable to query Microsoft Graph service principal, exception: {e:#}");
            return app_role_ids;
        }
    };

    let Some(sp) = service_principals.first() else {
        warn!("Failed to find Microsoft Graph service principal");
        return app_role_ids;
    };

    for app_role in &sp.app_roles {
        match app_role.value.as_str() {
            USER_READ_ALL => {
                app_role_ids.insert(USER_READ_ALL, app_role.id.clone());
            }
            APPLICATION_READ_ALL => {
                app_role_ids.insert(APPLICATION_READ_ALL, app_role.id.clone());
            }
            GROUP_MEMBER_READ_ALL => {
                app_role_ids.insert(GROUP_MEMBER_READ_ALL, app_role.id.clone());
            }
            _ => {}
        }
    }

    if app_role_ids.len() < 3 {
        warn!("Failed to find all app role id, using the hardcoded app role id");
    }
    app_role_ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUB: &str = "sub";
    const RG: &str = "rg";
    const VM: &str = "vm1";

    fn ns_aad() -> ArgumentNamespace {
        ArgumentNamespace {
            resource_group_name: RG.to_string(),
            sql_virtual_machine_name: VM.to_string(),
            enable_azure_ad_auth: Some(true),
            ..ArgumentNamespace::default()
        }
    }

    fn clients(server: &MockServer) -> (ArmClient, GraphClient) {
        (
            ArmClient::new(&server.uri(), SUB, "token"),
            GraphClient::new(&server.uri(), "token"),
        )
    }

    async fn mock_sql_vm(server: &MockServer, offer: &str) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/subscriptions/{SUB}/resourceGroups/{RG}/providers/Microsoft.SqlVirtualMachine/sqlVirtualMachines/{VM}"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": { "sqlImageOffer": offer }
            })))
            .mount(server)
            .await;
    }

    async fn mock_vm_with_system_identity(server: &MockServer, principal_id: &str) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/subscriptions/{SUB}/resourceGroups/{RG}/providers/Microsoft.Compute/virtualMachines/{VM}"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identity": { "principalId": principal_id }
            })))
            .mount(server)
            .await;
    }

    async fn mock_directory_roles(server: &MockServer, principal_id: &str, roles: &[&str]) {
        let value: Vec<_> = roles.iter().map(|r| json!({ "displayName": r })).collect();
        Mock::given(method("GET"))
            .and(path(format!(
                "/v1.0/servicePrincipals/{principal_id}/transitiveMemberOf/microsoft.graph.directoryRole"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": value })))
            .mount(server)
            .await;
    }

    async fn mock_graph_sp_lookup_failure(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1.0/servicePrincipals"))
            .respond_with(ResponseTemplate::new(500))
            .mount(server)
            .await;
    }

    async fn mock_assignments(server: &MockServer, principal_id: &str, role_ids: &[&str]) {
        let value: Vec<_> = role_ids.iter().map(|id| json!({ "appRoleId": id })).collect();
        Mock::given(method("GET"))
            .and(path(format!(
                "/v1.0/servicePrincipals/{principal_id}/appRoleAssignments"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": value })))
            .mount(server)
            .await;
    }

    #[test]
    fn disabling_the_feature_is_rejected() {
        let mut ns = ns_aad();
        ns.enable_azure_ad_auth = Some(false);
        let err = validate_azure_ad_auth_request(&ns, &Cloud::public()).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn skip_flag_short_circuits() {
        let mut ns = ns_aad();
        ns.skip_msi_validation = true;
        let gate = validate_azure_ad_auth_request(&ns, &Cloud::public()).unwrap();
        assert_eq!(gate, AadGate::Skip);
    }

    #[test]
    fn non_public_cloud_is_rejected_by_name() {
        let ns = ns_aad();
        let cloud = Cloud {
            name: "AzureChinaCloud".to_string(),
            ..Cloud::public()
        };
        let err = validate_azure_ad_auth_request(&ns, &cloud).unwrap_err();
        assert!(err.to_string().contains("AzureChinaCloud"));
    }

    #[test]
    fn public_cloud_proceeds_to_validation() {
        let ns = ns_aad();
        let gate = validate_azure_ad_auth_request(&ns, &Cloud::public()).unwrap();
        assert_eq!(gate, AadGate::Validate);
    }

    #[tokio::test]
    async fn old_sql_version_is_unsupported() {
        let server = MockServer::start().await;
        mock_sql_vm(&server, "SQL2019-WS2019").await;
        let (arm, graph) = clients(&server);

        let err = validate_azure_ad_authentication(&ns_aad(), &arm, &graph)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SQL2019-WS2019"));
    }

    #[tokio::test]
    async fn linux_platform_is_unsupported() {
        let server = MockServer::start().await;
        mock_sql_vm(&server, "SQL2022-Ubuntu2204").await;
        let (arm, graph) = clients(&server);

        let err = validate_azure_ad_authentication(&ns_aad(), &arm, &graph)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SQL2022-Ubuntu2204"));
    }

    #[tokio::test]
    async fn malformed_offer_is_unsupported() {
        let server = MockServer::start().await;
        mock_sql_vm(&server, "SQLServer").await;
        let (arm, graph) = clients(&server);

        let err = validate_azure_ad_authentication(&ns_aad(), &arm, &graph)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SQLServer"));
    }

    #[tokio::test]
    async fn sql_vm_fetch_failure_is_translated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let (arm, graph) = clients(&server);

        let err = validate_azure_ad_authentication(&ns_aad(), &arm, &graph)
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("retrieving SQL VM instance encountering an error"));
    }

    #[tokio::test]
    async fn missing_system_identity_is_rejected() {
        let server = MockServer::start().await;
        mock_sql_vm(&server, "SQL2022-WS2022").await;
        Mock::given(method("GET"))
            .and(path(format!(
                "/subscriptions/{SUB}/resourceGroups/{RG}/providers/Microsoft.Compute/virtualMachines/{VM}"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        let (arm, graph) = clients(&server);

        let err = validate_azure_ad_authentication(&ns_aad(), &arm, &graph)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("system-assgined managed identity"));
    }

    #[tokio::test]
    async fn unmatched_user_assigned_client_id_is_rejected() {
        let server = MockServer::start().await;
        mock_sql_vm(&server, "SQL2022-WS2022").await;
        Mock::given(method("GET"))
            .and(path(format!(
                "/subscriptions/{SUB}/resourceGroups/{RG}/providers/Microsoft.Compute/virtualMachines/{VM}"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identity": {
                    "userAssignedIdentities": {
                        "/some/umi": { "clientId": "other-client", "principalId": "p9" }
                    }
                }
            })))
            .mount(&server)
            .await;
        let (arm, graph) = clients(&server);

        let mut ns = ns_aad();
        ns.msi_client_id = Some("wanted-client".to_string());
        let err = validate_azure_ad_authentication(&ns, &arm, &graph)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("wanted-client"));
    }

    #[tokio::test]
    async fn directory_readers_role_passes_without_app_roles() {
        let server = MockServer::start().await;
        mock_sql_vm(&server, "SQL2022-WS2022").await;
        mock_vm_with_system_identity(&server, "p1").await;
        mock_directory_roles(&server, "p1", &["Directory Readers"]).await;
        let (arm, graph) = clients(&server);

        validate_azure_ad_authentication(&ns_aad(), &arm, &graph)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn all_three_fallback_assignments_pass() {
        let server = MockServer::start().await;
        mock_sql_vm(&server, "SQL2022-WS2022").await;
        mock_vm_with_system_identity(&server, "p1").await;
        mock_directory_roles(&server, "p1", &["Some Other Role"]).await;
        mock_graph_sp_lookup_failure(&server).await;
        mock_assignments(
            &server,
            "p1",
            &[
                USER_READ_ALL_ROLE_ID,
                APPLICATION_READ_ALL_ROLE_ID,
                GROUP_MEMBER_READ_ALL_ROLE_ID,
            ],
        )
        .await;
        let (arm, graph) = clients(&server);

        validate_azure_ad_authentication(&ns_aad(), &arm, &graph)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn one_missing_assignment_is_named_exactly() {
        let server = MockServer::start().await;
        mock_sql_vm(&server, "SQL2022-WS2022").await;
        mock_vm_with_system_identity(&server, "p1").await;
        mock_directory_roles(&server, "p1", &[]).await;
        mock_graph_sp_lookup_failure(&server).await;
        mock_assignments(
            &server,
            "p1",
            &[USER_READ_ALL_ROLE_ID, APPLICATION_READ_ALL_ROLE_ID],
        )
        .await;
        let (arm, graph) = clients(&server);

        let err = validate_azure_ad_authentication(&ns_aad(), &arm, &graph)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(GROUP_MEMBER_READ_ALL));
        assert!(!msg.contains(USER_READ_ALL));
        assert!(!msg.contains(APPLICATION_READ_ALL));
    }

    #[tokio::test]
    async fn resolved_role_ids_override_the_fallbacks() {
        let server = MockServer::start().await;
        mock_sql_vm(&server, "SQL2022-WS2022").await;
        mock_vm_with_system_identity(&server, "p1").await;
        mock_directory_roles(&server, "p1", &[]).await;
        Mock::given(method("GET"))
            .and(path("/v1.0/servicePrincipals"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "appRoles": [
                        { "value": USER_READ_ALL, "id": "live-user-read" },
                        { "value": APPLICATION_READ_ALL, "id": "live-app-read" },
                        { "value": GROUP_MEMBER_READ_ALL, "id": "live-group-read" }
                    ]
                }]
            })))
            .mount(&server)
            .await;
        mock_assignments(
            &server,
            "p1",
            &["live-user-read", "live-app-read", "live-group-read"],
        )
        .await;
        let (arm, graph) = clients(&server);

        validate_azure_ad_authentication(&ns_aad(), &arm, &graph)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn two_page_assignments_are_consumed_before_deciding() {
        let server = MockServer::start().await;
        mock_sql_vm(&server, "SQL2022-WS2022").await;
        mock_vm_with_system_identity(&server, "p1").await;
        mock_directory_roles(&server, "p1", &[]).await;
        mock_graph_sp_lookup_failure(&server).await;

        let next = format!("{}/assignments-page-2", server.uri());
        Mock::given(method("GET"))
            .and(path("/v1.0/servicePrincipals/p1/appRoleAssignments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    { "appRoleId": USER_READ_ALL_ROLE_ID },
                    { "appRoleId": APPLICATION_READ_ALL_ROLE_ID }
                ],
                "@odata.nextLink": next,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/assignments-page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{ "appRoleId": GROUP_MEMBER_READ_ALL_ROLE_ID }]
            })))
            .mount(&server)
            .await;
        let (arm, graph) = clients(&server);

        validate_azure_ad_authentication(&ns_aad(), &arm, &graph)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn graph_failure_on_directory_roles_is_translated() {
        let server = MockServer::start().await;
        mock_sql_vm(&server, "SQL2022-WS2022").await;
        mock_vm_with_system_identity(&server, "p1").await;
        Mock::given(method("GET"))
            .and(path(
                "/v1.0/servicePrincipals/p1/transitiveMemberOf/microsoft.graph.directoryRole",
            ))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;
        let (arm, graph) = clients(&server);

        let err = validate_azure_ad_authentication(&ns_aad(), &arm, &graph)
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("querying Microsoft Graph API encountered error"));
    }
}
