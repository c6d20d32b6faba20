//! ARM control-plane reads.
//!
//! The two GETs the Azure AD preflight needs: the SQL VM resource (for its
//! image offer) and the compute VM of the same name (for its identity block).
//! Issued directly through reqwest; the caller owns error translation.

use std::collections::HashMap;

use eyre::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;

const SQLVM_API_VERSION: &str = "2022-02-01";
const COMPUTE_API_VERSION: &str = "2022-08-01";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlVmProperties {
    pub sql_image_offer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SqlVm {
    pub properties: Option<SqlVmProperties>,
}

impl SqlVm {
    pub fn sql_image_offer(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.sql_image_offer.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentity {
    pub client_id: Option<String>,
    pub principal_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmIdentity {
    pub principal_id: Option<String>,
    /// Keyed by the identity's own resource ID.
    pub user_assigned_identities: Option<HashMap<String, UserAssignedIdentity>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VirtualMachine {
    pub identity: Option<VmIdentity>,
}

pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    subscription: String,
    token: String,
}

impl ArmClient {
    pub fn new(endpoint: &str, subscription: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            subscription: subscription.to_owned(),
            token: token.to_owned(),
        }
    }

    pub async fn get_sql_vm(&self, resource_group: &str, name: &str) -> Result<SqlVm> {
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.SqlVirtualMachine/sqlVirtualMachines/{}?api-version={}",
            self.endpoint, self.subscription, resource_group, name, SQLVM_API_VERSION
        );
        self.get_json(&url).await
    }

    pub async fn get_virtual_machine(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<VirtualMachine> {
        let url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines/{}?api-version={}",
            self.endpoint, self.subscription, resource_group, name, COMPUTE_API_VERSION
        );
        self.get_json(&url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}
