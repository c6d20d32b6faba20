//! Microsoft Graph reads.
//!
//! Three read-only endpoints, all GET. List-shaped responses carry a `value`
//! array and may carry an `@odata.nextLink`; the link is followed verbatim
//! (the original path and params are ignored) until absent. A response without
//! `value` is a single object; an empty body is an absent value.

use eyre::Result;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

const GRAPH_API_VERSION: &str = "v1.0";

// Continuation links carry no bound of their own; cap them so a misbehaving
// tenant cannot pin the command forever.
const MAX_PAGES: usize = 100;

#[derive(Debug)]
pub enum GraphResponse {
    List(Vec<Value>),
    Object(Value),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRole {
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRoleAssignment {
    #[serde(default)]
    pub app_role_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppRole {
    pub value: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
    #[serde(default)]
    pub app_roles: Vec<AppRole>,
}

pub struct GraphClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl GraphClient {
    pub fn new(endpoint: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
        }
    }

    /// Directory roles transitively assigned to a service principal.
    pub async fn directory_roles(&self, principal_id: &str) -> Result<Vec<DirectoryRole>> {
        let path = format!(
            "/servicePrincipals/{principal_id}/transitiveMemberOf/microsoft.graph.directoryRole"
        );
        self.get_list(&path).await
    }

    /// App roles assigned to a service principal.
    pub async fn app_role_assignments(&self, principal_id: &str) -> Result<Vec<AppRoleAssignment>> {
        let path = format!("/servicePrincipals/{principal_id}/appRoleAssignments");
        self.get_list(&path).await
    }

    /// Service principals matching a display name (used to locate the
    /// Microsoft Graph principal and its declared app roles).
    pub async fn service_principals_by_display_name(
        &self,
        display_name: &str,
    ) -> Result<Vec<ServicePrincipal>> {
        let filter = display_name.replace(' ', "%20");
        let path = format!("/servicePrincipals?$filter=displayName%20eq%20'{filter}'");
        self.get_list(&path).await
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        match self.send_get(path).await? {
            Some(GraphResponse::List(items)) => items
                .into_iter()
                .map(|item| Ok(serde_json::from_value(item)?))
                .collect(),
            Some(GraphResponse::Object(_)) | None => Ok(Vec::new()),
        }
    }

    /// One logical GET against Graph, following continuation links.
    async fn send_get(&self, path: &str) -> Result<Option<GraphResponse>> {
        let mut url = format!("{}/{}{}", self.endpoint, GRAPH_API_VERSION, path);
        let mut list_result: Vec<Value> = Vec::new();
        let mut is_list_result = false;

        for page in 0.. {
            if page == MAX_PAGES {
                warn!("stopping Graph pagination after {MAX_PAGES} pages for {path}");
                break;
            }

            let resp = self
                .http
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?
                .error_for_status()?;
            let text = resp.text().await?;
            if text.is_empty() {
                return Ok(None);
            }

            let body: Value = serde_json::from_str(&text)?;

            if let Some(value) = body.get("value") {
                is_list_result = true;
                if let Some(items) = value.as_array() {
                    list_result.extend(items.iter().cloned());
                }
            }

            if let Some(next) = body.get("@odata.nextLink").and_then(Value::as_str) {
                url = next.to_owned();
                continue;
            }

            if !is_list_result {
                return Ok(Some(GraphResponse::Object(body)));
            }
            break;
        }

        Ok(Some(GraphResponse::List(list_result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn two_page_response_is_fully_consumed() {
        let server = MockServer::start().await;
        let next = format!("{}/next-page", server.uri());

        Mock::given(method("GET"))
            .and(path("/v1.0/servicePrincipals/p1/appRoleAssignments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{ "appRoleId": "role-a" }],
                "@odata.nextLink": next,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/next-page"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{ "appRoleId": "role-b" }]
            })))
            .mount(&server)
            .await;

        let graph = GraphClient::new(&server.uri(), "token");
        let assignments = graph.app_role_assignments("p1").await.unwrap();
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].app_role_id, "role-a");
        assert_eq!(assignments[1].app_role_id, "role-b");
    }

    #[tokio::test]
    async fn empty_value_list_is_still_a_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/v1.0/servicePrincipals/p1/transitiveMemberOf/microsoft.graph.directoryRole",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
            .mount(&server)
            .await;

        let graph = GraphClient::new(&server.uri(), "token");
        let roles = graph.directory_roles("p1").await.unwrap();
        assert!(roles.is_empty());
    }

    #[tokio::test]
    async fn object_response_without_value_yields_no_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/servicePrincipals/p1/appRoleAssignments"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "not-a-list" })),
            )
            .mount(&server)
            .await;

        let graph = GraphClient::new(&server.uri(), "token");
        let assignments = graph.app_role_assignments("p1").await.unwrap();
        assert!(assignments.is_empty());
    }

    #[tokio::test]
    async fn empty_body_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/servicePrincipals/p1/appRoleAssignments"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let graph = GraphClient::new(&server.uri(), "token");
        let resp = graph
            .send_get("/servicePrincipals/p1/appRoleAssignments")
            .await
            .unwrap();
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let graph = GraphClient::new(&server.uri(), "token");
        assert!(graph.directory_roles("p1").await.is_err());
    }

    #[tokio::test]
    async fn service_principal_filter_parses_app_roles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/servicePrincipals"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{
                    "displayName": "Microsoft Graph",
                    "appRoles": [
                        { "value": "User.Read.All", "id": "id-1" },
                        { "value": "Application.Read.All", "id": "id-2" }
                    ]
                }]
            })))
            .mount(&server)
            .await;

        let graph = GraphClient::new(&server.uri(), "token");
        let sps = graph
            .service_principals_by_display_name("Microsoft Graph")
            .await
            .unwrap();
        assert_eq!(sps.len(), 1);
        assert_eq!(sps[0].app_roles.len(), 2);
        assert_eq!(sps[0].app_roles[0].value, "User.Read.All");
    }
}
