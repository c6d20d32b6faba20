//! ARM resource identifiers.
//!
//! Canonical form:
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}`
//! with an optional one-level child (`.../virtualNetworks/{vnet}/subnets/{subnet}`).
//! The fixed segments are matched case-insensitively, the way ARM accepts them.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription: String,
    pub resource_group: String,
    pub namespace: String,
    pub resource_type: String,
    pub name: String,
    pub child_type: Option<String>,
    pub child_name: Option<String>,
}

impl ResourceId {
    pub fn new(
        subscription: &str,
        resource_group: &str,
        namespace: &str,
        resource_type: &str,
        name: &str,
    ) -> Self {
        Self {
            subscription: subscription.to_owned(),
            resource_group: resource_group.to_owned(),
            namespace: namespace.to_owned(),
            resource_type: resource_type.to_owned(),
            name: name.to_owned(),
            child_type: None,
            child_name: None,
        }
    }

    pub fn with_child(mut self, child_type: &str, child_name: &str) -> Self {
        self.child_type = Some(child_type.to_owned());
        self.child_name = Some(child_name.to_owned());
        self
    }

    /// Parse a canonical resource ID. Returns `None` for anything that is not
    /// a full identifier (bare names, truncated paths, empty segments).
    pub fn parse(id: &str) -> Option<Self> {
        let parts: Vec<&str> = id.split('/').collect();
        if parts.len() != 9 && parts.len() != 11 {
            return None;
        }
        if !parts[0].is_empty()
            || !parts[1].eq_ignore_ascii_case("subscriptions")
            || !parts[3].eq_ignore_ascii_case("resourcegroups")
            || !parts[5].eq_ignore_ascii_case("providers")
        {
            return None;
        }
        if parts[1..].iter().any(|p| p.is_empty()) {
            return None;
        }

        let mut rid = Self::new(parts[2], parts[4], parts[6], parts[7], parts[8]);
        if parts.len() == 11 {
            rid = rid.with_child(parts[9], parts[10]);
        }
        Some(rid)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            self.subscription, self.resource_group, self.namespace, self.resource_type, self.name
        )?;
        if let (Some(ct), Some(cn)) = (&self.child_type, &self.child_name) {
            write!(f, "/{ct}/{cn}")?;
        }
        Ok(())
    }
}

/// True when the string is a full resource identifier rather than a bare name.
pub fn is_valid_resource_id(id: &str) -> bool {
    ResourceId::parse(id).is_some()
}
