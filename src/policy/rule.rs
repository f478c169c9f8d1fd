use crate::types::{
    AddressId, ApiDescriptor, Direction, Group, Method, PathId, Priority, RoleId, WorkloadId,
};

use super::key::{IdentityRuleKey, NetworkRuleKey};

/// Administrative description of a rule, before CIDR and URI resolution.
///
/// A rule with neither workload nor role is a network rule stored in the
/// chain named by `priority`; otherwise it is an identity rule and
/// `priority` is ignored. `None` fields are wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub priority: Priority,
    pub cidr: String,
    pub workload: Option<WorkloadId>,
    pub role: Option<RoleId>,
    pub group: Group,
    pub direction: Direction,
    pub method: Option<Method>,
    pub service: u8,
    pub protocol: u8,
    pub port: u16,
    /// URI pattern; `None` or empty is a path wildcard
    pub uri: Option<String>,
}

impl Default for RuleSpec {
    fn default() -> Self {
        Self {
            priority: Priority::High,
            cidr: "0.0.0.0/0".to_string(),
            workload: None,
            role: None,
            group: Group::default(),
            direction: Direction::ANY,
            method: None,
            service: 0,
            protocol: 0,
            port: 0,
            uri: None,
        }
    }
}

impl RuleSpec {
    /// A network rule for `cidr` in the given chain
    pub fn network(priority: Priority, cidr: impl Into<String>) -> Self {
        Self {
            priority,
            cidr: cidr.into(),
            ..Self::default()
        }
    }

    /// An identity rule for a workload
    pub fn workload(workload: WorkloadId) -> Self {
        Self {
            workload: Some(workload),
            ..Self::default()
        }
    }

    /// An identity rule for a role qualified by a group
    pub fn role(role: RoleId, group: Group) -> Self {
        Self {
            role: Some(role),
            group,
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.cidr = cidr.into();
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_api(mut self, service: u8, protocol: u8, port: u16) -> Self {
        self.service = service;
        self.protocol = protocol;
        self.port = port;
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn has_identity(&self) -> bool {
        self.workload.is_some() || self.role.is_some()
    }

    /// The URI pattern, if the rule names one.
    pub fn uri_pattern(&self) -> Option<&str> {
        self.uri.as_deref().filter(|uri| !uri.is_empty())
    }

    fn api(&self, path: Option<PathId>) -> ApiDescriptor {
        ApiDescriptor::new(self.service, self.protocol, self.port, path)
    }

    pub(crate) fn network_key(&self, address: AddressId, path: Option<PathId>) -> NetworkRuleKey {
        NetworkRuleKey {
            address,
            direction: self.direction,
            method: self.method,
            api: self.api(path),
        }
    }

    pub(crate) fn identity_key(&self, path: Option<PathId>) -> IdentityRuleKey {
        IdentityRuleKey {
            workload: self.workload,
            role: self.role,
            group: self.group,
            direction: self.direction,
            method: self.method,
            api: self.api(path),
        }
    }
}
