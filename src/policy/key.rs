use crate::types::{AddressId, ApiDescriptor, Direction, Group, Method, RoleId, WorkloadId};

use super::fallback::{IdentityDim, NetworkDim, WildcardKey};

/// Key of a network (L3) rule. `None` fields are wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkRuleKey {
    pub address: AddressId,
    pub direction: Direction,
    pub method: Option<Method>,
    pub api: ApiDescriptor,
}

impl WildcardKey for NetworkRuleKey {
    type Dim = NetworkDim;

    fn wildcard(&mut self, dim: NetworkDim) {
        match dim {
            NetworkDim::Method => self.method = None,
            NetworkDim::Path => self.api.path = None,
        }
    }
}

/// Key of an identity (L7) rule. `None` fields are wildcards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityRuleKey {
    pub workload: Option<WorkloadId>,
    pub role: Option<RoleId>,
    pub group: Group,
    pub direction: Direction,
    pub method: Option<Method>,
    pub api: ApiDescriptor,
}

impl WildcardKey for IdentityRuleKey {
    type Dim = IdentityDim;

    fn wildcard(&mut self, dim: IdentityDim) {
        match dim {
            IdentityDim::Workload => self.workload = None,
            IdentityDim::Role => self.role = None,
            IdentityDim::App => self.group.app = None,
            IdentityDim::Env => self.group.env = None,
            IdentityDim::Loc => self.group.loc = None,
            IdentityDim::Method => self.method = None,
            IdentityDim::Path => self.api.path = None,
        }
    }
}
