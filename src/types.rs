use std::fmt;
use std::net::IpAddr;

use crate::error::PolicyError;
use crate::policy::RuleSpec;

/// Service type for HTTP APIs
pub const SERVICE_HTTP: u8 = 1;

/// IANA protocol number for TCP
pub const PROTO_TCP: u8 = 6;

/// IANA protocol number for UDP
pub const PROTO_UDP: u8 = 17;

/// Opaque identifier for a registered IPv4 prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressId(pub u64);

/// Sequential identifier for a registered URI pattern, starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathId(pub u32);

/// Workload identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkloadId(pub u64);

/// Role identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleId(pub u64);

/// Traffic direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Direction(pub u8);

impl Direction {
    pub const ANY: Direction = Direction(0);
    pub const INGRESS: Direction = Direction(1);
    pub const EGRESS: Direction = Direction(2);

    /// Parse a direction name (`any`, `ingress`, `egress`) or number
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "any" => Some(Self::ANY),
            "ingress" | "in" => Some(Self::INGRESS),
            "egress" | "out" => Some(Self::EGRESS),
            other => other.parse().ok().map(Direction),
        }
    }
}

/// Request method (HTTP verbs numbered from 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Method(pub u8);

impl Method {
    pub const GET: Method = Method(1);
    pub const HEAD: Method = Method(2);
    pub const POST: Method = Method(3);
    pub const PUT: Method = Method(4);
    pub const DELETE: Method = Method(5);
    pub const CONNECT: Method = Method(6);
    pub const OPTIONS: Method = Method(7);
    pub const TRACE: Method = Method(8);
    pub const PATCH: Method = Method(9);

    /// Parse an HTTP verb (case-insensitive) or a method number
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::GET),
            "HEAD" => Some(Self::HEAD),
            "POST" => Some(Self::POST),
            "PUT" => Some(Self::PUT),
            "DELETE" => Some(Self::DELETE),
            "CONNECT" => Some(Self::CONNECT),
            "OPTIONS" => Some(Self::OPTIONS),
            "TRACE" => Some(Self::TRACE),
            "PATCH" => Some(Self::PATCH),
            other => other.parse().ok().map(Method),
        }
    }
}

/// API endpoint at protocol + path granularity.
///
/// `path: None` is a path wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApiDescriptor {
    /// Service type (e.g. [`SERVICE_HTTP`])
    pub service: u8,
    /// Transport protocol number
    pub protocol: u8,
    /// Port number
    pub port: u16,
    /// Registered URI pattern
    pub path: Option<PathId>,
}

impl ApiDescriptor {
    pub fn new(service: u8, protocol: u8, port: u16, path: Option<PathId>) -> Self {
        Self {
            service,
            protocol,
            port,
            path,
        }
    }
}

/// Group facets qualifying a role. `None` is a wildcard facet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Group {
    pub app: Option<u64>,
    pub env: Option<u64>,
    pub loc: Option<u64>,
}

impl Group {
    /// Group with every facet present
    pub fn new(app: u64, env: u64, loc: u64) -> Self {
        Self {
            app: Some(app),
            env: Some(env),
            loc: Some(loc),
        }
    }
}

/// Caller descriptor for a decision request
#[derive(Debug, Clone)]
pub struct Client {
    pub ip: IpAddr,
    pub workload: Option<WorkloadId>,
    pub role: Option<RoleId>,
    pub group: Group,
}

impl Client {
    /// A network-only client (no identity)
    pub fn from_ip(ip: IpAddr) -> Self {
        Self {
            ip,
            workload: None,
            role: None,
            group: Group::default(),
        }
    }

    pub fn with_workload(mut self, workload: WorkloadId) -> Self {
        self.workload = Some(workload);
        self
    }

    pub fn with_role(mut self, role: RoleId, group: Group) -> Self {
        self.role = Some(role);
        self.group = group;
        self
    }

    /// Whether the client carries a workload or role identity
    pub fn has_identity(&self) -> bool {
        self.workload.is_some() || self.role.is_some()
    }
}

/// Rule verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Pass,
    Drop,
}

impl Action {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pass" | "allow" => Some(Action::Pass),
            "drop" | "deny" => Some(Action::Drop),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Pass => write!(f, "pass"),
            Action::Drop => write!(f, "drop"),
        }
    }
}

/// Snapshot of a matched rule: its action and the hit count after this match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleAttr {
    pub action: Action,
    pub hits: u64,
}

/// Parsed text rule before it is applied
#[derive(Debug, Clone)]
pub struct TextRule {
    /// Verdict
    pub action: Action,
    /// Rule key fields
    pub spec: RuleSpec,
    /// Line number in the rule text (for error reporting)
    pub line_num: usize,
}

/// Network rule priority chain, consulted in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// All chains in lookup order
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            other => other.parse::<u8>().ok().and_then(|n| Priority::try_from(n).ok()),
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = PolicyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Priority::High),
            1 => Ok(Priority::Medium),
            2 => Ok(Priority::Low),
            n => Err(PolicyError::InvalidPriority(n)),
        }
    }
}
