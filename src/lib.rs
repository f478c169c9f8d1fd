//! ACL Policy - an in-process L3/L7 access-control decision engine
//!
//! This library decides PASS/DROP for connections and requests and counts
//! hits per rule:
//! - Network (L3) rules keyed by IPv4 prefix, in High/Medium/Low chains
//! - Identity (L7) rules keyed by workload or role + group
//! - Method, direction and API (service, protocol, port, URI) qualifiers
//! - Specificity-ordered wildcard fallback
//! - URI classification through a hot-swapped multi-pattern matcher
//!
//! # Example
//!
//! ```rust
//! use acl_policy_r::{Action, Client, Direction, Method, PolicyEngine, Priority, RuleSpec};
//!
//! let engine = PolicyEngine::new();
//!
//! let rule = RuleSpec::network(Priority::High, "10.0.0.0/8")
//!     .with_direction(Direction::INGRESS)
//!     .with_method(Method::GET)
//!     .with_api(1, 6, 80)
//!     .with_uri("/orders");
//! engine.add_rule(&rule, Action::Pass).unwrap();
//! engine.commit().unwrap();
//!
//! // Classify the request path, then decide on each matching API
//! let client = Client::from_ip("10.1.2.3".parse().unwrap());
//! for api in engine.build_api_descriptors(1, 6, 80, "/orders/42") {
//!     let decision = engine
//!         .decide(&client, Direction::INGRESS, Method::GET, &api)
//!         .unwrap();
//!     assert_eq!(decision.map(|attr| attr.action), Some(Action::Pass));
//! }
//! ```
//!
//! # Rule Syntax
//!
//! Rules can also be loaded in bulk from text:
//! ```text
//! action(key=value, ...)
//! ```
//!
//! | Key | Example | Description |
//! |-----|---------|-------------|
//! | `prio` | `high`, `medium`, `low` | Network rule chain |
//! | `cidr` | `10.0.0.0/8` | IPv4 prefix of a network rule |
//! | `workload` | `42` | Workload identity |
//! | `role` | `7` | Role identity |
//! | `group` | `1/2/*` | Role group app/env/loc |
//! | `dir` | `ingress`, `egress`, `any` | Direction |
//! | `method` | `get`, `*` | Request method |
//! | `api` | `http/tcp/80` | Service type/protocol/port |
//! | `uri` | `/orders/.*` | URI pattern (must be last) |
//!
//! Omitted qualifiers and `*` are wildcards.

pub mod cidr;
pub mod config;
pub mod error;
pub mod parser;
pub mod policy;
pub mod registry;
pub mod types;

// Re-export commonly used items
pub use cidr::parse_cidr;
pub use config::{EngineOptions, DEFAULT_CAPACITY, DEFAULT_MATCH_CACHE_SIZE};
pub use error::{NotFoundKind, PolicyError, Result};
pub use parser::{parse_rules, parse_rules_from_file};
pub use policy::{
    EngineStats, IdentityRuleKey, IdentityRuleTable, NetworkRuleKey, NetworkRuleTable,
    PolicyEngine, RuleSpec, RuleTable,
};
pub use registry::{AddressRegistry, PathMatch, PathMatcher, PathRegistry};
pub use types::{
    Action, AddressId, ApiDescriptor, Client, Direction, Group, Method, PathId, Priority, RoleId,
    RuleAttr, TextRule, WorkloadId, PROTO_TCP, PROTO_UDP, SERVICE_HTTP,
};
