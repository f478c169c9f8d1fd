use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;

use crate::cidr::parse_cidr;
use crate::config::EngineOptions;
use crate::error::{NotFoundKind, PolicyError, Result};
use crate::parser::{parse_rules, parse_rules_from_file};
use crate::registry::{AddressRegistry, PathRegistry};
use crate::types::{
    Action, ApiDescriptor, Client, Direction, Method, PathId, Priority, RuleAttr, TextRule,
};

use super::fallback::{variants, NETWORK_LATTICE, ROLE_LATTICE, WORKLOAD_LATTICE};
use super::key::{IdentityRuleKey, NetworkRuleKey};
use super::rule::RuleSpec;
use super::table::{IdentityRuleTable, NetworkChains, NetworkRuleTable};

/// Access-control decision engine.
///
/// Owns both registries and both rule universes. Construct once and share
/// by reference or `Arc`; every operation takes `&self`.
///
/// Decisions take each table's read lock per lookup and never hold a lock
/// across the whole fallback walk, so concurrent edits may or may not be
/// visible part way through a decision.
#[derive(Debug)]
pub struct PolicyEngine {
    addresses: AddressRegistry,
    paths: PathRegistry,
    chains: NetworkChains,
    identities: IdentityRuleTable,
}

impl PolicyEngine {
    /// Create an engine with default options.
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            addresses: AddressRegistry::with_capacity(options.address_capacity),
            paths: PathRegistry::with_capacity(
                options.case_insensitive_paths,
                options.match_cache_size,
                options.path_capacity,
            ),
            chains: NetworkChains::with_capacity(options.rule_capacity),
            identities: IdentityRuleTable::with_capacity(options.rule_capacity),
        }
    }

    pub fn addresses(&self) -> &AddressRegistry {
        &self.addresses
    }

    pub fn paths(&self) -> &PathRegistry {
        &self.paths
    }

    pub fn chain(&self, priority: Priority) -> &NetworkRuleTable {
        self.chains.chain(priority)
    }

    pub fn identities(&self) -> &IdentityRuleTable {
        &self.identities
    }

    /// Find the most specific rule for a request and count a hit on it.
    ///
    /// Clients without workload or role are matched against the network
    /// chains, everyone else against the identity table. `Ok(None)` is a
    /// miss. Network decisions for IPv6 clients fail with
    /// [`PolicyError::UnsupportedAddressFamily`].
    pub fn decide(
        &self,
        client: &Client,
        direction: Direction,
        method: Method,
        api: &ApiDescriptor,
    ) -> Result<Option<RuleAttr>> {
        if client.has_identity() {
            Ok(self.decide_identity(client, direction, method, api))
        } else {
            self.decide_network(client.ip, direction, method, api)
        }
    }

    fn decide_network(
        &self,
        ip: IpAddr,
        direction: Direction,
        method: Method,
        api: &ApiDescriptor,
    ) -> Result<Option<RuleAttr>> {
        let addresses = self.addresses.lookup(ip)?;
        if addresses.is_empty() {
            return Ok(None);
        }

        for (priority, chain) in self.chains.iter() {
            if chain.is_empty() {
                continue;
            }
            for address in &addresses {
                let base = NetworkRuleKey {
                    address: *address,
                    direction,
                    method: Some(method),
                    api: *api,
                };
                let found = variants(&base, NETWORK_LATTICE).find_map(|k| chain.lookup(&k));
                if let Some(attr) = found {
                    tracing::trace!(
                        ?priority,
                        address = address.0,
                        action = %attr.action,
                        "network rule matched"
                    );
                    return Ok(Some(attr));
                }
            }
        }
        Ok(None)
    }

    fn decide_identity(
        &self,
        client: &Client,
        direction: Direction,
        method: Method,
        api: &ApiDescriptor,
    ) -> Option<RuleAttr> {
        let base = IdentityRuleKey {
            workload: client.workload,
            role: client.role,
            group: client.group,
            direction,
            method: Some(method),
            api: *api,
        };
        let lattice = if client.workload.is_some() {
            WORKLOAD_LATTICE
        } else {
            ROLE_LATTICE
        };
        let found = variants(&base, lattice).find_map(|k| self.identities.lookup(&k));
        found
    }

    /// Insert or replace a rule, registering its CIDR and URI as needed.
    ///
    /// Replacing a rule resets its hit count. A new or changed URI is not
    /// matchable by [`build_api_descriptors`](Self::build_api_descriptors)
    /// until [`commit`](Self::commit). A malformed CIDR or a URI that does
    /// not compile is rejected before anything is registered.
    pub fn add_rule(&self, spec: &RuleSpec, action: Action) -> Result<()> {
        let net = parse_cidr(&spec.cidr)?;
        if let Some(uri) = spec.uri_pattern() {
            self.paths.validate(uri)?;
        }
        let path = spec.uri_pattern().map(|uri| self.paths.add_or_get(uri));

        if spec.has_identity() {
            self.identities.upsert(spec.identity_key(path), action);
            tracing::debug!(
                workload = ?spec.workload,
                role = ?spec.role,
                %action,
                "added identity rule"
            );
        } else {
            let address = self
                .addresses
                .get_or_create(IpAddr::V4(net.addr()), net.prefix_len())?;
            self.chains
                .chain(spec.priority)
                .upsert(spec.network_key(address, path), action);
            tracing::debug!(
                priority = ?spec.priority,
                cidr = %net,
                %action,
                "added network rule"
            );
        }
        Ok(())
    }

    /// Remove a rule. Fails with [`PolicyError::NotFound`] if its URI, its
    /// prefix or the rule itself is unknown.
    pub fn delete_rule(&self, spec: &RuleSpec) -> Result<()> {
        let net = parse_cidr(&spec.cidr)?;
        let path = match spec.uri_pattern() {
            Some(uri) => Some(self.paths.find(uri).ok_or_else(|| {
                PolicyError::not_found(
                    NotFoundKind::Uri,
                    format!("uri '{}' is not registered", uri),
                )
            })?),
            None => None,
        };

        let removed = if spec.has_identity() {
            self.identities.delete(&spec.identity_key(path))
        } else {
            let address = self
                .addresses
                .get(IpAddr::V4(net.addr()), net.prefix_len())?
                .ok_or_else(|| {
                    PolicyError::not_found(
                        NotFoundKind::Address,
                        format!("prefix {} is not registered", net.trunc()),
                    )
                })?;
            self.chains
                .chain(spec.priority)
                .delete(&spec.network_key(address, path))
        };

        match removed {
            Some(old) => {
                tracing::debug!(action = %old.action, hits = old.hits, "deleted rule");
                Ok(())
            }
            None => Err(PolicyError::not_found(
                NotFoundKind::Rule,
                "no rule matches the given key",
            )),
        }
    }

    /// Remove every rule, empty both registries and publish an empty matcher.
    pub fn delete_all(&self) {
        for (_, chain) in self.chains.iter() {
            chain.clear();
        }
        self.addresses.clear();
        self.identities.clear();
        self.paths.reset();
        tracing::info!("cleared all rules and registries");
    }

    /// Rebuild and publish the URI matcher from the registered URIs.
    pub fn commit(&self) -> Result<()> {
        self.paths.commit()
    }

    /// One descriptor per registered URI pattern found in `request_path`.
    pub fn build_api_descriptors(
        &self,
        service: u8,
        protocol: u8,
        port: u16,
        request_path: &str,
    ) -> Vec<ApiDescriptor> {
        let mut seen: HashSet<PathId> = HashSet::new();
        self.paths
            .scan(request_path.as_bytes())
            .into_iter()
            .filter(|m| seen.insert(m.path))
            .map(|m| ApiDescriptor::new(service, protocol, port, Some(m.path)))
            .collect()
    }

    /// Parse rule text, add every rule and commit once.
    ///
    /// Returns the number of rules loaded. Nothing is added if parsing fails.
    pub fn load_rules(&self, text: &str) -> Result<usize> {
        let rules = parse_rules(text)?;
        self.apply_text_rules(&rules)
    }

    /// Like [`load_rules`](Self::load_rules), reading from a file.
    pub fn load_rules_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let rules = parse_rules_from_file(path)?;
        self.apply_text_rules(&rules)
    }

    fn apply_text_rules(&self, rules: &[TextRule]) -> Result<usize> {
        let at_line = |rule: &TextRule, e: PolicyError| PolicyError::ParseErrorAtLine {
            line: rule.line_num,
            message: e.to_string(),
        };

        // Reject the whole batch before registering any of it
        for rule in rules {
            if let Some(uri) = rule.spec.uri_pattern() {
                self.paths.validate(uri).map_err(|e| at_line(rule, e))?;
            }
        }
        for rule in rules {
            self.add_rule(&rule.spec, rule.action)
                .map_err(|e| at_line(rule, e))?;
        }
        self.commit()?;
        tracing::info!(rules = rules.len(), "loaded rules");
        Ok(rules.len())
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            network: Priority::ALL.map(|p| self.chains.chain(p).len()),
            identity: self.identities.len(),
            addresses: self.addresses.len(),
            paths: self.paths.len(),
        }
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Table and registry sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Network rules per chain, in [`Priority::ALL`] order
    pub network: [usize; 3],
    pub identity: usize,
    pub addresses: usize,
    pub paths: usize,
}

impl EngineStats {
    pub fn total_rules(&self) -> usize {
        self.network.iter().sum::<usize>() + self.identity
    }
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [high, medium, low] = self.network;
        write!(
            f,
            "policy-len: network( {} {} {} ), identity( {} ), addresses( {} ), paths( {} )",
            high, medium, low, self.identity, self.addresses, self.paths
        )
    }
}
