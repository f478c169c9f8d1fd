use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};

use ipnet::Ipv4Net;
use parking_lot::RwLock;

use crate::error::{PolicyError, Result};
use crate::types::AddressId;

/// IPv4 prefix to [`AddressId`] table with longest-prefix-first lookup.
///
/// Keys are normalized prefixes, so `10.1.2.3/8` and `10.0.0.0/8` share an id.
/// Ids come from a monotonic counter and are never reused while the registry
/// lives, including across [`clear`](Self::clear).
#[derive(Debug)]
pub struct AddressRegistry {
    prefixes: RwLock<HashMap<Ipv4Net, AddressId>>,
    next_id: AtomicU64,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            prefixes: RwLock::new(HashMap::with_capacity(capacity)),
            next_id: AtomicU64::new(1),
        }
    }

    /// All ids whose prefix contains `ip`, most specific (/32) first.
    pub fn lookup(&self, ip: IpAddr) -> Result<Vec<AddressId>> {
        let ip = ipv4_of(ip)?;
        let prefixes = self.prefixes.read();
        if prefixes.is_empty() {
            return Ok(Vec::new());
        }

        // Every mask length is looked up; a /32 hit does not hide a /8 hit.
        let ids = (0..=32u8)
            .rev()
            .filter_map(|len| Ipv4Net::new(ip, len).ok())
            .filter_map(|net| prefixes.get(&net.trunc()).copied())
            .collect();
        Ok(ids)
    }

    /// Id of the prefix `ip/mask_len`, minting a new one on first sight.
    pub fn get_or_create(&self, ip: IpAddr, mask_len: u8) -> Result<AddressId> {
        let key = prefix_of(ip, mask_len)?;

        if let Some(id) = self.prefixes.read().get(&key) {
            return Ok(*id);
        }

        let mut prefixes = self.prefixes.write();
        let id = *prefixes.entry(key).or_insert_with(|| {
            let id = AddressId(self.next_id.fetch_add(1, Ordering::Relaxed));
            tracing::debug!(prefix = %key, id = id.0, "registered address prefix");
            id
        });
        Ok(id)
    }

    /// Id of the prefix `ip/mask_len` if it is registered.
    pub fn get(&self, ip: IpAddr, mask_len: u8) -> Result<Option<AddressId>> {
        let key = prefix_of(ip, mask_len)?;
        Ok(self.prefixes.read().get(&key).copied())
    }

    /// Remove the prefix mapping. Rules referencing the id are untouched.
    pub fn delete(&self, ip: IpAddr, mask_len: u8) -> Result<Option<AddressId>> {
        let key = prefix_of(ip, mask_len)?;
        Ok(self.prefixes.write().remove(&key))
    }

    pub fn clear(&self) {
        self.prefixes.write().clear();
    }

    pub fn len(&self) -> usize {
        self.prefixes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AddressRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn ipv4_of(ip: IpAddr) -> Result<Ipv4Addr> {
    match ip {
        IpAddr::V4(v4) => Ok(v4),
        IpAddr::V6(_) => {
            tracing::warn!(%ip, "rejected IPv6 address");
            Err(PolicyError::UnsupportedAddressFamily(ip))
        }
    }
}

fn prefix_of(ip: IpAddr, mask_len: u8) -> Result<Ipv4Net> {
    let ip = ipv4_of(ip)?;
    Ipv4Net::new(ip, mask_len)
        .map(|net| net.trunc())
        .map_err(|_| PolicyError::InvalidCidr(format!("mask length {} exceeds 32", mask_len)))
}
