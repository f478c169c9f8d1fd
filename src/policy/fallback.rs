//! Fallback key generation.
//!
//! A lattice is a list of blocks. Each block names the dimensions that vary
//! (every present/wildcard subset is visited) and the dimensions that are
//! always wildcarded. Within a block, subsets are visited from most to least
//! specific: by number of present dimensions descending, then by the bitmask
//! of present dimensions ascending (bit `i` = `vary[i]`).
//!
//! With `vary = [Method, Path]` that yields full, path wildcarded, method
//! wildcarded, both wildcarded.

/// A key whose fields can be wildcarded one dimension at a time.
pub trait WildcardKey: Clone {
    type Dim: Copy + 'static;

    /// Replace the field for `dim` with its wildcard.
    fn wildcard(&mut self, dim: Self::Dim);
}

/// Wildcardable dimensions of a network rule key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkDim {
    Method,
    Path,
}

/// Wildcardable dimensions of an identity rule key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityDim {
    Workload,
    Role,
    App,
    Env,
    Loc,
    Method,
    Path,
}

/// One block of a fallback lattice
#[derive(Debug)]
pub struct Block<D: 'static> {
    pub vary: &'static [D],
    pub wildcard: &'static [D],
}

/// Per address id, within one priority chain.
pub const NETWORK_LATTICE: &[Block<NetworkDim>] = &[Block {
    vary: &[NetworkDim::Method, NetworkDim::Path],
    wildcard: &[],
}];

/// Clients identified by workload.
///
/// The client's exact key is tried first. Every later key drops role and
/// group, so workload rules match clients that also carry a role.
pub const WORKLOAD_LATTICE: &[Block<IdentityDim>] = &[
    Block {
        vary: &[],
        wildcard: &[],
    },
    Block {
        vary: &[IdentityDim::Workload, IdentityDim::Method, IdentityDim::Path],
        wildcard: &[
            IdentityDim::Role,
            IdentityDim::App,
            IdentityDim::Env,
            IdentityDim::Loc,
        ],
    },
];

const ROLE_DIMS: &[IdentityDim] = &[
    IdentityDim::Role,
    IdentityDim::App,
    IdentityDim::Env,
    IdentityDim::Loc,
];

/// Clients identified by role.
///
/// A partially specified role/group is never combined with method and path
/// both wildcarded; only the terminal catch-all wildcards everything.
pub const ROLE_LATTICE: &[Block<IdentityDim>] = &[
    Block {
        vary: ROLE_DIMS,
        wildcard: &[],
    },
    Block {
        vary: ROLE_DIMS,
        wildcard: &[IdentityDim::Method],
    },
    Block {
        vary: ROLE_DIMS,
        wildcard: &[IdentityDim::Path],
    },
    Block {
        vary: &[],
        wildcard: &[
            IdentityDim::Workload,
            IdentityDim::Role,
            IdentityDim::App,
            IdentityDim::Env,
            IdentityDim::Loc,
            IdentityDim::Method,
            IdentityDim::Path,
        ],
    },
];

/// Present-dimension bitmasks over `n` dimensions, most specific first.
fn present_masks(n: usize) -> impl Iterator<Item = u32> {
    (0..=n).rev().flat_map(move |present| {
        (0..(1u32 << n)).filter(move |mask| mask.count_ones() as usize == present)
    })
}

/// Lazily generate the fallback keys of `base`, in visiting order.
pub fn variants<'a, K: WildcardKey>(
    base: &'a K,
    lattice: &'a [Block<K::Dim>],
) -> impl Iterator<Item = K> + 'a {
    lattice.iter().flat_map(move |block| {
        present_masks(block.vary.len()).map(move |mask| {
            let mut key = base.clone();
            for dim in block.wildcard {
                key.wildcard(*dim);
            }
            for (i, dim) in block.vary.iter().enumerate() {
                if mask & (1 << i) == 0 {
                    key.wildcard(*dim);
                }
            }
            key
        })
    })
}
