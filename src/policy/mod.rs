//! Rule storage and the decision engine.

mod engine;
pub mod fallback;
mod key;
mod rule;
mod table;

pub use engine::{EngineStats, PolicyEngine};
pub use key::{IdentityRuleKey, NetworkRuleKey};
pub use rule::RuleSpec;
pub use table::{IdentityRuleTable, NetworkChains, NetworkRuleTable, RuleTable};
