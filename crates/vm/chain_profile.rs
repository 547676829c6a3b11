use crate::errors::TraceError;
use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use tracing::debug;
use txtrace_levm::environment::{ChainRuleset, Fork, OpStackRules, VMType};

/// Which ruleset family a chain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    Base,
    OpStack,
}

/// A chain the tracer knows about, pinned to one protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainProfile {
    pub chain_id: u64,
    pub name: &'static str,
    pub family: ChainFamily,
    pub fork: Fork,
}

/// Fork used for OP-Stack chains that are not in the table.
const GENERIC_OP_STACK_FORK: Fork = Fork::Prague;

const fn profile(
    chain_id: u64,
    name: &'static str,
    family: ChainFamily,
    fork: Fork,
) -> ChainProfile {
    ChainProfile {
        chain_id,
        name,
        family,
        fork,
    }
}

const KNOWN_CHAIN_LIST: &[ChainProfile] = &[
    profile(1, "mainnet", ChainFamily::Base, Fork::Prague),
    profile(11155111, "sepolia", ChainFamily::Base, Fork::Prague),
    profile(17000, "holesky", ChainFamily::Base, Fork::Prague),
    profile(560048, "hoodi", ChainFamily::Base, Fork::Prague),
    profile(137, "polygon", ChainFamily::Base, Fork::Prague),
    profile(42161, "arbitrum-one", ChainFamily::Base, Fork::Prague),
    profile(43114, "avalanche-c", ChainFamily::Base, Fork::Cancun),
    profile(56, "bsc", ChainFamily::Base, Fork::Prague),
    profile(10, "optimism", ChainFamily::OpStack, Fork::Prague),
    profile(8453, "base", ChainFamily::OpStack, Fork::Prague),
    profile(11155420, "optimism-sepolia", ChainFamily::OpStack, Fork::Prague),
    profile(84532, "base-sepolia", ChainFamily::OpStack, Fork::Prague),
    profile(7777777, "zora", ChainFamily::OpStack, Fork::Prague),
    profile(34443, "mode", ChainFamily::OpStack, Fork::Prague),
    profile(130, "unichain", ChainFamily::OpStack, Fork::Prague),
];

lazy_static! {
    static ref KNOWN_CHAINS: FxHashMap<u64, ChainProfile> = KNOWN_CHAIN_LIST
        .iter()
        .map(|profile| (profile.chain_id, *profile))
        .collect();
}

/// Builds the chain table. Calling it is optional and calling it again does nothing.
pub fn init() {
    lazy_static::initialize(&KNOWN_CHAINS);
}

pub fn lookup(chain_id: u64) -> Option<&'static ChainProfile> {
    KNOWN_CHAINS.get(&chain_id)
}

/// Selects the ruleset for a request.
///
/// With `op_stack` set the OP-Stack rules always apply, using the chain's pinned fork when the
/// chain is known. Without it the chain must be known and runs the plain Ethereum rules.
pub fn resolve(chain_id: u64, op_stack: bool) -> Result<ChainRuleset, TraceError> {
    let profile = lookup(chain_id);

    let ruleset = match (profile, op_stack) {
        (Some(profile), true) => {
            ChainRuleset::for_fork(profile.fork, VMType::OpStack(OpStackRules::ECOTONE))
        }
        (None, true) => ChainRuleset::for_fork(
            GENERIC_OP_STACK_FORK,
            VMType::OpStack(OpStackRules::ECOTONE),
        ),
        (Some(profile), false) => ChainRuleset::for_fork(profile.fork, VMType::L1),
        (None, false) => {
            debug!(chain_id, "Unknown chain without OP-Stack flag");
            return Err(TraceError::UnsupportedChain(chain_id));
        }
    };

    debug!(
        chain_id,
        chain = profile.map(|profile| profile.name).unwrap_or("unknown"),
        fork = ?ruleset.fork,
        op_stack,
        "Resolved chain ruleset"
    );
    Ok(ruleset)
}
