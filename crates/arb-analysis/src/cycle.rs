//! Closed-cycle classification of one transaction's swaps.
//!
//! A transaction is flagged as atomic arbitrage when its swaps form one
//! continuous directed hop-chain that starts and ends on the same token
//! and nets to zero in every token except one, the profit. Four
//! conditions are tested together:
//!
//! 1. path continuity: each hop consumes the token the previous hop
//!    produced, and the chain closes on itself;
//! 2. flow loop: at least one token appears both as a chain input and a
//!    chain output;
//! 3. matching endpoints: the first hop's input token is the last hop's
//!    output token;
//! 4. conservation: all but exactly one net balance change are zero.
//!
//! Net changes are keyed by token address; symbols appear only in the
//! rendered path and the profit-token field, so distinct tokens sharing
//! a symbol never merge. Classification is a pure function of the
//! bundle: no shared state, safe to run on bundles in any order or in
//! parallel. A non-match is the expected outcome for most transactions,
//! not an error.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use arb_data::types::Token;

use crate::swap::{Swap, SwapBundle};

/// How the conservation condition treats "zero".
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConservationMode {
    /// Bit-exact `== 0.0`, as in the reference heuristic. Brittle under
    /// accumulated rounding; kept for regression comparisons.
    Exact,
    /// Zero within `epsilon` of the token's gross traded magnitude
    /// across the transaction.
    Relative {
        /// Relative tolerance, e.g. `1e-9`.
        epsilon: f64,
    },
}

impl Default for ConservationMode {
    fn default() -> Self {
        ConservationMode::Relative { epsilon: 1e-9 }
    }
}

/// Classifier options.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClassifierConfig {
    /// Conservation comparison mode.
    pub conservation: ConservationMode,
}

/// One classified arbitrage transaction.
#[derive(Clone, Debug)]
pub struct CycleReport {
    /// Transaction hash.
    pub transaction_hash: B256,
    /// Block number.
    pub block_number: u64,
    /// Transaction index within the block.
    pub transaction_index: u64,
    /// Chain id.
    pub chain_id: u64,
    /// The single token with a non-zero net balance change.
    pub profit_token: Arc<Token>,
    /// Net amount of the profit token, normalized units.
    pub profit_amount: f64,
    /// Hop path rendered with token symbols, e.g. `WETH->USDC->WETH`.
    pub path: String,
    /// Sorted distinct event senders across the transaction's swaps.
    pub senders: Vec<Address>,
    /// Sorted distinct event recipients across the transaction's swaps.
    pub recipients: Vec<Address>,
    /// Net balance change per token address.
    pub balance_changes: HashMap<Address, f64>,
}

/// Classify one bundle. Returns `None` for the (majority) non-arbitrage
/// case.
pub fn classify(bundle: &SwapBundle, config: &ClassifierConfig) -> Option<CycleReport> {
    // The bundler sorts by log index already, but emission order is a
    // correctness precondition of the path walk, so never assume it.
    let mut ordered: Vec<&Swap> = bundle.swaps.iter().collect();
    ordered.sort_by_key(|s| s.log_index);
    let (first, last) = match (ordered.first(), ordered.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return None,
    };

    // Net and gross traded magnitude per token, in first-touch order so
    // the profit pick below is deterministic.
    let mut net: HashMap<Address, f64> = HashMap::new();
    let mut gross: HashMap<Address, f64> = HashMap::new();
    let mut token_order: Vec<Address> = Vec::new();
    let mut tokens: HashMap<Address, Arc<Token>> = HashMap::new();
    for swap in &ordered {
        let deltas = [
            (&swap.pool.token0, swap.user_delta_t0),
            (&swap.pool.token1, swap.user_delta_t1),
        ];
        for (token, delta) in deltas {
            if !tokens.contains_key(&token.address) {
                tokens.insert(token.address, Arc::clone(token));
                token_order.push(token.address);
            }
            *net.entry(token.address).or_insert(0.0) += delta;
            *gross.entry(token.address).or_insert(0.0) += delta.abs();
        }
    }

    // Walk the hops: a two-element stack enforces that each swap
    // consumes what the previous one produced, while the in/out sets
    // record which tokens ever enter or leave the chain.
    let mut unbroken = true;
    let mut stack: Vec<Address> = Vec::with_capacity(2);
    let mut ins: HashSet<Address> = HashSet::new();
    let mut outs: HashSet<Address> = HashSet::new();
    for swap in &ordered {
        let token_in = swap.token_in().address;
        let token_out = swap.token_out().address;
        match stack.pop() {
            None => stack.push(token_in),
            Some(top) => {
                if top != token_in {
                    unbroken = false;
                }
            }
        }
        stack.push(token_out);

        outs.insert(token_out);
        if !outs.contains(&token_in) {
            ins.insert(token_in);
        }
    }

    let path_continuous = unbroken && stack.len() == 2 && stack[0] == stack[1];
    let has_flow_loop = ins.intersection(&outs).next().is_some();
    let endpoints_close = first.token_in().address == last.token_out().address;

    let zero_count = token_order
        .iter()
        .filter(|address| is_zero(config.conservation, net[*address], gross[*address]))
        .count();
    let conserves_all_but_one = zero_count + 1 == token_order.len();

    if !(path_continuous && has_flow_loop && endpoints_close && conserves_all_but_one) {
        return None;
    }

    let profit_address = token_order
        .iter()
        .copied()
        .find(|address| !is_zero(config.conservation, net[address], gross[address]))?;

    let mut path = first.token_in().symbol.clone();
    let mut senders: BTreeSet<Address> = BTreeSet::new();
    let mut recipients: BTreeSet<Address> = BTreeSet::new();
    for swap in &ordered {
        path.push_str("->");
        path.push_str(&swap.token_out().symbol);
        senders.insert(swap.sender);
        recipients.insert(swap.recipient);
    }

    Some(CycleReport {
        transaction_hash: bundle.transaction_hash,
        block_number: bundle.block_number,
        transaction_index: bundle.transaction_index,
        chain_id: bundle.chain_id,
        profit_token: Arc::clone(&tokens[&profit_address]),
        profit_amount: net[&profit_address],
        path,
        senders: senders.into_iter().collect(),
        recipients: recipients.into_iter().collect(),
        balance_changes: net,
    })
}

fn is_zero(mode: ConservationMode, net: f64, gross: f64) -> bool {
    match mode {
        ConservationMode::Exact => net == 0.0,
        ConservationMode::Relative { epsilon } => net.abs() <= epsilon * gross,
    }
}
