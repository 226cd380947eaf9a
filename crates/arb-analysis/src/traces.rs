//! Call-trace filtering for classified transactions.
//!
//! After classification, the interesting question is who else a
//! suspected arbitrage contract talks to. The call tree of a
//! transaction is flattened into positional rows, every address whose
//! observed selectors are all mundane DEX/ERC-20 entry points is
//! ignored, and only calls between the remaining counterparties
//! survive.
//!
//! The ignore baseline is an [`ExclusionSet`]: an immutable value built
//! once per chain (registry pools and tokens plus configured extras)
//! and passed by reference into every filter call.

use std::collections::{HashMap, HashSet};

use alloy::primitives::Address;
use arb_data::rpc::CallFrame;
use arb_data::Registry;

/// Function selectors whose presence alone does not make an address
/// interesting: swaps, transfers, approvals and metadata views emitted
/// by routine DEX traffic.
pub const KNOWN_SELECTORS: &[(&str, &str)] = &[
    ("0xa9059cbb", "erc20_transfer"),
    ("0x23b872dd", "erc20_transferFrom"),
    ("0x70a08231", "erc20_balanceOf"),
    ("0xdd62ed3e", "erc20_allowance"),
    ("0x313ce567", "erc20_decimals"),
    ("0x38ed1739", "univ2_router_swapExactTokensForTokens"),
    ("0x022c0d9f", "univ2_pool_swap"),
    ("0xc04b8d59", "univ3_router_exactInput"),
    ("0x128acb08", "univ3_pool_swap"),
    ("0xfa461e33", "univ3_swap_callback"),
    ("0x654b6487", "ramses_v2_swap_callback"),
    ("0x0dfe1681", "pool_token0"),
    ("0xd21220a7", "pool_token1"),
    ("0xb93f9b0a", "uni_get_address"),
    ("0x5c60da1b", "proxy_implementation"),
];

/// Immutable per-chain baseline of addresses to ignore in traces.
#[derive(Clone, Debug, Default)]
pub struct ExclusionSet {
    addresses: HashSet<Address>,
}

impl ExclusionSet {
    /// Build from an explicit address collection.
    pub fn new(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
        }
    }

    /// Build from a chain's registry (all pool and token contracts)
    /// plus extra configured addresses.
    pub fn for_chain(registry: &Registry, extras: impl IntoIterator<Item = Address>) -> Self {
        let mut addresses = registry.known_addresses();
        addresses.extend(extras);
        Self { addresses }
    }

    /// Whether an address is in the baseline.
    pub fn contains(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    /// Number of baseline addresses.
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Whether the baseline is empty.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// One flattened frame of a transaction call tree.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatCall {
    /// Positional path of the frame within the tree, e.g. `0_2_1`.
    pub depth_path: String,
    /// Caller address.
    pub from: Address,
    /// Callee address.
    pub to: Address,
    /// 4-byte function selector, 0x-prefixed lowercase hex.
    pub selector: String,
    /// Gas used by the frame.
    pub gas_used: u64,
}

/// Flatten a callTracer frame tree depth-first into positional rows.
///
/// Frames with missing or unparseable `from`/`to`/`input` are dropped;
/// their children are still visited.
pub fn flatten_call_tree(root: &CallFrame) -> Vec<FlatCall> {
    let mut calls = Vec::new();
    flatten_frame(root, "0", &mut calls);
    calls
}

fn flatten_frame(frame: &CallFrame, path: &str, calls: &mut Vec<FlatCall>) {
    if let Some(call) = parse_frame(frame, path) {
        calls.push(call);
    }
    for (index, child) in frame.calls.iter().enumerate() {
        let child_path = format!("{path}_{index}");
        flatten_frame(child, &child_path, calls);
    }
}

fn parse_frame(frame: &CallFrame, path: &str) -> Option<FlatCall> {
    let from = frame.from.as_deref()?.parse::<Address>().ok()?;
    let to = frame.to.as_deref()?.parse::<Address>().ok()?;
    let input = frame.input.as_deref()?;
    if input.len() < 10 {
        return None;
    }
    let selector = input[..10].to_ascii_lowercase();
    let gas_used = frame
        .gas_used
        .as_deref()
        .and_then(|gas| u64::from_str_radix(gas.trim_start_matches("0x"), 16).ok())
        .unwrap_or(0);
    Some(FlatCall {
        depth_path: path.to_string(),
        from,
        to,
        selector,
        gas_used,
    })
}

/// Keep only calls between counterparties that are neither excluded nor
/// explainable by well-known selectors alone.
pub fn filter_interesting_calls(calls: &[FlatCall], exclusions: &ExclusionSet) -> Vec<FlatCall> {
    let known: HashSet<&str> = KNOWN_SELECTORS.iter().map(|(selector, _)| *selector).collect();

    // Every selector each address was seen with, on either side of a call.
    let mut observed: HashMap<Address, HashSet<&str>> = HashMap::new();
    for call in calls {
        observed.entry(call.from).or_default().insert(call.selector.as_str());
        observed.entry(call.to).or_default().insert(call.selector.as_str());
    }

    let boring: HashSet<Address> = observed
        .iter()
        .filter(|(_, selectors)| selectors.iter().all(|s| known.contains(s)))
        .map(|(address, _)| *address)
        .collect();

    calls
        .iter()
        .filter(|call| {
            let ignore = |address: &Address| exclusions.contains(address) || boring.contains(address);
            !ignore(&call.from) && !ignore(&call.to)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn frame(from: u8, to: u8, selector: &str, calls: Vec<CallFrame>) -> CallFrame {
        CallFrame {
            from: Some(format!("{:#x}", addr(from))),
            to: Some(format!("{:#x}", addr(to))),
            input: Some(format!("{selector}deadbeef")),
            gas_used: Some("0x5208".to_string()),
            calls,
        }
    }

    #[test]
    fn flatten_assigns_positional_paths() {
        let tree = frame(
            1,
            2,
            "0x128acb08",
            vec![
                frame(2, 3, "0xa9059cbb", vec![]),
                frame(2, 4, "0xfa461e33", vec![frame(4, 5, "0x23b872dd", vec![])]),
            ],
        );

        let calls = flatten_call_tree(&tree);
        let paths: Vec<&str> = calls.iter().map(|c| c.depth_path.as_str()).collect();
        assert_eq!(paths, vec!["0", "0_0", "0_1", "0_1_0"]);
        assert_eq!(calls[0].gas_used, 21000);
    }

    #[test]
    fn flatten_skips_incomplete_frames_but_visits_children() {
        let mut broken = frame(1, 2, "0x128acb08", vec![frame(2, 3, "0xa9059cbb", vec![])]);
        broken.to = None;

        let calls = flatten_call_tree(&broken);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].depth_path, "0_0");
    }

    #[test]
    fn addresses_with_only_known_selectors_are_boring() {
        // 5 is a helper that only ever transfers; 1 and 9 trade through
        // a custom selector.
        let calls = vec![
            FlatCall {
                depth_path: "0".to_string(),
                from: addr(1),
                to: addr(9),
                selector: "0x12345678".to_string(),
                gas_used: 0,
            },
            FlatCall {
                depth_path: "0_0".to_string(),
                from: addr(9),
                to: addr(5),
                selector: "0xa9059cbb".to_string(),
                gas_used: 0,
            },
        ];

        let interesting = filter_interesting_calls(&calls, &ExclusionSet::default());
        assert_eq!(interesting.len(), 1);
        assert_eq!(interesting[0].depth_path, "0");
    }

    #[test]
    fn excluded_addresses_filter_their_calls() {
        let calls = vec![FlatCall {
            depth_path: "0".to_string(),
            from: addr(1),
            to: addr(2),
            selector: "0x12345678".to_string(),
            gas_used: 0,
        }];

        let exclusions = ExclusionSet::new([addr(2)]);
        assert!(filter_interesting_calls(&calls, &exclusions).is_empty());

        let unrelated = ExclusionSet::new([addr(7)]);
        assert_eq!(filter_interesting_calls(&calls, &unrelated).len(), 1);
    }
}
