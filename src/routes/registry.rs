//! Route resolution
//!
//! Maps a `(source, destination)` pair onto a route direction, rejecting
//! anything that does not pass through the hub EVM chain.

use crate::error::BridgeError;
use crate::types::{BridgeRoute, ChainKind};

/// The two supported directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDirection {
    SvmToEvm,
    EvmToSvm,
}

/// Resolves a route to its direction.
///
/// Every accepted route includes the hub chain: SVM chains are never hubs,
/// so a passing mixed route always has its EVM endpoint on the hub.
pub fn resolve_direction(route: &BridgeRoute) -> Result<RouteDirection, BridgeError> {
    if route.source == route.destination {
        return Err(BridgeError::UnsupportedRoute {
            route: route.key(),
            reason: "source and destination are the same chain".into(),
        });
    }
    if !route.includes_hub() {
        return Err(BridgeError::UnsupportedRoute {
            route: route.key(),
            reason: "route does not include the hub chain".into(),
        });
    }
    match (route.source.kind(), route.destination.kind()) {
        (ChainKind::Svm, ChainKind::Evm) => Ok(RouteDirection::SvmToEvm),
        (ChainKind::Evm, ChainKind::Svm) => Ok(RouteDirection::EvmToSvm),
        (source, destination) => Err(BridgeError::UnsupportedRoute {
            route: route.key(),
            reason: format!("no adapter for {source:?} -> {destination:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainId;

    fn route(source: &str, destination: &str) -> BridgeRoute {
        BridgeRoute::new(
            ChainId::parse(source).unwrap(),
            ChainId::parse(destination).unwrap(),
        )
    }

    /// Test that both hub directions resolve
    #[test]
    fn test_hub_routes_resolve() {
        assert_eq!(
            resolve_direction(&route("solana:mainnet", "eip155:8453")).unwrap(),
            RouteDirection::SvmToEvm
        );
        assert_eq!(
            resolve_direction(&route("eip155:8453", "solana:mainnet")).unwrap(),
            RouteDirection::EvmToSvm
        );
        // Testnet hub is equally valid.
        assert_eq!(
            resolve_direction(&route("eip155:84532", "solana:devnet")).unwrap(),
            RouteDirection::EvmToSvm
        );
    }

    /// Test that routes skipping the hub are rejected
    /// Why: the hub-and-spoke invariant is load-bearing for the protocol
    #[test]
    fn test_non_hub_routes_rejected() {
        let err = resolve_direction(&route("solana:mainnet", "eip155:1")).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_ROUTE");

        let err = resolve_direction(&route("eip155:10", "solana:mainnet")).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_ROUTE");
    }

    /// Test that same-kind pairs have no adapter even via the hub
    #[test]
    fn test_same_kind_rejected() {
        let err = resolve_direction(&route("eip155:1", "eip155:8453")).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_ROUTE");

        let err = resolve_direction(&route("solana:mainnet", "solana:devnet")).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_ROUTE");
    }

    /// Test that degenerate self-routes are rejected
    #[test]
    fn test_self_route_rejected() {
        let err = resolve_direction(&route("eip155:8453", "eip155:8453")).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_ROUTE");
    }
}
