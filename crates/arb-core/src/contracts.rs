//! Call surface of the external arbitrage executor contract. The contract
//! itself is a deployed black box; only its ABI is modeled here. Reads go
//! through `eth_call`, `startArbitrage` is the one state-changing entry point.

use alloy::sol;

sol! {
    /// Identifies a pool for a reserve read.
    #[derive(Debug)]
    struct ReserveParams {
        address token0;
        address token1;
        address pool;
    }

    /// One priced probe: a cycle of pools, the quoter to use per hop (zero
    /// address for constant-product hops), and the borrow size.
    #[derive(Debug)]
    struct QuoteParams {
        address[] pools;
        address[] quoters;
        uint256 amount;
        address tokenIn;
    }

    function getReserves(ReserveParams params) external view returns (uint256[2] memory reserves);

    function multiGetReserves(ReserveParams[] params) external view returns (uint256[2][] memory reserves);

    /// Each inner array holds the intermediate amounts out along the cycle;
    /// the last element is the reference asset returned.
    function multiQuote(QuoteParams[] params) external returns (uint256[][] memory amounts);

    function startArbitrage(
        address token,
        uint256 amount,
        address[] pools,
        uint256[] poolTypes,
        uint256 minOut,
        uint256 bribePct
    ) external;
}
