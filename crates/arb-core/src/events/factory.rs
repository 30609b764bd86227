use alloy_sol_types::sol;

sol! {
    /// Emitted by the v2 factory for every new constant-product pair. The
    /// final field is the running pair count; we only need the address.
    #[derive(Debug)]
    event PairCreated(
        address indexed token0,
        address indexed token1,
        address pair,
        uint256 allPairsLength
    );

    /// Emitted by the v3 factory for every new concentrated-liquidity pool.
    #[derive(Debug)]
    event PoolCreated(
        address indexed token0,
        address indexed token1,
        uint24 indexed fee,
        int24 tickSpacing,
        address pool
    );
}
