use alloy_sol_types::sol;

sol! {
    /// v3 swap. `amount0`/`amount1` are signed deltas from the pool's
    /// perspective: positive means the pool received that token.
    #[derive(Debug)]
    event Swap(
        address indexed sender,
        address indexed recipient,
        int256 amount0,
        int256 amount1,
        uint160 sqrtPriceX96,
        uint128 liquidity,
        int24 tick
    );

    /// v3 liquidity add.
    #[derive(Debug)]
    event Mint(
        address sender,
        address indexed owner,
        int24 indexed tickLower,
        int24 indexed tickUpper,
        uint128 amount,
        uint256 amount0,
        uint256 amount1
    );

    /// v3 liquidity removal.
    #[derive(Debug)]
    event Burn(
        address indexed owner,
        int24 indexed tickLower,
        int24 indexed tickUpper,
        uint128 amount,
        uint256 amount0,
        uint256 amount1
    );

    /// v3 protocol fee sweep.
    #[derive(Debug)]
    event CollectProtocol(
        address indexed sender,
        address indexed recipient,
        uint128 amount0,
        uint128 amount1
    );

    /// v2 reserve checkpoint. Absolute values, not deltas; authoritative for
    /// constant-product pools.
    #[derive(Debug)]
    event Sync(
        uint112 reserve0,
        uint112 reserve1
    );
}
