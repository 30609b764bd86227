//! Static ABI decoding of the five log families the reserve mirror consumes.
//!
//! The decoder is pure: a raw log either maps to a [`PoolEvent`] or to
//! `None` (unrecognized). A topic0 collision with an unrelated event that
//! fails body decoding is also unrecognized, never an error.

mod factory;
mod pool;

pub use factory::{PairCreated, PoolCreated};
pub use pool::{Burn, CollectProtocol, Mint, Swap, Sync};

use alloy_primitives::{Address, Log, I256, U256};
use alloy_sol_types::SolEvent;

/// A decoded pool or factory log, carrying exactly the fields the registry
/// needs to mutate reserves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// New v2 pair.
    PairCreated { token0: Address, token1: Address, pair: Address },
    /// New v3 pool.
    PoolCreated { token0: Address, token1: Address, fee: u32, pool: Address },
    /// Signed reserve deltas (v3).
    Swap { amount0: I256, amount1: I256 },
    /// Positive deltas, added.
    Mint { amount0: U256, amount1: U256 },
    /// Positive deltas, subtracted.
    Burn { amount0: U256, amount1: U256 },
    /// Positive deltas, subtracted.
    CollectProtocol { amount0: U256, amount1: U256 },
    /// Absolute reserve replacement (v2).
    Sync { reserve0: U256, reserve1: U256 },
}

/// Decode a raw log into a [`PoolEvent`], or `None` when the log belongs to
/// none of the known families.
pub fn decode_pool_event(log: &Log) -> Option<PoolEvent> {
    let topic0 = log.topics().first()?;

    match *topic0 {
        sig if sig == PairCreated::SIGNATURE_HASH => {
            PairCreated::decode_log(log).ok().map(|ev| PoolEvent::PairCreated {
                token0: ev.token0,
                token1: ev.token1,
                pair: ev.pair,
            })
        }
        sig if sig == PoolCreated::SIGNATURE_HASH => {
            PoolCreated::decode_log(log).ok().map(|ev| PoolEvent::PoolCreated {
                token0: ev.token0,
                token1: ev.token1,
                fee: ev.fee.to::<u32>(),
                pool: ev.pool,
            })
        }
        sig if sig == Swap::SIGNATURE_HASH => Swap::decode_log(log)
            .ok()
            .map(|ev| PoolEvent::Swap { amount0: ev.amount0, amount1: ev.amount1 }),
        sig if sig == Mint::SIGNATURE_HASH => Mint::decode_log(log)
            .ok()
            .map(|ev| PoolEvent::Mint { amount0: ev.amount0, amount1: ev.amount1 }),
        sig if sig == Burn::SIGNATURE_HASH => Burn::decode_log(log)
            .ok()
            .map(|ev| PoolEvent::Burn { amount0: ev.amount0, amount1: ev.amount1 }),
        sig if sig == CollectProtocol::SIGNATURE_HASH => {
            CollectProtocol::decode_log(log).ok().map(|ev| PoolEvent::CollectProtocol {
                amount0: U256::from(ev.amount0),
                amount1: U256::from(ev.amount1),
            })
        }
        sig if sig == Sync::SIGNATURE_HASH => Sync::decode_log(log).ok().map(|ev| PoolEvent::Sync {
            reserve0: ev.reserve0.to::<U256>(),
            reserve1: ev.reserve1.to::<U256>(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, aliases::U112, b256, LogData, Signed, Uint};
    use alloy_sol_types::SolEvent;

    fn pool_addr() -> Address {
        address!("1111111111111111111111111111111111111111")
    }

    #[test]
    fn decodes_sync() {
        let ev = Sync {
            reserve0: U112::from(500u64),
            reserve1: U112::from(700u64),
        };
        let log = Log::new(pool_addr(), vec![Sync::SIGNATURE_HASH], ev.encode_data().into())
            .expect("valid log");

        let decoded = decode_pool_event(&log).expect("recognized");
        assert_eq!(
            decoded,
            PoolEvent::Sync { reserve0: U256::from(500u64), reserve1: U256::from(700u64) }
        );
    }

    #[test]
    fn decodes_signed_swap() {
        let ev = Swap {
            sender: pool_addr(),
            recipient: pool_addr(),
            amount0: I256::try_from(-5i64).unwrap(),
            amount1: I256::try_from(9i64).unwrap(),
            sqrtPriceX96: Uint::<160, 3>::from(1u64),
            liquidity: 1u128,
            tick: Signed::<24, 1>::ZERO,
        };
        let log = Log::new(
            pool_addr(),
            vec![
                Swap::SIGNATURE_HASH,
                pool_addr().into_word(),
                pool_addr().into_word(),
            ],
            ev.encode_data().into(),
        )
        .expect("valid log");

        match decode_pool_event(&log).expect("recognized") {
            PoolEvent::Swap { amount0, amount1 } => {
                assert!(amount0.is_negative());
                assert_eq!(amount1, I256::try_from(9i64).unwrap());
            }
            other => panic!("expected swap, got {other:?}"),
        }
    }

    #[test]
    fn decodes_pair_created() {
        let t0 = address!("2222222222222222222222222222222222222222");
        let t1 = address!("3333333333333333333333333333333333333333");
        let ev = PairCreated {
            token0: t0,
            token1: t1,
            pair: pool_addr(),
            allPairsLength: U256::from(42u64),
        };
        let log = Log::new(
            crate::constants::UNISWAP_V2_FACTORY,
            vec![PairCreated::SIGNATURE_HASH, t0.into_word(), t1.into_word()],
            ev.encode_data().into(),
        )
        .expect("valid log");

        assert_eq!(
            decode_pool_event(&log),
            Some(PoolEvent::PairCreated { token0: t0, token1: t1, pair: pool_addr() })
        );
    }

    #[test]
    fn unknown_topic_is_unrecognized() {
        let log = Log::new(
            pool_addr(),
            vec![b256!("00000000000000000000000000000000000000000000000000000000deadbeef")],
            vec![].into(),
        )
        .expect("valid log");
        assert_eq!(decode_pool_event(&log), None);
    }

    #[test]
    fn matching_topic_with_malformed_body_is_unrecognized() {
        // Right signature hash, body too short to decode.
        let log = LogData::new(vec![Sync::SIGNATURE_HASH], vec![0u8; 3].into())
            .map(|data| Log { address: pool_addr(), data })
            .expect("valid log");
        assert_eq!(decode_pool_event(&log), None);
    }

    #[test]
    fn topicless_log_is_unrecognized() {
        let log = Log::new(pool_addr(), vec![], vec![].into()).expect("valid log");
        assert_eq!(decode_pool_event(&log), None);
    }
}
