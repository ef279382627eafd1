//! pumpfun_bonding parser: single-sided bonding curve priced off virtual
//! reserves rather than paired deposits.

use super::layouts::read_u64_le;
use crate::clock::LogicalTime;
use crate::model::{Completeness, DexKind, Pool, PoolState, SourceTier};

mod offset {
    pub const VIRTUAL_SOL_RESERVES: usize = 0;
    pub const VIRTUAL_TOKEN_RESERVES: usize = 8;
}

pub fn parse_account(pool: &Pool, data: &[u8], slot: u64) -> Option<PoolState> {
    let virtual_sol_reserves = read_u64_le(data, offset::VIRTUAL_SOL_RESERVES)?;
    let virtual_token_reserves = read_u64_le(data, offset::VIRTUAL_TOKEN_RESERVES)?;

    if virtual_sol_reserves == 0 || virtual_token_reserves == 0 {
        return None;
    }

    Some(PoolState {
        pool: pool.address,
        base_reserve: virtual_token_reserves as u128,
        quote_reserve: virtual_sol_reserves as u128,
        sqrt_price_q64: None,
        at: LogicalTime::now(slot),
        source_sig: None,
        confidence: DexKind::PumpfunBonding.account_confidence(),
        tier: SourceTier::StreamAccount,
        completeness: Completeness::Full,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DexKind as DK, Mint, PoolAddress};

    fn pool() -> Pool {
        Pool {
            address: PoolAddress([5; 32]),
            dex_kind: DK::PumpfunBonding,
            base_mint: Mint([2; 32]),
            quote_mint: Mint([3; 32]),
            base_decimals: 6,
            quote_decimals: 9,
        }
    }

    #[test]
    fn virtual_reserves_become_pool_state() {
        let mut data = vec![0u8; 16];
        data[0..8].copy_from_slice(&30_000_000_000u64.to_le_bytes());
        data[8..16].copy_from_slice(&800_000_000_000u64.to_le_bytes());

        let state = parse_account(&pool(), &data, 7).unwrap();
        assert_eq!(state.quote_reserve, 30_000_000_000);
        assert_eq!(state.base_reserve, 800_000_000_000);
        assert_eq!(state.confidence, DK::PumpfunBonding.account_confidence());
    }

    #[test]
    fn zero_reserves_are_rejected() {
        let data = vec![0u8; 16];
        assert!(parse_account(&pool(), &data, 7).is_none());
    }
}
