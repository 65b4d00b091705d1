//! Pool price reads.
//!
//! Both pools are read concurrently and each reading is normalized with the
//! formula configured for its pool. A failed read is an error; there is no
//! fallback price.

use alloy::{providers::ProviderBuilder, sol};
use price_discrepancy_lib::{PriceSnapshot, RawSlot0};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{PipelineConfig, PoolConfig};
use crate::error::PipelineError;

sol! {
    #[sol(rpc)]
    interface IUniswapV3PoolState {
        function slot0() external view returns (
            uint160 sqrtPriceX96,
            int24 tick,
            uint16 observationIndex,
            uint16 observationCardinality,
            uint16 observationCardinalityNext,
            uint8 feeProtocol,
            bool unlocked
        );
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriceReadError {
    #[error("{pool} pool: invalid rpc url '{url}'")]
    InvalidUrl { pool: String, url: String },

    #[error("{pool} pool: slot0 read failed: {message}")]
    Call { pool: String, message: String },
}

/// Read `slot0().sqrtPriceX96` from one pool.
pub async fn read_slot0(pool: &PoolConfig) -> Result<RawSlot0, PriceReadError> {
    let url = pool.rpc_url.parse().map_err(|_| PriceReadError::InvalidUrl {
        pool: pool.label.clone(),
        url: pool.rpc_url.clone(),
    })?;
    let provider = ProviderBuilder::new().connect_http(url);
    let contract = IUniswapV3PoolState::new(pool.address, &provider);

    let slot0 = contract.slot0().call().await.map_err(|e| PriceReadError::Call {
        pool: pool.label.clone(),
        message: e.to_string(),
    })?;
    info!(pool = %pool.label, address = %pool.address, sqrt_price_x96 = %slot0.sqrtPriceX96, "read slot0");
    Ok(RawSlot0::new(slot0.sqrtPriceX96))
}

/// Read both configured pools at once and build a snapshot.
pub async fn fetch_snapshot(config: &PipelineConfig) -> Result<PriceSnapshot, PipelineError> {
    let [pool_a, pool_b] = &config.pools;
    let (raw_a, raw_b) = tokio::join!(read_slot0(pool_a), read_slot0(pool_b));
    let (raw_a, raw_b) = match (raw_a, raw_b) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "price read failed");
            return Err(e.into());
        }
    };

    let snapshot = PriceSnapshot::compute(
        (&raw_a, &pool_a.formula),
        (&raw_b, &pool_b.formula),
        &config.scaling,
    )?;
    info!(
        price1 = %snapshot.price1,
        price2 = %snapshot.price2,
        difference = %snapshot.difference,
        "price snapshot"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_reported_with_pool_label() {
        let mut config = PipelineConfig::from_lookup(|_| None).unwrap();
        config.pools[1].rpc_url = "not a url".into();
        let err = read_slot0(&config.pools[1]).await.unwrap_err();
        assert_eq!(
            err,
            PriceReadError::InvalidUrl {
                pool: "base".into(),
                url: "not a url".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_pool_fails_the_snapshot() {
        let mut config = PipelineConfig::from_lookup(|_| None).unwrap();
        // Nothing listens on the discard port.
        config.pools[0].rpc_url = "http://127.0.0.1:9".into();
        config.pools[1].rpc_url = "http://127.0.0.1:9".into();
        let err = fetch_snapshot(&config).await.unwrap_err();
        assert!(matches!(err, PipelineError::PriceUnavailable(_)), "{err:?}");
        assert_eq!(err.stage().to_string(), "validation");
    }
}
