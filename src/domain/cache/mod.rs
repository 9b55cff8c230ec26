//! Cache domain - result caching abstraction

mod key;
mod repository;

pub use key::{
    round_param, CacheKeyGenerator, CacheKeyParams, DigestKeyGenerator, DIGEST_HEX_LENGTH,
    KEY_DECIMAL_PLACES,
};
pub use repository::{Cache, CacheExt};

#[cfg(test)]
pub use repository::mock::MockCache;
