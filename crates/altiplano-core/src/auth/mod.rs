//! Authentication: the persisted token cache and the gate that every
//! controller operation consults before building its request.

mod gate;
mod token_cache;

pub use gate::{AuthError, AuthGate, Authenticator, Credentials, LoginResponse};
pub use token_cache::{
    CacheInfo, CacheWriteError, CachedCredential, Clock, SystemClock, TokenCache,
    DEFAULT_TOKEN_LIFETIME_SECS,
};
