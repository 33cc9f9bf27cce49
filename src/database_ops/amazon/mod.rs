pub mod provider;
pub mod response;
pub mod signer;
pub mod throttle;

pub use provider::{AmazonProvider, MAX_ITEMS_PER_REQUEST};
pub use throttle::{RateLimitSettings, RequestThrottle};
