//! HTTP cache control module

/// Seconds a served image may be cached
pub const IMAGE_MAX_AGE: u32 = 86_400;

/// Cache policy applied to served images
pub const IMAGE_CACHE_POLICY: CachePolicy = CachePolicy::Immutable(IMAGE_MAX_AGE);

/// Cache control policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Public cache that never revalidates within max-age
    Immutable(u32),
    /// No store
    NoStore,
}

impl CachePolicy {
    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> String {
        match self {
            Self::Immutable(max_age) => format!("public, max-age={max_age}, immutable"),
            Self::NoStore => "no-store".to_string(),
        }
    }
}
