//! Read-through caching for quarry repositories.
//!
//! [`CachingRepository`] wraps any [`ReadRepository`](quarry_repository::ReadRepository)
//! and memoizes its read terminal operations in a [`CacheStore`].
//!
//! # Keys
//! A [`CacheKey`] is `{identity}%{method}%{digest}`: the repository identity,
//! the [`ReadMethod`] name and a BLAKE3 digest of the pending query state,
//! pagination bounds and call arguments. The same read against the same state
//! always lands on the same key.
//!
//! # Policy
//! A [`CachePolicy`] decides per method whether to cache and for how long.
//! Its [`CacheSwitch`] can be flipped at runtime and is shared by every clone
//! of the policy.
//!
//! # Stores
//! - [`MemoryCache`]: a map in process memory.
//! - [`FileCache`]: one file per entry under a root directory.

mod decorator;
pub mod error;
mod key;
mod policy;
pub mod store;

pub use crate::decorator::CachingRepository;
pub use crate::key::CacheKey;
pub use crate::policy::{CachePolicy, CacheSwitch, DEFAULT_TTL_SECS, ReadMethod};
pub use crate::store::{CacheHandle, CacheStore, FileCache, MemoryCache};
