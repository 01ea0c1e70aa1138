//! Query cache
//!
//! Cached, invalidatable queries over the domain operations, with cursor
//! pagination for infinite feeds.

mod coordinator;
pub mod invalidation;
pub mod key;
pub mod pagination;

pub use coordinator::{CacheStats, QueryCoordinator, QueryError, QueryObserver, QueryState};
pub use invalidation::{Field, Mutation, MutationPolicy, INVALIDATION_TABLE};
pub use key::{QueryFilter, QueryKey, QueryKind};
pub use pagination::{next_cursor, Identified, InfiniteData, NextPage, Page, PageRequest, PAGE_SIZE};
