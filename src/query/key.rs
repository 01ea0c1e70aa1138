//! Query identities
//!
//! A cached result is keyed by the query kind plus its parameter.

use std::fmt;

/// Kinds of cached queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKind {
    RecentPosts,
    InfinitePosts,
    PostById,
    UserPosts,
    SearchPosts,
    CurrentUser,
    Users,
    UserById,
}

impl QueryKind {
    pub const ALL: [QueryKind; 8] = [
        QueryKind::RecentPosts,
        QueryKind::InfinitePosts,
        QueryKind::PostById,
        QueryKind::UserPosts,
        QueryKind::SearchPosts,
        QueryKind::CurrentUser,
        QueryKind::Users,
        QueryKind::UserById,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecentPosts => "getRecentPosts",
            Self::InfinitePosts => "getInfinitePosts",
            Self::PostById => "getPostById",
            Self::UserPosts => "getUserPosts",
            Self::SearchPosts => "searchPosts",
            Self::CurrentUser => "getCurrentUser",
            Self::Users => "getUsers",
            Self::UserById => "getUserById",
        }
    }
}

/// Identity of one cached result
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub kind: QueryKind,
    pub param: Option<String>,
}

impl QueryKey {
    pub fn new(kind: QueryKind, param: Option<String>) -> Self {
        Self { kind, param }
    }

    pub fn recent_posts() -> Self {
        Self::new(QueryKind::RecentPosts, None)
    }

    pub fn infinite_posts() -> Self {
        Self::new(QueryKind::InfinitePosts, None)
    }

    pub fn post_by_id(post_id: &str) -> Self {
        Self::new(QueryKind::PostById, Some(post_id.to_string()))
    }

    pub fn user_posts(user_id: &str) -> Self {
        Self::new(QueryKind::UserPosts, Some(user_id.to_string()))
    }

    pub fn search_posts(term: &str) -> Self {
        Self::new(QueryKind::SearchPosts, Some(term.to_string()))
    }

    pub fn current_user() -> Self {
        Self::new(QueryKind::CurrentUser, None)
    }

    /// Different limits are cached separately
    pub fn users(limit: Option<usize>) -> Self {
        Self::new(QueryKind::Users, limit.map(|limit| limit.to_string()))
    }

    pub fn user_by_id(user_id: &str) -> Self {
        Self::new(QueryKind::UserById, Some(user_id.to_string()))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "{}:{}", self.kind.as_str(), param),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

/// Selects cached entries to invalidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    /// Every entry of a kind, whatever its parameter
    Kind(QueryKind),
    /// One exact entry
    Exact(QueryKey),
}

impl QueryFilter {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::Kind(kind) => key.kind == *kind,
            Self::Exact(exact) => exact == key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_filter_matches_every_parameter() {
        let filter = QueryFilter::Kind(QueryKind::PostById);
        assert!(filter.matches(&QueryKey::post_by_id("a")));
        assert!(filter.matches(&QueryKey::post_by_id("b")));
        assert!(!filter.matches(&QueryKey::recent_posts()));
    }

    #[test]
    fn exact_filter_matches_one_key() {
        let filter = QueryFilter::Exact(QueryKey::post_by_id("a"));
        assert!(filter.matches(&QueryKey::post_by_id("a")));
        assert!(!filter.matches(&QueryKey::post_by_id("b")));
    }

    #[test]
    fn keys_display_with_parameter() {
        assert_eq!(QueryKey::user_by_id("u1").to_string(), "getUserById:u1");
        assert_eq!(QueryKey::current_user().to_string(), "getCurrentUser");
        assert_eq!(QueryKey::users(Some(10)).to_string(), "getUsers:10");
    }
}
