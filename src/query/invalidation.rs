//! Invalidation policy
//!
//! Which cached queries each mutation makes stale. The table is data: every
//! mutation declares the fields it writes and the query kinds it
//! invalidates, and every query kind declares the fields it reads. A
//! mutation must invalidate every kind that reads a field it writes; it may
//! invalidate more.

use super::key::{QueryFilter, QueryKey, QueryKind};

/// Mutations run through the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    CreateUserAccount,
    SignInAccount,
    SignOutAccount,
    CreatePost,
    UpdatePost,
    DeletePost,
    LikePost,
    SavePost,
    DeleteSavedPost,
    UpdateUser,
}

impl Mutation {
    pub const ALL: [Mutation; 10] = [
        Mutation::CreateUserAccount,
        Mutation::SignInAccount,
        Mutation::SignOutAccount,
        Mutation::CreatePost,
        Mutation::UpdatePost,
        Mutation::DeletePost,
        Mutation::LikePost,
        Mutation::SavePost,
        Mutation::DeleteSavedPost,
        Mutation::UpdateUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateUserAccount => "create_user_account",
            Self::SignInAccount => "sign_in_account",
            Self::SignOutAccount => "sign_out_account",
            Self::CreatePost => "create_post",
            Self::UpdatePost => "update_post",
            Self::DeletePost => "delete_post",
            Self::LikePost => "like_post",
            Self::SavePost => "save_post",
            Self::DeleteSavedPost => "delete_saved_post",
            Self::UpdateUser => "update_user",
        }
    }

    /// Row of the invalidation table for this mutation
    ///
    /// Rows are stored in declaration order, one per mutation.
    pub fn policy(&self) -> &'static MutationPolicy {
        &INVALIDATION_TABLE[*self as usize]
    }

    /// Cache filters to apply after a successful run
    ///
    /// `subject` is the ID of the entity the mutation changed. Subject-scoped
    /// entries widen to the whole kind when it is unknown.
    pub fn filters(&self, subject: Option<&str>) -> Vec<QueryFilter> {
        self.policy()
            .invalidates
            .iter()
            .map(|invalidation| match (invalidation.scope, subject) {
                (Scope::Subject, Some(id)) => QueryFilter::Exact(QueryKey::new(
                    invalidation.kind,
                    Some(id.to_string()),
                )),
                _ => QueryFilter::Kind(invalidation.kind),
            })
            .collect()
    }
}

/// Data a query exposes and a mutation may change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Which posts exist
    PostMembership,
    /// Caption, image, location, tags
    PostContent,
    PostLikes,
    /// Saved-post records
    PostSaves,
    /// Which users exist
    UserMembership,
    /// Name, username, bio, avatar
    UserProfile,
    /// Who is signed in
    Session,
}

impl QueryKind {
    /// Fields this query's result is built from
    pub fn reads(&self) -> &'static [Field] {
        match self {
            QueryKind::RecentPosts | QueryKind::InfinitePosts | QueryKind::UserPosts => {
                &[Field::PostMembership, Field::PostContent, Field::PostLikes]
            }
            QueryKind::SearchPosts => &[
                Field::PostMembership,
                Field::PostContent,
                Field::PostLikes,
            ],
            QueryKind::PostById => &[Field::PostContent, Field::PostLikes],
            QueryKind::CurrentUser => &[Field::Session, Field::UserProfile, Field::PostSaves],
            QueryKind::Users => &[Field::UserMembership, Field::UserProfile],
            QueryKind::UserById => &[Field::UserProfile],
        }
    }
}

/// How far an invalidation reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every cached entry of the kind
    All,
    /// Only the entry keyed by the mutated entity's ID
    Subject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invalidation {
    pub kind: QueryKind,
    pub scope: Scope,
}

const fn all(kind: QueryKind) -> Invalidation {
    Invalidation {
        kind,
        scope: Scope::All,
    }
}

const fn subject(kind: QueryKind) -> Invalidation {
    Invalidation {
        kind,
        scope: Scope::Subject,
    }
}

/// One row of the invalidation table
#[derive(Debug)]
pub struct MutationPolicy {
    pub mutation: Mutation,
    pub writes: &'static [Field],
    pub invalidates: &'static [Invalidation],
}

impl MutationPolicy {
    pub fn invalidates_kind(&self, kind: QueryKind) -> bool {
        self.invalidates
            .iter()
            .any(|invalidation| invalidation.kind == kind)
    }
}

pub static INVALIDATION_TABLE: [MutationPolicy; Mutation::ALL.len()] = [
    MutationPolicy {
        mutation: Mutation::CreateUserAccount,
        writes: &[Field::UserMembership, Field::UserProfile],
        invalidates: &[
            all(QueryKind::Users),
            subject(QueryKind::UserById),
            all(QueryKind::CurrentUser),
        ],
    },
    MutationPolicy {
        mutation: Mutation::SignInAccount,
        writes: &[Field::Session],
        invalidates: &[all(QueryKind::CurrentUser)],
    },
    MutationPolicy {
        mutation: Mutation::SignOutAccount,
        writes: &[Field::Session],
        invalidates: &[all(QueryKind::CurrentUser)],
    },
    MutationPolicy {
        mutation: Mutation::CreatePost,
        writes: &[Field::PostMembership],
        invalidates: &[
            all(QueryKind::RecentPosts),
            all(QueryKind::InfinitePosts),
            all(QueryKind::UserPosts),
            all(QueryKind::SearchPosts),
        ],
    },
    MutationPolicy {
        mutation: Mutation::UpdatePost,
        writes: &[Field::PostContent],
        invalidates: &[
            subject(QueryKind::PostById),
            all(QueryKind::RecentPosts),
            all(QueryKind::InfinitePosts),
            all(QueryKind::UserPosts),
            all(QueryKind::SearchPosts),
        ],
    },
    MutationPolicy {
        mutation: Mutation::DeletePost,
        writes: &[Field::PostMembership, Field::PostContent],
        invalidates: &[
            all(QueryKind::RecentPosts),
            subject(QueryKind::PostById),
            all(QueryKind::InfinitePosts),
            all(QueryKind::UserPosts),
            all(QueryKind::SearchPosts),
        ],
    },
    MutationPolicy {
        mutation: Mutation::LikePost,
        writes: &[Field::PostLikes],
        invalidates: &[
            subject(QueryKind::PostById),
            all(QueryKind::RecentPosts),
            all(QueryKind::InfinitePosts),
            all(QueryKind::CurrentUser),
            all(QueryKind::UserPosts),
            all(QueryKind::SearchPosts),
        ],
    },
    MutationPolicy {
        mutation: Mutation::SavePost,
        writes: &[Field::PostSaves],
        invalidates: &[
            all(QueryKind::RecentPosts),
            all(QueryKind::InfinitePosts),
            all(QueryKind::CurrentUser),
        ],
    },
    MutationPolicy {
        mutation: Mutation::DeleteSavedPost,
        writes: &[Field::PostSaves],
        invalidates: &[
            all(QueryKind::RecentPosts),
            all(QueryKind::InfinitePosts),
            all(QueryKind::CurrentUser),
        ],
    },
    MutationPolicy {
        mutation: Mutation::UpdateUser,
        writes: &[Field::UserProfile],
        invalidates: &[
            all(QueryKind::CurrentUser),
            subject(QueryKind::UserById),
            all(QueryKind::Users),
        ],
    },
];
