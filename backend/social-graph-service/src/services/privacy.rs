//! Privacy policy evaluation
//!
//! Every content-visibility path (feed, user posts, hashtag posts, single post,
//! comments, reactions) asks this module and nothing else.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::domain::{Account, Post, PrivacyTier};
use crate::error::{AppError, Result};
use crate::repository::AuthorScope;

/// Why a viewer was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    /// Non-public content and no authenticated viewer
    RequiresAuth,
    NotFollowing,
    Private,
    /// Mutation attempted by someone other than the owner
    NotOwner,
}

impl DenialReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::RequiresAuth => "REQUIRES_AUTH",
            DenialReason::NotFollowing => "NOT_FOLLOWING",
            DenialReason::Private => "PRIVATE",
            DenialReason::NotOwner => "NOT_OWNER",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            DenialReason::RequiresAuth => "authentication required",
            DenialReason::NotFollowing => "only followers can see this content",
            DenialReason::Private => "this content is private",
            DenialReason::NotOwner => "only the owner can modify this resource",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Allowed,
    Denied(DenialReason),
}

impl Visibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Visibility::Allowed)
    }

    pub fn into_result(self) -> Result<()> {
        match self {
            Visibility::Allowed => Ok(()),
            Visibility::Denied(reason) => Err(AppError::Forbidden(reason)),
        }
    }
}

/// Decide whether `viewer` may see content of `subject_id` at `tier`.
///
/// Rules are checked in order: self, PUBLIC, unauthenticated, FRIENDS_ONLY
/// membership, PRIVATE.
pub fn evaluate(
    viewer: Option<Uuid>,
    subject_id: Uuid,
    tier: PrivacyTier,
    viewer_is_follower: bool,
) -> Visibility {
    if viewer == Some(subject_id) {
        return Visibility::Allowed;
    }
    if tier == PrivacyTier::Public {
        return Visibility::Allowed;
    }
    if viewer.is_none() {
        return Visibility::Denied(DenialReason::RequiresAuth);
    }
    match tier {
        PrivacyTier::FriendsOnly if viewer_is_follower => Visibility::Allowed,
        PrivacyTier::FriendsOnly => Visibility::Denied(DenialReason::NotFollowing),
        _ => Visibility::Denied(DenialReason::Private),
    }
}

/// The stricter of the post's own tier and its author's account tier.
pub fn effective_tier(author_tier: PrivacyTier, post_tier: PrivacyTier) -> PrivacyTier {
    author_tier.max(post_tier)
}

fn viewer_follows(viewer: Option<Uuid>, author: &Account) -> bool {
    viewer.map(|v| author.is_followed_by(v)).unwrap_or(false)
}

pub fn check_post(viewer: Option<Uuid>, author: &Account, post: &Post) -> Visibility {
    evaluate(
        viewer,
        author.id,
        effective_tier(author.privacy_tier, post.privacy_tier),
        viewer_follows(viewer, author),
    )
}

/// `Forbidden(reason)` unless the viewer may see the post.
pub fn ensure_post_visible(viewer: Option<Uuid>, author: &Account, post: &Post) -> Result<()> {
    check_post(viewer, author, post).into_result()
}

/// Post tiers of `author` that pass evaluation for `viewer`.
///
/// Lets the store filter posts by tier without materialising denied ones.
pub fn visible_post_tiers(viewer: Option<Uuid>, author: &Account) -> Vec<PrivacyTier> {
    let follows = viewer_follows(viewer, author);
    PrivacyTier::ALL
        .into_iter()
        .filter(|tier| {
            evaluate(
                viewer,
                author.id,
                effective_tier(author.privacy_tier, *tier),
                follows,
            )
            .is_allowed()
        })
        .collect()
}

/// `None` when nothing by this author is visible to the viewer.
pub fn author_scope(viewer: Option<Uuid>, author: &Account) -> Option<AuthorScope> {
    let tiers = visible_post_tiers(viewer, author);
    if tiers.is_empty() {
        None
    } else {
        Some(AuthorScope {
            author_id: author.id,
            tiers,
        })
    }
}

/// Owner-only mutations (edit/delete post, delete comment).
pub fn ensure_owner(actor_id: Uuid, owner_id: Uuid) -> Result<()> {
    if actor_id == owner_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(DenialReason::NotOwner))
    }
}
