//! Follow graph mutations and queries
//!
//! Every change to `follower_ids` / `following_ids` goes through this service.
//! An edge is committed to both account records in one versioned write; a
//! version mismatch means another writer got there first, so the whole
//! read-check-commit cycle is retried with backoff.

use rand::seq::SliceRandom;
use resilience::{retry_if, RetryConfig, RetryError};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{Account, AccountSummary, FollowCounts, Page, PageRequest};
use crate::error::{AppError, Result};
use crate::metrics::{record_mutation, GRAPH_COMMIT_RETRIES_TOTAL};
use crate::repository::{CommitOutcome, EdgeChange, EdgeOp, SocialStore};

#[derive(Clone)]
pub struct FollowGraphService {
    store: Arc<dyn SocialStore>,
    retry: RetryConfig,
}

impl FollowGraphService {
    pub fn new(store: Arc<dyn SocialStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// `actor_id` starts following `target_id`.
    pub async fn follow(&self, actor_id: Uuid, target_id: Uuid) -> Result<()> {
        self.mutate("follow", EdgeOp::Add, actor_id, target_id).await
    }

    pub async fn unfollow(&self, actor_id: Uuid, target_id: Uuid) -> Result<()> {
        self.mutate("unfollow", EdgeOp::Remove, actor_id, target_id).await
    }

    /// `account_id` drops `follower_id` from its followers.
    pub async fn remove_follower(&self, account_id: Uuid, follower_id: Uuid) -> Result<()> {
        self.mutate("remove_follower", EdgeOp::Remove, follower_id, account_id).await
    }

    pub async fn counts(&self, account_id: Uuid) -> Result<FollowCounts> {
        let account = self.require_account(account_id).await?;
        Ok(FollowCounts {
            followers: account.follower_ids.len() as u64,
            following: account.following_ids.len() as u64,
        })
    }

    /// Followers of `account_id`, most recent edge first.
    pub async fn list_followers(
        &self,
        account_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<AccountSummary>> {
        let account = self.require_account(account_id).await?;
        self.summaries_page(&account.follower_ids, page).await
    }

    /// Accounts `account_id` follows, most recent edge first.
    pub async fn list_following(
        &self,
        account_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<AccountSummary>> {
        let account = self.require_account(account_id).await?;
        self.summaries_page(&account.following_ids, page).await
    }

    /// PUBLIC accounts the caller does not follow yet, in random order.
    pub async fn suggestions(&self, account_id: Uuid, limit: usize) -> Result<Vec<AccountSummary>> {
        let account = self.require_account(account_id).await?;

        let mut exclude = Vec::with_capacity(account.following_ids.len() + 1);
        exclude.push(account.id);
        exclude.extend_from_slice(&account.following_ids);

        let mut candidates = self.store.list_public_accounts(&exclude, limit).await?;
        candidates.shuffle(&mut rand::thread_rng());

        Ok(candidates.iter().map(Account::summary).collect())
    }

    async fn require_account(&self, id: Uuid) -> Result<Account> {
        self.store
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {}", id)))
    }

    async fn summaries_page(
        &self,
        edge_ids: &[Uuid],
        page: PageRequest,
    ) -> Result<Page<AccountSummary>> {
        // edge lists are append-ordered; newest edge is last
        let page_ids: Vec<Uuid> = edge_ids
            .iter()
            .rev()
            .skip(page.offset())
            .take(page.limit())
            .copied()
            .collect();

        let accounts = self.store.get_accounts(&page_ids).await?;
        let items = accounts.iter().map(Account::summary).collect();

        Ok(Page::new(items, edge_ids.len() as u64, page))
    }

    async fn mutate(
        &self,
        operation: &'static str,
        op: EdgeOp,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> Result<()> {
        let result = self.commit_with_retry(op, follower_id, followee_id).await;

        match &result {
            Ok(()) => {
                record_mutation(operation, "ok");
                info!(
                    operation,
                    follower = %follower_id,
                    followee = %followee_id,
                    "follow graph updated"
                );
            }
            Err(e) => {
                record_mutation(operation, e.code());
                debug!(
                    operation,
                    follower = %follower_id,
                    followee = %followee_id,
                    error = %e,
                    "follow graph mutation rejected"
                );
            }
        }

        result
    }

    async fn commit_with_retry(
        &self,
        op: EdgeOp,
        follower_id: Uuid,
        followee_id: Uuid,
    ) -> Result<()> {
        if follower_id == followee_id {
            return Err(AppError::SelfFollow);
        }

        let outcome = retry_if(self.retry.clone(), AppError::is_stale_write, || {
            self.try_commit(op, follower_id, followee_id)
        })
        .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(RetryError::Permanent(e)) => Err(e),
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!(
                    follower = %follower_id,
                    followee = %followee_id,
                    attempts,
                    error = %last,
                    "edge commit kept conflicting"
                );
                Err(AppError::Conflict(format!(
                    "follow graph busy, gave up after {} attempts",
                    attempts
                )))
            }
        }
    }

    /// One read-check-commit cycle.
    async fn try_commit(&self, op: EdgeOp, follower_id: Uuid, followee_id: Uuid) -> Result<()> {
        let follower = self.require_account(follower_id).await?;
        let followee = self.require_account(followee_id).await?;

        match (op, follower.follows(followee_id)) {
            (EdgeOp::Add, true) => return Err(AppError::AlreadyFollowing),
            (EdgeOp::Remove, false) => return Err(AppError::NotFollowing),
            _ => {}
        }

        let change = EdgeChange {
            op,
            follower_id,
            followee_id,
            follower_version: follower.graph_version,
            followee_version: followee.graph_version,
        };

        match self.store.commit_edge(change).await? {
            CommitOutcome::Applied => Ok(()),
            CommitOutcome::Conflict => {
                GRAPH_COMMIT_RETRIES_TOTAL.inc();
                Err(AppError::StaleWrite(format!(
                    "edge {} -> {} changed concurrently",
                    follower_id, followee_id
                )))
            }
        }
    }
}
