use super::{
    CommitOutcome, EdgeChange, EdgeOp, PostQuery, SocialStore, StoreError, StoreResult,
};
use crate::domain::{
    Account, Comment, Hashtag, Post, PrivacyTier, ReactionCount, ReactionToggle, ReactionType,
    Story, StoryContentType, ViewOutcome,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str = "id, username, profile_pic, bio, privacy_tier, follower_ids, \
     following_ids, graph_version, created_at";

const POST_COLUMNS: &str = "p.id, p.author_id, p.content, p.images, p.videos, p.privacy_tier, \
     p.hashtags, p.mentioned_account_ids, p.created_at, p.updated_at";

const STORY_COLUMNS: &str = "s.id, s.author_id, s.content, s.content_type, s.background_color, \
     s.duration_secs, s.created_at, s.expires_at, \
     ARRAY(SELECT v.viewer_id FROM story_views v WHERE v.story_id = s.id) AS views";

/// Visibility + tag filter shared by the page and count queries of `query_posts`.
const POST_FILTER: &str = r#"
    (
        EXISTS (
            SELECT 1 FROM UNNEST($1::uuid[], $2::text[]) AS scope(author_id, tier)
            WHERE scope.author_id = p.author_id AND scope.tier = p.privacy_tier
        )
        OR ($3 AND p.privacy_tier = 'PUBLIC' AND a.privacy_tier = 'PUBLIC')
    )
    AND ($4::text IS NULL OR EXISTS (
        SELECT 1 FROM UNNEST(p.hashtags) AS h(tag) WHERE lower(h.tag) = $4
    ))
"#;

const FOLLOWER_SIDE_SQL: &str = r#"
    UPDATE accounts
    SET following_ids = CASE
            WHEN $3 THEN CASE WHEN $2 = ANY(following_ids) THEN following_ids
                              ELSE array_append(following_ids, $2) END
            ELSE array_remove(following_ids, $2)
        END,
        graph_version = graph_version + 1,
        updated_at = NOW()
    WHERE id = $1 AND graph_version = $4
"#;

const FOLLOWEE_SIDE_SQL: &str = r#"
    UPDATE accounts
    SET follower_ids = CASE
            WHEN $3 THEN CASE WHEN $2 = ANY(follower_ids) THEN follower_ids
                              ELSE array_append(follower_ids, $2) END
            ELSE array_remove(follower_ids, $2)
        END,
        graph_version = graph_version + 1,
        updated_at = NOW()
    WHERE id = $1 AND graph_version = $4
"#;

/// PostgreSQL-backed store (source of truth in production)
#[derive(Clone)]
pub struct PostgresSocialStore {
    pool: PgPool,
}

impl PostgresSocialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Classify driver errors: unique and foreign-key violations, serialization
/// failures and deadlocks get their own variants so callers can react to them.
fn classify(err: sqlx::Error, what: &str) -> StoreError {
    let code = err
        .as_database_error()
        .and_then(|db_err| db_err.code())
        .map(|c| c.to_string());
    match code.as_deref() {
        Some("23505") => StoreError::UniqueViolation(what.to_string()),
        Some("23503") => StoreError::MissingReference(what.to_string()),
        Some("40001") | Some("40P01") => StoreError::Contention(format!("{}: {}", what, err)),
        _ => StoreError::Database(err),
    }
}

/// Add 1 to each `(key, display)` counter; the display form is only set on insert.
async fn upsert_hashtags(
    conn: &mut PgConnection,
    tags: &[(String, String)],
) -> StoreResult<Vec<Hashtag>> {
    let mut updated = Vec::with_capacity(tags.len());
    for (key, display) in tags {
        let row = sqlx::query(
            r#"
            INSERT INTO hashtags (tag, display_tag, count, created_at, updated_at)
            VALUES ($1, $2, 1, NOW(), NOW())
            ON CONFLICT (tag) DO UPDATE
            SET count = hashtags.count + 1, updated_at = NOW()
            RETURNING tag, display_tag, count
            "#,
        )
        .bind(key)
        .bind(display)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| classify(e, "hashtag"))?;
        updated.push(row_to_hashtag(&row)?);
    }
    Ok(updated)
}

fn parse_tier(raw: &str) -> StoreResult<PrivacyTier> {
    PrivacyTier::try_from(raw).map_err(|_| StoreError::Corrupt(format!("privacy tier {}", raw)))
}

fn row_to_account(row: &PgRow) -> StoreResult<Account> {
    let tier: String = row.try_get("privacy_tier")?;
    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        profile_pic: row.try_get("profile_pic")?,
        bio: row.try_get("bio")?,
        privacy_tier: parse_tier(&tier)?,
        follower_ids: row.try_get("follower_ids")?,
        following_ids: row.try_get("following_ids")?,
        graph_version: row.try_get("graph_version")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_post(row: &PgRow) -> StoreResult<Post> {
    let tier: String = row.try_get("privacy_tier")?;
    Ok(Post {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        content: row.try_get("content")?,
        images: row.try_get("images")?,
        videos: row.try_get("videos")?,
        privacy_tier: parse_tier(&tier)?,
        hashtags: row.try_get("hashtags")?,
        mentioned_account_ids: row.try_get("mentioned_account_ids")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_comment(row: &PgRow) -> StoreResult<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        author_id: row.try_get("author_id")?,
        text: row.try_get("text")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_story(row: &PgRow) -> StoreResult<Story> {
    let content_type: String = row.try_get("content_type")?;
    let views: Vec<Uuid> = row.try_get("views")?;
    Ok(Story {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        content: row.try_get("content")?,
        content_type: StoryContentType::try_from(content_type.as_str())
            .map_err(|_| StoreError::Corrupt(format!("story type {}", content_type)))?,
        background_color: row.try_get("background_color")?,
        duration_secs: row.try_get("duration_secs")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        views: views.into_iter().collect::<BTreeSet<_>>(),
    })
}

fn row_to_hashtag(row: &PgRow) -> StoreResult<Hashtag> {
    Ok(Hashtag {
        tag: row.try_get("tag")?,
        display_tag: row.try_get("display_tag")?,
        count: row.try_get("count")?,
    })
}

/// Reorder fetched rows to match the requested id order.
/// `(target, reaction_type, count)` rows into per-target tallies ordered by type.
fn group_tallies(rows: Vec<(Uuid, String, i64)>) -> HashMap<Uuid, Vec<ReactionCount>> {
    let mut tallies: HashMap<Uuid, Vec<ReactionCount>> = HashMap::new();
    for (target, raw_type, count) in rows {
        match ReactionType::try_from(raw_type.as_str()) {
            Ok(reaction_type) => tallies.entry(target).or_default().push(ReactionCount {
                reaction_type,
                count: count as u64,
            }),
            Err(_) => {
                warn!(id = %target, reaction = %raw_type, "skipping unknown reaction type")
            }
        }
    }
    for tally in tallies.values_mut() {
        tally.sort_by_key(|r| r.reaction_type);
    }
    tallies
}

fn in_request_order<K: std::hash::Hash + Eq, T>(
    keys: &[K],
    rows: Vec<T>,
    key_of: impl Fn(&T) -> K,
) -> Vec<T> {
    let mut by_key: HashMap<K, T> = rows.into_iter().map(|r| (key_of(&r), r)).collect();
    keys.iter().filter_map(|k| by_key.remove(k)).collect()
}

#[async_trait::async_trait]
impl SocialStore for PostgresSocialStore {
    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, username, profile_pic, bio, privacy_tier,
                                  follower_ids, following_ids, graph_version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            "#,
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.profile_pic)
        .bind(&account.bio)
        .bind(account.privacy_tier.as_str())
        .bind(&account.follower_ids)
        .bind(&account.following_ids)
        .bind(account.graph_version)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "username"))?;

        debug!("Inserted account {} ({})", account.id, account.username);
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let row = sqlx::query(&format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn get_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE username = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_account).transpose()
    }

    async fn get_accounts(&self, ids: &[Uuid]) -> StoreResult<Vec<Account>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE id = ANY($1)",
            ACCOUNT_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        let accounts = rows.iter().map(row_to_account).collect::<StoreResult<Vec<_>>>()?;
        Ok(in_request_order(ids, accounts, |a| a.id))
    }

    async fn get_accounts_by_usernames(&self, usernames: &[String]) -> StoreResult<Vec<Account>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE username = ANY($1)",
            ACCOUNT_COLUMNS
        ))
        .bind(usernames)
        .fetch_all(&self.pool)
        .await?;
        let accounts = rows.iter().map(row_to_account).collect::<StoreResult<Vec<_>>>()?;
        Ok(in_request_order(usernames, accounts, |a| a.username.clone()))
    }

    async fn update_privacy_tier(&self, id: Uuid, tier: PrivacyTier) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE accounts SET privacy_tier = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(tier.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_public_accounts(
        &self,
        exclude: &[Uuid],
        limit: usize,
    ) -> StoreResult<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts
             WHERE privacy_tier = 'PUBLIC' AND NOT (id = ANY($1))
             ORDER BY created_at DESC, id DESC
             LIMIT $2",
            ACCOUNT_COLUMNS
        ))
        .bind(exclude)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_account).collect()
    }

    async fn commit_edge(&self, change: EdgeChange) -> StoreResult<CommitOutcome> {
        let add = change.op == EdgeOp::Add;
        let follower_side = (
            FOLLOWER_SIDE_SQL,
            change.follower_id,
            change.followee_id,
            change.follower_version,
        );
        let followee_side = (
            FOLLOWEE_SIDE_SQL,
            change.followee_id,
            change.follower_id,
            change.followee_version,
        );
        // Lock rows in id order so opposite-direction commits cannot deadlock
        let sides = if change.follower_id < change.followee_id {
            [follower_side, followee_side]
        } else {
            [followee_side, follower_side]
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| classify(e, "edge commit"))?;

        for (sql, account_id, other_id, expected_version) in sides {
            let result = sqlx::query(sql)
                .bind(account_id)
                .bind(other_id)
                .bind(add)
                .bind(expected_version)
                .execute(&mut *tx)
                .await
                .map_err(|e| classify(e, "edge commit"))?;

            if result.rows_affected() == 0 {
                tx.rollback().await?;
                debug!(
                    follower = %change.follower_id,
                    followee = %change.followee_id,
                    "edge commit rejected: version mismatch"
                );
                return Ok(CommitOutcome::Conflict);
            }
        }

        tx.commit().await.map_err(|e| classify(e, "edge commit"))?;
        Ok(CommitOutcome::Applied)
    }

    async fn insert_post(
        &self,
        post: &Post,
        tags: &[(String, String)],
    ) -> StoreResult<Vec<Hashtag>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, content, images, videos, privacy_tier, hashtags,
                               mentioned_account_ids, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(&post.content)
        .bind(&post.images)
        .bind(&post.videos)
        .bind(post.privacy_tier.as_str())
        .bind(&post.hashtags)
        .bind(&post.mentioned_account_ids)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| classify(e, "post"))?;

        let counted = upsert_hashtags(&mut tx, tags).await?;
        tx.commit().await.map_err(|e| classify(e, "post"))?;
        Ok(counted)
    }

    async fn get_post(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {} FROM posts p WHERE p.id = $1", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_post).transpose()
    }

    async fn update_post(
        &self,
        post: &Post,
        new_tags: &[(String, String)],
    ) -> StoreResult<Option<Vec<Hashtag>>> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET content = $2, images = $3, videos = $4, privacy_tier = $5, hashtags = $6,
                mentioned_account_ids = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(post.id)
        .bind(&post.content)
        .bind(&post.images)
        .bind(&post.videos)
        .bind(post.privacy_tier.as_str())
        .bind(&post.hashtags)
        .bind(&post.mentioned_account_ids)
        .bind(post.updated_at)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let counted = upsert_hashtags(&mut tx, new_tags).await?;
        tx.commit().await.map_err(|e| classify(e, "post"))?;
        Ok(Some(counted))
    }

    async fn delete_post(&self, id: Uuid) -> StoreResult<bool> {
        // comments, reactions cascade via FK
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn query_posts(&self, query: &PostQuery) -> StoreResult<(Vec<Post>, u64)> {
        let mut author_ids = Vec::new();
        let mut tiers = Vec::new();
        for scope in &query.scopes {
            for tier in &scope.tiers {
                author_ids.push(scope.author_id);
                tiers.push(tier.as_str().to_string());
            }
        }

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM posts p JOIN accounts a ON a.id = p.author_id WHERE {}",
            POST_FILTER
        ))
        .bind(&author_ids)
        .bind(&tiers)
        .bind(query.include_public)
        .bind(query.hashtag.as_deref())
        .fetch_one(&self.pool)
        .await?;

        if total == 0 || query.limit == 0 {
            return Ok((Vec::new(), total as u64));
        }

        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts p JOIN accounts a ON a.id = p.author_id
             WHERE {}
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $5 OFFSET $6",
            POST_COLUMNS, POST_FILTER
        ))
        .bind(&author_ids)
        .bind(&tiers)
        .bind(query.include_public)
        .bind(query.hashtag.as_deref())
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let posts = rows.iter().map(row_to_post).collect::<StoreResult<Vec<_>>>()?;
        Ok((posts, total as u64))
    }

    async fn insert_comment(&self, comment: &Comment) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, author_id, text, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(comment.id)
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.text)
        .bind(comment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "comment"))?;
        Ok(())
    }

    async fn get_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        let row = sqlx::query(
            "SELECT id, post_id, author_id, text, created_at FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_comment).transpose()
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_comments(
        &self,
        post_id: Uuid,
        offset: usize,
        limit: usize,
    ) -> StoreResult<(Vec<Comment>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            r#"
            SELECT id, post_id, author_id, text, created_at
            FROM comments
            WHERE post_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(post_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let comments = rows.iter().map(row_to_comment).collect::<StoreResult<Vec<_>>>()?;
        Ok((comments, total as u64))
    }

    async fn recent_comments(
        &self,
        post_ids: &[Uuid],
        per_post: usize,
    ) -> StoreResult<HashMap<Uuid, Vec<Comment>>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, author_id, text, created_at
            FROM (
                SELECT c.*, ROW_NUMBER() OVER (
                    PARTITION BY c.post_id ORDER BY c.created_at DESC, c.id DESC
                ) AS rn
                FROM comments c
                WHERE c.post_id = ANY($1)
            ) ranked
            WHERE rn <= $2
            ORDER BY post_id, created_at DESC, id DESC
            "#,
        )
        .bind(post_ids)
        .bind(per_post as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<Comment>> = HashMap::new();
        for row in &rows {
            let comment = row_to_comment(row)?;
            grouped.entry(comment.post_id).or_default().push(comment);
        }
        Ok(grouped)
    }

    async fn toggle_reaction(
        &self,
        post_id: Uuid,
        account_id: Uuid,
        reaction_type: ReactionType,
        now: DateTime<Utc>,
    ) -> StoreResult<ReactionToggle> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<String> = sqlx::query_scalar(
            r#"
            SELECT reaction_type FROM post_reactions
            WHERE post_id = $1 AND account_id = $2
            FOR UPDATE
            "#,
        )
        .bind(post_id)
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing.as_deref() {
            Some(current) if current == reaction_type.as_str() => {
                sqlx::query("DELETE FROM post_reactions WHERE post_id = $1 AND account_id = $2")
                    .bind(post_id)
                    .bind(account_id)
                    .execute(&mut *tx)
                    .await?;
                ReactionToggle::Removed
            }
            Some(_) => {
                sqlx::query(
                    r#"
                    UPDATE post_reactions SET reaction_type = $3
                    WHERE post_id = $1 AND account_id = $2
                    "#,
                )
                .bind(post_id)
                .bind(account_id)
                .bind(reaction_type.as_str())
                .execute(&mut *tx)
                .await?;
                ReactionToggle::Changed
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO post_reactions (post_id, account_id, reaction_type, created_at)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (post_id, account_id)
                    DO UPDATE SET reaction_type = EXCLUDED.reaction_type
                    "#,
                )
                .bind(post_id)
                .bind(account_id)
                .bind(reaction_type.as_str())
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| classify(e, "reaction"))?;
                ReactionToggle::Added
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn reaction_tallies(
        &self,
        post_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Vec<ReactionCount>>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, String, i64)> = sqlx::query_as(
            r#"
            SELECT post_id, reaction_type, COUNT(*)
            FROM post_reactions
            WHERE post_id = ANY($1)
            GROUP BY post_id, reaction_type
            "#,
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(group_tallies(rows))
    }

    async fn toggle_comment_reaction(
        &self,
        comment_id: Uuid,
        account_id: Uuid,
        reaction_type: ReactionType,
        now: DateTime<Utc>,
    ) -> StoreResult<ReactionToggle> {
        // remove-or-insert in one statement; the CTE sees the pre-statement snapshot
        let removed: bool = sqlx::query_scalar(
            r#"
            WITH removed AS (
                DELETE FROM comment_reactions
                WHERE comment_id = $1 AND account_id = $2
                RETURNING comment_id
            ),
            added AS (
                INSERT INTO comment_reactions (comment_id, account_id, reaction_type, created_at)
                SELECT $1, $2, $3, $4
                WHERE NOT EXISTS (SELECT 1 FROM removed)
                ON CONFLICT (comment_id, account_id) DO NOTHING
            )
            SELECT EXISTS (SELECT 1 FROM removed)
            "#,
        )
        .bind(comment_id)
        .bind(account_id)
        .bind(reaction_type.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "comment reaction"))?;

        Ok(if removed {
            ReactionToggle::Removed
        } else {
            ReactionToggle::Added
        })
    }

    async fn comment_reaction_tallies(
        &self,
        comment_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, Vec<ReactionCount>>> {
        if comment_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, String, i64)> = sqlx::query_as(
            r#"
            SELECT comment_id, reaction_type, COUNT(*)
            FROM comment_reactions
            WHERE comment_id = ANY($1)
            GROUP BY comment_id, reaction_type
            "#,
        )
        .bind(comment_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(group_tallies(rows))
    }

    async fn insert_story(&self, story: &Story) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stories (id, author_id, content, content_type, background_color,
                                 duration_secs, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(story.id)
        .bind(story.author_id)
        .bind(&story.content)
        .bind(story.content_type.as_str())
        .bind(&story.background_color)
        .bind(story.duration_secs)
        .bind(story.created_at)
        .bind(story.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "story"))?;
        Ok(())
    }

    async fn get_story(&self, id: Uuid) -> StoreResult<Option<Story>> {
        let row = sqlx::query(&format!("SELECT {} FROM stories s WHERE s.id = $1", STORY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_story).transpose()
    }

    async fn active_stories_by_authors(
        &self,
        author_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<Story>> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {} FROM stories s
             WHERE s.author_id = ANY($1) AND s.expires_at > $2
             ORDER BY s.created_at DESC, s.id DESC",
            STORY_COLUMNS
        ))
        .bind(author_ids)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_story).collect()
    }

    async fn add_story_view(
        &self,
        story_id: Uuid,
        viewer_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ViewOutcome>> {
        // Liveness check and insert happen in one statement
        let (live, inserted): (bool, bool) = sqlx::query_as(
            r#"
            WITH live AS (
                SELECT id FROM stories WHERE id = $1 AND expires_at > $3
            ),
            inserted AS (
                INSERT INTO story_views (story_id, viewer_id, viewed_at)
                SELECT id, $2, $3 FROM live
                ON CONFLICT (story_id, viewer_id) DO NOTHING
                RETURNING story_id
            )
            SELECT EXISTS (SELECT 1 FROM live), EXISTS (SELECT 1 FROM inserted)
            "#,
        )
        .bind(story_id)
        .bind(viewer_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "viewer"))?;

        Ok(match (live, inserted) {
            (false, _) => None,
            (true, true) => Some(ViewOutcome::Recorded),
            (true, false) => Some(ViewOutcome::AlreadyViewed),
        })
    }

    async fn increment_hashtags(&self, tags: &[(String, String)]) -> StoreResult<Vec<Hashtag>> {
        let mut tx = self.pool.begin().await?;
        let updated = upsert_hashtags(&mut tx, tags).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn trending_hashtags(&self, limit: usize) -> StoreResult<Vec<Hashtag>> {
        let rows = sqlx::query(
            "SELECT tag, display_tag, count FROM hashtags ORDER BY count DESC, tag ASC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_hashtag).collect()
    }

    async fn search_hashtags(&self, query: &str, limit: usize) -> StoreResult<Vec<Hashtag>> {
        let rows = sqlx::query(
            r#"
            SELECT tag, display_tag, count FROM hashtags
            WHERE strpos(tag, $1) > 0
            ORDER BY count DESC, tag ASC
            LIMIT $2
            "#,
        )
        .bind(query.to_lowercase())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_hashtag).collect()
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
