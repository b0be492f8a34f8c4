use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::{child_insert_as, StoreError, StoreResult};
use crate::posts::repo_types::{Comment, Like, NewComment, NewPost, Post};

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create(&self, new: NewPost) -> StoreResult<Post>;
    /// Newest first.
    async fn list(&self) -> StoreResult<Vec<Post>>;
    async fn find(&self, id: Uuid) -> StoreResult<Option<Post>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
    /// Fails with `StoreError::Duplicate("Like")` when the user already likes the post.
    /// Writes against a post that no longer exists fail with `StoreError::NotFound("Post")`.
    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Vec<Like>>;
    /// `None` when there was no like to remove.
    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<Vec<Like>>>;
    async fn add_comment(&self, post_id: Uuid, new: NewComment) -> StoreResult<Vec<Comment>>;
    async fn delete_comment(&self, post_id: Uuid, comment_id: Uuid) -> StoreResult<Vec<Comment>>;
}

#[derive(Debug, FromRow)]
struct PostRow {
    id: Uuid,
    user_id: Uuid,
    text: String,
    name: String,
    avatar: Option<String>,
    created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct LikeRow {
    id: Uuid,
    post_id: Uuid,
    user_id: Uuid,
}

#[derive(Debug, FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    user_id: Uuid,
    text: String,
    name: String,
    avatar: Option<String>,
    created_at: OffsetDateTime,
}

impl From<LikeRow> for Like {
    fn from(r: LikeRow) -> Self {
        Self {
            id: r.id,
            user: r.user_id,
        }
    }
}

impl From<CommentRow> for Comment {
    fn from(r: CommentRow) -> Self {
        Self {
            id: r.id,
            user: r.user_id,
            text: r.text,
            name: r.name,
            avatar: r.avatar,
            created_at: r.created_at,
        }
    }
}

const LIKES_SELECT: &str = r#"
    SELECT id, post_id, user_id
      FROM post_likes
     WHERE post_id = ANY($1)
     ORDER BY created_at ASC
"#;

const COMMENTS_SELECT: &str = r#"
    SELECT id, post_id, user_id, text, name, avatar, created_at
      FROM post_comments
     WHERE post_id = ANY($1)
     ORDER BY created_at DESC
"#;

#[derive(Clone)]
pub struct PgPostStore {
    db: PgPool,
}

impl PgPostStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn likes_of(&self, post_id: Uuid) -> StoreResult<Vec<Like>> {
        let rows = sqlx::query_as::<_, LikeRow>(LIKES_SELECT)
            .bind(vec![post_id])
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Like::from).collect())
    }

    async fn comments_of(&self, post_id: Uuid) -> StoreResult<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(COMMENTS_SELECT)
            .bind(vec![post_id])
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn post_exists(&self, post_id: Uuid) -> StoreResult<bool> {
        let (exists,) = sqlx::query_as::<_, (bool,)>("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(&self.db)
            .await?;
        Ok(exists)
    }

    async fn hydrate(&self, rows: Vec<PostRow>) -> StoreResult<Vec<Post>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let likes = sqlx::query_as::<_, LikeRow>(LIKES_SELECT)
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;
        let comments = sqlx::query_as::<_, CommentRow>(COMMENTS_SELECT)
            .bind(&ids)
            .fetch_all(&self.db)
            .await?;

        let mut likes_by_post: HashMap<Uuid, Vec<Like>> = HashMap::new();
        for l in likes {
            likes_by_post.entry(l.post_id).or_default().push(l.into());
        }
        let mut comments_by_post: HashMap<Uuid, Vec<Comment>> = HashMap::new();
        for c in comments {
            comments_by_post.entry(c.post_id).or_default().push(c.into());
        }

        Ok(rows
            .into_iter()
            .map(|r| Post {
                likes: likes_by_post.remove(&r.id).unwrap_or_default(),
                comments: comments_by_post.remove(&r.id).unwrap_or_default(),
                id: r.id,
                user: r.user_id,
                text: r.text,
                name: r.name,
                avatar: r.avatar,
                created_at: r.created_at,
            })
            .collect())
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn create(&self, new: NewPost) -> StoreResult<Post> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (id, user_id, text, name, avatar)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, text, name, avatar, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user)
        .bind(&new.text)
        .bind(&new.name)
        .bind(&new.avatar)
        .fetch_one(&self.db)
        .await?;

        Ok(Post {
            id: row.id,
            user: row.user_id,
            text: row.text,
            name: row.name,
            avatar: row.avatar,
            likes: Vec::new(),
            comments: Vec::new(),
            created_at: row.created_at,
        })
    }

    async fn list(&self) -> StoreResult<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, user_id, text, name, avatar, created_at
              FROM posts
             ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        self.hydrate(rows).await
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, user_id, text, name, avatar, created_at
              FROM posts
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![row]).await?.pop())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Vec<Like>> {
        sqlx::query("INSERT INTO post_likes (id, post_id, user_id) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(post_id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(child_insert_as("Post", "Like"))?;
        self.likes_of(post_id).await
    }

    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<Vec<Like>>> {
        let res = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 {
            if !self.post_exists(post_id).await? {
                return Err(StoreError::NotFound("Post"));
            }
            return Ok(None);
        }
        Ok(Some(self.likes_of(post_id).await?))
    }

    async fn add_comment(&self, post_id: Uuid, new: NewComment) -> StoreResult<Vec<Comment>> {
        sqlx::query(
            r#"
            INSERT INTO post_comments (id, post_id, user_id, text, name, avatar)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(new.user)
        .bind(&new.text)
        .bind(&new.name)
        .bind(&new.avatar)
        .execute(&self.db)
        .await
        .map_err(child_insert_as("Post", "Comment"))?;
        self.comments_of(post_id).await
    }

    async fn delete_comment(&self, post_id: Uuid, comment_id: Uuid) -> StoreResult<Vec<Comment>> {
        let res = sqlx::query("DELETE FROM post_comments WHERE id = $1 AND post_id = $2")
            .bind(comment_id)
            .bind(post_id)
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 && !self.post_exists(post_id).await? {
            return Err(StoreError::NotFound("Post"));
        }
        self.comments_of(post_id).await
    }
}
