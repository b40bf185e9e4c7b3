// Posts and comments: the minimal store votes point at.
pub mod handlers;

use async_trait::async_trait;
use rusqlite::{params, Row};
use serde::Serialize;

use crate::db::models::{Comment, Post};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

/// A post with its current reaction counts.
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub post: Post,
    pub likes: i64,
    pub dislikes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentSummary {
    pub comment: Comment,
    pub likes: i64,
    pub dislikes: i64,
}

/// Create/read operations on forum content.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn create_post(&self, user_id: i64, title: &str, content: &str) -> AppResult<i64>;

    /// Fails with `NotFound` if the post does not exist.
    async fn create_comment(&self, post_id: i64, user_id: i64, body: &str) -> AppResult<i64>;

    /// Newest first.
    async fn list_posts(&self) -> AppResult<Vec<PostSummary>>;

    /// Oldest first.
    async fn comments_for(&self, post_id: i64) -> AppResult<Vec<CommentSummary>>;
}

pub struct SqliteContentStore {
    pool: DbPool,
}

impl SqliteContentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        user_id: row.get(2)?,
        author: row.get(3)?,
        body: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn create_post(&self, user_id: i64, title: &str, content: &str) -> AppResult<i64> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO posts (user_id, title, content) VALUES (?1, ?2, ?3)",
            params![user_id, title, content],
        )?;
        let id = conn.last_insert_rowid();
        tracing::info!("User {} created post {}", user_id, id);
        Ok(id)
    }

    async fn create_comment(&self, post_id: i64, user_id: i64, body: &str) -> AppResult<i64> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
            params![post_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(AppError::NotFound);
        }

        conn.execute(
            "INSERT INTO comments (post_id, user_id, body) VALUES (?1, ?2, ?3)",
            params![post_id, user_id, body],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn list_posts(&self) -> AppResult<Vec<PostSummary>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT p.id, p.user_id, u.username, p.title, p.content, p.created_at,
                    (SELECT COUNT(*) FROM votes v WHERE v.post_id = p.id AND v.value = 1),
                    (SELECT COUNT(*) FROM votes v WHERE v.post_id = p.id AND v.value = -1)
             FROM posts p JOIN users u ON u.id = p.user_id
             ORDER BY p.created_at DESC, p.id DESC",
        )?;
        let posts = stmt
            .query_map([], |row| {
                Ok(PostSummary {
                    post: post_from_row(row)?,
                    likes: row.get(6)?,
                    dislikes: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn comments_for(&self, post_id: i64) -> AppResult<Vec<CommentSummary>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.post_id, c.user_id, u.username, c.body, c.created_at,
                    (SELECT COUNT(*) FROM votes v WHERE v.comment_id = c.id AND v.value = 1),
                    (SELECT COUNT(*) FROM votes v WHERE v.comment_id = c.id AND v.value = -1)
             FROM comments c JOIN users u ON u.id = c.user_id
             WHERE c.post_id = ?1
             ORDER BY c.created_at ASC, c.id ASC",
        )?;
        let comments = stmt
            .query_map(params![post_id], |row| {
                Ok(CommentSummary {
                    comment: comment_from_row(row)?,
                    likes: row.get(6)?,
                    dislikes: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{memory_pool, run_migrations};

    fn setup() -> (DbPool, SqliteContentStore) {
        let pool = memory_pool().unwrap();
        run_migrations(&pool).unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute(
                "INSERT INTO users (id, username, email, password_hash) VALUES (1, 'alice', 'a@x.com', 'h')",
                [],
            )
            .unwrap();
        }
        let store = SqliteContentStore::new(pool.clone());
        (pool, store)
    }

    #[tokio::test]
    async fn created_post_is_listed_with_its_author() {
        let (_pool, store) = setup();
        let id = store.create_post(1, "Hello", "First post").await.unwrap();

        let posts = store.list_posts().await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].post.id, id);
        assert_eq!(posts[0].post.title, "Hello");
        assert_eq!(posts[0].post.author, "alice");
        assert_eq!((posts[0].likes, posts[0].dislikes), (0, 0));
    }

    #[tokio::test]
    async fn list_posts_is_newest_first_with_counts() {
        let (pool, store) = setup();
        let first = store.create_post(1, "one", "a").await.unwrap();
        let second = store.create_post(1, "two", "b").await.unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute(
                "INSERT INTO votes (user_id, post_id, value) VALUES (1, ?1, 1)",
                params![first],
            )
            .unwrap();
        }

        let posts = store.list_posts().await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].post.id, second);
        assert_eq!(posts[1].post.id, first);
        assert_eq!((posts[1].likes, posts[1].dislikes), (1, 0));
    }

    #[tokio::test]
    async fn comment_on_missing_post_is_not_found() {
        let (_pool, store) = setup();
        let err = store.create_comment(99, 1, "hi").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn comments_are_listed_oldest_first() {
        let (_pool, store) = setup();
        let post = store.create_post(1, "t", "c").await.unwrap();
        let a = store.create_comment(post, 1, "first").await.unwrap();
        let b = store.create_comment(post, 1, "second").await.unwrap();

        let comments = store.comments_for(post).await.unwrap();
        let ids: Vec<i64> = comments.iter().map(|c| c.comment.id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(comments[0].comment.author, "alice");
    }
}
