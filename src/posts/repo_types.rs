use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Like {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user: Uuid,
    pub text: String,
    pub name: String,
    pub avatar: Option<String>,
    #[serde(rename = "date", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A post with its likes (oldest first) and comments (newest first).
/// `name` and `avatar` are copied from the author when the post is made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user: Uuid,
    pub text: String,
    pub name: String,
    pub avatar: Option<String>,
    pub likes: Vec<Like>,
    pub comments: Vec<Comment>,
    #[serde(rename = "date", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user: Uuid,
    pub text: String,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub user: Uuid,
    pub text: String,
    pub name: String,
    pub avatar: Option<String>,
}
