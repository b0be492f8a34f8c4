use serde::Deserialize;

/// Body of both `POST /posts` and `POST /posts/comment/:post_id`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TextRequest {
    pub text: Option<String>,
}
