use sha2::{Digest, Sha256};

/// Gravatar image for an email: 200px, PG-rated, mystery-person fallback.
pub fn gravatar_url(email: &str) -> String {
    let digest = Sha256::digest(email.trim().to_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{}?s=200&r=pg&d=mm",
        hex::encode(digest)
    )
}
