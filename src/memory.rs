use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo::UserStore;
use crate::auth::repo_types::{NewUser, User};
use crate::db::{StoreError, StoreResult};
use crate::posts::repo::PostStore;
use crate::posts::repo_types::{Comment, Like, NewComment, NewPost, Post};
use crate::profiles::repo::ProfileStore;
use crate::profiles::repo_types::{
    Experience, NewExperience, Profile, ProfileFields, ProfileOwner, Social,
};

#[derive(Debug, Clone)]
struct ProfileRecord {
    id: Uuid,
    user_id: Uuid,
    company: Option<String>,
    website: Option<String>,
    location: Option<String>,
    bio: Option<String>,
    status: String,
    skills: Vec<String>,
    github_username: Option<String>,
    experience: Vec<Experience>,
    social: Social,
    created_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct Inner {
    users: Vec<User>,
    profiles: Vec<ProfileRecord>,
    posts: Vec<Post>,
}

impl Inner {
    fn owner(&self, user_id: Uuid) -> Option<ProfileOwner> {
        self.users.iter().find(|u| u.id == user_id).map(|u| ProfileOwner {
            id: u.id,
            name: u.name.clone(),
            avatar: u.avatar.clone(),
        })
    }

    /// Profiles whose user is gone are dropped, like an inner join.
    fn render(&self, p: &ProfileRecord) -> Option<Profile> {
        Some(Profile {
            id: p.id,
            user: self.owner(p.user_id)?,
            company: p.company.clone(),
            website: p.website.clone(),
            location: p.location.clone(),
            bio: p.bio.clone(),
            status: p.status.clone(),
            skills: p.skills.clone(),
            github_username: p.github_username.clone(),
            experience: p.experience.clone(),
            social: p.social.clone(),
            created_at: p.created_at,
        })
    }

    fn post_mut(&mut self, id: Uuid) -> StoreResult<&mut Post> {
        self.posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound("Post"))
    }
}

/// Process-local store used when no database is configured, and by tests.
/// All three store traits share one lock so cross-entity deletes stay atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, new: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.write().await;
        if inner.users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::Duplicate("User"));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            avatar: new.avatar,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.users.iter_mut().find(|u| u.id == id) {
            Some(u) => {
                u.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.users.len();
        inner.users.retain(|u| u.id != id);
        if inner.users.len() == before {
            return Ok(false);
        }
        // mirror ON DELETE CASCADE
        inner.profiles.retain(|p| p.user_id != id);
        inner.posts.retain(|p| p.user != id);
        Ok(true)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn find_by_user(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let inner = self.inner.read().await;
        Ok(inner
            .profiles
            .iter()
            .find(|p| p.user_id == user_id)
            .and_then(|p| inner.render(p)))
    }

    async fn list(&self) -> StoreResult<Vec<Profile>> {
        let inner = self.inner.read().await;
        Ok(inner.profiles.iter().filter_map(|p| inner.render(p)).collect())
    }

    async fn upsert(&self, user_id: Uuid, fields: ProfileFields) -> StoreResult<Profile> {
        let mut inner = self.inner.write().await;
        let existing = inner.profiles.iter().position(|p| p.user_id == user_id);
        let idx = match existing {
            Some(idx) => {
                let p = &mut inner.profiles[idx];
                p.company = fields.company.or(p.company.take());
                p.website = fields.website.or(p.website.take());
                p.location = fields.location.or(p.location.take());
                p.bio = fields.bio.or(p.bio.take());
                p.status = fields.status;
                p.skills = fields.skills;
                p.github_username = fields.github_username.or(p.github_username.take());
                p.social = fields.social;
                idx
            }
            None => {
                inner.profiles.push(ProfileRecord {
                    id: Uuid::new_v4(),
                    user_id,
                    company: fields.company,
                    website: fields.website,
                    location: fields.location,
                    bio: fields.bio,
                    status: fields.status,
                    skills: fields.skills,
                    github_username: fields.github_username,
                    experience: Vec::new(),
                    social: fields.social,
                    created_at: OffsetDateTime::now_utc(),
                });
                inner.profiles.len() - 1
            }
        };
        inner
            .render(&inner.profiles[idx])
            .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("profile owner {user_id} missing")))
    }

    async fn add_experience(&self, profile_id: Uuid, exp: NewExperience) -> StoreResult<Experience> {
        let mut inner = self.inner.write().await;
        let profile = inner
            .profiles
            .iter_mut()
            .find(|p| p.id == profile_id)
            .ok_or(StoreError::NotFound("Profile"))?;
        let entry = Experience {
            id: Uuid::new_v4(),
            title: exp.title,
            company: exp.company,
            location: exp.location,
            from: exp.from,
            to: exp.to,
            current: exp.current,
            description: exp.description,
        };
        profile.experience.insert(0, entry.clone());
        Ok(entry)
    }

    async fn experience_owner(&self, exp_id: Uuid) -> StoreResult<Option<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner
            .profiles
            .iter()
            .find(|p| p.experience.iter().any(|e| e.id == exp_id))
            .map(|p| p.user_id))
    }

    async fn remove_experience(&self, exp_id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        for p in inner.profiles.iter_mut() {
            if let Some(idx) = p.experience.iter().position(|e| e.id == exp_id) {
                p.experience.remove(idx);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn create(&self, new: NewPost) -> StoreResult<Post> {
        let mut inner = self.inner.write().await;
        let post = Post {
            id: Uuid::new_v4(),
            user: new.user,
            text: new.text,
            name: new.name,
            avatar: new.avatar,
            likes: Vec::new(),
            comments: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        inner.posts.push(post.clone());
        Ok(post)
    }

    async fn list(&self) -> StoreResult<Vec<Post>> {
        let inner = self.inner.read().await;
        Ok(inner.posts.iter().rev().cloned().collect())
    }

    async fn find(&self, id: Uuid) -> StoreResult<Option<Post>> {
        let inner = self.inner.read().await;
        Ok(inner.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.posts.len();
        inner.posts.retain(|p| p.id != id);
        Ok(inner.posts.len() != before)
    }

    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Vec<Like>> {
        let mut inner = self.inner.write().await;
        let post = inner.post_mut(post_id)?;
        if post.likes.iter().any(|l| l.user == user_id) {
            return Err(StoreError::Duplicate("Like"));
        }
        post.likes.push(Like {
            id: Uuid::new_v4(),
            user: user_id,
        });
        Ok(post.likes.clone())
    }

    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<Vec<Like>>> {
        let mut inner = self.inner.write().await;
        let post = inner.post_mut(post_id)?;
        let Some(idx) = post.likes.iter().position(|l| l.user == user_id) else {
            return Ok(None);
        };
        post.likes.remove(idx);
        Ok(Some(post.likes.clone()))
    }

    async fn add_comment(&self, post_id: Uuid, new: NewComment) -> StoreResult<Vec<Comment>> {
        let mut inner = self.inner.write().await;
        let post = inner.post_mut(post_id)?;
        post.comments.insert(
            0,
            Comment {
                id: Uuid::new_v4(),
                user: new.user,
                text: new.text,
                name: new.name,
                avatar: new.avatar,
                created_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(post.comments.clone())
    }

    async fn delete_comment(&self, post_id: Uuid, comment_id: Uuid) -> StoreResult<Vec<Comment>> {
        let mut inner = self.inner.write().await;
        let post = inner.post_mut(post_id)?;
        post.comments.retain(|c| c.id != comment_id);
        Ok(post.comments.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Alice".into(),
            email: email.into(),
            password_hash: "hash".into(),
            avatar: None,
        }
    }

    fn fields(status: &str) -> ProfileFields {
        ProfileFields {
            company: Some("Acme".into()),
            website: None,
            location: None,
            bio: None,
            status: status.into(),
            skills: vec!["rust".into()],
            github_username: None,
            social: Social::default(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        UserStore::create(&store, new_user("a@x.com")).await.unwrap();
        let err = UserStore::create(&store, new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("User")));
    }

    #[tokio::test]
    async fn update_password_replaces_hash() {
        let store = MemoryStore::new();
        let user = UserStore::create(&store, new_user("a@x.com")).await.unwrap();
        assert!(store.update_password(user.id, "new-hash").await.unwrap());
        let found = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.password_hash, "new-hash");
        assert!(!store.update_password(Uuid::new_v4(), "x").await.unwrap());
    }

    #[tokio::test]
    async fn upsert_keeps_one_profile_per_user() {
        let store = MemoryStore::new();
        let user = UserStore::create(&store, new_user("a@x.com")).await.unwrap();
        let first = store.upsert(user.id, fields("Dev")).await.unwrap();
        let mut update = fields("Lead");
        update.company = None;
        let second = store.upsert(user.id, update).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.status, "Lead");
        assert_eq!(second.company.as_deref(), Some("Acme"));
        assert_eq!(ProfileStore::list(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn experience_lookup_by_owner() {
        let store = MemoryStore::new();
        let user = UserStore::create(&store, new_user("a@x.com")).await.unwrap();
        let profile = store.upsert(user.id, fields("Dev")).await.unwrap();
        let exp = store
            .add_experience(
                profile.id,
                NewExperience {
                    title: "Engineer".into(),
                    company: "Acme".into(),
                    location: None,
                    from: date!(2020 - 01 - 01),
                    to: None,
                    current: true,
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(store.experience_owner(exp.id).await.unwrap(), Some(user.id));
        assert!(store.remove_experience(exp.id).await.unwrap());
        assert_eq!(store.experience_owner(exp.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn likes_are_unique_per_user() {
        let store = MemoryStore::new();
        let author = Uuid::new_v4();
        let post = PostStore::create(
            &store,
            NewPost {
                user: author,
                text: "hi".into(),
                name: "Alice".into(),
                avatar: None,
            },
        )
        .await
        .unwrap();
        let liker = Uuid::new_v4();
        assert_eq!(store.add_like(post.id, liker).await.unwrap().len(), 1);
        assert!(matches!(
            store.add_like(post.id, liker).await,
            Err(StoreError::Duplicate("Like"))
        ));
        assert_eq!(store.find(post.id).await.unwrap().unwrap().likes.len(), 1);
        assert_eq!(store.remove_like(post.id, liker).await.unwrap(), Some(vec![]));
        assert_eq!(store.remove_like(post.id, liker).await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_on_a_deleted_post_are_not_found() {
        let store = MemoryStore::new();
        let post = PostStore::create(
            &store,
            NewPost {
                user: Uuid::new_v4(),
                text: "gone soon".into(),
                name: "Alice".into(),
                avatar: None,
            },
        )
        .await
        .unwrap();
        assert!(PostStore::delete(&store, post.id).await.unwrap());

        let liker = Uuid::new_v4();
        assert!(matches!(
            store.add_like(post.id, liker).await,
            Err(StoreError::NotFound("Post"))
        ));
        assert!(matches!(
            store.remove_like(post.id, liker).await,
            Err(StoreError::NotFound("Post"))
        ));
        let comment = NewComment {
            user: liker,
            text: "late".into(),
            name: "Bob".into(),
            avatar: None,
        };
        assert!(matches!(
            store.add_comment(post.id, comment).await,
            Err(StoreError::NotFound("Post"))
        ));
        assert!(matches!(
            store.delete_comment(post.id, Uuid::new_v4()).await,
            Err(StoreError::NotFound("Post"))
        ));
    }

    #[tokio::test]
    async fn deleting_a_user_cascades() {
        let store = MemoryStore::new();
        let user = UserStore::create(&store, new_user("a@x.com")).await.unwrap();
        store.upsert(user.id, fields("Dev")).await.unwrap();
        PostStore::create(
            &store,
            NewPost {
                user: user.id,
                text: "hi".into(),
                name: user.name.clone(),
                avatar: None,
            },
        )
        .await
        .unwrap();

        assert!(UserStore::delete(&store, user.id).await.unwrap());
        assert!(store.find_by_user(user.id).await.unwrap().is_none());
        assert!(PostStore::list(&store).await.unwrap().is_empty());
    }
}
