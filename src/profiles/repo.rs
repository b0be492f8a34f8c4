use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::db::{child_insert_as, StoreError, StoreResult};
use crate::profiles::repo_types::{Experience, NewExperience, Profile, ProfileFields, ProfileOwner, Social};

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> StoreResult<Option<Profile>>;
    async fn list(&self) -> StoreResult<Vec<Profile>>;
    async fn upsert(&self, user_id: Uuid, fields: ProfileFields) -> StoreResult<Profile>;
    async fn add_experience(&self, profile_id: Uuid, exp: NewExperience) -> StoreResult<Experience>;
    /// User id owning the profile that holds the entry.
    async fn experience_owner(&self, exp_id: Uuid) -> StoreResult<Option<Uuid>>;
    async fn remove_experience(&self, exp_id: Uuid) -> StoreResult<bool>;
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    id: Uuid,
    user_id: Uuid,
    user_name: String,
    user_avatar: Option<String>,
    company: Option<String>,
    website: Option<String>,
    location: Option<String>,
    bio: Option<String>,
    status: String,
    skills: Vec<String>,
    github_username: Option<String>,
    social: Json<Social>,
    created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
struct ExperienceRow {
    id: Uuid,
    profile_id: Uuid,
    title: String,
    company: String,
    location: Option<String>,
    from_date: Date,
    to_date: Option<Date>,
    current: bool,
    description: Option<String>,
}

impl From<ExperienceRow> for Experience {
    fn from(r: ExperienceRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            company: r.company,
            location: r.location,
            from: r.from_date,
            to: r.to_date,
            current: r.current,
            description: r.description,
        }
    }
}

const PROFILE_SELECT: &str = r#"
    SELECT p.id, p.user_id, u.name AS user_name, u.avatar AS user_avatar,
           p.company, p.website, p.location, p.bio, p.status, p.skills,
           p.github_username, p.social, p.created_at
      FROM profiles p
      JOIN users u ON u.id = p.user_id
"#;

#[derive(Clone)]
pub struct PgProfileStore {
    db: PgPool,
}

impl PgProfileStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn with_experience(&self, rows: Vec<ProfileRow>) -> StoreResult<Vec<Profile>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let exps = sqlx::query_as::<_, ExperienceRow>(
            r#"
            SELECT id, profile_id, title, company, location, from_date, to_date, current, description
              FROM experiences
             WHERE profile_id = ANY($1)
             ORDER BY created_at DESC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut by_profile: HashMap<Uuid, Vec<Experience>> = HashMap::new();
        for e in exps {
            by_profile.entry(e.profile_id).or_default().push(e.into());
        }

        Ok(rows
            .into_iter()
            .map(|r| Profile {
                experience: by_profile.remove(&r.id).unwrap_or_default(),
                id: r.id,
                user: ProfileOwner {
                    id: r.user_id,
                    name: r.user_name,
                    avatar: r.user_avatar,
                },
                company: r.company,
                website: r.website,
                location: r.location,
                bio: r.bio,
                status: r.status,
                skills: r.skills,
                github_username: r.github_username,
                social: r.social.0,
                created_at: r.created_at,
            })
            .collect())
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find_by_user(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!("{PROFILE_SELECT} WHERE p.user_id = $1"))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.with_experience(vec![row]).await?.pop())
    }

    async fn list(&self) -> StoreResult<Vec<Profile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(&format!("{PROFILE_SELECT} ORDER BY p.created_at ASC"))
            .fetch_all(&self.db)
            .await?;
        self.with_experience(rows).await
    }

    async fn upsert(&self, user_id: Uuid, fields: ProfileFields) -> StoreResult<Profile> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, user_id, company, website, location, bio, status,
                                  skills, github_username, social, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id) DO UPDATE SET
                company         = COALESCE(EXCLUDED.company, profiles.company),
                website         = COALESCE(EXCLUDED.website, profiles.website),
                location        = COALESCE(EXCLUDED.location, profiles.location),
                bio             = COALESCE(EXCLUDED.bio, profiles.bio),
                status          = EXCLUDED.status,
                skills          = EXCLUDED.skills,
                github_username = COALESCE(EXCLUDED.github_username, profiles.github_username),
                social          = EXCLUDED.social
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&fields.company)
        .bind(&fields.website)
        .bind(&fields.location)
        .bind(&fields.bio)
        .bind(&fields.status)
        .bind(&fields.skills)
        .bind(&fields.github_username)
        .bind(Json(&fields.social))
        .bind(OffsetDateTime::now_utc())
        .execute(&self.db)
        .await?;

        self.find_by_user(user_id)
            .await?
            .ok_or_else(|| StoreError::Backend(anyhow!("profile missing after upsert")))
    }

    async fn add_experience(&self, profile_id: Uuid, exp: NewExperience) -> StoreResult<Experience> {
        let row = sqlx::query_as::<_, ExperienceRow>(
            r#"
            INSERT INTO experiences (id, profile_id, title, company, location, from_date,
                                     to_date, current, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, profile_id, title, company, location, from_date, to_date, current, description
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(profile_id)
        .bind(&exp.title)
        .bind(&exp.company)
        .bind(&exp.location)
        .bind(exp.from)
        .bind(exp.to)
        .bind(exp.current)
        .bind(&exp.description)
        .fetch_one(&self.db)
        .await
        .map_err(child_insert_as("Profile", "Experience"))?;
        Ok(row.into())
    }

    async fn experience_owner(&self, exp_id: Uuid) -> StoreResult<Option<Uuid>> {
        let owner = sqlx::query_as::<_, (Uuid,)>(
            r#"
            SELECT p.user_id
              FROM experiences e
              JOIN profiles p ON p.id = e.profile_id
             WHERE e.id = $1
            "#,
        )
        .bind(exp_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(owner.map(|(id,)| id))
    }

    async fn remove_experience(&self, exp_id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM experiences WHERE id = $1")
            .bind(exp_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
