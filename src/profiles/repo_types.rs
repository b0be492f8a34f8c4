use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Owner of a profile, populated from the users table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileOwner {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Social {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Experience {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    #[serde(with = "iso_date")]
    pub from: Date,
    #[serde(with = "iso_date::option", default)]
    pub to: Option<Date>,
    pub current: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user: ProfileOwner,
    pub company: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub status: String,
    pub skills: Vec<String>,
    #[serde(rename = "githubusername")]
    pub github_username: Option<String>,
    /// Newest first.
    pub experience: Vec<Experience>,
    pub social: Social,
    #[serde(rename = "date", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Input to create-or-update. `None` optional fields keep their stored
/// value on update; `social` is replaced as a whole.
#[derive(Debug, Clone)]
pub struct ProfileFields {
    pub company: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub status: String,
    pub skills: Vec<String>,
    pub github_username: Option<String>,
    pub social: Social,
}

#[derive(Debug, Clone)]
pub struct NewExperience {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub from: Date,
    pub to: Option<Date>,
    pub current: bool,
    pub description: Option<String>,
}
