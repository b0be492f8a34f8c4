use serde::Deserialize;

/// Body of `POST /profile`. `skills` is a comma-separated list.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileRequest {
    pub company: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "githubusername")]
    pub github_username: Option<String>,
    pub skills: Option<String>,
    pub youtube: Option<String>,
    pub twitter: Option<String>,
    pub facebook: Option<String>,
    pub linkedin: Option<String>,
    pub instagram: Option<String>,
}

/// Body of `PUT /profile/experience`. Dates are `YYYY-MM-DD` or RFC 3339.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExperienceRequest {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub current: bool,
    pub description: Option<String>,
}
