use crate::enums::PrStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A person who can author pull requests and review them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    /// The single team this user currently belongs to.
    pub team_name: String,
    pub is_active: bool,
}

/// A team member as supplied to, and reported from, a team. The team name
/// is implied by the owning `Team`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

impl TeamMember {
    /// Binds this member to a team, producing the stored user record.
    pub fn into_user(self, team_name: &str) -> User {
        User {
            id: self.id,
            name: self.name,
            team_name: team_name.to_string(),
            is_active: self.is_active,
        }
    }
}

impl From<User> for TeamMember {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub members: Vec<TeamMember>,
}

/// A pull request together with the reviewers currently linked to it.
///
/// Reviewers are not part of the stored row; they are derived from the
/// reviewer-link relation and their order is not meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: PrStatus,
    pub reviewers: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.status.is_merged()
    }

    pub fn short(&self) -> PullRequestShort {
        PullRequestShort {
            id: self.id.clone(),
            name: self.name.clone(),
            author_id: self.author_id.clone(),
            status: self.status,
        }
    }
}

/// The summary shape used for review queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestShort {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: PrStatus,
}

/// Input for creating a pull request. `status` falls back to `Open`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPullRequest {
    pub id: String,
    pub name: String,
    pub author_id: String,
    #[serde(default)]
    pub status: Option<PrStatus>,
}

impl NewPullRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, author_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            author_id: author_id.into(),
            status: None,
        }
    }
}

/// Result of replacing one reviewer on an open pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub pull_request: PullRequest,
    pub replaced_by: String,
}
