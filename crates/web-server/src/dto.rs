//! JSON shapes of the HTTP API and their conversions to and from the domain
//! types.

use chrono::{DateTime, Utc};
use core_types::{NewPullRequest, PullRequest, PullRequestShort, Reassignment, Team, TeamMember, User};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemberDto {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamDto {
    pub team_name: String,
    pub members: Vec<TeamMemberDto>,
}

impl From<Team> for TeamDto {
    fn from(team: Team) -> Self {
        Self {
            team_name: team.name,
            members: team
                .members
                .into_iter()
                .map(|m| TeamMemberDto {
                    user_id: m.id,
                    username: m.name,
                    is_active: m.is_active,
                })
                .collect(),
        }
    }
}

impl From<TeamDto> for Team {
    fn from(dto: TeamDto) -> Self {
        Team {
            name: dto.team_name,
            members: dto
                .members
                .into_iter()
                .map(|m| TeamMember {
                    id: m.user_id,
                    name: m.username,
                    is_active: m.is_active,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub team: TeamDto,
}

#[derive(Debug, Deserialize)]
pub struct TeamQuery {
    #[serde(default)]
    pub team_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub user_id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.name,
            team_name: user.team_name,
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetIsActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: UserDto,
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestShortDto {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: String,
}

impl From<PullRequestShort> for PullRequestShortDto {
    fn from(pr: PullRequestShort) -> Self {
        Self {
            pull_request_id: pr.id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
            status: pr.status.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewQueueResponse {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShortDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestDto {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: String,
    pub assigned_reviewers: Vec<String>,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "mergedAt", skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl From<PullRequest> for PullRequestDto {
    fn from(pr: PullRequest) -> Self {
        Self {
            pull_request_id: pr.id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
            status: pr.status.to_string(),
            assigned_reviewers: pr.reviewers,
            created_at: pr.created_at,
            merged_at: pr.merged_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PullRequestResponse {
    pub pr: PullRequestDto,
}

#[derive(Debug, Deserialize)]
pub struct CreatePullRequestRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

impl From<CreatePullRequestRequest> for NewPullRequest {
    fn from(req: CreatePullRequestRequest) -> Self {
        NewPullRequest::new(req.pull_request_id, req.pull_request_name, req.author_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub pull_request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub pull_request_id: String,
    pub old_user_id: String,
}

#[derive(Debug, Serialize)]
pub struct ReassignResponse {
    pub pr: PullRequestDto,
    pub replaced_by: String,
}

impl From<Reassignment> for ReassignResponse {
    fn from(outcome: Reassignment) -> Self {
        Self {
            pr: outcome.pull_request.into(),
            replaced_by: outcome.replaced_by,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}
