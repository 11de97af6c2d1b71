use crate::error::{EngineError, Entity};
use core_types::{Team, TeamMember, User};
use database::{run_atomic, DbError, TransactionCoordinator, UnitOfWork};
use std::sync::Arc;

/// Team registration and lookup.
#[derive(Clone)]
pub struct TeamService {
    coordinator: Arc<dyn TransactionCoordinator>,
}

impl TeamService {
    pub fn new(coordinator: Arc<dyn TransactionCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Registers a new team and upserts its members in one atomic scope.
    ///
    /// Members that already exist are moved to this team and take the supplied
    /// name and activity flag.
    pub async fn add_team(&self, team: Team) -> Result<Team, EngineError> {
        let team = run_atomic(self.coordinator.as_ref(), move |uow| {
            Box::pin(add_team_in(uow, team))
        })
        .await?;

        tracing::info!(team = %team.name, members = team.members.len(), "Team added.");
        Ok(team)
    }

    pub async fn get_team(&self, team_name: &str) -> Result<Team, EngineError> {
        let team_name = team_name.to_string();
        run_atomic(self.coordinator.as_ref(), move |uow| {
            Box::pin(async move {
                if !uow.team_exists(&team_name).await? {
                    return Err(EngineError::not_found(Entity::Team, team_name));
                }
                let members = uow
                    .list_team_members(&team_name)
                    .await?
                    .into_iter()
                    .map(TeamMember::from)
                    .collect();
                Ok(Team {
                    name: team_name,
                    members,
                })
            })
        })
        .await
    }
}

async fn add_team_in(uow: &mut dyn UnitOfWork, team: Team) -> Result<Team, EngineError> {
    if uow.team_exists(&team.name).await? {
        return Err(EngineError::already_exists(Entity::Team, &team.name));
    }

    uow.insert_team(&team.name).await.map_err(|err| match err {
        // Lost a race with a concurrent add of the same team.
        DbError::UniqueViolation(_) => EngineError::already_exists(Entity::Team, &team.name),
        other => EngineError::Storage(other),
    })?;

    for member in &team.members {
        let user: User = member.clone().into_user(&team.name);
        uow.upsert_user(&user).await?;
    }

    Ok(team)
}
