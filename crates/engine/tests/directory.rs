mod common;

use common::{fixture_store, services, stored_pr, stored_user, OTHER_TEAM, TEST_TEAM};
use core_types::{PrStatus, Team, TeamMember};
use engine::{EngineError, Entity};
use std::sync::Arc;

fn member(id: &str, name: &str, is_active: bool) -> TeamMember {
    TeamMember {
        id: id.to_string(),
        name: name.to_string(),
        is_active,
    }
}

#[tokio::test]
async fn add_team_then_get_it_back() {
    let store = fixture_store().await;
    let services = services(Arc::new(store.clone()));

    let added = services
        .teams
        .add_team(Team {
            name: "backend".to_string(),
            members: vec![member("b1", "Alice", true), member("b2", "Bob", false)],
        })
        .await
        .unwrap();
    assert_eq!(added.name, "backend");
    assert_eq!(added.members.len(), 2);

    let fetched = services.teams.get_team("backend").await.unwrap();
    assert_eq!(fetched.name, "backend");
    assert_eq!(
        fetched.members,
        vec![member("b1", "Alice", true), member("b2", "Bob", false)]
    );

    let bob = stored_user(&store, "b2").await;
    assert_eq!(bob.team_name, "backend");
    assert!(!bob.is_active);
}

#[tokio::test]
async fn add_existing_team_is_already_exists_and_changes_nothing() {
    let store = fixture_store().await;
    let services = services(Arc::new(store.clone()));

    let err = services
        .teams
        .add_team(Team {
            name: TEST_TEAM.to_string(),
            members: vec![member("u1", "Renamed", false)],
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::AlreadyExists { entity: Entity::Team, ref id } if id == TEST_TEAM
    ));
    let u1 = stored_user(&store, "u1").await;
    assert_eq!(u1.name, "User One");
    assert!(u1.is_active);
}

#[tokio::test]
async fn add_team_moves_existing_members() {
    let store = fixture_store().await;
    let services = services(Arc::new(store.clone()));

    services
        .teams
        .add_team(Team {
            name: "platform".to_string(),
            members: vec![member("u5", "User Five", true)],
        })
        .await
        .unwrap();

    assert_eq!(stored_user(&store, "u5").await.team_name, "platform");
    let other = services.teams.get_team(OTHER_TEAM).await.unwrap();
    assert!(other.members.iter().all(|m| m.id != "u5"));
    // Reviewer links survive the move.
    assert_eq!(stored_pr(&store, "pr3").await.unwrap().reviewers, vec!["u5".to_string()]);
}

#[tokio::test]
async fn add_team_without_members() {
    let store = fixture_store().await;
    let services = services(Arc::new(store.clone()));

    services
        .teams
        .add_team(Team {
            name: "empty".to_string(),
            members: Vec::new(),
        })
        .await
        .unwrap();

    let team = services.teams.get_team("empty").await.unwrap();
    assert!(team.members.is_empty());
}

#[tokio::test]
async fn get_unknown_team_is_not_found() {
    let store = fixture_store().await;
    let services = services(Arc::new(store.clone()));

    let err = services.teams.get_team("ghosts").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: Entity::Team, .. }));
}

#[tokio::test]
async fn get_team_lists_inactive_members_too() {
    let store = fixture_store().await;
    let services = services(Arc::new(store.clone()));

    let team = services.teams.get_team(OTHER_TEAM).await.unwrap();
    let ids: Vec<_> = team.members.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["u4", "u5", "u6"]);
    assert!(!team.members[2].is_active);
}

#[tokio::test]
async fn set_active_toggles_the_flag() {
    let store = fixture_store().await;
    let services = services(Arc::new(store.clone()));

    let user = services.users.set_active("u6", true).await.unwrap();
    assert!(user.is_active);
    assert_eq!(user.team_name, OTHER_TEAM);
    assert!(stored_user(&store, "u6").await.is_active);

    let user = services.users.set_active("u6", false).await.unwrap();
    assert!(!user.is_active);
}

#[tokio::test]
async fn set_active_on_unknown_user_is_not_found() {
    let store = fixture_store().await;
    let services = services(Arc::new(store.clone()));

    let err = services.users.set_active("nobody", false).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: Entity::User, ref id } if id == "nobody"));
}

#[tokio::test]
async fn review_queue_lists_every_linked_pull_request() {
    let store = fixture_store().await;
    let services = services(Arc::new(store.clone()));

    let mut queue = services.users.review_queue("u2").await.unwrap();
    queue.sort_by(|a, b| a.id.cmp(&b.id));

    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].id, "pr1");
    assert_eq!(queue[0].status, PrStatus::Open);
    assert_eq!(queue[1].id, "pr2");
    assert_eq!(queue[1].status, PrStatus::Merged);
    assert_eq!(queue[1].author_id, "u1");
}

#[tokio::test]
async fn review_queue_of_user_without_reviews_is_empty() {
    let store = fixture_store().await;
    let services = services(Arc::new(store.clone()));

    assert!(services.users.review_queue("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn review_queue_of_unknown_user_is_not_found() {
    let store = fixture_store().await;
    let services = services(Arc::new(store.clone()));

    let err = services.users.review_queue("nobody").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: Entity::User, .. }));
}

#[tokio::test]
async fn review_queue_follows_reassignment() {
    let store = fixture_store().await;
    let services = services(Arc::new(store.clone()));
    services
        .teams
        .add_team(Team {
            name: "platform".to_string(),
            members: vec![member("p1", "P One", true), member("p2", "P Two", true)],
        })
        .await
        .unwrap();
    // Move u5 into a team with spare reviewers, then hand pr3 over.
    services
        .teams
        .add_team(Team {
            name: "infra".to_string(),
            members: vec![member("u5", "User Five", true), member("i1", "Infra", true)],
        })
        .await
        .unwrap();

    let outcome = services.pull_requests.reassign("pr3", "u5").await.unwrap();
    assert_eq!(outcome.replaced_by, "i1");

    assert!(services.users.review_queue("u5").await.unwrap().is_empty());
    let queue = services.users.review_queue("i1").await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, "pr3");
}
