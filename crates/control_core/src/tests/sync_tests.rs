use super::*;
use crate::test_support::{arcade_board, FakeSession};

fn game_board() -> Board {
    serde_json::from_value(serde_json::json!({
        "name": "game",
        "versionId": 1,
        "scenes": [
            { "sceneId": "game1", "defaultGroups": ["vip"], "controls": [{ "controlId": "a" }] }
        ]
    }))
    .expect("board")
}

#[tokio::test]
async fn creates_scenes_banned_scene_and_groups() {
    let session = FakeSession::new();
    let report = SceneSynchronizer::new(session.as_ref())
        .synchronize(&game_board())
        .await;

    assert!(report.is_complete());
    assert_eq!(report.created_scenes, vec![SceneId::from("game1")]);
    assert!(report.created_banned_scene);
    assert_eq!(
        report.created_groups,
        vec![GroupId::from("vip"), GroupId::banned()]
    );

    let state = session.state();
    let scene_ids: Vec<&str> = state.scenes.iter().map(|s| s.scene_id.as_str()).collect();
    assert_eq!(scene_ids, vec!["game1", "banned"]);
    assert_eq!(
        state.groups,
        vec![
            Group { group_id: GroupId::from("vip"), scene_id: SceneId::from("game1") },
            Group { group_id: GroupId::banned(), scene_id: SceneId::banned() },
        ]
    );
}

#[tokio::test]
async fn second_pass_creates_nothing() {
    let session = FakeSession::new();
    let board = arcade_board();
    let synchronizer = SceneSynchronizer::new(session.as_ref());

    let first = synchronizer.synchronize(&board).await;
    assert_eq!(first.created_scenes.len(), 2);

    let second = synchronizer.synchronize(&board).await;
    assert!(second.is_complete());
    assert!(second.created_scenes.is_empty());
    assert!(!second.created_banned_scene);
    assert!(second.created_groups.is_empty());
    assert_eq!(session.state().created_scenes.len(), 2);
    assert_eq!(session.state().created_groups.len(), 1);
}

#[tokio::test]
async fn remote_only_scenes_are_left_alone() {
    let session = FakeSession::new();
    session.state().scenes.push(RemoteScene {
        scene_id: SceneId::from("legacy"),
        control_ids: Vec::new(),
    });

    SceneSynchronizer::new(session.as_ref())
        .synchronize(&game_board())
        .await;

    let state = session.state();
    assert!(state.scenes.iter().any(|s| s.scene_id.as_str() == "legacy"));
    assert_eq!(
        state.created_scenes,
        vec![vec![SceneId::from("game1")], vec![SceneId::banned()]]
    );
}

#[tokio::test]
async fn failed_stage_is_reported_and_later_stages_still_run() {
    let session = FakeSession::failing(&["createGroups"]);
    let report = SceneSynchronizer::new(session.as_ref())
        .synchronize(&game_board())
        .await;

    assert!(!report.is_complete());
    assert_eq!(report.errors.len(), 1);
    assert!(matches!(report.errors[0], SyncError::GroupCreation(_)));
    assert_eq!(report.created_scenes, vec![SceneId::from("game1")]);
    assert!(report.created_banned_scene);
}

#[tokio::test]
async fn scene_listing_failure_still_creates_banned_scene_via_refetch() {
    let session = FakeSession::failing(&["getScenes"]);
    let report = SceneSynchronizer::new(session.as_ref())
        .synchronize(&game_board())
        .await;

    assert_eq!(report.errors.len(), 2);
    assert!(matches!(report.errors[0], SyncError::SceneCreation(_)));
    assert!(matches!(report.errors[1], SyncError::BannedScene(_)));
    assert_eq!(report.created_groups.len(), 2);
}

#[tokio::test]
async fn create_scene_on_demand() {
    let session = FakeSession::new();
    let board = game_board();
    let synchronizer = SceneSynchronizer::new(session.as_ref());

    synchronizer
        .create_scene(&board, &SceneId::banned())
        .await
        .expect("banned scene needs no board entry");
    synchronizer
        .create_scene(&board, &SceneId::from("game1"))
        .await
        .expect("game1");
    let err = synchronizer
        .create_scene(&board, &SceneId::from("nope"))
        .await
        .expect_err("unknown scene");
    assert!(matches!(err, CreateSceneError::UnknownScene(_)));

    let state = session.state();
    assert_eq!(state.scenes[0].scene_id, SceneId::banned());
    assert!(state.scenes[0].control_ids.is_empty());
    assert_eq!(state.scenes[1].control_ids, vec![shared::domain::ControlId::from("a")]);
}
