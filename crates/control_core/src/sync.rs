use std::collections::HashSet;

use interactive_integration::{InteractiveSession, RemoteScene};
use shared::domain::{Board, Group, GroupId, Scene, SceneId};
use tracing::{info, warn};

use crate::error::{CreateSceneError, SyncError};

#[derive(Debug, Default)]
pub struct SyncReport {
    pub created_scenes: Vec<SceneId>,
    pub created_banned_scene: bool,
    pub created_groups: Vec<GroupId>,
    pub errors: Vec<SyncError>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Additive reconciliation of local scenes and groups into the remote
/// session. Remote-only scenes and groups are never removed.
pub struct SceneSynchronizer<'a> {
    session: &'a dyn InteractiveSession,
}

impl<'a> SceneSynchronizer<'a> {
    pub fn new(session: &'a dyn InteractiveSession) -> Self {
        Self { session }
    }

    /// Runs every stage even when an earlier one fails; each failure is
    /// recorded once in the report.
    pub async fn synchronize(&self, board: &Board) -> SyncReport {
        let mut report = SyncReport::default();

        let remote_scenes = match self.create_missing_scenes(board).await {
            Ok((remote, created)) => {
                report.created_scenes = created;
                Some(remote)
            }
            Err(err) => {
                warn!(board = %board.name, "sync: {err}");
                report.errors.push(err);
                None
            }
        };

        match self.ensure_banned_scene(remote_scenes.as_deref()).await {
            Ok(created) => report.created_banned_scene = created,
            Err(err) => {
                warn!(board = %board.name, "sync: {err}");
                report.errors.push(err);
            }
        }

        match self.create_missing_groups(board).await {
            Ok(created) => report.created_groups = created,
            Err(err) => {
                warn!(board = %board.name, "sync: {err}");
                report.errors.push(err);
            }
        }

        info!(
            board = %board.name,
            scenes = report.created_scenes.len(),
            banned = report.created_banned_scene,
            groups = report.created_groups.len(),
            failed_stages = report.errors.len(),
            "sync: finished"
        );
        report
    }

    async fn create_missing_scenes(
        &self,
        board: &Board,
    ) -> Result<(Vec<RemoteScene>, Vec<SceneId>), SyncError> {
        let mut remote = self
            .session
            .get_scenes()
            .await
            .map_err(SyncError::SceneCreation)?;
        let existing: HashSet<&SceneId> = remote.iter().map(|scene| &scene.scene_id).collect();

        let missing: Vec<Scene> = board
            .scenes
            .iter()
            .filter(|scene| !scene.scene_id.is_banned() && !existing.contains(&scene.scene_id))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok((remote, Vec::new()));
        }

        let created: Vec<SceneId> = missing.iter().map(|scene| scene.scene_id.clone()).collect();
        let added: Vec<RemoteScene> = missing
            .iter()
            .map(|scene| RemoteScene {
                scene_id: scene.scene_id.clone(),
                control_ids: scene
                    .controls
                    .iter()
                    .map(|control| control.control_id.clone())
                    .collect(),
            })
            .collect();
        self.session
            .create_scenes(missing)
            .await
            .map_err(SyncError::SceneCreation)?;
        info!(scenes = ?created, "sync: created scenes");

        remote.extend(added);
        Ok((remote, created))
    }

    async fn ensure_banned_scene(&self, known: Option<&[RemoteScene]>) -> Result<bool, SyncError> {
        let exists = match known {
            Some(scenes) => scenes.iter().any(|scene| scene.scene_id.is_banned()),
            None => self
                .session
                .get_scenes()
                .await
                .map_err(SyncError::BannedScene)?
                .iter()
                .any(|scene| scene.scene_id.is_banned()),
        };
        if exists {
            return Ok(false);
        }

        self.session
            .create_scenes(vec![Scene::banned()])
            .await
            .map_err(SyncError::BannedScene)?;
        info!("sync: created banned scene");
        Ok(true)
    }

    async fn create_missing_groups(&self, board: &Board) -> Result<Vec<GroupId>, SyncError> {
        let remote = self
            .session
            .get_groups()
            .await
            .map_err(SyncError::GroupCreation)?;
        let existing: HashSet<&GroupId> = remote.iter().map(|group| &group.group_id).collect();

        let missing: Vec<Group> = board
            .groups()
            .into_iter()
            .filter(|group| !existing.contains(&group.group_id))
            .collect();
        if missing.is_empty() {
            return Ok(Vec::new());
        }

        let created: Vec<GroupId> = missing.iter().map(|group| group.group_id.clone()).collect();
        self.session
            .create_groups(missing)
            .await
            .map_err(SyncError::GroupCreation)?;
        info!(groups = ?created, "sync: created groups");
        Ok(created)
    }

    /// Creates one scene on demand. The reserved banned scene is created with
    /// no controls without consulting the board.
    pub async fn create_scene(&self, board: &Board, scene_id: &SceneId) -> Result<(), CreateSceneError> {
        let scene = if scene_id.is_banned() {
            Scene::banned()
        } else {
            board
                .scene(scene_id)
                .cloned()
                .ok_or_else(|| CreateSceneError::UnknownScene(scene_id.clone()))?
        };

        self.session
            .create_scenes(vec![scene])
            .await
            .map_err(|source| CreateSceneError::Remote {
                scene_id: scene_id.clone(),
                source,
            })?;
        info!(%scene_id, "sync: created scene on demand");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/sync_tests.rs"]
mod tests;
