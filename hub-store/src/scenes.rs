use chrono::Utc;
use rusqlite::params;

use crate::db::Store;
use crate::error::{Result, StoreError};
use crate::types::Scene;

impl Store {
    pub fn upsert_scene(&self, scene: &Scene) -> Result<()> {
        let body = serde_json::to_string(scene)?;
        let now = Utc::now().timestamp();
        let conn = self.write();
        conn.execute(
            "INSERT INTO scenes (id, body, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![scene.id, body, now],
        )?;
        Ok(())
    }

    pub fn get_scene(&self, id: &str) -> Result<Scene> {
        let conn = self.read();
        let body: String = conn
            .query_row("SELECT body FROM scenes WHERE id = ?1", params![id], |row| row.get(0))
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                    kind: "scene",
                    id: id.to_string(),
                },
                other => StoreError::Database(other),
            })?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn list_scenes(&self) -> Result<Vec<Scene>> {
        let conn = self.read();
        let mut stmt = conn.prepare("SELECT body FROM scenes ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut scenes = Vec::new();
        for row in rows {
            scenes.push(serde_json::from_str(&row?)?);
        }
        Ok(scenes)
    }

    pub fn delete_scene(&self, id: &str) -> Result<()> {
        let conn = self.write();
        conn.execute("DELETE FROM scenes WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CoordinatorPreference, FallbackPolicy, Teardown, VolumeRamp};

    fn sample_scene(id: &str) -> Scene {
        Scene {
            id: id.to_string(),
            name: "Movie Night".into(),
            description: None,
            members: vec![],
            coordinator_preference: CoordinatorPreference::ArcFirst,
            fallback_policy: FallbackPolicy::PlaybaseIfArcTvActive,
            volume_ramp: VolumeRamp::default(),
            teardown: Teardown::default(),
        }
    }

    #[test]
    fn roundtrips_a_scene() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_scene(&sample_scene("s1")).unwrap();
        let loaded = store.get_scene("s1").unwrap();
        assert_eq!(loaded.name, "Movie Night");
    }

    #[test]
    fn missing_scene_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(store.get_scene("missing"), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn upsert_overwrites_existing() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_scene(&sample_scene("s1")).unwrap();
        let mut updated = sample_scene("s1");
        updated.name = "Party Mode".into();
        store.upsert_scene(&updated).unwrap();
        assert_eq!(store.get_scene("s1").unwrap().name, "Party Mode");
        assert_eq!(store.list_scenes().unwrap().len(), 1);
    }
}
