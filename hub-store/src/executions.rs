use rusqlite::params;

use crate::db::Store;
use crate::error::{Result, StoreError};
use crate::types::SceneExecution;

impl Store {
    pub fn insert_execution(&self, execution: &SceneExecution) -> Result<()> {
        let body = serde_json::to_string(execution)?;
        let conn = self.write();
        conn.execute(
            "INSERT INTO scene_executions (id, scene_id, idempotency_key, body, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                execution.id,
                execution.scene_id,
                execution.idempotency_key,
                body,
                execution.started_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    pub fn update_execution(&self, execution: &SceneExecution) -> Result<()> {
        let body = serde_json::to_string(execution)?;
        let conn = self.write();
        conn.execute(
            "UPDATE scene_executions SET body = ?2 WHERE id = ?1",
            params![execution.id, body],
        )?;
        Ok(())
    }

    pub fn get_execution(&self, id: &str) -> Result<SceneExecution> {
        let conn = self.read();
        let body: String = conn
            .query_row(
                "SELECT body FROM scene_executions WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                    kind: "scene_execution",
                    id: id.to_string(),
                },
                other => StoreError::Database(other),
            })?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Finds a non-terminal execution for this idempotency key, used by
    /// `Execute` to collapse retries per spec.md §4.5 step 1.
    pub fn find_non_terminal_by_idempotency_key(&self, key: &str) -> Result<Option<SceneExecution>> {
        let conn = self.read();
        let mut stmt = conn.prepare(
            "SELECT body FROM scene_executions WHERE idempotency_key = ?1 ORDER BY started_at DESC",
        )?;
        let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        for row in rows {
            let execution: SceneExecution = serde_json::from_str(&row?)?;
            if !execution.is_terminal() {
                return Ok(Some(execution));
            }
        }
        Ok(None)
    }

    /// Finds the most recent execution (terminal or not) for this key, used
    /// to replay a terminal execution "by reference" per spec.md §4.5.
    pub fn find_latest_by_idempotency_key(&self, key: &str) -> Result<Option<SceneExecution>> {
        let conn = self.read();
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM scene_executions WHERE idempotency_key = ?1 ORDER BY started_at DESC LIMIT 1",
                params![key],
                |row| row.get(0),
            )
            .ok();
        Ok(body.map(|b| serde_json::from_str(&b)).transpose()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExecutionStatus, StepRecord};
    use chrono::Utc;

    fn sample(id: &str, scene_id: &str, key: Option<&str>) -> SceneExecution {
        SceneExecution {
            id: id.to_string(),
            scene_id: scene_id.to_string(),
            idempotency_key: key.map(str::to_string),
            status: ExecutionStatus::Starting,
            coordinator_used: None,
            started_at: Utc::now(),
            ended_at: None,
            verification: None,
            error: None,
            steps: StepRecord::initial_steps(),
        }
    }

    #[test]
    fn finds_non_terminal_execution_by_idempotency_key() {
        let store = Store::open_in_memory().unwrap();
        store.insert_execution(&sample("e1", "s1", Some("K-1"))).unwrap();
        let found = store.find_non_terminal_by_idempotency_key("K-1").unwrap();
        assert_eq!(found.unwrap().id, "e1");
    }

    #[test]
    fn terminal_execution_is_not_returned_as_non_terminal() {
        let store = Store::open_in_memory().unwrap();
        let mut exec = sample("e1", "s1", Some("K-1"));
        exec.status = ExecutionStatus::PlayingConfirmed;
        store.insert_execution(&exec).unwrap();
        assert!(store.find_non_terminal_by_idempotency_key("K-1").unwrap().is_none());
        assert!(store.find_latest_by_idempotency_key("K-1").unwrap().is_some());
    }

    #[test]
    fn update_execution_persists_status_change() {
        let store = Store::open_in_memory().unwrap();
        let mut exec = sample("e1", "s1", None);
        store.insert_execution(&exec).unwrap();
        exec.status = ExecutionStatus::Failed;
        store.update_execution(&exec).unwrap();
        assert_eq!(store.get_execution("e1").unwrap().status, ExecutionStatus::Failed);
    }
}
