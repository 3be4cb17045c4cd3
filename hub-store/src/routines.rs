use chrono::Utc;
use rusqlite::params;

use crate::db::Store;
use crate::error::{Result, StoreError};
use crate::types::Routine;

impl Store {
    pub fn upsert_routine(&self, routine: &Routine) -> Result<()> {
        let body = serde_json::to_string(routine)?;
        let now = Utc::now().timestamp();
        let conn = self.write();
        conn.execute(
            "INSERT INTO routines (id, body, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![routine.id, body, now],
        )?;
        Ok(())
    }

    pub fn get_routine(&self, id: &str) -> Result<Routine> {
        let conn = self.read();
        let body: String = conn
            .query_row("SELECT body FROM routines WHERE id = ?1", params![id], |row| row.get(0))
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                    kind: "routine",
                    id: id.to_string(),
                },
                other => StoreError::Database(other),
            })?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn list_enabled_routines(&self) -> Result<Vec<Routine>> {
        let conn = self.read();
        let mut stmt = conn.prepare("SELECT body FROM routines ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut routines = Vec::new();
        for row in rows {
            let routine: Routine = serde_json::from_str(&row?)?;
            if routine.enabled {
                routines.push(routine);
            }
        }
        Ok(routines)
    }

    pub fn delete_routine(&self, id: &str) -> Result<()> {
        let conn = self.write();
        // Cascade: PENDING jobs for a deleted routine are removed (spec.md §3 Job invariant).
        conn.execute(
            "DELETE FROM jobs WHERE routine_id = ?1 AND status = 'PENDING'",
            params![id],
        )?;
        conn.execute("DELETE FROM routines WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HolidayBehavior, MusicPolicy, MusicPolicyKind, Schedule, Weekday};

    fn sample(id: &str, enabled: bool) -> Routine {
        Routine {
            id: id.to_string(),
            name: "Morning".into(),
            scene_id: "s1".into(),
            timezone: "America/New_York".into(),
            schedule: Schedule::Weekly {
                weekdays: vec![Weekday::Mon, Weekday::Tue],
                hour: 7,
                minute: 30,
            },
            holiday_behavior: HolidayBehavior::Skip,
            enabled,
            snooze_until: None,
            skip_next: false,
            music_policy: MusicPolicy {
                kind: MusicPolicyKind::Fixed,
                favorite_id: None,
                music_set_id: None,
                direct_content: None,
                no_repeat_window_minutes: 10_080,
            },
            template_id: None,
        }
    }

    #[test]
    fn list_enabled_excludes_disabled() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_routine(&sample("r1", true)).unwrap();
        store.upsert_routine(&sample("r2", false)).unwrap();
        let enabled = store.list_enabled_routines().unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id, "r1");
    }

    #[test]
    fn delete_cascades_pending_jobs_only() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_routine(&sample("r1", true)).unwrap();
        let now = Utc::now();
        store.create_pending_job("r1", now).unwrap();
        store.delete_routine("r1").unwrap();
        assert!(store.due_jobs(now, 10).unwrap().is_empty());
    }
}
