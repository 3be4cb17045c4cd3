use chrono::Utc;
use rand::Rng;
use rusqlite::params;

use crate::db::Store;
use crate::error::{Result, StoreError};
use crate::types::{MusicSet, SelectionPolicy};

impl Store {
    pub fn upsert_music_set(&self, set: &MusicSet) -> Result<()> {
        let body = serde_json::to_string(set)?;
        let conn = self.write();
        conn.execute(
            "INSERT INTO music_sets (id, body, deleted) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET body = excluded.body, deleted = excluded.deleted",
            params![set.id, body, set.deleted as i64],
        )?;
        Ok(())
    }

    pub fn get_music_set(&self, id: &str) -> Result<MusicSet> {
        let conn = self.read();
        let body: String = conn
            .query_row("SELECT body FROM music_sets WHERE id = ?1", params![id], |row| row.get(0))
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                    kind: "music_set",
                    id: id.to_string(),
                },
                other => StoreError::Database(other),
            })?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn list_music_sets(&self) -> Result<Vec<MusicSet>> {
        let conn = self.read();
        let mut stmt = conn.prepare("SELECT body FROM music_sets WHERE deleted = 0 ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut sets = Vec::new();
        for row in rows {
            sets.push(serde_json::from_str(&row?)?);
        }
        Ok(sets)
    }

    /// Soft delete — a routine referencing this set by id keeps failing
    /// loudly rather than silently falling back, per spec.md §4.7.
    pub fn soft_delete_music_set(&self, id: &str) -> Result<()> {
        let mut set = self.get_music_set(id)?;
        set.deleted = true;
        self.upsert_music_set(&set)
    }

    /// Picks the next item per the set's selection policy and records it as
    /// played. ROTATION advances `current_index` round-robin; SHUFFLE picks
    /// uniformly among items outside the routine's `no_repeat_window`.
    pub fn pick_next_music_item(
        &self,
        id: &str,
        no_repeat_window_minutes: u32,
    ) -> Result<Option<crate::types::MusicSetItem>> {
        let mut set = self.get_music_set(id)?;
        if set.items.is_empty() {
            return Ok(None);
        }
        let now = Utc::now();
        let cutoff = now - chrono::Duration::minutes(no_repeat_window_minutes as i64);

        let chosen_index = match set.selection_policy {
            SelectionPolicy::Rotation => (set.current_index as usize) % set.items.len(),
            SelectionPolicy::Shuffle => {
                let eligible: Vec<usize> = set
                    .items
                    .iter()
                    .enumerate()
                    .filter(|(_, item)| item.last_played_at.map_or(true, |played| played < cutoff))
                    .map(|(i, _)| i)
                    .collect();
                let pool = if eligible.is_empty() {
                    (0..set.items.len()).collect::<Vec<_>>()
                } else {
                    eligible
                };
                let pick = rand::thread_rng().gen_range(0..pool.len());
                pool[pick]
            }
        };

        set.items[chosen_index].last_played_at = Some(now);
        set.current_index = ((chosen_index + 1) % set.items.len()) as u32;
        let item = set.items[chosen_index].clone();
        self.upsert_music_set(&set)?;
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MusicSetItem;

    fn item(id: &str) -> MusicSetItem {
        MusicSetItem {
            favorite_id: id.to_string(),
            content_metadata: serde_json::json!({}),
            service_name: "spotify".into(),
            service_logo: None,
            artwork: None,
            last_played_at: None,
        }
    }

    fn sample(policy: SelectionPolicy) -> MusicSet {
        MusicSet {
            id: "ms1".into(),
            name: "Chill".into(),
            selection_policy: policy,
            current_index: 0,
            items: vec![item("a"), item("b"), item("c")],
            deleted: false,
        }
    }

    #[test]
    fn rotation_advances_round_robin() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_music_set(&sample(SelectionPolicy::Rotation)).unwrap();
        let first = store.pick_next_music_item("ms1", 10_080).unwrap().unwrap();
        let second = store.pick_next_music_item("ms1", 10_080).unwrap().unwrap();
        assert_eq!(first.favorite_id, "a");
        assert_eq!(second.favorite_id, "b");
    }

    #[test]
    fn shuffle_avoids_recently_played_within_window() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_music_set(&sample(SelectionPolicy::Shuffle)).unwrap();
        let first = store.pick_next_music_item("ms1", 10_080).unwrap().unwrap();
        let second = store.pick_next_music_item("ms1", 10_080).unwrap().unwrap();
        assert_ne!(first.favorite_id, second.favorite_id);
    }

    #[test]
    fn soft_delete_excludes_from_listing() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_music_set(&sample(SelectionPolicy::Rotation)).unwrap();
        store.soft_delete_music_set("ms1").unwrap();
        assert!(store.list_music_sets().unwrap().is_empty());
        assert!(store.get_music_set("ms1").unwrap().deleted);
    }
}
