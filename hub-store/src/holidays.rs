use chrono::NaiveDate;
use rusqlite::params;

use crate::db::Store;
use crate::error::Result;
use crate::types::Holiday;

impl Store {
    pub fn upsert_holiday(&self, holiday: &Holiday) -> Result<()> {
        let body = serde_json::to_string(holiday)?;
        let conn = self.write();
        conn.execute(
            "INSERT INTO holidays (id, date, body) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET date = excluded.date, body = excluded.body",
            params![holiday.id, holiday.date.to_string(), body],
        )?;
        Ok(())
    }

    pub fn delete_holiday(&self, id: &str) -> Result<()> {
        let conn = self.write();
        conn.execute("DELETE FROM holidays WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn list_holidays(&self) -> Result<Vec<Holiday>> {
        let conn = self.read();
        let mut stmt = conn.prepare("SELECT body FROM holidays ORDER BY date")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut holidays = Vec::new();
        for row in rows {
            holidays.push(serde_json::from_str(&row?)?);
        }
        Ok(holidays)
    }

    /// Used by the routine expander to apply `holiday_behavior`.
    pub fn is_holiday(&self, date: NaiveDate) -> Result<bool> {
        let conn = self.read();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM holidays WHERE date = ?1",
            params![date.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str, date: &str) -> Holiday {
        Holiday {
            id: id.to_string(),
            date: date.parse().unwrap(),
            name: "Thanksgiving".into(),
            is_custom: false,
        }
    }

    #[test]
    fn is_holiday_reflects_stored_dates() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_holiday(&sample("h1", "2026-11-26")).unwrap();
        assert!(store.is_holiday("2026-11-26".parse().unwrap()).unwrap());
        assert!(!store.is_holiday("2026-11-27".parse().unwrap()).unwrap());
    }

    #[test]
    fn delete_holiday_removes_it() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_holiday(&sample("h1", "2026-11-26")).unwrap();
        store.delete_holiday("h1").unwrap();
        assert!(store.list_holidays().unwrap().is_empty());
    }
}
