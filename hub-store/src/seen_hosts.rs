//! Records which hosts discovery has successfully reached, so the next
//! unicast probe set can include hosts "remembered... seen within the
//! last 7 days" per spec.md §4.1, even if a multicast pass misses them.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::db::Store;
use crate::error::Result;

impl Store {
    pub fn record_seen_hosts(&self, hosts: &[String], now: DateTime<Utc>) -> Result<()> {
        let conn = self.write();
        for host in hosts {
            conn.execute(
                "INSERT INTO seen_hosts (host, last_seen_at) VALUES (?1, ?2)
                 ON CONFLICT(host) DO UPDATE SET last_seen_at = excluded.last_seen_at",
                params![host, now.timestamp()],
            )?;
        }
        Ok(())
    }

    /// Hosts seen at or after `since` (the caller passes `now - 7 days`).
    pub fn recent_hosts(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        let conn = self.read();
        let mut stmt = conn.prepare("SELECT host FROM seen_hosts WHERE last_seen_at >= ?1")?;
        let rows = stmt.query_map(params![since.timestamp()], |row| row.get::<_, String>(0))?;
        let mut hosts = Vec::new();
        for row in rows {
            hosts.push(row?);
        }
        Ok(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_hosts_excludes_stale_entries() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        store.record_seen_hosts(&["10.0.0.1".to_string()], now - chrono::Duration::days(10)).unwrap();
        store.record_seen_hosts(&["10.0.0.2".to_string()], now).unwrap();

        let recent = store.recent_hosts(now - chrono::Duration::days(7)).unwrap();
        assert_eq!(recent, vec!["10.0.0.2".to_string()]);
    }

    #[test]
    fn reseeing_a_host_refreshes_its_timestamp() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        store.record_seen_hosts(&["10.0.0.1".to_string()], now - chrono::Duration::days(10)).unwrap();
        store.record_seen_hosts(&["10.0.0.1".to_string()], now).unwrap();

        let recent = store.recent_hosts(now - chrono::Duration::days(7)).unwrap();
        assert_eq!(recent, vec!["10.0.0.1".to_string()]);
    }
}
