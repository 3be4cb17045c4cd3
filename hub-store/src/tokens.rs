use rusqlite::params;

use crate::db::Store;
use crate::error::{Result, StoreError};
use crate::types::CloudToken;

impl Store {
    pub fn upsert_token(&self, token: &CloudToken) -> Result<()> {
        let body = serde_json::to_string(token)?;
        let conn = self.write();
        conn.execute(
            "INSERT INTO cloud_tokens (provider, body) VALUES (?1, ?2)
             ON CONFLICT(provider) DO UPDATE SET body = excluded.body",
            params![token.provider, body],
        )?;
        Ok(())
    }

    pub fn get_token(&self, provider: &str) -> Result<CloudToken> {
        let conn = self.read();
        let body: String = conn
            .query_row(
                "SELECT body FROM cloud_tokens WHERE provider = ?1",
                params![provider],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                    kind: "cloud_token",
                    id: provider.to_string(),
                },
                other => StoreError::Database(other),
            })?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn roundtrips_a_token() {
        let store = Store::open_in_memory().unwrap();
        let token = CloudToken {
            provider: "sonos-cloud".into(),
            access_token: "abc".into(),
            refresh_token: Some("def".into()),
            expires_at: Utc::now(),
        };
        store.upsert_token(&token).unwrap();
        assert_eq!(store.get_token("sonos-cloud").unwrap().access_token, "abc");
    }

    #[test]
    fn missing_token_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(store.get_token("nope"), Err(StoreError::NotFound { .. })));
    }
}
