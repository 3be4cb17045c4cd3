//! Step 5: `load_content` — spec.md §4.5.
//!
//! Resolves a routine/override's music policy to a `(uri, metadata)` pair.
//! `FIXED` reads straight from the policy; `ROTATION`/`SHUFFLE` delegate
//! the stateful pick to `hub_store::Store::pick_next_music_item`, which
//! already implements the round-robin/no-repeat-window rules.

use hub_store::types::{MusicPolicy, MusicPolicyKind};
use hub_store::Store;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone)]
pub struct ResolvedContent {
    pub uri: String,
    pub metadata: String,
}

pub fn resolve_content(store: &Store, policy: &MusicPolicy) -> Result<ResolvedContent> {
    match policy.kind {
        MusicPolicyKind::Fixed => resolve_fixed(policy),
        MusicPolicyKind::Rotation | MusicPolicyKind::Shuffle => {
            let set_id = policy
                .music_set_id
                .as_deref()
                .ok_or_else(|| EngineError::SonosRejected("music policy has no music_set_id".into()))?;
            let item = store
                .pick_next_music_item(set_id, policy.no_repeat_window_minutes)
                .map_err(EngineError::from)?
                .ok_or_else(|| EngineError::SonosRejected("music set is empty".into()))?;
            Ok(ResolvedContent {
                uri: format!("x-sonosapi-stream:{}?sid={}", item.favorite_id, item.service_name),
                metadata: item.content_metadata.to_string(),
            })
        }
    }
}

fn resolve_fixed(policy: &MusicPolicy) -> Result<ResolvedContent> {
    if let Some(content) = &policy.direct_content {
        let uri = content
            .get("uri")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::SonosRejected("direct_content missing uri".into()))?;
        let metadata = content
            .get("metadata")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        return Ok(ResolvedContent {
            uri: uri.to_string(),
            metadata: metadata.to_string(),
        });
    }
    if let Some(favorite_id) = &policy.favorite_id {
        return Ok(ResolvedContent {
            uri: format!("x-sonosapi-hlsradio:{favorite_id}"),
            metadata: String::new(),
        });
    }
    Err(EngineError::SonosRejected("FIXED policy has neither direct_content nor favorite_id".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(kind: MusicPolicyKind) -> MusicPolicy {
        MusicPolicy {
            kind,
            favorite_id: None,
            music_set_id: None,
            direct_content: None,
            no_repeat_window_minutes: 10_080,
        }
    }

    #[test]
    fn fixed_uses_direct_content_uri() {
        let mut p = policy(MusicPolicyKind::Fixed);
        p.direct_content = Some(serde_json::json!({"uri": "x-file-cifs://nas/song.mp3", "metadata": "<DIDL/>"}));
        let resolved = resolve_fixed(&p).unwrap();
        assert_eq!(resolved.uri, "x-file-cifs://nas/song.mp3");
    }

    #[test]
    fn fixed_falls_back_to_favorite_id() {
        let mut p = policy(MusicPolicyKind::Fixed);
        p.favorite_id = Some("fav-42".into());
        let resolved = resolve_fixed(&p).unwrap();
        assert!(resolved.uri.contains("fav-42"));
    }

    #[test]
    fn rotation_requires_music_set_id() {
        let store = Store::open_in_memory().unwrap();
        let p = policy(MusicPolicyKind::Rotation);
        assert!(resolve_content(&store, &p).is_err());
    }
}
