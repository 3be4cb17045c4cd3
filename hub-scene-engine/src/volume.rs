//! Step 4: `set_volume` — spec.md §4.5. Ramp curves sample the member's
//! volume path from its current value to `target_volume` over
//! `duration_ms`, in ~20 steps.

use std::time::Duration;

use hub_api::PlayerActions;
use hub_store::types::{RampCurve, SceneMember, VolumeRamp};

use crate::error::EngineError;

const RAMP_SAMPLES: u32 = 20;

fn curve_value(curve: RampCurve, t: f64) -> f64 {
    match curve {
        RampCurve::Linear => t,
        RampCurve::EaseIn => t * t,
        RampCurve::EaseOut => 1.0 - (1.0 - t).powi(2),
    }
}

fn ramp_steps(start: u8, target: u8, curve: RampCurve) -> Vec<u8> {
    let start = start as f64;
    let target = target as f64;
    (1..=RAMP_SAMPLES)
        .map(|i| {
            let t = i as f64 / RAMP_SAMPLES as f64;
            let eased = curve_value(curve, t);
            (start + (target - start) * eased).round().clamp(0.0, 100.0) as u8
        })
        .collect()
}

/// Applies volume (ramped or direct) then mute, for every member with a
/// target set. Per-member failures are recorded but non-fatal.
pub async fn set_volume(
    actions: &PlayerActions,
    members: &[(SceneMember, String)],
    ramp: &VolumeRamp,
) -> Vec<(String, bool, Option<String>)> {
    let mut results = Vec::new();

    for (member, ip) in members {
        if let Some(target) = member.target_volume {
            let outcome = if ramp.enabled {
                apply_ramp(actions, ip, target, ramp).await
            } else {
                actions.set_volume(ip, target).await.map_err(EngineError::from)
            };
            results.push((member.udn.clone(), outcome.is_ok(), outcome.err().map(|e| e.to_string())));
        }

        if let Some(mute) = member.mute {
            let outcome = actions.set_mute(ip, mute).await.map_err(EngineError::from);
            results.push((format!("{}:mute", member.udn), outcome.is_ok(), outcome.err().map(|e| e.to_string())));
        }
    }

    results
}

async fn apply_ramp(
    actions: &PlayerActions,
    ip: &str,
    target: u8,
    ramp: &VolumeRamp,
) -> Result<(), EngineError> {
    let current = actions.get_volume(ip).await.unwrap_or(target);
    let steps = ramp_steps(current, target, ramp.curve);
    let interval = Duration::from_millis(ramp.duration_ms as u64 / RAMP_SAMPLES.max(1) as u64);

    for step in steps {
        actions.set_volume(ip, step).await.map_err(EngineError::from)?;
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_ramp_ends_at_target() {
        let steps = ramp_steps(0, 50, RampCurve::Linear);
        assert_eq!(steps.len() as u32, RAMP_SAMPLES);
        assert_eq!(*steps.last().unwrap(), 50);
    }

    #[test]
    fn ease_in_starts_slower_than_linear() {
        let linear = ramp_steps(0, 100, RampCurve::Linear);
        let ease_in = ramp_steps(0, 100, RampCurve::EaseIn);
        assert!(ease_in[0] <= linear[0]);
        assert_eq!(*ease_in.last().unwrap(), 100);
    }

    #[test]
    fn ease_out_reaches_target_quickly() {
        let ease_out = ramp_steps(0, 100, RampCurve::EaseOut);
        assert!(ease_out[0] >= ramp_steps(0, 100, RampCurve::Linear)[0]);
        assert_eq!(*ease_out.last().unwrap(), 100);
    }
}
