//! Persisted data model — spec.md §3.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorPreference {
    ArcFirst,
}

impl Default for CoordinatorPreference {
    fn default() -> Self {
        Self::ArcFirst
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackPolicy {
    PlaybaseIfArcTvActive,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::PlaybaseIfArcTvActive
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampCurve {
    Linear,
    EaseIn,
    EaseOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeRamp {
    pub enabled: bool,
    pub duration_ms: u32,
    pub curve: RampCurve,
}

impl Default for VolumeRamp {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_ms: 0,
            curve: RampCurve::Linear,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teardown {
    pub restore_previous_state: bool,
    pub ungroup_after_ms: u32,
}

impl Default for Teardown {
    fn default() -> Self {
        Self {
            restore_previous_state: false,
            ungroup_after_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneMember {
    pub udn: String,
    pub target_volume: Option<u8>,
    pub mute: Option<bool>,
    pub room_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<SceneMember>,
    #[serde(default)]
    pub coordinator_preference: CoordinatorPreference,
    #[serde(default)]
    pub fallback_policy: FallbackPolicy,
    #[serde(default)]
    pub volume_ramp: VolumeRamp,
    #[serde(default)]
    pub teardown: Teardown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Starting,
    Grouping,
    PlayingUnverified,
    PlayingConfirmed,
    Failed,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    AcquireLock,
    ChooseCoordinator,
    GroupMembers,
    SetVolume,
    LoadContent,
    StartPlayback,
    VerifyPlayback,
    ReleaseLock,
}

pub const STEP_ORDER: [StepName; 8] = [
    StepName::AcquireLock,
    StepName::ChooseCoordinator,
    StepName::GroupMembers,
    StepName::SetVolume,
    StepName::LoadContent,
    StepName::StartPlayback,
    StepName::VerifyPlayback,
    StepName::ReleaseLock,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: StepName,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub details: Option<String>,
    pub error: Option<String>,
}

impl StepRecord {
    fn pending(name: StepName) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            started_at: None,
            ended_at: None,
            details: None,
            error: None,
        }
    }

    pub fn initial_steps() -> Vec<StepRecord> {
        STEP_ORDER.iter().map(|n| StepRecord::pending(*n)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub confirmed: bool,
    pub verification_unavailable: bool,
    pub observed_track_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionError {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneExecution {
    pub id: String,
    pub scene_id: String,
    pub idempotency_key: Option<String>,
    pub status: ExecutionStatus,
    pub coordinator_used: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub verification: Option<VerificationRecord>,
    pub error: Option<ExecutionError>,
    pub steps: Vec<StepRecord>,
}

impl SceneExecution {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ExecutionStatus::PlayingUnverified
                | ExecutionStatus::PlayingConfirmed
                | ExecutionStatus::Failed
                | ExecutionStatus::Canceled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HolidayBehavior {
    Run,
    Skip,
    ShiftToNext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    Weekly { weekdays: Vec<Weekday>, hour: u8, minute: u8 },
    OneShot { at: DateTime<Utc> },
    Cron { expr: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MusicPolicyKind {
    Fixed,
    Rotation,
    Shuffle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicPolicy {
    pub kind: MusicPolicyKind,
    pub favorite_id: Option<String>,
    pub music_set_id: Option<String>,
    pub direct_content: Option<serde_json::Value>,
    #[serde(default = "default_no_repeat_window_minutes")]
    pub no_repeat_window_minutes: u32,
}

fn default_no_repeat_window_minutes() -> u32 {
    10_080
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    pub name: String,
    pub scene_id: String,
    pub timezone: String,
    pub schedule: Schedule,
    pub holiday_behavior: HolidayBehavior,
    pub enabled: bool,
    pub snooze_until: Option<DateTime<Utc>>,
    pub skip_next: bool,
    pub music_policy: MusicPolicy,
    pub template_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Claimed,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub routine_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: JobStatus,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the job transitioned into `Claimed`; used by the recovery
    /// sweep to detect a stale claim (spec.md §4.6).
    pub claimed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holiday {
    pub id: String,
    pub date: NaiveDate,
    pub name: String,
    pub is_custom: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionPolicy {
    Rotation,
    Shuffle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicSetItem {
    pub favorite_id: String,
    pub content_metadata: serde_json::Value,
    pub service_name: String,
    pub service_logo: Option<String>,
    pub artwork: Option<String>,
    pub last_played_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MusicSet {
    pub id: String,
    pub name: String,
    pub selection_policy: SelectionPolicy,
    pub current_index: u32,
    pub items: Vec<MusicSetItem>,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudToken {
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}
