//! Program configuration: DJs, format clocks/slots, programs, and the
//! broadcast schedule that drives the Scheduler (§3, §4.5). Grounded on
//! the teacher's `domains::schedules::models::schedule` builder-param
//! pattern.

use chrono::{DateTime, NaiveTime, Utc};
use typed_builder::TypedBuilder;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize, serde::Deserialize)]
pub struct Dj {
    pub id: Uuid,
    pub voice_ref: String,
    pub language: String,
    pub personality_traits: Vec<String>,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize, serde::Deserialize)]
pub struct FormatSlot {
    pub id: Uuid,
    pub format_clock_id: Uuid,
    pub slot_type: String,
    pub duration_sec: i32,
    pub order_index: i32,
    pub required: bool,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize, serde::Deserialize)]
pub struct FormatClock {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl FormatClock {
    /// §3 invariant: sum of slot durations must equal 3600 seconds.
    /// Misconfigured clocks are rejected at the Scheduler boundary (§4.5
    /// rule 5), not silently truncated or padded.
    pub fn validate_slots(slots: &[FormatSlot]) -> Result<(), String> {
        let total: i32 = slots.iter().map(|s| s.duration_sec).sum();
        if total != 3600 {
            return Err(format!(
                "format clock slot durations sum to {total}s, expected 3600s"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ConversationFormat {
    Interview,
    Panel,
    Dialogue,
    Debate,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize, serde::Deserialize)]
pub struct Program {
    pub id: Uuid,
    pub format_clock_id: Uuid,
    pub dj_ids: Vec<Uuid>,
    pub conversation_format: Option<ConversationFormat>,
    pub genre: String,
    pub description: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Program {
    /// §3 invariant: conversation_format is required iff two or more DJs.
    pub fn validate(&self) -> Result<(), String> {
        if self.dj_ids.is_empty() {
            return Err("program must reference at least one dj".to_string());
        }
        if self.dj_ids.len() >= 2 && self.conversation_format.is_none() {
            return Err("conversation_format required when program has 2+ djs".to_string());
        }
        Ok(())
    }

    pub fn primary_dj(&self) -> Option<Uuid> {
        self.dj_ids.first().copied()
    }
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize, serde::Deserialize, TypedBuilder)]
pub struct BroadcastSchedule {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    pub program_id: Uuid,
    /// `None` means every day.
    #[builder(default, setter(strip_option))]
    pub day_of_week: Option<i16>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[builder(default = 5)]
    pub priority: i16,
    #[builder(default = true)]
    pub active: bool,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
}

impl BroadcastSchedule {
    pub fn covers_day(&self, day_of_week: i16) -> bool {
        self.day_of_week.map(|d| d == day_of_week).unwrap_or(true)
    }

    pub fn covers_hour(&self, hour_start: NaiveTime) -> bool {
        if self.start_time <= self.end_time {
            hour_start >= self.start_time && hour_start < self.end_time
        } else {
            // Wraps past midnight.
            hour_start >= self.start_time || hour_start < self.end_time
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(duration: i32) -> FormatSlot {
        FormatSlot {
            id: Uuid::new_v4(),
            format_clock_id: Uuid::new_v4(),
            slot_type: "news".to_string(),
            duration_sec: duration,
            order_index: 0,
            required: true,
        }
    }

    #[test]
    fn valid_slots_sum_to_one_hour() {
        let slots = vec![slot(1800), slot(1800)];
        assert!(FormatClock::validate_slots(&slots).is_ok());
    }

    #[test]
    fn misconfigured_slots_are_rejected() {
        let slots = vec![slot(1000), slot(1000)];
        assert!(FormatClock::validate_slots(&slots).is_err());
    }

    #[test]
    fn conversation_format_required_for_multi_dj_program() {
        let program = Program {
            id: Uuid::new_v4(),
            format_clock_id: Uuid::new_v4(),
            dj_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            conversation_format: None,
            genre: "news".to_string(),
            description: String::new(),
            active: true,
            created_at: Utc::now(),
        };
        assert!(program.validate().is_err());
    }

    #[test]
    fn single_dj_program_does_not_require_conversation_format() {
        let program = Program {
            id: Uuid::new_v4(),
            format_clock_id: Uuid::new_v4(),
            dj_ids: vec![Uuid::new_v4()],
            conversation_format: None,
            genre: "news".to_string(),
            description: String::new(),
            active: true,
            created_at: Utc::now(),
        };
        assert!(program.validate().is_ok());
    }
}
