//! Notification rendering for the persistent status notification.
//!
//! Pure functions over [`CreditStatus`]; the renderer never mutates engine
//! state. Hosts subscribe to [`Event::CreditUpdated`](crate::Event) and
//! re-render on every update.

use serde::{Deserialize, Serialize};

use crate::credit::CreditStatus;
use crate::events::Event;

/// Visual tone hint for the host's notification styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Info,
    Warning,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub text: String,
    pub tone: Tone,
}

/// `H:MM:SS` when there is at least an hour, else `M:SS`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

pub fn render_notification(status: &CreditStatus) -> NotificationContent {
    let snap = &status.snapshot;
    let remaining = snap.remaining_credit.max(0).unsigned_abs();

    let (title, tone) = if status.is_in_debt {
        (format!("Time Debt: {}", format_duration(snap.debt)), Tone::Alert)
    } else if remaining > 0 {
        (format!("Screen Time: {}", format_duration(remaining)), Tone::Info)
    } else {
        ("No time remaining".to_string(), Tone::Warning)
    };

    let text = if snap.app_foreground {
        "App open (paused)"
    } else if !snap.screen_on {
        "Screen off (paused)"
    } else if !snap.is_tracking {
        if status.is_in_debt {
            "Paused - answer questions to earn time"
        } else {
            "Paused - complete tasks to earn more time"
        }
    } else if status.is_in_debt || remaining == 0 {
        "Debt increasing..."
    } else {
        "Time counting down..."
    };

    NotificationContent {
        title,
        text: text.to_string(),
        tone,
    }
}

/// Render straight from a published update; other events render nothing.
pub fn render_event(event: &Event) -> Option<NotificationContent> {
    match event {
        Event::CreditUpdated {
            remaining_time,
            debt_time,
            is_tracking,
            screen_on,
            app_foreground,
            timestamp,
        } => {
            let snapshot = crate::credit::TimerSnapshot {
                remaining_credit: *remaining_time,
                debt: *debt_time,
                is_tracking: *is_tracking,
                screen_on: *screen_on,
                app_foreground: *app_foreground,
                last_update: *timestamp,
            };
            Some(render_notification(&snapshot.status()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit::TimerSnapshot;

    fn snap(remaining: i64, debt: u64) -> TimerSnapshot {
        TimerSnapshot {
            remaining_credit: remaining,
            debt,
            is_tracking: true,
            screen_on: true,
            app_foreground: false,
            last_update: 0,
        }
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(61), "1:01");
        assert_eq!(format_duration(3_600), "1:00:00");
        assert_eq!(format_duration(3_725), "1:02:05");
    }

    #[test]
    fn credit_counts_down() {
        let content = render_notification(&snap(125, 0).status());
        assert_eq!(content.title, "Screen Time: 2:05");
        assert_eq!(content.text, "Time counting down...");
        assert_eq!(content.tone, Tone::Info);
    }

    #[test]
    fn debt_takes_priority_in_title() {
        let content = render_notification(&snap(0, 90).status());
        assert_eq!(content.title, "Time Debt: 1:30");
        assert_eq!(content.text, "Debt increasing...");
        assert_eq!(content.tone, Tone::Alert);
    }

    #[test]
    fn paused_reasons_in_priority_order() {
        let mut s = snap(10, 0);
        s.app_foreground = true;
        s.screen_on = false;
        assert_eq!(render_notification(&s.status()).text, "App open (paused)");
        s.app_foreground = false;
        assert_eq!(render_notification(&s.status()).text, "Screen off (paused)");
        s.screen_on = true;
        s.is_tracking = false;
        assert_eq!(
            render_notification(&s.status()).text,
            "Paused - complete tasks to earn more time"
        );
    }

    #[test]
    fn empty_pool_warns() {
        let mut s = snap(0, 0);
        s.is_tracking = false;
        let content = render_notification(&s.status());
        assert_eq!(content.title, "No time remaining");
        assert_eq!(content.tone, Tone::Warning);
    }

    #[test]
    fn renders_only_updates() {
        let status = snap(30, 0).status();
        assert!(render_event(&Event::updated(&status)).is_some());
        assert!(render_event(&Event::TrackingStopped { at: chrono::Utc::now() }).is_none());
    }
}
