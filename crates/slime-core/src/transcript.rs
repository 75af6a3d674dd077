//! # Transcript
//!
//! Plain-text export of the conversation log. Pure formatting: the UTC offset
//! is passed in so the output does not depend on the machine's clock.

use crate::conversation::Message;
use chrono::{DateTime, FixedOffset, NaiveDate};

/// Separator placed between two messages.
fn separator() -> String {
    format!("\n\n{}\n\n", "-".repeat(30))
}

/// Render `【label】 time\ntext` blocks separated by a dashed rule.
#[must_use]
pub fn render_transcript(messages: &[Message], offset: FixedOffset) -> String {
    messages
        .iter()
        .map(|m| format!("【{}】 {}\n{}", m.role.label(), format_time(m.timestamp, offset), m.text))
        .collect::<Vec<_>>()
        .join(&separator())
}

/// `YYYY/M/D H:MM:SS` in the given offset. Out-of-range timestamps render as `-`.
#[must_use]
pub fn format_time(timestamp_ms: i64, offset: FixedOffset) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.with_timezone(&offset).format("%Y/%-m/%-d %-H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// `slime_history_YYYY-MM-DD.txt`.
#[must_use]
pub fn transcript_file_name(date: NaiveDate) -> String {
    format!("slime_history_{}.txt", date.format("%Y-%m-%d"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::conversation::{Message, Role};

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[test]
    fn renders_labels_times_and_separators() {
        // 2024-01-05T04:04:05Z == 13:04:05 JST
        let ts = 1_704_427_445_000;
        let messages = vec![
            Message::new(Role::Model, "こんにちは", ts),
            Message::new(Role::User, "やあ", ts + 1_000),
            Message::new(Role::System, "✨", ts + 2_000),
        ];
        let text = render_transcript(&messages, jst());
        let expected = format!(
            "【スライム】 2024/1/5 13:04:05\nこんにちは\n\n{rule}\n\n【あなた】 2024/1/5 13:04:06\nやあ\n\n{rule}\n\n【システム】 2024/1/5 13:04:07\n✨",
            rule = "-".repeat(30)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn empty_log_renders_empty() {
        assert_eq!(render_transcript(&[], utc()), "");
    }

    #[test]
    fn hour_is_not_padded() {
        // 2024-03-01T00:05:09Z
        assert_eq!(format_time(1_709_251_509_000, utc()), "2024/3/1 0:05:09");
    }

    #[test]
    fn file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 9);
        assert_eq!(
            date.map(transcript_file_name).as_deref(),
            Some("slime_history_2024-02-09.txt")
        );
    }
}
