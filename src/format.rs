use chrono::{DateTime, Local};
use regex::Regex;
use std::sync::OnceLock;

pub const TITLE_PREVIEW_CHARS: usize = 50;

fn paragraph_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<p\s*/?>").expect("valid paragraph regex"))
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag regex"))
}

// Comment bodies arrive as HTML fragments: <p> separates paragraphs, links are <a> tags
pub fn clean_html(html: &str) -> String {
    let text = paragraph_regex().replace_all(html, "\n\n");
    let text = tag_regex().replace_all(&text, "");
    html_escape::decode_html_entities(&text).trim().to_string()
}

pub fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let truncated: String = title.chars().take(max_chars).collect();
    format!("{}...", truncated.trim_end())
}

pub fn format_timestamp(time: i64) -> String {
    match DateTime::from_timestamp(time, 0) {
        Some(utc) => utc.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => String::from("unknown date"),
    }
}

pub fn time_ago(time: i64, now: i64) -> String {
    let elapsed = (now - time).max(0);
    let (count, unit) = match elapsed {
        0..=59 => return "just now".to_string(),
        60..=3_599 => (elapsed / 60, "minute"),
        3_600..=86_399 => (elapsed / 3_600, "hour"),
        _ => (elapsed / 86_400, "day"),
    };

    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_decodes_entities() {
        let html = r#"It&#x27;s <i>fine</i>.<p>See <a href="https://example.com">this</a> &amp; that"#;
        assert_eq!(clean_html(html), "It's fine.\n\nSee this & that");
    }

    #[test]
    fn short_titles_are_left_alone() {
        assert_eq!(truncate_title("Go rocks", TITLE_PREVIEW_CHARS), "Go rocks");
    }

    #[test]
    fn long_titles_are_cut_on_char_boundaries() {
        let title = "Ünïcödé ".repeat(10);
        let short = truncate_title(&title, 12);
        assert!(short.ends_with("..."));
        assert_eq!(short.trim_end_matches("...").chars().count(), 12);
    }

    #[test]
    fn relative_times() {
        assert_eq!(time_ago(1_000, 1_030), "just now");
        assert_eq!(time_ago(1_000, 1_060), "1 minute ago");
        assert_eq!(time_ago(0, 7_200), "2 hours ago");
        assert_eq!(time_ago(0, 86_400 * 3), "3 days ago");
        // clock skew never produces negative ages
        assert_eq!(time_ago(2_000, 1_000), "just now");
    }

    #[test]
    fn formats_unix_seconds() {
        assert_eq!(format_timestamp(0).len(), "1970-01-01 00:00".len());
    }
}
