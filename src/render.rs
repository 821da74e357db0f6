//! Turns raw chat lines into inert HTML fragments and assembles the chat page.
//!
//! The remote protocol has no structured framing. A line of the form
//! `name: message` is treated as a chat message when `name` is a single word;
//! anything else is shown as-is. This is a display heuristic, not a parser.

use chrono::{DateTime, TimeZone};

/// How often the chat view reloads itself, in seconds.
pub const REFRESH_SECS: u32 = 3;

/// Entries shown per chat view.
pub const VIEW_LINES: usize = 100;

/// Names that look like speakers but are server usage hints.
const UNEMPHASIZED_NAMES: &[&str] = &["Usage"];

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders one inbound line, or `None` if it is blank.
pub fn render_line<Tz>(raw: &str, received_at: &DateTime<Tz>) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let line = raw.trim();
    if line.is_empty() {
        return None;
    }

    let body = match line.split_once(':') {
        Some((name, message)) => {
            let name = name.trim();
            let mut shown = escape_html(name);

            if !name.contains(' ') && !UNEMPHASIZED_NAMES.contains(&name) {
                shown = format!("<b>{shown}</b>");
            }

            format!("{shown}: {}", escape_html(message.trim()))
        }
        None => escape_html(line),
    };

    Some(format!(
        "<font color=\"#808080\">[{}]</font> <font color=\"#000000\">{}</font>",
        received_at.format("%H:%M"),
        body
    ))
}

/// Full chat document: `entries` joined by line breaks inside a page that
/// refreshes itself and scrolls to the bottom on load.
pub fn chat_page(entries: &[String]) -> String {
    let mut page = String::with_capacity(1024 + entries.iter().map(|e| e.len() + 4).sum::<usize>());

    page.push_str(concat!(
        "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 4.01 Transitional//EN\">",
        "<html><head>",
        "<meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\">",
    ));
    page.push_str(&format!(
        "<meta http-equiv=\"refresh\" content=\"{REFRESH_SECS}\">"
    ));
    page.push_str(concat!(
        "<title>Chat</title>",
        "<script type=\"text/javascript\">",
        "function scrollToBottom() { window.scrollTo(0, document.body.scrollHeight); }",
        "</script>",
        "</head>",
        "<body bgcolor=\"#F7F7F7\" text=\"#000000\" link=\"#0000FF\" vlink=\"#800080\" ",
        "style=\"margin:0; padding:0;\" onload=\"scrollToBottom();\">",
        "<table border=\"0\" width=\"100%\" cellspacing=\"0\" cellpadding=\"0\"><tr><td>",
        "<div style=\"font-family:Tahoma, monospace; font-size:12px; ",
        "white-space: pre-wrap; word-wrap: break-word; margin:0; padding:0 0 0 10px;\">",
        "<br>",
    ));
    page.push_str(&entries.join("<br>"));
    page.push_str("</div></td></tr></table></body></html>");

    page
}
