//! Persona rendering. The system prompt seeded into each new conversation is
//! configuration data, not code; this module only interpolates its
//! placeholders at seeding time.

use chrono::Local;

/// Render the persona template for one sender. `{time}` becomes the current
/// local time, `{sender}` the sender's display name.
pub fn render(template: &str, sender_name: &str) -> String {
    render_at(template, sender_name, &current_time())
}

fn render_at(template: &str, sender_name: &str, time: &str) -> String {
    template
        .replace("{time}", time)
        .replace("{sender}", sender_name)
}

fn current_time() -> String {
    Local::now().format("%Y-%m-%d, %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_both_placeholders() {
        let rendered = render_at(
            "Time is {time}; talking to {sender}.",
            "alice",
            "2024-01-01, 12:00:00",
        );
        assert_eq!(rendered, "Time is 2024-01-01, 12:00:00; talking to alice.");
    }

    #[test]
    fn template_without_placeholders_unchanged() {
        assert_eq!(render_at("static persona", "bob", "now"), "static persona");
    }

    #[test]
    fn repeated_placeholders_all_replaced() {
        let rendered = render_at("{sender} {sender}", "eve", "now");
        assert_eq!(rendered, "eve eve");
    }
}
