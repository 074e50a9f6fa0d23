use async_trait::async_trait;
use teloxide::utils::html;

/// Outbound delivery channel for due events.
///
/// Implementations must be safe to call from many workers at once. Any error
/// is logged by the caller and the event is dropped.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, recipient: &str, message: &str) -> anyhow::Result<()>;
}

/// Renders the notification text as Telegram-flavoured HTML.
pub fn render_message(title: &str, body: &str) -> String {
    format!(
        "{}\n{}",
        html::bold(&html::escape(title)),
        html::italic(&html::escape(body))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_title_bold_and_body_italic() {
        assert_eq!(render_message("T", "B"), "<b>T</b>\n<i>B</i>");
    }

    #[test]
    fn escapes_markup_in_user_text() {
        assert_eq!(
            render_message("a < b", "Tom & <Jerry>"),
            "<b>a &lt; b</b>\n<i>Tom &amp; &lt;Jerry&gt;</i>"
        );
    }

    #[test]
    fn empty_title_still_renders() {
        assert_eq!(render_message("", "B"), "<b></b>\n<i>B</i>");
    }
}
