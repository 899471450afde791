use regex::Regex;

pub const DEFAULT_BOT_NAME: &str = "Zoé";

/// Turns connector markup into the plain question sent to the model.
///
/// Tags are removed by pattern, not parsed: `<b>x</b>` loses its tags and keeps `x`,
/// while unbalanced or nested markup is handled only as far as `<[^>]+>` reaches.
#[derive(Debug, Clone)]
pub struct MessageSanitizer {
    tags: Regex,
    bot_prefix: Option<Regex>,
}

impl MessageSanitizer {
    pub fn new(bot_name: &str) -> anyhow::Result<Self> {
        let tags = Regex::new(r"<[^>]+>")?;
        let bot_name = bot_name.trim();
        let bot_prefix = if bot_name.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(r"(?i)^\s*{}\s*", regex::escape(bot_name)))?)
        };
        Ok(Self { tags, bot_prefix })
    }

    /// Strip tags, replace `&nbsp;`, drop one leading bot mention, trim.
    pub fn sanitize(&self, raw: &str) -> String {
        let without_tags = self.tags.replace_all(raw, "");
        let text = without_tags.replace("&nbsp;", " ");
        let text = match &self.bot_prefix {
            Some(prefix) => prefix.replace(&text, "").into_owned(),
            None => text,
        };
        text.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BOT_NAME, MessageSanitizer};

    fn sanitizer() -> MessageSanitizer {
        MessageSanitizer::new(DEFAULT_BOT_NAME).expect("sanitizer should build")
    }

    #[test]
    fn strips_tags_entity_and_bot_mention() {
        assert_eq!(
            sanitizer().sanitize("<b>Zoé</b> hello &nbsp;world"),
            "hello  world"
        );
        assert_eq!(
            sanitizer().sanitize("<at>Zoé</at>&nbsp;Quelle est la capitale de la France ?\n"),
            "Quelle est la capitale de la France ?"
        );
    }

    #[test]
    fn bot_prefix_match_is_case_insensitive() {
        let s = sanitizer();
        assert_eq!(s.sanitize("ZOÉ hi"), "hi");
        assert_eq!(s.sanitize("zoé hi"), "hi");
        assert_eq!(s.sanitize("   Zoé   hi"), "hi");
    }

    #[test]
    fn bot_name_is_only_removed_at_the_start_and_once() {
        let s = sanitizer();
        assert_eq!(s.sanitize("Bonjour Zoé"), "Bonjour Zoé");
        assert_eq!(s.sanitize("Zoé Zoé hi"), "Zoé hi");
    }

    #[test]
    fn keeps_tag_content_and_other_entities() {
        let s = sanitizer();
        assert_eq!(s.sanitize("<p>a<br/>b</p>"), "ab");
        assert_eq!(s.sanitize("Tom &amp; Jerry"), "Tom &amp; Jerry");
        assert_eq!(s.sanitize("1 < 2"), "1 < 2");
    }

    #[test]
    fn blank_and_mention_only_messages_become_empty() {
        let s = sanitizer();
        assert_eq!(s.sanitize("  "), "");
        assert_eq!(s.sanitize("<at>Zoé</at>&nbsp;"), "");
    }

    #[test]
    fn bot_name_is_matched_literally() {
        let s = MessageSanitizer::new("bot.v2").expect("sanitizer should build");
        assert_eq!(s.sanitize("bot.v2 ping"), "ping");
        assert_eq!(s.sanitize("botxv2 ping"), "botxv2 ping");
    }

    #[test]
    fn empty_bot_name_disables_prefix_stripping() {
        let s = MessageSanitizer::new("").expect("sanitizer should build");
        assert_eq!(s.sanitize("<at>Zoé</at> hi"), "Zoé hi");
    }
}
