use std::sync::Arc;
use tracing::debug;

use crate::error::GenerationError;
use crate::ids::EmailId;
use crate::ports::TextGenerator;

/// Wraps generated prose in the fixed HTML envelope and embeds the
/// per-message tracking pixel.
///
/// The pixel reference is constructed here and nowhere else; a valid open
/// signal can only originate from a body rendered for that identifier.
pub struct ContentRenderer {
    generator: Arc<dyn TextGenerator>,
    sender: String,
    public_base_url: String,
}

impl ContentRenderer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        sender: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            generator,
            sender: sender.into(),
            public_base_url,
        }
    }

    /// The pixel target for `id`. Deterministic: the same id always yields
    /// a byte-identical reference.
    pub fn tracking_url(&self, id: EmailId) -> String {
        format!("{}/track/{}", self.public_base_url, id)
    }

    /// Ask the text service for prose and wrap it in the envelope. A service
    /// failure surfaces as an error; the caller decides how to report it.
    pub async fn render(&self, prompt: &str, id: EmailId) -> Result<String, GenerationError> {
        let prose = self.generator.generate(prompt).await?;
        debug!(id = %id, chars = prose.len(), "prose generated");
        Ok(self.envelope(&prose, id))
    }

    fn envelope(&self, prose: &str, id: EmailId) -> String {
        let content = to_html_breaks(&escape_html(prose));
        format!(
            concat!(
                r#"<div style="font-family: Arial, sans-serif; line-height: 1.6; max-width: 600px; margin: 0 auto;">"#,
                "\n",
                r#"  <p style="color: #333333; margin-bottom: 15px;">{content}</p>"#,
                "\n",
                r#"  <div style="border-top: 1px solid #eeeeee; margin-top: 20px; padding-top: 15px;">"#,
                "\n",
                r#"    <p style="font-size: 0.9em; color: #666666;">{sender}<br>Sent via Mailtrack</p>"#,
                "\n",
                r#"  </div>"#,
                "\n",
                r#"  <img src="{pixel}" width="1" height="1" style="display:none">"#,
                "\n",
                r#"</div>"#,
            ),
            content = content,
            sender = escape_html(&self.sender),
            pixel = self.tracking_url(id),
        )
    }
}

/// Minimal HTML escaping for untrusted prose, applied before the newline
/// substitution so the inserted tags survive.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// A double line break becomes a paragraph separator, a single line break a
/// line break. The double pattern is substituted first so the single rule
/// cannot partially consume it.
fn to_html_breaks(text: &str) -> String {
    text.replace("\n\n", "<br><br>").replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::EmailIdGenerator;
    use async_trait::async_trait;

    struct FixedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            Ok(self.0.to_string())
        }
    }

    fn renderer(prose: &'static str) -> ContentRenderer {
        ContentRenderer::new(
            Arc::new(FixedGenerator(prose)),
            "sender@example.com",
            "http://localhost:8080/",
        )
    }

    #[test]
    fn newline_normalization_applies_double_break_first() {
        assert_eq!(to_html_breaks("a\n\nb\nc"), "a<br><br>b<br>c");
    }

    #[test]
    fn tracking_reference_is_deterministic() {
        let r = renderer("x");
        let id = EmailIdGenerator.next();
        assert_eq!(r.tracking_url(id), r.tracking_url(id));
        assert_eq!(r.tracking_url(id), format!("http://localhost:8080/track/{id}"));
    }

    #[tokio::test]
    async fn prose_is_escaped_before_breaks_are_inserted() {
        let r = renderer("1 < 2\nok");
        let id = EmailIdGenerator.next();
        let body = r.render("p", id).await.unwrap();
        assert!(body.contains("1 &lt; 2<br>ok"));
        assert!(!body.contains("1 < 2"));
    }

    #[tokio::test]
    async fn envelope_embeds_pixel_exactly_once() {
        let r = renderer("hello");
        let id = EmailIdGenerator.next();
        let body = r.render("p", id).await.unwrap();
        let pixel = format!(r#"<img src="{}" width="1" height="1""#, r.tracking_url(id));
        assert_eq!(body.matches(&pixel).count(), 1);
        assert!(body.contains("sender@example.com"));
    }

    #[tokio::test]
    async fn paragraphs_render_as_breaks_in_the_envelope() {
        let r = renderer("a\n\nb\nc");
        let id = EmailIdGenerator.next();
        let body = r.render("p", id).await.unwrap();
        assert!(body.contains("a<br><br>b<br>c"));
    }
}
