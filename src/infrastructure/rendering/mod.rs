use crate::application::services::renderer::{RenderError, RenderedMessage, TemplateRenderer};

/// Substitution-only renderer: `{{key}}` and `{key}` placeholders with
/// dot-path lookups into the recipient's field map, over both subject and
/// body. The plain-text body is derived by stripping tags from the HTML.
pub struct PlaceholderRenderer;

impl TemplateRenderer for PlaceholderRenderer {
    fn render(
        &self,
        subject: &str,
        template: &str,
        fields: &serde_json::Value,
    ) -> Result<RenderedMessage, RenderError> {
        let subject = substitute(subject, fields)?;
        let html_body = substitute(template, fields)?;
        if html_body.trim().is_empty() {
            return Err(RenderError::EmptyBody);
        }
        let text_body = strip_html(&html_body);
        Ok(RenderedMessage {
            subject,
            html_body,
            text_body,
        })
    }
}

fn substitute(input: &str, fields: &serde_json::Value) -> Result<String, RenderError> {
    let first_pass = replace_placeholders(input, "{{", "}}", fields)?;
    replace_placeholders(&first_pass, "{", "}", fields)
}

fn replace_placeholders(
    input: &str,
    open: &str,
    close: &str,
    fields: &serde_json::Value,
) -> Result<String, RenderError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(open) {
        let after_open = start + open.len();
        let Some(end) = rest[after_open..].find(close) else {
            break;
        };
        let key = &rest[after_open..after_open + end];
        out.push_str(&rest[..start]);

        let trimmed = key.trim();
        if trimmed.is_empty() || !is_placeholder_key(trimmed) {
            // Braces that are not a placeholder (inline CSS, JSON in the
            // template) pass through verbatim.
            out.push_str(open);
            out.push_str(key);
            out.push_str(close);
        } else {
            let value = lookup(trimmed, fields)
                .ok_or_else(|| RenderError::UnknownPlaceholder(trimmed.to_string()))?;
            out.push_str(&value);
        }
        rest = &rest[after_open + end + close.len()..];
    }

    out.push_str(rest);
    Ok(out)
}

fn is_placeholder_key(key: &str) -> bool {
    key.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn lookup(path: &str, fields: &serde_json::Value) -> Option<String> {
    let mut current = fields;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    match current {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn strip_html(html: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields() -> serde_json::Value {
        json!({
            "name": "Ada",
            "company": { "title": "Analytical Engines Ltd" },
            "seats": 12
        })
    }

    #[test]
    fn replaces_both_placeholder_styles() {
        let rendered = PlaceholderRenderer
            .render(
                "Hello {name}",
                "<p>Greetings {{name}} of {company.title}</p>",
                &fields(),
            )
            .unwrap();
        assert_eq!(rendered.subject, "Hello Ada");
        assert_eq!(
            rendered.html_body,
            "<p>Greetings Ada of Analytical Engines Ltd</p>"
        );
    }

    #[test]
    fn non_string_values_are_stringified() {
        let rendered = PlaceholderRenderer
            .render("s", "<p>{{seats}} seats</p>", &fields())
            .unwrap();
        assert_eq!(rendered.html_body, "<p>12 seats</p>");
    }

    #[test]
    fn missing_field_is_a_render_error() {
        let err = PlaceholderRenderer
            .render("s", "<p>{{nickname}}</p>", &fields())
            .unwrap_err();
        assert!(matches!(err, RenderError::UnknownPlaceholder(key) if key == "nickname"));
    }

    #[test]
    fn non_placeholder_braces_pass_through() {
        let rendered = PlaceholderRenderer
            .render("s", "<style>p { color: red; }</style><p>{name}</p>", &fields())
            .unwrap();
        assert_eq!(
            rendered.html_body,
            "<style>p { color: red; }</style><p>Ada</p>"
        );
    }

    #[test]
    fn plain_text_is_the_html_without_tags() {
        let rendered = PlaceholderRenderer
            .render("s", "<html><body><p>Hi  {name}</p>\n<p>Bye</p></body></html>", &fields())
            .unwrap();
        assert_eq!(rendered.text_body, "Hi Ada Bye");
    }

    #[test]
    fn empty_rendered_body_is_rejected() {
        let err = PlaceholderRenderer
            .render("s", "   ", &fields())
            .unwrap_err();
        assert!(matches!(err, RenderError::EmptyBody));
    }
}
