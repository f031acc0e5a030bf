use thiserror::Error;

/// Per-recipient rendered content, produced before a record is created.
#[derive(Debug, Clone)]
pub struct RenderedMessage {
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unknown placeholder: {0}")]
    UnknownPlaceholder(String),
    #[error("template produced an empty body")]
    EmptyBody,
}

/// Boundary to the content-rendering collaborator. The engine never renders
/// templates itself; it hands the template and the recipient's field map to
/// this port and stores whatever comes back verbatim.
pub trait TemplateRenderer: Send + Sync {
    fn render(
        &self,
        subject: &str,
        template: &str,
        fields: &serde_json::Value,
    ) -> Result<RenderedMessage, RenderError>;
}
