//! Error types for storyreel.

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during video generation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input or state validation failed (missing project, empty storyboard).
    #[error("validation error: {0}")]
    Validation(String),

    /// A generation run is already in flight for the project.
    #[error("a generation run is already active for project {project_id}")]
    RunActive { project_id: uuid::Uuid },

    /// A remote generation backend returned a non-success response.
    #[error("{service} backend error: {message}")]
    ExternalService { service: String, message: String },

    /// The render tool exited non-zero.
    #[error("render failed: {tool}: {message}")]
    Render { tool: String, message: String },

    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// Failed to parse tool or backend output.
    #[error("failed to parse {source_name} output: {message}")]
    Parse { source_name: String, message: String },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an external service error.
    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a render error carrying the tool's diagnostic output.
    pub fn render(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a parse error.
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}
