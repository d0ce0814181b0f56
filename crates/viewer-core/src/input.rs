use std::path::Path;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A user-selected file with the content type it declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInput {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileInput {
    pub fn new(name: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), content_type: content_type.map(ToOwned::to_owned), bytes }
    }

    /// Reads a file from disk, declaring its content type from the extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self { name, content_type: content_type_for(path).map(ToOwned::to_owned), bytes })
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|content_type| content_type.eq_ignore_ascii_case(PDF_CONTENT_TYPE))
    }
}

/// Content type implied by a file extension.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some(PDF_CONTENT_TYPE),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "txt" => Some("text/plain"),
        "html" | "htm" => Some("text/html"),
        _ => Some("application/octet-stream"),
    }
}

/// Details handed to a [`PasswordPrompt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordRequest<'a> {
    /// Name of the file being opened
    pub file_name: &'a str,
    /// 1 for the first prompt, incremented on every retry
    pub attempt: u32,
    /// Whether the previous password was rejected
    pub previous_rejected: bool,
}

/// Source of passwords for protected documents.
pub trait PasswordPrompt {
    /// Returns the password to try, or `None` to give up.
    fn request_password(&mut self, request: PasswordRequest<'_>) -> Option<String>;
}

/// Prompt that never supplies a password.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPassword;

impl PasswordPrompt for NoPassword {
    fn request_password(&mut self, _request: PasswordRequest<'_>) -> Option<String> {
        None
    }
}

/// Prompt that answers from a fixed list, then gives up.
#[derive(Debug, Clone, Default)]
pub struct PasswordList {
    passwords: std::collections::VecDeque<String>,
}

impl PasswordList {
    pub fn new<I, S>(passwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { passwords: passwords.into_iter().map(Into::into).collect() }
    }
}

impl PasswordPrompt for PasswordList {
    fn request_password(&mut self, _request: PasswordRequest<'_>) -> Option<String> {
        self.passwords.pop_front()
    }
}
