//! Files attached to calls or registered as a download.

use crate::payload::Value;

/// Default mime type.
pub const DEFAULT_MIME: &str = "text/plain";

const LOCAL_SCHEME: &str = "file://";

/// A file received with a request, or to be sent to another service.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    name: String,
    path: String,
    mime: String,
    filename: String,
    size: u64,
    token: String,
    exists: bool,
}

impl File {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            mime: DEFAULT_MIME.to_string(),
            filename: String::new(),
            size: 0,
            token: String::new(),
            exists: false,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        let mime = mime.into();
        if !mime.is_empty() {
            self.mime = mime;
        }
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Read a `{path, mime, filename, size, token}` record.
    ///
    /// A file read from a request always exists.
    pub fn from_record(name: impl Into<String>, record: &Value) -> Self {
        let text = |key: &str| {
            record
                .field(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let size = record
            .field("size")
            .and_then(Value::as_i64)
            .and_then(|s| u64::try_from(s).ok())
            .unwrap_or(0);

        Self::new(name, text("path"))
            .with_mime(text("mime"))
            .with_filename(text("filename"))
            .with_size(size)
            .with_token(text("token"))
            .mark_existing()
    }

    fn mark_existing(mut self) -> Self {
        self.exists = true;
        self
    }

    /// The transport record for this file.
    pub fn to_record(&self) -> Value {
        let size = i64::try_from(self.size).unwrap_or(i64::MAX);
        [
            ("path", Value::from(self.path.as_str())),
            ("mime", Value::from(self.mime.as_str())),
            ("filename", Value::from(self.filename.as_str())),
            ("size", Value::Integer(size)),
            ("token", Value::from(self.token.as_str())),
        ]
        .into_iter()
        .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Whether the file lives on this host (`file://` path).
    pub fn is_local(&self) -> bool {
        self.path.starts_with(LOCAL_SCHEME)
    }

    pub fn copy_with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exists: false,
            ..self.clone()
        }
    }

    pub fn copy_with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            exists: false,
            ..self.clone()
        }
    }

    pub fn copy_with_mime(&self, mime: impl Into<String>) -> Self {
        Self {
            exists: false,
            ..self.clone()
        }
        .with_mime(mime)
    }

    pub fn copy_with_filename(&self, filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            exists: false,
            ..self.clone()
        }
    }

    pub fn copy_with_size(&self, size: u64) -> Self {
        Self {
            size,
            exists: false,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let file = File::new("avatar", "file:///tmp/a.png");
        assert_eq!(file.mime(), "text/plain");
        assert_eq!(file.size(), 0);
        assert!(!file.exists());
        assert!(file.is_local());
        assert!(!File::new("a", "http://host/a").is_local());
    }

    #[test]
    fn test_empty_mime_keeps_default() {
        assert_eq!(File::new("a", "").with_mime("").mime(), DEFAULT_MIME);
    }

    #[test]
    fn test_record_round_trip() {
        let file = File::new("doc", "http://files/1")
            .with_mime("application/pdf")
            .with_filename("report.pdf")
            .with_size(2048)
            .with_token("secret");

        let back = File::from_record("doc", &file.to_record());
        assert!(back.exists());
        assert_eq!(back.path(), "http://files/1");
        assert_eq!(back.mime(), "application/pdf");
        assert_eq!(back.filename(), "report.pdf");
        assert_eq!(back.size(), 2048);
        assert_eq!(back.token(), "secret");
    }

    #[test]
    fn test_copy_resets_exists() {
        let file = File::from_record("doc", &File::new("doc", "x").to_record());
        let copy = file.copy_with_filename("other.txt");
        assert!(!copy.exists());
        assert_eq!(copy.filename(), "other.txt");
        assert_eq!(copy.path(), "x");
        assert_eq!(file.copy_with_mime("image/png").mime(), "image/png");
        assert_eq!(file.copy_with_size(3).size(), 3);
    }
}
