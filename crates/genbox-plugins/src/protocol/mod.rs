//! Compiler-plugin protocol handling.
//!
//! Plugins read a serialized `CodeGeneratorRequest` on standard input and
//! write a serialized `CodeGeneratorResponse` on standard output. The request
//! is forwarded untouched; the response is decoded only far enough to inspect
//! its error field, and its original bytes are what callers receive.

use prost::Message;
use prost::bytes::Bytes;
use prost_types::compiler::CodeGeneratorResponse;

/// A decoded plugin response that keeps its wire bytes.
///
/// ```
/// use genbox_plugins::GeneratorResponse;
///
/// let response = GeneratorResponse::decode(Vec::new()).expect("empty is valid");
/// assert_eq!(response.error_message(), None);
/// assert_eq!(response.file_count(), 0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorResponse {
    bytes: Bytes,
    decoded: CodeGeneratorResponse,
}

impl GeneratorResponse {
    /// Decodes `bytes` as a `CodeGeneratorResponse`.
    ///
    /// An empty buffer is a valid response with no files and no error.
    ///
    /// # Errors
    ///
    /// Returns the decoder error when `bytes` is not a valid encoding.
    pub fn decode(bytes: impl Into<Bytes>) -> Result<Self, prost::DecodeError> {
        let wire: Bytes = bytes.into();
        let decoded = CodeGeneratorResponse::decode(wire.clone())?;
        Ok(Self {
            bytes: wire,
            decoded,
        })
    }

    /// The plugin's error report, when it set a non-empty one.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.decoded
            .error
            .as_deref()
            .filter(|message| !message.is_empty())
    }

    /// Number of generated files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.decoded.file.len()
    }

    /// Names of the generated files, skipping unnamed insertion chunks.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.decoded.file.iter().filter_map(|file| file.name.as_deref())
    }

    /// The bytes exactly as the plugin wrote them.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the response, returning its wire bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.into()
    }
}
