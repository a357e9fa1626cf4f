// src/core/encoding.rs

//! Resolves the text encoding used for every line of a session.
//!
//! The encoding is decided once at start-up, normally from the OS locale, and
//! then shared read-only by every component that touches the wire.

use super::errors::ClientError;
use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;
use std::env;
use tracing::warn;

/// The name announced when the locale does not name a codeset.
pub const DEFAULT_ENCODING_NAME: &str = "utf-8";

/// An immutable text encoding: the name announced to the server in the handshake
/// plus the codec that actually converts text to and from bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEncoding {
    name: String,
    encoding: &'static Encoding,
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self {
            name: DEFAULT_ENCODING_NAME.to_string(),
            encoding: UTF_8,
        }
    }
}

impl TextEncoding {
    /// Resolves an encoding from a label such as `utf-8`, `cp1252` or `ISO-8859-1`.
    /// The announced name is the label, trimmed and lower-cased.
    pub fn from_label(label: &str) -> Result<Self, ClientError> {
        let name = label.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(ClientError::InvalidConfig(
                "encoding name cannot be empty".to_string(),
            ));
        }
        let encoding = Encoding::for_label(name.as_bytes()).ok_or_else(|| {
            ClientError::InvalidConfig(format!("unsupported text encoding '{name}'"))
        })?;
        // Lines are framed on a single 0x0A byte, which rules out UTF-16 and friends.
        if !encoding.is_ascii_compatible() {
            return Err(ClientError::InvalidConfig(format!(
                "text encoding '{name}' is not ASCII-compatible"
            )));
        }
        Ok(Self { name, encoding })
    }

    /// Reads the preferred encoding from the process locale
    /// (`LC_ALL`, then `LC_CTYPE`, then `LANG`).
    pub fn from_locale() -> Self {
        let lookup = |key: &str| env::var(key).ok();
        Self::from_locale_vars(lookup("LC_ALL"), lookup("LC_CTYPE"), lookup("LANG"))
    }

    /// Resolution logic behind [`TextEncoding::from_locale`], separated from the
    /// environment so it can be driven with explicit values.
    pub fn from_locale_vars(
        lc_all: Option<String>,
        lc_ctype: Option<String>,
        lang: Option<String>,
    ) -> Self {
        // The first non-empty variable wins, as in the C library.
        let locale = [lc_all, lc_ctype, lang]
            .into_iter()
            .flatten()
            .find(|value| !value.trim().is_empty());

        let Some(locale) = locale else {
            return Self::default();
        };

        let Some(codeset) = codeset_of(&locale) else {
            return Self::default();
        };

        match Self::from_label(codeset) {
            Ok(encoding) => encoding,
            Err(e) => {
                warn!(
                    "Locale '{}' names an encoding that cannot be used ({}). Falling back to {}.",
                    locale, e, DEFAULT_ENCODING_NAME
                );
                Self::default()
            }
        }
    }

    /// The lower-cased name sent in the `ENCODING:` handshake.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The canonical name of the codec that converts the bytes.
    pub fn codec_name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Encodes text for the wire. Characters the encoding cannot represent are
    /// replaced with numeric character references by `encoding_rs`.
    pub fn encode<'a>(&self, text: &'a str) -> Cow<'a, [u8]> {
        let (bytes, _, _) = self.encoding.encode(text);
        bytes
    }

    /// Decodes bytes received from the wire, failing on malformed input instead
    /// of substituting replacement characters.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>, ClientError> {
        self.encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .ok_or(ClientError::Decode(self.encoding.name()))
    }
}

/// Extracts the codeset from a POSIX locale string: `en_US.UTF-8@euro` -> `UTF-8`.
fn codeset_of(locale: &str) -> Option<&str> {
    let (_, rest) = locale.split_once('.')?;
    let codeset = rest.split('@').next().unwrap_or(rest).trim();
    (!codeset.is_empty()).then_some(codeset)
}
