/// A recovery strategy tried when encoded metadata does not match the
/// requested type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFallback {
    /// Metadata describes a one-item array whose item matches the request:
    /// decode the array and return its element.
    UnwrapSingleElement,
    /// A conversion is registered from the encoded type to the requested one.
    Conversion,
}

/// Controls decode behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Fallbacks tried in order when direct decoding is rejected. Empty
    /// disables recovery entirely.
    pub fallbacks: Vec<DecodeFallback>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            fallbacks: vec![
                DecodeFallback::UnwrapSingleElement,
                DecodeFallback::Conversion,
            ],
        }
    }
}

impl CodecConfig {
    /// Config that rejects every mismatch without trying recovery.
    pub fn strict() -> Self {
        Self {
            fallbacks: Vec::new(),
        }
    }
}
