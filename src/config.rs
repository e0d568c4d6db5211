//! Parser configuration for controlling lenient/strict parsing modes.

/// Parser options for controlling error handling and recovery behavior.
///
/// These options trade strict PDF compliance for broader compatibility
/// with malformed files.
///
/// # Example
///
/// ```
/// use pdf_creator::config::ParserOptions;
///
/// // Strict mode - fail on first error
/// let strict = ParserOptions::strict();
/// assert!(strict.strict);
///
/// // Lenient mode - repair what can be repaired (default)
/// let lenient = ParserOptions::default();
/// assert!(lenient.allow_malformed_streams);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Fail on the first structural error instead of attempting recovery
    pub strict: bool,

    /// Accept streams whose `/Length` does not match the data
    pub allow_malformed_streams: bool,

    /// Maximum depth of `/Prev` chains and nested page trees
    ///
    /// PDF Spec: ISO 32000-1:2008, Section H.1 - Implementation Limits
    pub max_recursion_depth: u32,

    /// Maximum number of entries in one xref subsection
    pub max_xref_subsection_count: u32,

    /// Maximum decompressed stream size in bytes (0 disables the check)
    pub max_decompressed_size: usize,
}

impl Default for ParserOptions {
    /// Default configuration: lenient mode
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParserOptions {
    /// Strict mode: fail on any structural error
    ///
    /// Use this for validating files or when parsing trusted input.
    pub fn strict() -> Self {
        Self {
            strict: true,
            allow_malformed_streams: false,
            max_recursion_depth: 100,
            max_xref_subsection_count: 1_000_000,
            max_decompressed_size: 100 * 1024 * 1024, // 100 MB
        }
    }

    /// Lenient mode: attempt to recover from parsing errors
    pub fn lenient() -> Self {
        Self {
            strict: false,
            allow_malformed_streams: true,
            max_recursion_depth: 100,
            max_xref_subsection_count: 1_000_000,
            max_decompressed_size: 100 * 1024 * 1024, // 100 MB
        }
    }

    /// Override the decompressed size limit.
    pub fn with_max_decompressed_size(mut self, size: usize) -> Self {
        self.max_decompressed_size = size;
        self
    }

    /// Override the recursion limit.
    pub fn with_max_recursion_depth(mut self, depth: u32) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    /// True if `size` decompressed bytes are within the configured limit.
    pub(crate) fn allows_decompressed_size(&self, size: usize) -> bool {
        self.max_decompressed_size == 0 || size <= self.max_decompressed_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_mode() {
        let opts = ParserOptions::strict();
        assert!(opts.strict);
        assert!(!opts.allow_malformed_streams);
    }

    #[test]
    fn test_lenient_mode() {
        let opts = ParserOptions::lenient();
        assert!(!opts.strict);
        assert!(opts.allow_malformed_streams);
        assert_eq!(opts, ParserOptions::default());
    }

    #[test]
    fn test_decompressed_size_limit() {
        let opts = ParserOptions::lenient().with_max_decompressed_size(10);
        assert!(opts.allows_decompressed_size(10));
        assert!(!opts.allows_decompressed_size(11));
        let unlimited = opts.with_max_decompressed_size(0);
        assert!(unlimited.allows_decompressed_size(usize::MAX));
    }

    #[test]
    fn test_recursion_override() {
        assert_eq!(ParserOptions::strict().with_max_recursion_depth(5).max_recursion_depth, 5);
    }
}
