//! Parser configuration.

/// Default nesting limit. Node depth is stored as `u16`, so anything above
/// `u16::MAX` is clamped.
pub const DEFAULT_MAX_DEPTH: u16 = 4096;

/// Options fixed at context creation and applied to every source read into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Drop text runs that contain only XML whitespace
    pub skip_whitespace_text: bool,
    /// Maximum element nesting before the build fails with `ResourceExhausted`
    pub max_depth: u16,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            skip_whitespace_text: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_whitespace_text(mut self, skip: bool) -> Self {
        self.skip_whitespace_text = skip;
        self
    }

    /// Set the nesting limit. Values above `u16::MAX` are clamped and zero is raised to one.
    pub fn max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth.clamp(1, u16::MAX as u32) as u16;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ParserOptions::default();
        assert!(!opts.skip_whitespace_text);
        assert_eq!(opts.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_max_depth_clamped() {
        assert_eq!(ParserOptions::new().max_depth(1_000_000).max_depth, u16::MAX);
        assert_eq!(ParserOptions::new().max_depth(0).max_depth, 1);
        assert_eq!(ParserOptions::new().max_depth(12).max_depth, 12);
    }
}
