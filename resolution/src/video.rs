//! Video reply detection

use regex::Regex;

use crate::error::ConfigError;

/// Recognises posts that link a recorded video reply.
#[derive(Debug, Clone)]
pub struct VideoLinkDetector {
    patterns: Vec<Regex>,
}

impl VideoLinkDetector {
    /// Compile the configured patterns. An invalid pattern is a config error.
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|source| ConfigError::VideoPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether the raw or rendered body links a video.
    pub fn is_video_reply(&self, raw: &str, cooked: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.is_match(raw) || p.is_match(cooked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupportConfig;

    fn detector() -> VideoLinkDetector {
        VideoLinkDetector::new(&SupportConfig::default().video_patterns).unwrap()
    }

    #[test]
    fn test_default_patterns() {
        let d = detector();
        assert!(d.is_video_reply("here you go https://www.loom.com/share/abc123", ""));
        assert!(d.is_video_reply("", "<a href=\"https://youtu.be/xyz\">video</a>"));
        assert!(d.is_video_reply("HTTPS://YOUTUBE.COM/watch?v=1", ""));
        assert!(!d.is_video_reply("I recorded nothing, sorry", "<p>text</p>"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = VideoLinkDetector::new(&["(unclosed".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::VideoPattern { .. }));
    }
}
