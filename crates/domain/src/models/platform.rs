//! Device platforms and platform sets.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A device platform a package or plan can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Harmony,
    Windows,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Harmony => "harmony",
            Platform::Windows => "windows",
        }
    }

    /// Whether the download engine can serve this platform.
    pub fn is_downloadable(&self) -> bool {
        matches!(self, Platform::Android | Platform::Ios)
    }

    /// Best-effort detection from a User-Agent header.
    pub fn detect(user_agent: &str) -> Option<Platform> {
        let ua = user_agent.to_ascii_lowercase();
        if ua.contains("harmonyos") || ua.contains("openharmony") {
            Some(Platform::Harmony)
        } else if ua.contains("android") {
            Some(Platform::Android)
        } else if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
            Some(Platform::Ios)
        } else if ua.contains("windows") {
            Some(Platform::Windows)
        } else {
            None
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            "harmony" => Ok(Platform::Harmony),
            "windows" => Ok(Platform::Windows),
            _ => Err(format!("Invalid platform: {}", s)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The set of platforms a membership plan covers.
///
/// Serialized as a JSON array, which is also its storage form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformSet(BTreeSet<Platform>);

impl PlatformSet {
    pub fn new(platforms: impl IntoIterator<Item = Platform>) -> Self {
        Self(platforms.into_iter().collect())
    }

    pub fn contains(&self, platform: Platform) -> bool {
        self.0.contains(&platform)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Platform> {
        self.0.iter()
    }

    /// Platform names, for storage and JSON predicates.
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|p| p.as_str().to_string()).collect()
    }
}

impl FromIterator<Platform> for PlatformSet {
    fn from_iter<I: IntoIterator<Item = Platform>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_from_user_agent() {
        let android = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36";
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
        let harmony = "Mozilla/5.0 (Phone; OpenHarmony 4.0) HarmonyOS";
        assert_eq!(Platform::detect(android), Some(Platform::Android));
        assert_eq!(Platform::detect(iphone), Some(Platform::Ios));
        assert_eq!(Platform::detect(harmony), Some(Platform::Harmony));
        assert_eq!(Platform::detect("curl/8.0"), None);
    }

    #[test]
    fn test_downloadable_platforms() {
        assert!(Platform::Android.is_downloadable());
        assert!(Platform::Ios.is_downloadable());
        assert!(!Platform::Harmony.is_downloadable());
        assert!(!Platform::Windows.is_downloadable());
    }

    #[test]
    fn test_platform_set_json_round_trip_shape() {
        let set = PlatformSet::new([Platform::Ios, Platform::Android, Platform::Ios]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["android","ios"]"#);
        let parsed: PlatformSet = serde_json::from_str(&json).unwrap();
        assert!(parsed.contains(Platform::Android));
        assert!(!parsed.contains(Platform::Windows));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("IOS".parse::<Platform>().unwrap(), Platform::Ios);
        assert!("symbian".parse::<Platform>().is_err());
    }
}
