//! Generation parameter enums shared by engines, directives and config
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0

/// Rendering style (DALL-E 3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageStyle {
    Natural,
    #[default]
    Vivid,
}

impl ImageStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "natural" => Some(ImageStyle::Natural),
            "vivid" => Some(ImageStyle::Vivid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStyle::Natural => "natural",
            ImageStyle::Vivid => "vivid",
        }
    }
}

/// Rendering quality (DALL-E 3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageQuality {
    #[default]
    Standard,
    Hd,
}

impl ImageQuality {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "sd" => Some(ImageQuality::Standard),
            "hd" => Some(ImageQuality::Hd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageQuality::Standard => "standard",
            ImageQuality::Hd => "hd",
        }
    }
}

/// Non-square framing requested by a caller or a prompt directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// Accepts both the tool vocabulary (landscape/portrait) and the
    /// directive vocabulary (horizontal/vertical)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "landscape" | "horizontal" => Some(Orientation::Landscape),
            "portrait" | "vertical" => Some(Orientation::Portrait),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        }
    }
}
