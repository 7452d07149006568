//! Quality tiers and the per-domain presets engines derive from them.
//!
//! The router only forwards a [`QualityTier`]. Each engine picks the preset
//! for its own domain and translates the knobs into backend parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named quality tier shared by every domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
    Maximum,
}

impl QualityTier {
    /// All tiers, lowest first.
    pub const ALL: [QualityTier; 4] = [Self::Low, Self::Medium, Self::High, Self::Maximum];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Maximum => "maximum",
        }
    }

    /// Audio preset for this tier.
    pub fn audio(&self) -> AudioPreset {
        match self {
            Self::Low => AudioPreset {
                bitrate_kbps: 64,
                sample_rate_hz: 22050,
                channels: 1,
            },
            Self::Medium => AudioPreset {
                bitrate_kbps: 128,
                sample_rate_hz: 44100,
                channels: 2,
            },
            Self::High => AudioPreset {
                bitrate_kbps: 192,
                sample_rate_hz: 44100,
                channels: 2,
            },
            Self::Maximum => AudioPreset {
                bitrate_kbps: 320,
                sample_rate_hz: 48000,
                channels: 2,
            },
        }
    }

    /// Video preset for this tier.
    pub fn video(&self) -> VideoPreset {
        match self {
            Self::Low => VideoPreset {
                video_bitrate_kbps: 500,
                audio_bitrate_kbps: 64,
                max_height: Some(480),
                fps: Some(24),
            },
            Self::Medium => VideoPreset {
                video_bitrate_kbps: 1500,
                audio_bitrate_kbps: 128,
                max_height: Some(720),
                fps: Some(30),
            },
            Self::High => VideoPreset {
                video_bitrate_kbps: 3000,
                audio_bitrate_kbps: 192,
                max_height: Some(1080),
                fps: Some(30),
            },
            Self::Maximum => VideoPreset {
                video_bitrate_kbps: 8000,
                audio_bitrate_kbps: 320,
                max_height: None,
                fps: None,
            },
        }
    }

    /// Image preset for this tier.
    pub fn image(&self) -> ImagePreset {
        match self {
            Self::Low => ImagePreset {
                jpeg_quality: 60,
                max_size: Some((800, 600)),
            },
            Self::Medium => ImagePreset {
                jpeg_quality: 80,
                max_size: Some((1920, 1080)),
            },
            Self::High => ImagePreset {
                jpeg_quality: 90,
                max_size: Some((2560, 1440)),
            },
            Self::Maximum => ImagePreset {
                jpeg_quality: 95,
                max_size: None,
            },
        }
    }

    /// Document preset for this tier.
    pub fn document(&self) -> DocumentPreset {
        match self {
            Self::Low => DocumentPreset {
                image_quality: 30,
                max_image_resolution: Some(150),
                lossless_images: false,
            },
            Self::Medium => DocumentPreset {
                image_quality: 75,
                max_image_resolution: Some(300),
                lossless_images: false,
            },
            Self::High => DocumentPreset {
                image_quality: 90,
                max_image_resolution: Some(600),
                lossless_images: true,
            },
            Self::Maximum => DocumentPreset {
                image_quality: 100,
                max_image_resolution: None,
                lossless_images: true,
            },
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a tier name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown quality tier: {0} (expected low, medium, high or maximum)")]
pub struct UnknownQualityTier(pub String);

impl FromStr for QualityTier {
    type Err = UnknownQualityTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "maximum" | "max" => Ok(Self::Maximum),
            other => Err(UnknownQualityTier(other.to_string())),
        }
    }
}

/// Audio encoding knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioPreset {
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
    pub channels: u8,
}

/// Video encoding knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoPreset {
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    /// Maximum output height; `None` keeps the source resolution.
    pub max_height: Option<u32>,
    /// Output frame rate; `None` keeps the source rate.
    pub fps: Option<u32>,
}

/// Image encoding knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePreset {
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// Bounding box the image is shrunk into; `None` keeps the source size.
    pub max_size: Option<(u32, u32)>,
}

/// Document export knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentPreset {
    /// JPEG quality used for embedded images (1-100).
    pub image_quality: u8,
    /// Downsample embedded images above this DPI; `None` disables downsampling.
    pub max_image_resolution: Option<u32>,
    pub lossless_images: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tier() {
        assert_eq!("low".parse::<QualityTier>().unwrap(), QualityTier::Low);
        assert_eq!(" HIGH ".parse::<QualityTier>().unwrap(), QualityTier::High);
        assert_eq!("max".parse::<QualityTier>().unwrap(), QualityTier::Maximum);
        assert!("ultra".parse::<QualityTier>().is_err());
    }

    #[test]
    fn test_default_is_medium() {
        assert_eq!(QualityTier::default(), QualityTier::Medium);
    }

    #[test]
    fn test_presets_grow_with_tier() {
        let bitrates: Vec<u32> = QualityTier::ALL
            .iter()
            .map(|t| t.audio().bitrate_kbps)
            .collect();
        assert!(bitrates.windows(2).all(|w| w[0] < w[1]));

        let jpeg: Vec<u8> = QualityTier::ALL
            .iter()
            .map(|t| t.image().jpeg_quality)
            .collect();
        assert!(jpeg.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_maximum_keeps_source_dimensions() {
        assert_eq!(QualityTier::Maximum.video().max_height, None);
        assert_eq!(QualityTier::Maximum.image().max_size, None);
        assert_eq!(QualityTier::Maximum.document().max_image_resolution, None);
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&QualityTier::Maximum).unwrap();
        assert_eq!(json, "\"maximum\"");
        let tier: QualityTier = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(tier, QualityTier::Low);
    }
}
