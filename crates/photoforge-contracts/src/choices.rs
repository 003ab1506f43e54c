use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::EditError;

/// Top-level transformation family picked right after a photo arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Logo,
    Rounded,
    Screenshot,
}

impl Mode {
    pub fn key(self) -> &'static str {
        match self {
            Mode::Logo => "logo",
            Mode::Rounded => "rounded",
            Mode::Screenshot => "screenshot",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "logo" => Some(Mode::Logo),
            "rounded" => Some(Mode::Rounded),
            "screenshot" => Some(Mode::Screenshot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn key(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
            OutputFormat::Webp => "WEBP",
        }
    }

    /// Lowercased format name; drives the `edited.<ext>` filename.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "JPEG" => Some(OutputFormat::Jpeg),
            "PNG" => Some(OutputFormat::Png),
            "WEBP" => Some(OutputFormat::Webp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBarStyle {
    IosLight,
    IosDark,
    Android,
}

impl StatusBarStyle {
    pub fn key(self) -> &'static str {
        match self {
            StatusBarStyle::IosLight => "ios_light",
            StatusBarStyle::IosDark => "ios_dark",
            StatusBarStyle::Android => "android",
        }
    }

    /// Overlay asset key for this style.
    pub fn asset_key(self) -> &'static str {
        match self {
            StatusBarStyle::IosLight => "ios_status_light",
            StatusBarStyle::IosDark => "ios_status_dark",
            StatusBarStyle::Android => "android_status",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "ios_light" => Some(StatusBarStyle::IosLight),
            "ios_dark" => Some(StatusBarStyle::IosDark),
            "android" => Some(StatusBarStyle::Android),
            _ => None,
        }
    }
}

/// One validated button press. Parsed from the transport's opaque choice key
/// at the controller boundary; anything unrecognized is rejected there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Mode(Mode),
    Format(OutputFormat),
    Clean(bool),
    Style(StatusBarStyle),
    Mockup(String),
}

impl Choice {
    pub fn parse(key: &str) -> Result<Self, EditError> {
        let trimmed = key.trim();
        if let Some(rest) = trimmed.strip_prefix("mode_") {
            return Mode::from_key(rest)
                .map(Choice::Mode)
                .ok_or_else(|| EditError::MalformedChoice(trimmed.to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix("format_") {
            return OutputFormat::from_key(rest)
                .map(Choice::Format)
                .ok_or_else(|| EditError::MalformedChoice(trimmed.to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix("clean_") {
            return match rest {
                "yes" => Ok(Choice::Clean(true)),
                "no" => Ok(Choice::Clean(false)),
                _ => Err(EditError::MalformedChoice(trimmed.to_string())),
            };
        }
        if let Some(rest) = trimmed.strip_prefix("style_") {
            return StatusBarStyle::from_key(rest)
                .map(Choice::Style)
                .ok_or_else(|| EditError::MalformedChoice(trimmed.to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix("mockup_") {
            return if frame_catalog().contains_key(rest) {
                Ok(Choice::Mockup(rest.to_string()))
            } else {
                Err(EditError::MalformedChoice(trimmed.to_string()))
            };
        }
        Err(EditError::MalformedChoice(trimmed.to_string()))
    }
}

/// One button the transport should render: human label plus choice key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MenuOption {
    pub label: &'static str,
    pub key: &'static str,
}

pub const MODE_MENU: &[MenuOption] = &[
    MenuOption {
        label: "App logo (circular)",
        key: "mode_logo",
    },
    MenuOption {
        label: "App logo (rounded)",
        key: "mode_rounded",
    },
    MenuOption {
        label: "Screenshot cleaner",
        key: "mode_screenshot",
    },
];

pub const FORMAT_MENU: &[MenuOption] = &[
    MenuOption {
        label: "JPG",
        key: "format_JPEG",
    },
    MenuOption {
        label: "PNG",
        key: "format_PNG",
    },
    MenuOption {
        label: "WebP",
        key: "format_WEBP",
    },
];

pub const CLEAN_MENU: &[MenuOption] = &[
    MenuOption {
        label: "Clean it",
        key: "clean_yes",
    },
    MenuOption {
        label: "Leave as is",
        key: "clean_no",
    },
];

pub const STYLE_MENU: &[MenuOption] = &[
    MenuOption {
        label: "iOS Light",
        key: "style_ios_light",
    },
    MenuOption {
        label: "iOS Dark",
        key: "style_ios_dark",
    },
    MenuOption {
        label: "Android",
        key: "style_android",
    },
];

/// Known device frames, in menu order. Keys double as frame asset keys.
pub fn frame_catalog() -> IndexMap<&'static str, &'static str> {
    IndexMap::from([
        ("iphone_15_pro", "iPhone 15 Pro"),
        ("pixel_8", "Pixel 8"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mode_keys() {
        assert_eq!(Choice::parse("mode_logo"), Ok(Choice::Mode(Mode::Logo)));
        assert_eq!(
            Choice::parse("mode_rounded"),
            Ok(Choice::Mode(Mode::Rounded))
        );
        assert_eq!(
            Choice::parse("mode_screenshot"),
            Ok(Choice::Mode(Mode::Screenshot))
        );
    }

    #[test]
    fn parse_format_keys_are_case_sensitive() {
        assert_eq!(
            Choice::parse("format_PNG"),
            Ok(Choice::Format(OutputFormat::Png))
        );
        assert!(matches!(
            Choice::parse("format_png"),
            Err(EditError::MalformedChoice(_))
        ));
    }

    #[test]
    fn parse_clean_and_style_keys() {
        assert_eq!(Choice::parse("clean_yes"), Ok(Choice::Clean(true)));
        assert_eq!(Choice::parse("clean_no"), Ok(Choice::Clean(false)));
        assert_eq!(
            Choice::parse("style_ios_dark"),
            Ok(Choice::Style(StatusBarStyle::IosDark))
        );
    }

    #[test]
    fn parse_mockup_validates_against_catalog() {
        assert_eq!(
            Choice::parse("mockup_pixel_8"),
            Ok(Choice::Mockup("pixel_8".to_string()))
        );
        assert!(matches!(
            Choice::parse("mockup_fax_machine"),
            Err(EditError::MalformedChoice(_))
        ));
    }

    #[test]
    fn parse_rejects_unknown_prefixes() {
        for key in ["", "magic", "mode_", "clean_maybe", "style_windows"] {
            assert!(matches!(
                Choice::parse(key),
                Err(EditError::MalformedChoice(_))
            ));
        }
    }

    #[test]
    fn extensions_are_lowercased_format_names() {
        assert_eq!(OutputFormat::Jpeg.extension(), "jpeg");
        assert_eq!(OutputFormat::Png.extension(), "png");
        assert_eq!(OutputFormat::Webp.extension(), "webp");
    }

    #[test]
    fn style_asset_keys_match_static_files() {
        assert_eq!(StatusBarStyle::IosLight.asset_key(), "ios_status_light");
        assert_eq!(StatusBarStyle::Android.asset_key(), "android_status");
    }
}
