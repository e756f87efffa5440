//! Catalog of profile settings the editor knows how to change
//!
//! Each setting is anchored on its literal key in `PROFSAVE_profile`; values
//! are found and replaced with a `key<whitespace><number>` pattern so the rest
//! of the file stays byte-for-byte untouched.

use regex::{Captures, Regex};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Display grouping for a setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Hdr,
    VisualClarity,
    Performance,
    Audio,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Hdr => "HDR",
            Category::VisualClarity => "Visual Clarity",
            Category::Performance => "Performance",
            Category::Audio => "Audio",
        };
        f.write_str(label)
    }
}

/// Static description of a setting, before its pattern is compiled
#[derive(Debug, Clone, Copy)]
pub struct SettingDef {
    pub id: &'static str,
    pub key: &'static str,
    pub default_value: &'static str,
    pub description: &'static str,
    pub category: Category,
}

/// Settings shipped with the editor, in display order
pub const BUILTIN_SETTINGS: &[SettingDef] = &[
    SettingDef {
        id: "hdr_peak_brightness",
        key: "GstRender.DisplayMappingHdr10PeakLuma",
        default_value: "400.000000",
        description: "HDR Peak Brightness (nits)",
        category: Category::Hdr,
    },
    SettingDef {
        id: "weapon_dof",
        key: "GstRender.WeaponDOF",
        default_value: "0",
        description: "Weapon Depth of Field",
        category: Category::VisualClarity,
    },
    SettingDef {
        id: "chromatic_aberration",
        key: "GstRender.ChromaticAberration",
        default_value: "0",
        description: "Chromatic Aberration",
        category: Category::VisualClarity,
    },
    SettingDef {
        id: "film_grain",
        key: "GstRender.FilmGrain",
        default_value: "0",
        description: "Film Grain",
        category: Category::VisualClarity,
    },
    SettingDef {
        id: "vignette",
        key: "GstRender.Vignette",
        default_value: "0",
        description: "Vignette",
        category: Category::VisualClarity,
    },
    SettingDef {
        id: "lens_distortion",
        key: "GstRender.LensDistortion",
        default_value: "0",
        description: "Lens Distortion",
        category: Category::VisualClarity,
    },
    SettingDef {
        id: "motion_blur_weapon",
        key: "GstRender.MotionBlurWeapon",
        default_value: "0.000000",
        description: "Motion Blur - Weapon",
        category: Category::VisualClarity,
    },
    SettingDef {
        id: "motion_blur_world",
        key: "GstRender.MotionBlurWorld",
        default_value: "0.000000",
        description: "Motion Blur - World",
        category: Category::VisualClarity,
    },
    SettingDef {
        id: "nvidia_low_latency",
        key: "GstRender.NvidiaLowLatency",
        default_value: "1",
        description: "NVIDIA Low Latency Mode",
        category: Category::Performance,
    },
    SettingDef {
        id: "amd_low_latency",
        key: "GstRender.AMDLowLatency",
        default_value: "1",
        description: "AMD Low Latency Mode",
        category: Category::Performance,
    },
    SettingDef {
        id: "intel_low_latency",
        key: "GstRender.IntelLowLatency",
        default_value: "1",
        description: "Intel Low Latency Mode",
        category: Category::Performance,
    },
    SettingDef {
        id: "future_frame_rendering",
        key: "GstRender.FutureFrameRendering",
        default_value: "0",
        description: "Future Frame Rendering",
        category: Category::Performance,
    },
    SettingDef {
        id: "tinnitus",
        key: "GstAudio.Volume_Tinnitus",
        default_value: "0.000000",
        description: "Tinnitus Effect Volume",
        category: Category::Audio,
    },
];

/// A setting with its compiled match pattern
#[derive(Debug, Clone)]
pub struct Setting {
    pub id: &'static str,
    pub key: &'static str,
    pub default_value: &'static str,
    pub description: &'static str,
    pub category: Category,
    pattern: Regex,
}

impl Setting {
    /// Compile the pattern for `def`.
    ///
    /// Group 1 captures the key and the whitespace after it, group 2 the
    /// (optionally signed) integer or decimal value.
    pub fn new(def: &SettingDef) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(r"(?m)({}\s+)([-+]?\d+\.?\d*)", regex::escape(def.key)))?;
        Ok(Self {
            id: def.id,
            key: def.key,
            default_value: def.default_value,
            description: def.description,
            category: def.category,
            pattern,
        })
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Current value of the first occurrence of this setting in `content`
    pub fn find_value<'c>(&self, content: &'c str) -> Option<&'c str> {
        self.pattern
            .captures(content)
            .and_then(|caps| caps.get(2))
            .map(|m| m.as_str())
    }

    /// Replace every occurrence's value with `new_value`.
    ///
    /// Returns the rewritten content and the number of occurrences matched.
    /// `new_value` is inserted literally (no `$group` expansion).
    pub fn replace_all<'c>(&self, content: &'c str, new_value: &str) -> (Cow<'c, str>, usize) {
        let mut matched = 0;
        let replaced = self.pattern.replace_all(content, |caps: &Captures<'_>| {
            matched += 1;
            format!("{}{}", &caps[1], new_value)
        });
        (replaced, matched)
    }
}

/// Immutable id -> setting catalog
#[derive(Debug, Clone)]
pub struct SettingRegistry {
    settings: Vec<Setting>,
    index: HashMap<&'static str, usize>,
}

impl SettingRegistry {
    /// Registry of the settings shipped with the editor
    pub fn builtin() -> Self {
        Self::from_defs(BUILTIN_SETTINGS).expect("builtin setting keys are regex-escaped")
    }

    /// Build a registry from definitions. The first definition of an id wins.
    pub fn from_defs(defs: &[SettingDef]) -> Result<Self, regex::Error> {
        let mut settings = Vec::with_capacity(defs.len());
        let mut index = HashMap::with_capacity(defs.len());

        for def in defs {
            if index.contains_key(def.id) {
                warn!(id = def.id, "Duplicate setting id ignored");
                continue;
            }
            index.insert(def.id, settings.len());
            settings.push(Setting::new(def)?);
        }

        Ok(Self { settings, index })
    }

    pub fn get(&self, id: &str) -> Option<&Setting> {
        self.index.get(id).map(|&i| &self.settings[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Settings in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &Setting> {
        self.settings.iter()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}
