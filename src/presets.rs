//! Named groups of settings
//!
//! Built-in presets list which tweaks are switched on; enabling a tweak means
//! applying its registry default. Custom presets from the editor config carry
//! explicit values instead.

use std::collections::BTreeMap;
use tracing::warn;

use crate::engine::ApplyRequest;
use crate::settings::SettingRegistry;

/// A preset shipped with the editor
#[derive(Debug, Clone, Copy)]
pub struct BuiltinPreset {
    pub name: &'static str,
    pub description: &'static str,
    /// `(setting id, enabled)`
    pub toggles: &'static [(&'static str, bool)],
}

pub const BUILTIN_PRESETS: &[BuiltinPreset] = &[
    BuiltinPreset {
        name: "Competitive",
        description: "All visual clarity and performance optimizations enabled",
        toggles: &[
            ("weapon_dof", true),
            ("chromatic_aberration", true),
            ("film_grain", true),
            ("vignette", true),
            ("lens_distortion", true),
            ("motion_blur_weapon", true),
            ("motion_blur_world", true),
            ("nvidia_low_latency", true),
            ("amd_low_latency", true),
            ("intel_low_latency", true),
            ("future_frame_rendering", true),
            ("tinnitus", true),
        ],
    },
    BuiltinPreset {
        name: "Balanced",
        description: "Moderate settings balancing visual quality and performance",
        toggles: &[
            ("weapon_dof", true),
            ("chromatic_aberration", false),
            ("film_grain", true),
            ("vignette", false),
            ("lens_distortion", true),
            ("motion_blur_weapon", true),
            ("motion_blur_world", false),
            ("nvidia_low_latency", true),
            ("amd_low_latency", true),
            ("intel_low_latency", true),
            ("future_frame_rendering", true),
            ("tinnitus", true),
        ],
    },
    BuiltinPreset {
        name: "Cinematic",
        description: "Visual effects enabled for screenshots and recordings",
        toggles: &[
            ("weapon_dof", false),
            ("chromatic_aberration", false),
            ("film_grain", false),
            ("vignette", false),
            ("lens_distortion", false),
            ("motion_blur_weapon", false),
            ("motion_blur_world", false),
            ("nvidia_low_latency", false),
            ("amd_low_latency", false),
            ("intel_low_latency", false),
            ("future_frame_rendering", false),
            ("tinnitus", false),
        ],
    },
];

impl BuiltinPreset {
    /// Request applying the default of every enabled setting
    pub fn to_request(&self, registry: &SettingRegistry) -> ApplyRequest {
        self.toggles
            .iter()
            .filter(|(_, enabled)| *enabled)
            .filter_map(|(id, _)| match registry.get(id) {
                Some(setting) => Some((*id, setting.default_value)),
                None => {
                    warn!(preset = self.name, id = id, "Preset refers to unknown setting");
                    None
                }
            })
            .collect()
    }
}

/// Case-insensitive lookup of a built-in preset
pub fn builtin(name: &str) -> Option<&'static BuiltinPreset> {
    BUILTIN_PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Resolve `name` against custom presets first, then built-ins
pub fn resolve(
    name: &str,
    custom: &BTreeMap<String, BTreeMap<String, String>>,
    registry: &SettingRegistry,
) -> Option<ApplyRequest> {
    if let Some((_, values)) = custom.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        return Some(values.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect());
    }
    builtin(name).map(|preset| preset.to_request(registry))
}

/// Remove the custom preset matching `name` (case-insensitive).
///
/// Returns the stored name of the removed preset. Built-in presets are not
/// stored in the map and cannot be removed.
pub fn remove_custom(custom: &mut BTreeMap<String, BTreeMap<String, String>>, name: &str) -> Option<String> {
    let key = custom.keys().find(|n| n.eq_ignore_ascii_case(name))?.clone();
    custom.remove(&key);
    Some(key)
}
