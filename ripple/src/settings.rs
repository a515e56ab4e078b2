use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub mode: Mode,

    /// Side length of the square height-field texture in texels.
    pub water_resolution: u32,

    /// Side length of the square caustics texture in texels.
    pub caustics_resolution: u32,

    /// Per-step velocity attenuation of the wave equation. Values below 1.0
    /// bleed energy out of the simulation; 1.0 and above never settle.
    pub wave_damping: f32,

    /// Default drop footprint in plane units and height offset per drop.
    pub drop_radius: f32,
    pub drop_strength: f32,

    /// Random drops splashed at startup so the pool is not born flat.
    pub initial_drops: u32,

    /// Simulation steps per second, decoupled from the host frame rate.
    pub simulation_frame_rate: f32,

    pub light_direction: [f32; 3],

    /// Optional image file for the pool walls. Falls back to a procedural
    /// checkerboard.
    pub tiles_texture: Option<PathBuf>,

    /// Seed for the internal RNG. Random when unset.
    pub seed: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Mode {
    Normal,
    DebugWater,
    DebugCaustics,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: Mode::Normal,
            water_resolution: 256,
            caustics_resolution: 1024,
            wave_damping: 0.995,
            drop_radius: 0.03,
            drop_strength: 0.01,
            initial_drops: 4,
            simulation_frame_rate: 60.0,
            light_direction: [0.7559, 0.7559, -0.3779],
            tiles_texture: None,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.mode, Mode::Normal);
        assert!(settings.wave_damping > 0.0 && settings.wave_damping < 1.0);
        assert!(settings.drop_radius > 0.0);
        assert!(settings.water_resolution.is_power_of_two());
        assert!(settings.caustics_resolution.is_power_of_two());
    }

    #[test]
    fn roundtrips_through_json() {
        let settings = Settings {
            mode: Mode::DebugCaustics,
            wave_damping: 0.98,
            seed: Some("splash".to_owned()),
            ..Default::default()
        };

        let encoded = serde_json::to_string(&settings).unwrap();
        let decoded: Settings = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.mode, Mode::DebugCaustics);
        assert_eq!(decoded.wave_damping, 0.98);
        assert_eq!(decoded.seed.as_deref(), Some("splash"));
    }

    #[test]
    fn accepts_partial_camel_case_overrides() {
        let decoded: Settings =
            serde_json::from_str(r#"{ "waveDamping": 0.9, "dropRadius": 0.1 }"#).unwrap();
        assert_eq!(decoded.wave_damping, 0.9);
        assert_eq!(decoded.drop_radius, 0.1);
        assert_eq!(decoded.water_resolution, 256);
    }
}
