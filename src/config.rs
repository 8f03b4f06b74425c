use serde::{Deserialize, Serialize};
use snes_apu::dsp::DEFAULT_QUEUE_CAPACITY;
use snes_apu::Interpolation;

use crate::cartridge::Region;

/// Host-selectable knobs. Passed to `Snes::with_config`; the core keeps its
/// own copy and reads no global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Forces NTSC or PAL timing instead of the cartridge's country code.
    pub region: Option<Region>,
    pub interpolation: Interpolation,
    /// Emits one `trace!` line per executed CPU instruction.
    pub trace_cpu: bool,
    /// Capacity of the DSP output queue, in stereo sample pairs.
    pub audio_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: None,
            interpolation: Interpolation::Gaussian,
            trace_cpu: false,
            audio_queue: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    /// Reads `SNES_REGION`, `SNES_INTERPOLATION`, `SNES_TRACE_CPU` and
    /// `SNES_AUDIO_QUEUE`. Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        if let Some(v) = lookup("SNES_REGION") {
            config.region = parse_region(&v);
        }
        if let Some(interpolation) = lookup("SNES_INTERPOLATION").and_then(|v| parse_interpolation(&v)) {
            config.interpolation = interpolation;
        }
        if let Some(v) = lookup("SNES_TRACE_CPU") {
            config.trace_cpu = matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON");
        }
        if let Some(n) = lookup("SNES_AUDIO_QUEUE").and_then(|v| v.parse::<usize>().ok()) {
            config.audio_queue = n.max(1);
        }
        config
    }
}

fn parse_region(value: &str) -> Option<Region> {
    match value.to_ascii_lowercase().as_str() {
        "ntsc" => Some(Region::Ntsc),
        "pal" => Some(Region::Pal),
        _ => None,
    }
}

fn parse_interpolation(value: &str) -> Option<Interpolation> {
    match value.to_ascii_lowercase().as_str() {
        "gaussian" | "gauss" => Some(Interpolation::Gaussian),
        "linear" => Some(Interpolation::Linear),
        "hermite" => Some(Interpolation::Hermite),
        "cosine" => Some(Interpolation::Cosine),
        "cubic" => Some(Interpolation::Cubic),
        _ => None,
    }
}
