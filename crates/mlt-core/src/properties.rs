// crates/mlt-core/src/properties.rs
//
// Recognised consumer configuration keys. Modeled as a typed struct rather
// than a generic string-keyed bag: the set of keys the core actually reads
// is fixed and small, and a struct gives us `Default`/serde for free.
// `extra` is the escape hatch for anything a caller wants to round-trip
// without the core understanding it.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Normalisation {
    Pal,
    Ntsc,
}

impl Normalisation {
    /// Reads `MLT_NORMALISATION`. Anything other than exactly `"NTSC"` means
    /// PAL, matching the original's `strcmp(normalisation, "NTSC")` check,
    /// including an unset or garbled variable defaulting to PAL.
    pub fn from_env() -> Self {
        match std::env::var("MLT_NORMALISATION") {
            Ok(v) if v == "NTSC" => Normalisation::Ntsc,
            _ => Normalisation::Pal,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsumerProperties {
    pub normalisation: Normalisation,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub progressive: bool,
    pub aspect_ratio: f64,

    pub rescale: String,
    pub buffer: u32,
    pub prefill: u32,

    pub frequency: u32,
    pub channels: u32,

    pub real_time: bool,
    pub test_card: Option<String>,

    pub ante: Option<String>,
    pub post: Option<String>,

    pub video_off: bool,
    pub audio_off: bool,
    pub deinterlace: bool,
    pub put_mode: bool,

    /// Set to `false` by the `stopped` callback; readable by users. Starts
    /// `true`; nothing has stopped yet.
    pub running: bool,

    /// Unrecognised keys a caller still wants to persist with the project.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConsumerProperties {
    /// Defaults per normalisation, matching `mlt_consumer_init` exactly.
    pub fn from_normalisation(normalisation: Normalisation) -> Self {
        let (fps, width, height, aspect_ratio) = match normalisation {
            Normalisation::Pal => (25.0, 720, 576, 59.0 / 54.0),
            Normalisation::Ntsc => (30000.0 / 1001.0, 720, 480, 10.0 / 11.0),
        };
        Self {
            normalisation,
            fps,
            width,
            height,
            progressive: false,
            aspect_ratio,
            rescale: "bilinear".into(),
            buffer: 25,
            prefill: 0,
            frequency: 48000,
            channels: 2,
            real_time: true,
            test_card: std::env::var("MLT_TEST_CARD").ok(),
            ante: None,
            post: None,
            video_off: false,
            audio_off: false,
            deinterlace: false,
            put_mode: false,
            running: true,
            extra: serde_json::Map::new(),
        }
    }

    /// Construct from the environment, the way `mlt_consumer_init` does.
    pub fn from_env() -> Self {
        Self::from_normalisation(Normalisation::from_env())
    }

    /// `size = prefill` if `0 < prefill < buffer`, else `1`.
    pub fn prefill_size(&self) -> u32 {
        if self.prefill > 0 && self.prefill < self.buffer {
            self.prefill
        } else {
            1
        }
    }

    /// Queue capacity is `buffer + 1` slots.
    pub fn queue_capacity(&self) -> usize {
        self.buffer as usize + 1
    }
}

impl Default for ConsumerProperties {
    fn default() -> Self {
        Self::from_normalisation(Normalisation::Pal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pal_defaults_match_spec() {
        let p = ConsumerProperties::from_normalisation(Normalisation::Pal);
        assert_eq!(p.fps, 25.0);
        assert_eq!(p.width, 720);
        assert_eq!(p.height, 576);
        assert!((p.aspect_ratio - 59.0 / 54.0).abs() < 1e-9);
        assert_eq!(p.buffer, 25);
        assert_eq!(p.frequency, 48000);
        assert_eq!(p.channels, 2);
        assert!(p.real_time);
    }

    #[test]
    fn ntsc_defaults_match_spec() {
        let p = ConsumerProperties::from_normalisation(Normalisation::Ntsc);
        assert!((p.fps - 30000.0 / 1001.0).abs() < 1e-9);
        assert_eq!(p.height, 480);
        assert!((p.aspect_ratio - 10.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn prefill_ignored_when_out_of_range() {
        let mut p = ConsumerProperties::default();
        p.buffer = 10;
        p.prefill = 10; // prefill >= buffer: ignored
        assert_eq!(p.prefill_size(), 1);
        p.prefill = 5;
        assert_eq!(p.prefill_size(), 5);
        p.prefill = 0;
        assert_eq!(p.prefill_size(), 1);
    }

    #[test]
    fn buffer_zero_gives_capacity_one() {
        let mut p = ConsumerProperties::default();
        p.buffer = 0;
        assert_eq!(p.queue_capacity(), 1);
    }
}
