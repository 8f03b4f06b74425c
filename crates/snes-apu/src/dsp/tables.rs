use std::sync::OnceLock;

/// Length of the shared envelope/noise rate counter (2048 * 3 * 5 samples).
pub const COUNTER_RANGE: u16 = 30720;

/// Samples between steps for each of the 32 envelope/noise rates. Rate 0
/// never fires.
#[rustfmt::skip]
pub static COUNTER_RATES: [u16; 32] = [
    COUNTER_RANGE + 1,
          2048, 1536,
    1280, 1024,  768,
     640,  512,  384,
     320,  256,  192,
     160,  128,   96,
      80,   64,   48,
      40,   32,   24,
      20,   16,   12,
      10,    8,    6,
       5,    4,    3,
             2,
             1,
];

#[rustfmt::skip]
pub static COUNTER_OFFSETS: [u16; 32] = [
      1, 0, 1040,
    536, 0, 1040,
    536, 0, 1040,
    536, 0, 1040,
    536, 0, 1040,
    536, 0, 1040,
    536, 0, 1040,
    536, 0, 1040,
    536, 0, 1040,
    536, 0, 1040,
         0,
         0,
];

/// True when `rate` steps on the sample where the global counter reads `counter`.
pub fn counter_fires(counter: u16, rate: usize) -> bool {
    let rate = rate & 0x1F;
    (counter as u32 + COUNTER_OFFSETS[rate] as u32) % COUNTER_RATES[rate] as u32 == 0
}

/// 512-entry Gaussian interpolation kernel. Entry `i` weights a sample at
/// distance `(511 - i) / 256` from the interpolation centre; for every phase
/// the four taps sum to 2048.
pub fn gauss_table() -> &'static [i16; 512] {
    static TABLE: OnceLock<[i16; 512]> = OnceLock::new();
    TABLE.get_or_init(build_gauss_table)
}

fn build_gauss_table() -> [i16; 512] {
    // Gaussian matched to the hardware curve (peak 1305, 374 one sample away),
    // windowed so it reaches zero two samples away.
    let kernel = |d: f64| -> f64 {
        let g = (-1.2497 * d * d).exp();
        let w = 0.5 + 0.5 * (std::f64::consts::PI * d / 2.0).cos();
        if d >= 2.0 {
            0.0
        } else {
            g * w
        }
    };

    let mut raw = [0f64; 512];
    for (i, slot) in raw.iter_mut().enumerate() {
        *slot = kernel((511 - i) as f64 / 256.0);
    }

    let mut table = [0i16; 512];
    for phase in 0..256 {
        let taps = [phase, 255 - phase, 256 + phase, 511 - phase];
        let sum: f64 = taps.iter().map(|&i| raw[i]).sum();
        let scale = 2048.0 / sum;
        for &i in &taps {
            table[i] = (raw[i] * scale).round() as i16;
        }
    }
    table
}

/// Half-cosine easing curve for cosine interpolation, 256 steps in 0..=4096.
pub fn cosine_table() -> &'static [i32; 256] {
    static TABLE: OnceLock<[i32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0i32; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            let t = i as f64 / 256.0;
            *slot = ((1.0 - (t * std::f64::consts::PI).cos()) * 2048.0).round() as i32;
        }
        table
    })
}
