//! Seeded symbol-stream generator. Emits one `FrameInput` JSON object per
//! line. With `PASSWORD` set, the correct sequence is occasionally spliced
//! into the noise with holds long enough to pass debounce.

use std::env;

use avaguard::compile::automaton::Password;

fn lcg(seed: &mut u64) -> u64 {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    *seed >> 33
}

fn pick(seed: &mut u64, n: u64) -> u64 {
    lcg(seed) % n
}

fn frame(symbol: i64, dt: f64) {
    println!(r#"{{"symbol":{},"dt":{}}}"#, symbol, dt);
}

fn main() {
    let mut seed = env::var("SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(42u64);
    let frames = env::var("FRAMES").ok().and_then(|v| v.parse().ok()).unwrap_or(600u64);
    let dt = env::var("DT").ok().and_then(|v| v.parse().ok()).unwrap_or(1.0 / 60.0);
    let password = env::var("PASSWORD")
        .ok()
        .and_then(|v| v.parse::<Password>().ok())
        .map(|p| p.to_raw())
        .unwrap_or_default();

    let mut emitted = 0u64;
    while emitted < frames {
        let roll = pick(&mut seed, 100);
        if roll < 5 && !password.is_empty() {
            for &symbol in &password {
                let hold = 15 + pick(&mut seed, 10);
                for _ in 0..hold {
                    frame(symbol, dt);
                    emitted += 1;
                }
            }
        } else if roll < 60 {
            frame(0, dt);
            emitted += 1;
        } else {
            // Noise, sometimes out of range.
            let symbol = pick(&mut seed, 10) as i64 - 1;
            let hold = 1 + pick(&mut seed, 20);
            for _ in 0..hold {
                frame(symbol, dt);
                emitted += 1;
            }
        }
    }
}
