#![allow(dead_code)]

pub const TEST_RSA_KEY_BITS: usize = 1024;
pub const TEST_SAMPLE_RATE: u32 = 8000;

/// Tones the synthetic model was trained on, and the labels it assigns them.
pub const LOW_TONE_HZ: f32 = 220.0;
pub const LOW_TONE_LABEL: &str = "A";
pub const HIGH_TONE_HZ: f32 = 1760.0;
pub const HIGH_TONE_LABEL: &str = "E";

pub const TEST_USER: &str = "alice";
pub const TEST_PASS: &str = "pw1";
pub const TEST_EMAIL: &str = "a@x.com";
pub const TEST_ANIMAL: &str = "cat";

pub const CONDITION_TIMEOUT_MS: u64 = 5000;
pub const CONDITION_POLL_INTERVAL_MS: u64 = 10;
