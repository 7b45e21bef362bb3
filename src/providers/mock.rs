//! Offline provider that types out a canned rewrite.
//!
//! Lets the relay and the content side be exercised without network access or
//! API quota. Pacing imitates a person typing: longer pauses after sentence
//! and clause punctuation, a short one after spaces.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use super::{ProviderClient, StreamEmitter, StreamSink};
use crate::services::prompt_builder::PromptPayload;
use crate::types::messages::KeyValidation;
use crate::types::settings::ProviderKind;

pub const MOCK_RESPONSES: [&str; 8] = [
    "Hey, just wanted to circle back on this. The thing is, we need to get this done by EOD. Can you take a look and let me know what you think?",
    "So I've been thinking about this a lot, and honestly? We should probably just go with the simpler approach. Less headache, you know?",
    "Quick question - did you get a chance to review that thing I sent over? No rush, but would be great to hear your thoughts when you can.",
    "Alright, here's the deal. We've got three options and none of them are perfect, but option B seems like the least painful. What do you think?",
    "Not gonna lie, this is trickier than I thought. Maybe we should loop in Sarah? She dealt with something similar last quarter.",
    "Just a heads up - the timeline's shifted a bit. Still doable, but we might need to cut a few corners. You good with that?",
    "Okay so I tried the approach we talked about and it's... not great. Thinking we pivot to plan B. Thoughts?",
    "Real talk - this is going to take longer than expected. Better to do it right than rush it, yeah?",
];

/// Upper bound for the configured pacing multiplier.
pub const MAX_DELAY_SCALE: f64 = 100.0;

/// Kind of pause that follows a typed character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    Sentence,
    Clause,
    Space,
    Letter,
}

impl Pause {
    pub fn after(c: char) -> Self {
        match c {
            '.' | '?' | '!' => Pause::Sentence,
            ',' | ':' | ';' => Pause::Clause,
            ' ' => Pause::Space,
            _ => Pause::Letter,
        }
    }

    /// Extra milliseconds on top of the base per-character delay.
    fn extra_ms(&self, rng: &mut impl Rng) -> f64 {
        match self {
            Pause::Sentence => rng.gen_range(100.0..300.0),
            Pause::Clause => rng.gen_range(50.0..150.0),
            Pause::Space => rng.gen_range(10.0..30.0),
            Pause::Letter => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    delay_scale: f64,
}

impl MockProvider {
    /// `delay_scale` multiplies every simulated delay; `0.0` streams without sleeping.
    ///
    /// Negative or NaN scales count as `0.0`; larger ones are capped at [`MAX_DELAY_SCALE`].
    pub fn new(delay_scale: f64) -> Self {
        let delay_scale = if delay_scale.is_nan() {
            0.0
        } else {
            delay_scale.clamp(0.0, MAX_DELAY_SCALE)
        };
        Self { delay_scale }
    }

    pub fn pick_response() -> &'static str {
        let idx = rand::thread_rng().gen_range(0..MOCK_RESPONSES.len());
        MOCK_RESPONSES[idx]
    }

    fn initial_delay(&self) -> Duration {
        let ms = rand::thread_rng().gen_range(300.0..700.0);
        self.scaled(ms)
    }

    fn char_delay(&self, c: char) -> Duration {
        let mut rng = rand::thread_rng();
        let ms = rng.gen_range(15.0..40.0) + Pause::after(c).extra_ms(&mut rng);
        self.scaled(ms)
    }

    fn scaled(&self, ms: f64) -> Duration {
        Duration::from_secs_f64(ms * self.delay_scale / 1000.0)
    }

    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ProviderClient for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn validate_key(&self, _api_key: &str) -> KeyValidation {
        KeyValidation::valid()
    }

    async fn stream_generate(
        &self,
        _api_key: &str,
        _prompt: &PromptPayload,
        sink: &mut (dyn StreamSink + Send),
    ) {
        let response = Self::pick_response();
        let mut emitter = StreamEmitter::new(sink);

        self.pause(self.initial_delay()).await;

        let mut buf = [0u8; 4];
        for c in response.chars() {
            if !emitter.is_active() {
                tracing::debug!("mock stream abandoned by listener");
                return;
            }
            emitter.chunk(c.encode_utf8(&mut buf));
            self.pause(self.char_delay(c)).await;
        }

        emitter.done();
    }
}
