// Unslop prompt builder
// Turns a persona and the selected text into the system/user prompt pair sent upstream.

use crate::types::persona::Persona;

const SYSTEM_PROMPT: &str = "You are a text rewriter. Your job is to take corporate, AI-generated, or overly polished text and rewrite it to sound natural, human, and authentic.

Rules:
- Keep the same meaning and key information
- Remove corporate buzzwords, filler phrases, and AI-isms (e.g. \"leverage\", \"synergy\", \"I hope this message finds you well\", \"please don't hesitate to\", \"I'd be happy to\")
- Make it sound like a real person typed it quickly in a chat or email
- Don't add information that wasn't in the original
- Match the length roughly (don't make it significantly longer or shorter)
- Do NOT use markdown formatting, bullet points, or headers unless the original had them
- Output ONLY the rewritten text, nothing else, no preamble, no explanation";

/// Prompt halves for one generation. Providers pick the shape they need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub system: String,
    pub user: String,
}

impl PromptPayload {
    pub fn for_persona(persona: &Persona, text: &str) -> Self {
        Self {
            system: build_system_prompt(persona),
            user: build_user_message(text),
        }
    }

    /// Single prompt for upstreams without a system role.
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

/// Base rewriting rules plus the persona's tone presets and custom instructions.
pub fn build_system_prompt(persona: &Persona) -> String {
    let mut prompt = SYSTEM_PROMPT.to_string();

    let has_presets = !persona.tone_presets.is_empty();
    let has_custom = !persona.custom_instructions.trim().is_empty();

    if has_presets || has_custom {
        prompt.push_str("\n\nAdditionally, write in this specific style:");

        if has_presets {
            let tones: Vec<String> = persona
                .tone_presets
                .iter()
                .map(|t| format!("- {}", t.description()))
                .collect();
            prompt.push_str("\n\nTone:\n");
            prompt.push_str(&tones.join("\n"));
        }

        if has_custom {
            prompt.push_str("\n\nSpecific style instructions:\n");
            prompt.push_str(&persona.custom_instructions);
        }
    }

    prompt
}

pub fn build_user_message(text: &str) -> String {
    format!("Text to rewrite:\n\"\"\"\n{}\n\"\"\"", text)
}

pub fn build_prompt(text: &str, persona: &Persona) -> String {
    PromptPayload::for_persona(persona, text).combined()
}
