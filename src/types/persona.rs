use serde::{Deserialize, Serialize};

/// ID of the reserved persona that always exists.
pub const DEFAULT_PERSONA_ID: &str = "default";

/// Tone presets a persona can combine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TonePreset {
    Casual,
    Blunt,
    Sarcastic,
    Friendly,
}

impl TonePreset {
    pub fn label(&self) -> &'static str {
        match self {
            TonePreset::Casual => "Casual",
            TonePreset::Blunt => "Blunt",
            TonePreset::Sarcastic => "Sarcastic",
            TonePreset::Friendly => "Friendly",
        }
    }

    /// Style description injected into the system prompt.
    pub fn description(&self) -> &'static str {
        match self {
            TonePreset::Casual => {
                "Relaxed and conversational, like texting a coworker you're friends with"
            }
            TonePreset::Blunt => "Very direct, short sentences, no fluff, gets straight to the point",
            TonePreset::Sarcastic => "Dry wit, slightly tongue-in-cheek, occasional ironic remarks",
            TonePreset::Friendly => {
                "Warm and supportive, uses encouraging language, team-player energy"
            }
        }
    }
}

/// A named rewriting style selected by the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub style_icon: String,
    pub tone_presets: Vec<TonePreset>,
    pub custom_instructions: String,
    /// Creation time in milliseconds since the UNIX epoch.
    pub created_at: i64,
    pub order: i64,
}

impl Persona {
    /// The reserved fallback persona seeded into an empty store.
    pub fn default_persona() -> Self {
        Self {
            id: DEFAULT_PERSONA_ID.to_string(),
            name: "Generic Unslop".to_string(),
            style_icon: "🧹".to_string(),
            tone_presets: vec![TonePreset::Casual],
            custom_instructions: String::new(),
            created_at: 0,
            order: 0,
        }
    }
}

/// Fields supplied when creating a persona; id, timestamp and order are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewPersona {
    pub name: String,
    pub style_icon: String,
    #[serde(default)]
    pub tone_presets: Vec<TonePreset>,
    #[serde(default)]
    pub custom_instructions: String,
}

/// Partial update of a persona. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonaUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_presets: Option<Vec<TonePreset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

impl PersonaUpdate {
    /// Applies the present fields onto `persona`.
    pub fn apply_to(&self, persona: &mut Persona) {
        if let Some(name) = &self.name {
            persona.name = name.clone();
        }
        if let Some(icon) = &self.style_icon {
            persona.style_icon = icon.clone();
        }
        if let Some(presets) = &self.tone_presets {
            persona.tone_presets = presets.clone();
        }
        if let Some(instructions) = &self.custom_instructions {
            persona.custom_instructions = instructions.clone();
        }
        if let Some(order) = self.order {
            persona.order = order;
        }
    }
}
