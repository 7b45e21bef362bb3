//! Persona and settings storage for Unslop.
//!
//! Implements `StorageTrait`, the small key-value collaborator the relay reads
//! personas and provider settings from, backed by SQLite via `rusqlite`.
//! Writes are last-write-wins; every read goes to the database.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::types::errors::StorageError;
use crate::types::persona::{NewPersona, Persona, PersonaUpdate, TonePreset, DEFAULT_PERSONA_ID};
use crate::types::settings::ProviderSettings;

const SETTINGS_KEY: &str = "settings";

/// Trait defining the persistence operations used by the relay and the settings UI.
pub trait StorageTrait {
    fn get_personas(&self) -> Result<Vec<Persona>, StorageError>;
    fn set_personas(&self, personas: &[Persona]) -> Result<(), StorageError>;
    fn add_persona(&self, persona: NewPersona) -> Result<Persona, StorageError>;
    fn update_persona(&self, id: &str, updates: &PersonaUpdate) -> Result<(), StorageError>;
    fn delete_persona(&self, id: &str) -> Result<(), StorageError>;
    fn get_persona_by_id(&self, id: &str) -> Result<Option<Persona>, StorageError>;
    fn get_settings(&self) -> Result<ProviderSettings, StorageError>;
    fn set_settings(&self, settings: &ProviderSettings) -> Result<(), StorageError>;
}

/// SQLite-backed storage shared by every port task.
#[derive(Clone)]
pub struct Storage {
    db: Arc<Database>,
}

impl Storage {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Current time in milliseconds since the UNIX epoch.
    fn now_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }

    fn row_to_persona(row: &rusqlite::Row) -> rusqlite::Result<(Persona, String)> {
        Ok((
            Persona {
                id: row.get(0)?,
                name: row.get(1)?,
                style_icon: row.get(2)?,
                tone_presets: Vec::new(),
                custom_instructions: row.get(4)?,
                created_at: row.get(5)?,
                order: row.get(6)?,
            },
            row.get(3)?,
        ))
    }

    fn decode_presets(raw: &str) -> Result<Vec<TonePreset>, StorageError> {
        Ok(serde_json::from_str(raw)?)
    }

    fn load_personas(&self) -> Result<Vec<Persona>, StorageError> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(
            "SELECT id, name, style_icon, tone_presets, custom_instructions, created_at, position
             FROM personas ORDER BY position ASC, created_at ASC",
        )?;
        let rows = stmt.query_map([], Self::row_to_persona)?;

        let mut personas = Vec::new();
        for row in rows {
            let (mut persona, presets) = row?;
            persona.tone_presets = Self::decode_presets(&presets)?;
            personas.push(persona);
        }
        Ok(personas)
    }

    fn write_persona(conn: &rusqlite::Connection, persona: &Persona) -> Result<(), StorageError> {
        let presets = serde_json::to_string(&persona.tone_presets)?;
        conn.execute(
            "INSERT OR REPLACE INTO personas (id, name, style_icon, tone_presets, custom_instructions, created_at, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                persona.id,
                persona.name,
                persona.style_icon,
                presets,
                persona.custom_instructions,
                persona.created_at,
                persona.order
            ],
        )?;
        Ok(())
    }
}

impl StorageTrait for Storage {
    /// Returns all personas in display order, seeding the default persona into an empty store.
    fn get_personas(&self) -> Result<Vec<Persona>, StorageError> {
        let personas = self.load_personas()?;
        if personas.is_empty() {
            let seeded = vec![Persona::default_persona()];
            self.set_personas(&seeded)?;
            return Ok(seeded);
        }
        Ok(personas)
    }

    /// Replaces the whole persona list.
    fn set_personas(&self, personas: &[Persona]) -> Result<(), StorageError> {
        let mut conn = self.db.connection();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM personas", [])?;
        for persona in personas {
            Self::write_persona(&tx, persona)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Stores a new persona at the end of the list and returns it with its generated id.
    fn add_persona(&self, persona: NewPersona) -> Result<Persona, StorageError> {
        let existing = self.get_personas()?;
        let created = Persona {
            id: Uuid::new_v4().to_string(),
            name: persona.name,
            style_icon: persona.style_icon,
            tone_presets: persona.tone_presets,
            custom_instructions: persona.custom_instructions,
            created_at: Self::now_millis(),
            order: existing.len() as i64,
        };
        let conn = self.db.connection();
        Self::write_persona(&conn, &created)?;
        Ok(created)
    }

    fn update_persona(&self, id: &str, updates: &PersonaUpdate) -> Result<(), StorageError> {
        let mut persona = self
            .get_persona_by_id(id)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        updates.apply_to(&mut persona);
        let conn = self.db.connection();
        Self::write_persona(&conn, &persona)
    }

    /// Removes a persona. The default persona is protected; unknown ids are ignored.
    fn delete_persona(&self, id: &str) -> Result<(), StorageError> {
        if id == DEFAULT_PERSONA_ID {
            return Err(StorageError::DefaultPersona);
        }
        self.db
            .connection()
            .execute("DELETE FROM personas WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn get_persona_by_id(&self, id: &str) -> Result<Option<Persona>, StorageError> {
        Ok(self.get_personas()?.into_iter().find(|p| p.id == id))
    }

    fn get_settings(&self) -> Result<ProviderSettings, StorageError> {
        let raw: Option<String> = self
            .db
            .connection()
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(ProviderSettings::default()),
        }
    }

    fn set_settings(&self, settings: &ProviderSettings) -> Result<(), StorageError> {
        let json = serde_json::to_string(settings)?;
        self.db.connection().execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![SETTINGS_KEY, json, Self::now_millis()],
        )?;
        Ok(())
    }
}
