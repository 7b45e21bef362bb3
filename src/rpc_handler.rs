//! One-shot message handler for Unslop.
//!
//! Extracted from the host transport so it can be unit-tested independently.
//! `handle_message` answers each `RuntimeMessage` with exactly one
//! `RuntimeResponse`; failures become `RuntimeResponse::Error`.

use crate::app::App;
use crate::types::errors::StorageError;
use crate::types::messages::{RuntimeMessage, RuntimeResponse};

/// Dispatch a one-shot message to storage or a provider client.
pub async fn handle_message(app: &App, message: RuntimeMessage) -> RuntimeResponse {
    match message {
        // ─── Credentials ───
        RuntimeMessage::ValidateKey { api_key, provider } => {
            tracing::debug!(%provider, "validating key");
            app.provider(provider).validate_key(&api_key).await.into()
        }

        // ─── Personas ───
        RuntimeMessage::GetPersonas => respond(
            app.storage_call(|s| s.get_personas())
                .await
                .map(|personas| RuntimeResponse::Personas { personas }),
        ),
        RuntimeMessage::AddPersona { persona } => respond(
            app.storage_call(move |s| s.add_persona(persona))
                .await
                .map(|persona| RuntimeResponse::Persona { persona }),
        ),
        RuntimeMessage::UpdatePersona { id, updates } => respond(
            app.storage_call(move |s| s.update_persona(&id, &updates))
                .await
                .map(|_| RuntimeResponse::Ok),
        ),
        RuntimeMessage::DeletePersona { id } => {
            respond(
                app.storage_call(move |s| s.delete_persona(&id))
                    .await
                    .map(|_| RuntimeResponse::Ok),
            )
        }

        // ─── Settings ───
        RuntimeMessage::GetSettings => respond(
            app.storage_call(|s| s.get_settings())
                .await
                .map(|settings| RuntimeResponse::Settings { settings }),
        ),
        RuntimeMessage::SetSettings { settings } => {
            respond(
                app.storage_call(move |s| s.set_settings(&settings))
                    .await
                    .map(|_| RuntimeResponse::Ok),
            )
        }
    }
}

fn respond(result: Result<RuntimeResponse, StorageError>) -> RuntimeResponse {
    result.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "one-shot message failed");
        RuntimeResponse::Error {
            error: e.to_string(),
        }
    })
}
