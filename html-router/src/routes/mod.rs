pub mod chat;
pub mod documents;
pub mod index;
pub mod questionnaire;

use axum::body::Bytes;
use axum_typed_multipart::FieldData;

/// Browsers post an empty, unnamed file part when nothing was selected.
fn selected_file(field: Option<FieldData<Bytes>>) -> Option<FieldData<Bytes>> {
    field.filter(|file| {
        file.metadata
            .file_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty())
    })
}
