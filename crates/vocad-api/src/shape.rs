use std::collections::HashMap;

use axum::extract::{Multipart, State};
use axum::Json;
use tracing::warn;
use uuid::Uuid;

use vocad_gen::shape::{ImageUpload, MultiviewImages, ShapeParams};
use vocad_types::api::ShapeResponse;

use crate::error::ApiError;
use crate::state::AppState;

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
const DEFAULT_CAPTION: &str = "Eric Zou, a male human being, Asian ethnicity";

fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn parse_field<T: std::str::FromStr>(
    fields: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ApiError> {
    match fields.get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::bad_request(format!("invalid value for {key}"))),
        None => Ok(default),
    }
}

fn parse_bool(fields: &HashMap<String, String>, key: &str, default: bool) -> bool {
    fields
        .get(key)
        .map(|v| v.to_ascii_lowercase() == "true")
        .unwrap_or(default)
}

/// POST /api/hunyuan/generate — pass-through to the image-to-3D space,
/// with a best-effort model-row insert for the produced URL.
pub async fn generate_shape(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ShapeResponse>, ApiError> {
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut images: HashMap<String, ImageUpload> = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name() {
            Some(filename) if !filename.is_empty() => {
                let filename = filename.to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read {name}: {e}")))?;
                images.insert(
                    name,
                    ImageUpload {
                        bytes: bytes.to_vec(),
                        filename,
                    },
                );
            }
            _ => {
                if let Ok(text) = field.text().await {
                    fields.insert(name, text);
                }
            }
        }
    }

    let userid = fields
        .get("userid")
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ApiError::bad_request("userid is required"))?;

    let image = images
        .remove("image")
        .ok_or_else(|| ApiError::bad_request("Main image is required"))?;
    if !allowed_file(&image.filename) {
        return Err(ApiError::bad_request(format!(
            "Invalid file type. Allowed: {:?}",
            ALLOWED_EXTENSIONS
        )));
    }

    // Multiview slots are optional; files with unsupported extensions are
    // silently ignored, matching allowed-list behavior on the main image.
    let mut view = |key: &str| -> Option<ImageUpload> {
        images.remove(key).filter(|img| allowed_file(&img.filename))
    };
    let views = MultiviewImages {
        front: view("mv_image_front"),
        back: view("mv_image_back"),
        left: view("mv_image_left"),
        right: view("mv_image_right"),
    };

    let caption = fields
        .get("caption")
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| DEFAULT_CAPTION.to_string());

    let defaults = ShapeParams::default();
    let params = ShapeParams {
        caption: caption.clone(),
        steps: parse_field(&fields, "steps", defaults.steps)?,
        guidance_scale: parse_field(&fields, "guidance_scale", defaults.guidance_scale)?,
        seed: parse_field(&fields, "seed", defaults.seed)?,
        octree_resolution: parse_field(&fields, "octree_resolution", defaults.octree_resolution)?,
        check_box_rembg: parse_bool(&fields, "check_box_rembg", defaults.check_box_rembg),
        num_chunks: parse_field(&fields, "num_chunks", defaults.num_chunks)?,
        randomize_seed: parse_bool(&fields, "randomize_seed", defaults.randomize_seed),
    };

    let model_url = state
        .shape
        .generate(image, views, &params)
        .await
        .map_err(|e| ApiError::from_gen(e, state.debug))?;

    if let Some(url) = model_url.clone() {
        // Persistence is best-effort; the client still gets the URL.
        let db = state.db.clone();
        let name = if caption.is_empty() {
            format!("Model_{}", chrono::Utc::now().timestamp())
        } else {
            caption
        };
        let insert = tokio::task::spawn_blocking(move || {
            db.insert_model(&Uuid::new_v4().to_string(), &userid, &name, None, Some(&url))
        })
        .await;
        match insert {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("model insert failed: {}", e),
            Err(e) => warn!("model insert join error: {}", e),
        }
    }

    Ok(Json(ShapeResponse {
        success: true,
        model_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_allow_list() {
        assert!(allowed_file("photo.PNG"));
        assert!(allowed_file("a.b.webp"));
        assert!(!allowed_file("model.glb"));
        assert!(!allowed_file("noextension"));
    }

    #[test]
    fn numeric_fields_fall_back_to_defaults() {
        let fields = HashMap::new();
        assert_eq!(parse_field(&fields, "steps", 32u32).unwrap(), 32);
        assert!(parse_bool(&fields, "check_box_rembg", true));
    }

    #[test]
    fn invalid_numeric_field_is_rejected() {
        let mut fields = HashMap::new();
        fields.insert("steps".to_string(), "lots".to_string());
        assert!(parse_field(&fields, "steps", 32u32).is_err());
    }
}
