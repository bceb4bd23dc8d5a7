use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::GenError;

const SPACE_URL: &str = "https://tencent-hunyuan3d-2.hf.space";
const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Tunables forwarded to the shape-generation endpoint, with the defaults
/// the frontend relies on.
#[derive(Debug, Clone)]
pub struct ShapeParams {
    pub caption: String,
    pub steps: u32,
    pub guidance_scale: f64,
    pub seed: i64,
    pub octree_resolution: u32,
    pub check_box_rembg: bool,
    pub num_chunks: u32,
    pub randomize_seed: bool,
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self {
            caption: String::new(),
            steps: 32,
            guidance_scale: 5.5,
            seed: 42,
            octree_resolution: 256,
            check_box_rembg: true,
            num_chunks: 8000,
            randomize_seed: false,
        }
    }
}

pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Multiview slots; a missing slot falls back to the main image.
#[derive(Default)]
pub struct MultiviewImages {
    pub front: Option<ImageUpload>,
    pub back: Option<ImageUpload>,
    pub left: Option<ImageUpload>,
    pub right: Option<ImageUpload>,
}

/// Client for the hosted image-to-3D gradio space. The space handle is
/// acquired lazily on first use, with a fixed small number of retries —
/// the only retried call in the system.
pub struct ShapeClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    ready: OnceCell<()>,
}

impl ShapeClient {
    pub fn from_env() -> Self {
        let token = std::env::var("HUGGINGFACE_TOKEN").ok().filter(|t| !t.is_empty());
        if token.is_none() {
            info!("HUGGINGFACE_TOKEN not set; using the public space quota");
        }
        Self {
            http: reqwest::Client::new(),
            base_url: SPACE_URL.to_string(),
            token,
            ready: OnceCell::new(),
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn ensure_ready(&self) -> Result<(), GenError> {
        self.ready
            .get_or_try_init(|| async {
                let mut last_err = String::new();
                for attempt in 0..CONNECT_ATTEMPTS {
                    if attempt > 0 {
                        sleep(CONNECT_RETRY_DELAY).await;
                    }
                    let resp = self
                        .request(self.http.get(format!("{}/config", self.base_url)))
                        .send()
                        .await;
                    match resp {
                        Ok(resp) if resp.status().is_success() => return Ok(()),
                        Ok(resp) => {
                            last_err = format!("space returned {}", resp.status());
                        }
                        Err(e) => last_err = e.to_string(),
                    }
                    warn!("shape space connect attempt {} failed: {}", attempt + 1, last_err);
                }
                Err(GenError::Upstream(format!(
                    "could not reach the shape-generation space: {last_err}"
                )))
            })
            .await
            .map(|_| ())
    }

    /// Push one image to the space, returning the server-side path.
    async fn upload(&self, image: &ImageUpload) -> Result<String, GenError> {
        let part = reqwest::multipart::Part::bytes(image.bytes.clone())
            .file_name(image.filename.clone());
        let form = reqwest::multipart::Form::new().part("files", part);

        let resp = self
            .request(
                self.http
                    .post(format!("{}/gradio_api/upload", self.base_url)),
            )
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GenError::Upstream(format!("image upload returned {status}")));
        }

        let paths: Vec<String> = resp.json().await?;
        paths
            .into_iter()
            .next()
            .ok_or_else(|| GenError::Upstream("image upload returned no path".into()))
    }

    /// Run shape generation and return the model URL, if the space
    /// produced one.
    pub async fn generate(
        &self,
        image: ImageUpload,
        views: MultiviewImages,
        params: &ShapeParams,
    ) -> Result<Option<String>, GenError> {
        self.ensure_ready().await?;

        let main_path = self.upload(&image).await?;
        let mut view_paths = Vec::with_capacity(4);
        for view in [&views.front, &views.back, &views.left, &views.right] {
            let path = match view {
                Some(img) => self.upload(img).await?,
                None => main_path.clone(),
            };
            view_paths.push(path);
        }

        let data = json!([
            params.caption,
            file_data(&main_path),
            file_data(&view_paths[0]),
            file_data(&view_paths[1]),
            file_data(&view_paths[2]),
            file_data(&view_paths[3]),
            params.steps,
            params.guidance_scale,
            params.seed,
            params.octree_resolution,
            params.check_box_rembg,
            params.num_chunks,
            params.randomize_seed,
        ]);

        let resp = self
            .request(
                self.http
                    .post(format!("{}/gradio_api/call/shape_generation", self.base_url)),
            )
            .json(&json!({ "data": data }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenError::Upstream(format!(
                "shape generation returned {status}: {body}"
            )));
        }

        let call: Value = resp.json().await?;
        let event_id = call
            .get("event_id")
            .and_then(Value::as_str)
            .ok_or_else(|| GenError::Upstream("shape generation returned no event id".into()))?;

        let resp = self
            .request(self.http.get(format!(
                "{}/gradio_api/call/shape_generation/{}",
                self.base_url, event_id
            )))
            .send()
            .await?;
        let body = resp.text().await?;

        let result = parse_event_stream(&body)
            .ok_or_else(|| GenError::Upstream("shape generation produced no result".into()))?;
        debug!("shape generation result: {}", result);

        Ok(extract_model_url(&result, &self.base_url))
    }
}

fn file_data(path: &str) -> Value {
    json!({ "path": path, "meta": { "_type": "gradio.FileData" } })
}

/// The result endpoint answers with a server-sent-event body; the payload
/// is the last `data:` line.
fn parse_event_stream(body: &str) -> Option<Value> {
    let mut result = None;
    for line in body.lines() {
        if let Some(payload) = line.strip_prefix("data:") {
            if let Ok(value) = serde_json::from_str(payload.trim()) {
                result = Some(value);
            }
        }
    }
    result
}

/// Unwrap the space's result shape into a model URL: the first element of
/// a result list, possibly `{__type__, value}` or `{value}` wrapped, with
/// relative gradio paths rewritten to absolute space URLs.
fn extract_model_url(result: &Value, base_url: &str) -> Option<String> {
    let first = match result.as_array() {
        Some(items) => items.first()?,
        None => result,
    };

    let inner = match first.as_object() {
        Some(obj) => obj.get("value").unwrap_or(first),
        None => first,
    };

    let url = match inner {
        Value::String(s) => s.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };

    if let Some(path) = url.strip_prefix("/tmp/gradio/") {
        return Some(format!("{}/file=/tmp/gradio/{}", base_url, path));
    }
    Some(url)
}
