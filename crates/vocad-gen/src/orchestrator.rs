use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use vocad_db::Database;
use vocad_speech::SpeechClient;

use crate::codegen::CodeGenerator;
use crate::prompts;
use crate::router::{self, TextRouter};
use crate::GenError;

/// Canned narration used whenever the router is unavailable or fails.
const FALLBACK_STATUS: &str = "Preparing your CAD model; generating now.";
const FALLBACK_SUMMARY: &str = "Your 3D model has been generated successfully.";

/// Drives the two-stage generation pipeline: the router turns a user
/// request into a refined code-generation instruction, the code model
/// executes it, and the result is persisted per user.
pub struct Orchestrator {
    router: Option<Arc<dyn TextRouter>>,
    codegen: Option<Arc<dyn CodeGenerator>>,
    speech: Option<Arc<SpeechClient>>,
    db: Arc<Database>,
}

impl Orchestrator {
    pub fn new(
        router: Option<Arc<dyn TextRouter>>,
        codegen: Option<Arc<dyn CodeGenerator>>,
        speech: Option<Arc<SpeechClient>>,
        db: Arc<Database>,
    ) -> Self {
        Self {
            router,
            codegen,
            speech,
            db,
        }
    }

    fn router(&self) -> Result<&Arc<dyn TextRouter>, GenError> {
        self.router
            .as_ref()
            .ok_or(GenError::NotConfigured("DEDALUS_API_KEY"))
    }

    fn codegen(&self) -> Result<&Arc<dyn CodeGenerator>, GenError> {
        self.codegen
            .as_ref()
            .ok_or(GenError::NotConfigured("ANTHROPIC_API_KEY"))
    }

    /// Produce a new model from a text prompt. Returns the assigned model
    /// id and the generated code; a pipeline that yields no code is not an
    /// error here — the caller gets `None` (unlike `iterate`).
    pub async fn generate(
        &self,
        prompt: &str,
        user_id: Option<&str>,
        model_id: Option<String>,
    ) -> Result<(String, Option<String>), GenError> {
        if prompt.trim().is_empty() {
            return Err(GenError::InvalidArgument("generate requires a prompt"));
        }
        let router = self.router()?;
        let codegen = self.codegen()?;

        let mid = model_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let routed = router
            .run(
                &prompts::generation_instruction(prompt),
                router::GENERATE_MODELS,
                router::SEARCH_SERVERS,
            )
            .await?;

        // The routed output is "confirmation <sep> specification"; only the
        // specification goes to the code model.
        let instruction = routed
            .rsplit(prompts::SPEC_SEPARATOR)
            .next()
            .unwrap_or(&routed)
            .trim();

        let raw = codegen.generate(instruction).await?;
        let stripped = strip_markdown_fences(&raw);
        let scad_code = if stripped.is_empty() {
            None
        } else {
            Some(stripped)
        };

        if let (Some(uid), Some(code)) = (user_id, scad_code.as_deref()) {
            // Persistence is best-effort: the caller still gets the result.
            let db = self.db.clone();
            let (id, uid, name, code) = (
                mid.clone(),
                uid.to_string(),
                prompt.to_string(),
                code.to_string(),
            );
            let insert = tokio::task::spawn_blocking(move || {
                db.insert_model(&id, &uid, &name, Some(&code), None)
            })
            .await;
            match insert {
                Ok(Ok(())) => info!("persisted model {}", mid),
                Ok(Err(e)) => warn!("model insert failed: {}", e),
                Err(e) => warn!("model insert join error: {}", e),
            }
        }

        Ok((mid, scad_code))
    }

    /// Revise an existing model with new feedback. All three arguments are
    /// required, the model must exist for this owner, and a pipeline that
    /// yields no code is a hard failure.
    pub async fn iterate(
        &self,
        prompt: &str,
        user_id: &str,
        model_id: &str,
    ) -> Result<String, GenError> {
        if prompt.trim().is_empty() || user_id.is_empty() || model_id.is_empty() {
            return Err(GenError::InvalidArgument(
                "iterate requires prompt, userid, and modelid",
            ));
        }
        let router = self.router()?;
        let codegen = self.codegen()?;

        let db = self.db.clone();
        let (id, uid) = (model_id.to_string(), user_id.to_string());
        let row = tokio::task::spawn_blocking(move || db.get_model(&id, &uid))
            .await
            .map_err(|e| GenError::Db(e.to_string()))?
            .map_err(|e| GenError::Db(e.to_string()))?
            .ok_or(GenError::NotFound)?;
        let old_scad = row.scad_code.unwrap_or_default();

        let instruction = router
            .run(
                &prompts::revision_instruction(prompt, &old_scad),
                router::ITERATE_MODELS,
                router::ITERATE_SERVERS,
            )
            .await?;

        let raw = codegen.generate(instruction.trim()).await?;
        let scad_code = strip_markdown_fences(&raw);
        if scad_code.is_empty() {
            return Err(GenError::GenerationFailed);
        }

        // The update is the primary write of this operation; unlike the
        // generate path its failure surfaces to the caller.
        let db = self.db.clone();
        let (id, uid, code, name) = (
            model_id.to_string(),
            user_id.to_string(),
            scad_code.clone(),
            prompt.to_string(),
        );
        let matched = tokio::task::spawn_blocking(move || {
            db.update_model_code(&id, &uid, &code, &name)
        })
        .await
        .map_err(|e| GenError::Db(e.to_string()))?
        .map_err(|e| GenError::Db(e.to_string()))?;
        if !matched {
            return Err(GenError::NotFound);
        }

        info!("iterated model {}", model_id);
        Ok(scad_code)
    }

    /// One-sentence "working on it" narration plus optional speech. Never
    /// fails: router errors fall back to a canned sentence, TTS errors
    /// yield no audio.
    pub async fn status_narration(&self, context: &str) -> (String, Option<Vec<u8>>) {
        let sentence = self.narration_sentence(context).await;

        let audio = match &self.speech {
            Some(speech) if !sentence.is_empty() => match speech.synthesize(&sentence).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("status TTS failed: {}", e);
                    None
                }
            },
            _ => None,
        };

        (sentence, audio)
    }

    /// The narration sentence alone, for callers that manage speech
    /// synthesis themselves.
    pub async fn narration_sentence(&self, context: &str) -> String {
        match &self.router {
            Some(router) => match router
                .run(
                    &prompts::status_prompt(context),
                    router::NARRATION_MODELS,
                    router::SEARCH_SERVERS,
                )
                .await
            {
                Ok(out) if !out.trim().is_empty() => out.trim().to_string(),
                Ok(_) => FALLBACK_STATUS.to_string(),
                Err(e) => {
                    warn!("status narration failed: {}", e);
                    FALLBACK_STATUS.to_string()
                }
            },
            None => FALLBACK_STATUS.to_string(),
        }
    }

    /// Short spoken-style description of generated code, with the same
    /// fall-back discipline as narration.
    pub async fn model_summary(&self, scad_code: &str, user_prompt: Option<&str>) -> String {
        match &self.router {
            Some(router) => match router
                .run(
                    &prompts::summary_prompt(scad_code, user_prompt),
                    router::SUMMARY_MODELS,
                    &[],
                )
                .await
            {
                Ok(out) if !out.trim().is_empty() => {
                    out.trim().trim_matches(['"', '\'']).to_string()
                }
                Ok(_) => FALLBACK_SUMMARY.to_string(),
                Err(e) => {
                    warn!("summary generation failed: {}", e);
                    FALLBACK_SUMMARY.to_string()
                }
            },
            None => FALLBACK_SUMMARY.to_string(),
        }
    }
}

/// Remove a markdown code fence wrapping the model output. Line-based and
/// deliberately tolerant: the first line is dropped if it starts with
/// three backticks (any language tag), the last if it is exactly three
/// backticks, whether or not they pair.
pub fn strip_markdown_fences(code: &str) -> String {
    let code = code.trim();
    let mut lines: Vec<&str> = code.lines().collect();

    if lines
        .first()
        .is_some_and(|line| line.trim_start().starts_with("```"))
    {
        lines.remove(0);
    }
    if lines.last().is_some_and(|line| line.trim() == "```") {
        lines.pop();
    }

    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubRouter {
        called: AtomicBool,
    }

    impl StubRouter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                called: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl TextRouter for StubRouter {
        async fn run(
            &self,
            input: &str,
            _models: &[&str],
            _mcp_servers: &[&str],
        ) -> Result<String, GenError> {
            self.called.store(true, Ordering::SeqCst);
            Ok(format!(
                "Generated the specification.{}refined: {}",
                prompts::SPEC_SEPARATOR,
                &input[..input.len().min(40)]
            ))
        }
    }

    struct StubCodeGen {
        output: String,
        called: AtomicBool,
    }

    impl StubCodeGen {
        fn new(output: &str) -> Arc<Self> {
            Arc::new(Self {
                output: output.to_string(),
                called: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl CodeGenerator for StubCodeGen {
        async fn generate(&self, _prompt: &str) -> Result<String, GenError> {
            self.called.store(true, Ordering::SeqCst);
            Ok(self.output.clone())
        }
    }

    fn orchestrator(
        router: Arc<StubRouter>,
        codegen: Arc<StubCodeGen>,
        db: Arc<Database>,
    ) -> Orchestrator {
        Orchestrator::new(
            Some(router as Arc<dyn TextRouter>),
            Some(codegen as Arc<dyn CodeGenerator>),
            None,
            db,
        )
    }

    // -- fence stripping --

    #[test]
    fn strips_fences_with_language_tag() {
        let input = "```openscad\ncube(1);\n```";
        assert_eq!(strip_markdown_fences(input), "cube(1);");
    }

    #[test]
    fn strips_bare_fences() {
        let input = "```\ncylinder(h=4, r=2);\n```";
        assert_eq!(strip_markdown_fences(input), "cylinder(h=4, r=2);");
    }

    #[test]
    fn unfenced_input_is_unchanged() {
        let input = "cube(1);\ncylinder(h=4, r=2);";
        assert_eq!(strip_markdown_fences(input), input);
    }

    #[test]
    fn stripping_is_idempotent() {
        let once = strip_markdown_fences("```scad\ncube(1);\n```");
        assert_eq!(strip_markdown_fences(&once), once);
    }

    #[test]
    fn unpaired_fences_are_still_dropped() {
        assert_eq!(strip_markdown_fences("```openscad\ncube(1);"), "cube(1);");
        assert_eq!(strip_markdown_fences("cube(1);\n```"), "cube(1);");
    }

    #[test]
    fn interior_fences_are_preserved() {
        let input = "cube(1);\n```\ncylinder(1);";
        assert_eq!(strip_markdown_fences(input), input);
    }

    // -- generate --

    #[tokio::test]
    async fn generate_produces_model_and_persists() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let orch = orchestrator(
            StubRouter::new(),
            StubCodeGen::new("```openscad\ncylinder(h=10, r1=5, r2=0);\n```"),
            db.clone(),
        );

        let (model_id, scad) = orch
            .generate("make me a traffic cone", Some("u1"), None)
            .await
            .unwrap();

        assert_eq!(scad.as_deref(), Some("cylinder(h=10, r1=5, r2=0);"));

        let row = db.get_model(&model_id, "u1").unwrap().unwrap();
        assert_eq!(row.name, "make me a traffic cone");
        assert_eq!(row.scad_code.as_deref(), Some("cylinder(h=10, r1=5, r2=0);"));
    }

    #[tokio::test]
    async fn generate_without_user_skips_persistence() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let orch = orchestrator(StubRouter::new(), StubCodeGen::new("cube(1);"), db.clone());

        let (model_id, scad) = orch.generate("a mug", None, None).await.unwrap();
        assert_eq!(scad.as_deref(), Some("cube(1);"));
        assert!(db.get_model(&model_id, "").unwrap().is_none());
    }

    #[tokio::test]
    async fn generate_with_empty_output_yields_none() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let orch = orchestrator(StubRouter::new(), StubCodeGen::new("```\n```"), db.clone());

        let (model_id, scad) = orch.generate("a mug", Some("u1"), None).await.unwrap();
        assert!(scad.is_none());
        // No code, no insert
        assert!(db.get_model(&model_id, "u1").unwrap().is_none());
    }

    #[tokio::test]
    async fn generate_honors_caller_supplied_id() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let orch = orchestrator(StubRouter::new(), StubCodeGen::new("cube(1);"), db.clone());

        let (model_id, _) = orch
            .generate("a mug", Some("u1"), Some("fixed-id".into()))
            .await
            .unwrap();
        assert_eq!(model_id, "fixed-id");
        assert!(db.get_model("fixed-id", "u1").unwrap().is_some());
    }

    // -- iterate --

    #[tokio::test]
    async fn iterate_revises_and_persists() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.insert_model("m1", "u1", "a mug", Some("cube(1);"), None)
            .unwrap();

        let orch = orchestrator(
            StubRouter::new(),
            StubCodeGen::new("```openscad\ncube(2);\n```"),
            db.clone(),
        );

        let scad = orch
            .iterate("make the handle thicker", "u1", "m1")
            .await
            .unwrap();
        assert_eq!(scad, "cube(2);");

        let row = db.get_model("m1", "u1").unwrap().unwrap();
        assert_eq!(row.scad_code.as_deref(), Some("cube(2);"));
        assert_eq!(row.name, "make the handle thicker");
    }

    #[tokio::test]
    async fn iterate_rejects_missing_arguments_before_any_call() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let router = StubRouter::new();
        let codegen = StubCodeGen::new("cube(1);");
        let orch = orchestrator(router.clone(), codegen.clone(), db);

        for (prompt, uid, mid) in [("", "u1", "m1"), ("fix it", "", "m1"), ("fix it", "u1", "")] {
            let err = orch.iterate(prompt, uid, mid).await.unwrap_err();
            assert!(matches!(err, GenError::InvalidArgument(_)), "{:?}", err);
        }

        assert!(!router.called.load(Ordering::SeqCst));
        assert!(!codegen.called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn iterate_unknown_model_is_not_found_and_writes_nothing() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.insert_model("m1", "u1", "a mug", Some("cube(1);"), None)
            .unwrap();

        let codegen = StubCodeGen::new("cube(2);");
        let orch = orchestrator(StubRouter::new(), codegen.clone(), db.clone());

        // Right id, wrong owner
        let err = orch.iterate("fix it", "u2", "m1").await.unwrap_err();
        assert!(matches!(err, GenError::NotFound));
        assert!(!codegen.called.load(Ordering::SeqCst));

        let row = db.get_model("m1", "u1").unwrap().unwrap();
        assert_eq!(row.scad_code.as_deref(), Some("cube(1);"));
    }

    #[tokio::test]
    async fn iterate_with_empty_output_is_generation_failed() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.insert_model("m1", "u1", "a mug", Some("cube(1);"), None)
            .unwrap();

        let orch = orchestrator(StubRouter::new(), StubCodeGen::new(""), db.clone());

        let err = orch.iterate("fix it", "u1", "m1").await.unwrap_err();
        assert!(matches!(err, GenError::GenerationFailed));

        let row = db.get_model("m1", "u1").unwrap().unwrap();
        assert_eq!(row.scad_code.as_deref(), Some("cube(1);"));
    }

    // -- narration --

    #[tokio::test]
    async fn narration_falls_back_without_router() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let orch = Orchestrator::new(None, None, None, db);

        let (sentence, audio) = orch.status_narration("make me a traffic cone").await;
        assert_eq!(sentence, FALLBACK_STATUS);
        assert!(audio.is_none());
    }

    #[tokio::test]
    async fn unconfigured_pipeline_reports_missing_credential() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let orch = Orchestrator::new(None, None, None, db);

        let err = orch.generate("a mug", None, None).await.unwrap_err();
        assert!(matches!(err, GenError::NotConfigured(_)));
    }
}
