use std::sync::Arc;

use vocad_db::Database;
use vocad_gen::jobs::JobTracker;
use vocad_gen::orchestrator::Orchestrator;
use vocad_gen::shape::ShapeClient;
use vocad_speech::SpeechClient;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    /// `None` when no speech credential is configured; the speech endpoints
    /// then answer 501 instead of failing per call.
    pub speech: Option<Arc<SpeechClient>>,
    pub orchestrator: Arc<Orchestrator>,
    pub jobs: JobTracker,
    pub shape: Arc<ShapeClient>,
    /// Include error traces in responses.
    pub debug: bool,
}
