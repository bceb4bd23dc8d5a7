pub mod error;
pub mod extract;
pub mod health;
pub mod iterate;
pub mod jobs;
pub mod narration;
pub mod shape;
pub mod state;
pub mod transcribe;
