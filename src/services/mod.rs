pub mod archive;
pub mod azcaptcha;
pub mod challenge_solver;
pub mod checkpoint_store;
pub mod download_tracker;
pub mod quarantine_registry;

pub use archive::Archive;
pub use azcaptcha::AzCaptchaSolver;
pub use challenge_solver::{ArtifactKind, ChallengeArtifact, ChallengeSolver, PageTextSolver};
pub use checkpoint_store::CheckpointStore;
pub use download_tracker::{DownloadStatus, DownloadTracker};
pub use quarantine_registry::{QuarantineRecord, QuarantineRegistry};
