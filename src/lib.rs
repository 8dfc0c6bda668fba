pub mod auth;
pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod scrape;
pub mod session;

// Re-export commonly used types for easier access in tests
pub use auth::Authenticator;
pub use client::{HttpSettings, SessionClient};
pub use config::ConfigManager;
pub use error::{Error, Result};
pub use session::{AuthSession, SessionStore};

pub use download::{
    DownloadOptions, NoProgress, Orchestrator, PlaylistResult, ProgressBoard, ProgressSink,
    SeriesSummary, TransferEvent, TransferManager, TransferOutcome, TransferPlan, TransferStatus,
    TransferTarget,
};
pub use scrape::{
    PageSource, PlaylistExpander, RedirectResolver, ResourceDescriptor, ResourceLocator,
    SeriesCatalogEntry, SeriesEnumerator,
};
