pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod gates;
pub mod orchestrator;
pub mod project;
pub mod resolver;
pub mod store;
pub mod transforms;
pub mod ui;

pub use config::HubConfig;
pub use document::{Document, DocumentRef, Location, WriteErrorCode, WritePermission};
pub use error::{DocumentError, OpenError};
pub use orchestrator::{Collaborators, OpenOutcome, ProjectHub, SaveOutcome};
pub use project::{Project, ProjectModel, SharedProject};
