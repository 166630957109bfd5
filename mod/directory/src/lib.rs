//! Directory module — accounts, office hierarchy, login sessions.
//!
//! # Resources
//!
//! - **User** — account with a role, optional signatory code, and a
//!   position in the office tree (parent reference + derived ancestry
//!   path)
//! - **Session** — JWT issuance record; logout revokes
//!
//! The service seeds the default court hierarchy on first run and
//! implements [`esurat_core::UserDirectory`], which is how the mail
//! module resolves recipients without depending on this crate.
//!
//! # Usage
//!
//! ```ignore
//! use directory::{DirectoryModule, service::DirectoryConfig};
//!
//! let module = DirectoryModule::new(sql, DirectoryConfig::default())?;
//! let router = module.routes(); // Mount under /directory
//! ```

pub mod api;
pub mod model;
pub mod service;

use std::sync::Arc;

use axum::Router;

use esurat_core::Module;
use esurat_sql::SQLStore;

use crate::service::{DirectoryConfig, DirectoryService};

/// Directory module implementing the Module trait.
pub struct DirectoryModule {
    service: Arc<DirectoryService>,
}

impl DirectoryModule {
    /// Create a new DirectoryModule.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        config: DirectoryConfig,
    ) -> Result<Self, esurat_core::ServiceError> {
        let service = DirectoryService::new(sql, config)?;
        Ok(Self { service })
    }

    /// Get a reference to the underlying DirectoryService.
    pub fn service(&self) -> &Arc<DirectoryService> {
        &self.service
    }
}

impl Module for DirectoryModule {
    fn name(&self) -> &str {
        "directory"
    }

    fn routes(&self) -> Router {
        api::build_router(self.service.clone())
    }
}
