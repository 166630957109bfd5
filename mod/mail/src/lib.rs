//! Mail module — the correspondence ledger of the court office.
//!
//! # Resources
//!
//! - **IncomingMail** — received correspondence, stamped with a
//!   sequential agenda number at intake
//! - **OutgoingMail** — sent correspondence, stamped with a formal
//!   mail number carrying signatory and office codes
//! - **Disposition** — routing/approval task opened 1:1 with each
//!   incoming mail and handed down the office hierarchy
//!
//! Mail numbers come from persistent counters in the KV store. Every
//! ledger write is also offered to an optional remote mirror (see
//! [`mirror`]); the local store stays authoritative.
//!
//! # Usage
//!
//! ```ignore
//! use mail::{MailModule, mirror::MirrorHandle, service::MailConfig};
//!
//! let module = MailModule::new(
//!     sql,
//!     kv,
//!     directory,
//!     MirrorHandle::disabled(),
//!     MailConfig::default(),
//! )?;
//! let router = module.routes(); // Mount under /mail
//! ```

pub mod api;
pub mod mirror;
pub mod model;
pub mod service;

use std::sync::Arc;

use axum::Router;

use esurat_core::{Module, ServiceError, UserDirectory};
use esurat_kv::KVStore;
use esurat_sql::SQLStore;

use crate::mirror::MirrorHandle;
use crate::service::{MailConfig, MailService};

/// Mail module implementing the Module trait.
pub struct MailModule {
    service: Arc<MailService>,
}

impl MailModule {
    /// Create a new MailModule.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        kv: Arc<dyn KVStore>,
        directory: Arc<dyn UserDirectory>,
        mirror: MirrorHandle,
        config: MailConfig,
    ) -> Result<Self, ServiceError> {
        let service = MailService::new(sql, kv, directory, mirror, config)?;
        Ok(Self { service })
    }

    /// Get a reference to the underlying MailService.
    pub fn service(&self) -> &Arc<MailService> {
        &self.service
    }
}

impl Module for MailModule {
    fn name(&self) -> &str {
        "mail"
    }

    fn routes(&self) -> Router {
        api::build_router(self.service.clone())
    }
}
