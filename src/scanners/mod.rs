//! Built-in scanners.

mod express;
mod flask;
mod go_router;
mod gomod;
mod java;
mod jpa;
mod kafka;
mod maven;
mod npm;
mod pip;
mod spring_rest;
mod sql_migration;
mod support;

pub use express::ExpressScanner;
pub use flask::FlaskScanner;
pub use go_router::GoRouterScanner;
pub use gomod::GoModScanner;
pub use jpa::JpaScanner;
pub use kafka::KafkaScanner;
pub use maven::MavenScanner;
pub use npm::{NpmScanner, INCLUDE_DEV_SETTING as NPM_INCLUDE_DEV_SETTING};
pub use pip::PipScanner;
pub use spring_rest::SpringRestScanner;
pub use sql_migration::SqlMigrationScanner;

use std::sync::Arc;

use crate::scanner::Scanner;

/// One instance of every built-in scanner.
pub fn builtin() -> Vec<Arc<dyn Scanner>> {
    vec![
        Arc::new(MavenScanner),
        Arc::new(NpmScanner),
        Arc::new(PipScanner),
        Arc::new(GoModScanner),
        Arc::new(FlaskScanner::new()),
        Arc::new(SpringRestScanner::new()),
        Arc::new(ExpressScanner::new()),
        Arc::new(GoRouterScanner::new()),
        Arc::new(JpaScanner::new()),
        Arc::new(SqlMigrationScanner),
        Arc::new(KafkaScanner),
    ]
}
