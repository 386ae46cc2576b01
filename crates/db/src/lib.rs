pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod services;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{seed_demo_dataset, SeedResult};
pub use services::{
    BulkSetItems, ConversionOutcome, ConversionService, DraftService, LedgerService, QuoteService,
    ServiceError, TransitionRequest, VersioningService, WorkflowService,
};
