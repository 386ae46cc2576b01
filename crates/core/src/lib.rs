pub mod collab;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ledger;
pub mod policy;
pub mod pricing;
pub mod workflow;

pub use chrono;
pub use rust_decimal;

pub use collab::{
    BillingDefaults, CollaboratorError, CustomerDirectory, DocumentRenderer, DraftContext,
    DraftGenerator, DraftJobId, DraftOutcome, QueuedDraftGenerator, QuoteSnapshot, RenderJobId,
    StaticCustomerDirectory,
};
pub use domain::document::{QuoteDocument, QuoteDocumentId};
pub use domain::line_item::{ItemType, LineItem, LineItemDraft, LineItemId, SupplierId};
pub use domain::order::{
    CustomerOrder, CustomerOrderId, OrderStatus, PurchaseOrderId, PurchaseOrderStatus,
    SupplierPurchaseOrder,
};
pub use domain::quote::{
    ApprovalState, CustomerId, DraftState, Quote, QuoteId, QuoteStatus, QuoteTotals, TenantId,
    TierType,
};
pub use errors::EngineError;
pub use ledger::{materialize_items, ItemBounds};
pub use policy::{ReviewPolicy, ReviewTrigger};
pub use pricing::{billable_items, compute_totals, ExclusionReason, PricingBreakdown};
pub use workflow::log::{time_in_status, StatusDwell, WorkflowLogEntry};
pub use workflow::machine::{
    plan_transition, GuardContext, LifecycleStamp, TransitionPlan, WorkflowAction,
};
