pub mod application;
pub mod document;
pub mod error;
pub mod id;
pub mod kind;
pub mod operation;
pub mod resource;
pub mod specification;

pub use application::{
    Application, ApplicationPage, ApplicationTemplate, FetchSubject, GLOBAL_REGISTRY_ID, PageInfo,
    Webhook, WebhookOwner, WebhookType,
};
pub use document::{
    AccessStrategy, ApiInput, BundleInput, ConsumptionBundleReference, DescribedSystemInstance,
    Document, DocumentEntry, Documents, EventInput, OrdIdentified, PackageInput, ProductInput,
    ResourceDefinition, TombstoneInput, VendorInput, WellKnownConfig,
};
pub use error::{CoreError, Result};
pub use id::generate_id;
pub use kind::{DefinitionKind, ResourceKind};
pub use operation::{Operation, OperationData, OperationStatus, OperationType};
pub use resource::{Api, Bundle, BundleReference, Event, Package, Product, Tombstone, Vendor};
pub use specification::{FetchCondition, FetchRequest, FetchRequestStatus, Specification};
