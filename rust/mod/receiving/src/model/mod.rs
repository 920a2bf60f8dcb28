pub mod alert;
pub mod batch;
pub mod delivery_order;
pub mod draft;

pub use alert::Alert;
pub use batch::Batch;
pub use delivery_order::{DeliveryOrder, DeliveryStatus};
pub use draft::{DraftField, IntakeDraft, Prefill};
