//! External dependency ports and their in-memory test doubles.

pub mod inventory;
pub mod notification;
pub mod payment;

pub use inventory::{
    AvailabilityResult, AvailabilityStatus, InMemoryInventoryService, InventoryService,
    Reservation,
};
pub use notification::{InMemoryNotificationService, NotificationResult, NotificationService};
pub use payment::{InMemoryPaymentService, PaymentResult, PaymentService, RefundResult};
