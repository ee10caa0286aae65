//! Order domain for the order-processing saga.
//!
//! This crate provides the order record the saga drives:
//! - Value objects (`UserId`, `ProductId`, `Money`, `OrderItem`)
//! - The `Order` record with its `OrderStatus` state machine
//! - The `OrderRepository` port the orchestrator depends on

pub mod error;
pub mod order;
pub mod repository;
pub mod value_objects;

pub use error::DomainError;
pub use order::{Order, OrderStatus};
pub use repository::{InMemoryOrderRepository, OrderRepository};
pub use value_objects::{Money, OrderItem, ProductId, UserId};
