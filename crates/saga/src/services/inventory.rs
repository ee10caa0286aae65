//! Inventory service port and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::OrderId;
use domain::{OrderItem, ProductId};
use tokio::sync::RwLock;

use crate::error::{Result, SagaError};

/// Availability answer for a single product at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityStatus {
    /// Requested quantity can be fulfilled.
    InStock,
    /// Requested quantity cannot be fulfilled (definitive, not transient).
    OutOfStock,
}

/// Result of an availability check.
#[derive(Debug, Clone)]
pub struct AvailabilityResult {
    pub product_id: ProductId,
    pub status: AvailabilityStatus,
}

/// A stock reservation held against an order.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub reservation_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Port for the inventory dependency.
///
/// Out-of-stock is reported through [`AvailabilityStatus`] or
/// [`SagaError::OutOfStock`], never as a transient error: the distinction
/// is what the retry policy keys off.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Checks whether `quantity` units of a product are available.
    async fn check_availability(
        &self,
        product_id: &ProductId,
        quantity: u32,
        location: &str,
    ) -> Result<AvailabilityResult>;

    /// Reserves stock for every line item of an order.
    async fn reserve_stock(&self, order_id: OrderId, items: &[OrderItem]) -> Result<Reservation>;

    /// Releases a previously made reservation.
    ///
    /// Releasing an unknown or already-released reservation succeeds.
    async fn release_reservation(&self, reservation_id: &str, reason: &str) -> Result<()>;
}

/// In-memory inventory service for testing, with fault injection.
#[derive(Clone, Default)]
pub struct InMemoryInventoryService {
    /// Products that definitively report out-of-stock.
    out_of_stock: Arc<RwLock<HashSet<String>>>,
    /// Active reservations by ID.
    reservations: Arc<RwLock<HashMap<String, OrderId>>>,
    /// Released reservations, recorded as (reservation_id, reason).
    releases: Arc<RwLock<Vec<(String, String)>>>,
    /// Remaining calls that fail transiently before the service recovers.
    transient_failures: Arc<AtomicU32>,
    /// When set, every call fails transiently.
    fail_all: Arc<AtomicBool>,
    next_reservation: Arc<AtomicU64>,
}

impl InMemoryInventoryService {
    /// Creates a new in-memory inventory service with everything in stock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a product as definitively out of stock.
    pub async fn set_out_of_stock(&self, product_id: impl Into<String>) {
        self.out_of_stock.write().await.insert(product_id.into());
    }

    /// Makes the next `count` calls fail with a transient error.
    pub fn fail_transiently(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Makes every call fail transiently until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.fail_all.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the number of reservations currently held.
    pub async fn reservation_count(&self) -> usize {
        self.reservations.read().await.len()
    }

    /// Returns the recorded releases as (reservation_id, reason) pairs.
    pub async fn releases(&self) -> Vec<(String, String)> {
        self.releases.read().await.clone()
    }

    fn check_transient_failure(&self, call: &'static str) -> Result<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(SagaError::ServiceUnavailable {
                service: "inventory",
                reason: format!("{call}: injected outage"),
            });
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SagaError::ServiceUnavailable {
                service: "inventory",
                reason: format!("{call}: injected transient failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn check_availability(
        &self,
        product_id: &ProductId,
        _quantity: u32,
        _location: &str,
    ) -> Result<AvailabilityResult> {
        self.check_transient_failure("check_availability")?;

        let status = if self.out_of_stock.read().await.contains(product_id.as_str()) {
            AvailabilityStatus::OutOfStock
        } else {
            AvailabilityStatus::InStock
        };
        Ok(AvailabilityResult {
            product_id: product_id.clone(),
            status,
        })
    }

    async fn reserve_stock(&self, order_id: OrderId, items: &[OrderItem]) -> Result<Reservation> {
        self.check_transient_failure("reserve_stock")?;

        let out_of_stock = self.out_of_stock.read().await;
        for item in items {
            if out_of_stock.contains(item.product_id.as_str()) {
                return Err(SagaError::OutOfStock(item.product_id.to_string()));
            }
        }
        drop(out_of_stock);

        let reservation_id = format!(
            "RES-{:04}",
            self.next_reservation.fetch_add(1, Ordering::SeqCst) + 1
        );
        self.reservations
            .write()
            .await
            .insert(reservation_id.clone(), order_id);

        Ok(Reservation {
            reservation_id,
            expires_at: Utc::now() + Duration::minutes(15),
        })
    }

    async fn release_reservation(&self, reservation_id: &str, reason: &str) -> Result<()> {
        self.check_transient_failure("release_reservation")?;

        self.reservations.write().await.remove(reservation_id);
        self.releases
            .write()
            .await
            .push((reservation_id.to_string(), reason.to_string()));
        Ok(())
    }
}
