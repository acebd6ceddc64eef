use async_trait::async_trait;
use uuid::Uuid;

use aerovia_core::CoreResult;

use crate::models::Cart;

/// Transactional data-access boundary for cart state. Every mutation,
/// including the optional paired-leg mirror, executes as a single
/// transaction: the paired insert/update/delete succeeds together with
/// the primary one or not at all.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get_cart(&self, user_id: Uuid) -> CoreResult<Cart>;

    /// Inserts a (flight, class) line or increments its quantity. The
    /// flight must exist and be in a bookable state. With `sync_paired`,
    /// the same class and quantity is applied to the paired flight.
    async fn add_or_increment(
        &self,
        user_id: Uuid,
        flight_id: Uuid,
        fare_class_id: i32,
        quantity: i32,
        sync_paired: bool,
    ) -> CoreResult<()>;

    /// Sets the quantity of an owned item. Items belonging to another
    /// user report `NotFound`, not `Forbidden`, so existence is not
    /// leaked. With `sync_paired`, the counterpart matched by
    /// (paired flight, same class) is updated too.
    async fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
        sync_paired: bool,
    ) -> CoreResult<()>;

    async fn remove_item(&self, user_id: Uuid, item_id: Uuid, sync_paired: bool)
        -> CoreResult<()>;
}
