use std::sync::Arc;

use uuid::Uuid;

use aerovia_core::{CoreError, CoreResult};

use crate::models::Cart;
use crate::store::CartStore;

/// Input policy in front of the cart store: quantity coercion on add,
/// strict quantity validation on update. Ownership and pairing live in
/// the store, where they can be enforced transactionally.
pub struct CartService {
    store: Arc<dyn CartStore>,
}

impl CartService {
    pub fn new(store: Arc<dyn CartStore>) -> Self {
        Self { store }
    }

    pub async fn get_cart(&self, user_id: Uuid) -> CoreResult<Cart> {
        self.store.get_cart(user_id).await
    }

    /// Quantities <= 0 are coerced to 1, never stored as 0 or negative.
    pub async fn add_or_increment(
        &self,
        user_id: Uuid,
        flight_id: Uuid,
        fare_class_id: i32,
        quantity: i32,
        sync_paired: bool,
    ) -> CoreResult<()> {
        let quantity = if quantity <= 0 { 1 } else { quantity };
        self.store
            .add_or_increment(user_id, flight_id, fare_class_id, quantity, sync_paired)
            .await
    }

    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
        sync_paired: bool,
    ) -> CoreResult<()> {
        if quantity < 1 {
            return Err(CoreError::Validation(
                "La cantidad debe ser al menos 1.".to_string(),
            ));
        }
        self.store
            .update_quantity(user_id, item_id, quantity, sync_paired)
            .await
    }

    pub async fn remove_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        sync_paired: bool,
    ) -> CoreResult<()> {
        self.store.remove_item(user_id, item_id, sync_paired).await
    }
}
