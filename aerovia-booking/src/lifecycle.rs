use std::sync::Arc;

use uuid::Uuid;

use aerovia_core::{CoreError, CoreResult, Principal, Role};

use crate::models::{
    BookingStats, ReservationDetail, ReservationFilter, ReservationState, ReservationSummary,
};
use crate::store::ReservationStore;

/// Reservation lifecycle scoped by actor: detail retrieval, the
/// cancellation transition and the admin-only reporting projections.
pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
}

impl ReservationService {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    /// A customer may only fetch their own reservation; agencies and
    /// admins may fetch any.
    pub async fn detail(&self, principal: &Principal, id: Uuid) -> CoreResult<ReservationDetail> {
        let detail = self
            .store
            .get_detail(id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Reserva no encontrada.".to_string()))?;

        if !principal.can_read_any_reservation()
            && detail.reservation.owner_user_id != principal.subject_id
        {
            return Err(CoreError::Forbidden("No autorizado.".to_string()));
        }
        Ok(detail)
    }

    pub async fn list_mine(&self, principal: &Principal) -> CoreResult<Vec<ReservationSummary>> {
        self.store.list_by_user(principal.subject_id).await
    }

    /// Eligible source states are Pending and Confirmed; cancelling a
    /// cancelled reservation is a `Conflict`. Non-admins may only cancel
    /// their own reservation; an admin may cancel anyone's, but never
    /// bypasses the state check.
    pub async fn cancel(
        &self,
        principal: &Principal,
        id: Uuid,
        forced_by_admin: bool,
    ) -> CoreResult<ReservationState> {
        let detail = self
            .store
            .get_detail(id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Reserva no encontrada.".to_string()))?;

        let acting_as_admin = forced_by_admin && principal.role == Role::Admin;
        if !acting_as_admin && detail.reservation.owner_user_id != principal.subject_id {
            return Err(CoreError::Forbidden(
                "No autorizado para cancelar esta reserva.".to_string(),
            ));
        }

        self.store.cancel(id).await
    }

    pub async fn admin_list(
        &self,
        principal: &Principal,
        filter: &ReservationFilter,
    ) -> CoreResult<Vec<ReservationSummary>> {
        principal.require_admin()?;
        self.store.list_filtered(filter).await
    }

    pub async fn admin_detail(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> CoreResult<ReservationDetail> {
        principal.require_admin()?;
        self.store
            .get_detail(id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Reserva no encontrada.".to_string()))
    }

    pub async fn stats(&self, principal: &Principal) -> CoreResult<BookingStats> {
        principal.require_admin()?;
        self.store.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgencyReservationLink, Reservation};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FixtureStore {
        reservations: Mutex<HashMap<Uuid, ReservationDetail>>,
    }

    impl FixtureStore {
        fn with(details: Vec<ReservationDetail>) -> Arc<Self> {
            Arc::new(Self {
                reservations: Mutex::new(
                    details
                        .into_iter()
                        .map(|d| (d.reservation.id, d))
                        .collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl ReservationStore for FixtureStore {
        async fn checkout(
            &self,
            _cart_owner_id: Uuid,
            _reservation_owner_id: Uuid,
        ) -> CoreResult<Reservation> {
            unreachable!("not exercised here")
        }

        async fn get_detail(&self, id: Uuid) -> CoreResult<Option<ReservationDetail>> {
            Ok(self.reservations.lock().unwrap().get(&id).cloned())
        }

        async fn list_by_user(&self, user_id: Uuid) -> CoreResult<Vec<ReservationSummary>> {
            Ok(self
                .reservations
                .lock()
                .unwrap()
                .values()
                .filter(|d| d.reservation.owner_user_id == user_id)
                .map(|d| ReservationSummary {
                    id: d.reservation.id,
                    owner_user_id: d.reservation.owner_user_id,
                    buyer_email: d.buyer_email.clone(),
                    code: d.reservation.code.clone(),
                    state: d.reservation.state,
                    total_cents: d.reservation.total_cents,
                    created_at: d.reservation.created_at,
                })
                .collect())
        }

        async fn cancel(&self, id: Uuid) -> CoreResult<ReservationState> {
            let mut map = self.reservations.lock().unwrap();
            let detail = map
                .get_mut(&id)
                .ok_or_else(|| CoreError::NotFound("Reserva no encontrada.".to_string()))?;
            if !detail.reservation.state.is_cancellable() {
                return Err(CoreError::Conflict(
                    "La reserva no está en estado cancelable.".to_string(),
                ));
            }
            detail.reservation.state = ReservationState::Cancelled;
            Ok(ReservationState::Cancelled)
        }

        async fn record_agency_link(&self, _link: &AgencyReservationLink) -> CoreResult<()> {
            Ok(())
        }

        async fn list_filtered(
            &self,
            _filter: &ReservationFilter,
        ) -> CoreResult<Vec<ReservationSummary>> {
            Ok(vec![])
        }

        async fn stats(&self) -> CoreResult<BookingStats> {
            Ok(BookingStats {
                reservations_total: 0,
                reservations_pending: 0,
                reservations_confirmed: 0,
                reservations_cancelled: 0,
                revenue_cents: 0,
                flights_scheduled: 0,
                flights_cancelled: 0,
            })
        }
    }

    fn detail(owner: Uuid, state: ReservationState) -> ReservationDetail {
        ReservationDetail {
            reservation: Reservation {
                id: Uuid::new_v4(),
                owner_user_id: owner,
                code: "ABC123".to_string(),
                state,
                total_cents: 15000,
                created_at: Utc::now(),
                items: vec![],
            },
            buyer_name: "Cliente Prueba".to_string(),
            buyer_email: "cliente@example.com".to_string(),
        }
    }

    fn principal(role: Role) -> Principal {
        Principal {
            subject_id: Uuid::new_v4(),
            role,
            display_name: "Actor".to_string(),
            email: "actor@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn customer_cannot_read_foreign_reservation() {
        let d = detail(Uuid::new_v4(), ReservationState::Confirmed);
        let id = d.reservation.id;
        let svc = ReservationService::new(FixtureStore::with(vec![d]));
        let err = svc.detail(&principal(Role::Customer), id).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn agency_may_read_any_reservation() {
        let d = detail(Uuid::new_v4(), ReservationState::Confirmed);
        let id = d.reservation.id;
        let svc = ReservationService::new(FixtureStore::with(vec![d]));
        assert!(svc.detail(&principal(Role::TravelAgency), id).await.is_ok());
    }

    #[tokio::test]
    async fn cancelling_twice_is_a_conflict() {
        let owner = Uuid::new_v4();
        let d = detail(owner, ReservationState::Confirmed);
        let id = d.reservation.id;
        let svc = ReservationService::new(FixtureStore::with(vec![d]));
        let mut p = principal(Role::Customer);
        p.subject_id = owner;

        assert_eq!(
            svc.cancel(&p, id, false).await.unwrap(),
            ReservationState::Cancelled
        );
        let err = svc.cancel(&p, id, false).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn admin_override_still_honors_the_state_check() {
        let d = detail(Uuid::new_v4(), ReservationState::Cancelled);
        let id = d.reservation.id;
        let svc = ReservationService::new(FixtureStore::with(vec![d]));
        let err = svc
            .cancel(&principal(Role::Admin), id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn non_admin_cannot_cancel_foreign_reservation() {
        let d = detail(Uuid::new_v4(), ReservationState::Confirmed);
        let id = d.reservation.id;
        let svc = ReservationService::new(FixtureStore::with(vec![d]));
        let err = svc
            .cancel(&principal(Role::Customer), id, false)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn stats_requires_the_admin_role() {
        let svc = ReservationService::new(FixtureStore::with(vec![]));
        let err = svc.stats(&principal(Role::TravelAgency)).await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }
}
