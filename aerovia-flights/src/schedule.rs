use std::sync::Arc;

use uuid::Uuid;

use aerovia_core::{CoreError, CoreResult, Principal};

use crate::models::{Flight, FlightSpec, ScheduleUpdate};
use crate::notify::FlightNotifier;
use crate::store::FlightStore;

/// Flight schedule state machine: creation, itinerary edits, the
/// terminal Scheduled -> Cancelled transition and round-trip pairing.
/// Validation and authorization run before any write; the notification
/// fan-out is triggered after the write and never affects its outcome.
pub struct ScheduleService {
    store: Arc<dyn FlightStore>,
    notifier: FlightNotifier,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn FlightStore>, notifier: FlightNotifier) -> Self {
        Self { store, notifier }
    }

    pub async fn list(&self) -> CoreResult<Vec<Flight>> {
        self.store.list().await
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Flight> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Vuelo no encontrado".to_string()))
    }

    pub async fn create_flight(&self, principal: &Principal, spec: &FlightSpec) -> CoreResult<Flight> {
        principal.require_admin()?;
        validate_itinerary(&spec.code, spec.depart_at, spec.arrive_at, spec.fare_classes.len())?;
        self.store.create(spec).await
    }

    pub async fn update_schedule(
        &self,
        principal: &Principal,
        id: Uuid,
        update: &ScheduleUpdate,
    ) -> CoreResult<Flight> {
        principal.require_admin()?;
        validate_itinerary(&update.code, update.depart_at, update.arrive_at, update.fare_classes.len())?;
        if update.change_reason.trim().is_empty() {
            return Err(CoreError::Validation(
                "motivoCambio es requerido para modificar".to_string(),
            ));
        }

        let flight = self.store.apply_schedule(id, update).await?;
        self.notifier
            .flight_updated(flight.clone(), update.change_reason.clone());
        Ok(flight)
    }

    pub async fn cancel_flight(
        &self,
        principal: &Principal,
        id: Uuid,
        reason: &str,
    ) -> CoreResult<Flight> {
        principal.require_admin()?;
        if reason.trim().is_empty() {
            return Err(CoreError::Validation(
                "motivo es requerido para cancelar".to_string(),
            ));
        }

        let flight = self.store.set_cancelled(id).await?;
        self.notifier
            .flight_cancelled(flight.clone(), reason.to_string());
        Ok(flight)
    }

    pub async fn link_round_trip(
        &self,
        principal: &Principal,
        outbound_id: Uuid,
        return_id: Uuid,
    ) -> CoreResult<()> {
        principal.require_admin()?;
        if outbound_id == return_id {
            return Err(CoreError::Validation(
                "Un vuelo no puede ser pareja de sí mismo".to_string(),
            ));
        }
        self.store.link_pair(outbound_id, return_id).await
    }

    pub async fn unlink(&self, principal: &Principal, id: Uuid) -> CoreResult<()> {
        principal.require_admin()?;
        self.store.unlink_pair(id).await
    }

    /// Creates both legs and links them. When both creations succeed but
    /// the linking fails, the created ids are reported so the operator
    /// can retry the link; the flights are never silently orphaned.
    pub async fn create_round_trip(
        &self,
        principal: &Principal,
        outbound: &FlightSpec,
        ret: &FlightSpec,
    ) -> CoreResult<(Flight, Flight)> {
        principal.require_admin()?;
        validate_itinerary(&outbound.code, outbound.depart_at, outbound.arrive_at, outbound.fare_classes.len())?;
        validate_itinerary(&ret.code, ret.depart_at, ret.arrive_at, ret.fare_classes.len())?;

        let ida = self.store.create(outbound).await?;
        let regreso = self.store.create(ret).await?;

        if let Err(e) = self.store.link_pair(ida.id, regreso.id).await {
            return Err(CoreError::Internal(format!(
                "vuelos creados (ida {}, regreso {}) pero el enlace falló: {e}; reintente el enlace",
                ida.id, regreso.id
            )));
        }

        let ida = self.get(ida.id).await?;
        let regreso = self.get(regreso.id).await?;
        Ok((ida, regreso))
    }
}

fn validate_itinerary(
    code: &str,
    depart_at: chrono::DateTime<chrono::Utc>,
    arrive_at: chrono::DateTime<chrono::Utc>,
    class_count: usize,
) -> CoreResult<()> {
    if code.trim().is_empty() {
        return Err(CoreError::Validation("Código requerido".to_string()));
    }
    if depart_at >= arrive_at {
        return Err(CoreError::Validation(
            "La salida debe ser menor que la llegada".to_string(),
        ));
    }
    if class_count == 0 {
        return Err(CoreError::Validation(
            "Debe indicar al menos una clase".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn departures_must_precede_arrivals() {
        let now = Utc::now();
        let err = validate_itinerary("AV1", now + Duration::hours(2), now, 1).unwrap_err();
        assert_eq!(err.to_string(), "La salida debe ser menor que la llegada");
    }

    #[test]
    fn at_least_one_fare_class_is_required() {
        let now = Utc::now();
        let err = validate_itinerary("AV1", now, now + Duration::hours(2), 0).unwrap_err();
        assert_eq!(err.to_string(), "Debe indicar al menos una clase");
    }

    #[test]
    fn blank_code_is_rejected() {
        let now = Utc::now();
        let err = validate_itinerary("  ", now, now + Duration::hours(2), 1).unwrap_err();
        assert_eq!(err.to_string(), "Código requerido");
    }
}
