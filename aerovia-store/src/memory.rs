//! In-memory backend. Backs the test suites and the no-database dev
//! mode; one `RwLock` write guard spans every mutation, which gives the
//! same all-or-nothing semantics the Postgres backend gets from a
//! transaction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use aerovia_booking::{
    new_reservation_code, AgencyReservationLink, BookingStats, Reservation, ReservationDetail,
    ReservationFilter, ReservationItem, ReservationState, ReservationStore, ReservationSummary,
};
use aerovia_cart::{Cart, CartItem, CartLine, CartStore};
use aerovia_core::{AccountStore, CoreError, CoreResult, Role, UserAccount};
use aerovia_flights::{Flight, FlightSpec, FlightStatus, FlightStore, Reservee, ScheduleUpdate};

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, UserAccount>,
    flights: HashMap<Uuid, Flight>,
    cart_items: HashMap<Uuid, CartItem>,
    reservations: HashMap<Uuid, Reservation>,
    agency_links: HashMap<Uuid, AgencyReservationLink>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seeds an account, overwriting any previous one with the same id.
    pub async fn seed_account(&self, account: UserAccount) {
        let mut inner = self.inner.write().await;
        inner.accounts.insert(account.id, account);
    }

    pub async fn seed_flight(&self, flight: Flight) {
        let mut inner = self.inner.write().await;
        inner.flights.insert(flight.id, flight);
    }
}

fn priced_line(
    inner: &Inner,
    flight_id: Uuid,
    fare_class_id: i32,
) -> CoreResult<(Uuid, i64)> {
    let flight = inner
        .flights
        .get(&flight_id)
        .ok_or_else(|| CoreError::NotFound("Vuelo no existe".to_string()))?;
    if !flight.status.is_bookable() {
        return Err(CoreError::Conflict(
            "Vuelo no disponible para compra".to_string(),
        ));
    }
    let class = flight.fare_class(fare_class_id).ok_or_else(|| {
        CoreError::Validation("Clase no disponible para esta salida".to_string())
    })?;
    Ok((flight.id, class.price_cents))
}

fn upsert_item(inner: &mut Inner, user_id: Uuid, flight_id: Uuid, class_id: i32, qty: i32, unit: i64) {
    let existing = inner
        .cart_items
        .values_mut()
        .find(|i| i.user_id == user_id && i.flight_id == flight_id && i.fare_class_id == class_id);
    match existing {
        Some(item) => item.quantity += qty,
        None => {
            let item = CartItem {
                id: Uuid::new_v4(),
                user_id,
                flight_id,
                fare_class_id: class_id,
                quantity: qty,
                unit_price_cents: unit,
            };
            inner.cart_items.insert(item.id, item);
        }
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> CoreResult<Option<UserAccount>> {
        let wanted = aerovia_core::normalize_email(email);
        let inner = self.inner.read().await;
        Ok(inner.accounts.values().find(|a| a.email == wanted).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<UserAccount>> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.get(&id).cloned())
    }

    async fn create_customer(
        &self,
        email: &str,
        first_names: &str,
        last_names: &str,
        password_hash: &str,
    ) -> CoreResult<UserAccount> {
        let mut inner = self.inner.write().await;
        if inner.accounts.values().any(|a| a.email == email) {
            return Err(CoreError::Conflict(
                "Ya existe un usuario con ese email".to_string(),
            ));
        }
        let account = UserAccount {
            id: Uuid::new_v4(),
            email: email.to_string(),
            first_names: first_names.to_string(),
            last_names: last_names.to_string(),
            password_hash: password_hash.to_string(),
            enabled: true,
            role: Role::Customer,
        };
        inner.accounts.insert(account.id, account.clone());
        Ok(account)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn get_cart(&self, user_id: Uuid) -> CoreResult<Cart> {
        let inner = self.inner.read().await;
        let mut lines: Vec<CartLine> = Vec::new();
        for item in inner.cart_items.values().filter(|i| i.user_id == user_id) {
            let Some(flight) = inner.flights.get(&item.flight_id) else {
                continue;
            };
            let class_name = flight
                .fare_class(item.fare_class_id)
                .map(|c| c.name.clone())
                .unwrap_or_default();
            lines.push(CartLine {
                item_id: item.id,
                flight_id: flight.id,
                flight_code: flight.code.clone(),
                fare_class_id: item.fare_class_id,
                class_name,
                depart_at: flight.depart_at,
                arrive_at: flight.arrive_at,
                origin: flight.route.origin_city.clone(),
                destination: flight.route.destination_city.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                subtotal_cents: item.subtotal_cents(),
            });
        }
        lines.sort_by_key(|l| l.depart_at);
        Ok(Cart::from_lines(user_id, lines))
    }

    async fn add_or_increment(
        &self,
        user_id: Uuid,
        flight_id: Uuid,
        fare_class_id: i32,
        quantity: i32,
        sync_paired: bool,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        // Resolve both legs before touching anything so a bad paired leg
        // leaves the primary untouched.
        let (primary_id, primary_price) = priced_line(&inner, flight_id, fare_class_id)?;
        let paired = if sync_paired {
            match inner.flights.get(&flight_id).and_then(|f| f.paired_flight_id) {
                Some(pid) => Some(priced_line(&inner, pid, fare_class_id)?),
                None => None,
            }
        } else {
            None
        };

        upsert_item(&mut inner, user_id, primary_id, fare_class_id, quantity, primary_price);
        if let Some((pid, price)) = paired {
            upsert_item(&mut inner, user_id, pid, fare_class_id, quantity, price);
        }
        Ok(())
    }

    async fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
        sync_paired: bool,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let (flight_id, class_id) = {
            let item = inner
                .cart_items
                .get_mut(&item_id)
                .filter(|i| i.user_id == user_id)
                .ok_or_else(|| CoreError::NotFound("Item no encontrado.".to_string()))?;
            item.quantity = quantity;
            (item.flight_id, item.fare_class_id)
        };
        if sync_paired {
            if let Some(pid) = inner.flights.get(&flight_id).and_then(|f| f.paired_flight_id) {
                if let Some(counterpart) = inner.cart_items.values_mut().find(|i| {
                    i.user_id == user_id && i.flight_id == pid && i.fare_class_id == class_id
                }) {
                    counterpart.quantity = quantity;
                }
            }
        }
        Ok(())
    }

    async fn remove_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        sync_paired: bool,
    ) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        let item = inner
            .cart_items
            .get(&item_id)
            .filter(|i| i.user_id == user_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound("Item no encontrado.".to_string()))?;
        inner.cart_items.remove(&item.id);
        if sync_paired {
            if let Some(pid) = inner
                .flights
                .get(&item.flight_id)
                .and_then(|f| f.paired_flight_id)
            {
                let counterpart = inner
                    .cart_items
                    .values()
                    .find(|i| {
                        i.user_id == user_id
                            && i.flight_id == pid
                            && i.fare_class_id == item.fare_class_id
                    })
                    .map(|i| i.id);
                if let Some(cid) = counterpart {
                    inner.cart_items.remove(&cid);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl FlightStore for MemoryStore {
    async fn create(&self, spec: &FlightSpec) -> CoreResult<Flight> {
        let mut inner = self.inner.write().await;
        let flight = Flight {
            id: Uuid::new_v4(),
            code: spec.code.clone(),
            route: spec.route.clone(),
            depart_at: spec.depart_at,
            arrive_at: spec.arrive_at,
            status: FlightStatus::Scheduled,
            paired_flight_id: None,
            fare_classes: spec.fare_classes.clone(),
            layovers: spec.layovers.clone(),
        };
        inner.flights.insert(flight.id, flight.clone());
        Ok(flight)
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Flight>> {
        let inner = self.inner.read().await;
        Ok(inner.flights.get(&id).cloned())
    }

    async fn list(&self) -> CoreResult<Vec<Flight>> {
        let inner = self.inner.read().await;
        let mut flights: Vec<Flight> = inner.flights.values().cloned().collect();
        flights.sort_by_key(|f| f.depart_at);
        Ok(flights)
    }

    async fn apply_schedule(&self, id: Uuid, update: &ScheduleUpdate) -> CoreResult<Flight> {
        let mut inner = self.inner.write().await;
        let flight = inner
            .flights
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("Vuelo no encontrado".to_string()))?;
        if flight.status.is_terminal() {
            return Err(CoreError::Conflict(
                "El vuelo está cancelado y no admite cambios.".to_string(),
            ));
        }
        flight.code = update.code.clone();
        flight.depart_at = update.depart_at;
        flight.arrive_at = update.arrive_at;
        flight.fare_classes = update.fare_classes.clone();
        Ok(flight.clone())
    }

    async fn set_cancelled(&self, id: Uuid) -> CoreResult<Flight> {
        let mut inner = self.inner.write().await;
        let flight = inner
            .flights
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("Vuelo no encontrado".to_string()))?;
        if flight.status.is_terminal() {
            return Err(CoreError::Conflict("El vuelo ya está cancelado.".to_string()));
        }
        flight.status = FlightStatus::Cancelled;
        Ok(flight.clone())
    }

    async fn link_pair(&self, outbound_id: Uuid, return_id: Uuid) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        for id in [outbound_id, return_id] {
            let flight = inner
                .flights
                .get(&id)
                .ok_or_else(|| CoreError::NotFound("Vuelo no encontrado".to_string()))?;
            if flight.status == FlightStatus::Cancelled {
                return Err(CoreError::Conflict(
                    "Los vuelos no pueden estar cancelados".to_string(),
                ));
            }
            if flight.paired_flight_id.is_some() {
                return Err(CoreError::Conflict(
                    "El vuelo ya tiene pareja asignada.".to_string(),
                ));
            }
        }
        if let Some(f) = inner.flights.get_mut(&outbound_id) {
            f.paired_flight_id = Some(return_id);
        }
        if let Some(f) = inner.flights.get_mut(&return_id) {
            f.paired_flight_id = Some(outbound_id);
        }
        Ok(())
    }

    async fn unlink_pair(&self, id: Uuid) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.flights.contains_key(&id) {
            return Err(CoreError::NotFound("Vuelo no encontrado".to_string()));
        }
        for flight in inner.flights.values_mut() {
            if flight.id == id || flight.paired_flight_id == Some(id) {
                flight.paired_flight_id = None;
            }
        }
        Ok(())
    }

    async fn reservees(&self, flight_id: Uuid) -> CoreResult<Vec<Reservee>> {
        let inner = self.inner.read().await;
        let mut seen: HashMap<Uuid, Reservee> = HashMap::new();
        for reservation in inner.reservations.values() {
            if reservation.state == ReservationState::Cancelled {
                continue;
            }
            if !reservation.items.iter().any(|i| i.flight_id == flight_id) {
                continue;
            }
            let Some(account) = inner.accounts.get(&reservation.owner_user_id) else {
                continue;
            };
            if !account.enabled {
                continue;
            }
            seen.entry(account.id).or_insert_with(|| Reservee {
                user_id: account.id,
                email: account.email.clone(),
                full_name: account.full_name(),
            });
        }
        Ok(seen.into_values().collect())
    }
}

fn summary_of(r: &Reservation, buyer_email: String) -> ReservationSummary {
    ReservationSummary {
        id: r.id,
        owner_user_id: r.owner_user_id,
        buyer_email,
        code: r.code.clone(),
        state: r.state,
        total_cents: r.total_cents,
        created_at: r.created_at,
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn checkout(
        &self,
        cart_owner_id: Uuid,
        reservation_owner_id: Uuid,
    ) -> CoreResult<Reservation> {
        let mut inner = self.inner.write().await;
        let item_ids: Vec<Uuid> = inner
            .cart_items
            .values()
            .filter(|i| i.user_id == cart_owner_id)
            .map(|i| i.id)
            .collect();
        if item_ids.is_empty() {
            return Err(CoreError::Validation(
                "El carrito está vacío o ya fue procesado.".to_string(),
            ));
        }

        let mut items: Vec<ReservationItem> = Vec::with_capacity(item_ids.len());
        for id in &item_ids {
            let item = &inner.cart_items[id];
            let flight = inner
                .flights
                .get(&item.flight_id)
                .ok_or_else(|| CoreError::NotFound("Vuelo no existe".to_string()))?;
            let class_name = flight
                .fare_class(item.fare_class_id)
                .map(|c| c.name.clone())
                .unwrap_or_default();
            let return_code = flight
                .paired_flight_id
                .and_then(|pid| inner.flights.get(&pid))
                .map(|pf| pf.code.clone());
            items.push(ReservationItem {
                flight_id: flight.id,
                flight_code: flight.code.clone(),
                fare_class_id: item.fare_class_id,
                class_name,
                depart_at: flight.depart_at,
                arrive_at: flight.arrive_at,
                origin: flight.route.origin_city.clone(),
                destination: flight.route.destination_city.clone(),
                return_code,
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                subtotal_cents: item.subtotal_cents(),
            });
        }
        items.sort_by_key(|i| i.depart_at);

        let reservation = Reservation {
            id: Uuid::new_v4(),
            owner_user_id: reservation_owner_id,
            code: new_reservation_code(),
            state: ReservationState::Confirmed,
            total_cents: items.iter().map(|i| i.subtotal_cents).sum(),
            created_at: Utc::now(),
            items,
        };
        for id in item_ids {
            inner.cart_items.remove(&id);
        }
        inner.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn get_detail(&self, id: Uuid) -> CoreResult<Option<ReservationDetail>> {
        let inner = self.inner.read().await;
        let Some(reservation) = inner.reservations.get(&id) else {
            return Ok(None);
        };
        let (buyer_name, buyer_email) = match inner.accounts.get(&reservation.owner_user_id) {
            Some(a) => (a.full_name(), a.email.clone()),
            None => ("cliente".to_string(), String::new()),
        };
        Ok(Some(ReservationDetail {
            reservation: reservation.clone(),
            buyer_name,
            buyer_email,
        }))
    }

    async fn list_by_user(&self, user_id: Uuid) -> CoreResult<Vec<ReservationSummary>> {
        let inner = self.inner.read().await;
        let email = inner
            .accounts
            .get(&user_id)
            .map(|a| a.email.clone())
            .unwrap_or_default();
        let mut out: Vec<ReservationSummary> = inner
            .reservations
            .values()
            .filter(|r| r.owner_user_id == user_id)
            .map(|r| summary_of(r, email.clone()))
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn cancel(&self, id: Uuid) -> CoreResult<ReservationState> {
        let mut inner = self.inner.write().await;
        let reservation = inner
            .reservations
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("Reserva no encontrada.".to_string()))?;
        if !reservation.state.is_cancellable() {
            return Err(CoreError::Conflict(
                "La reserva no está en estado cancelable.".to_string(),
            ));
        }
        reservation.state = ReservationState::Cancelled;
        Ok(ReservationState::Cancelled)
    }

    async fn record_agency_link(&self, link: &AgencyReservationLink) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.reservations.contains_key(&link.reservation_id) {
            return Err(CoreError::NotFound("Reserva no encontrada.".to_string()));
        }
        inner.agency_links.insert(link.reservation_id, link.clone());
        Ok(())
    }

    async fn list_filtered(
        &self,
        filter: &ReservationFilter,
    ) -> CoreResult<Vec<ReservationSummary>> {
        let inner = self.inner.read().await;
        let wanted_email = filter.email.as_deref().map(aerovia_core::normalize_email);
        let mut out = Vec::new();
        for r in inner.reservations.values() {
            if let Some(uid) = filter.user_id {
                if r.owner_user_id != uid {
                    continue;
                }
            }
            let email = inner
                .accounts
                .get(&r.owner_user_id)
                .map(|a| a.email.clone())
                .unwrap_or_default();
            if let Some(we) = &wanted_email {
                if &email != we {
                    continue;
                }
            }
            if let Some(code) = &filter.code {
                if !r.code.eq_ignore_ascii_case(code) {
                    continue;
                }
            }
            if let Some(fid) = filter.flight_id {
                if !r.items.iter().any(|i| i.flight_id == fid) {
                    continue;
                }
            }
            if let Some(fc) = &filter.flight_code {
                if !r.items.iter().any(|i| i.flight_code.eq_ignore_ascii_case(fc)) {
                    continue;
                }
            }
            if let Some(from) = filter.created_from {
                if r.created_at < from {
                    continue;
                }
            }
            if let Some(to) = filter.created_to {
                if r.created_at > to {
                    continue;
                }
            }
            if let Some(state) = filter.state {
                if r.state != state {
                    continue;
                }
            }
            out.push(summary_of(r, email));
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn stats(&self) -> CoreResult<BookingStats> {
        let inner = self.inner.read().await;
        let mut stats = BookingStats {
            reservations_total: 0,
            reservations_pending: 0,
            reservations_confirmed: 0,
            reservations_cancelled: 0,
            revenue_cents: 0,
            flights_scheduled: 0,
            flights_cancelled: 0,
        };
        for r in inner.reservations.values() {
            stats.reservations_total += 1;
            match r.state {
                ReservationState::Pending => stats.reservations_pending += 1,
                ReservationState::Confirmed => stats.reservations_confirmed += 1,
                ReservationState::Cancelled => stats.reservations_cancelled += 1,
            }
            if r.state != ReservationState::Cancelled {
                stats.revenue_cents += r.total_cents;
            }
        }
        for f in inner.flights.values() {
            match f.status {
                FlightStatus::Scheduled => stats.flights_scheduled += 1,
                FlightStatus::Cancelled => stats.flights_cancelled += 1,
            }
        }
        Ok(stats)
    }
}
