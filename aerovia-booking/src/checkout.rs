use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use aerovia_cart::CartStore;
use aerovia_core::notify::Mailer;
use aerovia_core::payment::{validate_payment_shape, PaymentForm};
use aerovia_core::{normalize_email, password, AccountStore, CoreError, CoreResult, Principal, Role};

use crate::models::Reservation;
use crate::store::ReservationStore;

/// Accounts created on the agency path start with this password hashed;
/// the customer resets it out of band.
const DEFAULT_CUSTOMER_PASSWORD: &str = "cambiar123";

/// End-customer payload an agency submits when buying on behalf of a
/// traveler.
#[derive(Debug, Clone, Deserialize)]
pub struct ClienteFinal {
    pub email: String,
    #[serde(default)]
    pub nombres: Option<String>,
    #[serde(default)]
    pub apellidos: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    #[serde(flatten)]
    pub payment: PaymentForm,
    #[serde(rename = "clienteFinal", default)]
    pub cliente_final: Option<ClienteFinal>,
}

/// Cart-to-reservation transaction. Validates the payment shape and the
/// cart, resolves the reservation owner (the principal, or the resolved
/// end customer on the agency path), runs the atomic checkout and fires
/// the best-effort side effects.
pub struct CheckoutEngine {
    carts: Arc<dyn CartStore>,
    reservations: Arc<dyn ReservationStore>,
    accounts: Arc<dyn AccountStore>,
    mailer: Arc<dyn Mailer>,
}

impl CheckoutEngine {
    pub fn new(
        carts: Arc<dyn CartStore>,
        reservations: Arc<dyn ReservationStore>,
        accounts: Arc<dyn AccountStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            carts,
            reservations,
            accounts,
            mailer,
        }
    }

    pub async fn checkout(
        &self,
        principal: &Principal,
        request: &CheckoutRequest,
    ) -> CoreResult<Reservation> {
        validate_payment_shape(&request.payment)?;

        let cart = self.carts.get_cart(principal.subject_id).await?;
        if cart.is_empty() {
            return Err(CoreError::Validation("El carrito está vacío.".to_string()));
        }

        let (owner_id, owner_email, agency_link) = match (&principal.role, &request.cliente_final)
        {
            (Role::TravelAgency, Some(cf)) => {
                let customer = self.resolve_cliente_final(cf).await?;
                (customer.id, customer.email.clone(), true)
            }
            _ => (
                principal.subject_id,
                principal.email.clone(),
                false,
            ),
        };

        let reservation = self
            .reservations
            .checkout(principal.subject_id, owner_id)
            .await?;

        if agency_link {
            let link = crate::models::AgencyReservationLink {
                reservation_id: reservation.id,
                agency_user_id: principal.subject_id,
            };
            if let Err(e) = self.reservations.record_agency_link(&link).await {
                tracing::warn!(
                    reservation = %reservation.id,
                    agency = %principal.subject_id,
                    error = %e,
                    "no se pudo registrar el enlace agencia-reserva"
                );
            }
        }

        self.send_confirmation(&owner_email, &reservation);

        Ok(reservation)
    }

    /// Reuses the account matching the normalized email or creates an
    /// enabled Customer account. Blank names fall back to the email's
    /// local part.
    async fn resolve_cliente_final(&self, cf: &ClienteFinal) -> CoreResult<aerovia_core::UserAccount> {
        let email = normalize_email(&cf.email);
        if email.is_empty() {
            return Err(CoreError::Validation(
                "clienteFinal.email es requerido".to_string(),
            ));
        }

        if let Some(existing) = self.accounts.find_by_email(&email).await? {
            return Ok(existing);
        }

        let local_part = email.split('@').next().unwrap_or("cliente").to_string();
        let nombres = match cf.nombres.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => local_part.clone(),
        };
        let apellidos = cf
            .apellidos
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .to_string();

        let hash = password::hash(DEFAULT_CUSTOMER_PASSWORD)?;
        self.accounts
            .create_customer(&email, &nombres, &apellidos, &hash)
            .await
    }

    /// Fire-and-forget; a mailer failure is logged and never fails the
    /// checkout that triggered it.
    fn send_confirmation(&self, to: &str, reservation: &Reservation) {
        if to.is_empty() {
            return;
        }
        let mailer = self.mailer.clone();
        let to = to.to_string();
        let subject = format!("Confirmación de reserva #{}", reservation.code);
        let body = confirmation_body(reservation);
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&to, &subject, &body).await {
                tracing::warn!(to = %to, error = %e, "fallo al enviar confirmación de reserva");
            }
        });
    }
}

pub fn confirmation_body(reservation: &Reservation) -> String {
    let mut html = format!(
        "<h2>Confirmación de reserva #{}</h2>\
         <p>Gracias por tu compra. Este es el detalle:</p>\
         <ul style='padding-left:16px'>",
        reservation.code
    );
    for item in &reservation.items {
        html.push_str(&format!(
            "<li style='margin:6px 0'><strong>{}</strong> ({})\
             <br/><small>Salida: {} &bull; Llegada: {}</small>\
             <br/><small>Origen: {} &bull; Destino: {}</small>\
             <br/><strong>{} x Q{:.2}</strong></li>",
            item.flight_code,
            item.class_name,
            item.depart_at.format("%d %b %Y, %H:%M UTC"),
            item.arrive_at.format("%d %b %Y, %H:%M UTC"),
            item.origin,
            item.destination,
            item.quantity,
            item.unit_price_cents as f64 / 100.0,
        ));
    }
    html.push_str(&format!(
        "</ul><p>Total: <strong>Q{:.2}</strong></p><p>¡Buen viaje!<br/>Aerovia</p>",
        reservation.total_cents as f64 / 100.0
    ));
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{new_reservation_code, ReservationItem, ReservationState};
    use chrono::Utc;

    #[test]
    fn confirmation_body_lists_every_segment_and_the_total() {
        let item = ReservationItem {
            flight_id: Uuid::new_v4(),
            flight_code: "AV101".to_string(),
            fare_class_id: 1,
            class_name: "ECONOMY".to_string(),
            depart_at: Utc::now(),
            arrive_at: Utc::now(),
            origin: "Guatemala, Guatemala".to_string(),
            destination: "México, México".to_string(),
            return_code: None,
            quantity: 2,
            unit_price_cents: 10000,
            subtotal_cents: 20000,
        };
        let reservation = Reservation {
            id: Uuid::new_v4(),
            owner_user_id: Uuid::new_v4(),
            code: new_reservation_code(),
            state: ReservationState::Confirmed,
            total_cents: 20000,
            created_at: Utc::now(),
            items: vec![item],
        };
        let html = confirmation_body(&reservation);
        assert!(html.contains("AV101"));
        assert!(html.contains("Q200.00"));
        assert!(html.contains(&reservation.code));
    }
}
