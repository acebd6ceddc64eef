use std::sync::Arc;

use chrono::{DateTime, Utc};

use aerovia_core::notify::Mailer;

use crate::models::Flight;
use crate::store::FlightStore;

/// Fan-out of schedule-change and cancellation notices to every holder
/// of a live reservation on the flight. Dispatch runs on a detached
/// task after the state change commits: at-most-once, best-effort, a
/// failed send is logged and isolated.
pub struct FlightNotifier {
    store: Arc<dyn FlightStore>,
    mailer: Arc<dyn Mailer>,
}

impl FlightNotifier {
    pub fn new(store: Arc<dyn FlightStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self { store, mailer }
    }

    pub fn flight_updated(&self, flight: Flight, reason: String) {
        let subject = format!("Actualización de tu vuelo {}", flight.code);
        self.dispatch(flight, reason, subject, change_body);
    }

    pub fn flight_cancelled(&self, flight: Flight, reason: String) {
        let subject = format!("Cancelación de tu vuelo {}", flight.code);
        self.dispatch(flight, reason, subject, cancel_body);
    }

    fn dispatch(
        &self,
        flight: Flight,
        reason: String,
        subject: String,
        body: fn(&Flight, &str, &str) -> String,
    ) {
        let store = self.store.clone();
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            let recipients = match store.reservees(flight.id).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(flight = %flight.id, error = %e, "no se pudieron cargar destinatarios");
                    return;
                }
            };
            for r in recipients {
                let html = body(&flight, &reason, &r.full_name);
                if let Err(e) = mailer.send(&r.email, &subject, &html).await {
                    tracing::warn!(to = %r.email, error = %e, "fallo al enviar notificación de vuelo");
                }
            }
        });
    }
}

fn fmt_dt(dt: DateTime<Utc>) -> String {
    dt.format("%d %b %Y, %H:%M UTC").to_string()
}

fn route_line(flight: &Flight) -> String {
    format!(
        "{}, {} &rarr; {}, {}",
        flight.route.origin_city,
        flight.route.origin_country,
        flight.route.destination_city,
        flight.route.destination_country
    )
}

pub fn change_body(flight: &Flight, reason: &str, recipient_name: &str) -> String {
    format!(
        "<h2>Hola {recipient_name},</h2>\
         <p>Queremos informarte que tu vuelo <strong>{code}</strong> ha sido <strong>actualizado</strong>.</p>\
         <p><strong>Motivo:</strong> {reason}</p>\
         <ul style='line-height:1.5'>\
         <li><strong>Ruta:</strong> {route}</li>\
         <li><strong>Salida:</strong> {depart}</li>\
         <li><strong>Llegada:</strong> {arrive}</li>\
         </ul>\
         <p>Si estos cambios no te funcionan, contáctanos para ayudarte con opciones.</p>\
         <p>Gracias por volar con nosotros,<br/>Aerovia</p>",
        code = flight.code,
        route = route_line(flight),
        depart = fmt_dt(flight.depart_at),
        arrive = fmt_dt(flight.arrive_at),
    )
}

pub fn cancel_body(flight: &Flight, reason: &str, recipient_name: &str) -> String {
    format!(
        "<h2>Hola {recipient_name},</h2>\
         <p>Lamentamos informarte que tu vuelo <strong>{code}</strong> ha sido <strong>cancelado</strong>.</p>\
         <p><strong>Motivo:</strong> {reason}</p>\
         <ul style='line-height:1.5'>\
         <li><strong>Ruta:</strong> {route}</li>\
         <li><strong>Salida prevista:</strong> {depart}</li>\
         </ul>\
         <p>Nuestro equipo puede ayudarte a reprogramar o gestionar alternativas.</p>\
         <p>Disculpa los inconvenientes,<br/>Aerovia</p>",
        code = flight.code,
        route = route_line(flight),
        depart = fmt_dt(flight.depart_at),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FlightStatus, RouteInfo};
    use uuid::Uuid;

    fn flight() -> Flight {
        Flight {
            id: Uuid::new_v4(),
            code: "AV205".to_string(),
            route: RouteInfo {
                origin_city: "Guatemala".to_string(),
                origin_country: "Guatemala".to_string(),
                destination_city: "Bogotá".to_string(),
                destination_country: "Colombia".to_string(),
            },
            depart_at: Utc::now(),
            arrive_at: Utc::now(),
            status: FlightStatus::Scheduled,
            paired_flight_id: None,
            fare_classes: vec![],
            layovers: vec![],
        }
    }

    #[test]
    fn change_body_carries_code_reason_and_greeting() {
        let html = change_body(&flight(), "mantenimiento", "Ana López");
        assert!(html.contains("AV205"));
        assert!(html.contains("mantenimiento"));
        assert!(html.contains("Hola Ana López"));
        assert!(html.contains("actualizado"));
    }

    #[test]
    fn cancel_body_mentions_cancellation() {
        let html = cancel_body(&flight(), "clima", "cliente");
        assert!(html.contains("cancelado"));
        assert!(html.contains("clima"));
    }
}
