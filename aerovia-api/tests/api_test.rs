use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use aerovia_api::identity::{issue_token, USER_ID_HEADER, WS_EMAIL_HEADER, WS_PASSWORD_HEADER};
use aerovia_api::{app, AppState, AuthConfig};
use aerovia_booking::{CheckoutEngine, ReservationService, ReservationStore};
use aerovia_cart::{CartService, CartStore};
use aerovia_core::notify::{LogMailer, Mailer, StubTicketRenderer, TicketRenderer};
use aerovia_core::{password, AccountStore, Role, UserAccount};
use aerovia_flights::{FareClassConfig, FlightSpec, FlightStore, RouteInfo};
use aerovia_store::MemoryStore;

const AGENCY_PASSWORD: &str = "agencia-secreta";

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
    auth: AuthConfig,
    admin: UserAccount,
    customer: UserAccount,
    agency: UserAccount,
}

fn account(role: Role, email: &str, first: &str, last: &str, pass: &str) -> UserAccount {
    UserAccount {
        id: Uuid::new_v4(),
        email: email.to_string(),
        first_names: first.to_string(),
        last_names: last.to_string(),
        password_hash: if pass.is_empty() {
            String::new()
        } else {
            password::hash(pass).unwrap()
        },
        enabled: true,
        role,
    }
}

async fn test_app() -> TestApp {
    let store = MemoryStore::new();

    let admin = account(Role::Admin, "admin@aerovia.test", "Admin", "Central", "");
    let customer = account(Role::Customer, "ana@aerovia.test", "Ana", "López", "");
    let agency = account(
        Role::TravelAgency,
        "ws@agencia.test",
        "Agencia",
        "Viajes",
        AGENCY_PASSWORD,
    );
    store.seed_account(admin.clone()).await;
    store.seed_account(customer.clone()).await;
    store.seed_account(agency.clone()).await;

    let auth = AuthConfig {
        secret: "secreto-de-prueba".to_string(),
        expiration: 3600,
    };

    let accounts: Arc<dyn AccountStore> = store.clone();
    let cart_store: Arc<dyn CartStore> = store.clone();
    let flight_store: Arc<dyn FlightStore> = store.clone();
    let reservation_store: Arc<dyn ReservationStore> = store.clone();
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
    let tickets: Arc<dyn TicketRenderer> = Arc::new(StubTicketRenderer);

    let notifier = aerovia_flights::FlightNotifier::new(flight_store.clone(), mailer.clone());
    let state = AppState {
        accounts: accounts.clone(),
        carts: Arc::new(CartService::new(cart_store.clone())),
        checkout: Arc::new(CheckoutEngine::new(
            cart_store,
            reservation_store.clone(),
            accounts,
            mailer,
        )),
        reservations: Arc::new(ReservationService::new(reservation_store)),
        schedule: Arc::new(aerovia_flights::ScheduleService::new(flight_store, notifier)),
        tickets,
        auth: auth.clone(),
    };

    TestApp {
        app: app(state),
        store,
        auth,
        admin,
        customer,
        agency,
    }
}

fn flight_spec(code: &str, price_cents: i64) -> FlightSpec {
    let depart = Utc::now() + Duration::days(45);
    FlightSpec {
        code: code.to_string(),
        route: RouteInfo {
            origin_city: "Guatemala".to_string(),
            origin_country: "Guatemala".to_string(),
            destination_city: "Bogotá".to_string(),
            destination_country: "Colombia".to_string(),
        },
        depart_at: depart,
        arrive_at: depart + Duration::hours(3),
        fare_classes: vec![FareClassConfig {
            class_id: 1,
            name: "ECONOMY".to_string(),
            total_capacity: 150,
            price_cents,
        }],
        layovers: vec![],
    }
}

impl TestApp {
    fn token(&self, account: &UserAccount) -> String {
        issue_token(&self.auth, account).unwrap()
    }

    async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.unwrap()
    }

    async fn get(&self, uri: &str, token: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method(Method::GET)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn send_json(
        &self,
        method: Method,
        uri: &str,
        token: &str,
        body: Value,
    ) -> Response<Body> {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
    }
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn payment_body() -> Value {
    json!({
        "tarjeta": {
            "numero": "4111111111111111",
            "cvv": "123",
            "titular": "Ana López",
            "expiracion": "12/30"
        },
        "facturacion": {
            "nombre": "Ana López",
            "direccion": "Ciudad",
            "nit": "CF"
        }
    })
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected_with_the_attempted_mechanisms() {
    let t = test_app().await;
    let response = t
        .send(Request::builder().uri("/cart").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("No autenticado"));
}

#[tokio::test]
async fn public_flight_catalog_needs_no_session() {
    let t = test_app().await;
    t.store.create(&flight_spec("AV101", 10000)).await.unwrap();

    let response = t
        .send(Request::builder().uri("/flights").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["code"], "AV101");
}

#[tokio::test]
async fn legacy_user_id_header_resolves_a_customer() {
    let t = test_app().await;
    let response = t
        .send(
            Request::builder()
                .uri("/cart")
                .header(USER_ID_HEADER, t.customer.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn webservice_header_auth_accepts_good_and_rejects_bad_credentials() {
    let t = test_app().await;

    let ok = t
        .send(
            Request::builder()
                .uri("/cart")
                .header(WS_EMAIL_HEADER, &t.agency.email)
                .header(WS_PASSWORD_HEADER, AGENCY_PASSWORD)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let bad = t
        .send(
            Request::builder()
                .uri("/cart")
                .header(WS_EMAIL_HEADER, &t.agency.email)
                .header(WS_PASSWORD_HEADER, "equivocada")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(bad).await["error"],
        "Credenciales WebService inválidas"
    );

    let half = t
        .send(
            Request::builder()
                .uri("/cart")
                .header(WS_EMAIL_HEADER, &t.agency.email)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(half.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn disabled_webservice_accounts_are_turned_away() {
    let t = test_app().await;
    let mut disabled = t.agency.clone();
    disabled.enabled = false;
    t.store.seed_account(disabled).await;

    let response = t
        .send(
            Request::builder()
                .uri("/cart")
                .header(WS_EMAIL_HEADER, &t.agency.email)
                .header(WS_PASSWORD_HEADER, AGENCY_PASSWORD)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Usuario WebService deshabilitado");
}

#[tokio::test]
async fn webservice_headers_reject_non_agency_roles() {
    let t = test_app().await;
    let mut plain = t.customer.clone();
    plain.password_hash = password::hash(AGENCY_PASSWORD).unwrap();
    t.store.seed_account(plain.clone()).await;

    let response = t
        .send(
            Request::builder()
                .uri("/cart")
                .header(WS_EMAIL_HEADER, &plain.email)
                .header(WS_PASSWORD_HEADER, AGENCY_PASSWORD)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Usuario no es de tipo WebService");
}

#[tokio::test]
async fn garbage_bearer_token_falls_through_to_webservice_headers() {
    let t = test_app().await;
    let response = t
        .send(
            Request::builder()
                .uri("/cart")
                .header(header::AUTHORIZATION, "Bearer no-es-un-jwt")
                .header(WS_EMAIL_HEADER, &t.agency.email)
                .header(WS_PASSWORD_HEADER, AGENCY_PASSWORD)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn adding_with_nonpositive_quantity_coerces_to_one() {
    let t = test_app().await;
    let flight = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let token = t.token(&t.customer);

    let added = t
        .send_json(
            Method::POST,
            "/cart/items",
            &token,
            json!({ "idVuelo": flight.id, "idClase": 1, "cantidad": 0 }),
        )
        .await;
    assert_eq!(added.status(), StatusCode::CREATED);

    let cart = body_json(t.get("/cart", &token).await).await;
    assert_eq!(cart["items"][0]["quantity"], 1);
    assert_eq!(cart["total_cents"], 10000);
}

#[tokio::test]
async fn updating_to_zero_quantity_is_a_validation_error() {
    let t = test_app().await;
    let flight = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let token = t.token(&t.customer);
    t.send_json(
        Method::POST,
        "/cart/items",
        &token,
        json!({ "idVuelo": flight.id, "idClase": 1, "cantidad": 1 }),
    )
    .await;
    let cart = body_json(t.get("/cart", &token).await).await;
    let item_id = cart["items"][0]["item_id"].as_str().unwrap().to_string();

    let response = t
        .send_json(
            Method::PUT,
            &format!("/cart/items/{item_id}"),
            &token,
            json!({ "cantidad": 0 }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "La cantidad debe ser al menos 1."
    );
}

#[tokio::test]
async fn checkout_with_an_empty_cart_is_rejected() {
    let t = test_app().await;
    let token = t.token(&t.customer);
    let response = t
        .send_json(Method::POST, "/checkout", &token, payment_body())
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "El carrito está vacío.");
}

#[tokio::test]
async fn checkout_creates_a_confirmed_reservation_and_clears_the_cart() {
    let t = test_app().await;
    let flight = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let token = t.token(&t.customer);
    t.send_json(
        Method::POST,
        "/cart/items",
        &token,
        json!({ "idVuelo": flight.id, "idClase": 1, "cantidad": 2 }),
    )
    .await;

    let response = t
        .send_json(Method::POST, "/checkout", &token, payment_body())
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let reservation_id = body["idReserva"].as_str().unwrap().to_string();

    let cart = body_json(t.get("/cart", &token).await).await;
    assert!(cart["items"].as_array().unwrap().is_empty());

    let detail = body_json(
        t.get(&format!("/reservations/{reservation_id}"), &token).await,
    )
    .await;
    assert_eq!(detail["state"], "CONFIRMED");
    assert_eq!(detail["total_cents"], 20000);
    assert_eq!(detail["buyer_email"], "ana@aerovia.test");

    let mine = body_json(t.get("/reservations", &token).await).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn checkout_with_a_short_card_number_is_rejected_before_any_mutation() {
    let t = test_app().await;
    let flight = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let token = t.token(&t.customer);
    t.send_json(
        Method::POST,
        "/cart/items",
        &token,
        json!({ "idVuelo": flight.id, "idClase": 1, "cantidad": 1 }),
    )
    .await;

    let response = t
        .send_json(
            Method::POST,
            "/checkout",
            &token,
            json!({ "tarjeta": { "numero": "4111", "cvv": "123" },
                    "facturacion": { "nombre": "Ana" } }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Número de tarjeta inválido.");

    let cart = body_json(t.get("/cart", &token).await).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cancelling_a_reservation_twice_is_a_conflict() {
    let t = test_app().await;
    let flight = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let token = t.token(&t.customer);
    t.send_json(
        Method::POST,
        "/cart/items",
        &token,
        json!({ "idVuelo": flight.id, "idClase": 1, "cantidad": 1 }),
    )
    .await;
    let body = body_json(
        t.send_json(Method::POST, "/checkout", &token, payment_body()).await,
    )
    .await;
    let id = body["idReserva"].as_str().unwrap().to_string();

    let first = t
        .send_json(Method::POST, &format!("/reservations/{id}/cancel"), &token, json!({}))
        .await;
    assert_eq!(first.status(), StatusCode::NO_CONTENT);

    let second = t
        .send_json(Method::POST, &format!("/reservations/{id}/cancel"), &token, json!({}))
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(second).await["error"],
        "La reserva no está en estado cancelable."
    );
}

#[tokio::test]
async fn a_customer_cannot_read_a_foreign_reservation() {
    let t = test_app().await;
    let flight = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let owner_token = t.token(&t.customer);
    t.send_json(
        Method::POST,
        "/cart/items",
        &owner_token,
        json!({ "idVuelo": flight.id, "idClase": 1, "cantidad": 1 }),
    )
    .await;
    let body = body_json(
        t.send_json(Method::POST, "/checkout", &owner_token, payment_body()).await,
    )
    .await;
    let id = body["idReserva"].as_str().unwrap().to_string();

    let other = account(Role::Customer, "otro@aerovia.test", "Otro", "Cliente", "");
    t.store.seed_account(other.clone()).await;
    let response = t.get(&format!("/reservations/{id}"), &t.token(&other)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "No autorizado.");
}

#[tokio::test]
async fn ticket_download_is_a_pdf_attachment() {
    let t = test_app().await;
    let flight = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let token = t.token(&t.customer);
    t.send_json(
        Method::POST,
        "/cart/items",
        &token,
        json!({ "idVuelo": flight.id, "idClase": 1, "cantidad": 1 }),
    )
    .await;
    let body = body_json(
        t.send_json(Method::POST, "/checkout", &token, payment_body()).await,
    )
    .await;
    let id = body["idReserva"].as_str().unwrap().to_string();

    let response = t.get(&format!("/reservations/{id}/ticket.pdf"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn agency_checkout_creates_the_end_customer_on_the_fly() {
    let t = test_app().await;
    let flight = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let token = t.token(&t.agency);
    t.send_json(
        Method::POST,
        "/cart/items",
        &token,
        json!({ "idVuelo": flight.id, "idClase": 1, "cantidad": 1 }),
    )
    .await;

    let mut body = payment_body();
    body["clienteFinal"] = json!({ "email": " Nuevo@Viajero.test " });
    let response = t.send_json(Method::POST, "/checkout", &token, body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["idReserva"].as_str().unwrap().to_string();

    let created = t
        .store
        .find_by_email("nuevo@viajero.test")
        .await
        .unwrap()
        .expect("la cuenta del cliente final debe existir");
    assert_eq!(created.role, Role::Customer);
    assert_eq!(created.first_names, "nuevo");

    let detail = body_json(
        t.get(&format!("/admin/reservations/{id}"), &t.token(&t.admin)).await,
    )
    .await;
    assert_eq!(detail["owner_user_id"], created.id.to_string());
    assert_eq!(detail["buyer_email"], "nuevo@viajero.test");
}

#[tokio::test]
async fn agency_checkout_reuses_a_known_end_customer() {
    let t = test_app().await;
    let flight = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let token = t.token(&t.agency);
    t.send_json(
        Method::POST,
        "/cart/items",
        &token,
        json!({ "idVuelo": flight.id, "idClase": 1, "cantidad": 1 }),
    )
    .await;

    let mut body = payment_body();
    body["clienteFinal"] = json!({ "email": t.customer.email });
    let response = t.send_json(Method::POST, "/checkout", &token, body).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let mine = body_json(t.get("/reservations", &t.token(&t.customer)).await).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["owner_user_id"], t.customer.id.to_string());
}

#[tokio::test]
async fn flight_creation_validates_the_itinerary() {
    let t = test_app().await;
    let token = t.token(&t.admin);
    let depart = Utc::now() + Duration::days(10);

    let response = t
        .send_json(
            Method::POST,
            "/flights",
            &token,
            json!({
                "code": "AV500",
                "route": {
                    "origin_city": "Guatemala", "origin_country": "Guatemala",
                    "destination_city": "Lima", "destination_country": "Perú"
                },
                "depart_at": depart.to_rfc3339(),
                "arrive_at": (depart - Duration::hours(2)).to_rfc3339(),
                "fare_classes": [
                    { "class_id": 1, "name": "ECONOMY", "total_capacity": 100, "price_cents": 9900 }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "La salida debe ser menor que la llegada"
    );
}

#[tokio::test]
async fn flight_admin_routes_reject_non_admins() {
    let t = test_app().await;
    let flight = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let response = t
        .send_json(
            Method::PUT,
            &format!("/flights/{}/state", flight.id),
            &t.token(&t.customer),
            json!({ "estado": "CANCELLED", "motivo": "clima" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn cancelling_a_flight_twice_is_a_conflict() {
    let t = test_app().await;
    let flight = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let token = t.token(&t.admin);

    let first = t
        .send_json(
            Method::PUT,
            &format!("/flights/{}/state", flight.id),
            &token,
            json!({ "estado": "CANCELLED", "motivo": "clima" }),
        )
        .await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(body_json(first).await["status"], "CANCELLED");

    let second = t
        .send_json(
            Method::PUT,
            &format!("/flights/{}/state", flight.id),
            &token,
            json!({ "estado": "CANCELLED", "motivo": "clima" }),
        )
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn flight_cancellation_requires_a_reason() {
    let t = test_app().await;
    let flight = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let response = t
        .send_json(
            Method::PUT,
            &format!("/flights/{}/state", flight.id),
            &t.token(&t.admin),
            json!({ "estado": "CANCELLED" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "motivo es requerido para cancelar"
    );
}

#[tokio::test]
async fn linking_and_unlinking_keeps_the_pair_symmetric() {
    let t = test_app().await;
    let ida = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let regreso = t.store.create(&flight_spec("AV102", 12000)).await.unwrap();
    let token = t.token(&t.admin);

    let linked = t
        .send_json(
            Method::POST,
            "/flights/link",
            &token,
            json!({ "idIda": ida.id, "idRegreso": regreso.id }),
        )
        .await;
    assert_eq!(linked.status(), StatusCode::NO_CONTENT);

    let a = body_json(t.get(&format!("/flights/{}", ida.id), &token).await).await;
    assert_eq!(a["paired_flight_id"], regreso.id.to_string());

    let again = t
        .send_json(
            Method::POST,
            "/flights/link",
            &token,
            json!({ "idIda": ida.id, "idRegreso": regreso.id }),
        )
        .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let unlinked = t
        .send_json(
            Method::PUT,
            &format!("/flights/{}/unlink", regreso.id),
            &token,
            json!({}),
        )
        .await;
    assert_eq!(unlinked.status(), StatusCode::NO_CONTENT);

    let b = body_json(t.get(&format!("/flights/{}", ida.id), &token).await).await;
    assert!(b["paired_flight_id"].is_null());
}

#[tokio::test]
async fn paired_cart_sync_mirrors_both_legs_over_http() {
    let t = test_app().await;
    let ida = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let regreso = t.store.create(&flight_spec("AV102", 12000)).await.unwrap();
    t.store.link_pair(ida.id, regreso.id).await.unwrap();
    let token = t.token(&t.customer);

    let added = t
        .send_json(
            Method::POST,
            "/cart/items?sync_paired=true",
            &token,
            json!({ "idVuelo": ida.id, "idClase": 1, "cantidad": 2 }),
        )
        .await;
    assert_eq!(added.status(), StatusCode::CREATED);

    let cart = body_json(t.get("/cart", &token).await).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 2);
    assert_eq!(cart["total_cents"], 2 * 10000 + 2 * 12000);
}

#[tokio::test]
async fn admin_reporting_filters_and_counts() {
    let t = test_app().await;
    let flight = t.store.create(&flight_spec("AV101", 10000)).await.unwrap();
    let token = t.token(&t.customer);
    t.send_json(
        Method::POST,
        "/cart/items",
        &token,
        json!({ "idVuelo": flight.id, "idClase": 1, "cantidad": 2 }),
    )
    .await;
    t.send_json(Method::POST, "/checkout", &token, payment_body()).await;

    let admin_token = t.token(&t.admin);
    let listed = body_json(
        t.get("/admin/reservations?flight_code=AV101", &admin_token).await,
    )
    .await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["buyer_email"], "ana@aerovia.test");

    let missed = body_json(
        t.get("/admin/reservations?flight_code=AV999", &admin_token).await,
    )
    .await;
    assert!(missed.as_array().unwrap().is_empty());

    let stats = body_json(t.get("/admin/stats", &admin_token).await).await;
    assert_eq!(stats["reservations_total"], 1);
    assert_eq!(stats["reservations_confirmed"], 1);
    assert_eq!(stats["revenue_cents"], 20000);
    assert_eq!(stats["flights_scheduled"], 1);

    let forbidden = t.get("/admin/stats", &token).await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
}
