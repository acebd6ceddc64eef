//! Postgres backend. Every multi-row mutation runs inside one
//! transaction so the paired-leg mirror, checkout and pairing writes
//! commit or roll back as a unit.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use aerovia_booking::{
    new_reservation_code, AgencyReservationLink, BookingStats, Reservation, ReservationDetail,
    ReservationFilter, ReservationItem, ReservationState, ReservationStore, ReservationSummary,
};
use aerovia_cart::{Cart, CartLine, CartStore};
use aerovia_core::{normalize_email, AccountStore, CoreError, CoreResult, Role, UserAccount};
use aerovia_flights::{
    FareClassConfig, Flight, FlightSpec, FlightStatus, FlightStore, Layover, Reservee, RouteInfo,
    ScheduleUpdate,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

fn db_err(e: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return CoreError::Conflict("Registro duplicado".to_string());
        }
    }
    CoreError::Internal(e.to_string())
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::Customer => "CUSTOMER",
        Role::TravelAgency => "TRAVEL_AGENCY",
        Role::Admin => "ADMIN",
    }
}

fn role_from_str(s: &str) -> Role {
    match s {
        "ADMIN" => Role::Admin,
        "TRAVEL_AGENCY" => Role::TravelAgency,
        _ => Role::Customer,
    }
}

fn status_from_str(s: &str) -> CoreResult<FlightStatus> {
    match s {
        "SCHEDULED" => Ok(FlightStatus::Scheduled),
        "CANCELLED" => Ok(FlightStatus::Cancelled),
        other => Err(CoreError::internal(format!(
            "estado de vuelo desconocido: {other}"
        ))),
    }
}

fn state_to_str(state: ReservationState) -> &'static str {
    match state {
        ReservationState::Pending => "PENDING",
        ReservationState::Confirmed => "CONFIRMED",
        ReservationState::Cancelled => "CANCELLED",
    }
}

fn state_from_str(s: &str) -> CoreResult<ReservationState> {
    match s {
        "PENDING" => Ok(ReservationState::Pending),
        "CONFIRMED" => Ok(ReservationState::Confirmed),
        "CANCELLED" => Ok(ReservationState::Cancelled),
        other => Err(CoreError::internal(format!(
            "estado de reserva desconocido: {other}"
        ))),
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    first_names: String,
    last_names: String,
    password_hash: String,
    enabled: bool,
    role: String,
}

impl AccountRow {
    fn into_account(self) -> UserAccount {
        UserAccount {
            id: self.id,
            email: self.email,
            first_names: self.first_names,
            last_names: self.last_names,
            password_hash: self.password_hash,
            enabled: self.enabled,
            role: role_from_str(&self.role),
        }
    }
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    code: String,
    origin_city: String,
    origin_country: String,
    destination_city: String,
    destination_country: String,
    depart_at: DateTime<Utc>,
    arrive_at: DateTime<Utc>,
    status: String,
    paired_flight_id: Option<Uuid>,
}

#[derive(sqlx::FromRow)]
struct FareClassRow {
    class_id: i32,
    name: String,
    total_capacity: i32,
    price_cents: i64,
}

#[derive(sqlx::FromRow)]
struct LayoverRow {
    city: String,
    country: String,
    minutes: i32,
}

#[derive(sqlx::FromRow)]
struct CartJoinRow {
    item_id: Uuid,
    flight_id: Uuid,
    flight_code: String,
    fare_class_id: i32,
    class_name: String,
    depart_at: DateTime<Utc>,
    arrive_at: DateTime<Utc>,
    origin: String,
    destination: String,
    quantity: i32,
    unit_price_cents: i64,
    return_code: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    owner_user_id: Uuid,
    code: String,
    state: String,
    total_cents: i64,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ReservationItemRow {
    flight_id: Uuid,
    flight_code: String,
    fare_class_id: i32,
    class_name: String,
    depart_at: DateTime<Utc>,
    arrive_at: DateTime<Utc>,
    origin: String,
    destination: String,
    return_code: Option<String>,
    quantity: i32,
    unit_price_cents: i64,
    subtotal_cents: i64,
}

impl ReservationItemRow {
    fn into_item(self) -> ReservationItem {
        ReservationItem {
            flight_id: self.flight_id,
            flight_code: self.flight_code,
            fare_class_id: self.fare_class_id,
            class_name: self.class_name,
            depart_at: self.depart_at,
            arrive_at: self.arrive_at,
            origin: self.origin,
            destination: self.destination,
            return_code: self.return_code,
            quantity: self.quantity,
            unit_price_cents: self.unit_price_cents,
            subtotal_cents: self.subtotal_cents,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: Uuid,
    owner_user_id: Uuid,
    buyer_email: String,
    code: String,
    state: String,
    total_cents: i64,
    created_at: DateTime<Utc>,
}

impl SummaryRow {
    fn into_summary(self) -> CoreResult<ReservationSummary> {
        Ok(ReservationSummary {
            id: self.id,
            owner_user_id: self.owner_user_id,
            buyer_email: self.buyer_email,
            code: self.code,
            state: state_from_str(&self.state)?,
            total_cents: self.total_cents,
            created_at: self.created_at,
        })
    }
}

const CART_JOIN_SQL: &str = r#"
    SELECT ci.id AS item_id, ci.flight_id, ci.fare_class_id, ci.quantity,
           ci.unit_price_cents,
           f.code AS flight_code, f.depart_at, f.arrive_at,
           f.origin_city AS origin, f.destination_city AS destination,
           fc.name AS class_name,
           pf.code AS return_code
    FROM cart_items ci
    JOIN flights f ON f.id = ci.flight_id
    JOIN flight_fare_classes fc
        ON fc.flight_id = ci.flight_id AND fc.class_id = ci.fare_class_id
    LEFT JOIN flights pf ON pf.id = f.paired_flight_id
    WHERE ci.user_id = $1
    ORDER BY f.depart_at
"#;

impl PgStore {
    async fn load_flight(&self, id: Uuid) -> CoreResult<Option<Flight>> {
        let row: Option<FlightRow> =
            sqlx::query_as("SELECT * FROM flights WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(self.hydrate_flight(row).await?))
    }

    async fn hydrate_flight(&self, row: FlightRow) -> CoreResult<Flight> {
        let classes: Vec<FareClassRow> = sqlx::query_as(
            "SELECT class_id, name, total_capacity, price_cents
             FROM flight_fare_classes WHERE flight_id = $1 ORDER BY class_id",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let layovers: Vec<LayoverRow> = sqlx::query_as(
            "SELECT city, country, minutes
             FROM flight_layovers WHERE flight_id = $1 ORDER BY position",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(Flight {
            id: row.id,
            code: row.code,
            route: RouteInfo {
                origin_city: row.origin_city,
                origin_country: row.origin_country,
                destination_city: row.destination_city,
                destination_country: row.destination_country,
            },
            depart_at: row.depart_at,
            arrive_at: row.arrive_at,
            status: status_from_str(&row.status)?,
            paired_flight_id: row.paired_flight_id,
            fare_classes: classes
                .into_iter()
                .map(|c| FareClassConfig {
                    class_id: c.class_id,
                    name: c.name,
                    total_capacity: c.total_capacity,
                    price_cents: c.price_cents,
                })
                .collect(),
            layovers: layovers
                .into_iter()
                .map(|l| Layover {
                    city: l.city,
                    country: l.country,
                    minutes: l.minutes,
                })
                .collect(),
        })
    }

    async fn replace_fare_classes(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        flight_id: Uuid,
        classes: &[FareClassConfig],
    ) -> CoreResult<()> {
        sqlx::query("DELETE FROM flight_fare_classes WHERE flight_id = $1")
            .bind(flight_id)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        for class in classes {
            sqlx::query(
                "INSERT INTO flight_fare_classes (flight_id, class_id, name, total_capacity, price_cents)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(flight_id)
            .bind(class.class_id)
            .bind(&class.name)
            .bind(class.total_capacity)
            .bind(class.price_cents)
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn find_by_email(&self, email: &str) -> CoreResult<Option<UserAccount>> {
        let row: Option<AccountRow> =
            sqlx::query_as("SELECT * FROM accounts WHERE email = $1")
                .bind(normalize_email(email))
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(AccountRow::into_account))
    }

    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<UserAccount>> {
        let row: Option<AccountRow> =
            sqlx::query_as("SELECT * FROM accounts WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(AccountRow::into_account))
    }

    async fn create_customer(
        &self,
        email: &str,
        first_names: &str,
        last_names: &str,
        password_hash: &str,
    ) -> CoreResult<UserAccount> {
        let account = UserAccount {
            id: Uuid::new_v4(),
            email: email.to_string(),
            first_names: first_names.to_string(),
            last_names: last_names.to_string(),
            password_hash: password_hash.to_string(),
            enabled: true,
            role: Role::Customer,
        };
        sqlx::query(
            "INSERT INTO accounts (id, email, first_names, last_names, password_hash, enabled, role)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.first_names)
        .bind(&account.last_names)
        .bind(&account.password_hash)
        .bind(account.enabled)
        .bind(role_to_str(account.role))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return CoreError::Conflict(
                        "Ya existe un usuario con ese email".to_string(),
                    );
                }
            }
            db_err(e)
        })?;
        Ok(account)
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn get_cart(&self, user_id: Uuid) -> CoreResult<Cart> {
        let rows: Vec<CartJoinRow> = sqlx::query_as(CART_JOIN_SQL)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        let lines = rows
            .into_iter()
            .map(|r| CartLine {
                item_id: r.item_id,
                flight_id: r.flight_id,
                flight_code: r.flight_code,
                fare_class_id: r.fare_class_id,
                class_name: r.class_name,
                depart_at: r.depart_at,
                arrive_at: r.arrive_at,
                origin: r.origin,
                destination: r.destination,
                quantity: r.quantity,
                unit_price_cents: r.unit_price_cents,
                subtotal_cents: i64::from(r.quantity) * r.unit_price_cents,
            })
            .collect();
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
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let mut targets = vec![flight_id];
        let flight: Option<(String, Option<Uuid>)> = sqlx::query_as(
            "SELECT status, paired_flight_id FROM flights WHERE id = $1 FOR UPDATE",
        )
        .bind(flight_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        let (status, paired) =
            flight.ok_or_else(|| CoreError::NotFound("Vuelo no existe".to_string()))?;
        if status != "SCHEDULED" {
            return Err(CoreError::Conflict(
                "Vuelo no disponible para compra".to_string(),
            ));
        }
        if sync_paired {
            if let Some(pid) = paired {
                let pstatus: Option<(String,)> =
                    sqlx::query_as("SELECT status FROM flights WHERE id = $1 FOR UPDATE")
                        .bind(pid)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(db_err)?;
                let (pstatus,) =
                    pstatus.ok_or_else(|| CoreError::NotFound("Vuelo no existe".to_string()))?;
                if pstatus != "SCHEDULED" {
                    return Err(CoreError::Conflict(
                        "Vuelo no disponible para compra".to_string(),
                    ));
                }
                targets.push(pid);
            }
        }

        for target in targets {
            let price: Option<i64> = sqlx::query_scalar(
                "SELECT price_cents FROM flight_fare_classes
                 WHERE flight_id = $1 AND class_id = $2",
            )
            .bind(target)
            .bind(fare_class_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
            let price = price.ok_or_else(|| {
                CoreError::Validation("Clase no disponible para esta salida".to_string())
            })?;
            sqlx::query(
                "INSERT INTO cart_items (id, user_id, flight_id, fare_class_id, quantity, unit_price_cents)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (user_id, flight_id, fare_class_id)
                 DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity",
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(target)
            .bind(fare_class_id)
            .bind(quantity)
            .bind(price)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)
    }

    async fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
        sync_paired: bool,
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let updated: Option<(Uuid, i32)> = sqlx::query_as(
            "UPDATE cart_items SET quantity = $3
             WHERE id = $1 AND user_id = $2
             RETURNING flight_id, fare_class_id",
        )
        .bind(item_id)
        .bind(user_id)
        .bind(quantity)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        let (flight_id, class_id) =
            updated.ok_or_else(|| CoreError::NotFound("Item no encontrado.".to_string()))?;

        if sync_paired {
            sqlx::query(
                "UPDATE cart_items SET quantity = $4
                 WHERE user_id = $1 AND fare_class_id = $2
                   AND flight_id = (SELECT paired_flight_id FROM flights WHERE id = $3)",
            )
            .bind(user_id)
            .bind(class_id)
            .bind(flight_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)
    }

    async fn remove_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        sync_paired: bool,
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let removed: Option<(Uuid, i32)> = sqlx::query_as(
            "DELETE FROM cart_items WHERE id = $1 AND user_id = $2
             RETURNING flight_id, fare_class_id",
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        let (flight_id, class_id) =
            removed.ok_or_else(|| CoreError::NotFound("Item no encontrado.".to_string()))?;

        if sync_paired {
            sqlx::query(
                "DELETE FROM cart_items
                 WHERE user_id = $1 AND fare_class_id = $2
                   AND flight_id = (SELECT paired_flight_id FROM flights WHERE id = $3)",
            )
            .bind(user_id)
            .bind(class_id)
            .bind(flight_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)
    }
}

#[async_trait]
impl FlightStore for PgStore {
    async fn create(&self, spec: &FlightSpec) -> CoreResult<Flight> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO flights (id, code, origin_city, origin_country, destination_city,
                                  destination_country, depart_at, arrive_at, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'SCHEDULED')",
        )
        .bind(id)
        .bind(&spec.code)
        .bind(&spec.route.origin_city)
        .bind(&spec.route.origin_country)
        .bind(&spec.route.destination_city)
        .bind(&spec.route.destination_country)
        .bind(spec.depart_at)
        .bind(spec.arrive_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        Self::replace_fare_classes(&mut tx, id, &spec.fare_classes).await?;

        for (position, layover) in spec.layovers.iter().enumerate() {
            sqlx::query(
                "INSERT INTO flight_layovers (flight_id, position, city, country, minutes)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(id)
            .bind(position as i32)
            .bind(&layover.city)
            .bind(&layover.country)
            .bind(layover.minutes)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        self.load_flight(id)
            .await?
            .ok_or_else(|| CoreError::internal("vuelo creado pero no recuperable"))
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Flight>> {
        self.load_flight(id).await
    }

    async fn list(&self) -> CoreResult<Vec<Flight>> {
        let rows: Vec<FlightRow> =
            sqlx::query_as("SELECT * FROM flights ORDER BY depart_at")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        let mut flights = Vec::with_capacity(rows.len());
        for row in rows {
            flights.push(self.hydrate_flight(row).await?);
        }
        Ok(flights)
    }

    async fn apply_schedule(&self, id: Uuid, update: &ScheduleUpdate) -> CoreResult<Flight> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM flights WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let status =
            status.ok_or_else(|| CoreError::NotFound("Vuelo no encontrado".to_string()))?;
        if status != "SCHEDULED" {
            return Err(CoreError::Conflict(
                "El vuelo está cancelado y no admite cambios.".to_string(),
            ));
        }

        sqlx::query("UPDATE flights SET code = $2, depart_at = $3, arrive_at = $4 WHERE id = $1")
            .bind(id)
            .bind(&update.code)
            .bind(update.depart_at)
            .bind(update.arrive_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        Self::replace_fare_classes(&mut tx, id, &update.fare_classes).await?;
        tx.commit().await.map_err(db_err)?;

        self.load_flight(id)
            .await?
            .ok_or_else(|| CoreError::internal("vuelo actualizado pero no recuperable"))
    }

    async fn set_cancelled(&self, id: Uuid) -> CoreResult<Flight> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM flights WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let status =
            status.ok_or_else(|| CoreError::NotFound("Vuelo no encontrado".to_string()))?;
        if status != "SCHEDULED" {
            return Err(CoreError::Conflict("El vuelo ya está cancelado.".to_string()));
        }

        sqlx::query("UPDATE flights SET status = 'CANCELLED' WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        self.load_flight(id)
            .await?
            .ok_or_else(|| CoreError::internal("vuelo cancelado pero no recuperable"))
    }

    async fn link_pair(&self, outbound_id: Uuid, return_id: Uuid) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let rows: Vec<(Uuid, Option<Uuid>, String)> = sqlx::query_as(
            "SELECT id, paired_flight_id, status FROM flights WHERE id = ANY($1) FOR UPDATE",
        )
        .bind(vec![outbound_id, return_id])
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;
        if rows.len() != 2 {
            return Err(CoreError::NotFound("Vuelo no encontrado".to_string()));
        }
        if rows.iter().any(|(_, _, status)| status == "CANCELLED") {
            return Err(CoreError::Conflict(
                "Los vuelos no pueden estar cancelados".to_string(),
            ));
        }
        if rows.iter().any(|(_, paired, _)| paired.is_some()) {
            return Err(CoreError::Conflict(
                "El vuelo ya tiene pareja asignada.".to_string(),
            ));
        }

        sqlx::query("UPDATE flights SET paired_flight_id = $2 WHERE id = $1")
            .bind(outbound_id)
            .bind(return_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("UPDATE flights SET paired_flight_id = $2 WHERE id = $1")
            .bind(return_id)
            .bind(outbound_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)
    }

    async fn unlink_pair(&self, id: Uuid) -> CoreResult<()> {
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM flights WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        if exists.is_none() {
            return Err(CoreError::NotFound("Vuelo no encontrado".to_string()));
        }
        sqlx::query(
            "UPDATE flights SET paired_flight_id = NULL
             WHERE id = $1 OR paired_flight_id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn reservees(&self, flight_id: Uuid) -> CoreResult<Vec<Reservee>> {
        let rows: Vec<AccountRow> = sqlx::query_as(
            "SELECT DISTINCT a.*
             FROM reservations r
             JOIN reservation_items ri ON ri.reservation_id = r.id
             JOIN accounts a ON a.id = r.owner_user_id
             WHERE ri.flight_id = $1 AND r.state <> 'CANCELLED' AND a.enabled",
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let account = r.into_account();
                Reservee {
                    user_id: account.id,
                    email: account.email.clone(),
                    full_name: account.full_name(),
                }
            })
            .collect())
    }
}

#[async_trait]
impl ReservationStore for PgStore {
    async fn checkout(
        &self,
        cart_owner_id: Uuid,
        reservation_owner_id: Uuid,
    ) -> CoreResult<Reservation> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let rows: Vec<CartJoinRow> =
            sqlx::query_as(&format!("{CART_JOIN_SQL} FOR UPDATE OF ci"))
                .bind(cart_owner_id)
                .fetch_all(&mut *tx)
                .await
                .map_err(db_err)?;
        if rows.is_empty() {
            return Err(CoreError::Validation(
                "El carrito está vacío o ya fue procesado.".to_string(),
            ));
        }

        let items: Vec<ReservationItem> = rows
            .iter()
            .map(|r| ReservationItem {
                flight_id: r.flight_id,
                flight_code: r.flight_code.clone(),
                fare_class_id: r.fare_class_id,
                class_name: r.class_name.clone(),
                depart_at: r.depart_at,
                arrive_at: r.arrive_at,
                origin: r.origin.clone(),
                destination: r.destination.clone(),
                return_code: r.return_code.clone(),
                quantity: r.quantity,
                unit_price_cents: r.unit_price_cents,
                subtotal_cents: i64::from(r.quantity) * r.unit_price_cents,
            })
            .collect();

        let reservation = Reservation {
            id: Uuid::new_v4(),
            owner_user_id: reservation_owner_id,
            code: new_reservation_code(),
            state: ReservationState::Confirmed,
            total_cents: items.iter().map(|i| i.subtotal_cents).sum(),
            created_at: Utc::now(),
            items,
        };

        sqlx::query(
            "INSERT INTO reservations (id, owner_user_id, code, state, total_cents, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(reservation.id)
        .bind(reservation.owner_user_id)
        .bind(&reservation.code)
        .bind(state_to_str(reservation.state))
        .bind(reservation.total_cents)
        .bind(reservation.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for item in &reservation.items {
            sqlx::query(
                "INSERT INTO reservation_items
                     (id, reservation_id, flight_id, flight_code, fare_class_id, class_name,
                      depart_at, arrive_at, origin, destination, return_code,
                      quantity, unit_price_cents, subtotal_cents)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            )
            .bind(Uuid::new_v4())
            .bind(reservation.id)
            .bind(item.flight_id)
            .bind(&item.flight_code)
            .bind(item.fare_class_id)
            .bind(&item.class_name)
            .bind(item.depart_at)
            .bind(item.arrive_at)
            .bind(&item.origin)
            .bind(&item.destination)
            .bind(&item.return_code)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.subtotal_cents)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(cart_owner_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(reservation)
    }

    async fn get_detail(&self, id: Uuid) -> CoreResult<Option<ReservationDetail>> {
        let row: Option<ReservationRow> =
            sqlx::query_as("SELECT * FROM reservations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let item_rows: Vec<ReservationItemRow> = sqlx::query_as(
            "SELECT flight_id, flight_code, fare_class_id, class_name, depart_at, arrive_at,
                    origin, destination, return_code, quantity, unit_price_cents, subtotal_cents
             FROM reservation_items WHERE reservation_id = $1 ORDER BY depart_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let owner: Option<AccountRow> =
            sqlx::query_as("SELECT * FROM accounts WHERE id = $1")
                .bind(row.owner_user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        let (buyer_name, buyer_email) = match owner {
            Some(a) => {
                let account = a.into_account();
                (account.full_name(), account.email)
            }
            None => ("cliente".to_string(), String::new()),
        };

        Ok(Some(ReservationDetail {
            reservation: Reservation {
                id: row.id,
                owner_user_id: row.owner_user_id,
                code: row.code,
                state: state_from_str(&row.state)?,
                total_cents: row.total_cents,
                created_at: row.created_at,
                items: item_rows.into_iter().map(ReservationItemRow::into_item).collect(),
            },
            buyer_name,
            buyer_email,
        }))
    }

    async fn list_by_user(&self, user_id: Uuid) -> CoreResult<Vec<ReservationSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            "SELECT r.id, r.owner_user_id, COALESCE(a.email, '') AS buyer_email,
                    r.code, r.state, r.total_cents, r.created_at
             FROM reservations r
             LEFT JOIN accounts a ON a.id = r.owner_user_id
             WHERE r.owner_user_id = $1
             ORDER BY r.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(SummaryRow::into_summary).collect()
    }

    async fn cancel(&self, id: Uuid) -> CoreResult<ReservationState> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let state: Option<String> =
            sqlx::query_scalar("SELECT state FROM reservations WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let state =
            state.ok_or_else(|| CoreError::NotFound("Reserva no encontrada.".to_string()))?;
        if !state_from_str(&state)?.is_cancellable() {
            return Err(CoreError::Conflict(
                "La reserva no está en estado cancelable.".to_string(),
            ));
        }

        sqlx::query("UPDATE reservations SET state = 'CANCELLED' WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(ReservationState::Cancelled)
    }

    async fn record_agency_link(&self, link: &AgencyReservationLink) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO agency_reservation_links (reservation_id, agency_user_id)
             VALUES ($1, $2)
             ON CONFLICT (reservation_id)
             DO UPDATE SET agency_user_id = EXCLUDED.agency_user_id",
        )
        .bind(link.reservation_id)
        .bind(link.agency_user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_foreign_key_violation() {
                    return CoreError::NotFound("Reserva no encontrada.".to_string());
                }
            }
            db_err(e)
        })?;
        Ok(())
    }

    async fn list_filtered(
        &self,
        filter: &ReservationFilter,
    ) -> CoreResult<Vec<ReservationSummary>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT r.id, r.owner_user_id, COALESCE(a.email, '') AS buyer_email, \
                    r.code, r.state, r.total_cents, r.created_at \
             FROM reservations r \
             LEFT JOIN accounts a ON a.id = r.owner_user_id \
             WHERE 1 = 1",
        );
        if let Some(uid) = filter.user_id {
            qb.push(" AND r.owner_user_id = ").push_bind(uid);
        }
        if let Some(email) = &filter.email {
            qb.push(" AND a.email = ").push_bind(normalize_email(email));
        }
        if let Some(code) = &filter.code {
            qb.push(" AND UPPER(r.code) = UPPER(")
                .push_bind(code.clone())
                .push(")");
        }
        if let Some(fid) = filter.flight_id {
            qb.push(
                " AND EXISTS (SELECT 1 FROM reservation_items ri \
                  WHERE ri.reservation_id = r.id AND ri.flight_id = ",
            )
            .push_bind(fid)
            .push(")");
        }
        if let Some(fcode) = &filter.flight_code {
            qb.push(
                " AND EXISTS (SELECT 1 FROM reservation_items ri \
                  WHERE ri.reservation_id = r.id AND UPPER(ri.flight_code) = UPPER(",
            )
            .push_bind(fcode.clone())
            .push("))");
        }
        if let Some(from) = filter.created_from {
            qb.push(" AND r.created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.created_to {
            qb.push(" AND r.created_at <= ").push_bind(to);
        }
        if let Some(state) = filter.state {
            qb.push(" AND r.state = ").push_bind(state_to_str(state));
        }
        qb.push(" ORDER BY r.created_at DESC");

        let rows: Vec<SummaryRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(SummaryRow::into_summary).collect()
    }

    async fn stats(&self) -> CoreResult<BookingStats> {
        let (total, pending, confirmed, cancelled, revenue): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                "SELECT COUNT(*),
                        COUNT(*) FILTER (WHERE state = 'PENDING'),
                        COUNT(*) FILTER (WHERE state = 'CONFIRMED'),
                        COUNT(*) FILTER (WHERE state = 'CANCELLED'),
                        COALESCE(SUM(total_cents) FILTER (WHERE state <> 'CANCELLED'), 0)::bigint
                 FROM reservations",
            )
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let (scheduled, flights_cancelled): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE status = 'SCHEDULED'),
                    COUNT(*) FILTER (WHERE status = 'CANCELLED')
             FROM flights",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(BookingStats {
            reservations_total: total as u64,
            reservations_pending: pending as u64,
            reservations_confirmed: confirmed as u64,
            reservations_cancelled: cancelled as u64,
            revenue_cents: revenue,
            flights_scheduled: scheduled as u64,
            flights_cancelled: flights_cancelled as u64,
        })
    }
}
