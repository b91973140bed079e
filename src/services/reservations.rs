//! Reservation lifecycle: create, update, cancel and listings.
//!
//! Every mutation locks the restaurant row for the length of its transaction
//! so that the availability check and the write cannot interleave with
//! another booking for the same restaurant.

use chrono::{NaiveDate, NaiveTime};
use diesel::{Connection, ExpressionMethods, PgConnection, QueryDsl, RunQueryDsl};
use rand::Rng;
use serde::Deserialize;

use crate::auth::Actor;
use crate::services::availability::{
    load_bookings, load_tables, occupied_at, pick_table, restaurant_slots, validate_party_size,
};
use crate::services::db_models::{
    Reservation, ReservationStatus, ReservationWithRestaurant, Restaurant,
};
use crate::services::insertable::NewReservation;
use crate::types::{slot_time, ServiceError};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 8;
const CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestaurantRef {
    Id(i64),
    Name(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationCreate {
    pub restaurant_id: i64,
    pub date: NaiveDate,
    #[serde(with = "slot_time")]
    pub time: NaiveTime,
    pub guests: i32,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleReservationCreate {
    pub restaurant_name: String,
    pub date: NaiveDate,
    #[serde(with = "slot_time")]
    pub time: NaiveTime,
    pub guests: i32,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationUpdate {
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "slot_time::option::deserialize")]
    pub time: Option<NaiveTime>,
    pub guests: Option<i32>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRequest {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub guests: i32,
}

pub fn generate_reservation_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn fresh_code(conn: &mut PgConnection) -> Result<String, ServiceError> {
    use crate::schema::reservations::dsl::{reservation_code, reservations};

    for _ in 0..CODE_ATTEMPTS {
        let code = generate_reservation_code();
        let clashes = reservations
            .filter(reservation_code.eq(code.as_str()))
            .count()
            .get_result::<i64>(conn)?;
        if clashes == 0 {
            return Ok(code);
        }
    }

    Err(ServiceError::Internal(
        "Could not generate a unique reservation code".into(),
    ))
}

/// Exact name match; more than one hit is reported instead of guessed.
pub fn resolve_restaurant(
    conn: &mut PgConnection,
    reference: &RestaurantRef,
) -> Result<Restaurant, ServiceError> {
    use crate::schema::restaurants::dsl::{restaurant_id, restaurant_name, restaurants};

    match reference {
        RestaurantRef::Id(pk) => restaurants
            .find(*pk)
            .first::<Restaurant>(conn)
            .map_err(|err| match err {
                diesel::result::Error::NotFound => ServiceError::not_found("Restaurant"),
                other => other.into(),
            }),
        RestaurantRef::Name(name) => {
            let mut matches = restaurants
                .filter(restaurant_name.eq(name.trim()))
                .order(restaurant_id.asc())
                .limit(2)
                .get_results::<Restaurant>(conn)?;

            match matches.len() {
                0 => Err(ServiceError::NotFound(format!(
                    "No restaurant named '{}'",
                    name.trim()
                ))),
                1 => Ok(matches.remove(0)),
                _ => Err(ServiceError::Ambiguous(format!(
                    "More than one restaurant is named '{}'",
                    name.trim()
                ))),
            }
        }
    }
}

fn lock_restaurant(conn: &mut PgConnection, restaurant_pk: i64) -> Result<Restaurant, ServiceError> {
    use crate::schema::restaurants::dsl::restaurants;

    Ok(restaurants
        .find(restaurant_pk)
        .for_update()
        .get_result::<Restaurant>(conn)?)
}

fn ensure_user_exists(conn: &mut PgConnection, user_pk: i64) -> Result<(), ServiceError> {
    use crate::schema::users::dsl::users;

    let found = users
        .find(user_pk)
        .count()
        .get_result::<i64>(conn)?;
    if found == 0 {
        return Err(ServiceError::not_found("User"));
    }
    Ok(())
}

/// Picks a table for `request` while the restaurant row is locked.
fn assign_table(
    conn: &mut PgConnection,
    restaurant: &Restaurant,
    request: SlotRequest,
    ignore: Option<i64>,
) -> Result<i64, ServiceError> {
    validate_party_size(request.guests)?;
    if !restaurant_slots(restaurant).contains(&request.time) {
        return Err(ServiceError::Validation(format!(
            "{} is not a bookable time slot",
            slot_time::format(&request.time)
        )));
    }

    let tables = load_tables(conn, restaurant.restaurant_id)?;
    let bookings = load_bookings(conn, restaurant.restaurant_id, request.date, ignore)?;
    let occupied = occupied_at(&bookings, request.time);

    pick_table(&tables, &occupied, request.guests)
        .map(|table| table.table_id)
        .ok_or(ServiceError::NoCapacity)
}

pub fn create(
    conn: &mut PgConnection,
    reference: &RestaurantRef,
    request: SlotRequest,
    actor: Actor,
) -> Result<(Reservation, Restaurant), ServiceError> {
    use crate::schema::reservations::dsl::reservations;

    validate_party_size(request.guests)?;

    conn.transaction::<_, ServiceError, _>(|trx_conn| {
        ensure_user_exists(trx_conn, actor.user_id)?;
        let found = resolve_restaurant(trx_conn, reference)?;
        let restaurant = lock_restaurant(trx_conn, found.restaurant_id)?;

        let table = assign_table(trx_conn, &restaurant, request, None)?;
        let code = fresh_code(trx_conn)?;

        let reservation = diesel::insert_into(reservations)
            .values(NewReservation {
                reservation_code: code,
                user_id: actor.user_id,
                restaurant_id: restaurant.restaurant_id,
                table_id: table,
                reservation_date: request.date,
                reservation_time: request.time,
                guests: request.guests,
                status: ReservationStatus::Confirmed,
            })
            .get_result::<Reservation>(trx_conn)?;

        tracing::info!(
            reservation_id = reservation.reservation_id,
            restaurant_id = restaurant.restaurant_id,
            table_id = table,
            user_id = actor.user_id,
            privileged = actor.privileged,
            "created reservation"
        );
        Ok((reservation, restaurant))
    })
}

const NOT_VISIBLE: &str = "Reservation not found or not owned by you";

/// Loads a reservation the actor may touch; foreign ones look absent.
fn load_visible(
    conn: &mut PgConnection,
    reservation_pk: i64,
    actor: Actor,
    lock: bool,
) -> Result<Reservation, ServiceError> {
    use crate::schema::reservations::dsl::reservations;

    let query = reservations.find(reservation_pk);
    let found = if lock {
        query.for_update().get_result::<Reservation>(conn)
    } else {
        query.get_result::<Reservation>(conn)
    };

    let reservation = found.map_err(|err| match err {
        diesel::result::Error::NotFound => ServiceError::NotFound(NOT_VISIBLE.into()),
        other => other.into(),
    })?;

    if !actor.privileged && reservation.user_id != actor.user_id {
        tracing::warn!(
            reservation_id = reservation_pk,
            user_id = actor.user_id,
            "reservation access denied"
        );
        return Err(ServiceError::NotFound(NOT_VISIBLE.into()));
    }
    Ok(reservation)
}

pub fn get(
    conn: &mut PgConnection,
    reservation_pk: i64,
    actor: Actor,
) -> Result<Reservation, ServiceError> {
    load_visible(conn, reservation_pk, actor, false)
}

pub fn update(
    conn: &mut PgConnection,
    reservation_pk: i64,
    changes: &ReservationUpdate,
    actor: Actor,
) -> Result<Reservation, ServiceError> {
    use crate::schema::reservations::dsl::{
        guests, reservation_date, reservation_time, reservations, table_id,
    };

    if actor.privileged {
        ensure_user_exists(conn, actor.user_id)?;
    }

    conn.transaction::<_, ServiceError, _>(|trx_conn| {
        // Lock order matches `create`: restaurant first, then the reservation.
        let peek = load_visible(trx_conn, reservation_pk, actor, false)?;
        let restaurant = lock_restaurant(trx_conn, peek.restaurant_id)?;
        let current = load_visible(trx_conn, reservation_pk, actor, true)?;

        if !current.is_active() {
            return Err(ServiceError::InvalidState(
                "Cancelled reservations cannot be changed".into(),
            ));
        }

        let request = SlotRequest {
            date: changes.date.unwrap_or(current.reservation_date),
            time: changes.time.unwrap_or(current.reservation_time),
            guests: changes.guests.unwrap_or(current.guests),
        };
        let table = assign_table(trx_conn, &restaurant, request, Some(reservation_pk))?;

        let updated = diesel::update(reservations.find(reservation_pk))
            .set((
                reservation_date.eq(request.date),
                reservation_time.eq(request.time),
                guests.eq(request.guests),
                table_id.eq(table),
            ))
            .get_result::<Reservation>(trx_conn)?;

        tracing::info!(
            reservation_id = reservation_pk,
            table_id = table,
            privileged = actor.privileged,
            "updated reservation"
        );
        Ok(updated)
    })
}

/// Already-cancelled reservations are rejected with `InvalidState`.
pub fn cancel(
    conn: &mut PgConnection,
    reservation_pk: i64,
    actor: Actor,
) -> Result<Reservation, ServiceError> {
    use crate::schema::reservations::dsl::{reservations, status};

    if actor.privileged {
        ensure_user_exists(conn, actor.user_id)?;
    }

    conn.transaction::<_, ServiceError, _>(|trx_conn| {
        let current = load_visible(trx_conn, reservation_pk, actor, true)?;
        if !current.is_active() {
            return Err(ServiceError::InvalidState(
                "Reservation is already cancelled".into(),
            ));
        }

        let cancelled = diesel::update(reservations.find(reservation_pk))
            .set(status.eq(ReservationStatus::Cancelled))
            .get_result::<Reservation>(trx_conn)?;

        tracing::info!(
            reservation_id = reservation_pk,
            privileged = actor.privileged,
            "cancelled reservation"
        );
        Ok(cancelled)
    })
}

pub fn list_for_user(
    conn: &mut PgConnection,
    user_pk: i64,
) -> Result<Vec<ReservationWithRestaurant>, ServiceError> {
    use crate::schema::reservations::dsl::{
        reservation_date, reservation_time, reservations, user_id,
    };
    use crate::schema::restaurants::dsl::{address, restaurant_name, restaurants};

    let rows = reservations
        .inner_join(restaurants)
        .filter(user_id.eq(user_pk))
        .order((reservation_date.asc(), reservation_time.asc()))
        .select((
            crate::schema::reservations::all_columns,
            restaurant_name,
            address,
        ))
        .get_results::<(Reservation, String, String)>(conn)?;

    Ok(rows
        .into_iter()
        .map(|(reservation, name, addr)| ReservationWithRestaurant {
            reservation,
            restaurant_name: name,
            address: addr,
        })
        .collect())
}

pub fn list_all(conn: &mut PgConnection) -> Result<Vec<Reservation>, ServiceError> {
    use crate::schema::reservations::dsl::{reservation_id, reservations};

    Ok(reservations
        .order(reservation_id.asc())
        .get_results::<Reservation>(conn)?)
}

pub fn list_for_restaurant(
    conn: &mut PgConnection,
    restaurant_pk: i64,
    date: Option<NaiveDate>,
) -> Result<Vec<Reservation>, ServiceError> {
    use crate::schema::reservations::dsl::{
        reservation_date, reservation_time, reservations, restaurant_id,
    };

    resolve_restaurant(conn, &RestaurantRef::Id(restaurant_pk))?;

    let mut query = reservations
        .filter(restaurant_id.eq(restaurant_pk))
        .order((reservation_date.asc(), reservation_time.asc()))
        .into_boxed();
    if let Some(day) = date {
        query = query.filter(reservation_date.eq(day));
    }

    Ok(query.get_results::<Reservation>(conn)?)
}
