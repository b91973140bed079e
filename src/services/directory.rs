use chrono::{NaiveTime, Utc};
use diesel::{Connection, ExpressionMethods, PgConnection, QueryDsl, RunQueryDsl};
use serde::Deserialize;
use validator::Validate;

use crate::auth::{hash_password, verify_password};
use crate::services::availability::{load_tables, time_slots};
use crate::services::db_models::{
    ReservationStatus, Restaurant, RestaurantDetail, RestaurantTable, User,
};
use crate::services::insertable::{NewRestaurant, NewTable, NewUser, RestaurantChanges, UserChanges};
use crate::types::{slot_time, ServiceError};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserCreate {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableSpec {
    pub capacity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestaurantCreate {
    pub restaurant_name: String,
    pub address: String,
    pub cuisine: Option<String>,
    pub description: Option<String>,
    #[serde(with = "slot_time")]
    pub opening_time: NaiveTime,
    #[serde(with = "slot_time")]
    pub closing_time: NaiveTime,
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: i32,
    #[serde(default)]
    pub tables: Vec<TableSpec>,
}

fn default_slot_minutes() -> i32 {
    60
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestaurantUpdate {
    pub restaurant_name: Option<String>,
    pub address: Option<String>,
    pub cuisine: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "slot_time::option::deserialize")]
    pub opening_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "slot_time::option::deserialize")]
    pub closing_time: Option<NaiveTime>,
    pub slot_minutes: Option<i32>,
}

fn validate_capacity(capacity: i32) -> Result<(), ServiceError> {
    if capacity <= 0 {
        return Err(ServiceError::Validation(
            "Table capacity must be at least 1".into(),
        ));
    }
    Ok(())
}

fn validate_slot_config(
    opening: NaiveTime,
    closing: NaiveTime,
    slot_minutes: i32,
) -> Result<(), ServiceError> {
    if slot_minutes <= 0 {
        return Err(ServiceError::Validation(
            "Slot length must be a positive number of minutes".into(),
        ));
    }
    if closing <= opening {
        return Err(ServiceError::Validation(
            "Closing time must be after opening time".into(),
        ));
    }
    Ok(())
}

fn restaurant_not_found(err: diesel::result::Error) -> ServiceError {
    match err {
        diesel::result::Error::NotFound => ServiceError::not_found("Restaurant"),
        other => other.into(),
    }
}

fn user_not_found(err: diesel::result::Error) -> ServiceError {
    match err {
        diesel::result::Error::NotFound => ServiceError::not_found("User"),
        other => other.into(),
    }
}

pub fn register_user(conn: &mut PgConnection, new_user: UserCreate) -> Result<User, ServiceError> {
    use crate::schema::users::dsl::{email, users};

    new_user.validate()?;
    let normalized = new_user.email.trim().to_lowercase();

    conn.transaction::<_, ServiceError, _>(|trx_conn| {
        let taken = users
            .filter(email.eq(normalized.as_str()))
            .count()
            .get_result::<i64>(trx_conn)?;
        if taken > 0 {
            return Err(ServiceError::EmailTaken);
        }

        let user = diesel::insert_into(users)
            .values(NewUser {
                email: normalized.clone(),
                hashed_password: hash_password(&new_user.password)?,
                full_name: new_user.full_name,
                phone: new_user.phone,
            })
            .get_result::<User>(trx_conn)?;

        tracing::info!(user_id = user.user_id, "registered user");
        Ok(user)
    })
}

/// `None` when the email is unknown or the password does not match.
pub fn authenticate_user(
    conn: &mut PgConnection,
    login: &str,
    password: &str,
) -> Result<Option<User>, ServiceError> {
    use crate::schema::users::dsl::{email, users};

    let normalized = login.trim().to_lowercase();
    let Some(user) = users
        .filter(email.eq(normalized.as_str()))
        .first::<User>(conn)
        .map(Some)
        .or_else(|err| match err {
            diesel::result::Error::NotFound => Ok(None),
            other => Err(other),
        })?
    else {
        return Ok(None);
    };

    if verify_password(password, &user.hashed_password)? {
        Ok(Some(user))
    } else {
        tracing::warn!(user_id = user.user_id, "password mismatch on login");
        Ok(None)
    }
}

pub fn get_user(conn: &mut PgConnection, user_pk: i64) -> Result<User, ServiceError> {
    use crate::schema::users::dsl::users;

    users.find(user_pk).first::<User>(conn).map_err(user_not_found)
}

pub fn update_user(
    conn: &mut PgConnection,
    user_pk: i64,
    changes: UserUpdate,
) -> Result<User, ServiceError> {
    use crate::schema::users::dsl::{email, user_id, users};

    changes.validate()?;

    conn.transaction::<_, ServiceError, _>(|trx_conn| {
        let current = get_user(trx_conn, user_pk)?;

        let new_email = changes.email.map(|e| e.trim().to_lowercase());
        if let Some(candidate) = new_email.as_ref().filter(|e| **e != current.email) {
            let taken = users
                .filter(email.eq(candidate.as_str()))
                .filter(user_id.ne(user_pk))
                .count()
                .get_result::<i64>(trx_conn)?;
            if taken > 0 {
                return Err(ServiceError::EmailTaken);
            }
        }

        let update = UserChanges {
            email: new_email,
            hashed_password: changes.password.as_deref().map(hash_password).transpose()?,
            full_name: changes.full_name,
            phone: changes.phone,
        };
        if update.is_empty() {
            return Ok(current);
        }

        Ok(diesel::update(users.find(user_pk))
            .set(&update)
            .get_result::<User>(trx_conn)?)
    })
}

pub fn create_restaurant(
    conn: &mut PgConnection,
    body: RestaurantCreate,
) -> Result<RestaurantDetail, ServiceError> {
    use crate::schema::restaurant_tables::dsl::restaurant_tables;
    use crate::schema::restaurants::dsl::restaurants;

    if body.restaurant_name.trim().is_empty() {
        return Err(ServiceError::Validation(
            "Restaurant name must not be empty".into(),
        ));
    }
    validate_slot_config(body.opening_time, body.closing_time, body.slot_minutes)?;
    for spec in &body.tables {
        validate_capacity(spec.capacity)?;
    }

    conn.transaction::<_, ServiceError, _>(|trx_conn| {
        let restaurant = diesel::insert_into(restaurants)
            .values(NewRestaurant {
                restaurant_name: body.restaurant_name.trim().to_owned(),
                address: body.address,
                cuisine: body.cuisine,
                description: body.description,
                opening_time: body.opening_time,
                closing_time: body.closing_time,
                slot_minutes: body.slot_minutes,
            })
            .get_result::<Restaurant>(trx_conn)?;

        let new_tables: Vec<NewTable> = body
            .tables
            .iter()
            .map(|spec| NewTable {
                restaurant_id: restaurant.restaurant_id,
                capacity: spec.capacity,
            })
            .collect();

        let tables = if new_tables.is_empty() {
            vec![]
        } else {
            diesel::insert_into(restaurant_tables)
                .values(&new_tables)
                .get_results::<RestaurantTable>(trx_conn)?
        };

        tracing::info!(
            restaurant_id = restaurant.restaurant_id,
            tables = tables.len(),
            "created restaurant"
        );
        Ok(RestaurantDetail { restaurant, tables })
    })
}

pub fn list_restaurants(
    conn: &mut PgConnection,
    skip: i64,
    limit: i64,
) -> Result<Vec<Restaurant>, ServiceError> {
    use crate::schema::restaurants::dsl::{restaurant_id, restaurants};

    Ok(restaurants
        .order(restaurant_id.asc())
        .offset(skip.max(0))
        .limit(limit.clamp(0, 500))
        .get_results::<Restaurant>(conn)?)
}

pub fn get_restaurant(
    conn: &mut PgConnection,
    restaurant_pk: i64,
) -> Result<RestaurantDetail, ServiceError> {
    use crate::schema::restaurants::dsl::restaurants;

    let restaurant = restaurants
        .find(restaurant_pk)
        .first::<Restaurant>(conn)
        .map_err(restaurant_not_found)?;
    let tables = load_tables(conn, restaurant_pk)?;

    Ok(RestaurantDetail { restaurant, tables })
}

pub fn update_restaurant(
    conn: &mut PgConnection,
    restaurant_pk: i64,
    body: RestaurantUpdate,
) -> Result<RestaurantDetail, ServiceError> {
    use crate::schema::restaurants::dsl::restaurants;

    conn.transaction::<_, ServiceError, _>(|trx_conn| {
        let current = restaurants
            .find(restaurant_pk)
            .for_update()
            .get_result::<Restaurant>(trx_conn)
            .map_err(restaurant_not_found)?;

        let opening = body.opening_time.unwrap_or(current.opening_time);
        let closing = body.closing_time.unwrap_or(current.closing_time);
        let minutes = body.slot_minutes.unwrap_or(current.slot_minutes);
        validate_slot_config(opening, closing, minutes)?;
        if (opening, closing, minutes)
            != (current.opening_time, current.closing_time, current.slot_minutes)
        {
            ensure_bookings_fit_grid(trx_conn, restaurant_pk, &time_slots(opening, closing, minutes))?;
        }

        let changes = RestaurantChanges {
            restaurant_name: body.restaurant_name.map(|n| n.trim().to_owned()),
            address: body.address,
            cuisine: body.cuisine,
            description: body.description,
            opening_time: body.opening_time,
            closing_time: body.closing_time,
            slot_minutes: body.slot_minutes,
        };

        let restaurant = if changes.is_empty() {
            current
        } else {
            diesel::update(restaurants.find(restaurant_pk))
                .set(&changes)
                .get_result::<Restaurant>(trx_conn)?
        };
        let tables = load_tables(trx_conn, restaurant_pk)?;

        Ok(RestaurantDetail { restaurant, tables })
    })
}

/// Upcoming confirmed reservations must all start on a slot of `grid`.
fn ensure_bookings_fit_grid(
    conn: &mut PgConnection,
    restaurant_pk: i64,
    grid: &[NaiveTime],
) -> Result<(), ServiceError> {
    use crate::schema::reservations::dsl::{
        reservation_date, reservation_time, reservations, restaurant_id, status,
    };

    let booked = reservations
        .filter(restaurant_id.eq(restaurant_pk))
        .filter(status.ne(ReservationStatus::Cancelled))
        .filter(reservation_date.ge(Utc::now().date_naive()))
        .select(reservation_time)
        .distinct()
        .get_results::<NaiveTime>(conn)?;

    let stranded = booked.iter().filter(|time| !grid.contains(*time)).count();
    if stranded > 0 {
        return Err(ServiceError::InvalidState(format!(
            "{stranded} booked time slot(s) would fall outside the new schedule"
        )));
    }
    Ok(())
}

pub fn add_table(
    conn: &mut PgConnection,
    restaurant_pk: i64,
    spec: TableSpec,
) -> Result<RestaurantTable, ServiceError> {
    use crate::schema::restaurant_tables::dsl::restaurant_tables;
    use crate::schema::restaurants::dsl::restaurants;

    validate_capacity(spec.capacity)?;

    conn.transaction::<_, ServiceError, _>(|trx_conn| {
        restaurants
            .find(restaurant_pk)
            .for_update()
            .get_result::<Restaurant>(trx_conn)
            .map_err(restaurant_not_found)?;

        Ok(diesel::insert_into(restaurant_tables)
            .values(NewTable {
                restaurant_id: restaurant_pk,
                capacity: spec.capacity,
            })
            .get_result::<RestaurantTable>(trx_conn)?)
    })
}

/// Refuses while confirmed reservations exist; otherwise drops the restaurant,
/// its tables and its cancelled reservations together.
pub fn delete_restaurant(conn: &mut PgConnection, restaurant_pk: i64) -> Result<(), ServiceError> {
    use crate::schema::reservations::dsl as res;
    use crate::schema::restaurant_tables::dsl as tbl;
    use crate::schema::restaurants::dsl::restaurants;

    conn.transaction::<_, ServiceError, _>(|trx_conn| {
        restaurants
            .find(restaurant_pk)
            .for_update()
            .get_result::<Restaurant>(trx_conn)
            .map_err(restaurant_not_found)?;

        let live = res::reservations
            .filter(res::restaurant_id.eq(restaurant_pk))
            .filter(res::status.ne(ReservationStatus::Cancelled))
            .count()
            .get_result::<i64>(trx_conn)?;
        if live > 0 {
            return Err(ServiceError::InvalidState(format!(
                "Restaurant still has {live} active reservation(s)"
            )));
        }

        diesel::delete(res::reservations.filter(res::restaurant_id.eq(restaurant_pk)))
            .execute(trx_conn)?;
        diesel::delete(tbl::restaurant_tables.filter(tbl::restaurant_id.eq(restaurant_pk)))
            .execute(trx_conn)?;
        diesel::delete(restaurants.find(restaurant_pk)).execute(trx_conn)?;

        tracing::info!(restaurant_id = restaurant_pk, "deleted restaurant");
        Ok(())
    })
}
