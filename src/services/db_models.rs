use std::fmt::{Display, Formatter};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{Identifiable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use crate::schema::{reservations, restaurant_tables, restaurants, users};
use crate::types::slot_time;

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize)]
#[diesel(table_name = users, primary_key(user_id))]
pub struct User {
    pub user_id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize)]
#[diesel(table_name = restaurants, primary_key(restaurant_id))]
pub struct Restaurant {
    pub restaurant_id: i64,
    pub restaurant_name: String,
    pub address: String,
    pub cuisine: Option<String>,
    pub description: Option<String>,
    #[serde(with = "slot_time")]
    pub opening_time: NaiveTime,
    #[serde(with = "slot_time")]
    pub closing_time: NaiveTime,
    pub slot_minutes: i32,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Eq, Serialize)]
#[diesel(table_name = restaurant_tables, primary_key(table_id))]
pub struct RestaurantTable {
    pub table_id: i64,
    pub restaurant_id: i64,
    pub capacity: i32,
}

/// A restaurant together with its seating configuration.
#[derive(Debug, Clone, Serialize)]
pub struct RestaurantDetail {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub tables: Vec<RestaurantTable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl Display for ReservationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl ToSql<Text, Pg> for ReservationStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
    }
}

impl FromSql<Text, Pg> for ReservationStatus {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            other => Err(format!("Unknown reservation status: {other}").into()),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize)]
#[diesel(table_name = reservations, primary_key(reservation_id))]
pub struct Reservation {
    pub reservation_id: i64,
    pub reservation_code: String,
    pub user_id: i64,
    pub restaurant_id: i64,
    pub table_id: i64,
    #[serde(rename = "date")]
    pub reservation_date: NaiveDate,
    #[serde(rename = "time", with = "slot_time")]
    pub reservation_time: NaiveTime,
    pub guests: i32,
    pub status: ReservationStatus,
    pub created_at: NaiveDateTime,
}

impl Reservation {
    pub fn is_active(&self) -> bool {
        self.status != ReservationStatus::Cancelled
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationWithRestaurant {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub restaurant_name: String,
    pub address: String,
}

/// What the name-based booking endpoint hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationSummary {
    pub reservation_id: i64,
    pub restaurant_name: String,
    pub reservation_code: String,
    pub date: NaiveDate,
    #[serde(with = "slot_time")]
    pub time: NaiveTime,
    pub guests: i32,
    pub status: ReservationStatus,
}

impl ReservationSummary {
    pub fn new(reservation: &Reservation, restaurant: &Restaurant) -> Self {
        Self {
            reservation_id: reservation.reservation_id,
            restaurant_name: restaurant.restaurant_name.clone(),
            reservation_code: reservation.reservation_code.clone(),
            date: reservation.reservation_date,
            time: reservation.reservation_time,
            guests: reservation.guests,
            status: reservation.status,
        }
    }
}
