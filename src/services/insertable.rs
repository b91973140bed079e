use chrono::{NaiveDate, NaiveTime};
use diesel::{AsChangeset, Insertable};

use crate::schema::{reservations, restaurant_tables, restaurants, users};
use crate::services::db_models::ReservationStatus;

#[derive(Insertable, Clone)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(AsChangeset, Default, Clone)]
#[diesel(table_name = users)]
pub struct UserChanges {
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.hashed_password.is_none()
            && self.full_name.is_none()
            && self.phone.is_none()
    }
}

#[derive(Insertable, Clone)]
#[diesel(table_name = restaurants)]
pub struct NewRestaurant {
    pub restaurant_name: String,
    pub address: String,
    pub cuisine: Option<String>,
    pub description: Option<String>,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    pub slot_minutes: i32,
}

#[derive(AsChangeset, Default, Clone)]
#[diesel(table_name = restaurants)]
pub struct RestaurantChanges {
    pub restaurant_name: Option<String>,
    pub address: Option<String>,
    pub cuisine: Option<String>,
    pub description: Option<String>,
    pub opening_time: Option<NaiveTime>,
    pub closing_time: Option<NaiveTime>,
    pub slot_minutes: Option<i32>,
}

impl RestaurantChanges {
    pub fn is_empty(&self) -> bool {
        self.restaurant_name.is_none()
            && self.address.is_none()
            && self.cuisine.is_none()
            && self.description.is_none()
            && self.opening_time.is_none()
            && self.closing_time.is_none()
            && self.slot_minutes.is_none()
    }
}

#[derive(Insertable, Clone)]
#[diesel(table_name = restaurant_tables)]
pub struct NewTable {
    pub restaurant_id: i64,
    pub capacity: i32,
}

#[derive(Insertable, Clone)]
#[diesel(table_name = reservations)]
pub struct NewReservation {
    pub reservation_code: String,
    pub user_id: i64,
    pub restaurant_id: i64,
    pub table_id: i64,
    pub reservation_date: NaiveDate,
    pub reservation_time: NaiveTime,
    pub guests: i32,
    pub status: ReservationStatus,
}
