use std::collections::BTreeMap;

use actix::Message;
use chrono::{NaiveDate, NaiveTime};

use crate::auth::Actor;
use crate::services::db_models::{
    Reservation, Restaurant, RestaurantDetail, RestaurantTable, ReservationWithRestaurant, User,
};
use crate::services::directory::{RestaurantCreate, RestaurantUpdate, TableSpec, UserCreate, UserUpdate};
use crate::services::reservations::{ReservationUpdate, RestaurantRef, SlotRequest};
use crate::types::ServiceError;

#[derive(Message)]
#[rtype(result = "Result<User, ServiceError>")]
pub struct RegisterUser(pub UserCreate);

#[derive(Message)]
#[rtype(result = "Result<Option<User>, ServiceError>")]
pub struct AuthenticateUser {
    pub email: String,
    pub password: String,
}

#[derive(Message)]
#[rtype(result = "Result<User, ServiceError>")]
pub struct FetchUser(pub i64);

#[derive(Message)]
#[rtype(result = "Result<User, ServiceError>")]
pub struct UpdateUser {
    pub user_id: i64,
    pub changes: UserUpdate,
}

#[derive(Message)]
#[rtype(result = "Result<RestaurantDetail, ServiceError>")]
pub struct CreateRestaurant(pub RestaurantCreate);

#[derive(Message)]
#[rtype(result = "Result<Vec<Restaurant>, ServiceError>")]
pub struct FetchRestaurants {
    pub skip: i64,
    pub limit: i64,
}

#[derive(Message)]
#[rtype(result = "Result<RestaurantDetail, ServiceError>")]
pub struct FetchRestaurant(pub i64);

#[derive(Message)]
#[rtype(result = "Result<RestaurantDetail, ServiceError>")]
pub struct UpdateRestaurant {
    pub restaurant_id: i64,
    pub changes: RestaurantUpdate,
}

#[derive(Message)]
#[rtype(result = "Result<RestaurantTable, ServiceError>")]
pub struct AddTable {
    pub restaurant_id: i64,
    pub spec: TableSpec,
}

#[derive(Message)]
#[rtype(result = "Result<(), ServiceError>")]
pub struct DeleteRestaurant(pub i64);

#[derive(Message)]
#[rtype(result = "Result<BTreeMap<String, usize>, ServiceError>")]
pub struct FetchAvailability {
    pub restaurant_id: i64,
    pub date: NaiveDate,
    pub party_size: i32,
}

#[derive(Message)]
#[rtype(result = "Result<bool, ServiceError>")]
pub struct CheckCapacity {
    pub restaurant_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: i32,
}

#[derive(Message)]
#[rtype(result = "Result<(Reservation, Restaurant), ServiceError>")]
pub struct CreateReservation {
    pub restaurant: RestaurantRef,
    pub request: SlotRequest,
    pub actor: Actor,
}

#[derive(Message)]
#[rtype(result = "Result<Reservation, ServiceError>")]
pub struct UpdateReservation {
    pub reservation_id: i64,
    pub changes: ReservationUpdate,
    pub actor: Actor,
}

#[derive(Message)]
#[rtype(result = "Result<Reservation, ServiceError>")]
pub struct CancelReservation {
    pub reservation_id: i64,
    pub actor: Actor,
}

#[derive(Message)]
#[rtype(result = "Result<Vec<ReservationWithRestaurant>, ServiceError>")]
pub struct FetchUserReservations {
    pub user_id: i64,
    /// Privileged lookups report unknown users instead of an empty list.
    pub require_user: bool,
}

#[derive(Message)]
#[rtype(result = "Result<Vec<Reservation>, ServiceError>")]
pub struct FetchAllReservations;

#[derive(Message)]
#[rtype(result = "Result<Vec<Reservation>, ServiceError>")]
pub struct FetchRestaurantReservations {
    pub restaurant_id: i64,
    pub date: Option<NaiveDate>,
}
