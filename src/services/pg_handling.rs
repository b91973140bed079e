use std::collections::BTreeMap;

use actix::Handler;

use crate::services::availability::{availability, has_capacity};
use crate::services::db_models::{
    Reservation, ReservationWithRestaurant, Restaurant, RestaurantDetail, RestaurantTable, User,
};
use crate::services::db_utils::PgActor;
use crate::services::directory;
use crate::services::messages::{
    AddTable, AuthenticateUser, CancelReservation, CheckCapacity, CreateReservation, CreateRestaurant,
    DeleteRestaurant, FetchAllReservations, FetchAvailability, FetchRestaurant,
    FetchRestaurantReservations, FetchRestaurants, FetchUser, FetchUserReservations, RegisterUser,
    UpdateReservation, UpdateRestaurant, UpdateUser,
};
use crate::services::reservations;
use crate::types::ServiceError;

impl Handler<RegisterUser> for PgActor {
    type Result = Result<User, ServiceError>;

    fn handle(&mut self, msg: RegisterUser, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        directory::register_user(&mut conn, msg.0)
    }
}

impl Handler<AuthenticateUser> for PgActor {
    type Result = Result<Option<User>, ServiceError>;

    fn handle(&mut self, msg: AuthenticateUser, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        directory::authenticate_user(&mut conn, &msg.email, &msg.password)
    }
}

impl Handler<FetchUser> for PgActor {
    type Result = Result<User, ServiceError>;

    fn handle(&mut self, msg: FetchUser, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        directory::get_user(&mut conn, msg.0)
    }
}

impl Handler<UpdateUser> for PgActor {
    type Result = Result<User, ServiceError>;

    fn handle(&mut self, msg: UpdateUser, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        directory::update_user(&mut conn, msg.user_id, msg.changes)
    }
}

impl Handler<CreateRestaurant> for PgActor {
    type Result = Result<RestaurantDetail, ServiceError>;

    fn handle(&mut self, msg: CreateRestaurant, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        directory::create_restaurant(&mut conn, msg.0)
    }
}

impl Handler<FetchRestaurants> for PgActor {
    type Result = Result<Vec<Restaurant>, ServiceError>;

    fn handle(&mut self, msg: FetchRestaurants, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        directory::list_restaurants(&mut conn, msg.skip, msg.limit)
    }
}

impl Handler<FetchRestaurant> for PgActor {
    type Result = Result<RestaurantDetail, ServiceError>;

    fn handle(&mut self, msg: FetchRestaurant, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        directory::get_restaurant(&mut conn, msg.0)
    }
}

impl Handler<UpdateRestaurant> for PgActor {
    type Result = Result<RestaurantDetail, ServiceError>;

    fn handle(&mut self, msg: UpdateRestaurant, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        directory::update_restaurant(&mut conn, msg.restaurant_id, msg.changes)
    }
}

impl Handler<AddTable> for PgActor {
    type Result = Result<RestaurantTable, ServiceError>;

    fn handle(&mut self, msg: AddTable, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        directory::add_table(&mut conn, msg.restaurant_id, msg.spec)
    }
}

impl Handler<DeleteRestaurant> for PgActor {
    type Result = Result<(), ServiceError>;

    fn handle(&mut self, msg: DeleteRestaurant, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        directory::delete_restaurant(&mut conn, msg.0)
    }
}

impl Handler<FetchAvailability> for PgActor {
    type Result = Result<BTreeMap<String, usize>, ServiceError>;

    fn handle(&mut self, msg: FetchAvailability, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        availability(&mut conn, msg.restaurant_id, msg.date, msg.party_size)
    }
}

impl Handler<CheckCapacity> for PgActor {
    type Result = Result<bool, ServiceError>;

    fn handle(&mut self, msg: CheckCapacity, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        has_capacity(&mut conn, msg.restaurant_id, msg.date, msg.time, msg.party_size)
    }
}

impl Handler<CreateReservation> for PgActor {
    type Result = Result<(Reservation, Restaurant), ServiceError>;

    fn handle(&mut self, msg: CreateReservation, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        reservations::create(&mut conn, &msg.restaurant, msg.request, msg.actor)
    }
}

impl Handler<UpdateReservation> for PgActor {
    type Result = Result<Reservation, ServiceError>;

    fn handle(&mut self, msg: UpdateReservation, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        reservations::update(&mut conn, msg.reservation_id, &msg.changes, msg.actor)
    }
}

impl Handler<CancelReservation> for PgActor {
    type Result = Result<Reservation, ServiceError>;

    fn handle(&mut self, msg: CancelReservation, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        reservations::cancel(&mut conn, msg.reservation_id, msg.actor)
    }
}

impl Handler<FetchUserReservations> for PgActor {
    type Result = Result<Vec<ReservationWithRestaurant>, ServiceError>;

    fn handle(&mut self, msg: FetchUserReservations, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        if msg.require_user {
            directory::get_user(&mut conn, msg.user_id)?;
        }
        reservations::list_for_user(&mut conn, msg.user_id)
    }
}

impl Handler<FetchAllReservations> for PgActor {
    type Result = Result<Vec<Reservation>, ServiceError>;

    fn handle(&mut self, _msg: FetchAllReservations, _ctx: &mut Self::Context) -> Self::Result {
        let mut conn = self.connection()?;

        reservations::list_all(&mut conn)
    }
}

impl Handler<FetchRestaurantReservations> for PgActor {
    type Result = Result<Vec<Reservation>, ServiceError>;

    fn handle(
        &mut self,
        msg: FetchRestaurantReservations,
        _ctx: &mut Self::Context,
    ) -> Self::Result {
        let mut conn = self.connection()?;

        reservations::list_for_restaurant(&mut conn, msg.restaurant_id, msg.date)
    }
}
