use actix_web::{get, web, HttpResponse, Responder};

use crate::types::ServiceError;

pub mod availability;
pub mod db_models;
pub mod db_utils;
pub mod directory;
pub mod insertable;
pub mod llm_client;
pub mod messages;
pub mod pg_handling;
pub mod reservations;
#[cfg(test)]
mod test_support;

/// Request-parsing failures answer with the same `{"detail"}` body as handler errors.
pub fn extractor_errors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        ServiceError::Validation(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        ServiceError::Validation(err.to_string()).into()
    }))
    .app_data(web::FormConfig::default().error_handler(|err, _req| {
        ServiceError::Validation(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        ServiceError::Validation(err.to_string()).into()
    }));
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(home_page)
        .service(auth_route::register_user)
        .service(auth_route::login)
        .service(
            web::scope("/users")
                .service(users_route::read_me)
                .service(users_route::update_me)
                .service(users_route::read_user)
                .service(users_route::read_user_reservations),
        )
        .service(
            web::scope("/restaurants")
                .service(restaurants_route::create_restaurant)
                .service(restaurants_route::list_restaurants)
                .service(restaurants_route::get_restaurant)
                .service(restaurants_route::get_availability)
                .service(restaurants_route::update_restaurant)
                .service(restaurants_route::add_table)
                .service(restaurants_route::delete_restaurant)
                .service(restaurants_route::get_restaurant_reservations),
        )
        .service(reservations_route::create_reservation)
        .service(reservations_route::list_all_reservations)
        .service(reservations_route::book_restaurant_by_name)
        .service(reservations_route::my_reservations)
        .service(reservations_route::update_my_reservation)
        .service(reservations_route::cancel_my_reservation)
        .service(web::scope("/assistant").service(assistant_route::chat))
        .service(web::scope("/test").service(test_route::healthcheck));
}

#[get("/")]
pub async fn home_page() -> impl Responder {
    HttpResponse::Ok().body("GoodFoods reservation service")
}

// "/register", "/login"
pub mod auth_route {
    use actix_web::web::{Data, Form, Json};
    use actix_web::{post, HttpResponse};
    use serde::Deserialize;

    use crate::auth::TokenService;
    use crate::services::db_utils::AppState;
    use crate::services::directory::UserCreate;
    use crate::services::messages::{AuthenticateUser, RegisterUser};
    use crate::types::ServiceError;

    #[post("/register")]
    pub async fn register_user(
        state: Data<AppState>,
        body: Json<UserCreate>,
    ) -> Result<HttpResponse, ServiceError> {
        let user = state.pg_db.send(RegisterUser(body.into_inner())).await??;
        Ok(HttpResponse::Ok().json(user))
    }

    #[derive(Deserialize)]
    pub struct LoginForm {
        pub username: String,
        pub password: String,
    }

    #[post("/login")]
    pub async fn login(
        state: Data<AppState>,
        tokens: Data<TokenService>,
        form: Form<LoginForm>,
    ) -> Result<HttpResponse, ServiceError> {
        let LoginForm { username, password } = form.into_inner();

        let user = state
            .pg_db
            .send(AuthenticateUser {
                email: username,
                password,
            })
            .await??
            .ok_or_else(|| ServiceError::Unauthorized("Incorrect email or password".into()))?;

        Ok(HttpResponse::Ok().json(tokens.issue_token(user.user_id, &user.email)?))
    }
}

// sub-route "/users"
pub mod users_route {
    use actix_web::web::{Data, Json, Path};
    use actix_web::{get, put, HttpResponse};

    use crate::auth::Identity;
    use crate::services::db_utils::AppState;
    use crate::services::directory::UserUpdate;
    use crate::services::messages::{FetchUser, FetchUserReservations, UpdateUser};
    use crate::types::ServiceError;

    #[get("/me")]
    pub async fn read_me(
        state: Data<AppState>,
        identity: Identity,
    ) -> Result<HttpResponse, ServiceError> {
        let user_id = identity.require_user()?;
        let user = state.pg_db.send(FetchUser(user_id)).await??;
        Ok(HttpResponse::Ok().json(user))
    }

    #[put("/me")]
    pub async fn update_me(
        state: Data<AppState>,
        identity: Identity,
        body: Json<UserUpdate>,
    ) -> Result<HttpResponse, ServiceError> {
        let user_id = identity.require_user()?;
        let user = state
            .pg_db
            .send(UpdateUser {
                user_id,
                changes: body.into_inner(),
            })
            .await??;
        Ok(HttpResponse::Ok().json(user))
    }

    #[get("/{user_id}")]
    pub async fn read_user(
        state: Data<AppState>,
        identity: Identity,
        path: Path<i64>,
    ) -> Result<HttpResponse, ServiceError> {
        identity.require_privileged()?;
        let user = state.pg_db.send(FetchUser(path.into_inner())).await??;
        Ok(HttpResponse::Ok().json(user))
    }

    #[get("/{user_id}/reservations")]
    pub async fn read_user_reservations(
        state: Data<AppState>,
        identity: Identity,
        path: Path<i64>,
    ) -> Result<HttpResponse, ServiceError> {
        identity.require_privileged()?;
        let reservations = state
            .pg_db
            .send(FetchUserReservations {
                user_id: path.into_inner(),
                require_user: true,
            })
            .await??;
        Ok(HttpResponse::Ok().json(reservations))
    }
}

// sub-route "/restaurants"
pub mod restaurants_route {
    use actix_web::web::{Data, Json, Path, Query};
    use actix_web::{delete, get, post, put, HttpResponse};
    use chrono::{NaiveDate, NaiveTime};
    use serde::Deserialize;
    use serde_json::json;

    use crate::auth::Identity;
    use crate::services::db_utils::AppState;
    use crate::services::directory::{RestaurantCreate, RestaurantUpdate, TableSpec};
    use crate::services::messages::{
        AddTable, CheckCapacity, CreateRestaurant, DeleteRestaurant, FetchAvailability, FetchRestaurant,
        FetchRestaurantReservations, FetchRestaurants, UpdateRestaurant,
    };
    use crate::types::{slot_time, ServiceError};

    #[derive(Deserialize)]
    pub struct Paging {
        #[serde(default)]
        pub skip: i64,
        #[serde(default = "default_limit")]
        pub limit: i64,
    }

    fn default_limit() -> i64 {
        100
    }

    #[derive(Deserialize)]
    pub struct AvailabilityQuery {
        pub date: NaiveDate,
        #[serde(default, deserialize_with = "slot_time::option::deserialize")]
        pub time: Option<NaiveTime>,
        #[serde(default = "default_party_size")]
        pub party_size: i32,
    }

    fn default_party_size() -> i32 {
        1
    }

    #[derive(Deserialize)]
    pub struct ReservationDateQuery {
        pub reservation_date: Option<NaiveDate>,
    }

    #[post("/")]
    pub async fn create_restaurant(
        state: Data<AppState>,
        identity: Identity,
        body: Json<RestaurantCreate>,
    ) -> Result<HttpResponse, ServiceError> {
        identity.require_privileged()?;
        let restaurant = state
            .pg_db
            .send(CreateRestaurant(body.into_inner()))
            .await??;
        Ok(HttpResponse::Ok().json(restaurant))
    }

    #[get("/")]
    pub async fn list_restaurants(
        state: Data<AppState>,
        paging: Query<Paging>,
    ) -> Result<HttpResponse, ServiceError> {
        let restaurants = state
            .pg_db
            .send(FetchRestaurants {
                skip: paging.skip,
                limit: paging.limit,
            })
            .await??;

        if restaurants.is_empty() {
            return Err(ServiceError::NotFound("No restaurants found".into()));
        }
        Ok(HttpResponse::Ok().json(restaurants))
    }

    #[get("/{restaurant_id}")]
    pub async fn get_restaurant(
        state: Data<AppState>,
        path: Path<i64>,
    ) -> Result<HttpResponse, ServiceError> {
        let restaurant = state
            .pg_db
            .send(FetchRestaurant(path.into_inner()))
            .await??;
        Ok(HttpResponse::Ok().json(restaurant))
    }

    #[get("/{restaurant_id}/availability")]
    pub async fn get_availability(
        state: Data<AppState>,
        path: Path<i64>,
        query: Query<AvailabilityQuery>,
    ) -> Result<HttpResponse, ServiceError> {
        let restaurant_id = path.into_inner();

        if let Some(time) = query.time {
            let available = state
                .pg_db
                .send(CheckCapacity {
                    restaurant_id,
                    date: query.date,
                    time,
                    party_size: query.party_size,
                })
                .await??;
            return Ok(HttpResponse::Ok().json(json!({ "available": available })));
        }

        let slots = state
            .pg_db
            .send(FetchAvailability {
                restaurant_id,
                date: query.date,
                party_size: query.party_size,
            })
            .await??;
        Ok(HttpResponse::Ok().json(slots))
    }

    #[put("/{restaurant_id}")]
    pub async fn update_restaurant(
        state: Data<AppState>,
        identity: Identity,
        path: Path<i64>,
        body: Json<RestaurantUpdate>,
    ) -> Result<HttpResponse, ServiceError> {
        identity.require_privileged()?;
        let restaurant = state
            .pg_db
            .send(UpdateRestaurant {
                restaurant_id: path.into_inner(),
                changes: body.into_inner(),
            })
            .await??;
        Ok(HttpResponse::Ok().json(restaurant))
    }

    #[post("/{restaurant_id}/tables")]
    pub async fn add_table(
        state: Data<AppState>,
        identity: Identity,
        path: Path<i64>,
        body: Json<TableSpec>,
    ) -> Result<HttpResponse, ServiceError> {
        identity.require_privileged()?;
        let table = state
            .pg_db
            .send(AddTable {
                restaurant_id: path.into_inner(),
                spec: body.into_inner(),
            })
            .await??;
        Ok(HttpResponse::Ok().json(table))
    }

    #[delete("/{restaurant_id}")]
    pub async fn delete_restaurant(
        state: Data<AppState>,
        identity: Identity,
        path: Path<i64>,
    ) -> Result<HttpResponse, ServiceError> {
        identity.require_privileged()?;
        state
            .pg_db
            .send(DeleteRestaurant(path.into_inner()))
            .await??;
        Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Restaurant deleted successfully"
        })))
    }

    #[get("/{restaurant_id}/reservations/")]
    pub async fn get_restaurant_reservations(
        state: Data<AppState>,
        identity: Identity,
        path: Path<i64>,
        query: Query<ReservationDateQuery>,
    ) -> Result<HttpResponse, ServiceError> {
        identity.require_privileged()?;
        let reservations = state
            .pg_db
            .send(FetchRestaurantReservations {
                restaurant_id: path.into_inner(),
                date: query.reservation_date,
            })
            .await??;
        Ok(HttpResponse::Ok().json(reservations))
    }
}

// "/reservations/", "/book-restaurant/", "/my-reservations/"
pub mod reservations_route {
    use actix_web::web::{Data, Json, Path, Query};
    use actix_web::{delete, get, post, put, HttpResponse};
    use serde::Deserialize;

    use crate::auth::Identity;
    use crate::services::db_models::ReservationSummary;
    use crate::services::db_utils::AppState;
    use crate::services::messages::{
        CancelReservation, CreateReservation, FetchAllReservations, FetchUserReservations,
        UpdateReservation,
    };
    use crate::services::reservations::{
        ReservationCreate, ReservationUpdate, RestaurantRef, SimpleReservationCreate, SlotRequest,
    };
    use crate::types::ServiceError;

    #[derive(Deserialize)]
    pub struct ActingUserQuery {
        pub user_id: Option<i64>,
    }

    #[post("/reservations/")]
    pub async fn create_reservation(
        state: Data<AppState>,
        identity: Identity,
        body: Json<ReservationCreate>,
    ) -> Result<HttpResponse, ServiceError> {
        let body = body.into_inner();
        let actor = identity.actor(body.user_id)?;

        let (reservation, _) = state
            .pg_db
            .send(CreateReservation {
                restaurant: RestaurantRef::Id(body.restaurant_id),
                request: SlotRequest {
                    date: body.date,
                    time: body.time,
                    guests: body.guests,
                },
                actor,
            })
            .await??;
        Ok(HttpResponse::Ok().json(reservation))
    }

    #[get("/reservations/")]
    pub async fn list_all_reservations(
        state: Data<AppState>,
        identity: Identity,
    ) -> Result<HttpResponse, ServiceError> {
        identity.require_privileged()?;
        let reservations = state.pg_db.send(FetchAllReservations).await??;
        Ok(HttpResponse::Ok().json(reservations))
    }

    #[post("/book-restaurant/")]
    pub async fn book_restaurant_by_name(
        state: Data<AppState>,
        identity: Identity,
        body: Json<SimpleReservationCreate>,
    ) -> Result<HttpResponse, ServiceError> {
        let body = body.into_inner();
        let actor = identity.actor(body.user_id)?;

        let (reservation, restaurant) = state
            .pg_db
            .send(CreateReservation {
                restaurant: RestaurantRef::Name(body.restaurant_name),
                request: SlotRequest {
                    date: body.date,
                    time: body.time,
                    guests: body.guests,
                },
                actor,
            })
            .await??;
        Ok(HttpResponse::Ok().json(ReservationSummary::new(&reservation, &restaurant)))
    }

    #[get("/my-reservations/")]
    pub async fn my_reservations(
        state: Data<AppState>,
        identity: Identity,
        query: Query<ActingUserQuery>,
    ) -> Result<HttpResponse, ServiceError> {
        let actor = identity.actor(query.user_id)?;
        let reservations = state
            .pg_db
            .send(FetchUserReservations {
                user_id: actor.user_id,
                require_user: actor.privileged,
            })
            .await??;
        Ok(HttpResponse::Ok().json(reservations))
    }

    #[put("/my-reservations/{reservation_id}")]
    pub async fn update_my_reservation(
        state: Data<AppState>,
        identity: Identity,
        path: Path<i64>,
        body: Json<ReservationUpdate>,
    ) -> Result<HttpResponse, ServiceError> {
        let changes = body.into_inner();
        let actor = identity.actor(changes.user_id)?;

        let reservation = state
            .pg_db
            .send(UpdateReservation {
                reservation_id: path.into_inner(),
                changes,
                actor,
            })
            .await??;
        Ok(HttpResponse::Ok().json(reservation))
    }

    #[delete("/my-reservations/{reservation_id}")]
    pub async fn cancel_my_reservation(
        state: Data<AppState>,
        identity: Identity,
        path: Path<i64>,
        query: Query<ActingUserQuery>,
    ) -> Result<HttpResponse, ServiceError> {
        let actor = identity.actor(query.user_id)?;
        let reservation = state
            .pg_db
            .send(CancelReservation {
                reservation_id: path.into_inner(),
                actor,
            })
            .await??;
        Ok(HttpResponse::Ok().json(reservation))
    }
}

// sub-route "/assistant"
pub mod assistant_route {
    use actix_web::web::{Data, Json};
    use actix_web::{post, HttpResponse};

    use crate::auth::Identity;
    use crate::services::llm_client::{ChatRequest, LlmClient};
    use crate::types::ServiceError;

    #[post("/chat")]
    pub async fn chat(
        llm: Data<LlmClient>,
        identity: Identity,
        body: Json<ChatRequest>,
    ) -> Result<HttpResponse, ServiceError> {
        identity.require_privileged()?;
        let body = body.into_inner();
        Ok(HttpResponse::Ok().json(llm.get_response(&body.messages, body.is_json).await))
    }
}

// sub-route "/test"
pub mod test_route {
    use actix_web::{get, HttpResponse, Responder};

    #[get("/healthcheck")]
    pub async fn healthcheck() -> impl Responder {
        HttpResponse::Ok().body("I'm alive!")
    }
}

#[cfg(test)]
mod tests {
    use actix::SyncArbiter;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, web, App};
    use diesel::r2d2::{ConnectionManager, Pool};
    use diesel::PgConnection;
    use serde_json::{json, Value};

    use super::*;
    use crate::auth::{TokenService, API_KEY_HEADER};
    use crate::services::db_utils::{AppState, PgActor, PgPool};
    use crate::services::reservations::RestaurantRef;
    use crate::services::test_support::{at, day, register, restaurant, test_pool, PASSWORD};

    const API_KEY: &str = "integration-key";
    const JWT_SECRET: &str = "route-test-secret";

    fn tokens() -> TokenService {
        TokenService::new(API_KEY, JWT_SECRET, 30)
    }

    fn bearer(user_id: i64) -> String {
        let token = tokens().issue_token(user_id, "guest@example.com").unwrap();
        format!("Bearer {}", token.access_token)
    }

    fn state_for(pool: PgPool) -> web::Data<AppState> {
        web::Data::new(AppState {
            pg_db: SyncArbiter::start(1, move || PgActor(pool.clone())),
        })
    }

    /// A pool that never connects, for requests rejected before any query.
    fn offline_pool() -> PgPool {
        Pool::builder()
            .min_idle(Some(0))
            .build_unchecked(ConnectionManager::<PgConnection>::new(
                "postgres://offline.invalid/goodfoods",
            ))
    }

    macro_rules! full_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state)
                    .app_data(web::Data::new(tokens()))
                    .app_data(web::Data::new(llm_client::LlmClient::new(
                        "http://127.0.0.1:9",
                        None,
                        "test-model",
                    )))
                    .configure(extractor_errors)
                    .configure(routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn healthcheck_answers() {
        let app = test::init_service(
            App::new().service(web::scope("/test").service(test_route::healthcheck)),
        )
        .await;

        let req = test::TestRequest::get().uri("/test/healthcheck").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await, web::Bytes::from_static(b"I'm alive!"));
    }

    #[actix_web::test]
    async fn assistant_requires_api_key() {
        let tokens = crate::auth::TokenService::new("integration-key", "route-test-secret", 30);
        let bearer = format!("Bearer {}", tokens.issue_token(3, "ada@example.com").unwrap().access_token);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(tokens))
                .app_data(web::Data::new(llm_client::LlmClient::new(
                    "http://127.0.0.1:9",
                    None,
                    "test-model",
                )))
                .service(web::scope("/assistant").service(assistant_route::chat)),
        )
        .await;
        let body = serde_json::json!({ "messages": [{ "role": "user", "content": "hi" }] });

        let anonymous = test::TestRequest::post()
            .uri("/assistant/chat")
            .set_json(&body)
            .to_request();
        assert_eq!(
            test::call_service(&app, anonymous).await.status(),
            StatusCode::UNAUTHORIZED
        );

        let session = test::TestRequest::post()
            .uri("/assistant/chat")
            .insert_header(("Authorization", bearer))
            .set_json(&body)
            .to_request();
        assert_eq!(
            test::call_service(&app, session).await.status(),
            StatusCode::FORBIDDEN
        );

        let privileged = test::TestRequest::post()
            .uri("/assistant/chat")
            .insert_header((crate::auth::API_KEY_HEADER, "integration-key"))
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, privileged).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = test::read_body_json(resp).await;
        assert!(json["error"].is_string());
    }

    #[actix_web::test]
    async fn home_page_answers() {
        let app = test::init_service(App::new().service(home_page)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;

        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn malformed_requests_answer_with_detail_bodies() {
        let app = full_app!(state_for(offline_pool()));

        let bad_json = test::TestRequest::post()
            .uri("/register")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, bad_json).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["detail"].is_string());

        let no_date = test::TestRequest::get()
            .uri("/restaurants/1/availability")
            .to_request();
        let resp = test::call_service(&app, no_date).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["detail"].as_str().unwrap().contains("date"));

        let bad_path = test::TestRequest::get().uri("/restaurants/abc").to_request();
        let resp = test::call_service(&app, bad_path).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["detail"].is_string());

        let short_form = test::TestRequest::post()
            .uri("/login")
            .set_form(json!({ "username": "ada@example.com" }))
            .to_request();
        let resp = test::call_service(&app, short_form).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["detail"].is_string());
    }

    #[actix_web::test]
    async fn session_callers_are_forbidden_from_privileged_routes() {
        let app = full_app!(state_for(offline_pool()));
        let restaurant = json!({
            "restaurant_name": "Trattoria",
            "address": "1 Via Roma",
            "opening_time": "18:00",
            "closing_time": "22:00"
        });

        let requests = [
            test::TestRequest::get().uri("/reservations/"),
            test::TestRequest::get().uri("/users/5"),
            test::TestRequest::post().uri("/restaurants/").set_json(&restaurant),
        ];
        for request in requests {
            let req = request
                .insert_header((header::AUTHORIZATION, bearer(3)))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::FORBIDDEN);
            let body: Value = test::read_body_json(resp).await;
            assert!(body["detail"].is_string());
        }
    }

    #[actix_web::test]
    async fn api_key_bookings_must_name_a_user() {
        let app = full_app!(state_for(offline_pool()));

        let booking = test::TestRequest::post()
            .uri("/reservations/")
            .insert_header((API_KEY_HEADER, API_KEY))
            .set_json(json!({
                "restaurant_id": 1,
                "date": "2030-01-01",
                "time": "19:00",
                "guests": 2
            }))
            .to_request();
        let resp = test::call_service(&app, booking).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["detail"], "User ID is required");

        let listing = test::TestRequest::get()
            .uri("/my-reservations/")
            .insert_header((API_KEY_HEADER, API_KEY))
            .to_request();
        assert_eq!(
            test::call_service(&app, listing).await.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[actix_web::test]
    async fn login_rejects_bad_credentials() {
        let Some(pool) = test_pool("login_rejects_bad_credentials") else { return };
        let user = register(&mut pool.get().unwrap());
        let app = full_app!(state_for(pool));

        let wrong = test::TestRequest::post()
            .uri("/login")
            .set_form(json!({ "username": user.email, "password": "not the password" }))
            .to_request();
        let resp = test::call_service(&app, wrong).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

        let right = test::TestRequest::post()
            .uri("/login")
            .set_form(json!({ "username": user.email, "password": PASSWORD }))
            .to_request();
        let resp = test::call_service(&app, right).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["token_type"], "bearer");
    }

    #[actix_web::test]
    async fn empty_restaurant_page_is_not_found() {
        let Some(pool) = test_pool("empty_restaurant_page_is_not_found") else { return };
        let app = full_app!(state_for(pool));

        for uri in ["/restaurants/?skip=1000000000", "/restaurants/?limit=0"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            assert_eq!(
                test::call_service(&app, req).await.status(),
                StatusCode::NOT_FOUND
            );
        }
    }

    #[actix_web::test]
    async fn reservation_listings_show_the_booking() {
        let Some(pool) = test_pool("reservation_listings_show_the_booking") else { return };
        let (guest, place, booking) = {
            let mut conn = pool.get().unwrap();
            let guest = register(&mut conn);
            let place = restaurant(&mut conn, &[4]);
            let actor = crate::auth::Actor {
                user_id: guest.user_id,
                privileged: false,
            };
            let request = reservations::SlotRequest {
                date: day(),
                time: at(19),
                guests: 2,
            };
            let (booking, _) =
                reservations::create(&mut conn, &RestaurantRef::Id(place.restaurant_id), request, actor)
                    .unwrap();
            (guest, place, booking)
        };
        let app = full_app!(state_for(pool));

        let mine = test::TestRequest::get()
            .uri("/my-reservations/")
            .insert_header((header::AUTHORIZATION, bearer(guest.user_id)))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, mine).await;
        assert_eq!(body[0]["reservation_id"], booking.reservation_id);
        assert_eq!(body[0]["restaurant_name"], place.restaurant_name.as_str());

        for uri in [
            format!("/restaurants/{}/reservations/", place.restaurant_id),
            format!("/users/{}/reservations", guest.user_id),
        ] {
            let req = test::TestRequest::get()
                .uri(&uri)
                .insert_header((API_KEY_HEADER, API_KEY))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body.as_array().map(Vec::len), Some(1), "{uri}");
            assert_eq!(body[0]["reservation_id"], booking.reservation_id);
        }

        let all = test::TestRequest::get()
            .uri("/reservations/")
            .insert_header((API_KEY_HEADER, API_KEY))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, all).await;
        let listed = body.as_array().unwrap();
        assert!(listed
            .iter()
            .any(|r| r["reservation_id"] == booking.reservation_id));

        let check = test::TestRequest::get()
            .uri(&format!(
                "/restaurants/{}/availability?date={}&time=19:00&party_size=2",
                place.restaurant_id,
                day()
            ))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, check).await;
        assert_eq!(body["available"], false);
    }
}
