//! Slot arithmetic and table selection.
//!
//! Everything here works on rows already loaded from the database, so the
//! lifecycle code can run it while holding the restaurant lock.

use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate, NaiveTime};
use diesel::{ExpressionMethods, PgConnection, QueryDsl, RunQueryDsl};

use crate::services::db_models::{ReservationStatus, Restaurant, RestaurantTable};
use crate::types::{slot_time, ServiceError};

/// An active reservation reduced to what occupancy needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Booking {
    pub table_id: i64,
    pub time: NaiveTime,
}

/// Slot starts from `opening` while a whole slot still fits before `closing`.
pub fn time_slots(opening: NaiveTime, closing: NaiveTime, slot_minutes: i32) -> Vec<NaiveTime> {
    let mut slots = vec![];
    if slot_minutes <= 0 || closing <= opening {
        return slots;
    }

    let step = Duration::minutes(i64::from(slot_minutes));
    let mut start = opening;
    loop {
        let (end, wrapped) = start.overflowing_add_signed(step);
        if wrapped != 0 || end > closing {
            break;
        }
        slots.push(start);
        start = end;
    }

    slots
}

pub fn restaurant_slots(restaurant: &Restaurant) -> Vec<NaiveTime> {
    time_slots(
        restaurant.opening_time,
        restaurant.closing_time,
        restaurant.slot_minutes,
    )
}

/// Free tables seating at least `party_size`, per slot.
pub fn free_tables_per_slot(
    slots: &[NaiveTime],
    tables: &[RestaurantTable],
    bookings: &[Booking],
    party_size: i32,
) -> BTreeMap<NaiveTime, usize> {
    slots
        .iter()
        .map(|slot| {
            let occupied = occupied_at(bookings, *slot);
            let free = tables
                .iter()
                .filter(|t| t.capacity >= party_size && !occupied.contains(&t.table_id))
                .count();
            (*slot, free)
        })
        .collect()
}

pub fn occupied_at(bookings: &[Booking], time: NaiveTime) -> HashSet<i64> {
    bookings
        .iter()
        .filter(|b| b.time == time)
        .map(|b| b.table_id)
        .collect()
}

/// Smallest table that fits the party, lowest id on ties.
pub fn pick_table<'a>(
    tables: &'a [RestaurantTable],
    occupied: &HashSet<i64>,
    party_size: i32,
) -> Option<&'a RestaurantTable> {
    tables
        .iter()
        .filter(|t| t.capacity >= party_size && !occupied.contains(&t.table_id))
        .min_by_key(|t| (t.capacity, t.table_id))
}

pub fn validate_party_size(party_size: i32) -> Result<(), ServiceError> {
    if party_size <= 0 {
        return Err(ServiceError::Validation(
            "Party size must be at least 1".into(),
        ));
    }
    Ok(())
}

pub(crate) fn load_tables(
    conn: &mut PgConnection,
    restaurant_pk: i64,
) -> Result<Vec<RestaurantTable>, ServiceError> {
    use crate::schema::restaurant_tables::dsl::{restaurant_id, restaurant_tables, table_id};

    Ok(restaurant_tables
        .filter(restaurant_id.eq(restaurant_pk))
        .order(table_id.asc())
        .get_results::<RestaurantTable>(conn)?)
}

/// Active bookings of a restaurant on `date`, optionally ignoring one reservation.
pub(crate) fn load_bookings(
    conn: &mut PgConnection,
    restaurant_pk: i64,
    date: NaiveDate,
    ignore: Option<i64>,
) -> Result<Vec<Booking>, ServiceError> {
    use crate::schema::reservations::dsl::{
        reservation_date, reservation_id, reservation_time, reservations, restaurant_id, status,
        table_id,
    };

    let mut query = reservations
        .filter(restaurant_id.eq(restaurant_pk))
        .filter(reservation_date.eq(date))
        .filter(status.ne(ReservationStatus::Cancelled))
        .select((table_id, reservation_time))
        .into_boxed();

    if let Some(own_id) = ignore {
        query = query.filter(reservation_id.ne(own_id));
    }

    let rows = query.get_results::<(i64, NaiveTime)>(conn)?;

    Ok(rows
        .into_iter()
        .map(|(table, time)| Booking { table_id: table, time })
        .collect())
}

fn find_restaurant(conn: &mut PgConnection, restaurant_pk: i64) -> Result<Restaurant, ServiceError> {
    use crate::schema::restaurants::dsl::restaurants;

    restaurants
        .find(restaurant_pk)
        .first::<Restaurant>(conn)
        .map_err(|err| match err {
            diesel::result::Error::NotFound => ServiceError::not_found("Restaurant"),
            other => other.into(),
        })
}

/// `"HH:MM"` to free-table count for every slot of the restaurant on `date`.
pub fn availability(
    conn: &mut PgConnection,
    restaurant_pk: i64,
    date: NaiveDate,
    party_size: i32,
) -> Result<BTreeMap<String, usize>, ServiceError> {
    validate_party_size(party_size)?;
    let restaurant = find_restaurant(conn, restaurant_pk)?;

    let slots = restaurant_slots(&restaurant);
    if slots.is_empty() {
        return Ok(BTreeMap::new());
    }

    let tables = load_tables(conn, restaurant_pk)?;
    let bookings = load_bookings(conn, restaurant_pk, date, None)?;

    Ok(free_tables_per_slot(&slots, &tables, &bookings, party_size)
        .into_iter()
        .map(|(slot, free)| (slot_time::format(&slot), free))
        .collect())
}

pub fn has_capacity(
    conn: &mut PgConnection,
    restaurant_pk: i64,
    date: NaiveDate,
    time: NaiveTime,
    party_size: i32,
) -> Result<bool, ServiceError> {
    validate_party_size(party_size)?;
    let restaurant = find_restaurant(conn, restaurant_pk)?;
    if !restaurant_slots(&restaurant).contains(&time) {
        return Ok(false);
    }

    let tables = load_tables(conn, restaurant_pk)?;
    let bookings = load_bookings(conn, restaurant_pk, date, None)?;

    Ok(pick_table(&tables, &occupied_at(&bookings, time), party_size).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn table(id: i64, capacity: i32) -> RestaurantTable {
        RestaurantTable {
            table_id: id,
            restaurant_id: 1,
            capacity,
        }
    }

    #[test]
    fn slots_stop_before_closing() {
        let slots = time_slots(at(18, 0), at(21, 0), 60);
        assert_eq!(slots, vec![at(18, 0), at(19, 0), at(20, 0)]);
    }

    #[test]
    fn partial_slot_at_closing_is_dropped() {
        let slots = time_slots(at(18, 0), at(20, 30), 60);
        assert_eq!(slots, vec![at(18, 0), at(19, 0)]);
    }

    #[test]
    fn unusable_configuration_has_no_slots() {
        assert!(time_slots(at(18, 0), at(18, 0), 60).is_empty());
        assert!(time_slots(at(22, 0), at(2, 0), 60).is_empty());
        assert!(time_slots(at(18, 0), at(22, 0), 0).is_empty());
    }

    #[test]
    fn late_slots_do_not_wrap_past_midnight() {
        let slots = time_slots(at(22, 0), at(23, 59), 60);
        assert_eq!(slots, vec![at(22, 0)]);
    }

    #[test]
    fn free_count_filters_by_party_size() {
        let tables = [table(1, 2), table(2, 4), table(3, 6)];
        let counts = free_tables_per_slot(&[at(19, 0)], &tables, &[], 4);
        assert_eq!(counts[&at(19, 0)], 2);
    }

    #[test]
    fn fully_booked_slot_reports_zero() {
        let tables = [table(1, 4), table(2, 4)];
        let bookings = [
            Booking { table_id: 1, time: at(19, 0) },
            Booking { table_id: 2, time: at(19, 0) },
        ];

        let counts = free_tables_per_slot(&[at(18, 0), at(19, 0)], &tables, &bookings, 2);

        assert_eq!(counts[&at(18, 0)], 2);
        assert_eq!(counts[&at(19, 0)], 0);
    }

    #[test]
    fn too_small_free_table_does_not_count() {
        let tables = [table(1, 2), table(2, 6)];
        let bookings = [Booking { table_id: 2, time: at(19, 0) }];

        let counts = free_tables_per_slot(&[at(19, 0)], &tables, &bookings, 4);

        assert_eq!(counts[&at(19, 0)], 0);
    }

    #[test]
    fn pick_prefers_smallest_fitting_table() {
        let tables = [table(1, 8), table(2, 4), table(3, 2), table(4, 4)];
        let picked = pick_table(&tables, &HashSet::new(), 3).unwrap();
        assert_eq!(picked.table_id, 2);
    }

    #[test]
    fn pick_skips_occupied_tables() {
        let tables = [table(1, 4), table(2, 6)];
        let occupied = HashSet::from([1]);
        assert_eq!(pick_table(&tables, &occupied, 2).unwrap().table_id, 2);
        assert!(pick_table(&tables, &HashSet::from([1, 2]), 2).is_none());
    }

    #[test]
    fn occupancy_is_per_slot() {
        let bookings = [
            Booking { table_id: 1, time: at(18, 0) },
            Booking { table_id: 2, time: at(19, 0) },
        ];
        assert_eq!(occupied_at(&bookings, at(19, 0)), HashSet::from([2]));
    }

    #[test]
    fn party_size_must_be_positive() {
        assert!(matches!(validate_party_size(0), Err(ServiceError::Validation(_))));
        assert!(validate_party_size(1).is_ok());
    }
}
