use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub phone: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::bus_operators)]
pub struct BusOperator {
    pub id: Uuid,
    pub name: String,
    pub contact_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::bus_operators)]
pub struct NewBusOperator {
    pub id: Uuid,
    pub name: String,
    pub contact_info: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::buses)]
pub struct Bus {
    pub id: Uuid,
    pub operator_id: Option<Uuid>,
    pub bus_number: String,
    pub seat_capacity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::buses)]
pub struct NewBus {
    pub id: Uuid,
    pub operator_id: Option<Uuid>,
    pub bus_number: String,
    pub seat_capacity: i32,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::routes)]
pub struct Route {
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::routes)]
pub struct NewRoute {
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::schedules)]
pub struct Schedule {
    pub id: Uuid,
    pub bus_id: Uuid,
    pub route_id: Uuid,
    pub inventory_unit_id: Uuid,
    pub travel_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::schedules)]
pub struct NewSchedule {
    pub id: Uuid,
    pub bus_id: Uuid,
    pub route_id: Uuid,
    pub inventory_unit_id: Uuid,
    pub travel_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::bookings)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub schedule_id: Uuid,
    pub reservation_id: Uuid,
    pub ticket_number: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::bookings)]
pub struct NewBooking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub schedule_id: Uuid,
    pub reservation_id: Uuid,
    pub ticket_number: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::retail_shops)]
pub struct RetailShop {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub contact_info: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::retail_shops)]
pub struct NewRetailShop {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub contact_info: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::products)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub shop_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub inventory_unit_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::products)]
pub struct NewProduct {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub shop_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub inventory_unit_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::orders)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub total_price: BigDecimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct NewOrder {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub total_price: BigDecimal,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::order_items)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub reservation_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::order_items)]
pub struct NewOrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub reservation_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::reviews)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bus_id: Option<Uuid>,
    pub shop_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub rating: i32,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::reviews)]
pub struct NewReview {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bus_id: Option<Uuid>,
    pub shop_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub rating: i32,
    pub review: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::comments)]
pub struct Comment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entity_id: Uuid,
    pub entity_type: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::comments)]
pub struct NewComment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entity_id: Uuid,
    pub entity_type: String,
    pub rating: i32,
    pub comment: Option<String>,
}
