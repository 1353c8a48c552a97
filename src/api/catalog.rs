use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::AppResult;
use crate::service::{NewModifier, NewProduct, NewRestaurant, UpdateModifier, UpdateProduct, UpdateRestaurant};
use crate::state::AppState;
use crate::store::PageRequest;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/restaurants", web::get().to(list_restaurants))
        .route("/restaurants", web::post().to(create_restaurant))
        .route("/restaurants/{id}", web::get().to(get_restaurant))
        .route("/restaurants/{id}", web::put().to(update_restaurant))
        .route("/restaurants/{id}/products", web::get().to(list_products))
        .route("/restaurants/{id}/products", web::post().to(create_product))
        .route("/products/{id}", web::get().to(get_product))
        .route("/products/{id}", web::put().to(update_product))
        .route("/products/{id}/modifiers", web::get().to(list_modifiers))
        .route("/products/{id}/modifiers", web::post().to(create_modifier))
        .route("/modifiers/{id}", web::put().to(update_modifier));
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestaurantQuery {
    /// Public listings hide inactive restaurants unless asked
    #[serde(default = "active_only_by_default")]
    active_only: bool,
    page: Option<u32>,
    size: Option<u32>,
}

fn active_only_by_default() -> bool {
    true
}

async fn list_restaurants(state: web::Data<AppState>, query: web::Query<RestaurantQuery>) -> AppResult<HttpResponse> {
    let page = PageRequest::new(query.page, query.size);
    let restaurants = state.catalog.list_restaurants(query.active_only, page).await?;
    Ok(HttpResponse::Ok().json(restaurants))
}

async fn create_restaurant(
    state: web::Data<AppState>,
    principal: Principal,
    body: web::Json<NewRestaurant>,
) -> AppResult<HttpResponse> {
    let restaurant = state.catalog.create_restaurant(&principal, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(restaurant))
}

async fn get_restaurant(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let restaurant = state.catalog.get_restaurant(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(restaurant))
}

async fn update_restaurant(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<UpdateRestaurant>,
) -> AppResult<HttpResponse> {
    let restaurant = state
        .catalog
        .update_restaurant(&principal, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(restaurant))
}

async fn list_products(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<super::PageQuery>,
) -> AppResult<HttpResponse> {
    let products = state.catalog.list_products(path.into_inner(), (&*query).into()).await?;
    Ok(HttpResponse::Ok().json(products))
}

async fn create_product(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<NewProduct>,
) -> AppResult<HttpResponse> {
    let product = state
        .catalog
        .create_product(&principal, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(product))
}

async fn get_product(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let product = state.catalog.get_product(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(product))
}

async fn update_product(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<UpdateProduct>,
) -> AppResult<HttpResponse> {
    let product = state
        .catalog
        .update_product(&principal, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(product))
}

async fn list_modifiers(state: web::Data<AppState>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let modifiers = state.catalog.list_modifiers(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(modifiers))
}

async fn create_modifier(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<NewModifier>,
) -> AppResult<HttpResponse> {
    let modifier = state
        .catalog
        .create_modifier(&principal, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(modifier))
}

async fn update_modifier(
    state: web::Data<AppState>,
    principal: Principal,
    path: web::Path<Uuid>,
    body: web::Json<UpdateModifier>,
) -> AppResult<HttpResponse> {
    let modifier = state
        .catalog
        .update_modifier(&principal, path.into_inner(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(modifier))
}
