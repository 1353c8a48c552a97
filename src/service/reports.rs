use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{policy, Principal};
use crate::domain::order::OrderStatus;
use crate::domain::user::Role;
use crate::error::{AppError, AppResult};
use crate::store::{ProductSales, ReportRepository, ReportWindow, RestaurantRepository, StatusCount};

// ============================================================================
// Report Service - sales, status counts and top products
// ============================================================================
//
// Every report runs over a half-open window [from, to) of order creation
// time. Admins may narrow to one restaurant; owners only ever see their own.
//
// ============================================================================

pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_TOP_PRODUCTS: u32 = 10;
pub const MAX_TOP_PRODUCTS: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub restaurant_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    pub restaurant_id: Option<Uuid>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub order_count: i64,
    pub delivered_count: i64,
    pub cancelled_count: i64,
    pub gross_revenue: Decimal,
    pub average_ticket: Decimal,
}

/// Revenue per delivered order, 2 dp, zero when nothing was delivered
pub fn average_ticket(gross_revenue: Decimal, delivered: i64) -> Decimal {
    if delivered <= 0 {
        return Decimal::ZERO;
    }
    let mut average =
        (gross_revenue / Decimal::from(delivered)).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    average.rescale(2);
    average
}

pub struct ReportService {
    reports: Arc<dyn ReportRepository>,
    restaurants: Arc<dyn RestaurantRepository>,
}

impl ReportService {
    pub fn new(reports: Arc<dyn ReportRepository>, restaurants: Arc<dyn RestaurantRepository>) -> Self {
        Self { reports, restaurants }
    }

    /// Resolve the caller's query into a window they are allowed to see
    async fn window(&self, principal: &Principal, query: &ReportQuery) -> AppResult<ReportWindow> {
        policy::ensure_can_read_reports(principal)?;

        let to = query.to.unwrap_or_else(Utc::now);
        let from = match query.from {
            Some(from) => from,
            None => to
                .checked_sub_signed(Duration::days(DEFAULT_WINDOW_DAYS))
                .ok_or_else(|| AppError::invalid_field("to", "is too far in the past"))?,
        };
        if from >= to {
            return Err(AppError::invalid_field("from", "must be before 'to'"));
        }

        let restaurant_ids = match principal.role {
            Role::Admin => query.restaurant_id.map(|id| vec![id]),
            Role::RestaurantOwner => {
                let owned = self.restaurants.restaurant_ids_for_owner(principal.user_id).await?;
                match query.restaurant_id {
                    Some(id) if !owned.contains(&id) => {
                        return Err(AppError::access_denied("Reports are limited to your own restaurants"))
                    }
                    Some(id) => Some(vec![id]),
                    None => Some(owned),
                }
            }
            Role::Customer | Role::Courier => {
                return Err(AppError::access_denied(
                    "Reports are available to restaurant owners and administrators",
                ))
            }
        };

        Ok(ReportWindow {
            restaurant_ids,
            from,
            to,
        })
    }

    pub async fn sales(&self, principal: &Principal, query: ReportQuery) -> AppResult<SalesSummary> {
        let window = self.window(principal, &query).await?;
        let totals = self.reports.sales_totals(&window).await?;

        Ok(SalesSummary {
            restaurant_id: query.restaurant_id,
            from: window.from,
            to: window.to,
            order_count: totals.order_count,
            delivered_count: totals.delivered_count,
            cancelled_count: totals.cancelled_count,
            average_ticket: average_ticket(totals.gross_revenue, totals.delivered_count),
            gross_revenue: totals.gross_revenue,
        })
    }

    /// One row per status, zero-filled, in lifecycle order
    pub async fn orders_by_status(&self, principal: &Principal, query: ReportQuery) -> AppResult<Vec<StatusCount>> {
        let window = self.window(principal, &query).await?;
        let counts = self.reports.orders_by_status(&window).await?;

        Ok(OrderStatus::ALL
            .into_iter()
            .map(|status| StatusCount {
                status,
                count: counts
                    .iter()
                    .find(|row| row.status == status)
                    .map_or(0, |row| row.count),
            })
            .collect())
    }

    pub async fn top_products(&self, principal: &Principal, query: ReportQuery) -> AppResult<Vec<ProductSales>> {
        let limit = query.limit.unwrap_or(DEFAULT_TOP_PRODUCTS);
        if limit == 0 || limit > MAX_TOP_PRODUCTS {
            return Err(AppError::invalid_field(
                "limit",
                format!("must be between 1 and {MAX_TOP_PRODUCTS}"),
            ));
        }

        let window = self.window(principal, &query).await?;
        Ok(self.reports.top_products(&window, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregate::Aggregate;
    use crate::domain::catalog::Restaurant;
    use crate::domain::customer::Address;
    use crate::domain::order::{LineItem, NewOrder, OrderAggregate, OrderCommand, PaymentMethod};
    use crate::store::{MemoryStore, OrderRepository};

    fn address() -> Address {
        Address {
            street: "Rua B 2".to_string(),
            city: "Salvador".to_string(),
            state: "BA".to_string(),
            postal_code: "40000-000".to_string(),
            country: "BR".to_string(),
        }
    }

    fn principal(role: Role) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            email: "r@example.com".to_string(),
            role,
        }
    }

    async fn restaurant(store: &MemoryStore, owner_id: Uuid) -> Uuid {
        let restaurant = Restaurant {
            id: Uuid::new_v4(),
            owner_id,
            name: "Acarajé da Cira".to_string(),
            description: None,
            phone: None,
            address: address(),
            delivery_fee: None,
            active: true,
            created_at: Utc::now(),
        };
        store.insert_restaurant(&restaurant).await.unwrap();
        restaurant.id
    }

    /// Order worth `cents` that walked the lifecycle up to `delivered`
    async fn order(store: &MemoryStore, restaurant_id: Uuid, cents: i64, delivered: bool) {
        let mut order = OrderAggregate::new(NewOrder {
            customer_id: Uuid::new_v4(),
            restaurant_id,
            delivery_address: address(),
            delivery_fee: None,
            payment_method: PaymentMethod::Pix,
            notes: None,
        });
        order
            .execute(&OrderCommand::AddItem(LineItem::priced(
                Uuid::new_v4(),
                "Acarajé",
                Decimal::new(cents, 2),
                1,
                vec![],
            ).unwrap()))
            .unwrap();
        if delivered {
            order.execute(&OrderCommand::Confirm).unwrap();
            for status in [OrderStatus::Preparing, OrderStatus::OutForDelivery, OrderStatus::Delivered] {
                order.execute(&OrderCommand::ChangeStatus(status)).unwrap();
            }
        }
        store.save_order(&order).await.unwrap();
    }

    fn service(store: Arc<MemoryStore>) -> ReportService {
        ReportService::new(store.clone(), store)
    }

    #[test]
    fn test_average_ticket_rounding() {
        assert_eq!(average_ticket(Decimal::new(1000, 2), 3), Decimal::new(333, 2));
        assert_eq!(average_ticket(Decimal::new(2000, 2), 3), Decimal::new(667, 2));
        assert_eq!(average_ticket(Decimal::new(5000, 2), 0), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_owner_sales_are_scoped_to_own_restaurants() {
        let store = Arc::new(MemoryStore::new());
        let owner = principal(Role::RestaurantOwner);
        let mine = restaurant(&store, owner.user_id).await;
        let theirs = restaurant(&store, Uuid::new_v4()).await;

        order(&store, mine, 3000, true).await;
        order(&store, mine, 1500, true).await;
        order(&store, mine, 9900, false).await;
        order(&store, theirs, 10000, true).await;

        let service = service(store);
        let summary = service.sales(&owner, ReportQuery::default()).await.unwrap();
        assert_eq!(summary.order_count, 3);
        assert_eq!(summary.delivered_count, 2);
        assert_eq!(summary.gross_revenue, Decimal::new(4500, 2));
        assert_eq!(summary.average_ticket, Decimal::new(2250, 2));

        let foreign = ReportQuery {
            restaurant_id: Some(theirs),
            ..Default::default()
        };
        assert!(matches!(
            service.sales(&owner, foreign).await,
            Err(AppError::AccessDenied(_))
        ));

        let admin = service.sales(&principal(Role::Admin), ReportQuery::default()).await.unwrap();
        assert_eq!(admin.order_count, 4);
    }

    #[tokio::test]
    async fn test_status_counts_are_zero_filled() {
        let store = Arc::new(MemoryStore::new());
        let id = restaurant(&store, Uuid::new_v4()).await;
        order(&store, id, 1000, false).await;

        let rows = service(store)
            .orders_by_status(&principal(Role::Admin), ReportQuery::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), OrderStatus::ALL.len());
        assert_eq!(rows[0], StatusCount { status: OrderStatus::Pending, count: 1 });
        assert!(rows[1..].iter().all(|row| row.count == 0));
    }

    #[tokio::test]
    async fn test_query_validation_and_roles() {
        let service = service(Arc::new(MemoryStore::new()));
        let admin = principal(Role::Admin);

        let now = Utc::now();
        let inverted = ReportQuery {
            from: Some(now),
            to: Some(now - Duration::days(1)),
            ..Default::default()
        };
        assert!(matches!(
            service.sales(&admin, inverted).await,
            Err(AppError::Validation { .. })
        ));

        let too_many = ReportQuery {
            limit: Some(500),
            ..Default::default()
        };
        assert!(service.top_products(&admin, too_many).await.is_err());

        for role in [Role::Customer, Role::Courier] {
            assert!(matches!(
                service.sales(&principal(role), ReportQuery::default()).await,
                Err(AppError::AccessDenied(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_default_window_near_the_earliest_date_is_rejected() {
        let service = service(Arc::new(MemoryStore::new()));
        let admin = principal(Role::Admin);

        let query = ReportQuery {
            to: Some(DateTime::<Utc>::MIN_UTC + Duration::days(1)),
            ..Default::default()
        };
        let err = service.sales(&admin, query).await.unwrap_err();
        match err {
            AppError::Validation { details, .. } => assert_eq!(details[0].field, "to"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
