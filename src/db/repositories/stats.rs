use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
};
use serde::Serialize;

use crate::entities::{
    events, prelude::*, promotions,
    sea_orm_active_enums::{Role, TransactionKind},
    transactions, users,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindTotals {
    pub kind: TransactionKind,
    pub count: i64,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCount {
    pub role: Role,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStats {
    pub users_by_role: Vec<RoleCount>,
    pub verified_users: u64,
    pub outstanding_points: i64,
    pub transactions_by_kind: Vec<KindTotals>,
    pub pending_redemptions: u64,
    pub suspicious_transactions: u64,
    pub total_events: u64,
    pub published_events: u64,
    pub upcoming_events: u64,
    pub active_promotions: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashierStats {
    pub cashier_id: i32,
    pub purchases: u64,
    pub total_spent: f64,
    pub points_issued: i64,
    pub redemptions_processed: u64,
    pub points_redeemed: i64,
}

pub struct StatsRepository {
    conn: DatabaseConnection,
}

impl StatsRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn manager(&self, now: DateTime<Utc>) -> Result<ManagerStats> {
        let users_by_role: Vec<(Role, i64)> = Users::find()
            .select_only()
            .column(users::Column::Role)
            .column_as(users::Column::Id.count(), "count")
            .group_by(users::Column::Role)
            .into_tuple()
            .all(&self.conn)
            .await?;

        let verified_users = Users::find()
            .filter(users::Column::Verified.eq(true))
            .count(&self.conn)
            .await?;

        let outstanding_points: Option<i64> = Users::find()
            .select_only()
            .column_as(users::Column::Points.sum(), "sum")
            .into_tuple()
            .one(&self.conn)
            .await?
            .flatten();

        let by_kind: Vec<(TransactionKind, i64, Option<i64>)> = Transactions::find()
            .select_only()
            .column(transactions::Column::Kind)
            .column_as(transactions::Column::Id.count(), "count")
            .column_as(transactions::Column::PointsDelta.sum(), "points")
            .group_by(transactions::Column::Kind)
            .into_tuple()
            .all(&self.conn)
            .await?;

        let pending_redemptions = Transactions::find()
            .filter(transactions::Column::Kind.eq(TransactionKind::Redemption))
            .filter(transactions::Column::Processed.eq(false))
            .count(&self.conn)
            .await?;

        let suspicious_transactions = Transactions::find()
            .filter(transactions::Column::Suspicious.eq(true))
            .count(&self.conn)
            .await?;

        let total_events = Events::find().count(&self.conn).await?;
        let published_events = Events::find()
            .filter(events::Column::Published.eq(true))
            .count(&self.conn)
            .await?;
        let upcoming_events = Events::find()
            .filter(events::Column::StartTime.gt(now))
            .count(&self.conn)
            .await?;

        let active_promotions = Promotions::find()
            .filter(promotions::Column::StartTime.lte(now))
            .filter(promotions::Column::EndTime.gt(now))
            .count(&self.conn)
            .await?;

        Ok(ManagerStats {
            users_by_role: users_by_role
                .into_iter()
                .map(|(role, count)| RoleCount { role, count })
                .collect(),
            verified_users,
            outstanding_points: outstanding_points.unwrap_or(0),
            transactions_by_kind: by_kind
                .into_iter()
                .map(|(kind, count, points)| KindTotals {
                    kind,
                    count,
                    points: points.unwrap_or(0),
                })
                .collect(),
            pending_redemptions,
            suspicious_transactions,
            total_events,
            published_events,
            upcoming_events,
            active_promotions,
        })
    }

    pub async fn cashier(&self, cashier_id: i32) -> Result<CashierStats> {
        let purchases = Transactions::find()
            .filter(transactions::Column::Kind.eq(TransactionKind::Purchase))
            .filter(transactions::Column::CreatedBy.eq(cashier_id));

        let purchase_count = purchases.clone().count(&self.conn).await?;

        let (total_spent, points_issued): (Option<f64>, Option<i64>) = purchases
            .clone()
            .select_only()
            .column_as(transactions::Column::Spent.sum(), "spent")
            .column_as(transactions::Column::PointsDelta.sum(), "points")
            .filter(transactions::Column::Suspicious.eq(false))
            .into_tuple()
            .one(&self.conn)
            .await?
            .unwrap_or((None, None));

        let redemptions = Transactions::find()
            .filter(transactions::Column::Kind.eq(TransactionKind::Redemption))
            .filter(transactions::Column::ProcessedBy.eq(cashier_id));

        let redemptions_processed = redemptions.clone().count(&self.conn).await?;

        let redeemed: Option<i64> = redemptions
            .select_only()
            .column_as(transactions::Column::PointsDelta.sum(), "points")
            .into_tuple()
            .one(&self.conn)
            .await?
            .flatten();

        Ok(CashierStats {
            cashier_id,
            purchases: purchase_count,
            total_spent: total_spent.unwrap_or(0.0),
            points_issued: points_issued.unwrap_or(0),
            redemptions_processed,
            points_redeemed: -redeemed.unwrap_or(0),
        })
    }
}
