//! Points ledger.
//!
//! Every mutation of a balance or an event pool goes through this module and
//! runs inside a single database transaction. Debits are conditional updates
//! (`points >= amount`) so concurrent requests cannot overdraw an account.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use thiserror::Error;

use crate::entities::{
    events, prelude::*, promotion_usages, sea_orm_active_enums::PromotionKind,
    sea_orm_active_enums::TransactionKind, transaction_promotions, transactions, users,
};
use crate::models::{Page, PageRequest};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient points")]
    InsufficientPoints,

    #[error("Promotion {0} has already been used")]
    PromotionUsed(i32),

    #[error("Transaction has already been processed")]
    AlreadyProcessed,

    #[error("Transaction is not a redemption")]
    NotRedemption,

    #[error("Not enough points remain for this event")]
    PoolExhausted,

    #[error("Record not found")]
    NotFound,

    #[error(transparent)]
    Db(#[from] DbErr),
}

/// A ledger row to be written. The owner's balance is only touched when the
/// caller asks for the delta to be applied.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub kind: TransactionKind,
    pub user_id: i32,
    pub points_delta: i64,
    pub spent: Option<f64>,
    pub related_id: Option<i32>,
    pub suspicious: bool,
    pub remark: String,
    pub created_by: i32,
}

impl NewEntry {
    #[must_use]
    pub const fn new(kind: TransactionKind, user_id: i32, points_delta: i64, created_by: i32) -> Self {
        Self {
            kind,
            user_id,
            points_delta,
            spent: None,
            related_id: None,
            suspicious: false,
            remark: String::new(),
            created_by,
        }
    }
}

/// A promotion attached to a ledger row together with the bonus it grants.
#[derive(Debug, Clone, Copy)]
pub struct AppliedPromotion {
    pub promotion_id: i32,
    pub kind: PromotionKind,
    pub bonus_points: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountOperator {
    Gte,
    Lte,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Restrict to rows owned by this user.
    pub user_id: Option<i32>,
    /// Substring of the owner's utorid or name.
    pub name: Option<String>,
    /// Utorid of the creator.
    pub created_by: Option<String>,
    pub suspicious: Option<bool>,
    pub processed: Option<bool>,
    pub promotion_id: Option<i32>,
    pub kind: Option<TransactionKind>,
    pub related_id: Option<i32>,
    pub amount: Option<(AmountOperator, i64)>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

/// A ledger row with the identities and promotions it refers to resolved.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub transaction: transactions::Model,
    pub utorid: String,
    pub created_by: String,
    pub processed_by: Option<String>,
    pub promotion_ids: Vec<i32>,
    pub bonus_points: i64,
}

impl TransactionRecord {
    /// Net change this row makes to the owner's balance once applied.
    #[must_use]
    pub const fn net_points(&self) -> i64 {
        net_points(&self.transaction, self.bonus_points)
    }
}

/// Redemptions carry their promotion bonus separately; every other kind
/// folds it into `points_delta` at creation.
const fn net_points(row: &transactions::Model, bonus: i64) -> i64 {
    match row.kind {
        TransactionKind::Redemption => row.points_delta + bonus,
        _ => row.points_delta,
    }
}

/// Whether a row's delta currently counts towards the owner's balance.
const fn is_applied(row: &transactions::Model) -> bool {
    !row.suspicious && (!matches!(row.kind, TransactionKind::Redemption) || row.processed)
}

async fn apply_delta<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    delta: i64,
) -> Result<(), LedgerError> {
    if delta == 0 {
        return Ok(());
    }

    let mut update = Users::update_many()
        .col_expr(
            users::Column::Points,
            Expr::col(users::Column::Points).add(delta),
        )
        .filter(users::Column::Id.eq(user_id));

    if delta < 0 {
        update = update.filter(users::Column::Points.gte(-delta));
    }

    let result = update.exec(conn).await?;
    if result.rows_affected == 0 {
        if delta < 0 && Users::find_by_id(user_id).one(conn).await?.is_some() {
            return Err(LedgerError::InsufficientPoints);
        }
        return Err(LedgerError::NotFound);
    }

    Ok(())
}

async fn consume_promotion<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    promotion_id: i32,
    transaction_id: i32,
) -> Result<(), LedgerError> {
    let usage = promotion_usages::ActiveModel {
        user_id: Set(user_id),
        promotion_id: Set(promotion_id),
        transaction_id: Set(transaction_id),
        used_at: Set(Utc::now()),
    };

    let inserted = PromotionUsages::insert(usage)
        .on_conflict(
            OnConflict::columns([
                promotion_usages::Column::UserId,
                promotion_usages::Column::PromotionId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    if inserted == 0 {
        return Err(LedgerError::PromotionUsed(promotion_id));
    }
    Ok(())
}

async fn insert_entry<C: ConnectionTrait>(
    conn: &C,
    entry: NewEntry,
    sender_id: Option<i32>,
    recipient_id: Option<i32>,
    event_id: Option<i32>,
) -> Result<transactions::Model, DbErr> {
    transactions::ActiveModel {
        kind: Set(entry.kind),
        user_id: Set(entry.user_id),
        points_delta: Set(entry.points_delta),
        spent: Set(entry.spent),
        related_id: Set(entry.related_id),
        sender_id: Set(sender_id),
        recipient_id: Set(recipient_id),
        event_id: Set(event_id),
        processed: Set(false),
        processed_by: Set(None),
        suspicious: Set(entry.suspicious),
        remark: Set(entry.remark),
        created_by: Set(entry.created_by),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await
}

pub struct LedgerRepository {
    conn: DatabaseConnection,
}

impl LedgerRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Records a purchase. One-time promotions are consumed for the customer
    /// and the total is credited unless the row is flagged suspicious.
    pub async fn create_purchase(
        &self,
        entry: NewEntry,
        promotions: &[AppliedPromotion],
    ) -> Result<transactions::Model, LedgerError> {
        let apply = !entry.suspicious;
        self.record(entry, promotions, true, apply).await
    }

    /// Records a manager adjustment and applies it immediately.
    pub async fn create_adjustment(
        &self,
        entry: NewEntry,
        promotions: &[AppliedPromotion],
    ) -> Result<transactions::Model, LedgerError> {
        self.record(entry, promotions, true, true).await
    }

    /// Records a redemption request. Nothing is debited or consumed until
    /// the request is processed.
    pub async fn create_redemption(
        &self,
        entry: NewEntry,
        promotions: &[AppliedPromotion],
    ) -> Result<transactions::Model, LedgerError> {
        self.record(entry, promotions, false, false).await
    }

    async fn record(
        &self,
        entry: NewEntry,
        promotions: &[AppliedPromotion],
        consume: bool,
        apply: bool,
    ) -> Result<transactions::Model, LedgerError> {
        let txn = self.conn.begin().await?;
        let user_id = entry.user_id;

        let row = insert_entry(&txn, entry, None, None, None).await?;

        for promotion in promotions {
            TransactionPromotions::insert(transaction_promotions::ActiveModel {
                transaction_id: Set(row.id),
                promotion_id: Set(promotion.promotion_id),
                bonus_points: Set(promotion.bonus_points),
            })
            .exec_without_returning(&txn)
            .await?;

            if consume && promotion.kind == PromotionKind::Onetime {
                consume_promotion(&txn, user_id, promotion.promotion_id, row.id).await?;
            }
        }

        if apply {
            apply_delta(&txn, user_id, row.points_delta).await?;
        }

        txn.commit().await?;
        Ok(row)
    }

    /// Moves `amount` points from `sender_id` to `recipient_id`, writing one
    /// row for each side. Returns `(sent, received)`.
    pub async fn transfer(
        &self,
        sender_id: i32,
        recipient_id: i32,
        amount: i64,
        remark: String,
    ) -> Result<(transactions::Model, transactions::Model), LedgerError> {
        let txn = self.conn.begin().await?;

        apply_delta(&txn, sender_id, -amount).await?;
        apply_delta(&txn, recipient_id, amount).await?;

        let mut sent = NewEntry::new(TransactionKind::Transfer, sender_id, -amount, sender_id);
        sent.related_id = Some(recipient_id);
        sent.remark.clone_from(&remark);
        let sent = insert_entry(&txn, sent, Some(sender_id), Some(recipient_id), None).await?;

        let mut received = NewEntry::new(TransactionKind::Transfer, recipient_id, amount, sender_id);
        received.related_id = Some(sender_id);
        received.remark = remark;
        let received =
            insert_entry(&txn, received, Some(sender_id), Some(recipient_id), None).await?;

        txn.commit().await?;
        Ok((sent, received))
    }

    /// Marks a redemption processed, debits the owner and credits the bonus
    /// of any linked promotions, consuming the one-time ones.
    pub async fn process_redemption(
        &self,
        id: i32,
        cashier_id: i32,
    ) -> Result<transactions::Model, LedgerError> {
        let txn = self.conn.begin().await?;

        // Claim first so the transaction holds the write lock before reading.
        let claimed = Transactions::update_many()
            .col_expr(transactions::Column::Processed, Expr::value(true))
            .col_expr(transactions::Column::ProcessedBy, Expr::value(cashier_id))
            .col_expr(transactions::Column::RelatedId, Expr::value(cashier_id))
            .filter(transactions::Column::Id.eq(id))
            .filter(transactions::Column::Kind.eq(TransactionKind::Redemption))
            .filter(transactions::Column::Processed.eq(false))
            .exec(&txn)
            .await?;

        if claimed.rows_affected == 0 {
            return match Transactions::find_by_id(id).one(&txn).await? {
                None => Err(LedgerError::NotFound),
                Some(row) if row.kind != TransactionKind::Redemption => {
                    Err(LedgerError::NotRedemption)
                }
                Some(_) => Err(LedgerError::AlreadyProcessed),
            };
        }

        let row = Transactions::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(LedgerError::NotFound)?;

        let linked = TransactionPromotions::find()
            .filter(transaction_promotions::Column::TransactionId.eq(id))
            .find_also_related(Promotions)
            .all(&txn)
            .await?;

        let mut bonus = 0;
        for (link, promotion) in linked {
            bonus += link.bonus_points;
            if promotion.is_some_and(|p| p.kind == PromotionKind::Onetime) {
                consume_promotion(&txn, row.user_id, link.promotion_id, id).await?;
            }
        }

        if !row.suspicious {
            apply_delta(&txn, row.user_id, row.points_delta).await?;
            apply_delta(&txn, row.user_id, bonus).await?;
        }

        let updated = Transactions::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(LedgerError::NotFound)?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Flags or clears a row. An applied delta is reversed when flagged and
    /// restored when cleared. Unchanged flags are a no-op.
    pub async fn set_suspicious(
        &self,
        id: i32,
        suspicious: bool,
    ) -> Result<transactions::Model, LedgerError> {
        let txn = self.conn.begin().await?;

        let flipped = Transactions::update_many()
            .col_expr(transactions::Column::Suspicious, Expr::value(suspicious))
            .filter(transactions::Column::Id.eq(id))
            .filter(transactions::Column::Suspicious.eq(!suspicious))
            .exec(&txn)
            .await?;

        let updated = Transactions::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(LedgerError::NotFound)?;

        if flipped.rows_affected == 0 {
            return Ok(updated);
        }

        // The delta counts while the row is clear of suspicion.
        let cleared = transactions::Model {
            suspicious: false,
            ..updated.clone()
        };
        if is_applied(&cleared) {
            let bonus = bonus_points(&txn, id).await?;
            let net = net_points(&updated, bonus);
            let delta = if suspicious { -net } else { net };
            apply_delta(&txn, updated.user_id, delta).await?;
        }

        txn.commit().await?;
        Ok(updated)
    }

    /// Awards `amount` to each guest from the event pool. The pool decrement
    /// is conditional on enough points remaining.
    pub async fn award_event(
        &self,
        event_id: i32,
        guest_ids: &[i32],
        amount: i64,
        remark: &str,
        created_by: i32,
    ) -> Result<Vec<transactions::Model>, LedgerError> {
        let count = i64::try_from(guest_ids.len()).unwrap_or(i64::MAX);
        let total = amount.saturating_mul(count);

        let txn = self.conn.begin().await?;

        let reserved = Events::update_many()
            .col_expr(
                events::Column::PointsRemain,
                Expr::col(events::Column::PointsRemain).sub(total),
            )
            .col_expr(
                events::Column::PointsAwarded,
                Expr::col(events::Column::PointsAwarded).add(total),
            )
            .filter(events::Column::Id.eq(event_id))
            .filter(events::Column::PointsRemain.gte(total))
            .exec(&txn)
            .await?;

        if reserved.rows_affected == 0 {
            return if Events::find_by_id(event_id).one(&txn).await?.is_some() {
                Err(LedgerError::PoolExhausted)
            } else {
                Err(LedgerError::NotFound)
            };
        }

        let mut rows = Vec::with_capacity(guest_ids.len());
        for &guest_id in guest_ids {
            apply_delta(&txn, guest_id, amount).await?;

            let mut entry = NewEntry::new(TransactionKind::Event, guest_id, amount, created_by);
            entry.related_id = Some(event_id);
            entry.remark = remark.to_string();
            rows.push(insert_entry(&txn, entry, None, None, Some(event_id)).await?);
        }

        txn.commit().await?;
        Ok(rows)
    }

    pub async fn get_row(&self, id: i32) -> Result<Option<transactions::Model>> {
        Ok(Transactions::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn get(&self, id: i32) -> Result<Option<TransactionRecord>> {
        let Some(row) = self.get_row(id).await? else {
            return Ok(None);
        };
        Ok(self.enrich(vec![row]).await?.pop())
    }

    pub async fn list(
        &self,
        filter: &TransactionFilter,
        page: PageRequest,
    ) -> Result<Page<TransactionRecord>> {
        let query = Transactions::find()
            .filter(Self::condition(filter))
            .order_by_desc(transactions::Column::CreatedAt)
            .order_by_desc(transactions::Column::Id);

        let paginator = query.paginate(&self.conn, page.limit);
        let count = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.index()).await?;
        let results = self.enrich(rows).await?;

        Ok(Page { count, results })
    }

    fn condition(filter: &TransactionFilter) -> Condition {
        let mut cond = Condition::all();

        if let Some(user_id) = filter.user_id {
            cond = cond.add(transactions::Column::UserId.eq(user_id));
        }
        if let Some(name) = &filter.name {
            cond = cond.add(
                transactions::Column::UserId.in_subquery(
                    Query::select()
                        .column(users::Column::Id)
                        .from(Users)
                        .cond_where(
                            Condition::any()
                                .add(users::Column::Utorid.contains(name))
                                .add(users::Column::Name.contains(name)),
                        )
                        .to_owned(),
                ),
            );
        }
        if let Some(created_by) = &filter.created_by {
            cond = cond.add(
                transactions::Column::CreatedBy.in_subquery(
                    Query::select()
                        .column(users::Column::Id)
                        .from(Users)
                        .and_where(users::Column::Utorid.eq(created_by.as_str()))
                        .to_owned(),
                ),
            );
        }
        if let Some(suspicious) = filter.suspicious {
            cond = cond.add(transactions::Column::Suspicious.eq(suspicious));
        }
        if let Some(processed) = filter.processed {
            cond = cond.add(transactions::Column::Processed.eq(processed));
        }
        if let Some(promotion_id) = filter.promotion_id {
            cond = cond.add(
                transactions::Column::Id.in_subquery(
                    Query::select()
                        .column(transaction_promotions::Column::TransactionId)
                        .from(TransactionPromotions)
                        .and_where(transaction_promotions::Column::PromotionId.eq(promotion_id))
                        .to_owned(),
                ),
            );
        }
        if let Some(kind) = filter.kind {
            cond = cond.add(transactions::Column::Kind.eq(kind));
        }
        if let Some(related_id) = filter.related_id {
            cond = cond.add(transactions::Column::RelatedId.eq(related_id));
        }
        if let Some((operator, amount)) = filter.amount {
            cond = cond.add(match operator {
                AmountOperator::Gte => transactions::Column::PointsDelta.gte(amount),
                AmountOperator::Lte => transactions::Column::PointsDelta.lte(amount),
            });
        }
        if let Some(after) = filter.after {
            cond = cond.add(transactions::Column::CreatedAt.gte(after));
        }
        if let Some(before) = filter.before {
            cond = cond.add(transactions::Column::CreatedAt.lt(before));
        }

        cond
    }

    /// Resolves utorids and promotion links for a batch of rows.
    pub async fn enrich(&self, rows: Vec<transactions::Model>) -> Result<Vec<TransactionRecord>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut user_ids: Vec<i32> = rows
            .iter()
            .flat_map(|r| [Some(r.user_id), Some(r.created_by), r.processed_by])
            .flatten()
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let utorids: HashMap<i32, String> = Users::find()
            .filter(users::Column::Id.is_in(user_ids))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|u| (u.id, u.utorid))
            .collect();

        let row_ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let mut links: HashMap<i32, Vec<transaction_promotions::Model>> = HashMap::new();
        for link in TransactionPromotions::find()
            .filter(transaction_promotions::Column::TransactionId.is_in(row_ids))
            .order_by_asc(transaction_promotions::Column::PromotionId)
            .all(&self.conn)
            .await?
        {
            links.entry(link.transaction_id).or_default().push(link);
        }

        let lookup = |id: i32| utorids.get(&id).cloned().unwrap_or_default();

        Ok(rows
            .into_iter()
            .map(|row| {
                let linked = links.remove(&row.id).unwrap_or_default();
                TransactionRecord {
                    utorid: lookup(row.user_id),
                    created_by: lookup(row.created_by),
                    processed_by: row.processed_by.map(lookup),
                    promotion_ids: linked.iter().map(|l| l.promotion_id).collect(),
                    bonus_points: linked.iter().map(|l| l.bonus_points).sum(),
                    transaction: row,
                }
            })
            .collect())
    }
}

async fn bonus_points<C: ConnectionTrait>(conn: &C, transaction_id: i32) -> Result<i64, DbErr> {
    Ok(TransactionPromotions::find()
        .filter(transaction_promotions::Column::TransactionId.eq(transaction_id))
        .all(conn)
        .await?
        .iter()
        .map(|l| l.bonus_points)
        .sum())
}
