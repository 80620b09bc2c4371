//! `SeaORM` implementation of the `TransactionService` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::db::{AppliedPromotion, NewEntry, Store, TransactionFilter};
use crate::entities::{
    promotions,
    sea_orm_active_enums::{PromotionKind, TransactionKind},
    users,
};
use crate::models::points::{base_points, meets_min_spending, promotion_bonus};
use crate::models::{Actor, Page, PageRequest};
use crate::services::transaction_service::{
    AdjustmentInput, PurchaseInput, RedemptionInput, TransactionError, TransactionQuery,
    TransactionService, TransactionView, TransferInput,
};

pub struct SeaOrmTransactionService {
    store: Store,
}

impl SeaOrmTransactionService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    async fn customer(&self, utorid: &str) -> Result<users::Model, TransactionError> {
        self.store
            .users()
            .get_by_utorid(utorid)
            .await?
            .ok_or_else(|| TransactionError::NotFound(format!("User {utorid} not found")))
    }

    async fn view(&self, id: i32) -> Result<TransactionView, TransactionError> {
        self.store
            .ledger()
            .get(id)
            .await?
            .map(TransactionView::from)
            .ok_or_else(|| TransactionError::NotFound(format!("Transaction {id} not found")))
    }

    /// Validates the promotions a request names for `user_id`. `spent` is
    /// `None` when there is no purchase amount to check thresholds against.
    async fn requested_promotions(
        &self,
        user_id: i32,
        ids: &[i32],
        spent: Option<f64>,
        onetime_only: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<promotions::Model>, TransactionError> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let found = self.store.promotions().get_many(&ids).await?;
        let mut selected = Vec::with_capacity(ids.len());

        for id in ids {
            let promotion = found
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .ok_or_else(|| TransactionError::Validation(format!("Promotion {id} does not exist")))?;

            if !promotion.is_active_at(now) {
                return Err(TransactionError::Validation(format!(
                    "Promotion {id} is not active"
                )));
            }
            if onetime_only && promotion.kind != PromotionKind::Onetime {
                return Err(TransactionError::Validation(format!(
                    "Promotion {id} is not a one-time promotion"
                )));
            }
            if promotion.kind == PromotionKind::Onetime
                && self.store.promotions().is_used(user_id, id).await?
            {
                return Err(TransactionError::Validation(format!(
                    "Promotion {id} has already been used"
                )));
            }
            if spent.is_some_and(|s| !meets_min_spending(&promotion, s)) {
                return Err(TransactionError::Validation(format!(
                    "Purchase does not meet the minimum spending for promotion {id}"
                )));
            }

            selected.push(promotion);
        }

        Ok(selected)
    }
}

fn applied(promotions: &[promotions::Model], spent: f64) -> Vec<AppliedPromotion> {
    promotions
        .iter()
        .map(|p| AppliedPromotion {
            promotion_id: p.id,
            kind: p.kind,
            bonus_points: promotion_bonus(p, spent),
        })
        .collect()
}

fn bonus_total(applied: &[AppliedPromotion]) -> i64 {
    applied.iter().map(|a| a.bonus_points).sum()
}

#[async_trait]
impl TransactionService for SeaOrmTransactionService {
    async fn create_purchase(
        &self,
        actor: &Actor,
        input: PurchaseInput,
    ) -> Result<TransactionView, TransactionError> {
        if !input.spent.is_finite() || input.spent <= 0.0 {
            return Err(TransactionError::Validation(
                "spent must be a positive amount".to_string(),
            ));
        }

        let customer = self.customer(&input.utorid).await?;
        let now = Utc::now();

        let mut promotions = self
            .requested_promotions(customer.id, &input.promotion_ids, Some(input.spent), false, now)
            .await?;

        for automatic in self.store.promotions().active_automatic(now).await? {
            if meets_min_spending(&automatic, input.spent)
                && !promotions.iter().any(|p| p.id == automatic.id)
            {
                promotions.push(automatic);
            }
        }

        let applied = applied(&promotions, input.spent);
        let earned = base_points(input.spent) + bonus_total(&applied);

        let mut entry = NewEntry::new(TransactionKind::Purchase, customer.id, earned, actor.id);
        entry.spent = Some(input.spent);
        entry.suspicious = actor.suspicious;
        entry.remark = input.remark;

        let row = self.store.ledger().create_purchase(entry, &applied).await?;

        if row.suspicious {
            warn!(
                transaction_id = row.id,
                cashier_id = actor.id,
                "Purchase by suspicious cashier flagged; points withheld"
            );
        } else {
            info!(transaction_id = row.id, user_id = customer.id, points = earned, "Purchase recorded");
        }

        self.view(row.id).await
    }

    async fn create_adjustment(
        &self,
        actor: &Actor,
        input: AdjustmentInput,
    ) -> Result<TransactionView, TransactionError> {
        if input.amount == 0 {
            return Err(TransactionError::Validation(
                "amount must be non-zero".to_string(),
            ));
        }

        let customer = self.customer(&input.utorid).await?;
        let related = self
            .store
            .ledger()
            .get_row(input.related_id)
            .await?
            .ok_or_else(|| {
                TransactionError::NotFound(format!("Transaction {} not found", input.related_id))
            })?;

        let spent = related.spent.unwrap_or(0.0);
        let promotions = self
            .requested_promotions(customer.id, &input.promotion_ids, None, false, Utc::now())
            .await?;
        let applied = applied(&promotions, spent);

        let mut entry = NewEntry::new(
            TransactionKind::Adjustment,
            customer.id,
            input.amount + bonus_total(&applied),
            actor.id,
        );
        entry.related_id = Some(related.id);
        entry.remark = input.remark;

        let row = self.store.ledger().create_adjustment(entry, &applied).await?;
        info!(
            transaction_id = row.id,
            related_id = related.id,
            amount = row.points_delta,
            "Adjustment recorded"
        );

        self.view(row.id).await
    }

    async fn create_redemption(
        &self,
        actor: &Actor,
        input: RedemptionInput,
    ) -> Result<TransactionView, TransactionError> {
        if input.amount <= 0 {
            return Err(TransactionError::Validation(
                "amount must be a positive integer".to_string(),
            ));
        }

        let user = self
            .store
            .users()
            .get(actor.id)
            .await?
            .ok_or_else(|| TransactionError::NotFound(format!("User {} not found", actor.id)))?;

        if !user.verified {
            return Err(TransactionError::Forbidden(
                "Only verified users can redeem points".to_string(),
            ));
        }
        if input.amount > user.points {
            return Err(TransactionError::Validation(
                "Insufficient points".to_string(),
            ));
        }

        let promotions = self
            .requested_promotions(user.id, &input.promotion_ids, None, true, Utc::now())
            .await?;
        let applied = applied(&promotions, 0.0);

        let mut entry = NewEntry::new(TransactionKind::Redemption, user.id, -input.amount, user.id);
        entry.remark = input.remark;

        let row = self.store.ledger().create_redemption(entry, &applied).await?;
        info!(transaction_id = row.id, user_id = user.id, amount = input.amount, "Redemption requested");

        self.view(row.id).await
    }

    async fn transfer(
        &self,
        actor: &Actor,
        recipient_id: i32,
        input: TransferInput,
    ) -> Result<TransactionView, TransactionError> {
        if input.amount <= 0 {
            return Err(TransactionError::Validation(
                "amount must be a positive integer".to_string(),
            ));
        }
        if !actor.verified {
            return Err(TransactionError::Forbidden(
                "Only verified users can transfer points".to_string(),
            ));
        }
        if recipient_id == actor.id {
            return Err(TransactionError::Validation(
                "Cannot transfer points to yourself".to_string(),
            ));
        }

        let users = self.store.users();
        let recipient = users
            .get(recipient_id)
            .await?
            .ok_or_else(|| TransactionError::NotFound(format!("User {recipient_id} not found")))?;

        let sender = users
            .get(actor.id)
            .await?
            .ok_or_else(|| TransactionError::NotFound(format!("User {} not found", actor.id)))?;
        if input.amount > sender.points {
            return Err(TransactionError::Validation(
                "Insufficient points".to_string(),
            ));
        }

        let (sent, _) = self
            .store
            .ledger()
            .transfer(sender.id, recipient.id, input.amount, input.remark)
            .await?;

        info!(
            sender_id = sender.id,
            recipient_id = recipient.id,
            amount = input.amount,
            "Points transferred"
        );

        self.view(sent.id).await
    }

    async fn list(
        &self,
        query: TransactionQuery,
        page: PageRequest,
    ) -> Result<Page<TransactionView>, TransactionError> {
        let filter = filter_from(query, None);
        let page = self.store.ledger().list(&filter, page).await?;
        Ok(page.map(TransactionView::from))
    }

    async fn list_for_user(
        &self,
        actor: &Actor,
        query: TransactionQuery,
        page: PageRequest,
    ) -> Result<Page<TransactionView>, TransactionError> {
        let filter = filter_from(query, Some(actor.id));
        let page = self.store.ledger().list(&filter, page).await?;
        Ok(page.map(TransactionView::from))
    }

    async fn get(&self, id: i32) -> Result<TransactionView, TransactionError> {
        self.view(id).await
    }

    async fn set_suspicious(
        &self,
        id: i32,
        suspicious: bool,
    ) -> Result<TransactionView, TransactionError> {
        let row = self.store.ledger().set_suspicious(id, suspicious).await?;
        info!(transaction_id = row.id, suspicious, "Transaction flag updated");
        self.view(row.id).await
    }

    async fn process_redemption(
        &self,
        actor: &Actor,
        id: i32,
    ) -> Result<TransactionView, TransactionError> {
        let row = self.store.ledger().process_redemption(id, actor.id).await?;
        info!(transaction_id = row.id, cashier_id = actor.id, "Redemption processed");
        self.view(row.id).await
    }
}

fn filter_from(query: TransactionQuery, user_id: Option<i32>) -> TransactionFilter {
    TransactionFilter {
        user_id,
        name: query.name,
        created_by: query.created_by,
        suspicious: query.suspicious,
        processed: query.processed,
        promotion_id: query.promotion_id,
        kind: query.kind,
        related_id: query.related_id,
        amount: query.amount,
        after: query.after,
        before: query.before,
    }
}
