use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::TransactionKind;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub kind: TransactionKind,

    /// Owner of this ledger row.
    pub user_id: i32,

    /// Signed change to the owner's balance. Redemptions are only applied
    /// once processed; suspicious rows are not applied.
    pub points_delta: i64,

    pub spent: Option<f64>,

    pub related_id: Option<i32>,

    pub sender_id: Option<i32>,

    pub recipient_id: Option<i32>,

    pub event_id: Option<i32>,

    pub processed: bool,

    pub processed_by: Option<i32>,

    pub suspicious: bool,

    pub remark: String,

    pub created_by: i32,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::transaction_promotions::Entity")]
    TransactionPromotions,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::transaction_promotions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransactionPromotions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
