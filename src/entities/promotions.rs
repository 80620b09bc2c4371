use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::PromotionKind;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "promotions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    pub description: String,

    pub kind: PromotionKind,

    pub start_time: DateTimeUtc,

    pub end_time: DateTimeUtc,

    /// Minimum purchase in dollars for the promotion to apply.
    pub min_spending: Option<f64>,

    /// Extra points per cent spent.
    pub rate: Option<f64>,

    /// Flat bonus points.
    pub points: Option<i64>,

    pub created_at: DateTimeUtc,
}

impl Model {
    #[must_use]
    pub fn is_active_at(&self, now: DateTimeUtc) -> bool {
        self.start_time <= now && now < self.end_time
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::promotion_usages::Entity")]
    Usages,
}

impl Related<super::promotion_usages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Usages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
