use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::Role;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub utorid: String,

    pub name: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id hash; absent until the account is activated or for
    /// Google-only accounts.
    pub password_hash: Option<String>,

    pub role: Role,

    pub points: i64,

    pub verified: bool,

    pub activated: bool,

    pub suspicious: bool,

    /// `YYYY-MM-DD`
    pub birthday: Option<String>,

    pub avatar_url: Option<String>,

    pub reset_token: Option<String>,

    pub reset_expires_at: Option<DateTimeUtc>,

    pub verification_token: Option<String>,

    pub google_sub: Option<String>,

    pub created_at: DateTimeUtc,

    pub last_login: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
