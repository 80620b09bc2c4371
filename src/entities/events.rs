use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    pub description: String,

    pub location: String,

    pub start_time: DateTimeUtc,

    pub end_time: DateTimeUtc,

    /// `None` means unlimited.
    pub capacity: Option<i32>,

    pub points_total: i64,

    pub points_remain: i64,

    pub points_awarded: i64,

    pub published: bool,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::event_guests::Entity")]
    Guests,
    #[sea_orm(has_many = "super::event_organizers::Entity")]
    Organizers,
}

impl Related<super::event_guests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Guests.def()
    }
}

impl Related<super::event_organizers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organizers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
