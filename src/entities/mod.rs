pub mod prelude;

pub mod event_guests;
pub mod event_organizers;
pub mod events;
pub mod promotion_usages;
pub mod promotions;
pub mod sea_orm_active_enums;
pub mod transaction_promotions;
pub mod transactions;
pub mod users;
