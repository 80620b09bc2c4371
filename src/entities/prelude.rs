pub use super::event_guests::Entity as EventGuests;
pub use super::event_organizers::Entity as EventOrganizers;
pub use super::events::Entity as Events;
pub use super::promotion_usages::Entity as PromotionUsages;
pub use super::promotions::Entity as Promotions;
pub use super::transaction_promotions::Entity as TransactionPromotions;
pub use super::transactions::Entity as Transactions;
pub use super::users::Entity as Users;
