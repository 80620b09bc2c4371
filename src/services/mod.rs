pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, ResetIssued, SignupInput, TokenResult};
pub use auth_service_impl::SeaOrmAuthService;

pub mod user_service;
pub mod user_service_impl;
pub use user_service::{
    AdminUpdate, CustomerView, ProfileUpdate, RegisterInput, RegisteredUser, UserError,
    UserLookup, UserQuery, UserService, UserView,
};
pub use user_service_impl::SeaOrmUserService;

pub mod transaction_service;
pub mod transaction_service_impl;
pub use transaction_service::{
    AdjustmentInput, PurchaseInput, RedemptionInput, TransactionError, TransactionQuery,
    TransactionService, TransactionView, TransferInput,
};
pub use transaction_service_impl::SeaOrmTransactionService;

pub mod event_service;
pub mod event_service_impl;
pub use event_service::{
    AwardInput, EventError, EventInput, EventListItem, EventQuery, EventService, EventUpdate,
    EventView, GuestAdded, UserBrief,
};
pub use event_service_impl::SeaOrmEventService;

pub mod promotion_service;
pub mod promotion_service_impl;
pub use promotion_service::{
    PromotionError, PromotionInput, PromotionQuery, PromotionService, PromotionUpdate,
    PromotionView,
};
pub use promotion_service_impl::SeaOrmPromotionService;
