use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "regular")]
    Regular,
    #[sea_orm(string_value = "organizer")]
    Organizer,
    #[sea_orm(string_value = "cashier")]
    Cashier,
    #[sea_orm(string_value = "manager")]
    Manager,
    #[sea_orm(string_value = "superuser")]
    Superuser,
}

impl Role {
    /// Organizers are club accounts; their extra rights are per event.
    #[must_use]
    pub const fn clearance(self) -> u8 {
        match self {
            Self::Regular | Self::Organizer => 0,
            Self::Cashier => 1,
            Self::Manager => 2,
            Self::Superuser => 3,
        }
    }

    #[must_use]
    pub const fn at_least(self, other: Self) -> bool {
        self.clearance() >= other.clearance()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Organizer => "organizer",
            Self::Cashier => "cashier",
            Self::Manager => "manager",
            Self::Superuser => "superuser",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    #[sea_orm(string_value = "purchase")]
    Purchase,
    #[sea_orm(string_value = "transfer")]
    Transfer,
    #[sea_orm(string_value = "redemption")]
    Redemption,
    #[sea_orm(string_value = "event")]
    Event,
    #[sea_orm(string_value = "adjustment")]
    Adjustment,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum PromotionKind {
    #[sea_orm(string_value = "automatic")]
    Automatic,
    #[sea_orm(string_value = "onetime")]
    #[serde(alias = "one-time")]
    Onetime,
}
