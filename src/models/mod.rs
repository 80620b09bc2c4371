pub mod actor;
pub mod page;
pub mod points;

pub use actor::Actor;
pub use page::{Page, PageRequest};
