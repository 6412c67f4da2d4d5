//! Resource services.
//!
//! Each service owns a pool (and a search handle where it needs one) and
//! builds its listings through the list composer.

pub mod category;
pub mod location;
pub mod post;
pub mod slug;
pub mod user;

pub use category::CategoryService;
pub use location::LocationService;
pub use post::PostService;
pub use user::UserService;
