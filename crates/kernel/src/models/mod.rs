//! Database models.

pub mod category;
pub mod location;
pub mod post;
pub mod user;

pub use category::{
    Category, CategoryGroupSummary, CategoryLookup, CategorySummary, CreateCategory,
    UpdateCategory,
};
pub use location::{District, Province};
pub use post::{CreatePost, Post, PostFilter, PostLookup, PostStatus, UpdatePost};
pub use user::{Actor, Role, User, UserLookup, UserRoleMapping, Website};
