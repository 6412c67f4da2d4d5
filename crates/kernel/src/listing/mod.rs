//! Paginated, filtered, sorted and searchable list queries.
//!
//! A raw request is parsed into a [`ListQuerySpec`], applied to a
//! [`ListBuilder`] by the composer functions, then executed and wrapped by
//! the paginator.

pub mod builder;
pub mod composer;
pub mod paginate;
pub mod spec;

pub use builder::{ListBuilder, Predicate, SqlListQuery};
pub use composer::{
    qualify, set_filter, set_in_operator, set_pagination, set_search, set_sorting, to_column_name,
};
pub use paginate::{PageMeta, PaginatedResponse, build_response, execute, paginate};
pub use spec::{
    FilterKey, FilterKind, FilterScalar, FilterValue, ListQueryError, ListQuerySpec,
    OrderDirection, RawListQuery, RawValue,
};
