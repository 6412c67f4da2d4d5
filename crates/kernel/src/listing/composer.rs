//! Query composer: stateless operations that apply a [`ListQuerySpec`] to
//! any [`ListBuilder`].
//!
//! Resource services call these in a fixed order: filters, then search,
//! then sorting, then pagination. Pagination must come after every
//! row-selecting step so skip/take apply to the filtered set.

use tracing::debug;

use super::builder::{ListBuilder, Predicate, is_safe_column};
use super::spec::{DEFAULT_ORDER_BY, FilterScalar, FilterValue, ListQuerySpec, ListQueryError};
use crate::error::AppResult;
use crate::search::SearchBridge;

/// Apply skip = offset, and take = limit only when limit > 0.
pub fn set_pagination<B: ListBuilder>(builder: &mut B, spec: &ListQuerySpec) {
    builder.skip(spec.offset);
    if spec.limit > 0 {
        builder.take(spec.limit);
    }
}

/// Convert a camelCase field name to its snake_case column.
pub fn to_column_name(field: &str) -> String {
    let mut column = String::with_capacity(field.len() + 4);
    for (i, c) in field.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                column.push('_');
            }
            column.push(c.to_ascii_lowercase());
        } else {
            column.push(c);
        }
    }
    column
}

/// Qualify `field` with `table_alias` unless it already names a table.
/// Each segment is converted to snake_case.
pub fn qualify(table_alias: &str, field: &str) -> String {
    match field.split_once('.') {
        Some((table, column)) => format!("{}.{}", to_column_name(table), to_column_name(column)),
        None => format!("{table_alias}.{}", to_column_name(field)),
    }
}

/// Order by `spec.order_by` (default `createdAt`) in `spec.order_direction`,
/// then by `{table_alias}.id` so rows with equal sort keys page stably.
///
/// Callers remap logical names (e.g. `categoryGroupName`) to qualified paths
/// before calling.
pub fn set_sorting<B: ListBuilder>(
    builder: &mut B,
    spec: &ListQuerySpec,
    table_alias: &str,
) -> Result<(), ListQueryError> {
    let field = if spec.order_by.is_empty() {
        DEFAULT_ORDER_BY
    } else {
        spec.order_by.as_str()
    };
    let column = qualify(table_alias, field);
    if !is_safe_column(&column) {
        return Err(ListQueryError::InvalidSort(spec.order_by.clone()));
    }

    builder.order_by(&column, spec.order_direction);

    let tie_break = format!("{table_alias}.id");
    if column != tie_break {
        builder.order_by(&tie_break, spec.order_direction);
    }
    Ok(())
}

/// Add an `IN` predicate per field. No-op when either list is empty.
pub fn set_in_operator<B: ListBuilder>(builder: &mut B, values: &[FilterScalar], fields: &[&str]) {
    if fields.is_empty() || values.is_empty() {
        return;
    }
    for field in fields {
        builder.and_where(Predicate::In {
            column: (*field).to_string(),
            values: values.to_vec(),
        });
    }
}

/// Apply the optional filter stored under `key`.
///
/// A list value behaves like [`set_in_operator`]; a truthy scalar adds an
/// equality per field; absent, falsy and null values are skipped.
/// Unqualified fields are prefixed with `table_alias`.
pub fn set_filter<B: ListBuilder>(
    builder: &mut B,
    spec: &ListQuerySpec,
    table_alias: &str,
    key: &str,
    fields: &[&str],
) {
    let Some(value) = spec.filter(key) else {
        return;
    };
    let columns: Vec<String> = fields.iter().map(|f| qualify(table_alias, f)).collect();
    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();

    match value {
        FilterValue::List(values) => set_in_operator(builder, values, &columns),
        FilterValue::Scalar(scalar) if scalar.is_truthy() => {
            for column in columns {
                builder.and_where(Predicate::Eq {
                    column: column.to_string(),
                    value: scalar.clone(),
                });
            }
        }
        _ => {}
    }
}

/// Narrow the builder to the identifiers returned by the search bridge.
///
/// Does nothing without a search value. Zero hits restrict the result to
/// nothing rather than leaving it unfiltered. Bridge failures propagate.
pub async fn set_search<B: ListBuilder>(
    builder: &mut B,
    spec: &ListQuerySpec,
    bridge: &dyn SearchBridge,
    id_columns: &[&str],
) -> AppResult<()> {
    let Some(term) = spec.search_value.as_deref() else {
        return Ok(());
    };
    let fields: Vec<String> = spec.search_by.iter().cloned().collect();

    let response = bridge.search(term, &fields).await?;
    let ids: Vec<FilterScalar> = response
        .hits
        .into_iter()
        .map(|hit| FilterScalar::Text(hit.object_id))
        .collect();

    debug!(term, hits = ids.len(), "search narrowed list query");

    if ids.is_empty() {
        builder.and_where(Predicate::Nothing);
    } else {
        set_in_operator(builder, &ids, id_columns);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::listing::spec::{FilterKey, FilterKind, OrderDirection, RawListQuery};
    use crate::search::{SearchError, SearchHit, SearchResponse};
    use async_trait::async_trait;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Op {
        Skip(u64),
        Take(u64),
        Where(Predicate),
        Order(String, OrderDirection),
    }

    #[derive(Default)]
    struct RecordingBuilder {
        ops: Vec<Op>,
    }

    #[async_trait]
    impl ListBuilder for RecordingBuilder {
        type Row = ();

        fn skip(&mut self, offset: u64) {
            self.ops.push(Op::Skip(offset));
        }

        fn take(&mut self, limit: u64) {
            self.ops.push(Op::Take(limit));
        }

        fn and_where(&mut self, predicate: Predicate) {
            self.ops.push(Op::Where(predicate));
        }

        fn order_by(&mut self, column: &str, direction: OrderDirection) {
            self.ops.push(Op::Order(column.to_string(), direction));
        }

        async fn get_many_and_count(&self) -> AppResult<(Vec<()>, u64)> {
            Ok((Vec::new(), 0))
        }
    }

    struct FixedSearch(Vec<&'static str>);

    #[async_trait]
    impl SearchBridge for FixedSearch {
        async fn search(
            &self,
            _term: &str,
            _fields: &[String],
        ) -> Result<SearchResponse, SearchError> {
            Ok(SearchResponse {
                hits: self
                    .0
                    .iter()
                    .map(|id| SearchHit {
                        object_id: (*id).to_string(),
                    })
                    .collect(),
            })
        }
    }

    struct BrokenSearch;

    #[async_trait]
    impl SearchBridge for BrokenSearch {
        async fn search(
            &self,
            _term: &str,
            _fields: &[String],
        ) -> Result<SearchResponse, SearchError> {
            Err(SearchError::Status(503))
        }
    }

    const KEYS: &[FilterKey] = &[
        FilterKey::new("websiteId", FilterKind::Integer),
        FilterKey::new("categoryIds", FilterKind::Integer),
    ];

    fn spec(query: &str) -> ListQuerySpec {
        ListQuerySpec::parse(&RawListQuery::from_query_string(query), KEYS).unwrap()
    }

    #[test]
    fn pagination_skips_and_takes() {
        let mut builder = RecordingBuilder::default();
        set_pagination(&mut builder, &spec("page=2&limit=10"));
        assert_eq!(builder.ops, vec![Op::Skip(10), Op::Take(10)]);
    }

    #[test]
    fn zero_limit_is_unbounded() {
        let mut builder = RecordingBuilder::default();
        set_pagination(&mut builder, &spec("page=4"));
        assert_eq!(builder.ops, vec![Op::Skip(0)]);
    }

    #[test]
    fn sorting_defaults_to_created_at_with_tie_break() {
        let mut builder = RecordingBuilder::default();
        set_sorting(&mut builder, &spec(""), "post").unwrap();
        assert_eq!(
            builder.ops,
            vec![
                Op::Order("post.created_at".to_string(), OrderDirection::Asc),
                Op::Order("post.id".to_string(), OrderDirection::Asc),
            ]
        );
    }

    #[test]
    fn sorting_by_id_has_no_duplicate_tie_break() {
        let mut builder = RecordingBuilder::default();
        set_sorting(&mut builder, &spec("orderBy=id&orderDirection=DESC"), "post").unwrap();
        assert_eq!(
            builder.ops,
            vec![Op::Order("post.id".to_string(), OrderDirection::Desc)]
        );
    }

    #[test]
    fn sorting_accepts_remapped_paths() {
        let mut builder = RecordingBuilder::default();
        let mut s = spec("orderDirection=desc");
        s.order_by = "categoryGroup.name".to_string();
        set_sorting(&mut builder, &s, "category").unwrap();
        assert_eq!(
            builder.ops[0],
            Op::Order("category_group.name".to_string(), OrderDirection::Desc)
        );
    }

    #[test]
    fn sorting_rejects_unsafe_columns() {
        let mut builder = RecordingBuilder::default();
        let mut s = spec("");
        s.order_by = "name; DROP TABLE post".to_string();
        assert!(matches!(
            set_sorting(&mut builder, &s, "post"),
            Err(ListQueryError::InvalidSort(_))
        ));
        assert!(builder.ops.is_empty());
    }

    #[test]
    fn in_operator_noops_on_empty_input() {
        let mut builder = RecordingBuilder::default();
        set_in_operator(&mut builder, &[], &["post.id"]);
        set_in_operator(&mut builder, &[FilterScalar::Int(1)], &[]);
        assert!(builder.ops.is_empty());
    }

    #[test]
    fn in_operator_adds_one_predicate_per_field() {
        let mut builder = RecordingBuilder::default();
        set_in_operator(&mut builder, &[FilterScalar::Int(1)], &["a.x", "b.y"]);
        assert_eq!(builder.ops.len(), 2);
    }

    #[test]
    fn filter_skips_absent_and_falsy_values() {
        let mut builder = RecordingBuilder::default();
        set_filter(&mut builder, &spec(""), "post", "websiteId", &["website_id"]);
        set_filter(&mut builder, &spec("websiteId=0"), "post", "websiteId", &["website_id"]);
        set_filter(&mut builder, &spec("websiteId="), "post", "websiteId", &["website_id"]);
        assert!(builder.ops.is_empty());
    }

    #[test]
    fn filter_scalar_adds_equality() {
        let mut builder = RecordingBuilder::default();
        set_filter(&mut builder, &spec("websiteId=3"), "post", "websiteId", &["website_id"]);
        assert_eq!(
            builder.ops,
            vec![Op::Where(Predicate::Eq {
                column: "post.website_id".to_string(),
                value: FilterScalar::Int(3),
            })]
        );
    }

    #[test]
    fn filter_list_matches_in_operator() {
        let s = spec("categoryIds[]=1&categoryIds[]=2");

        let mut via_filter = RecordingBuilder::default();
        set_filter(&mut via_filter, &s, "post", "categoryIds", &["category_id"]);

        let mut direct = RecordingBuilder::default();
        set_in_operator(
            &mut direct,
            &[FilterScalar::Int(1), FilterScalar::Int(2)],
            &["post.category_id"],
        );

        assert_eq!(via_filter.ops, direct.ops);
    }

    #[tokio::test]
    async fn search_without_value_is_noop() {
        let mut builder = RecordingBuilder::default();
        set_search(&mut builder, &spec(""), &BrokenSearch, &["category.code"])
            .await
            .unwrap();
        assert!(builder.ops.is_empty());
    }

    #[tokio::test]
    async fn search_hits_become_in_predicate() {
        let mut builder = RecordingBuilder::default();
        let s = spec("searchValue=lake&searchBy=name&limit=5");
        set_search(&mut builder, &s, &FixedSearch(vec!["a", "b"]), &["category.code"])
            .await
            .unwrap();
        set_pagination(&mut builder, &s);
        assert_eq!(
            builder.ops,
            vec![
                Op::Where(Predicate::In {
                    column: "category.code".to_string(),
                    values: vec!["a".into(), "b".into()],
                }),
                Op::Skip(0),
                Op::Take(5),
            ]
        );
    }

    #[tokio::test]
    async fn zero_hits_match_nothing() {
        let mut builder = RecordingBuilder::default();
        set_search(
            &mut builder,
            &spec("searchValue=nowhere"),
            &FixedSearch(vec![]),
            &["category.code"],
        )
        .await
        .unwrap();
        assert_eq!(builder.ops, vec![Op::Where(Predicate::Nothing)]);
    }

    #[tokio::test]
    async fn search_failure_propagates() {
        let mut builder = RecordingBuilder::default();
        let err = set_search(
            &mut builder,
            &spec("searchValue=lake"),
            &BrokenSearch,
            &["category.code"],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::SearchUnavailable(_)));
        assert!(builder.ops.is_empty());
    }

    #[test]
    fn column_names_are_snake_cased() {
        assert_eq!(to_column_name("createdAt"), "created_at");
        assert_eq!(to_column_name("categoryGroupName"), "category_group_name");
        assert_eq!(to_column_name("id"), "id");
        assert_eq!(qualify("post", "updatedAt"), "post.updated_at");
        assert_eq!(qualify("post", "parent.code"), "parent.code");
    }
}
