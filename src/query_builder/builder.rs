use sqlx::{Postgres, QueryBuilder};

use super::Condition;

const RECORD_TABLE: &str = "directory_records";

const RECORD_COLUMNS: &str = "record_id, business_name, country, state, city, address, phone, \
                              category, subcategory, categories, attributes";

/// Builds the two queries the pipeline runs against the record table.
///
/// Both de-duplicate by record identity: the count uses `COUNT(DISTINCT record_id)` and
/// the export uses `DISTINCT ON (record_id)`, so a record reachable through several
/// clauses is counted and exported once.
pub struct RecordQuery;

impl RecordQuery {
    /// `SELECT COUNT(DISTINCT record_id) ... WHERE <condition>`
    pub fn count_distinct(condition: &Condition) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT COUNT(DISTINCT record_id) FROM {RECORD_TABLE} WHERE "
        ));
        condition.push_sql(&mut builder);
        builder
    }

    /// `SELECT DISTINCT ON (record_id) ... WHERE <condition> ORDER BY record_id`
    pub fn select_distinct(condition: &Condition) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT DISTINCT ON (record_id) {RECORD_COLUMNS} FROM {RECORD_TABLE} WHERE "
        ));
        condition.push_sql(&mut builder);
        builder.push(" ORDER BY record_id");
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordColumn;

    #[test]
    fn test_count_query_deduplicates() {
        let condition = Condition::equals(RecordColumn::State, "Ohio");
        let builder = RecordQuery::count_distinct(&condition);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(DISTINCT record_id) FROM directory_records WHERE state = $1"
        );
    }

    #[test]
    fn test_select_query_orders_by_identity() {
        let condition = Condition::equals(RecordColumn::State, "Ohio");
        let builder = RecordQuery::select_distinct(&condition);
        let sql = builder.sql();
        assert!(sql.starts_with("SELECT DISTINCT ON (record_id) record_id, business_name"));
        assert!(sql.ends_with("WHERE state = $1 ORDER BY record_id"));
    }
}
