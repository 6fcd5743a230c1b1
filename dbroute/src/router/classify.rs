//! Operation classification.

use crate::statement::StatementView;

/// What the host is about to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Create,
    Update,
    Delete,
    Query,
    Raw,
}

/// Where a statement may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Write,
    Read,
    /// Statement is bound to a transaction-scoped connection; leave it
    /// where it is.
    SkipRerouting,
}

/// Classify a statement.
///
/// Transaction-bound statements are never rerouted: every statement of a
/// transaction must land on the pool its first statement chose.
pub fn classify(stmt: &StatementView, kind: StatementKind) -> Operation {
    if stmt.in_transaction {
        return Operation::SkipRerouting;
    }

    match kind {
        StatementKind::Create | StatementKind::Update | StatementKind::Delete => Operation::Write,
        StatementKind::Query => {
            if !stmt.sql.is_empty() {
                // SQL was rendered before classification; clause state is
                // stale, so fall through to the text heuristic.
                guess(stmt)
            } else if stmt.clauses.locking || stmt.clauses.write {
                Operation::Write
            } else {
                Operation::Read
            }
        }
        StatementKind::Raw => guess(stmt),
    }
}

/// Conservative text heuristic: only a plain, non-locking SELECT is a
/// read. Everything else writes.
fn guess(stmt: &StatementView) -> Operation {
    if stmt.clauses.write {
        return Operation::Write;
    }

    let sql = stmt.sql.trim().as_bytes();
    if sql.len() > 10
        && sql[..6].eq_ignore_ascii_case(b"select")
        && !sql[sql.len() - 10..].eq_ignore_ascii_case(b"for update")
    {
        Operation::Read
    } else {
        Operation::Write
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn raw(sql: &str) -> StatementView {
        StatementView::new("t", sql)
    }

    #[test]
    fn mutations_write() {
        let stmt = StatementView::new("t", "");
        assert_eq!(classify(&stmt, StatementKind::Create), Operation::Write);
        assert_eq!(classify(&stmt, StatementKind::Update), Operation::Write);
        assert_eq!(classify(&stmt, StatementKind::Delete), Operation::Write);
    }

    #[test]
    fn plain_query_reads() {
        let stmt = StatementView::new("t", "");
        assert_eq!(classify(&stmt, StatementKind::Query), Operation::Read);
    }

    #[test]
    fn locking_query_writes() {
        let mut stmt = StatementView::new("t", "");
        stmt.clauses.locking = true;
        assert_eq!(classify(&stmt, StatementKind::Query), Operation::Write);
    }

    #[test]
    fn write_marker_wins() {
        let mut stmt = raw("select id from t where id=1");
        stmt.clauses.write = true;
        assert_eq!(classify(&stmt, StatementKind::Raw), Operation::Write);
    }

    #[test]
    fn raw_select_reads() {
        let stmt = raw("select id from t where id=1");
        assert_eq!(classify(&stmt, StatementKind::Raw), Operation::Read);
    }

    #[test]
    fn raw_select_for_update_writes() {
        let stmt = raw("select id from t where id=1 for update");
        assert_eq!(classify(&stmt, StatementKind::Raw), Operation::Write);
    }

    #[test]
    fn raw_select_for_update_any_case_writes() {
        let stmt = raw("SELECT id FROM t WHERE id=1 FOR UPDATE");
        assert_eq!(classify(&stmt, StatementKind::Raw), Operation::Write);
    }

    #[test]
    fn short_statements_write() {
        assert_eq!(classify(&raw("select 1"), StatementKind::Raw), Operation::Write);
        assert_eq!(classify(&raw(""), StatementKind::Raw), Operation::Write);
    }

    #[test]
    fn non_select_raw_writes() {
        let stmt = raw("TRUNCATE TABLE t_something");
        assert_eq!(classify(&stmt, StatementKind::Raw), Operation::Write);
    }

    #[test]
    fn prebuilt_query_sql_guesses() {
        let stmt = raw("select id from t where id=1 for update");
        assert_eq!(classify(&stmt, StatementKind::Query), Operation::Write);

        let stmt = raw("select id from t where id=1");
        assert_eq!(classify(&stmt, StatementKind::Query), Operation::Read);
    }

    #[test]
    fn transactions_skip_rerouting() {
        let mut stmt = raw("select id from t where id=1");
        stmt.in_transaction = true;

        for kind in [
            StatementKind::Create,
            StatementKind::Update,
            StatementKind::Delete,
            StatementKind::Query,
            StatementKind::Raw,
        ] {
            assert_eq!(classify(&stmt, kind), Operation::SkipRerouting);
        }
    }
}
