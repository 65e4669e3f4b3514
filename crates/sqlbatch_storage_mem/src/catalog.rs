//! Table catalog backing `sqlite_master`.

use std::collections::BTreeMap;

use sqlbatch_core::{DbError, ErrorCode, ResultSet, Row, Value};

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    // name -> CREATE statement
    tables: BTreeMap<String, String>,
}

impl Catalog {
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// `CREATE TABLE [IF NOT EXISTS] name ...`; `rest` is the text after `TABLE`.
    pub fn create(&mut self, rest: &str, sql: &str) -> Result<ResultSet, DbError> {
        let (if_not_exists, rest) = strip_clause(rest, "IF NOT EXISTS");
        let name = table_name(rest).ok_or_else(|| DbError::new(ErrorCode::Syntax, "missing table name"))?;
        if self.tables.contains_key(name) {
            if if_not_exists {
                return Ok(ResultSet::affected(0));
            }
            return Err(DbError::new(ErrorCode::Database, format!("table {name} already exists")));
        }
        self.tables.insert(name.to_string(), sql.trim().to_string());
        Ok(ResultSet::affected(0))
    }

    /// `DROP TABLE [IF EXISTS] name`; `rest` is the text after `TABLE`.
    pub fn drop_table(&mut self, rest: &str) -> Result<ResultSet, DbError> {
        let (if_exists, rest) = strip_clause(rest, "IF EXISTS");
        let name = table_name(rest).ok_or_else(|| DbError::new(ErrorCode::Syntax, "missing table name"))?;
        if self.tables.remove(name).is_none() && !if_exists {
            return Err(DbError::new(ErrorCode::Database, format!("no such table: {name}")));
        }
        Ok(ResultSet::affected(0))
    }

    pub fn master_rows(&self) -> Vec<Row> {
        self.tables
            .iter()
            .enumerate()
            .map(|(i, (name, sql))| {
                let mut row = Row::new();
                row.insert("type".into(), Value::from("table"));
                row.insert("name".into(), Value::from(name.as_str()));
                row.insert("tbl_name".into(), Value::from(name.as_str()));
                row.insert("rootpage".into(), Value::Integer(i as i64 + 2));
                row.insert("sql".into(), Value::from(sql.as_str()));
                row
            })
            .collect()
    }
}

fn strip_clause<'a>(rest: &'a str, clause: &str) -> (bool, &'a str) {
    let trimmed = rest.trim_start();
    match trimmed.get(..clause.len()) {
        Some(head) if head.eq_ignore_ascii_case(clause) => (true, &trimmed[clause.len()..]),
        _ => (false, trimmed),
    }
}

fn table_name(rest: &str) -> Option<&str> {
    let name = rest
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .next()?
        .trim_matches(|c: char| c == '"' || c == '`' || c == '[' || c == ']');
    if name.is_empty() { None } else { Some(name) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_drop_tables() {
        let mut cat = Catalog::default();
        cat.create(" notes (id INTEGER PRIMARY KEY, body TEXT)", "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)").unwrap();
        cat.create(" \"tags\"(name TEXT)", "CREATE TABLE \"tags\"(name TEXT)").unwrap();
        assert_eq!(cat.table_names(), vec!["notes".to_string(), "tags".to_string()]);

        let err = cat.create(" notes (x)", "CREATE TABLE notes (x)").unwrap_err();
        assert_eq!(err.code, ErrorCode::Database);
        cat.create(" if not exists notes (x)", "CREATE TABLE if not exists notes (x)").unwrap();

        cat.drop_table(" notes").unwrap();
        assert!(!cat.contains("notes"));
        assert!(cat.drop_table(" notes").is_err());
        cat.drop_table(" IF EXISTS notes").unwrap();
    }

    #[test]
    fn master_rows_describe_tables() {
        let mut cat = Catalog::default();
        cat.create(" a (x)", "CREATE TABLE a (x)").unwrap();
        let rows = cat.master_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("type"), Some(&Value::from("table")));
        assert_eq!(rows[0].get("name"), Some(&Value::from("a")));
        assert_eq!(rows[0].get("sql"), Some(&Value::from("CREATE TABLE a (x)")));
    }

    #[test]
    fn missing_name_is_a_syntax_error() {
        let mut cat = Catalog::default();
        assert_eq!(cat.create("  ", "CREATE TABLE").unwrap_err().code, ErrorCode::Syntax);
    }
}
