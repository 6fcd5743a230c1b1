//! SQL introspection and rewrite engine.
//!
//! Just enough structure to pull a table name, a command kind, and one
//! bound value out of a statement, and to retarget the table identifier.
//! Single-table SELECT, INSERT and DELETE only; anything fancier is
//! rejected rather than guessed at.

pub mod error;

pub use error::Error;

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::ast::{
    BinaryOperator, Expr, Ident, ObjectName, Query, Select, SetExpr, Statement, TableFactor,
    TableWithJoins, UnaryOperator, Value,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

// Rebuilt SQL can come out with numbered placeholder tokens; callers
// speak single `?` placeholders.
static NUMBERED_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r":v\d+").unwrap());

/// Statement shape, as far as routing cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Select,
    Insert,
    Delete,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Select => write!(f, "SELECT"),
            CommandKind::Insert => write!(f, "INSERT"),
            CommandKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// Table reference with its optional schema qualifier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableRef {
    pub name: String,
    pub schema: Option<String>,
}

/// A value bound in a WHERE predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::String(value) => write!(f, "{}", value),
            SqlValue::Int(value) => write!(f, "{}", value),
            SqlValue::Float(value) => write!(f, "{}", value),
        }
    }
}

/// Minimal structural form of one parsed statement.
#[derive(Debug, Clone)]
pub struct StructuralStatement {
    ast: Statement,
}

/// Parse SQL into its structural form.
pub fn parse(sql: &str) -> Result<StructuralStatement, Error> {
    let mut statements = Parser::parse_sql(&MySqlDialect {}, sql)?;

    match statements.len() {
        0 => Err(Error::EmptyStatement),
        1 => Ok(StructuralStatement {
            ast: statements.remove(0),
        }),
        _ => Err(Error::UnsupportedShape),
    }
}

/// Table name and command kind for raw SQL.
pub fn table_name(sql: &str) -> Result<(TableRef, CommandKind), Error> {
    parse(sql)?.table_name()
}

/// Bound value for `column` in raw SQL, if one can be extracted.
pub fn bound_value(sql: &str, column: &str) -> Result<Option<SqlValue>, Error> {
    Ok(parse(sql)?.bound_value(column))
}

/// Rewrite the table identifier in raw SQL.
pub fn rewrite_table(sql: &str, new_name: &str) -> Result<String, Error> {
    parse(sql)?.rewrite_table(new_name)
}

impl StructuralStatement {
    /// Table name and command kind.
    ///
    /// UPDATE is a known gap: callers relying on UPDATE-based sharding
    /// get an error, never a guess.
    pub fn table_name(&self) -> Result<(TableRef, CommandKind), Error> {
        match &self.ast {
            Statement::Query(query) => {
                let select = single_select(query)?;
                Ok((single_table(&select.from)?, CommandKind::Select))
            }
            Statement::Insert { table_name, .. } => {
                Ok((table_ref(table_name), CommandKind::Insert))
            }
            Statement::Delete { from, .. } => Ok((single_table(from)?, CommandKind::Delete)),
            Statement::Update { .. } => Err(Error::UpdateUnsupported),
            _ => Err(Error::TableNotFound),
        }
    }

    /// Bound value for `column`.
    ///
    /// Walks only AND-combined comparison predicates in the WHERE clause;
    /// OR branches are never partially matched and yield nothing.
    pub fn bound_value(&self, column: &str) -> Option<SqlValue> {
        let selection = match &self.ast {
            Statement::Query(query) => single_select(query).ok()?.selection.as_ref(),
            Statement::Delete { selection, .. } => selection.as_ref(),
            _ => None,
        }?;

        find_value(selection, column)
    }

    /// Replace the table identifier, keep the schema qualifier, rebuild
    /// the statement text.
    pub fn rewrite_table(&self, new_name: &str) -> Result<String, Error> {
        let mut ast = self.ast.clone();

        match &mut ast {
            Statement::Query(query) => retarget(&mut single_select_mut(query)?.from, new_name)?,
            Statement::Insert { table_name, .. } => *table_name = renamed(table_name, new_name),
            Statement::Delete { from, .. } => retarget(from, new_name)?,
            Statement::Update { .. } => return Err(Error::UpdateUnsupported),
            _ => return Err(Error::UnsupportedShape),
        }

        Ok(normalize_placeholders(&ast.to_string()))
    }
}

/// Map numbered placeholder tokens back to the caller's `?` convention.
pub fn normalize_placeholders(sql: &str) -> String {
    NUMBERED_PLACEHOLDER.replace_all(sql, "?").into_owned()
}

fn single_select(query: &Query) -> Result<&Select, Error> {
    match query.body.as_ref() {
        SetExpr::Select(select) => Ok(select),
        _ => Err(Error::UnsupportedShape),
    }
}

fn single_select_mut(query: &mut Query) -> Result<&mut Select, Error> {
    match query.body.as_mut() {
        SetExpr::Select(select) => Ok(select),
        _ => Err(Error::UnsupportedShape),
    }
}

fn single_table(from: &[TableWithJoins]) -> Result<TableRef, Error> {
    let [table] = from else {
        return Err(Error::UnsupportedShape);
    };

    if !table.joins.is_empty() {
        return Err(Error::UnsupportedShape);
    }

    match &table.relation {
        TableFactor::Table { name, .. } => Ok(table_ref(name)),
        _ => Err(Error::UnsupportedShape),
    }
}

fn table_ref(name: &ObjectName) -> TableRef {
    let parts = &name.0;
    let table = parts
        .last()
        .map(|ident| ident.value.clone())
        .unwrap_or_default();
    let schema = if parts.len() > 1 {
        parts.get(parts.len() - 2).map(|ident| ident.value.clone())
    } else {
        None
    };

    TableRef {
        name: table,
        schema,
    }
}

fn renamed(name: &ObjectName, new_name: &str) -> ObjectName {
    let mut parts: Vec<Ident> = name.0.clone();
    if let Some(last) = parts.last_mut() {
        *last = Ident::new(new_name);
    }
    ObjectName(parts)
}

fn retarget(from: &mut [TableWithJoins], new_name: &str) -> Result<(), Error> {
    let [table] = from else {
        return Err(Error::UnsupportedShape);
    };

    if !table.joins.is_empty() {
        return Err(Error::UnsupportedShape);
    }

    match &mut table.relation {
        TableFactor::Table { name, .. } => {
            *name = renamed(name, new_name);
            Ok(())
        }
        _ => Err(Error::UnsupportedShape),
    }
}

fn find_value(expr: &Expr, column: &str) -> Option<SqlValue> {
    match expr {
        Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => {
                find_value(left, column).or_else(|| find_value(right, column))
            }
            BinaryOperator::Eq
            | BinaryOperator::NotEq
            | BinaryOperator::Gt
            | BinaryOperator::GtEq
            | BinaryOperator::Lt
            | BinaryOperator::LtEq => {
                if column_name(left)? == column {
                    literal(right)
                } else {
                    None
                }
            }
            _ => None,
        },
        Expr::Nested(inner) => find_value(inner, column),
        _ => None,
    }
}

fn column_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Identifier(ident) => Some(&ident.value),
        Expr::CompoundIdentifier(parts) => parts.last().map(|ident| ident.value.as_str()),
        _ => None,
    }
}

fn literal(expr: &Expr) -> Option<SqlValue> {
    match expr {
        Expr::Value(value) => match value {
            Value::SingleQuotedString(text) | Value::DoubleQuotedString(text) => {
                Some(SqlValue::String(text.clone()))
            }
            Value::Number(text, _) => {
                if let Ok(int) = text.parse::<i64>() {
                    Some(SqlValue::Int(int))
                } else {
                    text.parse::<f64>().ok().map(SqlValue::Float)
                }
            }
            _ => None,
        },
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match literal(expr)? {
            SqlValue::Int(int) => Some(SqlValue::Int(-int)),
            SqlValue::Float(float) => Some(SqlValue::Float(-float)),
            SqlValue::String(_) => None,
        },
        _ => None,
    }
}
