// Copyright (C) 2013-2020 Blockstack PBC, a public benefit corporation
// Copyright (C) 2020-2024 Stacks Open Internet Foundation
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::path::Path;
use std::time::Duration;
use std::{error, fmt, fs};

use rusqlite::{Connection, Error as sqlite_error, OpenFlags, OptionalExtension, Params, Row};

pub type DBConn = rusqlite::Connection;

/// How long a reader waits on a locked database before giving up
const BUSY_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug)]
pub enum Error {
    /// Database doesn't exist
    NoDBError(String),
    /// The database does not have the expected tables or columns
    SchemaError(String),
    /// Parse error -- a column held a value we could not decode
    ParseError(String),
    /// Operation would overflow
    Overflow,
    /// Data not found
    NotFoundError,
    /// Sqlite3 error
    SqliteError(sqlite_error),
    /// Other error
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::NoDBError(ref path) => write!(f, "Database does not exist: {}", path),
            Error::SchemaError(ref s) => write!(f, "Unexpected database schema: {}", s),
            Error::ParseError(ref s) => write!(f, "Parse error: {}", s),
            Error::Overflow => write!(f, "Numeric overflow"),
            Error::NotFoundError => write!(f, "Not found"),
            Error::SqliteError(ref e) => fmt::Display::fmt(e, f),
            Error::Other(ref s) => fmt::Display::fmt(s, f),
        }
    }
}

impl error::Error for Error {
    fn cause(&self) -> Option<&dyn error::Error> {
        match *self {
            Error::SqliteError(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlite_error> for Error {
    fn from(e: sqlite_error) -> Error {
        Error::SqliteError(e)
    }
}

pub trait FromRow<T> {
    fn from_row(row: &Row) -> Result<T, Error>;
}

/// boilerplate code for querying a single row
///   if more than 1 row is returned, excess rows are ignored.
pub fn query_row<T, P>(conn: &Connection, sql_query: &str, sql_args: P) -> Result<Option<T>, Error>
where
    P: Params,
    T: FromRow<T>,
{
    let query_result = conn.query_row_and_then(sql_query, sql_args, |row| T::from_row(row));
    match query_result {
        Ok(x) => Ok(Some(x)),
        Err(Error::SqliteError(sqlite_error::QueryReturnedNoRows)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Boilerplate for querying a single integer (first and only item of the query must be an int)
pub fn query_int<P>(conn: &Connection, sql_query: &str, sql_args: P) -> Result<i64, Error>
where
    P: Params,
{
    let mut stmt = conn.prepare(sql_query)?;
    let mut rows = stmt.query(sql_args)?;

    let mut row_data = vec![];
    while let Some(row) = rows.next().map_err(Error::SqliteError)? {
        if !row_data.is_empty() {
            return Err(Error::Overflow);
        }
        let i: i64 = row.get(0)?;
        row_data.push(i);
    }

    row_data.first().copied().ok_or(Error::NotFoundError)
}

pub fn query_count<P>(conn: &Connection, sql_query: &str, sql_args: P) -> Result<i64, Error>
where
    P: Params,
{
    query_int(conn, sql_query, sql_args)
}

/// Boilerplate for querying a single nullable integer, e.g. `SELECT MAX(x)`
pub fn query_opt_int<P>(conn: &Connection, sql_query: &str, sql_args: P) -> Result<Option<i64>, Error>
where
    P: Params,
{
    let value: Option<Option<i64>> = conn
        .query_row(sql_query, sql_args, |row| row.get(0))
        .optional()?;
    Ok(value.flatten())
}

/// Table names come from configuration, so they are spliced into SQL only after this check
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Column names of `table`, in declaration order.  Empty if the table does not exist.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>, Error> {
    if !is_valid_identifier(table) {
        return Err(Error::SchemaError(format!("invalid table name '{}'", table)));
    }
    let sql = format!("PRAGMA table_info('{}')", table);
    let mut stmt = conn.prepare(&sql)?;
    let names = stmt.query_map([], |row| row.get::<_, String>("name"))?;
    names.collect::<Result<Vec<_>, _>>().map_err(Error::from)
}

/// Open an existing sqlite database.  Never creates one.
pub fn sqlite_open<P: AsRef<Path>>(
    path: P,
    flags: OpenFlags,
) -> Result<Connection, Error> {
    let path = path.as_ref();
    match fs::metadata(path) {
        Ok(md) if md.is_file() => {}
        _ => {
            return Err(Error::NoDBError(path.display().to_string()));
        }
    }
    let conn = Connection::open_with_flags(path, flags)?;
    conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
    Ok(conn)
}

/// Open an existing sqlite database for reading only
pub fn sqlite_open_readonly<P: AsRef<Path>>(path: P) -> Result<Connection, Error> {
    sqlite_open(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE misc(block_height INTEGER, difficulty TEXT);
             INSERT INTO misc VALUES (1, '10.5');
             INSERT INTO misc VALUES (2, '11.25');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn query_helpers() {
        let conn = setup();
        assert_eq!(query_count(&conn, "SELECT COUNT(*) FROM misc", []).unwrap(), 2);

        assert!(matches!(
            query_int(&conn, "SELECT block_height FROM misc", []),
            Err(Error::Overflow)
        ));
        assert!(matches!(
            query_int(&conn, "SELECT block_height FROM misc WHERE block_height > 5", []),
            Err(Error::NotFoundError)
        ));
        assert_eq!(
            query_opt_int(&conn, "SELECT MAX(block_height) FROM misc", []).unwrap(),
            Some(2)
        );
        assert_eq!(
            query_opt_int(&conn, "SELECT MAX(block_height) FROM misc WHERE block_height > 5", [])
                .unwrap(),
            None
        );
    }

    #[test]
    fn columns_of_table() {
        let conn = setup();
        assert_eq!(
            table_columns(&conn, "misc").unwrap(),
            vec!["block_height".to_string(), "difficulty".to_string()]
        );
        assert!(table_columns(&conn, "nope").unwrap().is_empty());
        assert!(matches!(
            table_columns(&conn, "misc'; DROP TABLE misc; --"),
            Err(Error::SchemaError(_))
        ));
    }

    #[test]
    fn identifiers() {
        assert!(is_valid_identifier("transactions"));
        assert!(is_valid_identifier("_misc2"));
        assert!(!is_valid_identifier("2misc"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("a b"));
    }

    #[test]
    fn open_missing_file() {
        assert!(matches!(
            sqlite_open_readonly("/nonexistent/ledger/ledger.db"),
            Err(Error::NoDBError(_))
        ));
    }
}
