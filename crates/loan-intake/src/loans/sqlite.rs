//! SQLite-backed [`LoanRepository`].
//!
//! The connection sits behind a `Mutex`, so statements run one at a time and
//! `last_insert_rowid` always belongs to the insert that just ran. Timestamps
//! are stored as `YYYY-MM-DD HH:MM:SS.ffffff` text, which sorts chronologically
//! and matches rows written by earlier revisions of the table.

use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDateTime;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::info;

use super::domain::{ApplicationId, LoanApplication, NewLoanApplication};
use super::query::LoanQuery;
use super::repository::{LoanRepository, RepositoryError};
use crate::config::DatabaseLocation;

/// Current layout: revision 2 added `district` and `tehsil`.
pub const SCHEMA_REVISION: u32 = 2;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const DAY_FORMAT: &str = "%Y-%m-%d";

/// Unicode-aware lowercase; SQLite's own `lower()` and `LIKE` fold ASCII only.
const UNICODE_LOWER: &str = "unicode_lower";

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS loan_application (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(150) NOT NULL,
    cnic VARCHAR(15) NOT NULL,
    address VARCHAR(250) NOT NULL,
    district VARCHAR(50) NOT NULL DEFAULT '',
    tehsil VARCHAR(50) NOT NULL DEFAULT '',
    amount REAL NOT NULL,
    purpose VARCHAR(50) NOT NULL,
    contact VARCHAR(15) NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_loan_application_created
    ON loan_application(created_at DESC, id DESC);
"#;

const ADD_DISTRICT: &str =
    "ALTER TABLE loan_application ADD COLUMN district VARCHAR(50) NOT NULL DEFAULT ''";
const ADD_TEHSIL: &str =
    "ALTER TABLE loan_application ADD COLUMN tehsil VARCHAR(50) NOT NULL DEFAULT ''";

const SELECT_COLUMNS: &str =
    "SELECT id, name, cnic, address, district, tehsil, amount, purpose, contact, created_at \
     FROM loan_application";

const SEARCH_COLUMNS: [&str; 5] = ["name", "cnic", "purpose", "district", "tehsil"];

pub struct SqliteLoanRepository {
    conn: Mutex<Connection>,
}

impl SqliteLoanRepository {
    pub fn open(location: &DatabaseLocation) -> Result<Self, RepositoryError> {
        match location {
            DatabaseLocation::Memory => Self::open_in_memory(),
            DatabaseLocation::File(path) => Self::open_path(path),
        }
    }

    pub fn open_path(path: &Path) -> Result<Self, RepositoryError> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|err| RepositoryError::Unavailable(err.to_string()))?;
        }
        let conn = Connection::open(path)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        info!(path = %path.display(), "opened loan application store");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wraps an existing connection, creating or upgrading the schema first.
    pub fn from_connection(mut conn: Connection) -> Result<Self, RepositoryError> {
        register_functions(&conn)?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn schema_revision(&self) -> Result<u32, RepositoryError> {
        let conn = self.lock()?;
        let revision = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(revision)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::Unavailable("connection mutex poisoned".to_string()))
    }
}

fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        UNICODE_LOWER,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text = ctx.get::<Option<String>>(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )
}

fn migrate(conn: &mut Connection) -> Result<(), RepositoryError> {
    let tx = conn.transaction()?;
    let revision: u32 = tx.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if revision >= SCHEMA_REVISION {
        return Ok(());
    }

    let columns: Vec<String> = {
        let mut stmt = tx.prepare("SELECT name FROM pragma_table_info('loan_application')")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
        names.collect::<Result<_, _>>()?
    };

    if columns.is_empty() {
        tx.execute_batch(CREATE_TABLE)?;
    } else {
        if !columns.iter().any(|column| column == "district") {
            tx.execute(ADD_DISTRICT, [])?;
        }
        if !columns.iter().any(|column| column == "tehsil") {
            tx.execute(ADD_TEHSIL, [])?;
        }
        tx.execute_batch(CREATE_TABLE)?;
    }

    tx.pragma_update(None, "user_version", SCHEMA_REVISION)?;
    tx.commit()?;
    info!(from = revision, to = SCHEMA_REVISION, "loan application schema ready");
    Ok(())
}

impl LoanRepository for SqliteLoanRepository {
    fn insert(
        &self,
        application: NewLoanApplication,
        created_at: NaiveDateTime,
    ) -> Result<LoanApplication, RepositoryError> {
        let stamp = created_at.format(TIMESTAMP_FORMAT).to_string();
        let created_at = parse_timestamp(&stamp)
            .map_err(|err| RepositoryError::Corrupt(err.to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO loan_application \
             (name, cnic, address, district, tehsil, amount, purpose, contact, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                application.name,
                application.cnic,
                application.address,
                application.district,
                application.tehsil,
                application.amount,
                application.purpose,
                application.contact,
                stamp,
            ],
        )?;
        let id = ApplicationId(conn.last_insert_rowid());

        Ok(application.into_record(id, created_at))
    }

    fn query(&self, query: &LoanQuery) -> Result<Vec<LoanApplication>, RepositoryError> {
        let (where_clause, bindings) = compile(query);
        let sql = format!("{SELECT_COLUMNS}{where_clause} ORDER BY created_at DESC, id DESC");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bindings.iter()), read_row)?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

/// Translates a [`LoanQuery`] into a `WHERE` clause and its positional bindings.
fn compile(query: &LoanQuery) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut bindings = Vec::new();

    if let Some(term) = &query.search {
        bindings.push(format!("%{}%", escape_like(&term.to_lowercase())));
        let slot = bindings.len();
        let any_column = SEARCH_COLUMNS
            .iter()
            .map(|column| format!("{UNICODE_LOWER}({column}) LIKE ?{slot} ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        clauses.push(format!("({any_column})"));
    }

    if let Some(range) = &query.dates {
        bindings.push(range.start.format(DAY_FORMAT).to_string());
        clauses.push(format!("created_at >= ?{}", bindings.len()));
        if let Some(upper) = range.upper_exclusive() {
            bindings.push(upper.date().format(DAY_FORMAT).to_string());
            clauses.push(format!("created_at < ?{}", bindings.len()));
        }
    }

    if clauses.is_empty() {
        (String::new(), bindings)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), bindings)
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<LoanApplication> {
    let raw_created: String = row.get(9)?;
    let created_at = parse_timestamp(&raw_created)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(err)))?;

    Ok(LoanApplication {
        id: ApplicationId(row.get(0)?),
        name: row.get(1)?,
        cnic: row.get(2)?,
        address: row.get(3)?,
        district: row.get(4)?,
        tehsil: row.get(5)?,
        amount: row.get(6)?,
        purpose: row.get(7)?,
        contact: row.get(8)?,
        created_at,
    })
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::FromSqlConversionFailure(..) | rusqlite::Error::InvalidColumnType(..) => {
                Self::Corrupt(value.to_string())
            }
            other => Self::Unavailable(other.to_string()),
        }
    }
}
