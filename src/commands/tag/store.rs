use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};

use crate::model::{Category, Document, DocumentType, Finding, Qualifier, Subcategory};
use crate::util::{ensure_directory, now_utc_string};

const DB_SCHEMA_VERSION: &str = "1.0.0";
pub const DB_FILE_NAME: &str = "esgscan.sqlite";

pub fn default_db_path(work_root: &Path) -> PathBuf {
    work_root.join(DB_FILE_NAME)
}

/// Opens (creating if needed) the findings database.
pub fn open_store(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        ensure_directory(parent)?;
    }
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
          document_id TEXT PRIMARY KEY,
          source_file TEXT NOT NULL,
          sha256 TEXT NOT NULL,
          year INTEGER NOT NULL,
          document_type TEXT NOT NULL,
          page_count INTEGER NOT NULL,
          extraction_method TEXT NOT NULL,
          extracted_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS findings (
          seq INTEGER PRIMARY KEY,
          finding_id TEXT NOT NULL UNIQUE,
          document_id TEXT NOT NULL,
          document_type TEXT NOT NULL,
          year INTEGER NOT NULL,
          page_number INTEGER NOT NULL,
          citation TEXT NOT NULL,
          category TEXT NOT NULL,
          subcategory TEXT,
          rule_id TEXT NOT NULL,
          matched_text TEXT NOT NULL,
          ordinal INTEGER NOT NULL,
          context_quote TEXT NOT NULL,
          numeric_values TEXT NOT NULL,
          qualifier TEXT,
          FOREIGN KEY(document_id) REFERENCES documents(document_id)
        );

        CREATE INDEX IF NOT EXISTS idx_findings_year_category ON findings(year, category, subcategory);
        CREATE INDEX IF NOT EXISTS idx_findings_document_page ON findings(document_id, page_number);
        ",
        )
        .context("failed to create findings schema")?;

    set_metadata(connection, "db_schema_version", DB_SCHEMA_VERSION)?;
    Ok(())
}

fn set_metadata(connection: &Connection, key: &str, value: &str) -> Result<()> {
    connection
        .execute(
            "INSERT INTO metadata(key, value) VALUES(?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )
        .with_context(|| format!("failed to write metadata key {key}"))?;
    Ok(())
}

pub fn metadata_value(connection: &Connection, key: &str) -> Result<Option<String>> {
    let mut statement = connection.prepare("SELECT value FROM metadata WHERE key = ?1")?;
    let mut rows = statement.query([key])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

/// Replaces the whole Finding set in one transaction. Readers never see a
/// mix of two dictionary versions.
pub fn replace_findings(
    connection: &mut Connection,
    documents: &[Document],
    findings: &[Finding],
    dictionary_version: &str,
) -> Result<usize> {
    let tx = connection.transaction()?;
    tx.execute("DELETE FROM findings", [])?;
    tx.execute("DELETE FROM documents", [])?;

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO documents(
              document_id, source_file, sha256, year, document_type, page_count,
              extraction_method, extracted_at
            ) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )?;
        for document in documents {
            statement.execute(params![
                &document.document_id,
                &document.source_file,
                &document.sha256,
                document.year,
                document.document_type.as_str(),
                document.page_count as i64,
                document.extraction_method.as_str(),
                document.extracted_at.to_rfc3339(),
            ])?;
        }
    }

    {
        let mut statement = tx.prepare(
            "
            INSERT INTO findings(
              seq, finding_id, document_id, document_type, year, page_number, citation,
              category, subcategory, rule_id, matched_text, ordinal, context_quote,
              numeric_values, qualifier
            ) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ",
        )?;
        for (seq, finding) in findings.iter().enumerate() {
            let numeric_values = serde_json::to_string(&finding.numeric_values)
                .context("failed to serialize numeric values")?;
            statement
                .execute(params![
                    seq as i64,
                    finding.finding_id(),
                    &finding.document_id,
                    finding.document_type.as_str(),
                    finding.year,
                    finding.page_number,
                    finding.citation(),
                    finding.category.as_str(),
                    finding.subcategory.map(|value| value.as_str()),
                    &finding.rule_id,
                    &finding.matched_text,
                    finding.ordinal,
                    &finding.context_quote,
                    numeric_values,
                    finding.qualifier.map(|value| value.as_str()),
                ])
                .with_context(|| format!("failed to insert finding {}", finding.finding_id()))?;
        }
    }

    tx.execute(
        "INSERT INTO metadata(key, value) VALUES('dictionary_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [dictionary_version],
    )?;
    tx.execute(
        "INSERT INTO metadata(key, value) VALUES('tagged_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;

    tx.commit()?;
    Ok(findings.len())
}

/// Every stored Finding in emission order.
pub fn load_findings(connection: &Connection) -> Result<Vec<Finding>> {
    let mut statement = connection.prepare(
        "
        SELECT document_id, document_type, year, page_number, category, subcategory,
               rule_id, matched_text, ordinal, context_quote, numeric_values, qualifier
        FROM findings
        ORDER BY seq
        ",
    )?;

    let mut rows = statement.query([])?;
    let mut findings = Vec::new();
    while let Some(row) = rows.next()? {
        let document_type: String = row.get(1)?;
        let category: String = row.get(4)?;
        let subcategory: Option<String> = row.get(5)?;
        let numeric_values: String = row.get(10)?;
        let qualifier: Option<String> = row.get(11)?;

        findings.push(Finding {
            document_id: row.get(0)?,
            document_type: parse_column::<DocumentType>("document_type", &document_type)?,
            year: row.get(2)?,
            page_number: row.get(3)?,
            category: parse_column::<Category>("category", &category)?,
            subcategory: subcategory
                .as_deref()
                .map(|value| parse_column::<Subcategory>("subcategory", value))
                .transpose()?,
            rule_id: row.get(6)?,
            matched_text: row.get(7)?,
            ordinal: row.get(8)?,
            context_quote: row.get(9)?,
            numeric_values: serde_json::from_str(&numeric_values)
                .context("failed to parse stored numeric values")?,
            qualifier: qualifier
                .as_deref()
                .map(|value| parse_column::<Qualifier>("qualifier", value))
                .transpose()?,
        });
    }

    Ok(findings)
}

fn parse_column<T>(column: &str, value: &str) -> Result<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse::<T>()
        .map_err(|error| anyhow!("invalid {column} in findings table: {error}"))
}

pub fn count_rows(connection: &Connection, sql: &str) -> Result<usize> {
    let count: i64 = connection
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("failed to count rows with query: {sql}"))?;
    Ok(count as usize)
}
