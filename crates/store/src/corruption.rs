use folder_mcp_protocol::{EngineError, Result};
use rusqlite::Connection;

/// Result of running the three PRAGMA checks at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    None,
    Minor,
    Severe,
    Critical,
}

/// Runs `quick_check`, `integrity_check`, and `foreign_key_check` and
/// classifies the worst finding among them.
pub fn classify(conn: &Connection) -> Result<Severity> {
    let quick: String = conn
        .query_row("PRAGMA quick_check", [], |r| r.get(0))
        .map_err(|e| EngineError::IntegrityCheckFailed(format!("quick_check: {e}")))?;
    if quick != "ok" {
        return Ok(Severity::Critical);
    }

    let integrity: String = conn
        .query_row("PRAGMA integrity_check", [], |r| r.get(0))
        .map_err(|e| EngineError::IntegrityCheckFailed(format!("integrity_check: {e}")))?;
    if integrity != "ok" {
        return Ok(Severity::Severe);
    }

    let mut stmt = conn
        .prepare("PRAGMA foreign_key_check")
        .map_err(|e| EngineError::IntegrityCheckFailed(format!("foreign_key_check: {e}")))?;
    let violations = stmt
        .query_map([], |_| Ok(()))
        .map_err(|e| EngineError::IntegrityCheckFailed(format!("foreign_key_check: {e}")))?
        .count();

    Ok(if violations > 0 { Severity::Minor } else { Severity::None })
}

/// Attempts in-place repair for `Minor`/`Severe` corruption. Never called for
/// `Critical`, which goes straight to backup restore or rebuild.
pub fn repair(conn: &Connection) -> Result<()> {
    conn.execute_batch("VACUUM; REINDEX;")
        .map_err(|e| EngineError::Corrupted(format!("repair failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_is_not_corrupted() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(classify(&conn).unwrap(), Severity::None);
    }
}
