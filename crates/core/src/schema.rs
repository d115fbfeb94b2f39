//! Fixed description of the single table the assistant is allowed to read.
//!
//! The router presents this block to the completion capability and the
//! authorizer pins generated statements to [`SOURCE_TABLE`]. The historical
//! appointments feed misspells the type column (`appoitment_type`, missing the
//! `n`); the irregularity is preserved here because the warehouse column is
//! what generated SQL must reference.

pub const SOURCE_TABLE: &str = "appointments";

/// Column name of the mandatory scope predicate.
pub const SUBJECT_COLUMN: &str = "subject_id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub sql_type: &'static str,
    pub note: Option<&'static str>,
}

pub const COLUMNS: &[ColumnSpec] = &[
    ColumnSpec { name: "row_id", sql_type: "TEXT", note: None },
    ColumnSpec { name: "subject_id", sql_type: "TEXT", note: None },
    ColumnSpec {
        name: "appoitment_type",
        sql_type: "TEXT",
        note: Some("historical feed column, missing the `n`"),
    },
    ColumnSpec { name: "appointment_date_time_c", sql_type: "TEXT (datetime)", note: None },
    ColumnSpec { name: "appointment_status", sql_type: "TEXT", note: None },
    ColumnSpec { name: "cancel_reason_code", sql_type: "REAL", note: Some("nullable") },
    ColumnSpec { name: "record_type", sql_type: "TEXT", note: None },
    ColumnSpec { name: "site_name", sql_type: "TEXT", note: None },
    ColumnSpec { name: "site_address", sql_type: "TEXT", note: None },
    ColumnSpec {
        name: "site_instructions",
        sql_type: "TEXT",
        note: Some("nullable, arrival instructions per site"),
    },
];

/// Renders the schema as the prompt block the router embeds verbatim.
pub fn prompt_block() -> String {
    let mut block = format!("Table: {SOURCE_TABLE}\nColumns:\n");
    for column in COLUMNS {
        block.push_str("  * ");
        block.push_str(column.name);
        block.push_str(" (");
        block.push_str(column.sql_type);
        block.push(')');
        if let Some(note) = column.note {
            block.push_str(" - NOTE: ");
            block.push_str(note);
        }
        block.push('\n');
    }
    block
}
