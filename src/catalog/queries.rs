//! SQL query constants and builders
//!
//! Contains all SQL queries used against the catalog database.

use crate::governance::item::ObjectPath;

/// Name of the connected database, which is the only reachable catalog
pub const CURRENT_CATALOG: &str = "SELECT current_database()";

/// List user schemas
pub const LIST_SCHEMAS: &str = r#"
    SELECT nspname AS schema_name
    FROM pg_catalog.pg_namespace
    WHERE nspname <> 'pg_catalog'
        AND nspname <> 'information_schema'
        AND nspname !~ '^pg_toast'
        AND nspname !~ '^pg_temp'
    ORDER BY nspname
"#;

/// List base and partitioned tables in a schema with their current comment
pub const LIST_TABLES: &str = r#"
    SELECT
        c.relname AS table_name,
        CASE c.relkind
            WHEN 'r' THEN 'BASE TABLE'
            WHEN 'p' THEN 'PARTITIONED TABLE'
        END AS table_type,
        obj_description(c.oid, 'pg_class') AS current_comment,
        (
            SELECT COUNT(*)
            FROM pg_catalog.pg_attribute a
            WHERE a.attrelid = c.oid AND a.attnum > 0 AND NOT a.attisdropped
        ) AS column_count
    FROM pg_catalog.pg_class c
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
        AND c.relkind IN ('r', 'p')
        AND NOT c.relispartition
    ORDER BY c.relname
"#;

/// Column names, rendered types and comments for one table
pub const GET_COLUMNS: &str = r#"
    SELECT
        a.attname AS column_name,
        format_type(a.atttypid, a.atttypmod) AS data_type,
        col_description(c.oid, a.attnum) AS comment,
        a.attnum::int4 AS ordinal_position
    FROM pg_catalog.pg_attribute a
        JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
        JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
    WHERE n.nspname = $1
        AND c.relname = $2
        AND a.attnum > 0
        AND NOT a.attisdropped
    ORDER BY a.attnum
"#;

/// Whether a schema exists
pub const SCHEMA_EXISTS: &str = r#"
    SELECT EXISTS(SELECT 1 FROM pg_catalog.pg_namespace WHERE nspname = $1)
"#;

/// Whether a role exists
pub const ROLE_EXISTS: &str = r#"
    SELECT EXISTS(SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = $1)
"#;

/// USAGE and CREATE privileges of a role on a schema
pub const SCHEMA_PRIVILEGES: &str = r#"
    SELECT
        has_schema_privilege($1, $2, 'USAGE') AS can_select,
        has_schema_privilege($1, $2, 'CREATE') AS can_modify
"#;

/// SQL builder for safe identifier and literal quoting
pub struct SqlBuilder;

impl SqlBuilder {
    /// Quote an identifier (schema/table/column name) safely
    pub fn quote_ident(ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Quote a string literal; assumes standard_conforming_strings
    pub fn quote_literal(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Up to `limit` rows of a table, each as a JSON object
    pub fn sample_rows(schema: &str, table: &str, limit: usize) -> String {
        format!(
            "SELECT row_to_json(t) FROM (SELECT * FROM {}.{} LIMIT {}) t",
            Self::quote_ident(schema),
            Self::quote_ident(table),
            limit
        )
    }

    /// COMMENT ON TABLE / COLUMN; COMMENT does not accept bind parameters
    pub fn comment_on(path: &ObjectPath, text: &str) -> String {
        let table = format!(
            "{}.{}",
            Self::quote_ident(&path.schema),
            Self::quote_ident(&path.table)
        );
        match &path.column {
            Some(column) => format!(
                "COMMENT ON COLUMN {}.{} IS {}",
                table,
                Self::quote_ident(column),
                Self::quote_literal(text)
            ),
            None => format!("COMMENT ON TABLE {} IS {}", table, Self::quote_literal(text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_on_table_escapes_quotes() {
        let path = ObjectPath::parse("main.sales.orders").unwrap();
        assert_eq!(
            SqlBuilder::comment_on(&path, "Customer's orders"),
            r#"COMMENT ON TABLE "sales"."orders" IS 'Customer''s orders'"#
        );
    }

    #[test]
    fn test_comment_on_column() {
        let path = ObjectPath::parse("main.sales.orders.amount").unwrap();
        assert_eq!(
            SqlBuilder::comment_on(&path, "Amount"),
            r#"COMMENT ON COLUMN "sales"."orders"."amount" IS 'Amount'"#
        );
    }

    #[test]
    fn test_sample_rows_quotes_identifiers() {
        assert_eq!(
            SqlBuilder::sample_rows("sales", "orders", 5),
            r#"SELECT row_to_json(t) FROM (SELECT * FROM "sales"."orders" LIMIT 5) t"#
        );
    }
}
