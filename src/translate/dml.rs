//! DML emission
//!
//! INSERT/UPDATE/DELETE are near pass-through: table positions pick up
//! schema qualification, every VALUES list of a multi-row insert is
//! emitted, `DELETE` always gets its `FROM`, and `RETURNING ... INTO` is a
//! hard error (opt-in recovery stubs it). When the implicit cursor is
//! observed anywhere in the unit, each DML statement is followed by
//! `GET DIAGNOSTICS sql__rowcount = ROW_COUNT;` in program order.

use super::Translator;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::parser::ast::*;

impl Translator<'_> {
    pub(super) fn emit_insert(
        &mut self,
        insert: &InsertStmt,
        indent: usize,
    ) -> Result<String, Diagnostics> {
        if insert.has_returning {
            return self.recover_or_fail(
                DiagnosticKind::UnsupportedReturning,
                "INSERT ... RETURNING INTO",
                insert.pos,
                indent,
            );
        }
        let pad = "  ".repeat(indent);
        let table = self.table_name_sql(&insert.table, None);
        let columns = if insert.columns.is_empty() {
            String::new()
        } else {
            format!(" ({})", insert.columns.join(", "))
        };

        let mut sql = match &insert.source {
            InsertSource::Values(rows) => {
                let mut rendered = Vec::new();
                for row in rows {
                    let values = row
                        .iter()
                        .map(|e| self.expr(e))
                        .collect::<Result<Vec<_>, _>>()?
                        .join(", ");
                    rendered.push(format!("({values})"));
                }
                format!(
                    "{pad}INSERT INTO {table}{columns} VALUES {};\n",
                    rendered.join(", ")
                )
            }
            InsertSource::Query(query) => {
                let select = self.select(query, None)?;
                format!("{pad}INSERT INTO {table}{columns} {select};\n")
            }
        };

        if self.ctx.sql_attribute_needed {
            sql.push_str(&format!("{pad}GET DIAGNOSTICS sql__rowcount = ROW_COUNT;\n"));
        }
        Ok(sql)
    }

    pub(super) fn emit_update(
        &mut self,
        update: &UpdateStmt,
        indent: usize,
    ) -> Result<String, Diagnostics> {
        if update.has_returning {
            return self.recover_or_fail(
                DiagnosticKind::UnsupportedReturning,
                "UPDATE ... RETURNING INTO",
                update.pos,
                indent,
            );
        }
        let pad = "  ".repeat(indent);
        let table = self.table_name_sql(&update.table, update.alias.as_deref());

        self.ctx.push_query_scope();
        let result = self.emit_update_inner(update, &pad, &table);
        self.ctx.pop_query_scope();
        result
    }

    fn emit_update_inner(
        &mut self,
        update: &UpdateStmt,
        pad: &str,
        table: &str,
    ) -> Result<String, Diagnostics> {
        self.bind_dml_alias(&update.table, update.alias.as_deref());

        let mut assignments = Vec::new();
        for (column, value) in &update.set {
            // SET targets must be bare column names in PostgreSQL.
            let column = column.last();
            let value = self.expr(value)?;
            assignments.push(format!("{column} = {value}"));
        }

        let mut sql = format!("{pad}UPDATE {table} SET {}", assignments.join(", "));
        if let Some(where_clause) = &update.where_clause {
            sql.push_str(&format!(" WHERE {}", self.expr(where_clause)?));
        }
        sql.push_str(";\n");

        if self.ctx.sql_attribute_needed {
            sql.push_str(&format!("{pad}GET DIAGNOSTICS sql__rowcount = ROW_COUNT;\n"));
        }
        Ok(sql)
    }

    pub(super) fn emit_delete(
        &mut self,
        delete: &DeleteStmt,
        indent: usize,
    ) -> Result<String, Diagnostics> {
        if delete.has_returning {
            return self.recover_or_fail(
                DiagnosticKind::UnsupportedReturning,
                "DELETE ... RETURNING INTO",
                delete.pos,
                indent,
            );
        }
        let pad = "  ".repeat(indent);
        let table = self.table_name_sql(&delete.table, delete.alias.as_deref());

        self.ctx.push_query_scope();
        let result = (|| {
            self.bind_dml_alias(&delete.table, delete.alias.as_deref());
            let mut sql = format!("{pad}DELETE FROM {table}");
            if let Some(where_clause) = &delete.where_clause {
                sql.push_str(&format!(" WHERE {}", self.expr(where_clause)?));
            }
            sql.push_str(";\n");
            if self.ctx.sql_attribute_needed {
                sql.push_str(&format!("{pad}GET DIAGNOSTICS sql__rowcount = ROW_COUNT;\n"));
            }
            Ok(sql)
        })();
        self.ctx.pop_query_scope();
        result
    }

    fn bind_dml_alias(&mut self, table: &IdentChain, alias: Option<&str>) {
        let parts: Vec<String> = table.parts.iter().map(|p| p.normalized()).collect();
        let resolved = self
            .ctx
            .catalog
            .resolve_table(&self.ctx.current_schema, &parts);
        let bound = alias.map(|a| a.to_string()).unwrap_or_else(|| table.last());
        self.ctx
            .register_alias(&bound, &resolved.schema, &resolved.name);
    }
}
