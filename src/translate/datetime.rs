//! Date function mapping
//!
//! ADD_MONTHS / MONTHS_BETWEEN / LAST_DAY rewrites, plus the TRUNC/ROUND
//! date-vs-number decision. The decision order is: format-mask second
//! argument, then the inferred type of the first argument, then a
//! column-name heuristic — and the heuristic leaves a warning because
//! date-looking names on numeric columns do happen. Anything still
//! ambiguous stays numeric.

use super::Translator;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::parser::ast::*;
use crate::typemap::OracleType;

/// Format masks that mark the TRUNC/ROUND unit, mapped to `date_trunc`
/// units.
fn mask_unit(mask: &str) -> Option<&'static str> {
    match mask.to_uppercase().as_str() {
        "DD" | "DDD" | "J" => Some("day"),
        "MM" | "MON" | "MONTH" | "RM" => Some("month"),
        "YY" | "YYYY" | "YEAR" | "RR" | "RRRR" | "SYYYY" | "Y" => Some("year"),
        "HH" | "HH12" | "HH24" => Some("hour"),
        "MI" => Some("minute"),
        "Q" => Some("quarter"),
        "W" | "WW" | "IW" | "DAY" | "DY" | "D" => Some("week"),
        _ => None,
    }
}

/// Half of a unit, for approximating date ROUND via truncation.
fn half_interval(unit: &str) -> &'static str {
    match unit {
        "day" => "12 hours",
        "month" => "15 days",
        "year" => "6 months",
        "hour" => "30 minutes",
        "minute" => "30 seconds",
        "quarter" => "45 days",
        "week" => "3 days 12 hours",
        _ => "12 hours",
    }
}

const DATEISH_NAME_PARTS: [&str; 4] = ["date", "time", "hire", "created"];

impl Translator<'_> {
    pub(super) fn date_call(
        &mut self,
        name: &str,
        call: &CallExpr,
        args: &[String],
    ) -> Result<String, Diagnostics> {
        match name {
            "add_months" if args.len() == 2 => {
                if let Expr::Number(n) = &call.args[1].value {
                    return Ok(format!("{} + INTERVAL '{n} months'", args[0]));
                }
                Ok(format!("{} + ({}) * INTERVAL '1 month'", args[0], args[1]))
            }
            "months_between" if args.len() == 2 => Ok(format!(
                "(EXTRACT(YEAR FROM AGE({a}, {b})) * 12 + EXTRACT(MONTH FROM AGE({a}, {b})))",
                a = args[0],
                b = args[1]
            )),
            "last_day" if args.len() == 1 => Ok(format!(
                "DATE_TRUNC('month', {}) + INTERVAL '1 month' - INTERVAL '1 day'",
                args[0]
            )),
            "next_day" => Err(Diagnostics::new(
                DiagnosticKind::UnsupportedFeature,
                "NEXT_DAY has no PostgreSQL equivalent",
                call.pos,
            )),
            _ => Err(Diagnostics::new(
                DiagnosticKind::ParseError,
                format!("wrong number of arguments to {}", name.to_uppercase()),
                call.pos,
            )),
        }
    }

    pub(super) fn trunc_or_round(
        &mut self,
        name: &str,
        call: &CallExpr,
        args: &[String],
    ) -> Result<String, Diagnostics> {
        let is_round = name == "round";
        let first = &call.args[0].value;

        match call.args.len() {
            1 => {
                if self.first_arg_is_date(first) {
                    return Ok(self.date_trunc_sql(is_round, "day", &args[0]));
                }
                Ok(format!("{}({})", name.to_uppercase(), args[0]))
            }
            2 => {
                // A numeric second argument settles it: numeric TRUNC/ROUND.
                if matches!(&call.args[1].value, Expr::Number(_)) {
                    return Ok(format!("{}({}, {})", name.to_uppercase(), args[0], args[1]));
                }
                // A recognized format mask settles it the other way.
                if let Expr::StringLit(mask) = &call.args[1].value {
                    if let Some(unit) = mask_unit(mask) {
                        return Ok(self.date_trunc_sql(is_round, unit, &args[0]));
                    }
                }
                // Unrecognized second argument: default to numeric.
                self.warn(
                    format!(
                        "{} with non-literal second argument treated as numeric",
                        name.to_uppercase()
                    ),
                    call.pos.line,
                );
                Ok(format!("{}({}, {})", name.to_uppercase(), args[0], args[1]))
            }
            _ => Err(Diagnostics::new(
                DiagnosticKind::ParseError,
                format!("wrong number of arguments to {}", name.to_uppercase()),
                call.pos,
            )),
        }
    }

    /// Date detection for a TRUNC/ROUND first argument: inferred type first,
    /// column-name heuristic second (with a warning).
    fn first_arg_is_date(&mut self, first: &Expr) -> bool {
        let inferred = self.infer.type_of(first, &self.ctx);
        if inferred.is_datetime() {
            return true;
        }
        if inferred != OracleType::Unknown {
            return false;
        }
        if let Expr::Ident(chain) = first {
            let tail = chain.last();
            if DATEISH_NAME_PARTS.iter().any(|p| tail.contains(p)) {
                self.warn(
                    format!("'{tail}' assumed to be a date by column-name heuristic"),
                    chain.pos.line,
                );
                return true;
            }
        }
        false
    }

    fn date_trunc_sql(&mut self, is_round: bool, unit: &str, arg: &str) -> String {
        if is_round {
            format!(
                "DATE_TRUNC('{unit}', {arg} + INTERVAL '{}')",
                half_interval(unit)
            )
        } else {
            format!("DATE_TRUNC('{unit}', {arg})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::catalog::{Catalog, CatalogBuilder};
    use crate::config::Config;
    use crate::parser::Parser;

    fn catalog() -> Catalog {
        CatalogBuilder::new()
            .table("hr", "emp", |t| {
                t.column("hiredate", "DATE", true)
                    .column("sal", "NUMBER", true);
            })
            .build()
    }

    fn translate_with_alias(src: &str) -> (String, Vec<String>) {
        let cat = catalog();
        let config = Config::default();
        let mut tr = Translator::new("hr", &cat, &config, CancelToken::new());
        tr.ctx.push_query_scope();
        tr.ctx.register_alias("e", "hr", "emp");
        let tokens = crate::lexer::tokenize(src).unwrap();
        let mut parser = Parser::new(tokens);
        let e = parser.expr().unwrap();
        let sql = tr.expr(&e).unwrap();
        tr.ctx.pop_query_scope();
        let warnings = tr.warnings.iter().map(|w| w.message.clone()).collect();
        (sql, warnings)
    }

    #[test]
    fn add_months_with_literal_count() {
        let (sql, _) = translate_with_alias("ADD_MONTHS(e.hiredate, 3)");
        assert_eq!(sql, "e.hiredate + INTERVAL '3 months'");
    }

    #[test]
    fn last_day_expands_to_month_arithmetic() {
        let (sql, _) = translate_with_alias("LAST_DAY(e.hiredate)");
        assert_eq!(
            sql,
            "DATE_TRUNC('month', e.hiredate) + INTERVAL '1 month' - INTERVAL '1 day'"
        );
    }

    #[test]
    fn months_between_uses_age() {
        let (sql, _) = translate_with_alias("MONTHS_BETWEEN(SYSDATE, e.hiredate)");
        assert!(sql.contains("AGE(CURRENT_TIMESTAMP, e.hiredate)"));
        assert!(sql.contains("* 12"));
    }

    #[test]
    fn trunc_with_month_mask_is_date_trunc() {
        let (sql, warnings) = translate_with_alias("TRUNC(e.hiredate, 'MM')");
        assert_eq!(sql, "DATE_TRUNC('month', e.hiredate)");
        assert!(warnings.is_empty());
    }

    #[test]
    fn trunc_on_inferred_date_without_mask() {
        let (sql, _) = translate_with_alias("TRUNC(e.hiredate)");
        assert_eq!(sql, "DATE_TRUNC('day', e.hiredate)");
    }

    #[test]
    fn trunc_on_number_stays_numeric() {
        let (sql, _) = translate_with_alias("TRUNC(e.sal, 2)");
        assert_eq!(sql, "TRUNC(e.sal, 2)");
    }

    #[test]
    fn name_heuristic_fires_with_a_warning() {
        // `created_at` is not in the catalog, so inference is Unknown and
        // the name heuristic decides.
        let (sql, warnings) = translate_with_alias("TRUNC(created_at)");
        assert_eq!(sql, "DATE_TRUNC('day', created_at)");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("heuristic"));
    }

    #[test]
    fn round_on_date_approximates_by_half_unit() {
        let (sql, _) = translate_with_alias("ROUND(e.hiredate, 'YYYY')");
        assert_eq!(
            sql,
            "DATE_TRUNC('year', e.hiredate + INTERVAL '6 months')"
        );
    }
}
