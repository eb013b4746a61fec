//! GROUP BY and grouping-sets emulation.

use super::expression::ExprCompiler;
use super::CompileResult;
use crate::request::rewrite::{
    effective_grouping_sets, grouping_levels, has_grouping_functions, GroupingLevel,
};
use crate::request::GroupingDef;
use crate::sql::{Aggregation, Dialect, Expr, GroupingElement, SqlDialect};

impl ExprCompiler<'_, '_> {
    /// The GROUP BY elements of a grouping, or of one emulated level.
    ///
    /// Several effective grouping sets become one `GROUPING SETS` element;
    /// constant expressions are dropped everywhere.
    pub fn group_by(
        &mut self,
        grouping: &GroupingDef,
        level: Option<&GroupingLevel>,
    ) -> CompileResult<Vec<GroupingElement>> {
        if let Some(level) = level {
            return Ok(self
                .grouping_exprs(&level.columns)?
                .into_iter()
                .map(GroupingElement::Expr)
                .collect());
        }

        let sets = effective_grouping_sets(grouping);
        if sets.len() <= 1 {
            return Ok(self
                .grouping_exprs(&grouping.all_columns())?
                .into_iter()
                .map(GroupingElement::Expr)
                .collect());
        }
        let sets = sets
            .iter()
            .map(|set| self.grouping_exprs(set))
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(vec![GroupingElement::GroupingSets(sets)])
    }

    fn grouping_exprs(&mut self, ids: &[String]) -> CompileResult<Vec<Expr>> {
        let mut exprs = Vec::with_capacity(ids.len());
        for id in ids {
            let (expr, _) = self.column(id, Some(Aggregation::None), false)?;
            if !expr.is_constant() && !exprs.contains(&expr) {
                exprs.push(expr);
            }
        }
        Ok(exprs)
    }
}

/// The levels to compile separately when `dialect` cannot group by several
/// grouping sets; `None` when one GROUP BY does.
pub fn emulation_levels(grouping: &GroupingDef, dialect: Dialect) -> Option<Vec<GroupingLevel>> {
    if dialect.supports_grouping_sets() || !has_grouping_functions(grouping) {
        return None;
    }
    Some(grouping_levels(grouping))
}
