//! Tree rewrites over the parsed request.
//!
//! - Grouping functions expand into the effective grouping sets.
//! - Top-N dimension members become an `IN (sub-select)` filter leaf that
//!   ranks the members by their measure.

use std::collections::{BTreeSet, HashSet};

use super::*;

/// Alias of the derived table ranking top-n members.
pub const TOP_N_ALIAS: &str = "topn";
/// Column id of the rank in that derived table.
pub const TOP_N_RANK: &str = "topn_rank";

// =============================================================================
// Grouping sets
// =============================================================================

fn sorted_set(columns: impl IntoIterator<Item = String>) -> Vec<String> {
    columns
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn rollup_sets(columns: &[String]) -> Vec<Vec<String>> {
    (0..=columns.len())
        .rev()
        .map(|n| sorted_set(columns[..n].iter().cloned()))
        .collect()
}

/// Widest CUBE accepted; its power set has 2^16 grouping sets.
pub const MAX_CUBE_COLUMNS: usize = 16;

fn distinct_columns(columns: &[String]) -> Vec<String> {
    let mut distinct: Vec<String> = Vec::new();
    for c in columns {
        if !distinct.contains(c) {
            distinct.push(c.clone());
        }
    }
    distinct
}

/// The column count of the first CUBE wider than [`MAX_CUBE_COLUMNS`].
pub fn oversized_cube(grouping: &GroupingDef) -> Option<usize> {
    grouping.functions.iter().find_map(|function| match function {
        GroupingFunction::Cube(c) => {
            let n = distinct_columns(c).len();
            (n > MAX_CUBE_COLUMNS).then_some(n)
        }
        _ => None,
    })
}

/// Callers reject cubes wider than [`MAX_CUBE_COLUMNS`] first.
fn cube_sets(columns: &[String]) -> Vec<Vec<String>> {
    let distinct = distinct_columns(columns);
    (0u64..(1u64 << distinct.len()))
        .map(|mask| {
            sorted_set(
                distinct
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, c)| c.clone()),
            )
        })
        .collect()
}

/// Deduplicate and order sets: larger sets first, then lexicographically.
fn normalize_sets(sets: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let mut seen = HashSet::new();
    let mut out: Vec<Vec<String>> = sets
        .into_iter()
        .map(sorted_set)
        .filter(|s| seen.insert(s.clone()))
        .collect();
    out.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    out
}

/// The grouping sets a `<Grouping>` stands for.
///
/// Plain columns belong to every set; the sets of the grouping functions are
/// combined by cross product.
pub fn effective_grouping_sets(grouping: &GroupingDef) -> Vec<Vec<String>> {
    let mut sets = vec![sorted_set(grouping.columns.iter().cloned())];
    for function in &grouping.functions {
        let expansion = normalize_sets(match function {
            GroupingFunction::Rollup(c) => rollup_sets(c),
            GroupingFunction::Cube(c) => cube_sets(c),
            GroupingFunction::Sets(s) => s.clone(),
        });
        if expansion.is_empty() {
            continue;
        }
        sets = sets
            .iter()
            .flat_map(|base| {
                expansion
                    .iter()
                    .map(move |e| sorted_set(base.iter().chain(e.iter()).cloned()))
            })
            .collect();
    }
    normalize_sets(sets)
}

/// Whether the grouping needs more than one grouping set.
pub fn has_grouping_functions(grouping: &GroupingDef) -> bool {
    effective_grouping_sets(grouping).len() > 1
}

/// One aggregation level of an emulated grouping-sets select.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupingLevel {
    /// Columns grouped at this level.
    pub columns: Vec<String>,
    /// Grouping columns rolled up at this level (selected as typed NULL).
    pub absent: BTreeSet<String>,
}

/// Split a grouping into its levels.
pub fn grouping_levels(grouping: &GroupingDef) -> Vec<GroupingLevel> {
    let all: BTreeSet<String> = grouping.all_columns().into_iter().collect();
    effective_grouping_sets(grouping)
        .into_iter()
        .map(|set| {
            let present: BTreeSet<String> = set.iter().cloned().collect();
            GroupingLevel {
                absent: all.difference(&present).cloned().collect(),
                columns: set,
            }
        })
        .collect()
}

// =============================================================================
// Top-N dimension members
// =============================================================================

fn measure_node(measure: &ColumnDef) -> Option<CalcNode> {
    if let Some(calc) = &measure.calc {
        return Some(calc.root.clone());
    }
    measure.b_ref.as_ref().map(|id| CalcNode::ValueRef {
        id_ref: id.clone(),
        aggr: measure.aggr,
    })
}

/// Replace every `<TopN>` of the select by a filter leaf
/// `bRef IN (SELECT bRef FROM (... RANK() ...) WHERE rank <= n)`.
///
/// The ranking select reads the same sources under the same filter, groups by
/// the dimension, and ranks members by the measure.
pub fn expand_top_n(select: &mut SelectDef) {
    if select.top_n.is_empty() {
        return;
    }
    let base_filter = select.filter.clone();
    let mut leaves = Vec::new();

    for top in std::mem::take(&mut select.top_n) {
        let Some(measure) = measure_node(&top.measure) else {
            continue;
        };
        let ranking = SelectDef {
            alias: Some(TOP_N_ALIAS.to_string()),
            columns: vec![
                ColumnDef::reference(&top.b_ref),
                ColumnDef {
                    b_ref: Some(TOP_N_RANK.to_string()),
                    calc: Some(CalcDef {
                        ty: Some(crate::sql::JdbcType::BigInt),
                        scale: None,
                        root: CalcNode::Over {
                            func: WindowFn::Rank,
                            args: Vec::new(),
                            partition_by: Vec::new(),
                            order_by: vec![(measure, top.dir)],
                        },
                    }),
                    ..Default::default()
                },
            ],
            from: select.from.clone(),
            filter: base_filter.clone(),
            grouping: Some(GroupingDef {
                columns: vec![top.b_ref.clone()],
                functions: Vec::new(),
            }),
            ..Default::default()
        };
        // The ranking select exposes the dimension under its bare id.
        let member_id = top.b_ref.rsplit('.').next().unwrap_or(&top.b_ref);
        let members = SelectDef {
            columns: vec![ColumnDef::reference(member_id)],
            from: Some(FromDef::SubSelect(Box::new(ranking))),
            filter: Some(BoolExpr::Leaf(Comparison::new(
                TOP_N_RANK,
                CompareOperator::Le,
                vec![top.n.to_string()],
            ))),
            ..Default::default()
        };
        let mut leaf = Comparison::new(&top.b_ref, CompareOperator::In, Vec::new());
        leaf.sub_select = Some(Box::new(members));
        leaves.push(BoolExpr::Leaf(leaf));
    }

    if leaves.is_empty() {
        return;
    }
    select.filter = Some(match select.filter.take() {
        None if leaves.len() == 1 => leaves.remove(0),
        None => BoolExpr::And(leaves),
        Some(existing) => {
            let mut parts = vec![existing];
            parts.extend(leaves);
            BoolExpr::And(parts)
        }
    });
}
