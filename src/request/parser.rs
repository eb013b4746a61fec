//! Wrq document parser.
//!
//! Two passes: quick-xml events are folded into a small element tree, then
//! the tree is walked into the request model. Element and attribute names are
//! matched by local name, so namespace prefixes are ignored.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::warn;

use super::*;
use crate::sql::{Aggregation, JdbcType, JoinType, NullsOrder, SortDir};

// =============================================================================
// Element tree
// =============================================================================

#[derive(Debug, Clone, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    fn flag(&self, name: &str) -> bool {
        matches!(self.attr(name).map(str::trim), Some("true") | Some("1"))
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn required_attr(&self, name: &str) -> RequestResult<&str> {
        self.non_empty_attr(name).ok_or_else(|| {
            RequestError::invalid(&self.name, format!("missing attribute '{name}'"))
        })
    }

    fn text(&self) -> &str {
        self.text.trim()
    }
}

fn start_element(e: &BytesStart<'_>) -> RequestResult<Element> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| RequestError::Xml(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| RequestError::Xml(err.to_string()))?
            .to_string();
        attrs.push((key, value));
    }
    Ok(Element {
        name,
        attrs,
        ..Default::default()
    })
}

fn read_tree(xml: &str) -> RequestResult<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if root.is_some() {
                    return Err(RequestError::Xml("content after root element".into()));
                }
                stack.push(start_element(&e)?);
            }
            Ok(Event::Empty(e)) => {
                let element = start_element(&e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => {
                        return Err(RequestError::Xml("content after root element".into()))
                    }
                }
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| RequestError::Xml("unbalanced end tag".into()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| RequestError::Xml(err.to_string()))?;
                match stack.last_mut() {
                    Some(current) => current.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(RequestError::Xml("text outside root element".into())),
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(RequestError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(RequestError::Xml(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| RequestError::Xml("document has no root element".into()))
}

// =============================================================================
// Model walker
// =============================================================================

/// Parse a Wrq document.
///
/// The root may be `<WrsRequest>` or directly a `<Select>`/`<SelectList>`.
pub fn parse_request(xml: &str) -> RequestResult<WrqRequest> {
    let root = read_tree(xml)?;
    let mut request = WrqRequest::default();

    if matches!(root.name.as_str(), "Select" | "SelectList") {
        request.body = Some(parse_full_select(&root)?);
        return Ok(request);
    }

    for child in &root.children {
        match child.name.as_str() {
            "With" => {
                for cte in child.children_named("Cte") {
                    request.ctes.push(parse_cte(cte)?);
                }
            }
            "Select" | "SelectList" => {
                if request.body.is_some() {
                    return Err(RequestError::invalid(&root.name, "more than one main select"));
                }
                request.body = Some(parse_full_select(child)?);
            }
            other => {
                return Err(RequestError::invalid(
                    &root.name,
                    format!("unexpected element <{other}>"),
                ))
            }
        }
    }

    if request.body.is_none() {
        warn!("request has no select");
    }
    Ok(request)
}

fn parse_cte(e: &Element) -> RequestResult<CteDef> {
    let name = e.required_attr("name")?.to_string();
    let body = e
        .children
        .iter()
        .find(|c| matches!(c.name.as_str(), "Select" | "SelectList"))
        .ok_or_else(|| RequestError::invalid("Cte", format!("CTE '{name}' has no select")))?;
    Ok(CteDef {
        name,
        body: parse_full_select(body)?,
    })
}

fn parse_full_select(e: &Element) -> RequestResult<FullSelectDef> {
    if e.name == "Select" {
        return Ok(FullSelectDef::single(parse_select(e)?));
    }

    let mut first: Option<SelectDef> = None;
    let mut rest = Vec::new();
    let mut pending: Option<SetOperator> = None;
    let mut ordering = Vec::new();

    for child in &e.children {
        if let Some(op) = SetOperator::from_element(&child.name) {
            if first.is_none() || pending.is_some() {
                return Err(RequestError::invalid(
                    "SelectList",
                    format!("misplaced <{}>", child.name),
                ));
            }
            pending = Some(op);
            continue;
        }
        match child.name.as_str() {
            "Select" => {
                let select = parse_select(child)?;
                if first.is_none() {
                    first = Some(select);
                } else {
                    // Adjacent selects without an operator are unioned.
                    rest.push((pending.take().unwrap_or(SetOperator::Union), select));
                }
            }
            "Ordering" => ordering = parse_ordering(child)?,
            other => {
                return Err(RequestError::invalid(
                    "SelectList",
                    format!("unexpected element <{other}>"),
                ))
            }
        }
    }

    if pending.is_some() {
        warn!("set operator without a following select ignored");
    }
    let first = first.ok_or_else(|| RequestError::invalid("SelectList", "no select"))?;
    Ok(FullSelectDef {
        first,
        rest,
        ordering,
    })
}

fn parse_u64(e: &Element, name: &str) -> RequestResult<Option<u64>> {
    match e.non_empty_attr(name) {
        None => Ok(None),
        Some(v) => v.parse::<u64>().map(Some).map_err(|_| {
            RequestError::invalid(&e.name, format!("attribute '{name}' is not a row number: {v}"))
        }),
    }
}

fn parse_u32(e: &Element, name: &str) -> RequestResult<Option<u32>> {
    match e.non_empty_attr(name) {
        None => Ok(None),
        Some(v) => v.parse::<u32>().map(Some).map_err(|_| {
            RequestError::invalid(&e.name, format!("attribute '{name}' is not a number: {v}"))
        }),
    }
}

fn parse_aggr(e: &Element) -> RequestResult<Option<Aggregation>> {
    match e.non_empty_attr("aggr") {
        None => Ok(None),
        Some(v) => Aggregation::parse(v)
            .map(Some)
            .ok_or_else(|| RequestError::invalid(&e.name, format!("unknown aggregation '{v}'"))),
    }
}

fn parse_type(e: &Element) -> RequestResult<Option<JdbcType>> {
    match e.non_empty_attr("type-name") {
        None => Ok(None),
        Some(v) => JdbcType::parse(v)
            .map(Some)
            .ok_or_else(|| RequestError::invalid(&e.name, format!("unknown type '{v}'"))),
    }
}

fn parse_dir(e: &Element) -> RequestResult<SortDir> {
    match e.non_empty_attr("order").map(str::to_ascii_lowercase).as_deref() {
        None | Some("asc") => Ok(SortDir::Asc),
        Some("desc") => Ok(SortDir::Desc),
        Some(other) => Err(RequestError::invalid(
            &e.name,
            format!("unknown sort order '{other}'"),
        )),
    }
}

fn parse_select(e: &Element) -> RequestResult<SelectDef> {
    let mut select = SelectDef {
        alias: e.non_empty_attr("alias").map(String::from),
        row_start: parse_u64(e, "rowStart")?,
        row_end: parse_u64(e, "rowEnd")?,
        distinct: e.flag("distinct"),
        ..Default::default()
    };

    for child in &e.children {
        match child.name.as_str() {
            "Columns" => {
                for c in child.children_named("C") {
                    select.columns.push(parse_column(c)?);
                }
            }
            "From" => select.from = parse_from(child)?,
            "Filter" => select.filter = parse_bool_children(child)?,
            "Having" => select.having = parse_bool_children(child)?,
            "Grouping" => select.grouping = Some(parse_grouping(child)?),
            "Ordering" => select.ordering = parse_ordering(child)?,
            "TopNDimMembers" => {
                for t in child.children_named("TopN") {
                    select.top_n.push(parse_top_n(t)?);
                }
            }
            "Vdms" => {
                for v in child.children_named("Vdm") {
                    select.vdms.push(parse_vdm(v)?);
                }
            }
            other => {
                return Err(RequestError::invalid(
                    "Select",
                    format!("unexpected element <{other}>"),
                ))
            }
        }
    }
    Ok(select)
}

fn parse_column(e: &Element) -> RequestResult<ColumnDef> {
    let mut column = ColumnDef {
        b_ref: e.non_empty_attr("bRef").map(String::from),
        aggr: parse_aggr(e)?,
        caption: e.attr("caption").map(String::from),
        ..Default::default()
    };
    for child in &e.children {
        match child.name.as_str() {
            "A" => column.attributes.push(AttributeDef {
                name: child.required_attr("name")?.to_string(),
                b_ref: child.required_attr("bRef")?.to_string(),
            }),
            "Calc" => column.calc = Some(parse_calc(child)?),
            other => {
                return Err(RequestError::invalid(
                    "C",
                    format!("unexpected element <{other}>"),
                ))
            }
        }
    }
    if column.b_ref.is_none() && column.calc.is_none() {
        return Err(RequestError::invalid("C", "column needs a bRef or a Calc"));
    }
    Ok(column)
}

// =============================================================================
// Calculations
// =============================================================================

fn parse_calc(e: &Element) -> RequestResult<CalcDef> {
    let node = match e.children.as_slice() {
        [only] => parse_calc_node(only)?,
        _ => {
            return Err(RequestError::invalid(
                "Calc",
                "expects exactly one expression",
            ))
        }
    };
    Ok(CalcDef {
        ty: parse_type(e)?,
        scale: parse_u32(e, "scale")?,
        root: node,
    })
}

fn calc_children(e: &Element) -> RequestResult<Vec<CalcNode>> {
    e.children.iter().map(parse_calc_node).collect()
}

fn single_child(e: &Element) -> RequestResult<CalcNode> {
    match e.children.as_slice() {
        [only] => parse_calc_node(only),
        _ => Err(RequestError::invalid(&e.name, "expects exactly one argument")),
    }
}

fn parse_calc_node(e: &Element) -> RequestResult<CalcNode> {
    let arith = |op| -> RequestResult<CalcNode> {
        let args = calc_children(e)?;
        if args.is_empty() {
            return Err(RequestError::invalid(&e.name, "needs operands"));
        }
        Ok(CalcNode::Arith { op, args })
    };
    let compare = |op| -> RequestResult<CalcNode> {
        match calc_children(e)?.as_slice() {
            [left, right] => Ok(CalcNode::Compare {
                op,
                left: Box::new(left.clone()),
                right: Box::new(right.clone()),
            }),
            _ => Err(RequestError::invalid(&e.name, "needs two operands")),
        }
    };
    let aggregate = |func| -> RequestResult<CalcNode> {
        Ok(CalcNode::Aggregate {
            func,
            arg: Box::new(single_child(e)?),
        })
    };

    match e.name.as_str() {
        "Value" => Ok(CalcNode::Value {
            value: e.text().to_string(),
            ty: parse_type(e)?,
        }),
        "ValueRef" => Ok(CalcNode::ValueRef {
            id_ref: e.required_attr("idRef")?.to_string(),
            aggr: parse_aggr(e)?,
        }),
        "Add" => arith(ArithOp::Add),
        "Sub" => arith(ArithOp::Sub),
        "Mul" => arith(ArithOp::Mul),
        "Div" => arith(ArithOp::Div),
        "Concat" => Ok(CalcNode::Concat(calc_children(e)?)),
        "Coalesce" => Ok(CalcNode::Coalesce(calc_children(e)?)),
        "Eq" => compare(CompareOp::Eq),
        "Ne" => compare(CompareOp::Ne),
        "Lt" => compare(CompareOp::Lt),
        "Le" => compare(CompareOp::Le),
        "Gt" => compare(CompareOp::Gt),
        "Ge" => compare(CompareOp::Ge),
        "CaseWhen" => parse_case_when(e),
        "Cast" => {
            let ty = parse_type(e)?
                .ok_or_else(|| RequestError::invalid("Cast", "missing attribute 'type-name'"))?;
            Ok(CalcNode::Cast {
                node: Box::new(single_child(e)?),
                ty,
                scale: parse_u32(e, "scale")?,
            })
        }
        "Sum" => aggregate(Aggregation::Sum),
        "Min" => aggregate(Aggregation::Min),
        "Max" => aggregate(Aggregation::Max),
        "Avg" => aggregate(Aggregation::Avg),
        "Count" => aggregate(Aggregation::Count),
        "CountDistinct" => aggregate(Aggregation::CountDistinct),
        "Grouping" => aggregate(Aggregation::Grouping),
        "Over" => parse_over(e),
        other => Err(RequestError::invalid(
            other,
            "unknown calculation element",
        )),
    }
}

fn parse_case_when(e: &Element) -> RequestResult<CalcNode> {
    let mut branches = Vec::new();
    let mut otherwise = None;
    for child in &e.children {
        match child.name.as_str() {
            "When" => match calc_children(child)?.as_slice() {
                [cond, value] => branches.push((cond.clone(), value.clone())),
                _ => {
                    return Err(RequestError::invalid(
                        "When",
                        "needs a condition and a result",
                    ))
                }
            },
            "Else" => otherwise = Some(Box::new(single_child(child)?)),
            other => {
                return Err(RequestError::invalid(
                    "CaseWhen",
                    format!("unexpected element <{other}>"),
                ))
            }
        }
    }
    if branches.is_empty() {
        return Err(RequestError::invalid("CaseWhen", "needs at least one <When>"));
    }
    Ok(CalcNode::CaseWhen {
        branches,
        otherwise,
    })
}

fn parse_over(e: &Element) -> RequestResult<CalcNode> {
    let name = e.required_attr("fn")?;
    let func = WindowFn::parse(name)
        .ok_or_else(|| RequestError::invalid("Over", format!("unknown window function '{name}'")))?;

    let mut args = Vec::new();
    let mut partition_by: Vec<CalcNode> = e
        .non_empty_attr("partition")
        .map(|p| {
            p.split([',', ' '])
                .filter(|s| !s.is_empty())
                .map(|id| CalcNode::ValueRef {
                    id_ref: id.to_string(),
                    aggr: None,
                })
                .collect()
        })
        .unwrap_or_default();
    let mut order_by = Vec::new();

    for child in &e.children {
        match child.name.as_str() {
            "Arg" => args.push(single_child(child)?),
            "PartitionBy" => partition_by.extend(calc_children(child)?),
            "OrderBy" => {
                let dir = parse_dir(child)?;
                for node in calc_children(child)? {
                    order_by.push((node, dir));
                }
            }
            other => {
                return Err(RequestError::invalid(
                    "Over",
                    format!("unexpected element <{other}>"),
                ))
            }
        }
    }

    if func.is_ranking() && order_by.is_empty() {
        return Err(RequestError::invalid("Over", format!("{name} needs an <OrderBy>")));
    }
    if !func.is_ranking() && args.is_empty() {
        return Err(RequestError::invalid("Over", format!("{name} needs an <Arg>")));
    }

    Ok(CalcNode::Over {
        func,
        args,
        partition_by,
        order_by,
    })
}

// =============================================================================
// FROM
// =============================================================================

fn parse_from(e: &Element) -> RequestResult<Option<FromDef>> {
    let mut items = e
        .children
        .iter()
        .map(parse_from_item)
        .collect::<RequestResult<Vec<_>>>()?
        .into_iter();
    let Some(first) = items.next() else {
        return Ok(None);
    };
    // Several sources side by side are a cross product.
    Ok(Some(items.fold(first, |left, right| FromDef::Join {
        join_type: JoinType::Cross,
        left: Box::new(left),
        right: Box::new(right),
        on: None,
    })))
}

fn parse_from_item(e: &Element) -> RequestResult<FromDef> {
    match e.name.as_str() {
        "BindingSet" => {
            let name = e.text();
            if name.is_empty() {
                return Err(RequestError::invalid("BindingSet", "missing table name"));
            }
            Ok(FromDef::BindingSet {
                name: name.to_string(),
                alias: e.non_empty_attr("alias").map(String::from),
            })
        }
        "Select" => Ok(FromDef::SubSelect(Box::new(parse_select(e)?))),
        "Join" => parse_join(e),
        other => Err(RequestError::invalid(
            "From",
            format!("unexpected element <{other}>"),
        )),
    }
}

fn parse_join_type(e: &Element) -> RequestResult<JoinType> {
    match e.non_empty_attr("type").map(str::to_ascii_lowercase).as_deref() {
        None | Some("inner") => Ok(JoinType::Inner),
        Some("left") => Ok(JoinType::Left),
        Some("right") => Ok(JoinType::Right),
        Some("full") => Ok(JoinType::Full),
        Some("cross") => Ok(JoinType::Cross),
        Some(other) => Err(RequestError::invalid(
            "Join",
            format!("unknown join type '{other}'"),
        )),
    }
}

fn parse_join(e: &Element) -> RequestResult<FromDef> {
    let join_type = parse_join_type(e)?;
    let mut sources = Vec::new();
    let mut on = None;
    for child in &e.children {
        if child.name == "On" {
            on = parse_bool_children(child)?;
        } else {
            sources.push(parse_from_item(child)?);
        }
    }
    if sources.len() < 2 {
        return Err(RequestError::invalid("Join", "needs two sources"));
    }

    // More than two sources fold left; only the outermost join carries the
    // declared condition.
    let mut iter = sources.into_iter();
    let mut left = iter.next().ok_or_else(|| RequestError::invalid("Join", "needs two sources"))?;
    let mut remaining: Vec<FromDef> = iter.collect();
    let last = remaining
        .pop()
        .ok_or_else(|| RequestError::invalid("Join", "needs two sources"))?;
    for right in remaining {
        left = FromDef::Join {
            join_type,
            left: Box::new(left),
            right: Box::new(right),
            on: None,
        };
    }
    Ok(FromDef::Join {
        join_type,
        left: Box::new(left),
        right: Box::new(last),
        on: if join_type == JoinType::Cross { None } else { on },
    })
}

// =============================================================================
// Boolean trees
// =============================================================================

/// Children of a `<Filter>`/`<Having>`/`<On>`, implicitly ANDed.
fn parse_bool_children(e: &Element) -> RequestResult<Option<BoolExpr>> {
    let mut parts = e
        .children
        .iter()
        .map(parse_bool)
        .collect::<RequestResult<Vec<_>>>()?;
    Ok(match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(BoolExpr::And(parts)),
    })
}

fn parse_bool(e: &Element) -> RequestResult<BoolExpr> {
    match e.name.as_str() {
        "And" => Ok(BoolExpr::And(
            e.children.iter().map(parse_bool).collect::<RequestResult<_>>()?,
        )),
        "Or" => Ok(BoolExpr::Or(
            e.children.iter().map(parse_bool).collect::<RequestResult<_>>()?,
        )),
        "Not" => {
            let inner = parse_bool_children(e)?
                .ok_or_else(|| RequestError::invalid("Not", "needs an operand"))?;
            Ok(BoolExpr::Not(Box::new(inner)))
        }
        "Expression" => Ok(BoolExpr::Leaf(parse_comparison(e)?)),
        other => Err(RequestError::invalid(
            other,
            "unknown boolean connective",
        )),
    }
}

fn parse_comparison(e: &Element) -> RequestResult<Comparison> {
    let b_ref = e.required_attr("bRef")?;
    let op_text = e.non_empty_attr("op").unwrap_or("=");
    let op = CompareOperator::parse(op_text).ok_or_else(|| {
        RequestError::invalid("Expression", format!("unknown operator '{op_text}'"))
    })?;

    let mut values: Vec<String> = e.attr("value").map(String::from).into_iter().collect();
    let mut comparison = Comparison::new(b_ref, op, Vec::new());
    comparison.ic = e.flag("ic");
    comparison.aggr = parse_aggr(e)?;
    comparison.b_ref_value = e.non_empty_attr("bRefValue").map(String::from);

    for child in &e.children {
        match child.name.as_str() {
            "Value" => values.push(child.text().to_string()),
            "Calc" => comparison.calc = Some(parse_calc(child)?),
            "Select" => comparison.sub_select = Some(Box::new(parse_select(child)?)),
            other => {
                return Err(RequestError::invalid(
                    "Expression",
                    format!("unexpected element <{other}>"),
                ))
            }
        }
    }
    comparison.values = values;
    Ok(comparison)
}

// =============================================================================
// Grouping / ordering / top-n / vdm
// =============================================================================

fn column_refs(e: &Element) -> RequestResult<Vec<String>> {
    e.children_named("C")
        .map(|c| c.required_attr("bRef").map(String::from))
        .collect()
}

fn parse_grouping(e: &Element) -> RequestResult<GroupingDef> {
    let mut grouping = GroupingDef::default();
    for child in &e.children {
        match child.name.as_str() {
            "C" => grouping.columns.push(child.required_attr("bRef")?.to_string()),
            "Rollup" => grouping
                .functions
                .push(GroupingFunction::Rollup(column_refs(child)?)),
            "Cube" => grouping
                .functions
                .push(GroupingFunction::Cube(column_refs(child)?)),
            "GroupingSets" => {
                let sets = child
                    .children_named("Set")
                    .map(column_refs)
                    .collect::<RequestResult<Vec<_>>>()?;
                grouping.functions.push(GroupingFunction::Sets(sets));
            }
            other => {
                return Err(RequestError::invalid(
                    "Grouping",
                    format!("unexpected element <{other}>"),
                ))
            }
        }
    }
    Ok(grouping)
}

fn parse_ordering(e: &Element) -> RequestResult<Vec<OrderDef>> {
    let mut items = Vec::new();
    for c in e.children_named("C") {
        let pos = match c.non_empty_attr("pos") {
            None => None,
            Some(p) => Some(p.parse::<usize>().ok().filter(|p| *p > 0).ok_or_else(|| {
                RequestError::invalid("C", format!("invalid position '{p}'"))
            })?),
        };
        let nulls = match c.non_empty_attr("nulls").map(str::to_ascii_lowercase).as_deref() {
            None => None,
            Some("first") => Some(NullsOrder::First),
            Some("last") => Some(NullsOrder::Last),
            Some(other) => {
                return Err(RequestError::invalid(
                    "C",
                    format!("unknown null placement '{other}'"),
                ))
            }
        };
        let item = OrderDef {
            b_ref: c.non_empty_attr("bRef").map(String::from),
            pos,
            aggr: parse_aggr(c)?,
            dir: parse_dir(c)?,
            nulls,
        };
        if item.b_ref.is_none() && item.pos.is_none() {
            return Err(RequestError::invalid("C", "ordering needs a bRef or a pos"));
        }
        items.push(item);
    }
    Ok(items)
}

fn parse_top_n(e: &Element) -> RequestResult<TopNDef> {
    let n = parse_u32(e, "n")?.ok_or_else(|| RequestError::invalid("TopN", "missing attribute 'n'"))?;
    let measure = e
        .child("C")
        .ok_or_else(|| RequestError::invalid("TopN", "missing measure column"))?;
    Ok(TopNDef {
        n,
        b_ref: e.required_attr("bRef")?.to_string(),
        dir: match e.non_empty_attr("order") {
            None => SortDir::Desc,
            Some(_) => parse_dir(e)?,
        },
        measure: parse_column(measure)?,
    })
}

fn parse_vdm(e: &Element) -> RequestResult<VdmDef> {
    let mut vdm = VdmDef {
        b_ref: e.required_attr("bRef")?.to_string(),
        maps: Vec::new(),
        rest: None,
    };
    for child in &e.children {
        match child.name.as_str() {
            "Map" => vdm.maps.push(VdmMap {
                to: child.attr("to").unwrap_or_default().to_string(),
                values: child
                    .children_named("Value")
                    .map(|v| v.text().to_string())
                    .collect(),
            }),
            "Rest" => vdm.rest = Some(child.attr("to").unwrap_or_default().to_string()),
            other => {
                return Err(RequestError::invalid(
                    "Vdm",
                    format!("unexpected element <{other}>"),
                ))
            }
        }
    }
    Ok(vdm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_select() {
        let xml = r#"<?xml version="1.0"?>
        <WrsRequest xmlns="http://example.com/wrq">
          <Select rowStart="1" rowEnd="100">
            <Columns>
              <C bRef="region" caption="Region"><A name="caption" bRef="region_caption"/></C>
              <C bRef="amount" aggr="sum"/>
            </Columns>
            <From><BindingSet alias="s">sales</BindingSet></From>
            <Filter><Expression bRef="amount" op=">" value="100"/></Filter>
          </Select>
        </WrsRequest>"#;

        let request = parse_request(xml).unwrap();
        let select = request.sole_select().unwrap();
        assert_eq!(select.row_end, Some(100));
        assert_eq!(select.columns.len(), 2);
        assert_eq!(select.columns[0].attributes[0].b_ref, "region_caption");
        assert_eq!(select.columns[1].aggr, Some(Aggregation::Sum));
        assert_eq!(
            select.from,
            Some(FromDef::BindingSet {
                name: "sales".into(),
                alias: Some("s".into())
            })
        );
        let Some(BoolExpr::Leaf(leaf)) = &select.filter else {
            panic!("expected a leaf filter");
        };
        assert_eq!(leaf.op, CompareOperator::Gt);
        assert_eq!(leaf.values, vec!["100".to_string()]);
    }

    #[test]
    fn test_parse_select_list_and_ordering() {
        let xml = r#"<WrsRequest><SelectList>
            <Select><Columns><C bRef="a"/></Columns><From><BindingSet>t1</BindingSet></From></Select>
            <UnionAll/>
            <Select><Columns><C bRef="a"/></Columns><From><BindingSet>t2</BindingSet></From></Select>
            <Ordering><C pos="1" order="desc" nulls="last"/></Ordering>
        </SelectList></WrsRequest>"#;

        let request = parse_request(xml).unwrap();
        let body = request.body.unwrap();
        assert_eq!(body.rest.len(), 1);
        assert_eq!(body.rest[0].0, SetOperator::UnionAll);
        assert_eq!(body.ordering[0].pos, Some(1));
        assert_eq!(body.ordering[0].dir, SortDir::Desc);
        assert_eq!(body.ordering[0].nulls, Some(NullsOrder::Last));
    }

    #[test]
    fn test_parse_join_folds_left() {
        let xml = r#"<Select><From><Join type="left">
            <BindingSet>a</BindingSet><BindingSet>b</BindingSet><BindingSet>c</BindingSet>
            <On><Expression bRef="a.id" op="=" bRefValue="c.id"/></On>
        </Join></From></Select>"#;

        let request = parse_request(xml).unwrap();
        let select = request.sole_select().unwrap();
        let Some(FromDef::Join { left, on, .. }) = &select.from else {
            panic!("expected a join");
        };
        assert!(on.is_some());
        assert!(matches!(**left, FromDef::Join { on: None, .. }));
    }

    #[test]
    fn test_parse_calc_tree() {
        let xml = r#"<Select><Columns><C bRef="net">
            <Calc type-name="DECIMAL" scale="2">
              <Div><ValueRef idRef="amount"/><Add><ValueRef idRef="qty"/><Value>1</Value></Add></Div>
            </Calc></C></Columns></Select>"#;

        let request = parse_request(xml).unwrap();
        let calc = request.sole_select().unwrap().columns[0].calc.clone().unwrap();
        assert_eq!(calc.ty, Some(JdbcType::Decimal));
        assert_eq!(calc.scale, Some(2));
        let mut refs = Vec::new();
        calc.root.collect_refs(&mut refs);
        assert_eq!(refs, vec!["amount", "qty"]);
    }

    #[test]
    fn test_parse_over_requires_order_for_rank() {
        let xml = r#"<Select><Columns><C bRef="r"><Calc><Over fn="rank"/></Calc></C></Columns></Select>"#;
        assert!(matches!(
            parse_request(xml),
            Err(RequestError::Invalid { .. })
        ));
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let xml = r#"<Select><Filter><Expression bRef="a" op="; DROP TABLE x" value="1"/></Filter></Select>"#;
        let err = parse_request(xml).unwrap_err();
        assert!(err.to_string().contains("unknown operator"));
    }

    #[test]
    fn test_unknown_aggregation_is_rejected() {
        let xml = r#"<Select><Columns><C bRef="a" aggr="median"/></Columns></Select>"#;
        assert!(parse_request(xml).is_err());
    }

    #[test]
    fn test_malformed_xml() {
        for xml in ["", "not xml", "<Select>", "<Select></From>", "<a/><b/>"] {
            assert!(
                matches!(parse_request(xml), Err(RequestError::Xml(_))),
                "accepted {xml:?}"
            );
        }
    }

    #[test]
    fn test_request_without_select() {
        let request = parse_request("<WrsRequest/>").unwrap();
        assert!(request.body.is_none());
    }

    #[test]
    fn test_parse_cte_and_vdm() {
        let xml = r#"<WrsRequest>
          <With><Cte name="eu"><Select><Columns><C bRef="country"/></Columns>
            <From><BindingSet>sales</BindingSet></From></Select></Cte></With>
          <Select>
            <Columns><C bRef="country"/></Columns>
            <From><BindingSet>eu</BindingSet></From>
            <Vdms><Vdm bRef="country">
              <Map to="EU"><Value>DE</Value><Value>FR</Value></Map>
              <Rest to="Other"/>
            </Vdm></Vdms>
          </Select>
        </WrsRequest>"#;

        let request = parse_request(xml).unwrap();
        assert_eq!(request.ctes[0].name, "eu");
        let vdm = &request.sole_select().unwrap().vdms[0];
        assert_eq!(vdm.maps[0].values, vec!["DE", "FR"]);
        assert_eq!(vdm.rest.as_deref(), Some("Other"));
    }

    #[test]
    fn test_parse_grouping_functions() {
        let xml = r#"<Select><Grouping>
            <C bRef="year"/>
            <Rollup><C bRef="region"/><C bRef="city"/></Rollup>
            <GroupingSets><Set><C bRef="a"/></Set><Set/></GroupingSets>
        </Grouping></Select>"#;

        let grouping = parse_request(xml)
            .unwrap()
            .sole_select()
            .unwrap()
            .grouping
            .clone()
            .unwrap();
        assert_eq!(grouping.columns, vec!["year"]);
        assert_eq!(grouping.functions.len(), 2);
        assert_eq!(grouping.all_columns(), vec!["year", "region", "city", "a"]);
    }
}
