//! Builds the nested price list from flat category / item rows.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PriceCategoryRow {
    pub category_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub display_order: i32,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PriceItemRow {
    pub item_id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    /// KRW; `None` renders as "inquire".
    pub price: Option<i32>,
    pub note: Option<String>,
    pub display_order: i32,
}

#[derive(Debug, Serialize)]
pub struct PriceCategoryNode {
    pub category_id: Uuid,
    pub name: String,
    pub display_order: i32,
    pub items: Vec<PriceItemRow>,
    pub children: Vec<PriceCategoryNode>,
}

/// Categories whose parent is missing from `categories` are treated as roots,
/// and so is the first member of any parent loop.
pub fn build_tree(categories: Vec<PriceCategoryRow>, items: Vec<PriceItemRow>) -> Vec<PriceCategoryNode> {
    let known: HashSet<Uuid> = categories.iter().map(|c| c.category_id).collect();

    let mut items_by_cat: HashMap<Uuid, Vec<PriceItemRow>> = HashMap::new();
    for it in items {
        items_by_cat.entry(it.category_id).or_default().push(it);
    }

    let mut children_of: HashMap<Option<Uuid>, Vec<PriceCategoryRow>> = HashMap::new();
    for c in categories {
        let parent = c.parent_id.filter(|p| known.contains(p) && *p != c.category_id);
        children_of.entry(parent).or_default().push(c);
    }

    let mut visited = HashSet::new();
    let mut roots = attach(None, &mut children_of, &mut items_by_cat, &mut visited);

    // rows left over sit in a parent loop, unreachable from any root
    let mut stranded: Vec<PriceCategoryRow> = children_of
        .values()
        .flatten()
        .filter(|c| !visited.contains(&c.category_id))
        .cloned()
        .collect();
    sort_rows(&mut stranded);
    for row in stranded {
        if visited.contains(&row.category_id) {
            continue;
        }
        children_of.insert(None, vec![row]);
        roots.extend(attach(None, &mut children_of, &mut items_by_cat, &mut visited));
    }
    roots
}

fn sort_rows(rows: &mut [PriceCategoryRow]) {
    rows.sort_by(|a, b| a.display_order.cmp(&b.display_order).then_with(|| a.name.cmp(&b.name)));
}

fn attach(
    parent: Option<Uuid>,
    children_of: &mut HashMap<Option<Uuid>, Vec<PriceCategoryRow>>,
    items_by_cat: &mut HashMap<Uuid, Vec<PriceItemRow>>,
    visited: &mut HashSet<Uuid>,
) -> Vec<PriceCategoryNode> {
    let mut rows = children_of.remove(&parent).unwrap_or_default();
    sort_rows(&mut rows);

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if !visited.insert(row.category_id) {
            continue;
        }
        let mut items = items_by_cat.remove(&row.category_id).unwrap_or_default();
        items.sort_by(|a, b| a.display_order.cmp(&b.display_order).then_with(|| a.name.cmp(&b.name)));
        let children = attach(Some(row.category_id), children_of, items_by_cat, visited);
        out.push(PriceCategoryNode {
            category_id: row.category_id,
            name: row.name,
            display_order: row.display_order,
            items,
            children,
        });
    }
    out
}

/// True when making `parent` the parent of `category` would close a loop.
/// `parents` maps every category to its current parent.
pub fn creates_cycle(category: Uuid, parent: Uuid, parents: &HashMap<Uuid, Option<Uuid>>) -> bool {
    let mut cursor = Some(parent);
    let mut steps = 0usize;
    while let Some(id) = cursor {
        if id == category {
            return true;
        }
        steps += 1;
        if steps > parents.len() {
            return true;
        }
        cursor = parents.get(&id).copied().flatten();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(id: Uuid, parent: Option<Uuid>, name: &str, order: i32) -> PriceCategoryRow {
        PriceCategoryRow { category_id: id, parent_id: parent, name: name.into(), display_order: order }
    }

    fn item(cat: Uuid, name: &str, order: i32) -> PriceItemRow {
        PriceItemRow {
            item_id: Uuid::new_v4(),
            category_id: cat,
            name: name.into(),
            price: Some(10_000),
            note: None,
            display_order: order,
        }
    }

    #[test]
    fn test_builds_nested_tree_in_order() {
        let root_a = Uuid::new_v4();
        let root_b = Uuid::new_v4();
        let child = Uuid::new_v4();

        let tree = build_tree(
            vec![
                cat(child, Some(root_a), "Injections", 1),
                cat(root_b, None, "Checkups", 2),
                cat(root_a, None, "Non-covered", 1),
            ],
            vec![item(child, "Vitamin", 2), item(child, "Flu", 1), item(root_b, "Basic", 1)],
        );

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].name, "Non-covered");
        assert_eq!(tree[0].children.len(), 1);
        let inj = &tree[0].children[0];
        assert_eq!(inj.name, "Injections");
        let names: Vec<_> = inj.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Flu", "Vitamin"]);
        assert_eq!(tree[1].items.len(), 1);
    }

    #[test]
    fn test_orphan_becomes_root() {
        let orphan = Uuid::new_v4();
        let tree = build_tree(vec![cat(orphan, Some(Uuid::new_v4()), "Lost", 0)], vec![]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].category_id, orphan);
    }

    #[test]
    fn test_parent_loop_is_surfaced_as_root() {
        let normal = Uuid::new_v4();
        let alpha = Uuid::new_v4();
        let beta = Uuid::new_v4();

        let tree = build_tree(
            vec![
                cat(normal, None, "Checkups", 0),
                cat(alpha, Some(beta), "Alpha", 1),
                cat(beta, Some(alpha), "Beta", 2),
            ],
            vec![item(beta, "Looped item", 0)],
        );

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].category_id, normal);
        assert_eq!(tree[1].category_id, alpha);
        assert_eq!(tree[1].children.len(), 1);
        assert_eq!(tree[1].children[0].category_id, beta);
        assert_eq!(tree[1].children[0].items.len(), 1);
        assert!(tree[1].children[0].children.is_empty());
    }

    #[test]
    fn test_creates_cycle() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let parents: HashMap<Uuid, Option<Uuid>> =
            [(a, None), (b, Some(a)), (c, Some(b))].into_iter().collect();

        assert!(creates_cycle(a, c, &parents));
        assert!(creates_cycle(a, a, &parents));
        assert!(!creates_cycle(c, a, &parents));
    }
}
