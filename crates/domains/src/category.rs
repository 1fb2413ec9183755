//! Category forest: at most one level of nesting, ordered for display.

use serde::{Deserialize, Serialize};

use crate::models::CategoryId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Unique, stable URL slug.
    pub slug: String,
    pub parent_id: Option<CategoryId>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// A top-level category with its direct children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    pub category: Category,
    pub children: Vec<Category>,
}

/// Active categories arranged as a forest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryTree {
    pub roots: Vec<CategoryNode>,
}

impl CategoryTree {
    /// Builds the forest from a flat list. Inactive categories are dropped, and so
    /// are children whose parent is missing or inactive. Siblings are ordered by
    /// display order, then name.
    pub fn build(categories: Vec<Category>) -> Self {
        let mut active: Vec<Category> = categories.into_iter().filter(|c| c.is_active).collect();
        active.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });

        let (roots, children): (Vec<_>, Vec<_>) =
            active.into_iter().partition(|c| c.parent_id.is_none());

        let roots = roots
            .into_iter()
            .map(|category| {
                let children = children
                    .iter()
                    .filter(|child| child.parent_id.as_ref() == Some(&category.id))
                    .cloned()
                    .collect();
                CategoryNode { category, children }
            })
            .collect();

        Self { roots }
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<&CategoryNode> {
        self.roots.iter().find(|node| node.category.slug == slug)
    }

    /// Resolves `/categories/{slug}/{sub_slug}` to the category whose listings
    /// should be shown: the sub-category when `sub_slug` names one of the slug's
    /// children, otherwise the parent itself.
    pub fn resolve(&self, slug: &str, sub_slug: Option<&str>) -> Option<CategoryId> {
        let node = self.find_by_slug(slug)?;
        let child = sub_slug.and_then(|sub| node.children.iter().find(|c| c.slug == sub));
        Some(child.map_or_else(|| node.category.id.clone(), |c| c.id.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(id: &str, parent: Option<&str>, order: i32, active: bool) -> Category {
        Category {
            id: CategoryId::from(id),
            name: id.to_uppercase(),
            slug: id.to_string(),
            parent_id: parent.map(CategoryId::from),
            display_order: order,
            is_active: active,
        }
    }

    fn sample_tree() -> CategoryTree {
        CategoryTree::build(vec![
            cat("vehicles", None, 2, true),
            cat("electronics", None, 1, true),
            cat("phones", Some("electronics"), 2, true),
            cat("laptops", Some("electronics"), 1, true),
            cat("hidden", None, 0, false),
            cat("orphan", Some("hidden"), 0, true),
        ])
    }

    #[test]
    fn test_forest_is_ordered_and_filtered() {
        let tree = sample_tree();
        let slugs: Vec<_> = tree.roots.iter().map(|n| n.category.slug.as_str()).collect();
        assert_eq!(slugs, ["electronics", "vehicles"]);

        let children: Vec<_> = tree.roots[0].children.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(children, ["laptops", "phones"]);
    }

    #[test]
    fn test_resolve_prefers_known_subcategory() {
        let tree = sample_tree();
        assert_eq!(tree.resolve("electronics", Some("phones")), Some(CategoryId::from("phones")));
        assert_eq!(tree.resolve("electronics", Some("boats")), Some(CategoryId::from("electronics")));
        assert_eq!(tree.resolve("electronics", None), Some(CategoryId::from("electronics")));
        assert_eq!(tree.resolve("hidden", None), None);
    }
}
