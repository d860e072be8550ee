//! Rooted category hierarchy rebuilt from a flat, unordered list.
//!
//! Nodes live in an arena and point at each other by index. The parent link is
//! a plain lookup index and owns nothing.

use std::collections::{HashMap, VecDeque};

use crate::error::{Error, Result};
use crate::model::{Category, SUPER_ROOT_ID};

#[derive(Debug, Clone)]
struct Node {
  category: Category,
  parent: Option<usize>,
  children: Vec<usize>,
}

/// Navigable tree of categories.
#[derive(Debug, Clone)]
pub struct CategoryTree {
  nodes: Vec<Node>,
  index: HashMap<i64, usize>,
  root: usize,
}

impl CategoryTree {
  /// Build a tree from a batch holding the root and everything needed to
  /// connect each category to it.
  ///
  /// The root is the one category whose `parent_id` is not an id of the
  /// batch. The provider's top level reports itself as its own parent, so a
  /// category with `id == parent_id == SUPER_ROOT_ID` also qualifies, and is
  /// preferred when several categories qualify.
  ///
  /// Fails on duplicate ids, when no root or more than one root is found, and
  /// when some category cannot be reached from the root.
  pub fn from_categories(categories: Vec<Category>) -> Result<Self> {
    let mut index = HashMap::with_capacity(categories.len());
    for (i, category) in categories.iter().enumerate() {
      if index.insert(category.id, i).is_some() {
        return Err(Error::DuplicateCategory(category.id));
      }
    }

    let root = find_root(&categories, &index)?;
    let (tree, unreached) = Self::assemble(categories, index, root);
    if !unreached.is_empty() {
      return Err(Error::DisconnectedCategories(unreached));
    }
    Ok(tree)
  }

  /// Link every node under `root` breadth-first. Returns the ids left
  /// unattached.
  fn assemble(
    categories: Vec<Category>,
    index: HashMap<i64, usize>,
    root: usize,
  ) -> (Self, Vec<i64>) {
    let mut children_of: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, category) in categories.iter().enumerate() {
      if i != root {
        children_of.entry(category.parent_id).or_default().push(i);
      }
    }

    let mut nodes: Vec<Node> = categories
      .into_iter()
      .map(|category| Node {
        category,
        parent: None,
        children: Vec::new(),
      })
      .collect();

    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
      let id = nodes[current].category.id;
      let Some(children) = children_of.remove(&id) else {
        continue;
      };
      for &child in &children {
        nodes[child].parent = Some(current);
      }
      queue.extend(children.iter().copied());
      nodes[current].children = children;
    }

    let unreached = nodes
      .iter()
      .enumerate()
      .filter(|(i, node)| *i != root && node.parent.is_none())
      .map(|(_, node)| node.category.id)
      .collect();

    (Self { nodes, index, root }, unreached)
  }

  /// Total number of categories, fixed at construction.
  pub fn size(&self) -> usize {
    self.nodes.len()
  }

  pub fn root(&self) -> &Category {
    &self.nodes[self.root].category
  }

  /// Category with the given id, if it is in the tree.
  pub fn lookup(&self, id: i64) -> Option<&Category> {
    self.index.get(&id).map(|&i| &self.nodes[i].category)
  }

  /// Direct children of `id`; empty for leaves and unknown ids.
  pub fn children(&self, id: i64) -> Vec<&Category> {
    self
      .index
      .get(&id)
      .map(|&i| {
        self.nodes[i]
          .children
          .iter()
          .map(|&c| &self.nodes[c].category)
          .collect()
      })
      .unwrap_or_default()
  }

  /// Parent of `id` inside this tree. `None` for the root and unknown ids.
  pub fn parent(&self, id: i64) -> Option<&Category> {
    let &i = self.index.get(&id)?;
    self.nodes[i].parent.map(|p| &self.nodes[p].category)
  }

  /// Breadth-first iterator starting at the root. Each call starts over.
  pub fn iter(&self) -> Iter<'_> {
    Iter {
      tree: self,
      queue: VecDeque::from([self.root]),
    }
  }

  /// The category `id` and all its descendants as a tree of their own.
  pub fn subtree(&self, id: i64) -> Option<CategoryTree> {
    let &start = self.index.get(&id)?;

    let mut categories = Vec::new();
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
      let node = &self.nodes[current];
      categories.push(node.category.clone());
      queue.extend(node.children.iter().copied());
    }

    let index = categories
      .iter()
      .enumerate()
      .map(|(i, c)| (c.id, i))
      .collect();
    // Every node was reached from `start`, so nothing can be left over
    let (tree, _) = Self::assemble(categories, index, 0);
    Some(tree)
  }
}

fn find_root(categories: &[Category], index: &HashMap<i64, usize>) -> Result<usize> {
  let candidates: Vec<usize> = categories
    .iter()
    .enumerate()
    .filter(|(_, c)| {
      let self_parented_root = c.id == SUPER_ROOT_ID && c.parent_id == SUPER_ROOT_ID;
      !index.contains_key(&c.parent_id) || self_parented_root
    })
    .map(|(i, _)| i)
    .collect();

  match candidates.as_slice() {
    [] => Err(Error::NoTreeRoot),
    [only] => Ok(*only),
    many => many
      .iter()
      .copied()
      .find(|&i| categories[i].id == SUPER_ROOT_ID)
      .ok_or_else(|| {
        Error::AmbiguousTreeRoot(many.iter().map(|&i| categories[i].id).collect())
      }),
  }
}

/// Breadth-first traversal over a [`CategoryTree`].
pub struct Iter<'a> {
  tree: &'a CategoryTree,
  queue: VecDeque<usize>,
}

impl<'a> Iterator for Iter<'a> {
  type Item = &'a Category;

  fn next(&mut self) -> Option<Self::Item> {
    let current = self.queue.pop_front()?;
    let node = &self.tree.nodes[current];
    self.queue.extend(node.children.iter().copied());
    Some(&node.category)
  }
}

impl<'a> IntoIterator for &'a CategoryTree {
  type Item = &'a Category;
  type IntoIter = Iter<'a>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

impl TryFrom<Vec<Category>> for CategoryTree {
  type Error = Error;

  fn try_from(categories: Vec<Category>) -> Result<Self> {
    Self::from_categories(categories)
  }
}
