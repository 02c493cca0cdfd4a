// src/project/graph.rs

//! The namespace tree and dependency resolution over it.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, WatchtaskError};
use crate::project::debounce::LastRuns;
use crate::project::name::{is_valid_name, qualify, strip_run_once, TaskRef, NAMESPACE_SEPARATOR};
use crate::project::task::{Task, TaskOption};

/// A scope of tasks. The root namespace has an empty path; children are
/// addressed as `child:task` from their parent.
#[derive(Debug, Default)]
pub struct Namespace {
    tasks: BTreeMap<String, Task>,
    children: BTreeMap<String, Namespace>,
    pub(crate) last_runs: LastRuns,
    invalid: Vec<String>,
}

impl Namespace {
    /// Declare a task. A trailing `?` on the name marks it run-once.
    /// Declaring an existing name replaces that task.
    pub fn task<I>(&mut self, name: &str, options: I) -> &mut Task
    where
        I: IntoIterator<Item = TaskOption>,
    {
        let (bare, run_once) = strip_run_once(name.trim());
        if !is_valid_name(bare) {
            self.invalid.push(name.to_string());
        }

        let mut task = Task::new(bare);
        task.run_once(run_once);
        for option in options {
            task.apply(option);
        }

        match self.tasks.entry(bare.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(task);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(task),
        }
    }

    /// Register tasks in the child namespace `prefix`, creating it if needed.
    pub fn use_namespace(&mut self, prefix: &str, register: impl FnOnce(&mut Namespace)) {
        let prefix = prefix.trim().trim_matches(NAMESPACE_SEPARATOR);
        if !is_valid_name(prefix) {
            self.invalid.push(prefix.to_string());
        }
        register(self.children.entry(prefix.to_string()).or_default());
    }

    pub fn get_task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn child(&self, prefix: &str) -> Option<&Namespace> {
        self.children.get(prefix)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &Namespace)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.children.is_empty()
    }

    /// Visit every namespace, depth first, with its path from the root.
    pub fn walk<'a>(&'a self, path: &mut Vec<String>, visit: &mut impl FnMut(&[String], &'a Namespace)) {
        visit(path, self);
        for (prefix, child) in &self.children {
            path.push(prefix.clone());
            child.walk(path, visit);
            path.pop();
        }
    }

    fn descend(&self, path: &[String]) -> Result<&Namespace> {
        let mut node = self;
        for (depth, segment) in path.iter().enumerate() {
            node = node
                .children
                .get(segment)
                .ok_or_else(|| WatchtaskError::NamespaceNotFound(qualify(&path[..depth], segment)))?;
        }
        Ok(node)
    }
}

/// A task located in the tree.
#[derive(Debug)]
pub struct Resolved<'a> {
    /// Namespace path of the task.
    pub scope: Vec<String>,
    pub node: &'a Namespace,
    pub task: &'a Task,
}

impl Resolved<'_> {
    pub fn qualified(&self) -> String {
        qualify(&self.scope, self.task.name())
    }
}

/// Resolve `reference` as written inside namespace `scope`.
pub fn resolve<'a>(root: &'a Namespace, scope: &[String], reference: &str) -> Result<Resolved<'a>> {
    let parsed = TaskRef::parse(reference)?;

    let mut path: Vec<String> = if parsed.absolute { Vec::new() } else { scope.to_vec() };
    let mut node = root.descend(&path)?;
    for ns in parsed.namespaces {
        node = node
            .children
            .get(&ns)
            .ok_or_else(|| WatchtaskError::NamespaceNotFound(qualify(&path, &ns)))?;
        path.push(ns);
    }

    let task = node
        .tasks
        .get(&parsed.name)
        .ok_or_else(|| WatchtaskError::TaskNotFound(reference.to_string()))?;

    Ok(Resolved {
        scope: path,
        node,
        task,
    })
}

/// Check that every task reachable from `starts` resolves and that the
/// reachable graph has no cycles.
pub fn check_dependencies(root: &Namespace, starts: Vec<(Vec<String>, String)>) -> Result<()> {
    let mut names: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut expanded: HashSet<usize> = HashSet::new();
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    let mut pending = starts;

    while let Some((scope, reference)) = pending.pop() {
        let resolved = resolve(root, &scope, &reference)?;
        let id = intern(&mut names, &mut index, resolved.qualified());
        if !expanded.insert(id) {
            continue;
        }
        graph.add_node(id);

        for dep in resolved.task.dependencies() {
            let dep_resolved = resolve(root, &resolved.scope, dep)?;
            let dep_id = intern(&mut names, &mut index, dep_resolved.qualified());
            // Edge direction: dependency -> dependent.
            graph.add_edge(dep_id, id, ());
            pending.push((resolved.scope.clone(), dep.clone()));
        }
    }

    if let Some((node, _, _)) = graph.all_edges().find(|(a, b, _)| a == b) {
        return Err(WatchtaskError::DependencyCycle(names[node].clone()));
    }
    match toposort(&graph, None) {
        Ok(_) => Ok(()),
        Err(cycle) => Err(WatchtaskError::DependencyCycle(names[cycle.node_id()].clone())),
    }
}

fn intern(names: &mut Vec<String>, index: &mut HashMap<String, usize>, qualified: String) -> usize {
    *index.entry(qualified).or_insert_with_key(|key| {
        names.push(key.clone());
        names.len() - 1
    })
}

/// Validate the whole tree: names, dependency references and cycles.
pub fn validate_tree(root: &Namespace) -> Result<()> {
    let mut invalid: Option<String> = None;
    let mut starts = Vec::new();

    root.walk(&mut Vec::new(), &mut |path, node| {
        if invalid.is_none() {
            invalid = node.invalid.first().cloned();
        }
        for task in node.tasks() {
            starts.push((path.to_vec(), task.name().to_string()));
        }
    });

    if let Some(name) = invalid {
        return Err(WatchtaskError::InvalidTaskName(name));
    }
    check_dependencies(root, starts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Namespace {
        let mut root = Namespace::default();
        root.task("clean", []);
        root.task("build", [TaskOption::deps(["clean", "docs:html"])]);
        root.use_namespace("docs", |docs| {
            docs.task("html", [TaskOption::deps(["/clean", "api:gen"])]);
            docs.use_namespace("api", |api| {
                api.task("gen", []);
            });
        });
        root
    }

    #[test]
    fn references_resolve_relative_to_their_namespace() {
        let root = tree();
        let html = resolve(&root, &[], "docs:html").unwrap();
        assert_eq!(html.qualified(), "docs:html");

        let api_gen = resolve(&root, &html.scope, "api:gen").unwrap();
        assert_eq!(api_gen.qualified(), "docs:api:gen");

        let clean = resolve(&root, &html.scope, "/clean").unwrap();
        assert_eq!(clean.qualified(), "clean");

        assert!(matches!(
            resolve(&root, &html.scope, "clean"),
            Err(WatchtaskError::TaskNotFound(name)) if name == "clean"
        ));
    }

    #[test]
    fn unknown_namespaces_are_named_in_the_error() {
        let root = tree();
        let err = resolve(&root, &[], "nope:x").unwrap_err();
        assert_eq!(err.to_string(), "could not find project having namespace \"nope\"");
        assert!(err.is_definition_error());
    }

    #[test]
    fn valid_tree_passes() {
        validate_tree(&tree()).unwrap();
    }

    #[test]
    fn cycles_are_rejected() {
        let mut root = Namespace::default();
        root.task("a", [TaskOption::deps(["b"])]);
        root.task("b", [TaskOption::deps(["a"])]);
        assert!(matches!(validate_tree(&root), Err(WatchtaskError::DependencyCycle(_))));

        let mut root = Namespace::default();
        root.task("self", [TaskOption::deps(["self"])]);
        assert!(matches!(validate_tree(&root), Err(WatchtaskError::DependencyCycle(_))));
    }

    #[test]
    fn missing_dependencies_are_rejected() {
        let mut root = Namespace::default();
        root.task("a", [TaskOption::deps(["ghost"])]);
        assert!(matches!(validate_tree(&root), Err(WatchtaskError::TaskNotFound(_))));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut root = Namespace::default();
        root.task("a:b", []);
        assert!(matches!(validate_tree(&root), Err(WatchtaskError::InvalidTaskName(_))));
    }

    #[test]
    fn run_once_marker_is_stripped_at_registration() {
        let mut root = Namespace::default();
        root.task("once?", []);
        let task = root.get_task("once").unwrap();
        assert!(task.is_run_once());
    }
}
