//! Task registry and dependency resolution
//!
//! Tasks live in a petgraph DAG. Unlike a plain topological sort, resolution
//! walks dependencies in the order they were declared, so `build` starts its
//! stages in the order written.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::config::Config;
use crate::error::{FrontpipeError, Result};
use crate::paths::AssetCategory;

/// A leaf unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Clean,
    Transform(AssetCategory),
    Watch,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Clean => f.write_str("clean"),
            Action::Transform(category) => write!(f, "transform {}", category),
            Action::Watch => f.write_str("watch"),
        }
    }
}

/// A node in the task graph
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub name: String,
    pub desc: Option<String>,
    /// `None` for composite tasks
    pub action: Option<Action>,
    /// Declared dependencies, in order, duplicates included
    pub depends: Vec<String>,
}

impl TaskNode {
    fn leaf(name: &str, desc: &str, action: Action) -> Self {
        Self {
            name: name.to_string(),
            desc: Some(desc.to_string()),
            action: Some(action),
            depends: Vec::new(),
        }
    }

    fn composite(name: &str, desc: Option<String>, depends: &[String]) -> Self {
        Self {
            name: name.to_string(),
            desc,
            action: None,
            depends: depends.to_vec(),
        }
    }
}

/// The built-in tasks
pub fn builtin_tasks() -> Vec<TaskNode> {
    let deps = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();

    vec![
        TaskNode::leaf("clean", "Remove everything under the output directory", Action::Clean),
        TaskNode::leaf(
            "scripts",
            "Annotate and concatenate scripts with an inline source map",
            Action::Transform(AssetCategory::Scripts),
        ),
        TaskNode::leaf(
            "html",
            "Copy base and view HTML files",
            Action::Transform(AssetCategory::Html),
        ),
        TaskNode::leaf(
            "css",
            "Minify stylesheets, keeping line breaks",
            Action::Transform(AssetCategory::Css),
        ),
        TaskNode::leaf(
            "images",
            "Compress images",
            Action::Transform(AssetCategory::Images),
        ),
        TaskNode::leaf(
            "favicon",
            "Copy the favicon",
            Action::Transform(AssetCategory::Favicon),
        ),
        TaskNode::leaf(
            "dependencies",
            "Concatenate bower dependencies into lib.min.js and lib.min.css",
            Action::Transform(AssetCategory::Dependencies),
        ),
        TaskNode::leaf(
            "watch",
            "Rebuild on change and notify live-reload clients",
            Action::Watch,
        ),
        TaskNode::composite(
            "build",
            Some("Build the app and keep watching".to_string()),
            &deps(&["scripts", "html", "css", "images", "css", "watch"]),
        ),
        TaskNode::composite(
            "lib",
            Some("Build minified client dependencies".to_string()),
            &deps(&["dependencies"]),
        ),
    ]
}

/// The task registry. Built once, read-only afterwards.
#[derive(Debug)]
pub struct TaskGraph {
    graph: DiGraph<TaskNode, ()>,
    name_to_index: HashMap<String, NodeIndex>,
}

impl TaskGraph {
    /// Built-in tasks plus the aliases declared in configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut tasks = builtin_tasks();

        let mut aliases: Vec<_> = config.tasks.iter().collect();
        aliases.sort_by(|a, b| a.0.cmp(b.0));

        for (name, task_config) in aliases {
            let node = TaskNode::composite(name, task_config.desc.clone(), &task_config.depends);

            match tasks.iter_mut().find(|t| &t.name == name) {
                Some(existing) if existing.action.is_some() => {
                    return Err(FrontpipeError::InvalidTask {
                        task: name.clone(),
                        reason: "Built-in leaf tasks cannot be redefined".to_string(),
                    });
                }
                Some(existing) => *existing = node,
                None => tasks.push(node),
            }
        }

        Self::from_tasks(tasks)
    }

    /// Build a registry from an explicit task list
    pub fn from_tasks(tasks: Vec<TaskNode>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut name_to_index = HashMap::new();

        for task in tasks {
            let name = task.name.clone();
            let idx = graph.add_node(task);
            if name_to_index.insert(name.clone(), idx).is_some() {
                return Err(FrontpipeError::InvalidTask {
                    task: name,
                    reason: "Task names must be unique".to_string(),
                });
            }
        }

        // Edge goes from dependency TO dependent (dep must run first)
        let indices: Vec<NodeIndex> = graph.node_indices().collect();
        for task_idx in indices {
            let depends = graph[task_idx].depends.clone();
            for dep in depends {
                let dep_idx = name_to_index
                    .get(&dep)
                    .ok_or_else(|| FrontpipeError::TaskNotFound {
                        name: dep.clone(),
                        available: sorted_names(&name_to_index),
                    })?;

                if graph.find_edge(*dep_idx, task_idx).is_none() {
                    graph.add_edge(*dep_idx, task_idx, ());
                }
            }
        }

        let registry = Self {
            graph,
            name_to_index,
        };

        if is_cyclic_directed(&registry.graph) {
            return Err(FrontpipeError::CyclicDependency {
                cycle: registry.find_cycle_description(),
            });
        }

        Ok(registry)
    }

    /// Leaf tasks to run for `task_name`, in initiation order.
    ///
    /// Depth-first over declared dependencies; each task appears once, so a
    /// dependency listed twice runs once, at its first position.
    pub fn execution_order(&self, task_name: &str) -> Result<Vec<&TaskNode>> {
        Ok(self
            .closure(task_name)?
            .into_iter()
            .filter(|node| node.action.is_some())
            .collect())
    }

    /// `task_name` and every task it reaches, composites included,
    /// dependencies before dependents
    pub fn closure(&self, task_name: &str) -> Result<Vec<&TaskNode>> {
        let target = self.index_of(task_name)?;

        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut stack = Vec::new();
        self.visit(target, &mut done, &mut stack, &mut order)?;

        Ok(order.into_iter().map(|idx| &self.graph[idx]).collect())
    }

    /// The actions `execution_order` yields
    pub fn plan(&self, task_name: &str) -> Result<Vec<Action>> {
        Ok(self
            .execution_order(task_name)?
            .into_iter()
            .filter_map(|node| node.action)
            .collect())
    }

    fn visit(
        &self,
        idx: NodeIndex,
        done: &mut HashSet<NodeIndex>,
        stack: &mut Vec<NodeIndex>,
        order: &mut Vec<NodeIndex>,
    ) -> Result<()> {
        if done.contains(&idx) {
            return Ok(());
        }

        if let Some(pos) = stack.iter().position(|&s| s == idx) {
            let mut cycle: Vec<&str> = stack[pos..]
                .iter()
                .map(|&s| self.graph[s].name.as_str())
                .collect();
            cycle.push(self.graph[idx].name.as_str());
            return Err(FrontpipeError::CyclicDependency {
                cycle: cycle.join(" -> "),
            });
        }

        stack.push(idx);
        for dep in &self.graph[idx].depends {
            let dep_idx = self.index_of(dep)?;
            self.visit(dep_idx, done, stack, order)?;
        }
        stack.pop();

        done.insert(idx);
        order.push(idx);
        Ok(())
    }

    fn index_of(&self, name: &str) -> Result<NodeIndex> {
        self.name_to_index
            .get(name)
            .copied()
            .ok_or_else(|| FrontpipeError::TaskNotFound {
                name: name.to_string(),
                available: sorted_names(&self.name_to_index),
            })
    }

    /// Find a human-readable description of a cycle
    fn find_cycle_description(&self) -> String {
        let mut names: Vec<_> = self.name_to_index.iter().collect();
        names.sort();

        for (_, &idx) in names {
            let mut stack = Vec::new();
            let mut done = HashSet::new();
            let mut order = Vec::new();
            if let Err(FrontpipeError::CyclicDependency { cycle }) =
                self.visit(idx, &mut done, &mut stack, &mut order)
            {
                return cycle;
            }
        }

        "Unknown cycle".to_string()
    }

    /// Get a task by name
    pub fn get_task(&self, name: &str) -> Option<&TaskNode> {
        self.name_to_index.get(name).map(|&idx| &self.graph[idx])
    }

    /// Get all task names
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.name_to_index.keys().map(|s| s.as_str())
    }

    /// Get direct dependencies of a task, as declared
    pub fn dependencies(&self, name: &str) -> Option<Vec<&str>> {
        self.get_task(name)
            .map(|task| task.depends.iter().map(String::as_str).collect())
    }

    /// Get tasks that depend on the given task
    pub fn dependents(&self, name: &str) -> Option<Vec<&str>> {
        self.name_to_index.get(name).map(|&idx| {
            let mut names: Vec<&str> = self
                .graph
                .neighbors_directed(idx, petgraph::Direction::Outgoing)
                .map(|dep_idx| self.graph[dep_idx].name.as_str())
                .collect();
            names.sort();
            names
        })
    }
}

fn sorted_names(name_to_index: &HashMap<String, NodeIndex>) -> Vec<String> {
    let mut names: Vec<String> = name_to_index.keys().cloned().collect();
    names.sort();
    names
}
