//! Dependency ordering of a class's factories.
//!
//! A depth-first topological sort over the "after" edges. Entries are
//! visited in their merged order and each entry's dependencies are emitted
//! before it, so entries without constraints keep their relative order.

use std::collections::HashMap;

use graft_component::OwnerClass;

use crate::declaration::FactoryDeclaration;
use crate::error::{CompositionError, MissingDependency};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Orders `entries` so that every entry follows its dependencies.
///
/// # Errors
///
/// - [`CompositionError::UnsatisfiedDependencies`] listing every dependency
///   on a key that is not part of `entries`.
/// - [`CompositionError::Cycle`] with the offending path.
pub(crate) fn sort_by_dependencies<O>(
    class: &OwnerClass,
    entries: Vec<FactoryDeclaration<O>>,
) -> Result<Vec<FactoryDeclaration<O>>, CompositionError> {
    let position: HashMap<u32, usize> = entries
        .iter()
        .enumerate()
        .map(|(pos, entry)| (entry.key.index(), pos))
        .collect();

    let mut missing = Vec::new();
    for entry in &entries {
        for dependency in &entry.after {
            if !position.contains_key(&dependency.index()) {
                missing.push(MissingDependency {
                    key: entry.key.id().to_string(),
                    dependency: dependency.id().to_string(),
                });
            }
        }
    }
    if !missing.is_empty() {
        return Err(CompositionError::UnsatisfiedDependencies {
            class: class.name(),
            missing,
        });
    }

    let mut sorter = Sorter {
        entries: &entries,
        position: &position,
        marks: vec![Mark::Unvisited; entries.len()],
        stack: Vec::new(),
        order: Vec::with_capacity(entries.len()),
    };
    for start in 0..entries.len() {
        sorter.visit(start).map_err(|path| CompositionError::Cycle {
            class: class.name(),
            path,
        })?;
    }
    let order = sorter.order;

    let mut slots: Vec<Option<FactoryDeclaration<O>>> = entries.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|pos| slots[pos].take()).collect())
}

struct Sorter<'a, O> {
    entries: &'a [FactoryDeclaration<O>],
    position: &'a HashMap<u32, usize>,
    marks: Vec<Mark>,
    stack: Vec<usize>,
    order: Vec<usize>,
}

impl<O> Sorter<'_, O> {
    /// Returns the cycle path (`a -> b -> a`) on failure.
    fn visit(&mut self, pos: usize) -> Result<(), String> {
        match self.marks[pos] {
            Mark::Done => Ok(()),
            Mark::InProgress => Err(self.cycle_path(pos)),
            Mark::Unvisited => {
                let (entries, position) = (self.entries, self.position);
                self.marks[pos] = Mark::InProgress;
                self.stack.push(pos);
                for dependency in &entries[pos].after {
                    if let Some(&next) = position.get(&dependency.index()) {
                        self.visit(next)?;
                    }
                }
                self.stack.pop();
                self.marks[pos] = Mark::Done;
                self.order.push(pos);
                Ok(())
            }
        }
    }

    fn cycle_path(&self, pos: usize) -> String {
        let start = self.stack.iter().position(|&p| p == pos).unwrap_or(0);
        self.stack[start..]
            .iter()
            .chain(std::iter::once(&pos))
            .map(|&p| self.entries[p].key.id().as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
