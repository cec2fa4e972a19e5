//! Composition resolution
//!
//! A model listing `Timestamps` in its body receives every field of the
//! resolved `Timestamps` model ahead of its own fields. Resolution is
//! depth-first over an explicit stack of ancestors being resolved, so a model
//! that (transitively) composes itself is reported instead of recursed into,
//! however long the chain.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::ast::{Annotation, Model, ModelField, Schema};
use crate::checksum::Checksum;
use crate::error::{Result, SchemaError};

/// Report every composition or relation target that names no known model.
///
/// Compositions must name a local model; relation targets may also name a
/// model published remotely. Relation interface names contain `-`, so they are
/// never valid targets.
pub fn check_references(schema: &Schema, remote: &BTreeMap<String, Checksum>) -> Result<()> {
    let local: BTreeSet<&str> = schema.models.iter().map(|m| m.name.as_str()).collect();
    let mut missing = BTreeSet::new();

    for model in &schema.models {
        for composition in &model.compositions {
            if !local.contains(composition.name.as_str()) {
                missing.insert(composition.name.clone());
            }
        }
    }

    for relation in &schema.relations {
        for field in &relation.fields {
            let known = local.contains(field.target.as_str())
                || (!field.target.contains('-') && remote.contains_key(&field.target));
            if !known {
                missing.insert(field.target.clone());
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::MissingModels(missing.into_iter().collect()))
    }
}

/// Sort each model's composition list by name
pub fn sort_compositions(models: &mut [Model]) {
    for model in models {
        model.compositions.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

/// Inline compositions into every model, preserving input order
pub fn resolve_compositions(models: &[Model]) -> Result<Vec<Model>> {
    let mut resolver = Resolver::new(models);
    models.iter().map(|m| resolver.resolve(&m.name)).collect()
}

struct Resolver<'a> {
    by_name: HashMap<&'a str, &'a Model>,
    resolved: HashMap<String, Model>,
}

/// A model whose compositions are being inlined, one at a time
struct Frame<'a> {
    model: &'a Model,
    next: usize,
    fields: Vec<ModelField>,
    annotations: Vec<Annotation>,
}

impl<'a> Frame<'a> {
    fn new(model: &'a Model) -> Self {
        Self {
            model,
            next: 0,
            fields: Vec::new(),
            annotations: Vec::new(),
        }
    }

    fn absorb(&mut self, composed: &Model) {
        self.fields.extend(composed.fields.iter().cloned());
        self.annotations.extend(composed.annotations.iter().cloned());
    }

    fn finish(mut self) -> Model {
        self.fields.extend(self.model.fields.iter().cloned());
        self.annotations.extend(self.model.annotations.iter().cloned());
        Model {
            name: self.model.name.clone(),
            fields: self.fields,
            compositions: Vec::new(),
            annotations: self.annotations,
            comment: self.model.comment.clone(),
        }
    }
}

impl<'a> Resolver<'a> {
    fn new(models: &'a [Model]) -> Self {
        Self {
            by_name: models.iter().map(|m| (m.name.as_str(), m)).collect(),
            resolved: HashMap::new(),
        }
    }

    fn lookup(&self, name: &str) -> Result<&'a Model> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::MissingModels(vec![name.to_string()]))
    }

    /// Depth-first over an explicit stack; the frames on it are the ancestor path.
    fn resolve(&mut self, name: &str) -> Result<Model> {
        if let Some(done) = self.resolved.get(name) {
            return Ok(done.clone());
        }

        let root = self.lookup(name)?;
        let mut stack = vec![Frame::new(root)];
        let mut on_stack: HashMap<&'a str, usize> = HashMap::from([(root.name.as_str(), 0)]);

        while let Some(frame) = stack.last_mut() {
            let model = frame.model;
            if let Some(composition) = model.compositions.get(frame.next) {
                frame.next += 1;
                let child = composition.name.as_str();

                if let Some(&start) = on_stack.get(child) {
                    let mut path: Vec<String> =
                        stack[start..].iter().map(|f| f.model.name.clone()).collect();
                    path.push(child.to_string());
                    return Err(SchemaError::CompositionCycle { path });
                }
                if let Some(done) = self.resolved.get(child) {
                    frame.absorb(done);
                    continue;
                }

                let composed = self.lookup(child)?;
                on_stack.insert(child, stack.len());
                stack.push(Frame::new(composed));
                continue;
            }

            let finished = match stack.pop() {
                Some(frame) => frame,
                None => break,
            };
            on_stack.remove(finished.model.name.as_str());
            let resolved = finished.finish();
            debug!(model = %resolved.name, fields = resolved.fields.len(), "resolved compositions");

            if let Some(parent) = stack.last_mut() {
                parent.absorb(&resolved);
            }
            self.resolved.insert(resolved.name.clone(), resolved);
        }

        self.resolved
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::MissingModels(vec![name.to_string()]))
    }
}
