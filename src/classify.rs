//! Reference annotation classifier behind the bundled `lb-diff` tool.
//!
//! Annotations are matched by their extractor-assigned id:
//!
//! | old | new | tag/text | file/line | kind |
//! |-----|-----|----------|-----------|------|
//! | yes | yes | same     | same      | SAME |
//! | yes | yes | same     | changed   | MOVE |
//! | yes | yes | changed  | any       | UPDATE |
//! | no  | yes |          |           | NEW |
//! | yes | no  |          |           | DELETE |
//!
//! `context` is carried along but never affects the classification.
//! Items come out in new-snapshot order, followed by deletions in old order.

use crate::linkdiff::diff_keyed;
use crate::models::{AnnotationFields, AnnotationRecord, DiffData, DiffItem, DiffKind};
use std::collections::HashMap;

/// Classify one annotation present on both sides.
pub fn kind_of(old: &AnnotationFields, new: &AnnotationFields) -> DiffKind {
    if old.tag != new.tag || old.text != new.text {
        DiffKind::Update
    } else if old.file != new.file || old.line != new.line {
        DiffKind::Move
    } else {
        DiffKind::Same
    }
}

/// Diff two annotation lists.
pub fn classify(old: &[AnnotationRecord], new: &[AnnotationRecord]) -> Vec<DiffItem> {
    let diff = diff_keyed(old, new, |o| o.id.clone(), |n| n.id.clone());

    let mut matched: HashMap<&str, DiffItem> = HashMap::with_capacity(new.len());
    for (o, n) in diff.kept {
        matched.insert(
            n.id.as_str(),
            DiffItem {
                id: n.id.clone(),
                tag: n.fields.tag.clone(),
                kind: kind_of(&o.fields, &n.fields),
                data: DiffData {
                    old: Some(o.fields.clone()),
                    new: Some(n.fields.clone()),
                },
            },
        );
    }
    for n in diff.added {
        matched.insert(
            n.id.as_str(),
            DiffItem {
                id: n.id.clone(),
                tag: n.fields.tag.clone(),
                kind: DiffKind::New,
                data: DiffData {
                    old: None,
                    new: Some(n.fields.clone()),
                },
            },
        );
    }

    let mut items: Vec<DiffItem> = new
        .iter()
        .filter_map(|n| matched.remove(n.id.as_str()))
        .collect();

    items.extend(diff.removed.into_iter().map(|o| DiffItem {
        id: o.id.clone(),
        tag: o.fields.tag.clone(),
        kind: DiffKind::Delete,
        data: DiffData {
            old: Some(o.fields.clone()),
            new: None,
        },
    }));

    items
}
