//! Second pass: convert the flat item sequence into a reply forest.
//!
//! `active_by_level` tracks the most recent item seen at each indentation
//! depth; a comment at level N attaches under `active_by_level[N-1]`.
//! Headings nest under the nearest shallower heading via a separate section
//! stack, then reset the reply stack for their section.

use crate::models::thread_item::{ItemId, ThreadItem};

pub(crate) fn build_tree(items: &mut [ThreadItem]) -> Vec<ItemId> {
    let mut threads: Vec<ItemId> = Vec::new();
    let mut active_by_level: Vec<ItemId> = Vec::new();
    let mut heading_stack: Vec<(u8, ItemId)> = Vec::new();

    for index in 0..items.len() {
        let id = ItemId(index);
        let level = items[index].core().level;

        match &items[index] {
            ThreadItem::Heading(heading) => {
                let heading_level = heading.heading_level;
                while heading_stack
                    .last()
                    .is_some_and(|(top, _)| *top >= heading_level)
                {
                    heading_stack.pop();
                }
                match heading_stack.last() {
                    Some(&(_, parent)) => attach(items, parent, id),
                    None => threads.push(id),
                }
                heading_stack.push((heading_level, id));

                // The heading claims its level slot and invalidates any
                // deeper reply context from the previous section.
                active_by_level.truncate(level);
                while active_by_level.len() < level {
                    let deepest = *active_by_level.last().unwrap_or(&id);
                    active_by_level.push(deepest);
                }
                active_by_level.push(id);
            }
            ThreadItem::Comment(_) => {
                if level == 0 || (active_by_level.is_empty() && level > 0) {
                    items[index]
                        .core_mut()
                        .warnings
                        .push("could not be connected to a thread".to_string());
                    threads.push(id);
                } else {
                    if active_by_level.len() < level {
                        // Skipped one or more levels; duplicate the deepest
                        // entry upward so the item still attaches predictably.
                        items[index]
                            .core_mut()
                            .warnings
                            .push("indentation level skipped".to_string());
                        let deepest = *active_by_level
                            .last()
                            .expect("active_by_level checked non-empty");
                        while active_by_level.len() < level {
                            active_by_level.push(deepest);
                        }
                    }
                    attach(items, active_by_level[level - 1], id);
                }

                // Deeper entries cannot parent anything after this item.
                active_by_level.truncate(level);
                while active_by_level.len() < level {
                    let deepest = *active_by_level.last().unwrap_or(&id);
                    active_by_level.push(deepest);
                }
                active_by_level.push(id);
            }
        }
    }

    threads
}

fn attach(items: &mut [ThreadItem], parent: ItemId, child: ItemId) {
    items[parent.0].core_mut().replies.push(child);
    items[child.0].core_mut().parent = Some(parent);
}
