//! Identifier expansion: view universes and category worklists

use super::Harvester;
use crate::classifier;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

impl Harvester {
    /// View members plus the category relationships, children and
    /// descendants of each member, sorted
    pub(crate) async fn expand_view(&self, view: &str, members: &[String]) -> BTreeSet<String> {
        let api = &self.api;
        let related: Vec<Vec<String>> = stream::iter(members)
            .map(|member| async move {
                let (categories, children, descendants) = tokio::join!(
                    api.category_relationships(member),
                    api.children(member, Some(view)),
                    api.descendants(member, Some(view)),
                );
                let mut ids = categories;
                ids.extend(children);
                ids.extend(descendants);
                ids
            })
            .buffer_unordered(self.options.workers)
            .collect()
            .await;

        let mut universe: BTreeSet<String> = members.iter().cloned().collect();
        universe.extend(related.into_iter().flatten());
        universe
    }

    /// Member weaknesses of `categories`, following nested categories
    ///
    /// `visited` guards against cycles and against identifiers that are
    /// already scheduled elsewhere; it is updated in place.
    pub(crate) async fn expand_categories(&self, categories: Vec<String>, visited: &mut HashSet<String>) -> Vec<String> {
        let api = &self.api;
        let mut worklist = categories;
        let mut weaknesses = Vec::new();
        let mut round = 0;

        while !worklist.is_empty() {
            round += 1;
            debug!(round, categories = worklist.len(), "Expanding categories");

            let found: Vec<Vec<String>> = stream::iter(std::mem::take(&mut worklist))
                .map(|category| async move {
                    let (members, children, descendants) = tokio::join!(
                        api.category_relationships(&category),
                        api.children(&category, None),
                        api.descendants(&category, None),
                    );
                    let mut ids = members;
                    ids.extend(children);
                    ids.extend(descendants);
                    ids
                })
                .buffer_unordered(self.options.workers)
                .collect()
                .await;

            let discovered: Vec<String> = found
                .into_iter()
                .flatten()
                .filter(|id| visited.insert(id.clone()))
                .collect();
            if discovered.is_empty() {
                break;
            }

            let (members, nested) = classifier::partition(
                api,
                &discovered,
                self.options.workers,
                self.options.pacing.type_batch_timeout,
            )
            .await;
            weaknesses.extend(members);
            worklist = nested;
        }

        if !weaknesses.is_empty() {
            info!(count = weaknesses.len(), "Category expansion found member weaknesses");
        }
        weaknesses
    }
}
