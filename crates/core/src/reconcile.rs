//! Reconciliation planning.
//!
//! Pure diff logic: given the prompts currently persisted for a request and
//! a client-submitted target list, decide which prompts are created, which
//! are updated (and what happens to their image), and which are deleted.
//! Applying the plan against the database and the blob store is the job of
//! `atelier_engine`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{BlobId, DbId};

// ---------------------------------------------------------------------------
// Stale-id policy
// ---------------------------------------------------------------------------

/// What to do with a target entry whose id matches no unconsumed prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleIdPolicy {
    /// Treat the entry as a create and insert a fresh prompt.
    #[default]
    CreateOnStaleId,
    /// Fail the whole call with `NotFound`.
    RejectOnStaleId,
}

impl StaleIdPolicy {
    /// Parse from the configuration value (`create` or `reject`).
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name.trim() {
            "create" | "create-on-stale-id" => Ok(Self::CreateOnStaleId),
            "reject" | "reject-on-stale-id" => Ok(Self::RejectOnStaleId),
            other => Err(CoreError::Validation(format!(
                "Unknown stale id policy '{other}'. Must be one of: create, reject"
            ))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::CreateOnStaleId => "create",
            Self::RejectOnStaleId => "reject",
        }
    }
}

// ---------------------------------------------------------------------------
// Target list
// ---------------------------------------------------------------------------

/// One entry of a client-submitted target list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub id: Option<DbId>,
    pub text: String,
    pub image: Option<Vec<u8>>,
}

impl PromptSpec {
    /// Check the text and normalise an empty image payload to `None`.
    pub fn validate(mut self) -> Result<Self, CoreError> {
        if self.text.trim().is_empty() {
            return Err(CoreError::Validation("Prompt text must not be empty".into()));
        }
        if self.image.as_ref().is_some_and(|bytes| bytes.is_empty()) {
            self.image = None;
        }
        Ok(self)
    }
}

/// A validated target list.
///
/// Entry order decides create-vs-stale-id tie-breaking and the stored
/// position of each prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetList {
    entries: Vec<PromptSpec>,
}

impl TargetList {
    /// Validate a list of entries.
    ///
    /// Every text must be non-blank. An empty image payload means "no
    /// image" and is normalised to `None`.
    pub fn new(entries: Vec<PromptSpec>) -> Result<Self, CoreError> {
        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                entry.validate().map_err(|err| match err {
                    CoreError::Validation(msg) => {
                        CoreError::Validation(format!("{msg} (entry {index})"))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Build a target list from the parallel arrays of a multipart payload.
    ///
    /// All three arrays must have the same length.
    pub fn from_parallel(
        texts: Vec<String>,
        ids: Vec<Option<DbId>>,
        images: Vec<Option<Vec<u8>>>,
    ) -> Result<Self, CoreError> {
        if texts.len() != ids.len() || texts.len() != images.len() {
            return Err(CoreError::Validation(format!(
                "Mismatched target list: {} texts, {} ids, {} images",
                texts.len(),
                ids.len(),
                images.len()
            )));
        }

        let entries = texts
            .into_iter()
            .zip(ids)
            .zip(images)
            .map(|((text, id), image)| PromptSpec { id, text, image })
            .collect();
        Self::new(entries)
    }

    pub fn entries(&self) -> &[PromptSpec] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// The parts of a persisted prompt the planner needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedPrompt {
    pub id: DbId,
    pub image: Option<BlobId>,
}

/// What happens to the image of an updated prompt.
///
/// | existing | new     | action      |
/// |----------|---------|-------------|
/// | none     | none    | `Untouched` |
/// | none     | present | `Attach`    |
/// | present  | none    | `Detach`    |
/// | present  | present | `Replace`   |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageAction {
    Untouched,
    Attach(Vec<u8>),
    Detach(BlobId),
    Replace(BlobId, Vec<u8>),
}

impl ImageAction {
    pub fn decide(existing: Option<BlobId>, incoming: Option<Vec<u8>>) -> Self {
        match (existing, incoming) {
            (None, None) => Self::Untouched,
            (None, Some(bytes)) => Self::Attach(bytes),
            (Some(blob_id), None) => Self::Detach(blob_id),
            (Some(blob_id), Some(bytes)) => Self::Replace(blob_id, bytes),
        }
    }
}

/// A create or update, in target-list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedWrite {
    Create {
        position: usize,
        text: String,
        image: Option<Vec<u8>>,
        /// The unmatched id the entry carried, if it fell back from an update.
        stale_id: Option<DbId>,
    },
    Update {
        position: usize,
        prompt_id: DbId,
        text: String,
        image: ImageAction,
    },
}

/// Result of [`plan_reconciliation`]. Writes are applied first, deletes last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub writes: Vec<PlannedWrite>,
    pub deletes: Vec<PersistedPrompt>,
}

impl ReconcilePlan {
    pub fn create_count(&self) -> usize {
        self.writes
            .iter()
            .filter(|w| matches!(w, PlannedWrite::Create { .. }))
            .count()
    }

    pub fn update_count(&self) -> usize {
        self.writes.len() - self.create_count()
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.len()
    }
}

/// Diff `current` against `target`.
///
/// An entry id matches a persisted prompt only once; a second entry carrying
/// the same id, or an id that never existed, is stale and handled per
/// `policy`. Persisted prompts left unmatched are deleted, in their original
/// order.
pub fn plan_reconciliation(
    current: &[PersistedPrompt],
    target: &TargetList,
    policy: StaleIdPolicy,
) -> Result<ReconcilePlan, CoreError> {
    let mut unconsumed: HashMap<DbId, PersistedPrompt> =
        current.iter().map(|p| (p.id, *p)).collect();
    let mut writes = Vec::with_capacity(target.len());

    for (position, entry) in target.entries().iter().enumerate() {
        let matched = entry.id.and_then(|id| unconsumed.remove(&id));
        let write = match (entry.id, matched) {
            (Some(prompt_id), Some(existing)) => PlannedWrite::Update {
                position,
                prompt_id,
                text: entry.text.clone(),
                image: ImageAction::decide(existing.image, entry.image.clone()),
            },
            (Some(stale), None) if policy == StaleIdPolicy::RejectOnStaleId => {
                return Err(CoreError::not_found("Prompt", stale));
            }
            (stale_id, _) => PlannedWrite::Create {
                position,
                text: entry.text.clone(),
                image: entry.image.clone(),
                stale_id,
            },
        };
        writes.push(write);
    }

    let deletes = current
        .iter()
        .filter(|p| unconsumed.contains_key(&p.id))
        .copied()
        .collect();

    Ok(ReconcilePlan { writes, deletes })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: Option<DbId>, text: &str, image: Option<&[u8]>) -> PromptSpec {
        PromptSpec {
            id,
            text: text.to_string(),
            image: image.map(<[u8]>::to_vec),
        }
    }

    fn persisted(id: DbId, image: Option<BlobId>) -> PersistedPrompt {
        PersistedPrompt { id, image }
    }

    #[test]
    fn policy_from_name() {
        assert_eq!(
            StaleIdPolicy::from_name("create").unwrap(),
            StaleIdPolicy::CreateOnStaleId
        );
        assert_eq!(
            StaleIdPolicy::from_name("reject-on-stale-id").unwrap(),
            StaleIdPolicy::RejectOnStaleId
        );
        assert!(StaleIdPolicy::from_name("ignore").is_err());
    }

    #[test]
    fn policy_default_is_create() {
        assert_eq!(StaleIdPolicy::default(), StaleIdPolicy::CreateOnStaleId);
        assert_eq!(StaleIdPolicy::default().name(), "create");
    }

    #[test]
    fn parallel_arrays_must_match() {
        let err = TargetList::from_parallel(
            vec!["a".into(), "b".into()],
            vec![None],
            vec![None, None],
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn parallel_arrays_zip_in_order() {
        let list = TargetList::from_parallel(
            vec!["a".into(), "b".into()],
            vec![Some(7), None],
            vec![None, Some(b"png".to_vec())],
        )
        .unwrap();
        assert_eq!(list.entries()[0], entry(Some(7), "a", None));
        assert_eq!(list.entries()[1], entry(None, "b", Some(b"png")));
    }

    #[test]
    fn blank_text_is_rejected() {
        let err =
            TargetList::new(vec![entry(None, "ok", None), entry(None, "  ", None)]).unwrap_err();
        assert!(matches!(err, CoreError::Validation(msg) if msg.contains("entry 1")));
    }

    #[test]
    fn empty_image_means_no_image() {
        let list = TargetList::new(vec![entry(None, "a", Some(b""))]).unwrap();
        assert_eq!(list.entries()[0].image, None);
    }

    #[test]
    fn image_action_table() {
        let blob = BlobId::new_v4();
        assert_eq!(ImageAction::decide(None, None), ImageAction::Untouched);
        assert_eq!(
            ImageAction::decide(None, Some(b"x".to_vec())),
            ImageAction::Attach(b"x".to_vec())
        );
        assert_eq!(ImageAction::decide(Some(blob), None), ImageAction::Detach(blob));
        assert_eq!(
            ImageAction::decide(Some(blob), Some(b"y".to_vec())),
            ImageAction::Replace(blob, b"y".to_vec())
        );
    }

    #[test]
    fn mixed_update_create_delete() {
        let b1 = BlobId::new_v4();
        let current = [persisted(1, Some(b1)), persisted(2, None)];
        let target = TargetList::new(vec![
            entry(Some(1), "a2", None),
            entry(None, "c", Some(b"i3")),
        ])
        .unwrap();

        let plan = plan_reconciliation(&current, &target, StaleIdPolicy::default()).unwrap();

        assert_eq!(
            plan.writes,
            vec![
                PlannedWrite::Update {
                    position: 0,
                    prompt_id: 1,
                    text: "a2".into(),
                    image: ImageAction::Detach(b1),
                },
                PlannedWrite::Create {
                    position: 1,
                    text: "c".into(),
                    image: Some(b"i3".to_vec()),
                    stale_id: None,
                },
            ]
        );
        assert_eq!(plan.deletes, vec![persisted(2, None)]);
        assert_eq!(
            (plan.create_count(), plan.update_count(), plan.delete_count()),
            (1, 1, 1)
        );
    }

    #[test]
    fn duplicate_id_is_consumed_once_then_created() {
        let current = [persisted(5, None)];
        let target = TargetList::new(vec![
            entry(Some(5), "first", None),
            entry(Some(5), "second", None),
        ])
        .unwrap();

        let plan = plan_reconciliation(&current, &target, StaleIdPolicy::CreateOnStaleId).unwrap();

        assert!(matches!(plan.writes[0], PlannedWrite::Update { prompt_id: 5, .. }));
        assert!(matches!(
            plan.writes[1],
            PlannedWrite::Create { stale_id: Some(5), .. }
        ));
        assert!(plan.deletes.is_empty());
    }

    #[test]
    fn unknown_id_creates_under_create_policy() {
        let target = TargetList::new(vec![entry(Some(99), "x", None)]).unwrap();
        let plan = plan_reconciliation(&[], &target, StaleIdPolicy::CreateOnStaleId).unwrap();
        assert!(matches!(
            plan.writes[0],
            PlannedWrite::Create { stale_id: Some(99), .. }
        ));
    }

    #[test]
    fn unknown_id_fails_under_reject_policy() {
        let current = [persisted(1, None)];
        let target = TargetList::new(vec![entry(Some(1), "x", None), entry(Some(1), "y", None)])
            .unwrap();
        let err =
            plan_reconciliation(&current, &target, StaleIdPolicy::RejectOnStaleId).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "Prompt", id } if id == "1"));
    }

    #[test]
    fn empty_target_deletes_everything_in_order() {
        let current = [persisted(3, None), persisted(1, Some(BlobId::new_v4()))];
        let plan = plan_reconciliation(&current, &TargetList::default(), StaleIdPolicy::default())
            .unwrap();
        assert!(plan.writes.is_empty());
        assert_eq!(
            plan.deletes.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![3, 1]
        );
    }
}
