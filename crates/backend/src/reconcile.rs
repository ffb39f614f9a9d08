//! Post-mutation visibility reconciliation.
//!
//! Writes take a moment to show up in search results, and reads issued too
//! soon would report spurious not-founds. After a mutation that should make
//! an entity visible, [`wait_for_entity`] polls the search endpoint with
//! doubling backoff; after a removal, [`wait_for_removal`] polls until the
//! entity is gone.

use std::time::Duration;

use linkbox_api::Entity;
use linkbox_common::pacer::Attempt;
use linkbox_common::Pacer;

use crate::error::Error;
use crate::walker::Walker;

/// Poll budget for a freshly mutated entity.
pub const RECONCILE_ATTEMPTS: u32 = 10;
/// First backoff step; doubles on each miss.
pub const RECONCILE_INITIAL_DELAY: Duration = Duration::from_millis(100);

/// Poll until `(parent_id, leaf)` is visible and return its full record.
///
/// # Errors
/// `ObjectNotFound` once the budget is exhausted; the caller may then fall
/// back to a record synthesized from the mutation response.
pub async fn wait_for_entity(
    walker: &Walker<'_>,
    parent_id: i64,
    leaf: &str,
) -> Result<Entity, Error> {
    let mut delay: Duration = RECONCILE_INITIAL_DELAY;
    for attempt in 1..=RECONCILE_ATTEMPTS {
        if let Some(entity) = walker.find_entry(parent_id, leaf).await? {
            return Ok(entity);
        }
        if attempt < RECONCILE_ATTEMPTS {
            tracing::debug!(
                leaf,
                attempt,
                max = RECONCILE_ATTEMPTS,
                ?delay,
                "mutation not yet visible, retrying"
            );
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }
    Err(Error::ObjectNotFound {
        path: leaf.to_string(),
    })
}

/// Poll until `(parent_id, leaf)` is no longer visible.
///
/// Best effort: the removal itself has already succeeded, so exhausting the
/// budget only logs. This deflakes rmdir-right-after-remove sequences.
pub async fn wait_for_removal(pacer: &Pacer, walker: &Walker<'_>, parent_id: i64, leaf: &str) {
    let outcome: Result<(), Error> = pacer
        .call(|| async move {
            match walker.find_entry(parent_id, leaf).await {
                Ok(None) => Attempt::Done(()),
                Ok(Some(_)) => Attempt::Retry(Error::NotReflected {
                    path: leaf.to_string(),
                }),
                Err(e) => Attempt::Fatal(e),
            }
        })
        .await;

    if let Err(e) = outcome {
        tracing::debug!(leaf, error = %e, "removal still visible after polling");
    }
}
